//! Simulation Configuration
//!
//! All options are plain data with defaults and can be loaded from YAML:
//!
//! ```yaml
//! cacheCapacity: 104857600     # MB
//! highWatermark: 95.0
//! lowWatermark: 75.0
//! timeSpanAdmission: 200000
//! purgeFrequency: 7
//! exploration:
//!   epsilonMax: 1.0
//!   annealing: exponential
//! reward:
//!   sizeUpperBound: 4096.0
//! seed: 2019
//! startDay: 0
//! endDay: 364
//! startDate: 2019-01-01
//! ```

use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::cache::mb_to_bytes;
use crate::error::{Error, Result};
use crate::learning::{ExplorationConfig, RewardConfig, DEFAULT_EXPERIENCE_CAPACITY};

/// Fraction of the daily bandwidth budget above which misses are no longer admitted
pub const BANDWIDTH_PRESSURE_THRESHOLD: f64 = 0.95;

/// Configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Cache capacity in MB
    pub cache_capacity: f64,

    /// Occupancy percent above which eviction starts
    pub high_watermark: f64,

    /// Occupancy percent below which an eviction scan stops early
    pub low_watermark: f64,

    /// Invalidation horizon for admission decisions (ticks)
    pub time_span_admission: u64,

    /// Invalidation horizon for eviction decisions (ticks)
    pub time_span_eviction: u64,

    /// Recency (ticks) after which non-resident statistics are purged
    pub purge_delta: u64,

    /// Days between registry purges (0 disables)
    pub purge_frequency: u32,

    /// Forced eviction interval in ticks (0 disables)
    pub eviction_frequency: u64,

    /// Ticks between invalidation sweeps
    pub invalidated_search_frequency: u64,

    /// Scans per eviction phase before giving up on reaching the high watermark
    pub max_eviction_scans: u32,

    /// Records kept per experience buffer
    pub experience_buffer_capacity: usize,

    /// Daily budget in MB for data read on misses (0 disables back-pressure)
    pub daily_bandwidth_budget: f64,

    /// CPU efficiency points gained by reading locally instead of remotely
    pub cpu_efficiency_offset: f64,

    /// Shuffle the resident set before each eviction scan
    pub shuffle_eviction_scan: bool,

    pub exploration: ExplorationConfig,

    pub reward: RewardConfig,

    /// Seed for the simulation's random source
    pub seed: u64,

    /// First trace day to replay
    pub start_day: u32,

    /// Last trace day to replay (inclusive)
    pub end_day: u32,

    /// Calendar date of `start_day`, used in reports
    pub start_date: NaiveDate,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 100.0 * 1024.0 * 1024.0, // 100 TB
            high_watermark: 95.0,
            low_watermark: 0.0,
            time_span_admission: 150_000,
            time_span_eviction: 150_000,
            purge_delta: 500_000,
            purge_frequency: 7,
            eviction_frequency: 0,
            invalidated_search_frequency: 10_000,
            max_eviction_scans: 4,
            experience_buffer_capacity: DEFAULT_EXPERIENCE_CAPACITY,
            daily_bandwidth_budget: 0.0,
            cpu_efficiency_offset: 19.0,
            shuffle_eviction_scan: true,
            exploration: ExplorationConfig::default(),
            reward: RewardConfig::default(),
            seed: 42,
            start_day: 0,
            end_day: 0,
            start_date: NaiveDate::from_ymd_opt(2019, 1, 1).unwrap_or_default(),
        }
    }
}

impl SimulationConfig {
    /// Parse a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML file.
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Cache capacity in bytes
    pub fn capacity_bytes(&self) -> u64 {
        mb_to_bytes(self.cache_capacity)
    }

    /// Bandwidth budget in bytes, `None` when back-pressure is disabled
    pub fn bandwidth_budget_bytes(&self) -> Option<u64> {
        match mb_to_bytes(self.daily_bandwidth_budget) {
            0 => None,
            bytes => Some(bytes),
        }
    }

    /// Number of days the run covers
    pub fn days(&self) -> u32 {
        self.end_day.saturating_sub(self.start_day) + 1
    }

    /// Check option ranges and cross-field constraints.
    pub fn validate(&self) -> Result<()> {
        if self.capacity_bytes() == 0 {
            return Err(Error::Config("cacheCapacity must be positive".to_string()));
        }
        if !(0.0..=100.0).contains(&self.high_watermark) || !(0.0..=100.0).contains(&self.low_watermark) {
            return Err(Error::Config("watermarks must be within 0-100 percent".to_string()));
        }
        if self.low_watermark > self.high_watermark {
            return Err(Error::Config(format!(
                "lowWatermark ({}) must not exceed highWatermark ({})",
                self.low_watermark, self.high_watermark
            )));
        }
        if self.time_span_admission == 0 || self.time_span_eviction == 0 {
            return Err(Error::Config("invalidation horizons must be positive".to_string()));
        }
        if self.invalidated_search_frequency == 0 {
            return Err(Error::Config("invalidatedSearchFrequency must be positive".to_string()));
        }
        if self.max_eviction_scans == 0 {
            return Err(Error::Config("maxEvictionScans must be positive".to_string()));
        }
        if self.experience_buffer_capacity == 0 {
            return Err(Error::Config("experienceBufferCapacity must be positive".to_string()));
        }
        if !(self.daily_bandwidth_budget >= 0.0) {
            return Err(Error::Config("dailyBandwidthBudget must not be negative".to_string()));
        }

        let exploration = &self.exploration;
        if !(0.0..=1.0).contains(&exploration.epsilon_min)
            || !(0.0..=1.0).contains(&exploration.epsilon_max)
            || exploration.epsilon_min > exploration.epsilon_max
        {
            return Err(Error::Config(
                "exploration requires 0 <= epsilonMin <= epsilonMax <= 1".to_string(),
            ));
        }
        if !(exploration.annealing_rate >= 0.0) {
            return Err(Error::Config("annealingRate must not be negative".to_string()));
        }

        if !(self.reward.size_upper_bound > self.reward.size_lower_bound) {
            return Err(Error::Config(
                "reward.sizeUpperBound must exceed reward.sizeLowerBound".to_string(),
            ));
        }
        if self.end_day < self.start_day {
            return Err(Error::Config(format!(
                "endDay ({}) is before startDay ({})",
                self.end_day, self.start_day
            )));
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
