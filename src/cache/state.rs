//! Cache State
//!
//! Capacity and occupancy accounting for the simulated cache, plus the
//! per-day traffic counters that feed the daily report.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::stats::{FileName, StatsRegistry};

/// Traffic counters accumulated over one simulated day.
///
/// Data volumes are in bytes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DailyCounters {
    pub written: u64,
    pub deleted: u64,
    pub read: u64,
    pub read_on_hit: u64,
    pub read_on_miss: u64,
    pub hits: u64,
    pub misses: u64,
    pub cpu_efficiency_sum: f64,
    pub cpu_efficiency_samples: u64,
    pub anomalous_samples: u64,
}

impl DailyCounters {
    pub fn requests(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of requests served from cache, 0 when there were none.
    pub fn hit_rate(&self) -> f64 {
        let total = self.requests();
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Hits per miss, 0 when there were no misses.
    pub fn hit_over_miss(&self) -> f64 {
        if self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / self.misses as f64
        }
    }

    /// Mean CPU efficiency of the accepted samples, 0 when there were none.
    pub fn cpu_efficiency(&self) -> f64 {
        if self.cpu_efficiency_samples == 0 {
            0.0
        } else {
            self.cpu_efficiency_sum / self.cpu_efficiency_samples as f64
        }
    }
}

/// Resident set and capacity accounting.
///
/// `current_size` only changes through [`CacheState::admit`] and
/// [`CacheState::evict`], which keeps it equal to the total size of the
/// resident files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheState {
    max_capacity: u64,
    current_size: u64,
    resident: BTreeSet<FileName>,
    /// Percent
    high_watermark: f64,
    /// Percent
    low_watermark: f64,
    daily: DailyCounters,
}

impl CacheState {
    /// Create an empty cache of `max_capacity` bytes with watermarks in percent.
    pub fn new(max_capacity: u64, high_watermark: f64, low_watermark: f64) -> Self {
        Self {
            max_capacity,
            current_size: 0,
            resident: BTreeSet::new(),
            high_watermark,
            low_watermark,
            daily: DailyCounters::default(),
        }
    }

    #[inline]
    pub fn contains(&self, filename: &str) -> bool {
        self.resident.contains(filename)
    }

    #[inline]
    pub fn max_capacity(&self) -> u64 {
        self.max_capacity
    }

    #[inline]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[inline]
    pub fn high_watermark(&self) -> f64 {
        self.high_watermark
    }

    #[inline]
    pub fn low_watermark(&self) -> f64 {
        self.low_watermark
    }

    pub fn resident(&self) -> &BTreeSet<FileName> {
        &self.resident
    }

    pub fn resident_len(&self) -> usize {
        self.resident.len()
    }

    /// Resident files in a stable order.
    pub fn resident_snapshot(&self) -> Vec<FileName> {
        self.resident.iter().cloned().collect()
    }

    pub fn occupancy_percent(&self) -> f64 {
        if self.max_capacity == 0 {
            return 100.0;
        }
        self.current_size as f64 / self.max_capacity as f64 * 100.0
    }

    pub fn above_high_watermark(&self) -> bool {
        self.occupancy_percent() > self.high_watermark
    }

    pub fn below_low_watermark(&self) -> bool {
        self.occupancy_percent() < self.low_watermark
    }

    /// Whether adding `size` bytes would exceed capacity.
    pub fn would_overflow(&self, size: u64) -> bool {
        self.current_size.saturating_add(size) > self.max_capacity
    }

    /// Add a file to the resident set.
    ///
    /// Returns false without touching any state if the file is already
    /// resident or does not fit.
    pub fn admit(&mut self, filename: FileName, size: u64) -> bool {
        if self.resident.contains(&filename) || self.would_overflow(size) {
            return false;
        }
        self.resident.insert(filename);
        self.current_size += size;
        self.daily.written += size;
        true
    }

    /// Remove a file from the resident set.
    ///
    /// Returns false if the file was not resident.
    pub fn evict(&mut self, filename: &str, size: u64) -> bool {
        if !self.resident.remove(filename) {
            return false;
        }
        debug_assert!(self.current_size >= size, "evicting more than is cached");
        self.current_size = self.current_size.saturating_sub(size);
        self.daily.deleted += size;
        true
    }

    /// Account for one request.
    pub fn record_request_outcome(&mut self, hit: bool, size: u64) {
        self.daily.read += size;
        if hit {
            self.daily.hits += 1;
            self.daily.read_on_hit += size;
        } else {
            self.daily.misses += 1;
            self.daily.read_on_miss += size;
        }
    }

    /// Add an accepted CPU efficiency sample (percent).
    pub fn record_cpu_efficiency(&mut self, efficiency: f64) {
        self.daily.cpu_efficiency_sum += efficiency;
        self.daily.cpu_efficiency_samples += 1;
    }

    pub fn record_anomalous_sample(&mut self) {
        self.daily.anomalous_samples += 1;
    }

    /// Daily hit rate, 0 before the first request of the day.
    pub fn hit_rate(&self) -> f64 {
        self.daily.hit_rate()
    }

    pub fn daily(&self) -> &DailyCounters {
        &self.daily
    }

    /// Zero the daily counters and return their previous values.
    ///
    /// Resident set and size carry over to the next day.
    pub fn reset_daily(&mut self) -> DailyCounters {
        std::mem::take(&mut self.daily)
    }

    /// Check that `current_size` matches the registry sizes of the resident files.
    pub fn is_consistent_with(&self, registry: &StatsRegistry) -> bool {
        self.resident.iter().all(|name| registry.contains(name.as_str()))
            && registry.total_size(&self.resident) == self.current_size
    }
}

// =============================================================================
// Tests
// =============================================================================
