//! Day-boundary checkpoints.
//!
//! A checkpoint holds everything needed to continue a run: registry, cache,
//! pending windows, experience buffers, the exploration schedule and the
//! random generator's exact position. Restoring it and replaying the rest of
//! the trace yields the same reports as an uninterrupted run, and days that
//! were already reported are not reported again.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::config::SimulationConfig;
use super::engine::{Clock, Phase};
use super::report::SimulationSummary;
use crate::cache::{CacheState, StatsRegistry};
use crate::error::{Error, Result};
use crate::learning::{EpsilonGreedy, ExperienceBuffer, PendingWindow};

/// Serialized simulation state at a day boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub version: u32,
    pub config: SimulationConfig,
    pub phase: Phase,
    pub clock: Clock,
    /// Last day whose report row has been written
    pub last_reported_day: Option<u32>,
    pub registry: StatsRegistry,
    pub cache: CacheState,
    pub admission_window: PendingWindow,
    pub eviction_window: PendingWindow,
    pub admission_buffer: ExperienceBuffer,
    pub eviction_buffer: ExperienceBuffer,
    pub explorer: EpsilonGreedy,
    pub rng: ChaCha8Rng,
    pub summary: SimulationSummary,
}

impl Checkpoint {
    /// Current format version
    pub const VERSION: u32 = 1;

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let checkpoint: Self = serde_json::from_reader(reader)?;
        checkpoint.validate()?;
        Ok(checkpoint)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        info!(path = %path.display(), day = self.clock.day, "Checkpoint written");
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_reader(BufReader::new(File::open(path)?))
    }

    /// Reject checkpoints that could not have come from a day boundary of a
    /// valid run.
    pub fn validate(&self) -> Result<()> {
        if self.version != Self::VERSION {
            return Err(Error::IncompatibleCheckpoint(format!(
                "format version {} (expected {})",
                self.version,
                Self::VERSION
            )));
        }
        self.config
            .validate()
            .map_err(|e| Error::IncompatibleCheckpoint(e.to_string()))?;

        if self.phase == Phase::Evicting || self.clock.request_index != 0 {
            return Err(Error::IncompatibleCheckpoint(
                "not taken at a day boundary".to_string(),
            ));
        }
        if self.clock.day < self.config.start_day || self.clock.day > self.config.end_day {
            return Err(Error::IncompatibleCheckpoint(format!(
                "day {} outside the configured range {}..={}",
                self.clock.day, self.config.start_day, self.config.end_day
            )));
        }
        if self.cache.max_capacity() != self.config.capacity_bytes() {
            return Err(Error::IncompatibleCheckpoint(
                "cache capacity does not match the configuration".to_string(),
            ));
        }
        if !self.cache.is_consistent_with(&self.registry) {
            return Err(Error::IncompatibleCheckpoint(
                "resident files do not match the statistics registry".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the checkpoint can continue a run configured with `config`.
    ///
    /// Everything but `end_day` must be identical, and `end_day` may only grow.
    pub fn matches(&self, config: &SimulationConfig) -> bool {
        let mut extended = self.config.clone();
        extended.end_day = config.end_day;
        extended == *config && config.end_day >= self.config.end_day
    }

    /// Move the last day of the run to `end_day`.
    ///
    /// A checkpoint of a finished run is reopened at the day after its last
    /// replayed day.
    pub fn extend_to(&mut self, end_day: u32) -> Result<()> {
        if end_day < self.config.end_day {
            return Err(Error::IncompatibleCheckpoint(format!(
                "cannot shorten the run from day {} to day {}",
                self.config.end_day, end_day
            )));
        }
        if end_day == self.config.end_day {
            return Ok(());
        }

        if self.phase == Phase::EndOfTrace {
            self.phase = Phase::Adding;
            self.clock.day = self.config.end_day + 1;
        }
        info!(from = self.config.end_day, to = end_day, "Extending checkpointed run");
        self.config.end_day = end_day;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
