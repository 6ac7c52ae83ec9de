//! Experience Buffer
//!
//! Bounded FIFO of finalized `(features, action, reward)` records waiting to
//! be consumed by an external learner.

use std::collections::VecDeque;
use std::io::Write;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::Action;
use crate::error::{Error, Result};

/// Default number of records kept per buffer
pub const DEFAULT_EXPERIENCE_CAPACITY: usize = 1_000_000;

/// One finalized training sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub features: Vec<f64>,
    pub action: Action,
    pub reward: f64,
}

/// Capacity-bounded FIFO of experience records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperienceBuffer {
    capacity: usize,
    records: VecDeque<ExperienceRecord>,
    total_pushed: u64,
}

impl Default for ExperienceBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_EXPERIENCE_CAPACITY)
    }
}

impl ExperienceBuffer {
    /// Create a buffer holding at most `capacity` records.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            records: VecDeque::with_capacity(capacity.min(4096)),
            total_pushed: 0,
        }
    }

    /// Append a record, dropping the oldest one if the buffer is full.
    pub fn push(&mut self, record: ExperienceRecord) {
        if self.capacity == 0 {
            return;
        }
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
        self.total_pushed += 1;
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records pushed over the buffer's lifetime, including dropped ones
    pub fn total_pushed(&self) -> u64 {
        self.total_pushed
    }

    /// Records from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &ExperienceRecord> {
        self.records.iter()
    }

    /// Remove and return every record, oldest first.
    pub fn drain(&mut self) -> Vec<ExperienceRecord> {
        self.records.drain(..).collect()
    }

    /// Draw `n` records uniformly at random, with replacement.
    ///
    /// Fails with [`Error::InsufficientData`] when the buffer is empty so the
    /// learner can skip a training step.
    pub fn sample_batch<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<Vec<ExperienceRecord>> {
        if self.records.is_empty() {
            return Err(Error::InsufficientData { requested: n });
        }
        let len = self.records.len();
        Ok((0..n)
            .map(|_| self.records[rng.gen_range(0..len)].clone())
            .collect())
    }

    /// Write every record as one JSON object per line.
    pub fn write_jsonl<W: Write>(&self, mut writer: W) -> Result<usize> {
        for record in &self.records {
            serde_json::to_writer(&mut writer, record)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(self.records.len())
    }
}

// =============================================================================
// Tests
// =============================================================================
