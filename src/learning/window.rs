//! Pending-Decision Window
//!
//! Delayed credit assignment: a decision taken now is only judged once the
//! file is requested again, or once it has gone unrequested for longer than
//! the mode's invalidation horizon.
//!
//! ```text
//!   record(f) ──▶ pending{counter=0} ──tick()──▶ counter += 1
//!                      │                              │
//!            f requested again               counter > horizon
//!                      ▼                              ▼
//!               Outcome::Revisited           Outcome::Invalidated
//!                      └──────────┬───────────────────┘
//!                                 ▼
//!                  reward → ExperienceBuffer, entry removed
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::buffer::{ExperienceBuffer, ExperienceRecord};
use crate::cache::{bytes_to_mb, FileName};
use crate::domain::{Action, DecisionMode};

/// Size weighting of rewards.
///
/// Bounds are in MB. Files at or below the lower bound earn no reward, files
/// at or above the upper bound earn the full reward, linear in between.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RewardConfig {
    pub size_lower_bound: f64,
    pub size_upper_bound: f64,
}

impl Default for RewardConfig {
    fn default() -> Self {
        Self {
            size_lower_bound: 0.0,
            size_upper_bound: 4096.0,
        }
    }
}

impl RewardConfig {
    /// Reward magnitude in `[0, 1]` for a file of `size_mb`.
    pub fn coefficient(&self, size_mb: f64) -> f64 {
        if size_mb <= self.size_lower_bound {
            return 0.0;
        }
        if size_mb >= self.size_upper_bound {
            return 1.0;
        }
        let span = self.size_upper_bound - self.size_lower_bound;
        ((size_mb - self.size_lower_bound) / span).clamp(0.0, 1.0)
    }
}

/// How a pending decision was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The file was requested again within the horizon
    Revisited,
    /// The horizon passed, or the window was flushed, without a request
    Invalidated,
}

/// Signed reward for an action given how it turned out.
///
/// Keeping a file that comes back, or dropping one that does not, is
/// rewarded; the other two combinations are penalized. The same table
/// applies to eviction with keep-in-cache/evict.
pub fn reward(action: Action, outcome: Outcome, coefficient: f64) -> f64 {
    match (action, outcome) {
        (Action::Keep, Outcome::Revisited) | (Action::Discard, Outcome::Invalidated) => coefficient,
        (Action::Keep, Outcome::Invalidated) | (Action::Discard, Outcome::Revisited) => -coefficient,
    }
}

/// A decision waiting for its reward.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDecision {
    /// Ticks since the decision was taken
    pub counter: u64,
    pub features: Vec<f64>,
    pub action: Action,
    /// File size in bytes
    pub size: u64,
}

/// In-flight decisions of one mode, at most one per file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingWindow {
    mode: DecisionMode,
    reward: RewardConfig,
    entries: BTreeMap<FileName, PendingDecision>,
    finalized: u64,
}

impl PendingWindow {
    pub fn new(mode: DecisionMode, reward: RewardConfig) -> Self {
        Self {
            mode,
            reward,
            entries: BTreeMap::new(),
            finalized: 0,
        }
    }

    pub fn mode(&self) -> DecisionMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn get(&self, filename: &str) -> Option<&PendingDecision> {
        self.entries.get(filename)
    }

    /// Decisions finalized over the window's lifetime
    pub fn finalized(&self) -> u64 {
        self.finalized
    }

    /// Start tracking a decision with `counter = 0`.
    ///
    /// Returns the entry it replaced, which is dropped without a reward.
    pub fn record(
        &mut self,
        filename: FileName,
        features: Vec<f64>,
        action: Action,
        size: u64,
    ) -> Option<PendingDecision> {
        self.entries.insert(
            filename,
            PendingDecision {
                counter: 0,
                features,
                action,
                size,
            },
        )
    }

    /// Age every live decision by one tick.
    pub fn tick(&mut self) {
        for entry in self.entries.values_mut() {
            entry.counter += 1;
        }
    }

    /// Resolve the decision for `filename` as revisited, if there is one.
    ///
    /// Returns the reward that was assigned.
    pub fn try_finalize_on_revisit(&mut self, filename: &str, buffer: &mut ExperienceBuffer) -> Option<f64> {
        let entry = self.entries.remove(filename)?;
        Some(self.finalize(entry, Outcome::Revisited, buffer))
    }

    /// Resolve every decision older than `horizon` ticks as invalidated.
    pub fn sweep_invalidated(&mut self, horizon: u64, buffer: &mut ExperienceBuffer) -> usize {
        let expired: Vec<FileName> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.counter > horizon)
            .map(|(name, _)| name.clone())
            .collect();

        for name in &expired {
            if let Some(entry) = self.entries.remove(name.as_str()) {
                self.finalize(entry, Outcome::Invalidated, buffer);
            }
        }
        expired.len()
    }

    /// Resolve every remaining decision as invalidated.
    pub fn force_finalize_all(&mut self, buffer: &mut ExperienceBuffer) -> usize {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for (_, entry) in entries {
            self.finalize(entry, Outcome::Invalidated, buffer);
        }
        count
    }

    fn finalize(&mut self, entry: PendingDecision, outcome: Outcome, buffer: &mut ExperienceBuffer) -> f64 {
        let coefficient = self.reward.coefficient(bytes_to_mb(entry.size));
        let value = reward(entry.action, outcome, coefficient);
        trace!(
            mode = %self.mode,
            action = ?entry.action,
            ?outcome,
            counter = entry.counter,
            reward = value,
            "Finalized pending decision"
        );
        buffer.push(ExperienceRecord {
            features: entry.features,
            action: entry.action,
            reward: value,
        });
        self.finalized += 1;
        value
    }
}

// =============================================================================
// Tests
// =============================================================================
