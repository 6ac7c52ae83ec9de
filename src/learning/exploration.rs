//! Epsilon-Greedy Exploration
//!
//! Wraps the policy provider: with probability `epsilon` a uniformly random
//! action is taken instead of the policy's choice. Epsilon is annealed once
//! per simulated day, linearly or exponentially, down to a floor.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::Action;
use crate::error::Result;

/// Shape of the annealing schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnealingKind {
    /// `epsilon = max - rate * steps`
    Linear,
    /// `epsilon = max * exp(-rate * steps)`
    Exponential,
}

/// Exploration configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ExplorationConfig {
    /// Starting exploration probability
    pub epsilon_max: f64,
    /// Floor the schedule never goes below
    pub epsilon_min: f64,
    /// Decay per annealing step
    pub annealing_rate: f64,
    pub annealing: AnnealingKind,
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self {
            epsilon_max: 1.0,
            epsilon_min: 0.1,
            annealing_rate: 0.05,
            annealing: AnnealingKind::Exponential,
        }
    }
}

impl ExplorationConfig {
    /// No exploration at all: the policy always decides.
    pub fn greedy() -> Self {
        Self {
            epsilon_max: 0.0,
            epsilon_min: 0.0,
            annealing_rate: 0.0,
            annealing: AnnealingKind::Linear,
        }
    }
}

/// Annealed epsilon-greedy action selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpsilonGreedy {
    config: ExplorationConfig,
    epsilon: f64,
    steps: u64,
}

impl EpsilonGreedy {
    pub fn new(config: ExplorationConfig) -> Self {
        Self {
            epsilon: config.epsilon_max.max(config.epsilon_min),
            config,
            steps: 0,
        }
    }

    /// Current exploration probability
    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Annealing steps taken so far
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Advance the schedule by one step.
    pub fn anneal(&mut self) {
        self.steps += 1;
        let steps = self.steps as f64;
        let ExplorationConfig {
            epsilon_max,
            epsilon_min,
            annealing_rate,
            annealing,
        } = self.config;

        let next = match annealing {
            AnnealingKind::Linear => epsilon_max - annealing_rate * steps,
            AnnealingKind::Exponential => epsilon_max * (-annealing_rate * steps).exp(),
        };
        self.epsilon = next.max(epsilon_min);
    }

    /// Pick an action: random with probability epsilon, otherwise `exploit()`.
    ///
    /// `exploit` is only invoked on the greedy branch.
    pub fn choose<R, F>(&self, rng: &mut R, exploit: F) -> Result<Action>
    where
        R: Rng + ?Sized,
        F: FnOnce() -> Result<Action>,
    {
        if self.epsilon > 0.0 && rng.gen::<f64>() < self.epsilon {
            return Ok(if rng.gen::<bool>() {
                Action::Keep
            } else {
                Action::Discard
            });
        }
        exploit()
    }
}

// =============================================================================
// Tests
// =============================================================================
