//! Delayed-Reward Learning Signals
//!
//! Everything the engine needs to turn decisions into training data for an
//! external learner. The learner itself is out of scope; it consumes the
//! experience buffers.
//!
//! - [`PendingWindow`] - decisions awaiting an outcome
//! - [`ExperienceBuffer`] - bounded FIFO of finalized records
//! - [`EpsilonGreedy`] - annealed exploration around the policy
//! - [`features`] - feature vector layout

mod buffer;
mod exploration;
pub mod features;
mod window;

pub use buffer::{ExperienceBuffer, ExperienceRecord, DEFAULT_EXPERIENCE_CAPACITY};
pub use exploration::{AnnealingKind, EpsilonGreedy, ExplorationConfig};
pub use window::{reward, Outcome, PendingDecision, PendingWindow, RewardConfig};
