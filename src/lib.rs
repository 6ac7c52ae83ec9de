//! SmartCache Simulator - Learned Cache Admission and Eviction
//!
//! Replays a day-partitioned storage-access trace against a capacity-bounded
//! cache. Admission and eviction decisions come from a pluggable policy, and
//! every decision is later turned into a rewarded experience record once its
//! outcome is known, producing training data for an external learner.
//!
//! # Architecture
//!
//! ```text
//! TraceSource ──▶ Simulation ──▶ ReportSink
//!                 │   ▲    │
//!     decide()    ▼   │    ▼
//!          PolicyProvider  PendingWindow ──▶ ExperienceBuffer ──▶ learner
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Implementations of the domain ports
//! - [`cache`] - File statistics registry and cache state
//! - [`domain`] - Ports, value objects and events
//! - [`error`] - Error types
//! - [`learning`] - Pending decisions, rewards, experience, exploration
//! - [`simulator`] - Controller state machine, configuration, checkpoints

pub mod adapters;
pub mod cache;
pub mod domain;
pub mod error;
pub mod learning;
pub mod simulator;

// Re-export commonly used types
pub use cache::{CacheState, FileName, StatsRegistry};
pub use domain::{Action, DailyReport, DataType, DecisionMode, PolicyProvider, ReportSink, TraceRecord, TraceSource};
pub use error::{Error, Result};
pub use learning::{ExperienceBuffer, ExperienceRecord, PendingWindow};
pub use simulator::{Checkpoint, Phase, Simulation, SimulationConfig, SimulationSummary};
