//! Domain Layer
//!
//! Core value objects and the ports the simulation engine is written against.
//!
//! - **Ports** (`ports.rs`) - Trait abstractions for the policy, trace, report
//!   and event collaborators
//! - **Events** (`events.rs`) - Simulation events for logging and inspection
//!
//! # Usage
//!
//! ```ignore
//! use smartcache_sim::domain::{Action, DecisionMode, PolicyProvider};
//!
//! struct AlwaysKeep;
//!
//! impl PolicyProvider for AlwaysKeep {
//!     fn decide(&self, _features: &[f64], _mode: DecisionMode) -> Result<Action> {
//!         Ok(Action::Keep)
//!     }
//! }
//! ```

pub mod events;
pub mod ports;

pub use events::{EvictionTrigger, SimulationEvent};
pub use ports::{
    // Value objects
    Action,
    DailyReport,
    DataType,
    DecisionMode,
    Protocol,
    TraceRecord,
    // Port traits
    EventPublisher,
    PolicyProvider,
    ReportSink,
    TraceSource,
};
