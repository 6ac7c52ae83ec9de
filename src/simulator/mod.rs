//! Trace Replay Simulator
//!
//! [`Simulation`] drives the cache, registry and learning signals through a
//! day-partitioned trace. Configuration lives in [`SimulationConfig`]; state
//! can be saved between days with [`Checkpoint`].

mod checkpoint;
mod config;
mod engine;
mod report;

pub use checkpoint::Checkpoint;
pub use config::{SimulationConfig, BANDWIDTH_PRESSURE_THRESHOLD};
pub use engine::{Clock, Phase, Simulation};
pub use report::{build_daily_report, date_of_day, SimulationSummary};
