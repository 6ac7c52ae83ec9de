//! Simulation Events
//!
//! Immutable records of notable transitions in a simulation run: eviction
//! phases, day rollovers and maintenance passes. Events carry the simulated
//! clock (tick and day) rather than wall-clock time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ports::DecisionMode;

/// Why the controller left admission mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EvictionTrigger {
    /// Occupancy rose above the high watermark
    HighWatermark,
    /// The next request would not fit
    CapacityLookahead,
    /// Fixed tick interval elapsed
    Scheduled,
}

impl std::fmt::Display for EvictionTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EvictionTrigger::HighWatermark => write!(f, "high-watermark"),
            EvictionTrigger::CapacityLookahead => write!(f, "capacity-lookahead"),
            EvictionTrigger::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Event emitted by the simulation controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SimulationEvent {
    // =========================================================================
    // Eviction Phase Events
    // =========================================================================
    /// Admission stopped and an eviction scan began.
    EvictionStarted {
        tick: u64,
        day: u32,
        trigger: EvictionTrigger,
        occupancy_percent: f64,
        resident_files: usize,
    },

    /// A scan finished above the high watermark and a new one began.
    EvictionRescan {
        tick: u64,
        occupancy_percent: f64,
        resident_files: usize,
    },

    /// The controller returned to admission mode.
    EvictionCompleted {
        tick: u64,
        day: u32,
        occupancy_percent: f64,
        evicted_files: u64,
        scans: u32,
    },

    // =========================================================================
    // Maintenance Events
    // =========================================================================
    /// Stale statistics were dropped from the registry.
    RegistryPurged {
        tick: u64,
        day: u32,
        removed: usize,
        remaining: usize,
    },

    /// Pending decisions passed their horizon and were finalized.
    DecisionsInvalidated {
        tick: u64,
        mode: DecisionMode,
        count: usize,
    },

    // =========================================================================
    // Clock Events
    // =========================================================================
    /// All requests of a day have been replayed.
    DayCompleted {
        day: u32,
        date: NaiveDate,
        requests: u64,
        hit_rate_percent: f64,
        occupancy_percent: f64,
    },

    /// The last configured day has been replayed.
    SimulationFinished { tick: u64, day: u32 },
}

impl SimulationEvent {
    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SimulationEvent::EvictionStarted { .. } => "EvictionStarted",
            SimulationEvent::EvictionRescan { .. } => "EvictionRescan",
            SimulationEvent::EvictionCompleted { .. } => "EvictionCompleted",
            SimulationEvent::RegistryPurged { .. } => "RegistryPurged",
            SimulationEvent::DecisionsInvalidated { .. } => "DecisionsInvalidated",
            SimulationEvent::DayCompleted { .. } => "DayCompleted",
            SimulationEvent::SimulationFinished { .. } => "SimulationFinished",
        }
    }
}
