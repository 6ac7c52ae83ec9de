//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the abstractions the simulation engine depends on.
//! Adapters implement these traits to plug in a concrete decision function,
//! trace reader or report destination.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │ PolicyProvider │ TraceSource │ ReportSink │ Events  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │ ScoringPolicy │ SyntheticTrace │ CsvReportWriter    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::events::SimulationEvent;
use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// Kind of data a file holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// Detector data
    Data,
    /// Monte Carlo simulation output
    Mc,
}

impl DataType {
    /// Numeric encoding used in feature vectors.
    pub fn as_feature(&self) -> f64 {
        match self {
            DataType::Data => 0.0,
            DataType::Mc => 1.0,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Data => write!(f, "data"),
            DataType::Mc => write!(f, "mc"),
        }
    }
}

/// Access protocol a job used to read its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Read from site-local storage
    Local,
    /// Streamed over the wide-area network
    Remote,
}

/// One request of a day-partitioned trace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceRecord {
    pub filename: String,
    pub size_mb: f64,
    pub data_type: DataType,
    pub cpu_time: f64,
    pub wall_time: f64,
    pub protocol: Protocol,
    pub request_epoch: i64,
    pub job_success: bool,
    /// Site that ran the job (extended feature)
    #[serde(default)]
    pub site: Option<String>,
    /// Production campaign the file belongs to (extended feature)
    #[serde(default)]
    pub campaign: Option<String>,
}

impl TraceRecord {
    /// Create a successful, fully efficient local request.
    pub fn new(filename: impl Into<String>, size_mb: f64, data_type: DataType) -> Self {
        Self {
            filename: filename.into(),
            size_mb,
            data_type,
            cpu_time: 1.0,
            wall_time: 1.0,
            protocol: Protocol::Local,
            request_epoch: 0,
            job_success: true,
            site: None,
            campaign: None,
        }
    }

    pub fn with_timing(mut self, cpu_time: f64, wall_time: f64) -> Self {
        self.cpu_time = cpu_time;
        self.wall_time = wall_time;
        self
    }

    pub fn with_protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_epoch(mut self, request_epoch: i64) -> Self {
        self.request_epoch = request_epoch;
        self
    }

    pub fn with_campaign(mut self, campaign: impl Into<String>) -> Self {
        self.campaign = Some(campaign.into());
        self
    }

    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Raw CPU efficiency in percent (`cpu_time / wall_time * 100`).
    ///
    /// Not clamped: callers decide what an out-of-range value means.
    pub fn cpu_efficiency(&self) -> f64 {
        self.cpu_time / self.wall_time * 100.0
    }
}

/// Binary decision returned by a policy.
///
/// In admission mode `Keep` means "store the file", in eviction mode it means
/// "leave it in the cache"; `Discard` means "skip" and "evict" respectively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Discard = 0,
    Keep = 1,
}

impl Action {
    /// Decode a policy output index.
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Action::Discard),
            1 => Some(Action::Keep),
            _ => None,
        }
    }

    pub fn as_index(&self) -> usize {
        *self as usize
    }
}

/// Which of the two decision problems is being asked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionMode {
    Admission,
    Eviction,
}

impl std::fmt::Display for DecisionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecisionMode::Admission => write!(f, "admission"),
            DecisionMode::Eviction => write!(f, "eviction"),
        }
    }
}

/// Statistics for one simulated day.
///
/// Data volumes are in MB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyReport {
    pub day: u32,
    pub date: NaiveDate,
    /// Cache occupancy in MB at the end of the day
    pub size: f64,
    pub hit_rate_percent: f64,
    pub hit_over_miss_percent: f64,
    pub written_data: f64,
    pub read_data: f64,
    pub read_on_hit_data: f64,
    pub read_on_miss_data: f64,
    pub deleted_data: f64,
    pub cpu_efficiency: f64,
    /// Reserved
    pub cpu_efficiency_upper_bound: Option<f64>,
    /// Reserved
    pub cpu_efficiency_lower_bound: Option<f64>,
    pub requests: u64,
    pub anomalous_samples: u64,
}

// =============================================================================
// Policy Port
// =============================================================================

/// Port for the external decision function.
///
/// The engine treats the provider as stateless: the same features and mode
/// may be asked any number of times. Exploration is layered on top by the
/// controller.
///
/// # Example
///
/// ```ignore
/// struct NeuralPolicy { /* ... */ }
///
/// impl PolicyProvider for NeuralPolicy {
///     fn decide(&self, features: &[f64], mode: DecisionMode) -> Result<Action> {
///         let scores = self.forward(features, mode)?;
///         Ok(if scores[1] > scores[0] { Action::Keep } else { Action::Discard })
///     }
/// }
/// ```
pub trait PolicyProvider: Send + Sync {
    /// Choose an action for the given feature vector.
    fn decide(&self, features: &[f64], mode: DecisionMode) -> Result<Action>;

    /// Human-readable name used in logs.
    fn name(&self) -> &str {
        "policy"
    }
}

// =============================================================================
// Trace Port
// =============================================================================

/// Port for day-partitioned request traces.
///
/// Partitions must be returned in request order. A missing day is an error:
/// the simulation cannot continue without it.
pub trait TraceSource: Send {
    /// Load every request of `day`.
    fn load_day(&mut self, day: u32) -> Result<Vec<TraceRecord>>;
}

// =============================================================================
// Report Port
// =============================================================================

/// Port for the daily statistics and occupancy trace outputs.
pub trait ReportSink {
    /// Append the row for a completed day.
    fn write_daily(&mut self, report: &DailyReport) -> Result<()>;

    /// Append the occupancy reached at the end of an eviction phase.
    fn write_occupancy(&mut self, occupancy_percent: f64) -> Result<()>;

    /// Flush buffered output.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Event Publisher Port
// =============================================================================

/// Port for publishing simulation events.
pub trait EventPublisher: Send + Sync {
    /// Publish a simulation event.
    fn publish(&self, event: SimulationEvent) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
