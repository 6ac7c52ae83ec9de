//! Error types for the cache replay simulator

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while configuring or running a simulation
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML configuration parse error
    #[error("Failed to parse YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // =========================================================================
    // Trace Errors
    // =========================================================================
    /// The trace source has no partition for the requested day
    #[error("Trace partition missing for day {day}")]
    MissingTraceDay { day: u32 },

    /// The trace source failed while loading a partition
    #[error("Trace source failed for day {day}: {reason}")]
    TraceSource { day: u32, reason: String },

    // =========================================================================
    // Learning Errors
    // =========================================================================
    /// Not enough experience to draw a training batch
    #[error("Insufficient data: requested {requested} samples from an empty experience buffer")]
    InsufficientData { requested: usize },

    /// The policy provider failed to produce a decision
    #[error("Policy provider error: {0}")]
    Policy(String),

    // =========================================================================
    // Checkpoint Errors
    // =========================================================================
    /// A checkpoint does not match the current configuration
    #[error("Incompatible checkpoint: {0}")]
    IncompatibleCheckpoint(String),

    /// A checkpoint was requested somewhere other than a day boundary
    #[error("Checkpoint unavailable: {0}")]
    CheckpointUnavailable(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
