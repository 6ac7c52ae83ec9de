//! Simulated Cache
//!
//! Bookkeeping for a capacity-bounded cache replayed over an access log.
//! Nothing is actually stored: the cache tracks which files would be resident
//! and how much space they would take.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StatsRegistry (owner)          CacheState                   │
//! │  ┌────────────────────────┐     ┌─────────────────────────┐  │
//! │  │ FileName → FileStats   │◀────│ resident: {FileName}    │  │
//! │  │ size, hits, misses,    │     │ current_size, capacity  │  │
//! │  │ last tick, data type   │     │ watermarks, daily stats │  │
//! │  └────────────────────────┘     └─────────────────────────┘  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sizes are tracked in whole bytes so that admitting and evicting a file
//! restores the previous occupancy exactly.

mod state;
mod stats;

#[cfg(test)]
mod proptest;

pub use state::{CacheState, DailyCounters};
pub use stats::{FileName, FileStatistics, StatsRegistry};

/// Bytes per megabyte used when converting trace sizes
pub const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// Convert a size in MB to whole bytes.
///
/// Negative and non-finite inputs map to zero.
pub fn mb_to_bytes(mb: f64) -> u64 {
    if !mb.is_finite() || mb <= 0.0 {
        return 0;
    }
    (mb * BYTES_PER_MB).round() as u64
}

/// Convert a byte count to MB.
pub fn bytes_to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

// =============================================================================
// Tests
// =============================================================================
