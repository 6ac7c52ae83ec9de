//! Feature Extraction
//!
//! Builds the vector handed to the policy provider. Admission and eviction
//! use the same layout so a single model can serve both modes.

use crate::cache::{bytes_to_mb, CacheState, FileStatistics};

/// Number of entries in a feature vector
pub const FEATURE_COUNT: usize = 9;

/// Positions within a feature vector.
pub mod index {
    pub const SIZE_MB: usize = 0;
    pub const HITS: usize = 1;
    pub const MISSES: usize = 2;
    pub const RECENCY: usize = 3;
    pub const DATA_TYPE: usize = 4;
    pub const IN_CAMPAIGN: usize = 5;
    pub const OCCUPANCY: usize = 6;
    pub const HIT_RATE: usize = 7;
    pub const AT_SITE: usize = 8;
}

/// Feature vector for `stats` at tick `now` given the current cache state.
pub fn extract(stats: &FileStatistics, now: u64, cache: &CacheState) -> Vec<f64> {
    let mut features = vec![0.0; FEATURE_COUNT];
    features[index::SIZE_MB] = bytes_to_mb(stats.size());
    features[index::HITS] = stats.hit_count() as f64;
    features[index::MISSES] = stats.miss_count() as f64;
    features[index::RECENCY] = stats.recency(now) as f64;
    features[index::DATA_TYPE] = stats.data_type().as_feature();
    features[index::IN_CAMPAIGN] = if stats.campaign().is_some() { 1.0 } else { 0.0 };
    features[index::OCCUPANCY] = cache.occupancy_percent();
    features[index::HIT_RATE] = cache.hit_rate() * 100.0;
    features[index::AT_SITE] = if stats.site().is_some() { 1.0 } else { 0.0 };
    features
}
