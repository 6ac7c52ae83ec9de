//! File Statistics Registry
//!
//! Owns the per-file metadata for every file seen in the trace. The cache
//! state only holds [`FileName`] handles into this registry, so a file's size
//! and counters exist in exactly one place.

use std::borrow::Borrow;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::DataType;

/// Shared, cheaply clonable file name.
///
/// Cloning bumps a reference count; the registry and the resident set share
/// the same allocation for a given file.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileName(Arc<str>);

impl FileName {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Borrow<str> for FileName {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for FileName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for FileName {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

/// Statistics tracked for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStatistics {
    /// Size in bytes, fixed at first sighting
    size: u64,
    hit_count: u64,
    miss_count: u64,
    last_request_tick: u64,
    data_type: DataType,
    site: Option<Arc<str>>,
    campaign: Option<Arc<str>>,
}

impl FileStatistics {
    /// Create statistics for a file first seen at `tick`.
    pub fn new(size: u64, data_type: DataType, tick: u64) -> Self {
        Self {
            size,
            hit_count: 0,
            miss_count: 0,
            last_request_tick: tick,
            data_type,
            site: None,
            campaign: None,
        }
    }

    #[inline]
    pub fn size(&self) -> u64 {
        self.size
    }

    #[inline]
    pub fn hit_count(&self) -> u64 {
        self.hit_count
    }

    #[inline]
    pub fn miss_count(&self) -> u64 {
        self.miss_count
    }

    /// Total number of requests seen for this file
    #[inline]
    pub fn requests(&self) -> u64 {
        self.hit_count + self.miss_count
    }

    #[inline]
    pub fn last_request_tick(&self) -> u64 {
        self.last_request_tick
    }

    #[inline]
    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Ticks elapsed since the last request.
    #[inline]
    pub fn recency(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_request_tick)
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    pub fn campaign(&self) -> Option<&str> {
        self.campaign.as_deref()
    }

    /// Attach extended features if they are not already known.
    pub fn annotate(&mut self, site: Option<&str>, campaign: Option<&str>) {
        if self.site.is_none() {
            self.site = site.map(Arc::from);
        }
        if self.campaign.is_none() {
            self.campaign = campaign.map(Arc::from);
        }
    }

    /// Record a request outcome at `tick`.
    pub fn record_access(&mut self, hit: bool, tick: u64) {
        if hit {
            self.hit_count += 1;
        } else {
            self.miss_count += 1;
        }
        self.last_request_tick = tick;
    }
}

/// Registry of file statistics keyed by file name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StatsRegistry {
    entries: HashMap<FileName, FileStatistics>,
}

impl StatsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the entry for `filename`, creating it if this is the first sighting.
    ///
    /// The returned [`FileName`] is the registry's own handle, so callers can
    /// store it without duplicating the string.
    pub fn get_or_create(
        &mut self,
        filename: &str,
        size: u64,
        data_type: DataType,
        tick: u64,
    ) -> (FileName, &mut FileStatistics) {
        let key = self
            .entries
            .get_key_value(filename)
            .map(|(k, _)| k.clone())
            .unwrap_or_else(|| FileName::new(filename));

        let stats = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| FileStatistics::new(size, data_type, tick));
        (key, stats)
    }

    pub fn get(&self, filename: &str) -> Option<&FileStatistics> {
        self.entries.get(filename)
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.entries.contains_key(filename)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of the sizes of the given files.
    pub fn total_size<'a>(&self, names: impl IntoIterator<Item = &'a FileName>) -> u64 {
        names
            .into_iter()
            .filter_map(|name| self.entries.get(name.as_str()))
            .map(FileStatistics::size)
            .sum()
    }

    /// Drop every entry whose recency exceeds `stale_threshold`, except those in `exclude`.
    ///
    /// Runs over the whole registry; call it from scheduled maintenance only.
    pub fn purge(&mut self, stale_threshold: u64, now: u64, exclude: &BTreeSet<FileName>) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|name, stats| stats.recency(now) <= stale_threshold || exclude.contains(name));
        before - self.entries.len()
    }
}

// =============================================================================
// Tests
// =============================================================================
