//! Built-in Policy Providers
//!
//! Heuristic stand-ins for a trained model, used by the binary and in tests.

use crate::domain::{Action, DecisionMode, PolicyProvider};
use crate::error::{Error, Result};
use crate::learning::features::{index, FEATURE_COUNT};

/// Weighted recency/frequency/size scoring.
///
/// A higher score means a colder file: above `admission_threshold` a miss is
/// not admitted, above `eviction_threshold` a resident file is evicted.
#[derive(Debug, Clone)]
pub struct ScoringPolicy {
    /// Name of the policy
    pub name: String,
    /// Weight for recency in the score (0.0 - 1.0)
    pub recency_weight: f64,
    /// Weight for frequency in the score (0.0 - 1.0)
    pub frequency_weight: f64,
    /// Weight for size in the score (0.0 - 1.0)
    pub size_weight: f64,
    /// Recency in ticks that counts as one unit of age
    pub recency_scale: f64,
    pub admission_threshold: f64,
    pub eviction_threshold: f64,
}

impl Default for ScoringPolicy {
    fn default() -> Self {
        Self::lru_k()
    }
}

impl ScoringPolicy {
    /// Balances recency and frequency (default)
    pub fn lru_k() -> Self {
        Self {
            name: "LRU-K".to_string(),
            recency_weight: 0.5,
            frequency_weight: 0.5,
            size_weight: 0.0,
            recency_scale: 100_000.0,
            admission_threshold: 0.75,
            eviction_threshold: 0.5,
        }
    }

    /// Recency only
    pub fn lru() -> Self {
        Self {
            name: "LRU".to_string(),
            recency_weight: 1.0,
            frequency_weight: 0.0,
            size_weight: 0.0,
            ..Self::lru_k()
        }
    }

    /// Frequency only
    pub fn lfu() -> Self {
        Self {
            name: "LFU".to_string(),
            recency_weight: 0.0,
            frequency_weight: 1.0,
            size_weight: 0.0,
            ..Self::lru_k()
        }
    }

    /// Prefers dropping large files to free space faster
    pub fn size_aware() -> Self {
        Self {
            name: "Size-Aware".to_string(),
            recency_weight: 0.3,
            frequency_weight: 0.3,
            size_weight: 0.4,
            ..Self::lru_k()
        }
    }

    /// Look up a preset by name (`lru`, `lfu`, `lru-k`, `size-aware`).
    pub fn by_name(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "lru" => Ok(Self::lru()),
            "lfu" => Ok(Self::lfu()),
            "lru-k" | "lruk" => Ok(Self::lru_k()),
            "size-aware" | "size" => Ok(Self::size_aware()),
            other => Err(Error::Config(format!("unknown scoring policy '{}'", other))),
        }
    }

    /// Score a file; higher is colder.
    pub fn calculate_score(&self, recency_ticks: f64, requests: f64, size_mb: f64) -> f64 {
        let age_score = recency_ticks / self.recency_scale;
        let freq_score = 1.0 / (requests + 1.0);
        let size_score = size_mb.max(1.0).log2() / 13.0; // 8 GB scores 1.0

        self.recency_weight * age_score + self.frequency_weight * freq_score + self.size_weight * size_score
    }
}

impl PolicyProvider for ScoringPolicy {
    fn decide(&self, features: &[f64], mode: DecisionMode) -> Result<Action> {
        if features.len() < FEATURE_COUNT {
            return Err(Error::Policy(format!(
                "expected {} features, got {}",
                FEATURE_COUNT,
                features.len()
            )));
        }

        let score = self.calculate_score(
            features[index::RECENCY],
            features[index::HITS] + features[index::MISSES],
            features[index::SIZE_MB],
        );
        let threshold = match mode {
            DecisionMode::Admission => self.admission_threshold,
            DecisionMode::Eviction => self.eviction_threshold,
        };
        Ok(if score > threshold {
            Action::Discard
        } else {
            Action::Keep
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Always answers the same action per mode.
#[derive(Debug, Clone, Copy)]
pub struct ConstantPolicy {
    admission: Action,
    eviction: Action,
}

impl ConstantPolicy {
    pub fn new(admission: Action, eviction: Action) -> Self {
        Self { admission, eviction }
    }

    /// Admit every miss, never evict.
    pub fn keep_all() -> Self {
        Self::new(Action::Keep, Action::Keep)
    }
}

impl PolicyProvider for ConstantPolicy {
    fn decide(&self, _features: &[f64], mode: DecisionMode) -> Result<Action> {
        Ok(match mode {
            DecisionMode::Admission => self.admission,
            DecisionMode::Eviction => self.eviction,
        })
    }

    fn name(&self) -> &str {
        "constant"
    }
}
