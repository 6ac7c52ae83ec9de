//! Property-Based Tests for Cache Accounting
//!
//! # Test Properties
//!
//! 1. **Size Invariant**: `current_size` equals the registry sizes of the resident set
//! 2. **Bounded Occupancy**: occupancy never exceeds 100% after an admission
//! 3. **Round Trip**: admit then evict restores the previous size exactly
//! 4. **Purge Idempotence**: a second purge at the same tick removes nothing

#![cfg(test)]

use proptest::prelude::*;

use super::{CacheState, StatsRegistry};
use crate::domain::DataType;

// =============================================================================
// Property Strategies
// =============================================================================

#[derive(Debug, Clone)]
enum Op {
    Admit { file: usize, size: u64 },
    Evict { file: usize },
}

/// Operations over a small file universe so admits and evicts collide often.
fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..32, 1u64..400).prop_map(|(file, size)| Op::Admit { file, size }),
        (0usize..32).prop_map(|file| Op::Evict { file }),
    ]
}

fn ops_strategy() -> impl Strategy<Value = Vec<Op>> {
    prop::collection::vec(op_strategy(), 1..200)
}

// =============================================================================
// Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: every admit/evict sequence keeps the size invariant and the capacity bound.
    #[test]
    fn prop_size_invariant_holds(ops in ops_strategy(), capacity in 100u64..5000) {
        let mut registry = StatsRegistry::new();
        let mut cache = CacheState::new(capacity, 95.0, 0.0);

        for (tick, op) in ops.into_iter().enumerate() {
            match op {
                Op::Admit { file, size } => {
                    let (name, stats) =
                        registry.get_or_create(&format!("f{}", file), size, DataType::Data, tick as u64);
                    let size = stats.size();
                    cache.admit(name, size);
                    prop_assert!(cache.occupancy_percent() <= 100.0);
                }
                Op::Evict { file } => {
                    let filename = format!("f{}", file);
                    if let Some(stats) = registry.get(&filename) {
                        cache.evict(&filename, stats.size());
                    }
                }
            }
            prop_assert!(cache.is_consistent_with(&registry));
        }
    }

    /// Property: admitting then evicting a file leaves the size unchanged.
    #[test]
    fn prop_admit_evict_roundtrip(base in 0u64..10_000, size in 0u64..10_000) {
        let mut cache = CacheState::new(20_000, 95.0, 0.0);
        cache.admit("base".into(), base);
        let before = cache.current_size();

        prop_assert!(cache.admit("fresh".into(), size));
        prop_assert!(cache.evict("fresh", size));
        prop_assert_eq!(cache.current_size(), before);
    }

    /// Property: purge with no intervening ticks is idempotent.
    #[test]
    fn prop_purge_idempotent(
        ticks in prop::collection::vec(0u64..100_000, 1..100),
        threshold in 0u64..50_000,
    ) {
        let mut registry = StatsRegistry::new();
        let mut cache = CacheState::new(u64::MAX, 95.0, 0.0);
        for (i, tick) in ticks.iter().enumerate() {
            let (name, _) = registry.get_or_create(&format!("f{}", i), 1, DataType::Mc, *tick);
            if i % 3 == 0 {
                cache.admit(name, 1);
            }
        }

        let now = 100_000;
        registry.purge(threshold, now, cache.resident());
        let second = registry.purge(threshold, now, cache.resident());

        prop_assert_eq!(second, 0);
        prop_assert!(cache.is_consistent_with(&registry));
    }
}
