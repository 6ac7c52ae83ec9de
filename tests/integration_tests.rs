//! SmartCache Simulator Integration Tests
//!
//! End-to-end scenarios driven through the public API:
//! - Eviction hysteresis between the watermarks
//! - Delayed rewards: revisits, invalidation sweeps, forced discards
//! - Registry maintenance
//! - Reproducibility and checkpoint/restore
//! - Trace sources (JSON lines on disk, synthetic with read-ahead)

use std::sync::Arc;

use smartcache_sim::adapters::{
    ConstantPolicy, InMemoryEventCollector, InMemoryTraceSource, JsonLinesTraceSource, MemoryReportSink,
    ReadAheadSource, ScoringPolicy, SyntheticTrace, SyntheticTraceConfig,
};
use smartcache_sim::domain::{
    Action, DataType, DecisionMode, PolicyProvider, SimulationEvent, TraceRecord, TraceSource,
};
use smartcache_sim::learning::{features, ExplorationConfig};
use smartcache_sim::simulator::{Checkpoint, Phase, Simulation, SimulationConfig};
use smartcache_sim::{Error, Result};

fn base_config() -> SimulationConfig {
    SimulationConfig {
        cache_capacity: 1000.0,
        high_watermark: 100.0,
        low_watermark: 0.0,
        exploration: ExplorationConfig::greedy(),
        shuffle_eviction_scan: false,
        purge_frequency: 0,
        ..Default::default()
    }
}

fn record(name: &str, size_mb: f64) -> TraceRecord {
    TraceRecord::new(name, size_mb, DataType::Data)
}

fn fillers(prefix: &str, count: usize, size_mb: f64) -> Vec<TraceRecord> {
    (0..count)
        .map(|i| record(&format!("{}-{:06}", prefix, i), size_mb))
        .collect()
}

fn simulation(
    config: SimulationConfig,
    policy: impl PolicyProvider + 'static,
    days: Vec<Vec<TraceRecord>>,
) -> Simulation {
    let mut trace = InMemoryTraceSource::new();
    for (offset, records) in days.into_iter().enumerate() {
        trace.insert_day(config.start_day + offset as u32, records);
    }
    Simulation::new(config, Box::new(policy), Box::new(trace)).unwrap()
}

/// Admits files of at least `threshold_mb`, never evicts.
struct SizeThresholdPolicy {
    threshold_mb: f64,
}

impl PolicyProvider for SizeThresholdPolicy {
    fn decide(&self, input: &[f64], mode: DecisionMode) -> Result<Action> {
        Ok(match mode {
            DecisionMode::Admission if input[features::index::SIZE_MB] >= self.threshold_mb => Action::Keep,
            DecisionMode::Admission => Action::Discard,
            DecisionMode::Eviction => Action::Keep,
        })
    }

    fn name(&self) -> &str {
        "size-threshold"
    }
}

// =============================================================================
// Eviction Hysteresis
// =============================================================================

mod eviction_tests {
    use super::*;

    /// Eight 100 MB files and one 120 MB file fill the cache to 92%.
    fn hysteresis() -> (SimulationConfig, Vec<TraceRecord>) {
        let config = SimulationConfig {
            high_watermark: 90.0,
            low_watermark: 50.0,
            ..base_config()
        };
        let mut records: Vec<TraceRecord> = (0..8).map(|i| record(&format!("f{}", i), 100.0)).collect();
        records.push(record("f8", 120.0));
        (config, records)
    }

    #[test]
    fn test_eviction_stops_below_low_watermark() {
        let (config, records) = hysteresis();
        let collector = Arc::new(InMemoryEventCollector::new());
        let mut sim = simulation(config, ConstantPolicy::new(Action::Keep, Action::Discard), vec![records])
            .with_event_publisher(collector.clone());
        let mut reports = MemoryReportSink::new();

        for _ in 0..9 {
            sim.step(&mut reports).unwrap();
        }
        assert_eq!(sim.phase(), Phase::Evicting);
        assert_eq!(sim.cache().occupancy_percent(), 92.0);

        let summary = sim.run(&mut reports).unwrap();

        // f0..f4 go; removing f4 takes occupancy from 52% to 42%.
        assert_eq!(reports.occupancy(), &[42.0]);
        assert_eq!(summary.evicted_files, 5);
        assert_eq!(sim.cache().resident_len(), 4);
        assert!(!sim.cache().contains("f4"));
        assert!(sim.cache().contains("f5"));
        assert_eq!(collector.count_by_type("EvictionStarted"), 1);
        assert_eq!(collector.count_by_type("EvictionRescan"), 0);
    }

    #[test]
    fn test_rescans_are_capped() {
        let (config, records) = hysteresis();
        let collector = Arc::new(InMemoryEventCollector::new());
        let mut sim = simulation(config, ConstantPolicy::keep_all(), vec![records])
            .with_event_publisher(collector.clone());
        let mut reports = MemoryReportSink::new();

        while sim.phase() != Phase::Evicting {
            sim.step(&mut reports).unwrap();
        }
        while sim.phase() == Phase::Evicting {
            sim.step(&mut reports).unwrap();
        }
        // Rescans leave the first decision of each file pending and unrewarded.
        assert_eq!(sim.clock().tick, 9);
        assert!(sim.experience(DecisionMode::Eviction).is_empty());
        let window = sim.window(DecisionMode::Eviction);
        assert_eq!(window.len(), 9);
        assert!(window.get("f0").map_or(false, |p| p.counter == 0 && p.action == Action::Keep));

        let summary = sim.run(&mut reports).unwrap();

        assert_eq!(collector.count_by_type("EvictionRescan"), 3);
        assert_eq!(reports.occupancy(), &[92.0]);
        assert_eq!(summary.evicted_files, 0);
        // One decision per file, closed when the run ends.
        assert_eq!(summary.eviction_experience, 9);
        assert!(sim
            .experience(DecisionMode::Eviction)
            .iter()
            .all(|r| r.action == Action::Keep && r.reward < 0.0));

        let completed = collector.events_of_type("EvictionCompleted");
        assert_eq!(completed.len(), 1);
        match &completed[0] {
            SimulationEvent::EvictionCompleted { scans, evicted_files, .. } => {
                assert_eq!(*scans, 4);
                assert_eq!(*evicted_files, 0);
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn test_revisit_rewards_kept_file() {
        let (config, mut records) = hysteresis();
        records.push(record("f0", 100.0));
        let mut sim = simulation(config, ConstantPolicy::keep_all(), vec![records]);
        let mut reports = MemoryReportSink::new();

        while sim.clock().tick < 10 {
            sim.step(&mut reports).unwrap();
        }
        let buffer = sim.experience(DecisionMode::Eviction);
        assert_eq!(buffer.len(), 1);
        let kept = buffer.iter().next().unwrap();
        assert_eq!(kept.action, Action::Keep);
        assert_eq!(kept.reward, 100.0 / 4096.0);

        let summary = sim.run(&mut reports).unwrap();
        assert_eq!(summary.eviction_experience, 10);
        let positive = sim
            .experience(DecisionMode::Eviction)
            .iter()
            .filter(|r| r.reward > 0.0)
            .count();
        assert_eq!(positive, 1);
    }

    #[test]
    fn test_revisit_penalizes_evicted_file() {
        let (config, mut records) = hysteresis();
        records.push(record("f0", 100.0));
        let mut sim = simulation(config, ConstantPolicy::new(Action::Keep, Action::Discard), vec![records]);
        let mut reports = MemoryReportSink::new();
        let summary = sim.run(&mut reports).unwrap();

        // f0 was evicted and then missed; f1..f4 never came back.
        assert!(sim.cache().contains("f0"));
        assert_eq!(summary.eviction_experience, 5);
        let rewards: Vec<f64> = sim
            .experience(DecisionMode::Eviction)
            .iter()
            .map(|r| r.reward)
            .collect();
        assert_eq!(rewards[0], -100.0 / 4096.0);
        assert!(rewards[1..].iter().all(|reward| *reward > 0.0));
        assert!(sim
            .experience(DecisionMode::Eviction)
            .iter()
            .all(|r| r.action == Action::Discard));
    }

    #[test]
    fn test_kept_files_expire_after_eviction_horizon() {
        let (config, mut records) = hysteresis();
        let config = SimulationConfig {
            time_span_eviction: 5,
            invalidated_search_frequency: 1,
            ..config
        };
        records.extend(fillers("late", 6, 1.0));
        let mut sim = simulation(config, ConstantPolicy::keep_all(), vec![records]);
        let mut reports = MemoryReportSink::new();

        while sim.clock().tick < 14 {
            sim.step(&mut reports).unwrap();
        }
        assert!(sim.experience(DecisionMode::Eviction).is_empty());
        assert_eq!(sim.window(DecisionMode::Eviction).get("f0").map(|p| p.counter), Some(5));

        while sim.clock().tick < 15 {
            sim.step(&mut reports).unwrap();
        }
        let expired = sim.experience(DecisionMode::Eviction);
        assert_eq!(expired.len(), 9);
        assert!(expired.iter().all(|r| r.action == Action::Keep && r.reward < 0.0));
        assert!(!sim.window(DecisionMode::Eviction).contains("f0"));
        assert!(sim.window(DecisionMode::Eviction).contains("late-000000"));
    }

    #[test]
    fn test_empty_resident_set_finishes_immediately() {
        let config = SimulationConfig {
            eviction_frequency: 1,
            ..base_config()
        };
        let mut sim = simulation(
            config,
            ConstantPolicy::new(Action::Discard, Action::Discard),
            vec![fillers("cold", 5, 10.0)],
        );
        let mut reports = MemoryReportSink::new();
        let summary = sim.run(&mut reports).unwrap();

        assert_eq!(summary.eviction_phases, 5);
        assert_eq!(reports.occupancy(), &[0.0; 5]);
        assert!(sim.window(DecisionMode::Eviction).is_empty());
        assert_eq!(summary.eviction_experience, 0);
    }
}

// =============================================================================
// Delayed Rewards
// =============================================================================

mod reward_tests {
    use super::*;

    #[test]
    fn test_invalidation_sweep_after_horizon() {
        let config = SimulationConfig {
            cache_capacity: 100_000.0,
            time_span_admission: 1000,
            invalidated_search_frequency: 1,
            ..base_config()
        };
        let mut records = fillers("filler", 10, 1.0);
        records.push(record("X", 200.0));
        records.extend(fillers("later", 1100, 1.0));
        let mut sim = simulation(config, ConstantPolicy::keep_all(), vec![records]);
        let mut reports = MemoryReportSink::new();

        while sim.clock().tick < 1010 {
            sim.step(&mut reports).unwrap();
        }
        let pending = sim.window(DecisionMode::Admission).get("X").unwrap();
        assert_eq!(pending.counter, 1000);

        sim.step(&mut reports).unwrap();
        assert_eq!(sim.clock().tick, 1011);
        assert!(!sim.window(DecisionMode::Admission).contains("X"));

        // X is the only decision old enough at this sweep.
        let last = sim.experience(DecisionMode::Admission).iter().last().unwrap();
        assert_eq!(last.features[features::index::SIZE_MB], 200.0);
        assert_eq!(last.action, Action::Keep);
        assert!(last.reward < 0.0);
    }

    #[test]
    fn test_revisit_rewards_keep() {
        let config = SimulationConfig {
            cache_capacity: 100_000.0,
            ..base_config()
        };
        let mut sim = simulation(
            config,
            ConstantPolicy::keep_all(),
            vec![vec![record("a", 2048.0), record("b", 10.0), record("a", 2048.0)]],
        );
        let mut reports = MemoryReportSink::new();
        for _ in 0..3 {
            sim.step(&mut reports).unwrap();
        }

        let buffer = sim.experience(DecisionMode::Admission);
        assert_eq!(buffer.len(), 1);
        let first = buffer.iter().next().unwrap();
        assert_eq!(first.action, Action::Keep);
        assert_eq!(first.reward, 0.5);
        // The second request of "a" is pending again.
        assert!(sim.window(DecisionMode::Admission).contains("a"));
    }

    #[test]
    fn test_overflow_is_recorded_as_discard() {
        let mut sim = simulation(
            base_config(),
            ConstantPolicy::keep_all(),
            vec![vec![record("A", 600.0), record("B", 500.0), record("B", 500.0)]],
        );
        let mut reports = MemoryReportSink::new();
        let summary = sim.run(&mut reports).unwrap();

        assert_eq!(summary.forced_discards, 2);
        assert_eq!(summary.eviction_phases, 2);
        assert_eq!(reports.occupancy(), &[60.0, 60.0]);
        assert!(!sim.cache().contains("B"));

        // B came back after being dropped: the forced discard is penalized.
        let penalized: Vec<_> = sim
            .experience(DecisionMode::Admission)
            .iter()
            .filter(|r| r.features[features::index::SIZE_MB] == 500.0 && r.action == Action::Discard)
            .collect();
        assert_eq!(penalized.len(), 2);
        assert!(penalized[0].reward < 0.0);
    }

    #[test]
    fn test_experience_buffer_is_bounded() {
        let config = SimulationConfig {
            cache_capacity: 100_000.0,
            experience_buffer_capacity: 1000,
            ..base_config()
        };
        let mut sim = simulation(config, ConstantPolicy::keep_all(), vec![fillers("file", 1500, 1.0)]);
        let summary = sim.run(&mut MemoryReportSink::new()).unwrap();

        let buffer = sim.experience(DecisionMode::Admission);
        assert_eq!(buffer.len(), 1000);
        assert_eq!(buffer.capacity(), 1000);
        assert_eq!(buffer.total_pushed(), 1500);
        assert_eq!(summary.admission_experience, 1500);
    }
}

// =============================================================================
// Registry Maintenance
// =============================================================================

mod purge_tests {
    use super::*;

    #[test]
    fn test_purge_keeps_resident_and_recent_files() {
        let config = SimulationConfig {
            cache_capacity: 100_000.0,
            purge_delta: 50_000,
            purge_frequency: 1,
            end_day: 1,
            ..base_config()
        };
        let mut day0 = vec![record("big", 1000.0), record("small", 1.0)];
        day0.extend(fillers("filler", 60_000, 1.0));

        let collector = Arc::new(InMemoryEventCollector::new());
        let mut sim = simulation(config, SizeThresholdPolicy { threshold_mb: 500.0 }, vec![day0, vec![]])
            .with_event_publisher(collector.clone());
        let summary = sim.run(&mut MemoryReportSink::new()).unwrap();

        assert!(sim.cache().contains("big"));
        assert!(sim.registry().contains("big"));
        assert!(!sim.registry().contains("small"));
        assert!(!sim.registry().contains("filler-009999"));
        assert!(sim.registry().contains("filler-010000"));

        // Purge ran at tick 60002: "small" and fillers 0..9999 are stale.
        assert_eq!(summary.purged_entries, 10_001);
        assert_eq!(sim.registry().len(), 50_001);
        let purged = collector.events_of_type("RegistryPurged");
        assert_eq!(purged.len(), 1);
        assert_eq!(
            purged[0],
            SimulationEvent::RegistryPurged {
                tick: 60_002,
                day: 1,
                removed: 10_001,
                remaining: 50_001,
            }
        );
    }
}

// =============================================================================
// Reproducibility
// =============================================================================

mod reproducibility_tests {
    use super::*;

    fn workload() -> SyntheticTraceConfig {
        SyntheticTraceConfig {
            files: 500,
            requests_per_day: 2_000,
            drift_per_day: 25,
            ..Default::default()
        }
    }

    fn config() -> SimulationConfig {
        SimulationConfig {
            cache_capacity: 100_000.0,
            high_watermark: 90.0,
            low_watermark: 70.0,
            end_day: 2,
            ..Default::default()
        }
    }

    fn run(trace: Box<dyn TraceSource>) -> (MemoryReportSink, Simulation) {
        let mut sim = Simulation::new(config(), Box::new(ScoringPolicy::lru_k()), trace).unwrap();
        let mut reports = MemoryReportSink::new();
        sim.run(&mut reports).unwrap();
        (reports, sim)
    }

    #[test]
    fn test_same_seed_same_reports() {
        let (first, first_sim) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));
        let (second, second_sim) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));

        assert_eq!(first.daily().len(), 3);
        assert_eq!(first.daily(), second.daily());
        assert_eq!(first.occupancy(), second.occupancy());
        assert_eq!(first_sim.summary(), second_sim.summary());
        assert!(first_sim.summary().eviction_phases > 0);
    }

    #[test]
    fn test_read_ahead_matches_direct_loading() {
        let (direct, _) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));
        let source = ReadAheadSource::spawn(SyntheticTrace::new(workload()).unwrap(), Some(2)).unwrap();
        let (prefetched, sim) = run(Box::new(source));

        assert!(sim.is_finished());
        assert_eq!(direct.daily(), prefetched.daily());
        assert_eq!(direct.occupancy(), prefetched.occupancy());
    }

    #[test]
    fn test_scoring_policy_smoke_run() {
        let (reports, sim) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));
        let summary = sim.summary();

        assert_eq!(summary.days, 3);
        assert_eq!(summary.hits + summary.misses, summary.ticks);
        assert!(summary.ticks > 5_000);
        assert!(summary.hits > 0);
        assert!(sim.cache().occupancy_percent() <= 100.0);
        assert!(sim.cache().is_consistent_with(sim.registry()));
        for day in reports.daily() {
            assert!(day.hit_rate_percent >= 0.0 && day.hit_rate_percent <= 100.0);
        }
        assert!(sim.window(DecisionMode::Admission).is_empty());
        assert!(sim.window(DecisionMode::Eviction).is_empty());
    }

    #[test]
    fn test_checkpoint_restore_matches_uninterrupted_run() {
        let (uninterrupted, full) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));

        let mut first = Simulation::new(
            config(),
            Box::new(ScoringPolicy::lru_k()),
            Box::new(SyntheticTrace::new(workload()).unwrap()),
        )
        .unwrap();
        let mut reports = MemoryReportSink::new();
        first.run_until_day(1, &mut reports).unwrap();

        let mut bytes = Vec::new();
        first.checkpoint().unwrap().to_writer(&mut bytes).unwrap();
        let checkpoint = Checkpoint::from_reader(bytes.as_slice()).unwrap();
        assert!(checkpoint.matches(&config()));
        assert_eq!(checkpoint.clock.day, 1);

        let mut resumed = Simulation::restore(
            checkpoint,
            Box::new(ScoringPolicy::lru_k()),
            Box::new(SyntheticTrace::new(workload()).unwrap()),
        )
        .unwrap();
        let mut rest = MemoryReportSink::new();
        resumed.run(&mut rest).unwrap();

        let resumed_days: Vec<u32> = rest.daily().iter().map(|r| r.day).collect();
        assert_eq!(resumed_days, vec![1, 2]);

        reports.extend(rest);
        assert_eq!(reports.daily(), uninterrupted.daily());
        assert_eq!(reports.occupancy(), uninterrupted.occupancy());
        assert_eq!(resumed.summary(), full.summary());
    }

    #[test]
    fn test_finished_run_extends_on_resume() {
        let (uninterrupted, _) = run(Box::new(SyntheticTrace::new(workload()).unwrap()));

        let short = SimulationConfig { end_day: 0, ..config() };
        let mut first = Simulation::new(
            short,
            Box::new(ScoringPolicy::lru_k()),
            Box::new(SyntheticTrace::new(workload()).unwrap()),
        )
        .unwrap();
        let mut reports = MemoryReportSink::new();
        first.run(&mut reports).unwrap();
        assert!(first.is_finished());

        let mut bytes = Vec::new();
        first.checkpoint().unwrap().to_writer(&mut bytes).unwrap();
        let mut checkpoint = Checkpoint::from_reader(bytes.as_slice()).unwrap();
        assert!(checkpoint.matches(&config()));
        checkpoint.extend_to(config().end_day).unwrap();

        let mut resumed = Simulation::restore(
            checkpoint,
            Box::new(ScoringPolicy::lru_k()),
            Box::new(SyntheticTrace::new(workload()).unwrap()),
        )
        .unwrap();
        assert!(!resumed.is_finished());
        let mut rest = MemoryReportSink::new();
        resumed.run(&mut rest).unwrap();

        let resumed_days: Vec<u32> = rest.daily().iter().map(|r| r.day).collect();
        assert_eq!(resumed_days, vec![1, 2]);
        reports.extend(rest);
        assert_eq!(reports.daily(), uninterrupted.daily());
        assert_eq!(reports.occupancy(), uninterrupted.occupancy());
    }

    #[test]
    fn test_checkpoint_mid_day_is_rejected() {
        let mut sim = simulation(base_config(), ConstantPolicy::keep_all(), vec![fillers("f", 3, 1.0)]);
        sim.step(&mut MemoryReportSink::new()).unwrap();
        assert!(matches!(sim.checkpoint(), Err(Error::CheckpointUnavailable(_))));
    }
}

// =============================================================================
// Trace Sources
// =============================================================================

mod trace_tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_day_is_fatal() {
        let dir = std::env::temp_dir().join(format!("smartcache-it-missing-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let mut file = std::fs::File::create(dir.join("0.jsonl")).unwrap();
        for r in [record("a", 10.0), record("b", 20.0), record("a", 10.0)] {
            writeln!(file, "{}", serde_json::to_string(&r).unwrap()).unwrap();
        }
        drop(file);

        let config = SimulationConfig {
            end_day: 1,
            ..base_config()
        };
        let mut sim = Simulation::new(
            config,
            Box::new(ConstantPolicy::keep_all()),
            Box::new(JsonLinesTraceSource::new(&dir)),
        )
        .unwrap();
        let mut reports = MemoryReportSink::new();
        let result = sim.run(&mut reports);
        std::fs::remove_dir_all(&dir).ok();

        assert!(matches!(result, Err(Error::MissingTraceDay { day: 1 })));
        assert_eq!(reports.daily().len(), 1);
        assert_eq!(reports.daily()[0].requests, 3);
        assert_eq!(sim.summary().hits, 1);
        assert!(!sim.is_finished());
    }
}
