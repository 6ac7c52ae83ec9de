//! Simulation Controller
//!
//! Replays the trace one step at a time through a two-state machine. Each
//! step either handles one request (Adding) or decides about one resident
//! file (Evicting).
//!
//! ```text
//!         occupancy > high, next request won't fit,
//!               or eviction interval elapsed
//!   ┌────────┐ ───────────────────────────────▶ ┌──────────┐ ──┐ scan done,
//!   │ Adding │                                  │ Evicting │   │ still >= high:
//!   └────────┘ ◀─────────────────────────────── └──────────┘ ◀─┘ re-snapshot
//!       │       scan done below high, or an
//!       │       eviction drops below low
//!       ▼ last day replayed
//!   ┌────────────┐
//!   │ EndOfTrace │
//!   └────────────┘
//! ```
//!
//! # Determinism
//!
//! Every random draw (exploration and scan shuffling) comes from a single
//! seeded `ChaCha8Rng` owned by the controller, and all iteration that can
//! influence decisions runs over ordered collections. Two runs with the same
//! configuration, trace and policy produce identical reports.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::checkpoint::Checkpoint;
use super::config::{SimulationConfig, BANDWIDTH_PRESSURE_THRESHOLD};
use super::report::{build_daily_report, date_of_day, SimulationSummary};
use crate::adapters::LoggingEventPublisher;
use crate::cache::{bytes_to_mb, mb_to_bytes, CacheState, FileName, StatsRegistry};
use crate::domain::{
    Action, DecisionMode, EventPublisher, EvictionTrigger, PolicyProvider, Protocol, ReportSink,
    SimulationEvent, TraceRecord, TraceSource,
};
use crate::error::{Error, Result};
use crate::learning::{features, EpsilonGreedy, ExperienceBuffer, PendingWindow};

// =============================================================================
// Controller State
// =============================================================================

/// Controller mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Replaying requests and admitting files
    Adding,
    /// Scanning the resident set for files to evict
    Evicting,
    /// The last configured day has been replayed
    EndOfTrace,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Phase::Adding => write!(f, "Adding"),
            Phase::Evicting => write!(f, "Evicting"),
            Phase::EndOfTrace => write!(f, "EndOfTrace"),
        }
    }
}

/// Position in the trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clock {
    /// Trace day being replayed
    pub day: u32,
    /// Next request within the day
    pub request_index: usize,
    /// Requests handled since the start of the run
    pub tick: u64,
}

/// Progress of the current eviction phase.
#[derive(Debug, Clone, Default)]
struct EvictionScan {
    order: Vec<FileName>,
    position: usize,
    scans: u32,
    evicted: u64,
}

impl EvictionScan {
    fn next_file(&mut self) -> Option<FileName> {
        let next = self.order.get(self.position).cloned()?;
        self.position += 1;
        Some(next)
    }
}

// =============================================================================
// Simulation
// =============================================================================

/// Trace replay controller.
///
/// Owns the statistics registry, the cache, both pending-decision windows and
/// both experience buffers. The policy and trace are injected through their
/// ports; reports are written to the sink passed to [`Simulation::step`] or
/// [`Simulation::run`].
pub struct Simulation {
    config: SimulationConfig,
    registry: StatsRegistry,
    cache: CacheState,
    admission_window: PendingWindow,
    eviction_window: PendingWindow,
    admission_buffer: ExperienceBuffer,
    eviction_buffer: ExperienceBuffer,
    explorer: EpsilonGreedy,
    rng: ChaCha8Rng,
    phase: Phase,
    clock: Clock,
    last_reported_day: Option<u32>,
    summary: SimulationSummary,

    /// Records of the current day, successful jobs only
    records: Vec<TraceRecord>,
    day_loaded: bool,
    scan: Option<EvictionScan>,

    policy: Box<dyn PolicyProvider>,
    trace: Box<dyn TraceSource>,
    events: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for Simulation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulation").finish_non_exhaustive()
    }
}

impl Simulation {
    /// Create a simulation positioned before the first request of `start_day`.
    pub fn new(
        config: SimulationConfig,
        policy: Box<dyn PolicyProvider>,
        trace: Box<dyn TraceSource>,
    ) -> Result<Self> {
        config.validate()?;

        let cache = CacheState::new(config.capacity_bytes(), config.high_watermark, config.low_watermark);
        Ok(Self {
            registry: StatsRegistry::new(),
            cache,
            admission_window: PendingWindow::new(DecisionMode::Admission, config.reward),
            eviction_window: PendingWindow::new(DecisionMode::Eviction, config.reward),
            admission_buffer: ExperienceBuffer::new(config.experience_buffer_capacity),
            eviction_buffer: ExperienceBuffer::new(config.experience_buffer_capacity),
            explorer: EpsilonGreedy::new(config.exploration),
            rng: ChaCha8Rng::seed_from_u64(config.seed),
            phase: Phase::Adding,
            clock: Clock {
                day: config.start_day,
                request_index: 0,
                tick: 0,
            },
            last_reported_day: None,
            summary: SimulationSummary::default(),
            records: Vec::new(),
            day_loaded: false,
            scan: None,
            policy,
            trace,
            events: Arc::new(LoggingEventPublisher::new()),
            config,
        })
    }

    /// Resume from a checkpoint taken at a day boundary.
    pub fn restore(
        checkpoint: Checkpoint,
        policy: Box<dyn PolicyProvider>,
        trace: Box<dyn TraceSource>,
    ) -> Result<Self> {
        checkpoint.validate()?;

        let Checkpoint {
            config,
            phase,
            clock,
            last_reported_day,
            registry,
            cache,
            admission_window,
            eviction_window,
            admission_buffer,
            eviction_buffer,
            explorer,
            rng,
            summary,
            ..
        } = checkpoint;

        info!(
            day = clock.day,
            tick = clock.tick,
            resident = cache.resident_len(),
            "Restored simulation from checkpoint"
        );

        Ok(Self {
            config,
            registry,
            cache,
            admission_window,
            eviction_window,
            admission_buffer,
            eviction_buffer,
            explorer,
            rng,
            phase,
            clock,
            last_reported_day,
            summary,
            records: Vec::new(),
            day_loaded: false,
            scan: None,
            policy,
            trace,
            events: Arc::new(LoggingEventPublisher::new()),
        })
    }

    /// Replace the event publisher.
    pub fn with_event_publisher(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = events;
        self
    }

    /// Snapshot the full state. Only possible between days.
    pub fn checkpoint(&self) -> Result<Checkpoint> {
        if !self.at_day_boundary() {
            return Err(Error::CheckpointUnavailable(format!(
                "day {} is in progress (request {})",
                self.clock.day, self.clock.request_index
            )));
        }

        Ok(Checkpoint {
            version: Checkpoint::VERSION,
            config: self.config.clone(),
            phase: self.phase,
            clock: self.clock,
            last_reported_day: self.last_reported_day,
            registry: self.registry.clone(),
            cache: self.cache.clone(),
            admission_window: self.admission_window.clone(),
            eviction_window: self.eviction_window.clone(),
            admission_buffer: self.admission_buffer.clone(),
            eviction_buffer: self.eviction_buffer.clone(),
            explorer: self.explorer.clone(),
            rng: self.rng.clone(),
            summary: self.summary.clone(),
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    pub fn is_finished(&self) -> bool {
        self.phase == Phase::EndOfTrace
    }

    /// True between days, when no partition is loaded and no scan is running.
    pub fn at_day_boundary(&self) -> bool {
        !self.day_loaded && self.scan.is_none()
    }

    pub fn registry(&self) -> &StatsRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &CacheState {
        &self.cache
    }

    pub fn window(&self, mode: DecisionMode) -> &PendingWindow {
        match mode {
            DecisionMode::Admission => &self.admission_window,
            DecisionMode::Eviction => &self.eviction_window,
        }
    }

    pub fn experience(&self, mode: DecisionMode) -> &ExperienceBuffer {
        match mode {
            DecisionMode::Admission => &self.admission_buffer,
            DecisionMode::Eviction => &self.eviction_buffer,
        }
    }

    /// Mutable access for a learner that drains experience between steps.
    pub fn experience_mut(&mut self, mode: DecisionMode) -> &mut ExperienceBuffer {
        match mode {
            DecisionMode::Admission => &mut self.admission_buffer,
            DecisionMode::Eviction => &mut self.eviction_buffer,
        }
    }

    /// Current exploration probability
    pub fn epsilon(&self) -> f64 {
        self.explorer.epsilon()
    }

    pub fn summary(&self) -> &SimulationSummary {
        &self.summary
    }

    // =========================================================================
    // Driving the simulation
    // =========================================================================

    /// Replay every remaining day.
    #[instrument(skip(self, reports), fields(seed = self.config.seed, policy = self.policy.name()))]
    pub fn run(&mut self, reports: &mut dyn ReportSink) -> Result<SimulationSummary> {
        info!(
            start_day = self.clock.day,
            end_day = self.config.end_day,
            capacity_mb = self.config.cache_capacity,
            "Starting simulation"
        );
        while !self.is_finished() {
            self.step(reports)?;
        }
        Ok(self.summary.clone())
    }

    /// Step until `day` is about to start or the trace ends.
    pub fn run_until_day(&mut self, day: u32, reports: &mut dyn ReportSink) -> Result<Phase> {
        while !self.is_finished() && !(self.at_day_boundary() && self.clock.day >= day) {
            self.step(reports)?;
        }
        Ok(self.phase)
    }

    /// Advance the state machine by one step and return the new phase.
    pub fn step(&mut self, reports: &mut dyn ReportSink) -> Result<Phase> {
        match self.phase {
            Phase::Adding => self.adding_step(reports)?,
            Phase::Evicting => self.eviction_step(reports)?,
            Phase::EndOfTrace => {}
        }
        Ok(self.phase)
    }

    // =========================================================================
    // Adding
    // =========================================================================

    fn adding_step(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        if !self.day_loaded {
            self.load_day()?;
        }

        let Some(record) = self.records.get(self.clock.request_index).cloned() else {
            return self.complete_day(reports);
        };
        self.clock.request_index += 1;

        self.process_request(&record)?;
        self.advance_tick();

        if let Some(trigger) = self.eviction_trigger() {
            self.begin_eviction(trigger, reports)?;
        }
        Ok(())
    }

    fn process_request(&mut self, record: &TraceRecord) -> Result<()> {
        let tick = self.clock.tick;
        let hit = self.cache.contains(&record.filename);

        let (name, stats) =
            self.registry
                .get_or_create(&record.filename, mb_to_bytes(record.size_mb), record.data_type, tick);
        stats.annotate(record.site.as_deref(), record.campaign.as_deref());
        let size = stats.size();
        // Taken before the access so recency is the reuse distance.
        let features = features::extract(stats, tick, &self.cache);
        stats.record_access(hit, tick);

        self.admission_window
            .try_finalize_on_revisit(name.as_str(), &mut self.admission_buffer);
        self.eviction_window
            .try_finalize_on_revisit(name.as_str(), &mut self.eviction_buffer);

        let mut action = if !hit && self.under_bandwidth_pressure() {
            self.summary.throttled_misses += 1;
            Action::Discard
        } else {
            self.choose(&features, DecisionMode::Admission)?
        };

        if action == Action::Keep && !hit {
            if !self.cache.would_overflow(size) && self.cache.admit(name.clone(), size) {
                self.summary.admitted_files += 1;
            } else {
                debug!(
                    file = %name,
                    size_mb = bytes_to_mb(size),
                    occupancy = self.cache.occupancy_percent(),
                    "Admission denied, file does not fit"
                );
                self.summary.forced_discards += 1;
                action = Action::Discard;
            }
        }

        self.cache.record_request_outcome(hit, size);
        if hit {
            self.summary.hits += 1;
        } else {
            self.summary.misses += 1;
        }
        self.record_cpu_efficiency(record, hit);

        self.admission_window.record(name, features, action, size);
        Ok(())
    }

    fn under_bandwidth_pressure(&self) -> bool {
        match self.config.bandwidth_budget_bytes() {
            Some(budget) => {
                self.cache.daily().read_on_miss as f64 / budget as f64 > BANDWIDTH_PRESSURE_THRESHOLD
            }
            None => false,
        }
    }

    fn record_cpu_efficiency(&mut self, record: &TraceRecord, hit: bool) {
        let raw = record.cpu_efficiency();
        if !(0.0..=100.0).contains(&raw) {
            debug!(
                file = %record.filename,
                cpu_time = record.cpu_time,
                wall_time = record.wall_time,
                "Anomalous CPU efficiency sample excluded"
            );
            self.cache.record_anomalous_sample();
            self.summary.anomalous_samples += 1;
            return;
        }

        let offset = self.config.cpu_efficiency_offset;
        let adjusted = match (hit, record.protocol) {
            (true, Protocol::Remote) => raw + offset,
            (false, Protocol::Local) => raw - offset,
            _ => raw,
        };
        self.cache.record_cpu_efficiency(adjusted);
    }

    fn advance_tick(&mut self) {
        self.clock.tick += 1;
        self.summary.ticks = self.clock.tick;
        self.admission_window.tick();
        self.eviction_window.tick();

        if self.clock.tick % self.config.invalidated_search_frequency == 0 {
            self.sweep_invalidated();
        }
    }

    fn sweep_invalidated(&mut self) {
        let tick = self.clock.tick;
        for mode in [DecisionMode::Admission, DecisionMode::Eviction] {
            let count = match mode {
                DecisionMode::Admission => self
                    .admission_window
                    .sweep_invalidated(self.config.time_span_admission, &mut self.admission_buffer),
                DecisionMode::Eviction => self
                    .eviction_window
                    .sweep_invalidated(self.config.time_span_eviction, &mut self.eviction_buffer),
            };
            if count > 0 {
                debug!(tick, %mode, count, "Invalidated pending decisions");
                self.publish(SimulationEvent::DecisionsInvalidated { tick, mode, count });
            }
        }
    }

    fn eviction_trigger(&self) -> Option<EvictionTrigger> {
        if self.cache.above_high_watermark() {
            return Some(EvictionTrigger::HighWatermark);
        }
        if self.next_request_would_overflow() {
            return Some(EvictionTrigger::CapacityLookahead);
        }
        let every = self.config.eviction_frequency;
        if every > 0 && self.clock.tick % every == 0 {
            return Some(EvictionTrigger::Scheduled);
        }
        None
    }

    fn next_request_would_overflow(&self) -> bool {
        let Some(next) = self.records.get(self.clock.request_index) else {
            return false;
        };
        if self.cache.contains(&next.filename) {
            return false;
        }
        let size = self
            .registry
            .get(&next.filename)
            .map(|stats| stats.size())
            .unwrap_or_else(|| mb_to_bytes(next.size_mb));
        self.cache.would_overflow(size)
    }

    // =========================================================================
    // Evicting
    // =========================================================================

    fn begin_eviction(&mut self, trigger: EvictionTrigger, reports: &mut dyn ReportSink) -> Result<()> {
        let occupancy = self.cache.occupancy_percent();
        debug!(
            tick = self.clock.tick,
            %trigger,
            occupancy,
            resident = self.cache.resident_len(),
            "Entering eviction phase"
        );
        self.publish(SimulationEvent::EvictionStarted {
            tick: self.clock.tick,
            day: self.clock.day,
            trigger,
            occupancy_percent: occupancy,
            resident_files: self.cache.resident_len(),
        });

        self.phase = Phase::Evicting;
        self.summary.eviction_phases += 1;
        self.scan = Some(EvictionScan::default());

        if self.cache.resident_len() == 0 {
            return self.finish_eviction(reports);
        }
        self.start_scan();
        Ok(())
    }

    /// Snapshot the resident set for the next pass.
    fn start_scan(&mut self) {
        let mut order = self.cache.resident_snapshot();
        if self.config.shuffle_eviction_scan {
            order.shuffle(&mut self.rng);
        }
        if let Some(scan) = self.scan.as_mut() {
            scan.order = order;
            scan.position = 0;
            scan.scans += 1;
        }
    }

    fn eviction_step(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        let Some(scan) = self.scan.as_mut() else {
            return Err(Error::Internal("eviction step without an active scan".to_string()));
        };
        let Some(name) = scan.next_file() else {
            return self.complete_scan(reports);
        };

        let Some(stats) = self.registry.get(name.as_str()) else {
            return Err(Error::Internal(format!("resident file {} has no statistics", name)));
        };
        let size = stats.size();
        let features = features::extract(stats, self.clock.tick, &self.cache);

        let action = self.choose(&features, DecisionMode::Eviction)?;
        let evicted = action == Action::Discard && self.cache.evict(name.as_str(), size);
        if evicted {
            self.summary.evicted_files += 1;
            if let Some(scan) = self.scan.as_mut() {
                scan.evicted += 1;
            }
        }
        // A repeated decision keeps the older entry so its counter keeps aging.
        let repeated = self
            .eviction_window
            .get(name.as_str())
            .map_or(false, |pending| pending.action == action);
        if !repeated {
            self.eviction_window.record(name, features, action, size);
        }

        if evicted && self.cache.below_low_watermark() {
            return self.finish_eviction(reports);
        }
        Ok(())
    }

    fn complete_scan(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        let occupancy = self.cache.occupancy_percent();
        if occupancy < self.config.high_watermark || self.cache.resident_len() == 0 {
            return self.finish_eviction(reports);
        }

        let scans = self.scan.as_ref().map_or(0, |scan| scan.scans);
        if scans >= self.config.max_eviction_scans {
            warn!(
                scans,
                occupancy,
                high_watermark = self.config.high_watermark,
                "Eviction scans exhausted above the high watermark, resuming admission"
            );
            return self.finish_eviction(reports);
        }

        debug!(occupancy, scans, "Scan finished above the high watermark, re-snapshotting");
        self.publish(SimulationEvent::EvictionRescan {
            tick: self.clock.tick,
            occupancy_percent: occupancy,
            resident_files: self.cache.resident_len(),
        });
        self.start_scan();
        Ok(())
    }

    fn finish_eviction(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        let occupancy = self.cache.occupancy_percent();
        reports.write_occupancy(occupancy)?;

        let (evicted_files, scans) = self
            .scan
            .take()
            .map_or((0, 0), |scan| (scan.evicted, scan.scans));
        debug!(tick = self.clock.tick, occupancy, evicted_files, scans, "Eviction phase completed");
        self.publish(SimulationEvent::EvictionCompleted {
            tick: self.clock.tick,
            day: self.clock.day,
            occupancy_percent: occupancy,
            evicted_files,
            scans,
        });

        self.phase = Phase::Adding;
        Ok(())
    }

    // =========================================================================
    // Day boundaries
    // =========================================================================

    fn load_day(&mut self) -> Result<()> {
        let day = self.clock.day;
        let records = self.trace.load_day(day)?;
        let total = records.len();
        self.records = records.into_iter().filter(|record| record.job_success).collect();
        self.clock.request_index = 0;
        self.day_loaded = true;

        info!(
            day,
            requests = self.records.len(),
            skipped = total - self.records.len(),
            "Loaded trace partition"
        );

        if self.purge_due(day) {
            self.purge();
        }
        Ok(())
    }

    fn purge_due(&self, day: u32) -> bool {
        let every = self.config.purge_frequency;
        let elapsed = day.saturating_sub(self.config.start_day);
        every > 0 && elapsed > 0 && elapsed % every == 0
    }

    fn purge(&mut self) {
        let removed = self
            .registry
            .purge(self.config.purge_delta, self.clock.tick, self.cache.resident());
        self.summary.purged_entries += removed as u64;

        info!(
            day = self.clock.day,
            removed,
            remaining = self.registry.len(),
            "Purged stale file statistics"
        );
        self.publish(SimulationEvent::RegistryPurged {
            tick: self.clock.tick,
            day: self.clock.day,
            removed,
            remaining: self.registry.len(),
        });
    }

    fn complete_day(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        let day = self.clock.day;
        let date = date_of_day(self.config.start_date, self.config.start_day, day);
        let counters = self.cache.reset_daily();
        let report = build_daily_report(day, date, &self.cache, &counters);

        if self.last_reported_day.map_or(true, |last| day > last) {
            reports.write_daily(&report)?;
            self.last_reported_day = Some(day);
        }

        info!(
            day,
            %date,
            requests = report.requests,
            hit_rate = report.hit_rate_percent,
            occupancy = self.cache.occupancy_percent(),
            epsilon = self.explorer.epsilon(),
            "Day completed"
        );
        self.publish(SimulationEvent::DayCompleted {
            day,
            date,
            requests: report.requests,
            hit_rate_percent: report.hit_rate_percent,
            occupancy_percent: self.cache.occupancy_percent(),
        });
        debug_assert!(self.cache.is_consistent_with(&self.registry));

        self.explorer.anneal();
        self.summary.days += 1;
        self.update_experience_counts();

        self.records = Vec::new();
        self.day_loaded = false;
        self.clock.request_index = 0;

        if day >= self.config.end_day {
            return self.finish(reports);
        }
        self.clock.day = day + 1;
        Ok(())
    }

    fn finish(&mut self, reports: &mut dyn ReportSink) -> Result<()> {
        let admission = self.admission_window.force_finalize_all(&mut self.admission_buffer);
        let eviction = self.eviction_window.force_finalize_all(&mut self.eviction_buffer);
        reports.flush()?;
        self.update_experience_counts();
        self.phase = Phase::EndOfTrace;

        info!(
            days = self.summary.days,
            ticks = self.summary.ticks,
            hit_rate = self.summary.hit_rate_percent(),
            flushed_admission = admission,
            flushed_eviction = eviction,
            "Simulation finished"
        );
        self.publish(SimulationEvent::SimulationFinished {
            tick: self.clock.tick,
            day: self.clock.day,
        });
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn choose(&mut self, features: &[f64], mode: DecisionMode) -> Result<Action> {
        let policy = &self.policy;
        self.explorer
            .choose(&mut self.rng, || policy.decide(features, mode))
    }

    fn update_experience_counts(&mut self) {
        self.summary.admission_experience = self.admission_buffer.total_pushed();
        self.summary.eviction_experience = self.eviction_buffer.total_pushed();
    }

    fn publish(&self, event: SimulationEvent) {
        if let Err(e) = self.events.publish(event) {
            warn!("Failed to publish simulation event: {}", e);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
