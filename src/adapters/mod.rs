//! Infrastructure Adapters
//!
//! This module contains adapter implementations for the domain ports,
//! following the Port/Adapter (Hexagonal) architecture pattern.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │  PolicyProvider │ TraceSource │ ReportSink │ EventPublisher │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ ScoringPolicy │ SyntheticTrace │ ReadAheadSource          │ │
//! │  │ CsvReportWriter │ MemoryReportSink │ LoggingEventPublisher│ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use smartcache_sim::adapters::{CsvReportWriter, ScoringPolicy, SyntheticTrace};
//! use smartcache_sim::simulator::{Simulation, SimulationConfig};
//!
//! let trace = SyntheticTrace::new(Default::default())?;
//! let mut sim = Simulation::new(config, Box::new(ScoringPolicy::lru_k()), Box::new(trace))?;
//! let mut reports = CsvReportWriter::create("daily_report.csv", "occupancy.csv")?;
//! let summary = sim.run(&mut reports)?;
//! ```

mod csv_report;
mod event_publisher;
mod policy;
mod synthetic;
mod trace;

pub use csv_report::{CsvReportWriter, MemoryReportSink, DAILY_HEADER, OCCUPANCY_HEADER};
pub use event_publisher::{CompositeEventPublisher, InMemoryEventCollector, JsonLinesEventLog, LoggingEventPublisher};
pub use policy::{ConstantPolicy, ScoringPolicy};
pub use synthetic::{SyntheticTrace, SyntheticTraceConfig};
pub use trace::{InMemoryTraceSource, JsonLinesTraceSource, ReadAheadSource};
