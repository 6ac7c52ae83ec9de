//! SmartCache Simulator CLI
//!
//! Replays a trace (synthetic, or JSON lines on disk) against the simulated
//! cache with a built-in heuristic policy and writes the daily report, the
//! occupancy trace and optionally the collected experience.
//!
//! ```text
//! ┌─────────────┐    ┌────────────┐    ┌──────────────────────┐
//! │ TraceSource │───▶│ Simulation │───▶│ daily_report.csv     │
//! │ (read-ahead)│    │            │───▶│ occupancy.csv        │
//! └─────────────┘    └────────────┘───▶│ *_experience.jsonl   │
//!                                      └──────────────────────┘
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smartcache_sim::adapters::{
    CompositeEventPublisher, CsvReportWriter, JsonLinesEventLog, JsonLinesTraceSource, LoggingEventPublisher,
    ReadAheadSource, ScoringPolicy, SyntheticTrace, SyntheticTraceConfig,
};
use smartcache_sim::domain::{DecisionMode, TraceSource};
use smartcache_sim::error::{Error, Result};
use smartcache_sim::simulator::{Checkpoint, Simulation, SimulationConfig};

// =============================================================================
// CLI Arguments
// =============================================================================

/// SmartCache Simulator - replay a storage trace against a learned cache policy
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Simulation configuration (YAML); defaults are used when omitted
    #[arg(long, env = "SMARTCACHE_CONFIG")]
    config: Option<PathBuf>,

    /// Directory of `<day>.jsonl` trace partitions; a synthetic trace is used when omitted
    #[arg(long, env = "SMARTCACHE_TRACE_DIR")]
    trace_dir: Option<PathBuf>,

    /// Synthetic workload description (YAML)
    #[arg(long, env = "SMARTCACHE_SYNTHETIC")]
    synthetic: Option<PathBuf>,

    /// Load the next day's partition on a background thread
    #[arg(long, env = "SMARTCACHE_READ_AHEAD")]
    read_ahead: bool,

    /// Built-in policy (lru, lfu, lru-k, size-aware)
    #[arg(long, env = "SMARTCACHE_POLICY", default_value = "lru-k")]
    policy: String,

    /// Override the configured seed
    #[arg(long, env = "SMARTCACHE_SEED")]
    seed: Option<u64>,

    /// Override the configured last day
    #[arg(long, env = "SMARTCACHE_END_DAY")]
    end_day: Option<u32>,

    /// Output directory
    #[arg(long, env = "SMARTCACHE_OUTPUT_DIR", default_value = "results")]
    output_dir: PathBuf,

    /// Also export both experience buffers as JSON lines
    #[arg(long, env = "SMARTCACHE_EXPORT_EXPERIENCE")]
    export_experience: bool,

    /// Resume from a checkpoint file
    #[arg(long)]
    resume: Option<PathBuf>,

    /// Write a checkpoint here when the run ends; resume it later with a larger end day
    #[arg(long)]
    checkpoint: Option<PathBuf>,

    /// Also record every simulation event as JSON lines in this file
    #[arg(long, env = "SMARTCACHE_EVENT_LOG")]
    event_log: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let args = Args::parse();
    init_logging(&args);

    if let Err(e) = run(&args) {
        error!("Simulation failed: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_yaml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(end_day) = args.end_day {
        config.end_day = end_day;
    }
    config.validate()?;

    info!("Starting SmartCache simulator");
    info!("  Capacity: {} MB", config.cache_capacity);
    info!("  Watermarks: {}% / {}%", config.high_watermark, config.low_watermark);
    info!("  Days: {}..={}", config.start_day, config.end_day);
    info!("  Seed: {}", config.seed);

    let policy = ScoringPolicy::by_name(&args.policy)?;
    info!("  Policy: {}", policy.name);
    let trace = build_trace(args, &config)?;

    let mut simulation = match &args.resume {
        Some(path) => {
            let mut checkpoint = Checkpoint::load(path)?;
            if !checkpoint.matches(&config) {
                return Err(Error::IncompatibleCheckpoint(format!(
                    "{} was written with a different configuration",
                    path.display()
                )));
            }
            checkpoint.extend_to(config.end_day)?;
            Simulation::restore(checkpoint, Box::new(policy), trace)?
        }
        None => Simulation::new(config, Box::new(policy), trace)?,
    };

    let event_log = match &args.event_log {
        Some(path) => {
            let log = Arc::new(JsonLinesEventLog::create(path)?);
            let events = CompositeEventPublisher::new()
                .with_publisher(LoggingEventPublisher::new())
                .with_publisher(log.clone());
            simulation = simulation.with_event_publisher(Arc::new(events));
            Some(log)
        }
        None => None,
    };

    std::fs::create_dir_all(&args.output_dir)?;
    let daily_path = args.output_dir.join("daily_report.csv");
    let occupancy_path = args.output_dir.join("occupancy.csv");
    let mut reports = if args.resume.is_some() {
        CsvReportWriter::append(daily_path, occupancy_path)?
    } else {
        CsvReportWriter::create(daily_path, occupancy_path)?
    };

    let summary = simulation.run(&mut reports)?;
    if let Some(log) = &event_log {
        log.flush()?;
    }
    info!(
        "Replayed {} days, {} requests, hit rate {:.2}%",
        summary.days,
        summary.ticks,
        summary.hit_rate_percent()
    );
    info!(
        "Experience collected: {} admission, {} eviction",
        summary.admission_experience, summary.eviction_experience
    );

    if args.export_experience {
        export_experience(&simulation, &args.output_dir)?;
    }
    if let Some(path) = &args.checkpoint {
        simulation.checkpoint()?.save(path)?;
    }

    let mut summary_file = BufWriter::new(File::create(args.output_dir.join("summary.json"))?);
    serde_json::to_writer_pretty(&mut summary_file, &summary)?;
    summary_file.flush()?;
    info!("Results written to {}", args.output_dir.display());
    Ok(())
}

fn build_trace(args: &Args, config: &SimulationConfig) -> Result<Box<dyn TraceSource>> {
    let source: Box<dyn TraceSource> = match &args.trace_dir {
        Some(dir) => {
            info!("  Trace: {}", dir.display());
            let source = JsonLinesTraceSource::new(dir);
            if args.read_ahead {
                Box::new(ReadAheadSource::spawn(source, Some(config.end_day))?)
            } else {
                Box::new(source)
            }
        }
        None => {
            let synthetic: SyntheticTraceConfig = match &args.synthetic {
                Some(path) => serde_yaml::from_str(&std::fs::read_to_string(path)?)?,
                None => SyntheticTraceConfig {
                    seed: config.seed,
                    ..Default::default()
                },
            };
            info!(
                "  Trace: synthetic ({} files, {} requests/day)",
                synthetic.files, synthetic.requests_per_day
            );
            let source = SyntheticTrace::new(synthetic)?;
            if args.read_ahead {
                Box::new(ReadAheadSource::spawn(source, Some(config.end_day))?)
            } else {
                Box::new(source)
            }
        }
    };
    Ok(source)
}

fn export_experience(simulation: &Simulation, dir: &Path) -> Result<()> {
    for (mode, file) in [
        (DecisionMode::Admission, "admission_experience.jsonl"),
        (DecisionMode::Eviction, "eviction_experience.jsonl"),
    ] {
        let path = dir.join(file);
        let written = simulation
            .experience(mode)
            .write_jsonl(BufWriter::new(File::create(&path)?))?;
        info!("Exported {} {} records to {}", written, mode, path.display());
    }
    Ok(())
}

// =============================================================================
// Logging
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
