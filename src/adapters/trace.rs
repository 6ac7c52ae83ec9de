//! Trace Source Adapters
//!
//! - [`InMemoryTraceSource`] - partitions held in memory
//! - [`JsonLinesTraceSource`] - one `<day>.jsonl` file per partition
//! - [`ReadAheadSource`] - loads the next partition on a background thread

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::PathBuf;
use std::thread::JoinHandle;

use crossbeam::channel::{unbounded, Receiver, Sender};
use tracing::{debug, warn};

use crate::domain::{TraceRecord, TraceSource};
use crate::error::{Error, Result};

// =============================================================================
// In-memory
// =============================================================================

/// Day partitions held in memory.
#[derive(Debug, Clone, Default)]
pub struct InMemoryTraceSource {
    days: BTreeMap<u32, Vec<TraceRecord>>,
}

impl InMemoryTraceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_day(mut self, day: u32, records: Vec<TraceRecord>) -> Self {
        self.insert_day(day, records);
        self
    }

    pub fn insert_day(&mut self, day: u32, records: Vec<TraceRecord>) {
        self.days.insert(day, records);
    }

    pub fn days(&self) -> usize {
        self.days.len()
    }
}

impl TraceSource for InMemoryTraceSource {
    fn load_day(&mut self, day: u32) -> Result<Vec<TraceRecord>> {
        self.days
            .get(&day)
            .cloned()
            .ok_or(Error::MissingTraceDay { day })
    }
}

// =============================================================================
// JSON lines on disk
// =============================================================================

/// Reads `<dir>/<day>.jsonl`, one [`TraceRecord`] per line.
#[derive(Debug, Clone)]
pub struct JsonLinesTraceSource {
    dir: PathBuf,
}

impl JsonLinesTraceSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, day: u32) -> PathBuf {
        self.dir.join(format!("{}.jsonl", day))
    }
}

impl TraceSource for JsonLinesTraceSource {
    fn load_day(&mut self, day: u32) -> Result<Vec<TraceRecord>> {
        let path = self.path_for(day);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(Error::MissingTraceDay { day }),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let record = serde_json::from_str(&line).map_err(|e| Error::TraceSource {
                day,
                reason: format!("{} line {}: {}", path.display(), number + 1, e),
            })?;
            records.push(record);
        }
        debug!(day, path = %path.display(), records = records.len(), "Read trace partition");
        Ok(records)
    }
}

// =============================================================================
// Read-ahead
// =============================================================================

type Loaded = (u32, Result<Vec<TraceRecord>>);

/// Wraps a source so that day `d + 1` is loaded while day `d` is replayed.
///
/// The wrapped source lives on a worker thread. Partitions are handed over
/// whole, so nothing is shared while the controller runs.
pub struct ReadAheadSource {
    requests: Option<Sender<u32>>,
    responses: Receiver<Loaded>,
    pending: Option<u32>,
    last_day: Option<u32>,
    worker: Option<JoinHandle<()>>,
}

impl ReadAheadSource {
    /// Start the worker. No day after `last_day` is prefetched.
    pub fn spawn<S>(mut source: S, last_day: Option<u32>) -> Result<Self>
    where
        S: TraceSource + 'static,
    {
        let (request_tx, request_rx) = unbounded::<u32>();
        let (response_tx, response_rx) = unbounded::<Loaded>();

        let worker = std::thread::Builder::new()
            .name("trace-read-ahead".to_string())
            .spawn(move || {
                for day in request_rx {
                    let loaded = source.load_day(day);
                    if response_tx.send((day, loaded)).is_err() {
                        break;
                    }
                }
            })?;

        Ok(Self {
            requests: Some(request_tx),
            responses: response_rx,
            pending: None,
            last_day,
            worker: Some(worker),
        })
    }

    fn request(&mut self, day: u32) -> Result<()> {
        let sent = self
            .requests
            .as_ref()
            .map(|requests| requests.send(day).is_ok())
            .unwrap_or(false);
        if !sent {
            return Err(Error::TraceSource {
                day,
                reason: "read-ahead worker stopped".to_string(),
            });
        }
        self.pending = Some(day);
        Ok(())
    }

    fn receive(&mut self, day: u32) -> Result<Loaded> {
        self.pending = None;
        self.responses.recv().map_err(|_| Error::TraceSource {
            day,
            reason: "read-ahead worker stopped".to_string(),
        })
    }
}

impl TraceSource for ReadAheadSource {
    fn load_day(&mut self, day: u32) -> Result<Vec<TraceRecord>> {
        if self.pending != Some(day) {
            if let Some(stale) = self.pending {
                debug!(stale, requested = day, "Discarding read-ahead partition");
                self.receive(stale)?;
            }
            self.request(day)?;
        }

        let (loaded, records) = self.receive(day)?;
        if loaded != day {
            return Err(Error::Internal(format!(
                "read-ahead returned day {} for day {}",
                loaded, day
            )));
        }
        let records = records?;

        if self.last_day.map_or(true, |last| day < last) {
            self.request(day + 1)?;
        }
        Ok(records)
    }
}

impl Drop for ReadAheadSource {
    fn drop(&mut self) {
        self.requests.take();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                warn!("Trace read-ahead worker panicked");
            }
        }
    }
}
