//! Event Publisher Adapters
//!
//! Backends for the `EventPublisher` port. The controller publishes to one
//! publisher; `CompositeEventPublisher` fans out when a run needs several,
//! e.g. logging plus a JSON-lines event log on disk.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{EventPublisher, SimulationEvent};
use crate::error::Result;

/// Logs events through `tracing`.
///
/// Day-level events (day completed, purge, end of run) are logged at info,
/// eviction-phase and invalidation events at debug since they fire many
/// times per day.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEventPublisher;

impl LoggingEventPublisher {
    pub fn new() -> Self {
        Self
    }

    fn is_day_level(event: &SimulationEvent) -> bool {
        matches!(
            event,
            SimulationEvent::DayCompleted { .. }
                | SimulationEvent::RegistryPurged { .. }
                | SimulationEvent::SimulationFinished { .. }
        )
    }
}

impl EventPublisher for LoggingEventPublisher {
    fn publish(&self, event: SimulationEvent) -> Result<()> {
        let event_type = event.event_type();
        let json = serde_json::to_string(&event)?;

        if Self::is_day_level(&event) {
            info!(event_type, event = %json, "Simulation event");
        } else {
            debug!(event_type, event = %json, "Simulation event");
        }
        Ok(())
    }
}

/// Appends every event as one JSON object per line.
pub struct JsonLinesEventLog<W: Write + Send> {
    writer: Mutex<W>,
}

impl JsonLinesEventLog<BufWriter<File>> {
    /// Create (or truncate) the log at `path`.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

impl<W: Write + Send> JsonLinesEventLog<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }
}

impl<W: Write + Send> std::fmt::Debug for JsonLinesEventLog<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonLinesEventLog").finish_non_exhaustive()
    }
}

impl<W: Write + Send> EventPublisher for JsonLinesEventLog<W> {
    fn publish(&self, event: SimulationEvent) -> Result<()> {
        let mut writer = self.writer.lock();
        serde_json::to_writer(&mut *writer, &event)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Keeps every event in memory for later inspection.
#[derive(Debug, Default)]
pub struct InMemoryEventCollector {
    events: RwLock<Vec<SimulationEvent>>,
}

impl InMemoryEventCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SimulationEvent> {
        self.events.read().clone()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    pub fn clear(&self) {
        self.events.write().clear();
    }

    /// Events whose `event_type()` is `event_type`, in publication order.
    pub fn events_of_type(&self, event_type: &str) -> Vec<SimulationEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .cloned()
            .collect()
    }

    pub fn count_by_type(&self, event_type: &str) -> usize {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type() == event_type)
            .count()
    }
}

impl EventPublisher for InMemoryEventCollector {
    fn publish(&self, event: SimulationEvent) -> Result<()> {
        self.events.write().push(event);
        Ok(())
    }
}

/// Publishes each event to every registered backend, stopping at the first
/// failure.
#[derive(Default)]
pub struct CompositeEventPublisher {
    publishers: Vec<Box<dyn EventPublisher>>,
}

impl CompositeEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_publisher<P: EventPublisher + 'static>(mut self, publisher: P) -> Self {
        self.publishers.push(Box::new(publisher));
        self
    }

    pub fn len(&self) -> usize {
        self.publishers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.publishers.is_empty()
    }
}

impl std::fmt::Debug for CompositeEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompositeEventPublisher")
            .field("publisher_count", &self.publishers.len())
            .finish()
    }
}

impl EventPublisher for CompositeEventPublisher {
    fn publish(&self, event: SimulationEvent) -> Result<()> {
        for publisher in &self.publishers {
            publisher.publish(event.clone())?;
        }
        Ok(())
    }
}

impl<P: EventPublisher + ?Sized> EventPublisher for std::sync::Arc<P> {
    fn publish(&self, event: SimulationEvent) -> Result<()> {
        (**self).publish(event)
    }
}
