//! Append-only, time-windowed engine log.
//!
//! The buffer lives for the process; nothing is persisted. Age is bounded
//! by a retention sweep that discards every entry as a single operation
//! once per window, the same window whether entries arrived early or late
//! in it. There is no rolling or size-based eviction.

use nutcracker_types::{EngineEvent, LogEntry};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shared handle to the engine log buffer.
///
/// Appends land in the buffer and are forwarded to the event channel for
/// the UI shell. The buffer is the source of truth; a full channel costs
/// only the live notification, never the entry.
#[derive(Debug, Clone)]
pub struct LogSink {
    entries: Arc<Mutex<Vec<LogEntry>>>,
    events: mpsc::Sender<EngineEvent>,
}

impl LogSink {
    #[must_use]
    pub fn new(events: mpsc::Sender<EngineEvent>) -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
            events,
        }
    }

    /// Append a timestamped entry and notify subscribers.
    pub fn append(&self, message: impl Into<String>) {
        let entry = LogEntry::new(message);
        self.lock().push(entry.clone());
        if self.events.try_send(EngineEvent::Log(entry)).is_err() {
            tracing::debug!("event channel full or closed; log entry kept in buffer only");
        }
    }

    /// Copy of the buffer, oldest first.
    #[must_use]
    pub fn snapshot(&self) -> Vec<LogEntry> {
        self.lock().clone()
    }

    /// Take every entry out of the buffer, oldest first.
    pub fn drain(&self) -> Vec<LogEntry> {
        std::mem::take(&mut *self.lock())
    }

    /// Discard all entries as one operation.
    pub fn clear(&self) {
        self.lock().clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Spawn the retention timer that clears the whole buffer once per
    /// window. The caller owns the handle and aborts it on shutdown.
    pub fn spawn_retention(&self, window: Duration) -> JoinHandle<()> {
        let sink = self.clone();
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(window).await;
                let cleared = sink.drain().len();
                if cleared > 0 {
                    tracing::debug!(cleared, "cleared engine log after retention window");
                }
            }
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogEntry>> {
        // A panic while holding the lock only loses log lines; carry on.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
