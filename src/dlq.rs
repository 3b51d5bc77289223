//! Dead-letter queue.
//!
//! Holds events whose delivery failed past their retry budget. Entries keep
//! the full event verbatim, payload and metadata included, so a recovery job
//! can inspect or replay them. The queue is in-memory only and survives
//! manager shutdown until explicitly cleared.

use crate::event::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::warn;

/// One dead-lettered event and the error that exhausted it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    /// The failed event, preserved verbatim
    pub event: Event,

    /// Message of the error that triggered dead-lettering
    pub error: String,

    /// When the entry was recorded
    pub failed_at: DateTime<Utc>,
}

impl DeadLetterEntry {
    /// Create an entry for a failed event.
    pub fn new(event: Event, error: impl Into<String>) -> Self {
        Self {
            event,
            error: error.into(),
            failed_at: Utc::now(),
        }
    }
}

/// Append-only store of exhausted failures; cheap to clone and share.
#[derive(Clone)]
pub struct DeadLetterQueue {
    entries: Arc<Mutex<Vec<DeadLetterEntry>>>,
}

impl DeadLetterQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Append an entry.
    pub(crate) fn push(&self, entry: DeadLetterEntry) {
        warn!(
            event_type = %entry.event.event_type,
            event_id = %entry.event.id,
            error = %entry.error,
            "Event dead-lettered"
        );
        self.entries.lock().unwrap().push(entry);
    }

    /// Snapshot of all entries, oldest first.
    pub fn entries(&self) -> Vec<DeadLetterEntry> {
        self.entries.lock().unwrap().clone()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all entries; no other side effects.
    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl Default for DeadLetterQueue {
    fn default() -> Self {
        Self::new()
    }
}
