//! Event envelope, metadata, and identifier generation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Event type used for internal failure notifications.
///
/// Dispatched whenever a listener fails or times out, carrying the error,
/// the listener name, and the original event. Failures of listeners for this
/// type are never re-notified.
pub const ERROR_EVENT_TYPE: &str = "manifold.error";

/// Schema version stamped on events that do not specify one.
pub const DEFAULT_EVENT_VERSION: &str = "1.0.0";

/// Event priority levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub enum EventPriority {
    /// Lowest priority
    Low = 0,
    /// Normal priority (default)
    #[default]
    Normal = 1,
    /// High priority
    High = 2,
    /// Critical priority
    Critical = 3,
}

/// Metadata attached to every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Component that emitted the event
    pub source: String,

    /// Event priority
    pub priority: EventPriority,

    /// Optional correlation ID linking causally related events
    pub correlation_id: Option<String>,

    /// Optional user the event is attributed to
    pub user_id: Option<String>,

    /// Free-form tags
    pub tags: HashMap<String, String>,

    /// Delivery attempts already consumed
    pub retry_count: u32,

    /// Retry budget before the event is dead-lettered
    pub max_retries: u32,
}

impl Default for EventMetadata {
    fn default() -> Self {
        Self {
            source: "event-manager".to_string(),
            priority: EventPriority::Normal,
            correlation_id: None,
            user_id: None,
            tags: HashMap::new(),
            retry_count: 0,
            max_retries: 3,
        }
    }
}

impl EventMetadata {
    /// Create metadata with the given source.
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            ..Self::default()
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Set the correlation ID.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Set the user ID.
    pub fn with_user_id(mut self, id: impl Into<String>) -> Self {
        self.user_id = Some(id.into());
        self
    }

    /// Add a tag.
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    /// Set the consumed retry count.
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    /// Set the retry budget.
    pub fn with_max_retries(mut self, max: u32) -> Self {
        self.max_retries = max;
        self
    }
}

/// An event flowing through the manager.
///
/// Built once per emission and never mutated in place; middleware that
/// enriches an event takes ownership and passes the updated value down the
/// chain. The dead-letter queue stores clones verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Dot-namespaced event type, e.g. `content.shared`
    #[serde(rename = "type")]
    pub event_type: String,

    /// Process-unique event ID
    pub id: String,

    /// When the event was constructed
    pub timestamp: DateTime<Utc>,

    /// Schema version of the payload
    pub version: String,

    /// Arbitrary structured payload
    pub payload: serde_json::Value,

    /// Event metadata
    pub metadata: EventMetadata,
}

impl Event {
    /// Create an event with default metadata and a generated ID.
    pub fn new(event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            event_type: event_type.into(),
            id: generate_id("evt"),
            timestamp: Utc::now(),
            version: DEFAULT_EVENT_VERSION.to_string(),
            payload,
            metadata: EventMetadata::default(),
        }
    }

    /// Replace the metadata.
    pub fn with_metadata(mut self, metadata: EventMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Set the payload schema version.
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Whether the retry budget is exhausted.
    pub fn retries_exhausted(&self) -> bool {
        self.metadata.retry_count >= self.metadata.max_retries
    }
}

/// Generate a collision-resistant identifier.
///
/// `<prefix>_<unix millis>_<9 chars>` where the suffix is drawn from a secure
/// random source (UUIDv4) encoded in lowercase hex, so registration IDs match
/// `^reg_\d+_[a-z0-9]{8,9}$`.
pub(crate) fn generate_id(prefix: &str) -> String {
    let millis = Utc::now().timestamp_millis();
    let entropy = Uuid::new_v4().simple().to_string();
    format!("{}_{}_{}", prefix, millis, &entropy[..9])
}
