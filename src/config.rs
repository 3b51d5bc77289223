//! Event manager configuration.

use std::time::Duration;

/// Tunables for the event manager.
#[derive(Debug, Clone)]
pub struct EventManagerConfig {
    /// Maximum listeners per event type
    pub max_listeners: usize,

    /// Timeout applied to listeners without an explicit override
    pub default_timeout: Duration,

    /// Record emission and error metrics
    pub enable_metrics: bool,

    /// Route exhausted failures to the dead-letter queue
    pub enable_dead_letter_queue: bool,

    /// Default retry budget stamped on event metadata
    pub retry_attempts: u32,

    /// Advisory delay for callers running their own retry loop
    pub retry_delay: Duration,
}

impl Default for EventManagerConfig {
    fn default() -> Self {
        Self {
            max_listeners: 100,
            default_timeout: Duration::from_millis(30000),
            enable_metrics: true,
            enable_dead_letter_queue: true,
            retry_attempts: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl EventManagerConfig {
    /// Create a configuration with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the per-type listener limit.
    pub fn with_max_listeners(mut self, max_listeners: usize) -> Self {
        self.max_listeners = max_listeners;
        self
    }

    /// Set the default listener timeout.
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    /// Enable/disable metrics collection.
    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.enable_metrics = enabled;
        self
    }

    /// Enable/disable the dead-letter queue.
    pub fn with_dead_letter_queue(mut self, enabled: bool) -> Self {
        self.enable_dead_letter_queue = enabled;
        self
    }

    /// Set the default retry budget for event metadata.
    pub fn with_retry_attempts(mut self, attempts: u32) -> Self {
        self.retry_attempts = attempts;
        self
    }

    /// Set the advisory retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}
