//! Error types for event coordination.

use thiserror::Error;

/// Result type for event manager operations.
pub type EventResult<T> = Result<T, EventError>;

/// Result type for listener handlers.
pub type ListenerResult<T> = Result<T, ListenerError>;

/// Manager-level errors.
#[derive(Debug, Error)]
pub enum EventError {
    /// Operation requires an initialized manager
    #[error("Event manager is not initialized")]
    NotInitialized,

    /// Initialize called while the manager is already running
    #[error("Event manager is already initialized")]
    AlreadyInitialized,

    /// A middleware rejected or failed the emission
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Constructing or dispatching the event failed
    #[error("Emission failed: {0}")]
    Emission(String),

    /// Listener limit for an event type reached
    #[error("Listener limit reached for event type '{event_type}' (max {max})")]
    ListenerLimit { event_type: String, max: usize },
}

/// Listener-level errors, recovered per listener and never surfaced to `emit`.
#[derive(Debug, Clone, Error)]
pub enum ListenerError {
    /// The listener's handler returned an error
    #[error("Listener execution failed: {0}")]
    Execution(String),

    /// The listener exceeded its timeout
    #[error("Listener '{name}' timed out after {timeout_ms}ms")]
    Timeout { name: String, timeout_ms: u64 },
}
