//! In-process event coordination for Rust applications.
//!
//! One emitted command triggers every side effect it implies, without the
//! caller enumerating or sequencing those effects. Provides:
//! - 📣 **Fan-out dispatch** - every listener for a type, scheduled independently
//! - 🧅 **Middleware pipeline** - onion-ordered interceptors wrapping each emission
//! - ⏱️ **Per-listener timeouts** - a slow listener fails alone, never the emission
//! - 💀 **Dead-letter queue** - exhausted failures preserved verbatim for replay
//! - 📊 **Metrics** - emission counts, timing, error rate, on-demand snapshots
//! - 🧾 **Registrations** - opaque IDs as the unit of unregistration
//! - 👥 **Subscribers** - one object, many named handlers across event types
//!
//! ## Quick Start
//!
//! ```
//! use manifold_events::{EventManager, FnListener, ListenerOptions};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), manifold_events::EventError> {
//!     let manager = EventManager::new();
//!     manager.initialize()?;
//!
//!     let listener = FnListener::new("thumbnails", "content.shared", |event| async move {
//!         println!("rendering thumbnails for {}", event.payload["album"]);
//!         Ok(())
//!     });
//!     manager.register_listener(Arc::new(listener), ListenerOptions::default())?;
//!
//!     let dispatched = manager
//!         .emit("content.shared", json!({"album": "sunset-patterns"}), None)
//!         .await?;
//!     assert!(dispatched);
//!     Ok(())
//! }
//! ```
//!
//! ## Middleware
//!
//! Middleware wraps every emission in registration order (onion model); code
//! before `next.run` executes first-to-last, code after it last-to-first.
//! Returning without running `next` gates the emission.
//!
//! ```
//! use manifold_events::{Event, EventError, EventManager, EventResult, Middleware, Next};
//! use async_trait::async_trait;
//! use std::sync::Arc;
//!
//! struct RejectUnsourced;
//!
//! #[async_trait]
//! impl Middleware for RejectUnsourced {
//!     async fn handle(&self, event: Event, next: Next) -> EventResult<Event> {
//!         if event.metadata.source.is_empty() {
//!             return Err(EventError::Middleware("missing source".to_string()));
//!         }
//!         next.run(event).await
//!     }
//! }
//!
//! # fn wire(manager: &EventManager) -> EventResult<()> {
//! manager.use_middleware(Arc::new(RejectUnsourced))?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Failure Handling
//!
//! Listener failures and timeouts are recovered locally: logged, counted,
//! surfaced as a `manifold.error` notification event, and dead-lettered once
//! the event's retry budget is exhausted. The core never re-emits on its own;
//! callers running a retry loop re-`emit` with an incremented `retry_count`.
//!
//! ```no_run
//! use manifold_events::EventManager;
//!
//! # async fn inspect(manager: &EventManager) {
//! for entry in manager.get_dead_letter_queue() {
//!     eprintln!("{} failed: {}", entry.event.event_type, entry.error);
//! }
//! # }
//! ```

mod bus;

pub mod config;
pub mod dlq;
pub mod error;
pub mod event;
pub mod listener;
pub mod manager;
pub mod metrics;
pub mod middleware;
pub mod subscriber;

pub use config::EventManagerConfig;
pub use dlq::{DeadLetterEntry, DeadLetterQueue};
pub use error::{EventError, EventResult, ListenerError, ListenerResult};
pub use event::{DEFAULT_EVENT_VERSION, ERROR_EVENT_TYPE, Event, EventMetadata, EventPriority};
pub use listener::{EventListener, FnListener, ListenerFn, ListenerOptions, Registration};
pub use manager::{EventManager, EventManagerBuilder};
pub use metrics::{MetricsCollector, MetricsSummary};
pub use middleware::{
    CorrelationIdMiddleware, LoggingMiddleware, Middleware, MiddlewarePipeline, Next,
};
pub use subscriber::{EventSubscriber, Subscription};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::EventManagerConfig;
    pub use crate::dlq::{DeadLetterEntry, DeadLetterQueue};
    pub use crate::error::{EventError, EventResult, ListenerError, ListenerResult};
    pub use crate::event::{Event, EventMetadata, EventPriority};
    pub use crate::listener::{EventListener, FnListener, ListenerOptions, Registration};
    pub use crate::manager::{EventManager, EventManagerBuilder};
    pub use crate::metrics::MetricsSummary;
    pub use crate::middleware::{Middleware, MiddlewarePipeline, Next};
    pub use crate::subscriber::{EventSubscriber, Subscription};
}
