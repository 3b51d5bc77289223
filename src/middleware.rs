//! Middleware pipeline wrapping every emission.
//!
//! Middleware executes in registration order on the way in and reverse order
//! on the way out (onion model): code before `next.run` runs first-to-last,
//! code after it runs last-to-first, and all of it completes before any
//! listener is scheduled.

use crate::error::EventResult;
use crate::event::{Event, generate_id};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use tracing::{debug, trace};

/// An interceptor wrapping event emission.
#[async_trait]
pub trait Middleware: Send + Sync {
    /// Inspect or transform the event, then call `next.run(event)` to
    /// continue the chain. Returning without running `next` short-circuits
    /// the remaining middleware and the dispatch step.
    async fn handle(&self, event: Event, next: Next) -> EventResult<Event>;
}

/// Continuation for the remaining middleware chain.
///
/// Carries the chain snapshot and the index of the next middleware to run;
/// the terminal continuation marks the chain as completed, which is how the
/// pipeline tells a finished run apart from a short-circuit.
pub struct Next {
    chain: Arc<Vec<Arc<dyn Middleware>>>,
    index: usize,
    completed: Arc<AtomicBool>,
}

impl Next {
    /// Run the rest of the chain with the given event.
    pub async fn run(self, event: Event) -> EventResult<Event> {
        if self.index >= self.chain.len() {
            trace!("Middleware chain complete");
            self.completed.store(true, Ordering::SeqCst);
            return Ok(event);
        }

        let middleware = self.chain[self.index].clone();
        let next = Next {
            chain: self.chain.clone(),
            index: self.index + 1,
            completed: self.completed.clone(),
        };

        trace!(middleware_index = self.index, "Executing middleware");
        middleware.handle(event, next).await
    }
}

/// Ordered middleware chain applied to every emission.
#[derive(Clone)]
pub struct MiddlewarePipeline {
    middlewares: Arc<RwLock<Vec<Arc<dyn Middleware>>>>,
}

impl MiddlewarePipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Append a middleware; call order is execution order.
    pub fn push(&self, middleware: Arc<dyn Middleware>) {
        self.middlewares.write().unwrap().push(middleware);
    }

    /// Number of registered middlewares.
    pub fn len(&self) -> usize {
        self.middlewares.read().unwrap().len()
    }

    /// Whether the pipeline is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all middlewares.
    pub fn clear(&self) {
        self.middlewares.write().unwrap().clear();
    }

    /// Run the full chain against a snapshot of the registered middlewares.
    ///
    /// Returns `Ok(Some(event))` when the chain ran to completion,
    /// `Ok(None)` when a middleware short-circuited, and `Err` when one
    /// failed; errors abort the emission and surface to the caller.
    pub async fn run(&self, event: Event) -> EventResult<Option<Event>> {
        let chain: Arc<Vec<Arc<dyn Middleware>>> =
            Arc::new(self.middlewares.read().unwrap().clone());

        if chain.is_empty() {
            return Ok(Some(event));
        }

        debug!(
            middleware_count = chain.len(),
            event_type = %event.event_type,
            "Executing middleware chain"
        );

        let completed = Arc::new(AtomicBool::new(false));
        let next = Next {
            chain,
            index: 0,
            completed: completed.clone(),
        };

        let event = next.run(event).await?;

        if completed.load(Ordering::SeqCst) {
            Ok(Some(event))
        } else {
            debug!(event_type = %event.event_type, "Middleware chain short-circuited");
            Ok(None)
        }
    }
}

impl Default for MiddlewarePipeline {
    fn default() -> Self {
        Self::new()
    }
}

// ========== Built-in Middleware ==========

/// Injects a correlation ID when the event does not carry one.
pub struct CorrelationIdMiddleware;

#[async_trait]
impl Middleware for CorrelationIdMiddleware {
    async fn handle(&self, mut event: Event, next: Next) -> EventResult<Event> {
        if event.metadata.correlation_id.is_none() {
            event.metadata.correlation_id = Some(generate_id("corr"));
        }
        next.run(event).await
    }
}

/// Logs events entering and leaving the chain.
pub struct LoggingMiddleware;

#[async_trait]
impl Middleware for LoggingMiddleware {
    async fn handle(&self, event: Event, next: Next) -> EventResult<Event> {
        debug!(
            event_type = %event.event_type,
            event_id = %event.id,
            "Event entering middleware chain"
        );
        let event = next.run(event).await?;
        debug!(event_type = %event.event_type, "Event cleared middleware chain");
        Ok(event)
    }
}
