//! Event manager: lifecycle, registration bookkeeping, and emission facade.

use crate::bus::DispatchBus;
use crate::config::EventManagerConfig;
use crate::dlq::{DeadLetterEntry, DeadLetterQueue};
use crate::error::{EventError, EventResult};
use crate::event::{Event, EventMetadata};
use crate::listener::{EventListener, ListenerOptions, Registration};
use crate::metrics::{MetricsCollector, MetricsSummary};
use crate::middleware::{Middleware, MiddlewarePipeline};
use crate::subscriber::{EventSubscriber, SubscriberListener};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tracing::{debug, error, info};

/// Manager lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ManagerState {
    Uninitialized,
    Ready,
    ShutDown,
}

/// The event coordination facade.
///
/// Composes the middleware pipeline and the dispatch bus, owns registration
/// bookkeeping, and exposes metrics and the dead-letter queue. All mutating
/// operations except `initialize` require the `Ready` state.
#[derive(Clone)]
pub struct EventManager {
    state: Arc<RwLock<ManagerState>>,
    config: Arc<EventManagerConfig>,
    pipeline: MiddlewarePipeline,
    bus: DispatchBus,
    metrics: MetricsCollector,
    dlq: DeadLetterQueue,
}

impl EventManager {
    /// Create a manager with default configuration.
    pub fn new() -> Self {
        Self::with_config(EventManagerConfig::default())
    }

    /// Create a manager with custom configuration.
    pub fn with_config(config: EventManagerConfig) -> Self {
        let config = Arc::new(config);
        let metrics = MetricsCollector::new();
        let dlq = DeadLetterQueue::new();
        let bus = DispatchBus::new(config.clone(), metrics.clone(), dlq.clone());

        Self {
            state: Arc::new(RwLock::new(ManagerState::Uninitialized)),
            config,
            pipeline: MiddlewarePipeline::new(),
            bus,
            metrics,
            dlq,
        }
    }

    /// Transition to `Ready`.
    ///
    /// Errors when the manager is already running; re-initializing after
    /// `shutdown` is permitted.
    pub fn initialize(&self) -> EventResult<()> {
        let mut state = self.state.write().unwrap();
        if *state == ManagerState::Ready {
            return Err(EventError::AlreadyInitialized);
        }
        *state = ManagerState::Ready;
        info!("Event manager initialized");
        Ok(())
    }

    /// Clear registrations and middleware and transition to `ShutDown`.
    ///
    /// Idempotent. The dead-letter queue is left intact until explicitly
    /// cleared.
    pub fn shutdown(&self) {
        {
            let mut state = self.state.write().unwrap();
            if *state == ManagerState::ShutDown {
                debug!("Event manager already shut down");
                return;
            }
            *state = ManagerState::ShutDown;
        }

        self.bus.clear();
        self.pipeline.clear();
        info!("Event manager shut down");
    }

    fn ensure_ready(&self) -> EventResult<()> {
        match *self.state.read().unwrap() {
            ManagerState::Ready => Ok(()),
            _ => Err(EventError::NotInitialized),
        }
    }

    /// Metadata defaults applied to emissions without overrides: normal
    /// priority, zero consumed retries, and the configured retry budget.
    pub fn default_metadata(&self) -> EventMetadata {
        EventMetadata::default().with_max_retries(self.config.retry_attempts)
    }

    /// Build and emit an event.
    ///
    /// Constructs the event (defaults or the supplied metadata), runs the
    /// middleware pipeline, and schedules every listener for the type.
    /// Returns `Ok(true)` when dispatch was reached; listener failures never
    /// change the result. `Ok(false)` means dispatch was not attempted
    /// (middleware short-circuit or an emission-level failure, which is
    /// dead-lettered). Middleware errors propagate.
    pub async fn emit<P: Serialize>(
        &self,
        event_type: &str,
        payload: P,
        metadata: Option<EventMetadata>,
    ) -> EventResult<bool> {
        self.ensure_ready()?;

        let metadata = metadata.unwrap_or_else(|| self.default_metadata());

        let payload = match serde_json::to_value(payload) {
            Ok(value) => value,
            Err(err) => {
                let emission_error =
                    EventError::Emission(format!("payload serialization failed: {}", err));
                error!(event_type, error = %emission_error, "Emission failed");
                self.metrics.record_error();
                if self.config.enable_dead_letter_queue {
                    let event =
                        Event::new(event_type, serde_json::Value::Null).with_metadata(metadata);
                    self.dlq
                        .push(DeadLetterEntry::new(event, emission_error.to_string()));
                }
                return Ok(false);
            }
        };

        self.emit_event(Event::new(event_type, payload).with_metadata(metadata))
            .await
    }

    /// Emit a fully-formed event, bypassing default construction.
    ///
    /// Used for replay or cross-boundary forwarding; the same pipeline and
    /// dispatch semantics as [`emit`](Self::emit) apply.
    pub async fn emit_event(&self, event: Event) -> EventResult<bool> {
        self.ensure_ready()?;

        let started = Instant::now();

        let event = match self.pipeline.run(event).await {
            Ok(Some(event)) => event,
            Ok(None) => return Ok(false),
            Err(err) => {
                self.metrics.record_error();
                return Err(err);
            }
        };

        let scheduled = self.bus.dispatch(&event);

        if self.config.enable_metrics {
            self.metrics
                .record_emission(&event.event_type, started.elapsed());
        }

        debug!(
            event_type = %event.event_type,
            event_id = %event.id,
            scheduled,
            "Emission dispatched"
        );
        Ok(true)
    }

    /// Register a listener; returns the registration ID.
    ///
    /// Errors when the configured per-type listener limit is reached.
    pub fn register_listener(
        &self,
        listener: Arc<dyn EventListener>,
        options: ListenerOptions,
    ) -> EventResult<String> {
        self.ensure_ready()?;

        let event_type = listener.event_type().to_string();
        if self.bus.listener_count(&event_type) >= self.config.max_listeners {
            return Err(EventError::ListenerLimit {
                event_type,
                max: self.config.max_listeners,
            });
        }

        let registration = Registration::new(listener, options);
        let id = registration.id.clone();
        debug!(
            registration_id = %id,
            event_type = %registration.event_type,
            listener = %registration.listener_name,
            "Listener registered"
        );
        self.bus.insert(registration);
        Ok(id)
    }

    /// Register every (event type, handler) pair a subscriber exposes.
    ///
    /// Returns one registration ID per pair, in subscription order.
    pub fn register_subscriber(
        &self,
        subscriber: Arc<dyn EventSubscriber>,
    ) -> EventResult<Vec<String>> {
        self.ensure_ready()?;

        let mut ids = Vec::new();
        for subscription in subscriber.subscriptions() {
            for handler in &subscription.handlers {
                let listener = Arc::new(SubscriberListener::new(
                    subscriber.clone(),
                    subscription.event_type.clone(),
                    handler.clone(),
                ));
                ids.push(self.register_listener(listener, ListenerOptions::default())?);
            }
        }

        info!(
            subscriber = %subscriber.name(),
            registrations = ids.len(),
            "Subscriber registered"
        );
        Ok(ids)
    }

    /// Remove one registration; `false` when the ID is unknown.
    ///
    /// Absence is a normal outcome here, not a failure condition.
    pub fn unregister_listener(&self, id: &str) -> bool {
        let removed = self.bus.remove(id);
        if removed {
            debug!(registration_id = %id, "Listener unregistered");
        }
        removed
    }

    /// Remove every listener for an event type; returns how many.
    pub fn unregister_all_listeners(&self, event_type: &str) -> usize {
        let removed = self.bus.remove_all(event_type);
        if removed > 0 {
            debug!(event_type, removed, "Listeners unregistered");
        }
        removed
    }

    /// Append a middleware; call order is execution order.
    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) -> EventResult<()> {
        self.ensure_ready()?;
        self.pipeline.push(middleware);
        Ok(())
    }

    /// Listener names for an event type, in registration order.
    pub fn get_listeners(&self, event_type: &str) -> Vec<String> {
        self.bus.listener_names(event_type)
    }

    /// Event types with at least one listener, sorted.
    pub fn get_event_types(&self) -> Vec<String> {
        self.bus.event_types()
    }

    /// Snapshot of all registrations.
    pub fn get_registrations(&self) -> Vec<Registration> {
        self.bus.registrations()
    }

    /// Registration lookup by ID.
    pub fn get_registration(&self, id: &str) -> Option<Registration> {
        self.bus.registration(id)
    }

    /// Snapshot of the dead-letter queue, oldest first.
    pub fn get_dead_letter_queue(&self) -> Vec<DeadLetterEntry> {
        self.dlq.entries()
    }

    /// Empty the dead-letter queue; no side effects on metrics.
    pub fn clear_dead_letter_queue(&self) {
        self.dlq.clear();
    }

    /// Snapshot of the emission metrics.
    pub fn get_metrics(&self) -> MetricsSummary {
        self.metrics.summary()
    }

    /// The manager's configuration.
    pub fn get_config(&self) -> EventManagerConfig {
        (*self.config).clone()
    }
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder wiring configuration and middleware before first use.
///
/// # Examples
///
/// ```
/// use manifold_events::{CorrelationIdMiddleware, EventManagerBuilder, EventManagerConfig};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let manager = EventManagerBuilder::new()
///     .config(EventManagerConfig::new().with_default_timeout(Duration::from_secs(5)))
///     .middleware(Arc::new(CorrelationIdMiddleware))
///     .build();
///
/// manager.initialize().unwrap();
/// ```
pub struct EventManagerBuilder {
    config: EventManagerConfig,
    middlewares: Vec<Arc<dyn Middleware>>,
}

impl EventManagerBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: EventManagerConfig::default(),
            middlewares: Vec::new(),
        }
    }

    /// Replace the configuration.
    pub fn config(mut self, config: EventManagerConfig) -> Self {
        self.config = config;
        self
    }

    /// Append a middleware.
    pub fn middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Build the manager; `initialize` must still be called before emitting.
    pub fn build(self) -> EventManager {
        let manager = EventManager::with_config(self.config);
        for middleware in self.middlewares {
            manager.pipeline.push(middleware);
        }
        manager
    }
}

impl Default for EventManagerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
