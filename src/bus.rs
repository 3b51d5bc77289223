//! Dispatch bus: the minimal pub/sub primitive.
//!
//! Holds ordered listener sets per event type and fans each emission out to
//! every listener. Dispatch schedules listeners and returns; it never waits
//! for their completion. Each invocation runs as an independent task raced
//! against its timeout, and a failure in one listener never affects another.

use crate::config::EventManagerConfig;
use crate::dlq::{DeadLetterEntry, DeadLetterQueue};
use crate::error::ListenerError;
use crate::event::{ERROR_EVENT_TYPE, Event, EventMetadata};
use crate::listener::Registration;
use crate::metrics::MetricsCollector;
use dashmap::DashMap;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Type → ordered listener set mappings, plus the failure sinks.
#[derive(Clone)]
pub struct DispatchBus {
    /// Listeners per event type, in registration order
    listeners: Arc<DashMap<String, Vec<Registration>>>,

    /// Registrations by ID; kept consistent with `listeners`
    registrations: Arc<DashMap<String, Registration>>,

    config: Arc<EventManagerConfig>,
    metrics: MetricsCollector,
    dlq: DeadLetterQueue,
}

impl DispatchBus {
    /// Create a bus sharing the manager's config, metrics, and DLQ.
    pub(crate) fn new(
        config: Arc<EventManagerConfig>,
        metrics: MetricsCollector,
        dlq: DeadLetterQueue,
    ) -> Self {
        Self {
            listeners: Arc::new(DashMap::new()),
            registrations: Arc::new(DashMap::new()),
            config,
            metrics,
            dlq,
        }
    }

    /// Wire a registration into the dispatch index.
    pub(crate) fn insert(&self, registration: Registration) {
        self.registrations
            .insert(registration.id.clone(), registration.clone());
        self.listeners
            .entry(registration.event_type.clone())
            .or_default()
            .push(registration);
    }

    /// Remove one registration by ID; `false` when the ID is unknown.
    pub(crate) fn remove(&self, id: &str) -> bool {
        let Some((_, registration)) = self.registrations.remove(id) else {
            return false;
        };

        if let Some(mut entry) = self.listeners.get_mut(&registration.event_type) {
            entry.retain(|r| r.id != id);
        }
        true
    }

    /// Remove every registration for an event type; returns how many.
    pub(crate) fn remove_all(&self, event_type: &str) -> usize {
        let Some((_, removed)) = self.listeners.remove(event_type) else {
            return 0;
        };

        for registration in &removed {
            self.registrations.remove(&registration.id);
        }
        removed.len()
    }

    /// Drop every registration (manager shutdown).
    pub(crate) fn clear(&self) {
        self.listeners.clear();
        self.registrations.clear();
    }

    /// Number of listeners wired for an event type.
    pub(crate) fn listener_count(&self, event_type: &str) -> usize {
        self.listeners
            .get(event_type)
            .map(|entry| entry.len())
            .unwrap_or(0)
    }

    /// Listener names for an event type, in registration order.
    pub(crate) fn listener_names(&self, event_type: &str) -> Vec<String> {
        self.listeners
            .get(event_type)
            .map(|entry| entry.iter().map(|r| r.listener_name.clone()).collect())
            .unwrap_or_default()
    }

    /// Event types with at least one listener.
    pub(crate) fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .listeners
            .iter()
            .filter(|entry| !entry.value().is_empty())
            .map(|entry| entry.key().clone())
            .collect();
        types.sort();
        types
    }

    /// Registration lookup by ID.
    pub(crate) fn registration(&self, id: &str) -> Option<Registration> {
        self.registrations.get(id).map(|entry| entry.clone())
    }

    /// Snapshot of all registrations.
    pub(crate) fn registrations(&self) -> Vec<Registration> {
        self.registrations
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Fan an event out to every listener registered for its type.
    ///
    /// Dispatches against a snapshot taken here, so concurrent registration
    /// changes never corrupt an in-flight fan-out. `once` registrations are
    /// unwired at invocation start. Returns the number of scheduled
    /// invocations.
    pub(crate) fn dispatch(&self, event: &Event) -> usize {
        let snapshot: Vec<Registration> = self
            .listeners
            .get(&event.event_type)
            .map(|entry| entry.clone())
            .unwrap_or_default();

        if snapshot.is_empty() {
            debug!(event_type = %event.event_type, "No listeners registered for event");
            return 0;
        }

        debug!(
            event_type = %event.event_type,
            event_id = %event.id,
            listener_count = snapshot.len(),
            "Dispatching event"
        );

        for registration in &snapshot {
            if registration.options.once {
                self.remove(&registration.id);
            }

            let bus = self.clone();
            let event = event.clone();
            let registration = registration.clone();

            tokio::spawn(async move {
                let timeout = registration
                    .options
                    .timeout
                    .unwrap_or(bus.config.default_timeout);

                match tokio::time::timeout(timeout, registration.listener.handle(&event)).await {
                    Ok(Ok(())) => {
                        trace!(
                            listener = %registration.listener_name,
                            event_id = %event.id,
                            "Listener completed"
                        );
                    }
                    Ok(Err(err)) => {
                        bus.on_listener_failure(&event, &registration, err);
                    }
                    Err(_) => {
                        let err = ListenerError::Timeout {
                            name: registration.listener_name.clone(),
                            timeout_ms: timeout.as_millis() as u64,
                        };
                        bus.on_listener_failure(&event, &registration, err);
                    }
                }
            });
        }

        snapshot.len()
    }

    /// Recover a listener failure: log it, count it, dead-letter past the
    /// retry budget, and surface it as an internal notification.
    fn on_listener_failure(
        &self,
        event: &Event,
        registration: &Registration,
        listener_error: ListenerError,
    ) {
        error!(
            listener = %registration.listener_name,
            event_type = %event.event_type,
            event_id = %event.id,
            error = %listener_error,
            "Listener failed"
        );

        self.metrics.record_error();

        if self.config.enable_dead_letter_queue && event.retries_exhausted() {
            self.dlq
                .push(DeadLetterEntry::new(event.clone(), listener_error.to_string()));
        }

        self.notify_error(event, registration, &listener_error);
    }

    /// Dispatch a `manifold.error` notification so observers can react.
    ///
    /// Failures of error listeners themselves are never re-notified.
    fn notify_error(&self, event: &Event, registration: &Registration, error: &ListenerError) {
        if event.event_type == ERROR_EVENT_TYPE {
            return;
        }

        let payload = json!({
            "error": error.to_string(),
            "listener": registration.listener_name,
            "event": serde_json::to_value(event).unwrap_or(serde_json::Value::Null),
        });

        let notification =
            Event::new(ERROR_EVENT_TYPE, payload).with_metadata(EventMetadata::new("dispatch-bus"));

        self.dispatch(&notification);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventPriority;
    use crate::listener::{FnListener, ListenerOptions};
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;
    use tokio::time::sleep;

    fn test_bus() -> DispatchBus {
        DispatchBus::new(
            Arc::new(EventManagerConfig::default()),
            MetricsCollector::new(),
            DeadLetterQueue::new(),
        )
    }

    fn counting_listener(
        name: &str,
        event_type: &str,
        counter: Arc<AtomicU32>,
    ) -> Arc<FnListener> {
        Arc::new(FnListener::new(name, event_type, move |_event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }))
    }

    #[tokio::test]
    async fn test_fan_out_reaches_every_listener() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        for i in 0..3 {
            let listener = counting_listener(&format!("l{}", i), "content.shared", counter.clone());
            bus.insert(Registration::new(listener, ListenerOptions::default()));
        }

        let scheduled = bus.dispatch(&Event::new("content.shared", json!({})));
        assert_eq!(scheduled, 3);

        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispatch_without_listeners() {
        let bus = test_bus();
        assert_eq!(bus.dispatch(&Event::new("nobody.home", json!({}))), 0);
    }

    #[tokio::test]
    async fn test_once_listener_removed_at_invocation() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        let listener = counting_listener("one-shot", "test.once", counter.clone());
        bus.insert(Registration::new(listener, ListenerOptions::new().once()));

        assert_eq!(bus.dispatch(&Event::new("test.once", json!({}))), 1);
        assert_eq!(bus.listener_count("test.once"), 0);

        assert_eq!(bus.dispatch(&Event::new("test.once", json!({}))), 0);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_past_budget_dead_letters() {
        let bus = test_bus();

        let listener = Arc::new(FnListener::new("flaky", "firmware.update", |_event| async {
            Err(ListenerError::Execution("Device offline".to_string()))
        }));
        bus.insert(Registration::new(listener, ListenerOptions::default()));

        let event = Event::new(
            "firmware.update",
            json!({"deviceId": "device-001", "firmwareVersion": "2.1.0"}),
        )
        .with_metadata(
            EventMetadata::new("fleet-controller")
                .with_priority(EventPriority::Critical)
                .with_retry_count(3)
                .with_max_retries(3),
        );

        bus.dispatch(&event);
        sleep(Duration::from_millis(50)).await;

        let entries = bus.dlq.entries();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].event.payload["deviceId"], "device-001");
        assert_eq!(entries[0].event.payload["firmwareVersion"], "2.1.0");
        assert_eq!(entries[0].event.metadata.priority, EventPriority::Critical);
        assert!(entries[0].error.contains("Device offline"));
    }

    #[tokio::test]
    async fn test_failure_within_budget_is_not_dead_lettered() {
        let bus = test_bus();

        let listener = Arc::new(FnListener::new("flaky", "test.fail", |_event| async {
            Err(ListenerError::Execution("boom".to_string()))
        }));
        bus.insert(Registration::new(listener, ListenerOptions::default()));

        // retry_count 0 < max_retries 3: recorded, not dead-lettered
        bus.dispatch(&Event::new("test.fail", json!({})));
        sleep(Duration::from_millis(50)).await;

        assert!(bus.dlq.is_empty());
        assert_eq!(bus.metrics.summary().error_count, 1);
    }

    #[tokio::test]
    async fn test_timeout_treated_as_failure() {
        let bus = test_bus();

        let listener = Arc::new(FnListener::new("slow", "test.slow", |_event| async {
            sleep(Duration::from_secs(60)).await;
            Ok(())
        }));
        bus.insert(Registration::new(
            listener,
            ListenerOptions::new().with_timeout(Duration::from_millis(10)),
        ));

        let event = Event::new("test.slow", json!({}))
            .with_metadata(EventMetadata::default().with_retry_count(3).with_max_retries(3));
        bus.dispatch(&event);
        sleep(Duration::from_millis(100)).await;

        let entries = bus.dlq.entries();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].error.contains("timed out"));
    }

    #[tokio::test]
    async fn test_one_failure_does_not_affect_other_listeners() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        let failing = Arc::new(FnListener::new("bad", "test.mixed", |_event| async {
            Err(ListenerError::Execution("boom".to_string()))
        }));
        bus.insert(Registration::new(failing, ListenerOptions::default()));
        bus.insert(Registration::new(
            counting_listener("good", "test.mixed", counter.clone()),
            ListenerOptions::default(),
        ));

        bus.dispatch(&Event::new("test.mixed", json!({})));
        sleep(Duration::from_millis(50)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_error_notification_dispatched_to_observers() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        let failing = Arc::new(FnListener::new("bad", "test.notify", |_event| async {
            Err(ListenerError::Execution("boom".to_string()))
        }));
        bus.insert(Registration::new(failing, ListenerOptions::default()));

        let observed = counter.clone();
        let observer = Arc::new(FnListener::new(
            "observer",
            ERROR_EVENT_TYPE,
            move |event| {
                let observed = observed.clone();
                async move {
                    assert_eq!(event.payload["listener"], "bad");
                    assert!(
                        event.payload["error"]
                            .as_str()
                            .is_some_and(|e| e.contains("boom"))
                    );
                    observed.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            },
        ));
        bus.insert(Registration::new(observer, ListenerOptions::default()));

        bus.dispatch(&Event::new("test.notify", json!({})));
        sleep(Duration::from_millis(100)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failing_error_listener_is_not_renotified() {
        let bus = test_bus();

        let failing_observer = Arc::new(FnListener::new(
            "broken-observer",
            ERROR_EVENT_TYPE,
            |_event| async { Err(ListenerError::Execution("observer broke".to_string())) },
        ));
        bus.insert(Registration::new(failing_observer, ListenerOptions::default()));

        let failing = Arc::new(FnListener::new("bad", "test.recurse", |_event| async {
            Err(ListenerError::Execution("boom".to_string()))
        }));
        bus.insert(Registration::new(failing, ListenerOptions::default()));

        bus.dispatch(&Event::new("test.recurse", json!({})));
        sleep(Duration::from_millis(100)).await;

        // Original failure plus the observer's own; recursion stops there.
        assert_eq!(bus.metrics.summary().error_count, 2);
    }

    #[tokio::test]
    async fn test_remove_and_remove_all() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        let r1 = Registration::new(
            counting_listener("a", "test.remove", counter.clone()),
            ListenerOptions::default(),
        );
        let id1 = r1.id.clone();
        bus.insert(r1);
        bus.insert(Registration::new(
            counting_listener("b", "test.remove", counter.clone()),
            ListenerOptions::default(),
        ));

        assert!(bus.remove(&id1));
        assert!(!bus.remove(&id1));
        assert_eq!(bus.listener_names("test.remove"), vec!["b"]);

        assert_eq!(bus.remove_all("test.remove"), 1);
        assert_eq!(bus.listener_count("test.remove"), 0);
        assert_eq!(bus.remove_all("test.remove"), 0);
    }

    #[tokio::test]
    async fn test_dispatch_uses_snapshot() {
        let bus = test_bus();
        let counter = Arc::new(AtomicU32::new(0));

        let registration = Registration::new(
            counting_listener("snap", "test.snapshot", counter.clone()),
            ListenerOptions::default(),
        );
        let id = registration.id.clone();
        bus.insert(registration);

        let scheduled = bus.dispatch(&Event::new("test.snapshot", json!({})));
        bus.remove(&id);

        assert_eq!(scheduled, 1);
        sleep(Duration::from_millis(50)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
