//! Listener traits, registration options, and registration records.

use crate::error::ListenerResult;
use crate::event::{Event, EventPriority, generate_id};
use async_trait::async_trait;
use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// A named listener for one event type.
///
/// Listeners are independent: one listener's failure never affects another's
/// invocation for the same event.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Diagnostic name, unique within the listener's event type.
    fn name(&self) -> &str;

    /// Event type this listener handles.
    fn event_type(&self) -> &str;

    /// Handle one event.
    async fn handle(&self, event: &Event) -> ListenerResult<()>;
}

/// Boxed handler function backing closure-based listeners.
pub type ListenerFn =
    Arc<dyn Fn(Event) -> BoxFuture<'static, ListenerResult<()>> + Send + Sync>;

/// Listener built from an async closure.
///
/// # Examples
///
/// ```
/// use manifold_events::FnListener;
///
/// let listener = FnListener::new("audit", "content.shared", |event| async move {
///     println!("shared: {}", event.payload);
///     Ok(())
/// });
/// ```
#[derive(Clone)]
pub struct FnListener {
    name: String,
    event_type: String,
    handler: ListenerFn,
}

impl FnListener {
    /// Wrap an async closure as a listener.
    pub fn new<F, Fut>(
        name: impl Into<String>,
        event_type: impl Into<String>,
        handler: F,
    ) -> Self
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ListenerResult<()>> + Send + 'static,
    {
        let handler: ListenerFn = Arc::new(
            move |event: Event| -> BoxFuture<'static, ListenerResult<()>> {
                Box::pin(handler(event))
            },
        );
        Self {
            name: name.into(),
            event_type: event_type.into(),
            handler,
        }
    }
}

#[async_trait]
impl EventListener for FnListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn handle(&self, event: &Event) -> ListenerResult<()> {
        (self.handler)(event.clone()).await
    }
}

impl fmt::Debug for FnListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnListener")
            .field("name", &self.name)
            .field("event_type", &self.event_type)
            .finish()
    }
}

/// Per-registration options.
#[derive(Debug, Clone, Default)]
pub struct ListenerOptions {
    /// Remove the listener after its first invocation
    pub once: bool,

    /// Timeout override; the manager default applies when unset
    pub timeout: Option<Duration>,

    /// Listener priority, surfaced in introspection
    pub priority: EventPriority,
}

impl ListenerOptions {
    /// Create default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove after the first invocation.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }

    /// Override the listener timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set the listener priority.
    pub fn with_priority(mut self, priority: EventPriority) -> Self {
        self.priority = priority;
        self
    }
}

/// One active subscription: the unit of unregistration.
///
/// Callers hold the `id`, not the listener reference.
#[derive(Clone)]
pub struct Registration {
    /// Opaque registration ID, `reg_<millis>_<rand>`
    pub id: String,

    /// Event type the listener is wired to
    pub event_type: String,

    /// Listener diagnostic name
    pub listener_name: String,

    /// Options the listener was registered with
    pub options: ListenerOptions,

    pub(crate) listener: Arc<dyn EventListener>,
}

impl Registration {
    pub(crate) fn new(listener: Arc<dyn EventListener>, options: ListenerOptions) -> Self {
        Self {
            id: generate_id("reg"),
            event_type: listener.event_type().to_string(),
            listener_name: listener.name().to_string(),
            options,
            listener,
        }
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("id", &self.id)
            .field("event_type", &self.event_type)
            .field("listener_name", &self.listener_name)
            .field("options", &self.options)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_listener_handle() {
        let listener = FnListener::new("echo", "test.ping", |event| async move {
            assert_eq!(event.event_type, "test.ping");
            Ok(())
        });

        let event = Event::new("test.ping", json!({}));
        listener.handle(&event).await.unwrap();
    }

    #[tokio::test]
    async fn test_fn_listener_failure() {
        use crate::error::ListenerError;

        let listener = FnListener::new("boom", "test.fail", |_event| async move {
            Err(ListenerError::Execution("Device offline".to_string()))
        });

        let event = Event::new("test.fail", json!({}));
        let err = listener.handle(&event).await.unwrap_err();
        assert!(format!("{}", err).contains("Device offline"));
    }

    #[test]
    fn test_listener_accessors() {
        let listener = FnListener::new("audit", "content.shared", |_| async { Ok(()) });
        assert_eq!(listener.name(), "audit");
        assert_eq!(listener.event_type(), "content.shared");
    }

    #[test]
    fn test_options_defaults() {
        let options = ListenerOptions::default();
        assert!(!options.once);
        assert!(options.timeout.is_none());
        assert_eq!(options.priority, EventPriority::Normal);
    }

    #[test]
    fn test_options_builder() {
        let options = ListenerOptions::new()
            .once()
            .with_timeout(Duration::from_secs(5))
            .with_priority(EventPriority::Critical);

        assert!(options.once);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.priority, EventPriority::Critical);
    }

    #[test]
    fn test_registration_captures_listener_identity() {
        let listener = Arc::new(FnListener::new("audit", "content.shared", |_| async {
            Ok(())
        }));
        let registration = Registration::new(listener, ListenerOptions::default());

        assert!(registration.id.starts_with("reg_"));
        assert_eq!(registration.event_type, "content.shared");
        assert_eq!(registration.listener_name, "audit");
    }

    #[test]
    fn test_registration_ids_unique() {
        let listener = Arc::new(FnListener::new("a", "t", |_| async { Ok(()) }));
        let r1 = Registration::new(listener.clone(), ListenerOptions::default());
        let r2 = Registration::new(listener, ListenerOptions::default());
        assert_ne!(r1.id, r2.id);
    }
}
