//! Multi-event subscribers.
//!
//! A subscriber groups several named handlers under one object; registering
//! it expands into one listener registration per (event type, handler) pair.

use crate::error::ListenerResult;
use crate::event::Event;
use crate::listener::EventListener;
use async_trait::async_trait;
use std::sync::Arc;

/// One (event type, handlers) pairing exposed by a subscriber.
#[derive(Debug, Clone)]
pub struct Subscription {
    /// Event type to listen for
    pub event_type: String,

    /// Handler names invoked for that type, in order
    pub handlers: Vec<String>,
}

impl Subscription {
    /// Create a subscription for one event type.
    pub fn new<I, S>(event_type: impl Into<String>, handlers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            event_type: event_type.into(),
            handlers: handlers.into_iter().map(Into::into).collect(),
        }
    }
}

/// A component reacting to several event types with named handlers.
///
/// Handler-name resolution happens in the subscriber's own `dispatch`, so a
/// subscriber exposing `{"content.shared": ["on_shared", "on_audit"]}` routes
/// each name to its own method.
///
/// # Examples
///
/// ```
/// use manifold_events::{Event, EventSubscriber, ListenerError, ListenerResult, Subscription};
/// use async_trait::async_trait;
///
/// struct NotificationService;
///
/// #[async_trait]
/// impl EventSubscriber for NotificationService {
///     fn name(&self) -> &str {
///         "notifications"
///     }
///
///     fn subscriptions(&self) -> Vec<Subscription> {
///         vec![Subscription::new("content.shared", ["on_shared"])]
///     }
///
///     async fn dispatch(&self, handler: &str, event: &Event) -> ListenerResult<()> {
///         match handler {
///             "on_shared" => {
///                 println!("notify: {}", event.payload);
///                 Ok(())
///             }
///             other => Err(ListenerError::Execution(format!(
///                 "unknown handler '{}'",
///                 other
///             ))),
///         }
///     }
/// }
/// ```
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Subscriber name, used to qualify listener names.
    fn name(&self) -> &str;

    /// Event types this subscriber reacts to, with the handlers for each.
    fn subscriptions(&self) -> Vec<Subscription>;

    /// Route an event to one named handler.
    async fn dispatch(&self, handler: &str, event: &Event) -> ListenerResult<()>;
}

/// Adapter wiring one (event type, handler) pair into the dispatch bus.
pub(crate) struct SubscriberListener {
    name: String,
    event_type: String,
    handler: String,
    subscriber: Arc<dyn EventSubscriber>,
}

impl SubscriberListener {
    pub(crate) fn new(
        subscriber: Arc<dyn EventSubscriber>,
        event_type: impl Into<String>,
        handler: impl Into<String>,
    ) -> Self {
        let handler = handler.into();
        Self {
            name: format!("{}.{}", subscriber.name(), handler),
            event_type: event_type.into(),
            handler,
            subscriber,
        }
    }
}

#[async_trait]
impl EventListener for SubscriberListener {
    fn name(&self) -> &str {
        &self.name
    }

    fn event_type(&self) -> &str {
        &self.event_type
    }

    async fn handle(&self, event: &Event) -> ListenerResult<()> {
        self.subscriber.dispatch(&self.handler, event).await
    }
}
