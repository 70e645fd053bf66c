//! Event subscription and fan-out.
//!
//! Uses a dedicated lock (separate from the registry's data lock) so
//! enumerating subscribers never blocks a concurrent read/write on the
//! agent map, and dispatches each handler on its own task via
//! [`TaskScheduler`] so a slow or panicking subscriber cannot stall the
//! emitter or take down its peers (spec.md §4.1, §5, §9).

use std::panic::AssertUnwindSafe;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use discovery_core::{DiscoveryEvent, SubscriptionId};
use futures::FutureExt;
use tracing::error;

use crate::scheduler::TaskScheduler;

/// Implemented by event subscribers.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Handles a single discovery event.
    async fn handle(&self, event: DiscoveryEvent);
}

#[async_trait]
impl<F, Fut> EventHandler for F
where
    F: Send + Sync + Fn(DiscoveryEvent) -> Fut,
    Fut: std::future::Future<Output = ()> + Send,
{
    async fn handle(&self, event: DiscoveryEvent) {
        (self)(event).await;
    }
}

struct Subscriber {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Holds the set of active subscribers and fans out events to them.
#[derive(Default)]
pub struct EventBus {
    subscribers: RwLock<Vec<Subscriber>>,
}

impl EventBus {
    /// Creates an empty event bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler, returning its subscription id.
    ///
    /// # Panics
    ///
    /// Panics if the subscriber lock has been poisoned.
    pub fn subscribe(&self, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId::generate();
        let mut subscribers = self.subscribers.write().expect("event bus poisoned");
        subscribers.push(Subscriber { id, handler });
        id
    }

    /// Removes a handler. A no-op if the id is unknown.
    ///
    /// # Panics
    ///
    /// Panics if the subscriber lock has been poisoned.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self.subscribers.write().expect("event bus poisoned");
        subscribers.retain(|s| s.id != id);
    }

    /// Dispatches `event` to every current subscriber, in
    /// subscription-id order, each on its own spawned task.
    ///
    /// # Panics
    ///
    /// Panics if the subscriber lock has been poisoned.
    pub fn emit(&self, event: DiscoveryEvent, scheduler: &TaskScheduler) {
        let mut snapshot: Vec<(SubscriptionId, Arc<dyn EventHandler>)> = {
            let subscribers = self.subscribers.read().expect("event bus poisoned");
            subscribers
                .iter()
                .map(|s| (s.id, Arc::clone(&s.handler)))
                .collect()
        };
        snapshot.sort_by_key(|(id, _)| *id);

        for (id, handler) in snapshot {
            let event = event.clone();
            let dispatch = async move {
                let outcome = AssertUnwindSafe(handler.handle(event)).catch_unwind().await;
                if outcome.is_err() {
                    error!(subscription = %id, "event handler panicked");
                }
            };
            if scheduler.spawn(dispatch).is_err() {
                error!(subscription = %id, "event dispatch skipped: scheduler closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use discovery_core::{AgentId, EventType};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn subscriber_receives_event() {
        let bus = EventBus::new();
        let scheduler = TaskScheduler::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);

        bus.subscribe(Arc::new(move |_event: DiscoveryEvent| {
            let received = Arc::clone(&received_clone);
            async move {
                received.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.emit(
            DiscoveryEvent::new(EventType::AgentRegistered, AgentId::new("x")),
            &scheduler,
        );

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsubscribed_handler_receives_nothing() {
        let bus = EventBus::new();
        let scheduler = TaskScheduler::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);

        let id = bus.subscribe(Arc::new(move |_event: DiscoveryEvent| {
            let received = Arc::clone(&received_clone);
            async move {
                received.fetch_add(1, Ordering::SeqCst);
            }
        }));
        bus.unsubscribe(id);

        bus.emit(
            DiscoveryEvent::new(EventType::AgentRegistered, AgentId::new("y")),
            &scheduler,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn panicking_handler_does_not_affect_other_subscribers() {
        let bus = EventBus::new();
        let scheduler = TaskScheduler::new();
        let received = Arc::new(AtomicUsize::new(0));
        let received_clone = Arc::clone(&received);

        bus.subscribe(Arc::new(|_event: DiscoveryEvent| async move {
            panic!("boom");
        }));
        bus.subscribe(Arc::new(move |_event: DiscoveryEvent| {
            let received = Arc::clone(&received_clone);
            async move {
                received.fetch_add(1, Ordering::SeqCst);
            }
        }));

        bus.emit(
            DiscoveryEvent::new(EventType::AgentRegistered, AgentId::new("z")),
            &scheduler,
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(received.load(Ordering::SeqCst), 1);
    }
}
