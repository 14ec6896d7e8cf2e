// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Domain Events
//
// Handlers subscribe to an event id and are invoked in registration order.
// Publishing never waits for handlers: dispatch runs on a tracked tokio task,
// and each handler invocation runs on its own task so an error or a panic in
// one handler is logged and the next handler still runs.
//
// A broadcast tap additionally streams every published event to observers.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, warn};

use crate::domain::events::DomainEvent;

/// A subscriber callback. Failures are reported through logging only.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Name used in logs when the handler fails.
    fn name(&self) -> &str;

    async fn handle(&self, event: DomainEvent) -> anyhow::Result<()>;
}

/// Event bus for publishing and subscribing to domain events
pub struct EventBus {
    handlers: RwLock<HashMap<String, Vec<Arc<dyn EventHandler>>>>,
    tap: broadcast::Sender<DomainEvent>,
    reactions: TaskTracker,
    // Serializes waiters: one waiter's reopen must not strand another.
    waiters: Mutex<()>,
}

impl EventBus {
    /// Create a new event bus. `tap_capacity` bounds how many events a slow
    /// tap receiver may lag behind before it starts dropping.
    pub fn new(tap_capacity: usize) -> Self {
        let (tap, _) = broadcast::channel(tap_capacity);
        Self {
            handlers: RwLock::new(HashMap::new()),
            tap,
            reactions: TaskTracker::new(),
            waiters: Mutex::new(()),
        }
    }

    /// Create event bus with default tap capacity (1000)
    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    /// Register `handler` for `event_id`. Handlers registered after an event
    /// was published do not see that event.
    pub fn subscribe(&self, event_id: &str, handler: Arc<dyn EventHandler>) {
        debug!(event_id, handler = handler.name(), "Registering event handler");
        self.handlers
            .write()
            .entry(event_id.to_string())
            .or_default()
            .push(handler);
    }

    /// Deliver `event` to its handlers without waiting for them.
    pub fn publish(&self, event: DomainEvent) {
        debug!(event_id = %event.event_id, "Publishing event");

        // No tap receivers is normal
        let _ = self.tap.send(event.clone());

        let handlers = self
            .handlers
            .read()
            .get(&event.event_id)
            .cloned()
            .unwrap_or_default();

        if handlers.is_empty() {
            debug!(event_id = %event.event_id, "No handlers subscribed to event");
            return;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            warn!(
                event_id = %event.event_id,
                "Event published outside a tokio runtime; handlers not invoked"
            );
            return;
        }

        self.reactions.spawn(dispatch(handlers, event));
    }

    /// Receive a copy of every event published from now on.
    pub fn tap(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.tap.subscribe(),
        }
    }

    /// Number of handlers registered for `event_id`.
    pub fn handler_count(&self, event_id: &str) -> usize {
        self.handlers.read().get(event_id).map_or(0, Vec::len)
    }

    /// Wait until every dispatch in flight has finished, including dispatches
    /// started by handlers while waiting. Concurrent callers take turns.
    pub async fn wait_for_reactions(&self) {
        let _turn = self.waiters.lock().await;
        self.reactions.close();
        self.reactions.wait().await;
        self.reactions.reopen();
    }
}

async fn dispatch(handlers: Vec<Arc<dyn EventHandler>>, event: DomainEvent) {
    for handler in handlers {
        let name = handler.name().to_string();
        let snapshot = event.clone();
        let outcome = tokio::spawn(async move { handler.handle(snapshot).await }).await;

        match outcome {
            Ok(Ok(())) => {
                debug!(event_id = %event.event_id, handler = %name, "Handler completed");
            }
            Ok(Err(e)) => {
                error!(
                    event_id = %event.event_id,
                    handler = %name,
                    error = ?e,
                    "Event handler failed"
                );
            }
            Err(join_error) => {
                error!(
                    event_id = %event.event_id,
                    handler = %name,
                    error = %join_error,
                    "Event handler panicked"
                );
            }
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

/// Receiver for all published domain events
pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    /// Receive the next event (waits until one is available)
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(|e| match e {
            broadcast::error::RecvError::Closed => EventBusError::Closed,
            broadcast::error::RecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }
}

/// Errors that can occur when receiving events
#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::events::{NODE_CREATED, NODE_DELETED};
    use crate::domain::node::NodeId;
    use parking_lot::Mutex;
    use std::time::Duration;

    struct Recorder {
        name: String,
        log: Arc<Mutex<Vec<String>>>,
        fail: bool,
        panic: bool,
    }

    impl Recorder {
        fn new(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self { name: name.to_string(), log: log.clone(), fail: false, panic: false })
        }

        fn failing(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self { name: name.to_string(), log: log.clone(), fail: true, panic: false })
        }

        fn panicking(name: &str, log: &Arc<Mutex<Vec<String>>>) -> Arc<Self> {
            Arc::new(Self { name: name.to_string(), log: log.clone(), fail: false, panic: true })
        }
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        async fn handle(&self, event: DomainEvent) -> anyhow::Result<()> {
            self.log.lock().push(format!("{}:{}", self.name, event.event_id));
            if self.panic {
                panic!("handler {} blew up", self.name);
            }
            if self.fail {
                anyhow::bail!("handler {} failed", self.name);
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_handlers_run_in_registration_order() {
        let bus = EventBus::with_default_capacity();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(NODE_DELETED, Recorder::new("first", &log));
        bus.subscribe(NODE_DELETED, Recorder::new("second", &log));
        bus.subscribe(NODE_CREATED, Recorder::new("other", &log));

        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        bus.wait_for_reactions().await;

        assert_eq!(
            *log.lock(),
            vec![format!("first:{NODE_DELETED}"), format!("second:{NODE_DELETED}")]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_is_isolated() {
        let bus = EventBus::with_default_capacity();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(NODE_DELETED, Recorder::new("one", &log));
        bus.subscribe(NODE_DELETED, Recorder::failing("two", &log));
        bus.subscribe(NODE_DELETED, Recorder::new("three", &log));

        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        bus.wait_for_reactions().await;

        let seen: Vec<String> = log.lock().iter().map(|e| e.split(':').next().unwrap().to_string()).collect();
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_panicking_handler_is_isolated() {
        let bus = EventBus::with_default_capacity();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(NODE_DELETED, Recorder::panicking("boom", &log));
        bus.subscribe(NODE_DELETED, Recorder::new("after", &log));

        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        bus.wait_for_reactions().await;

        assert_eq!(log.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_tap_receives_every_event() {
        let bus = EventBus::new(10);
        let mut receiver = bus.tap();
        let uuid = NodeId::new();

        bus.publish(DomainEvent::node_deleted("alice@example.com", uuid));

        let received = tokio::time::timeout(Duration::from_secs(1), receiver.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(received.payload.node_id(), uuid);
        assert!(matches!(receiver.try_recv(), Err(EventBusError::Empty)));
    }

    struct Slow {
        log: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl EventHandler for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        async fn handle(&self, event: DomainEvent) -> anyhow::Result<()> {
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.log.lock().push(event.event_id);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_waiters_all_return() {
        let bus = EventBus::with_default_capacity();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(NODE_DELETED, Arc::new(Slow { log: log.clone() }));

        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        let waiters = async { tokio::join!(bus.wait_for_reactions(), bus.wait_for_reactions()) };
        tokio::time::timeout(Duration::from_secs(2), waiters).await.unwrap();
        assert_eq!(log.lock().len(), 1);

        // The tracker is usable again afterwards.
        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        tokio::time::timeout(Duration::from_secs(2), bus.wait_for_reactions())
            .await
            .unwrap();
        assert_eq!(log.lock().len(), 2);
    }

    #[test]
    fn test_publish_outside_runtime_does_not_fail() {
        let bus = EventBus::default();
        let log = Arc::new(Mutex::new(Vec::new()));
        bus.subscribe(NODE_DELETED, Recorder::new("only", &log));
        bus.publish(DomainEvent::node_deleted("alice@example.com", NodeId::new()));
        assert!(log.lock().is_empty());
        assert_eq!(bus.handler_count(NODE_DELETED), 1);
    }
}
