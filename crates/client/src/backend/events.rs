//! Auth event fan-out.

use clubhub_core::AuthEvent;
use tokio::sync::broadcast;
use tracing::warn;

/// Buffered events per subscriber before the oldest are dropped.
const EVENT_CAPACITY: usize = 32;

/// Publishes auth events to every live [`AuthSubscription`].
#[derive(Debug, Clone)]
pub struct AuthEventBus {
    tx: broadcast::Sender<AuthEvent>,
}

impl AuthEventBus {
    /// Create a bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    /// Publish an event. Events with no subscribers are dropped.
    pub fn publish(&self, event: AuthEvent) {
        // Err only means nobody is listening.
        let _ = self.tx.send(event);
    }

    /// Open a new subscription starting at the next published event.
    #[must_use]
    pub fn subscribe(&self) -> AuthSubscription {
        AuthSubscription {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AuthEventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Live subscription to auth events. Dropping it unsubscribes.
#[derive(Debug)]
pub struct AuthSubscription {
    rx: broadcast::Receiver<AuthEvent>,
}

impl AuthSubscription {
    /// Wait for the next event.
    ///
    /// Returns `None` once the publisher is gone. A subscriber that falls
    /// behind skips the events it missed and continues with the oldest one
    /// still buffered.
    pub async fn next(&mut self) -> Option<AuthEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth event subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clubhub_core::{AuthEventKind, UserId};

    #[tokio::test]
    async fn test_subscribers_receive_published_events() {
        let bus = AuthEventBus::new();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(AuthEvent::signed_in(UserId::new("u1")));

        assert_eq!(
            first.next().await.map(|e| e.kind),
            Some(AuthEventKind::SignedIn)
        );
        assert_eq!(
            second.next().await.map(|e| e.kind),
            Some(AuthEventKind::SignedIn)
        );
    }

    #[tokio::test]
    async fn test_subscription_ends_when_bus_dropped() {
        let bus = AuthEventBus::new();
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips_ahead() {
        let bus = AuthEventBus::new();
        let mut sub = bus.subscribe();

        for _ in 0..EVENT_CAPACITY {
            bus.publish(AuthEvent::token_refreshed(UserId::new("u1")));
        }
        bus.publish(AuthEvent::signed_out());
        bus.publish(AuthEvent::signed_out());

        // The first buffered events were overwritten; we still get something.
        assert!(sub.next().await.is_some());
    }
}
