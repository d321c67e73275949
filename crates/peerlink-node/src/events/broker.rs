// ============================================
// File: crates/peerlink-node/src/events/broker.rs
// ============================================
//! # Broker
//!
//! ## Creation Reason
//! Owns the event type → topic map for one node. Each node builds its
//! own broker, so nodes in one process never see each other's events.
//!
//! ## Main Functionality
//! - `register` / `unregister` under the write lock
//! - `publish` snapshots the topic, then awaits each subscriber in turn
//! - `clear` closes every mailbox on node shutdown
//!
//! ## ⚠️ Important Note for Next Developer
//! - The topic lock is never held across an await; a subscriber that
//!   registers mid-publish sees the next signal, not this one
//!
//! ## Last Modified
//! v0.1.0 - Initial broker

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::events::{EventType, Events, Signal, Subscriber, Topic};

/// In-process event broker.
#[derive(Default)]
pub struct Broker {
    topics: RwLock<HashMap<EventType, Topic>>,
}

impl Broker {
    /// Creates a broker with no topics.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of subscribers registered for `event`.
    #[must_use]
    pub fn subscriber_count(&self, event: EventType) -> usize {
        self.topics.read().get(&event).map_or(0, Topic::len)
    }

    /// Removes every topic and closes every subscriber.
    pub fn clear(&self) {
        let topics = std::mem::take(&mut *self.topics.write());
        let mut closed = 0;
        for topic in topics.values() {
            for subscriber in topic.subscribers() {
                subscriber.close();
                closed += 1;
            }
        }
        debug!(registrations = closed, "Broker cleared");
    }
}

#[async_trait]
impl Events for Broker {
    fn register(&self, event: EventType, subscriber: &Arc<Subscriber>) {
        let mut topics = self.topics.write();
        if topics.entry(event).or_default().add(subscriber) {
            debug!(event = %event, subscriber = subscriber.id(), "Subscriber registered");
        }
    }

    fn unregister(&self, event: EventType, subscriber: &Subscriber) -> bool {
        let mut topics = self.topics.write();
        let Some(topic) = topics.get_mut(&event) else {
            return false;
        };

        let removed = topic.remove(subscriber.id());
        if topic.is_empty() {
            topics.remove(&event);
        }
        if removed {
            debug!(event = %event, subscriber = subscriber.id(), "Subscriber unregistered");
        }
        removed
    }

    async fn publish(&self, signal: Signal) -> usize {
        let subscribers: Vec<Arc<Subscriber>> = {
            let topics = self.topics.read();
            topics
                .get(&signal.event())
                .map(|topic| topic.subscribers().to_vec())
                .unwrap_or_default()
        };
        if subscribers.is_empty() {
            trace!(event = %signal.event(), "No subscribers");
            return 0;
        }

        let mut notified = 0;
        for subscriber in &subscribers {
            if subscriber.deliver(signal.clone()).await.is_notified() {
                notified += 1;
            }
        }

        trace!(event = %signal.event(), notified, "Signal published");
        notified
    }
}

impl std::fmt::Debug for Broker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Broker")
            .field("topics", &self.topics.read().len())
            .finish()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DeliveryPolicy;
    use tokio::sync::mpsc;

    fn subscriber() -> Arc<Subscriber> {
        Arc::new(Subscriber::new(8, DeliveryPolicy::Block))
    }

    async fn drain(subscriber: &Arc<Subscriber>) -> Vec<Signal> {
        let (tx, mut rx) = mpsc::channel(8);
        subscriber.close();
        subscriber.listen(std::future::pending(), tx).await;
        let mut out = Vec::new();
        while let Some(signal) = rx.recv().await {
            out.push(signal);
        }
        out
    }

    #[tokio::test]
    async fn test_register_then_publish() {
        let broker = Broker::new();
        let sub = subscriber();
        broker.register(EventType::SelfListening, &sub);

        let (tx, mut rx) = mpsc::channel(1);
        let listener = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.listen(std::future::pending(), tx).await }
        });

        let notified = broker
            .publish(Signal::new(EventType::SelfListening, "hello", None))
            .await;
        assert_eq!(notified, 1);

        let received = rx.recv().await.unwrap();
        assert_eq!(received.event(), EventType::SelfListening);
        assert_eq!(&received.payload()[..], b"hello");

        broker.clear();
        listener.await.unwrap();
    }

    #[tokio::test]
    async fn test_publish_without_subscribers() {
        let broker = Broker::new();
        assert_eq!(
            broker
                .publish(Signal::new(EventType::MessageReceived, "x", None))
                .await,
            0
        );
    }

    #[test]
    fn test_unregister_unknown_is_false() {
        let broker = Broker::new();
        let sub = subscriber();
        assert!(!broker.unregister(EventType::PeerDisconnected, &sub));

        broker.register(EventType::NewPeerDetected, &sub);
        assert!(!broker.unregister(EventType::PeerDisconnected, &sub));
        assert!(broker.unregister(EventType::NewPeerDetected, &sub));
        assert!(!broker.unregister(EventType::NewPeerDetected, &sub));
        assert_eq!(broker.subscriber_count(EventType::NewPeerDetected), 0);
    }

    #[tokio::test]
    async fn test_every_subscriber_gets_one_copy() {
        let broker = Broker::new();
        let subs: Vec<_> = (0..3).map(|_| subscriber()).collect();
        for sub in &subs {
            broker.register(EventType::MessageReceived, sub);
            broker.register(EventType::MessageReceived, sub);
        }
        let bystander = subscriber();
        broker.register(EventType::ClosedConnection, &bystander);

        assert_eq!(broker.subscriber_count(EventType::MessageReceived), 3);
        assert_eq!(
            broker
                .publish(Signal::new(EventType::MessageReceived, "payload", None))
                .await,
            3
        );

        for sub in &subs {
            let got = drain(sub).await;
            assert_eq!(got.len(), 1);
            assert_eq!(&got[0].payload()[..], b"payload");
        }
        assert!(drain(&bystander).await.is_empty());
    }

    #[tokio::test]
    async fn test_closed_subscriber_not_counted() {
        let broker = Broker::new();
        let sub = subscriber();
        broker.register(EventType::PeerDisconnected, &sub);
        sub.close();

        assert_eq!(
            broker
                .publish(Signal::new(EventType::PeerDisconnected, "gone", None))
                .await,
            0
        );
    }

    #[tokio::test]
    async fn test_slow_subscriber_gets_every_signal_in_order() {
        let broker = Arc::new(Broker::new());
        let sub = Arc::new(Subscriber::new(2, DeliveryPolicy::Block));
        broker.register(EventType::MessageReceived, &sub);

        let publisher = tokio::spawn({
            let broker = Arc::clone(&broker);
            async move {
                for i in 0..20u8 {
                    let notified = broker
                        .publish(Signal::new(EventType::MessageReceived, vec![i], None))
                        .await;
                    assert_eq!(notified, 1);
                }
            }
        });

        // The publisher stalls on the full mailbox until someone reads.
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert!(!publisher.is_finished());

        let (tx, mut rx) = mpsc::channel(1);
        let listener = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.listen(std::future::pending(), tx).await }
        });

        let mut seen = Vec::new();
        while seen.len() < 20 {
            seen.push(rx.recv().await.unwrap().payload()[0]);
        }
        assert_eq!(seen, (0..20).collect::<Vec<u8>>());

        publisher.await.unwrap();
        broker.clear();
        listener.await.unwrap();
    }
}
