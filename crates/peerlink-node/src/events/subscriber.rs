// ============================================
// File: crates/peerlink-node/src/events/subscriber.rs
// ============================================
//! # Subscriber
//!
//! ## Creation Reason
//! A consumer endpoint on the event bus: a bounded mailbox plus the policy
//! applied when that mailbox is full.
//!
//! ## Main Functionality
//! - `try_emit`: non-blocking hand-off
//! - `emit`: blocking hand-off (backpressure)
//! - `deliver`: what `publish` awaits; applies the delivery policy
//! - `listen`: forwards the mailbox to an output channel until cancelled
//!
//! ## ⚠️ Important Note for Next Developer
//! - Under `block`, `deliver` waits for room in the mailbox, so a stalled
//!   consumer stalls whoever publishes to it. Signals are never dropped
//!   and stay in publish order
//! - Only `drop_newest` drops, and it warns each time
//! - `close` releases every pending `deliver` and closes an idle mailbox;
//!   signals already queued can still be drained by `listen`
//! - A cancelled `listen` puts the mailbox back; it can be resumed
//!
//! ## Last Modified
//! v0.1.0 - Initial subscriber

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, RwLock};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

use crate::config::DeliveryPolicy;
use crate::events::Signal;

/// Unique subscriber identifier.
pub type SubscriberId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Outcome of [`Subscriber::deliver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Placed in the mailbox.
    Delivered,
    /// Mailbox full under `drop_newest`.
    Dropped,
    /// The subscriber is closed.
    Closed,
}

impl Delivery {
    /// True if the subscriber will see the signal.
    #[must_use]
    pub const fn is_notified(self) -> bool {
        matches!(self, Self::Delivered)
    }
}

/// Bounded mailbox on the event bus.
pub struct Subscriber {
    id: SubscriberId,
    sender: RwLock<Option<mpsc::Sender<Signal>>>,
    receiver: Mutex<Option<mpsc::Receiver<Signal>>>,
    policy: DeliveryPolicy,
    closed: watch::Sender<bool>,
}

impl Subscriber {
    /// Creates a subscriber whose mailbox holds `capacity` signals.
    #[must_use]
    pub fn new(capacity: usize, policy: DeliveryPolicy) -> Self {
        let capacity = capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let (closed, _) = watch::channel(false);
        Self {
            id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
            sender: RwLock::new(Some(tx)),
            receiver: Mutex::new(Some(rx)),
            policy,
            closed,
        }
    }

    /// Process-unique id, used as the topic key.
    #[must_use]
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Policy applied when the mailbox is full.
    #[must_use]
    pub const fn policy(&self) -> DeliveryPolicy {
        self.policy
    }

    /// True once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Places `signal` in the mailbox without waiting.
    ///
    /// # Errors
    /// Hands the signal back when the mailbox is full or closed.
    pub fn try_emit(&self, signal: Signal) -> Result<(), TrySendError<Signal>> {
        match self.sender.read().as_ref() {
            Some(tx) => tx.try_send(signal),
            None => Err(TrySendError::Closed(signal)),
        }
    }

    /// Places `signal` in the mailbox, waiting for room.
    ///
    /// Returns `false` if the subscriber closed first, including while
    /// waiting.
    pub async fn emit(&self, signal: Signal) -> bool {
        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            return false;
        };
        let mut closed = self.closed.subscribe();

        tokio::select! {
            biased;
            sent = sender.send(signal) => sent.is_ok(),
            _ = closed.wait_for(|closed| *closed) => false,
        }
    }

    /// Delivery used by the broker.
    ///
    /// `block` waits until the mailbox has room; `drop_newest` gives up
    /// on a full mailbox straight away.
    pub async fn deliver(&self, signal: Signal) -> Delivery {
        match self.policy {
            DeliveryPolicy::Block => {
                if self.emit(signal).await {
                    Delivery::Delivered
                } else {
                    Delivery::Closed
                }
            }
            DeliveryPolicy::DropNewest => match self.try_emit(signal) {
                Ok(()) => Delivery::Delivered,
                Err(TrySendError::Closed(_)) => Delivery::Closed,
                Err(TrySendError::Full(signal)) => {
                    warn!(subscriber = self.id, event = %signal.event(), "Mailbox full, signal dropped");
                    Delivery::Dropped
                }
            },
        }
    }

    /// Forwards mailbox signals to `output` until `cancel` resolves, the
    /// mailbox closes or `output` is dropped.
    pub async fn listen<F>(&self, cancel: F, output: mpsc::Sender<Signal>)
    where
        F: Future<Output = ()>,
    {
        let taken = self.receiver.lock().take();
        let Some(mut rx) = taken else {
            warn!(subscriber = self.id, "Subscriber is already listening or closed");
            return;
        };

        tokio::pin!(cancel);
        let cancelled = loop {
            tokio::select! {
                biased;
                () = &mut cancel => break true,
                next = rx.recv() => {
                    let Some(signal) = next else { break false };
                    tokio::select! {
                        biased;
                        () = &mut cancel => break true,
                        sent = output.send(signal) => {
                            if sent.is_err() {
                                break false;
                            }
                        }
                    }
                }
            }
        };

        if cancelled && !self.is_closed() {
            *self.receiver.lock() = Some(rx);
        }
        debug!(subscriber = self.id, cancelled, "Subscriber stopped listening");
    }

    /// Closes the mailbox and releases pending deliveries. Signals already
    /// queued are still drained by an active `listen`.
    pub fn close(&self) {
        let sender = self.sender.write().take();
        self.closed.send_replace(true);
        if let Some(rx) = self.receiver.lock().as_mut() {
            rx.close();
        }
        if sender.is_some() {
            debug!(subscriber = self.id, "Subscriber closed");
        }
    }
}

impl std::fmt::Debug for Subscriber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscriber")
            .field("id", &self.id)
            .field("policy", &self.policy)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::events::EventType;
    use tokio::sync::oneshot;

    fn signal(payload: &'static str) -> Signal {
        Signal::new(EventType::MessageReceived, payload, None)
    }

    #[tokio::test]
    async fn test_try_emit_full_and_closed() {
        let sub = Subscriber::new(1, DeliveryPolicy::Block);
        sub.try_emit(signal("a")).unwrap();
        assert!(matches!(sub.try_emit(signal("b")), Err(TrySendError::Full(_))));

        sub.close();
        assert!(sub.is_closed());
        assert!(matches!(sub.try_emit(signal("c")), Err(TrySendError::Closed(_))));
        assert!(!sub.emit(signal("d")).await);
    }

    #[tokio::test]
    async fn test_listen_forwards_until_cancelled() {
        let sub = Arc::new(Subscriber::new(4, DeliveryPolicy::Block));
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let (cancel_tx, cancel_rx) = oneshot::channel::<()>();

        let listener = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move {
                sub.listen(
                    async move {
                        let _ = cancel_rx.await;
                    },
                    out_tx,
                )
                .await;
            }
        });

        assert!(sub.emit(signal("one")).await);
        assert_eq!(&out_rx.recv().await.unwrap().payload()[..], b"one");

        cancel_tx.send(()).unwrap();
        listener.await.unwrap();
        assert!(out_rx.recv().await.is_none());

        // Mailbox is handed back after cancellation.
        sub.try_emit(signal("two")).unwrap();
        let (out_tx, mut out_rx) = mpsc::channel(4);
        let resumed = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.listen(std::future::pending(), out_tx).await }
        });
        assert_eq!(&out_rx.recv().await.unwrap().payload()[..], b"two");

        sub.close();
        resumed.await.unwrap();
    }

    #[tokio::test]
    async fn test_drop_newest_policy() {
        let sub = Subscriber::new(1, DeliveryPolicy::DropNewest);
        assert_eq!(sub.deliver(signal("kept")).await, Delivery::Delivered);
        assert_eq!(sub.deliver(signal("dropped")).await, Delivery::Dropped);
    }

    #[tokio::test]
    async fn test_block_policy_waits_for_room() {
        let sub = Arc::new(Subscriber::new(1, DeliveryPolicy::Block));
        assert_eq!(sub.deliver(signal("first")).await, Delivery::Delivered);

        let pending = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.deliver(signal("second")).await }
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished(), "block policy returned on a full mailbox");

        let (out_tx, mut out_rx) = mpsc::channel(4);
        let listener = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.listen(std::future::pending(), out_tx).await }
        });

        assert_eq!(&out_rx.recv().await.unwrap().payload()[..], b"first");
        assert_eq!(&out_rx.recv().await.unwrap().payload()[..], b"second");
        assert_eq!(pending.await.unwrap(), Delivery::Delivered);

        sub.close();
        listener.await.unwrap();
        assert!(out_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_close_releases_blocked_delivery() {
        let sub = Arc::new(Subscriber::new(1, DeliveryPolicy::Block));
        assert_eq!(sub.deliver(signal("queued")).await, Delivery::Delivered);

        let pending = tokio::spawn({
            let sub = Arc::clone(&sub);
            async move { sub.deliver(signal("stuck")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;

        sub.close();
        let outcome = tokio::time::timeout(Duration::from_secs(1), pending)
            .await
            .expect("close did not release the delivery")
            .unwrap();
        assert_eq!(outcome, Delivery::Closed);
    }
}
