// ============================================
// File: crates/peerlink-node/src/events/mod.rs
// ============================================
//! # Event Bus
//!
//! ## Creation Reason
//! Delivers node lifecycle and message events to in-process consumers,
//! in order, with a per-subscriber policy for full mailboxes.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`signal`]: the event envelope, with `reply` back to the peer
//! - [`subscriber`]: bounded mailbox with a delivery policy
//! - [`topic`]: subscribers of one event type
//! - [`broker`]: event type → topic map implementing [`Events`]
//!
//! ## Event Flow
//! ```text
//!   watch loop / node                     consumer
//!   ─────────────────                     ────────
//!   Broker::publish(signal).await
//!        │  (snapshot under shared lock)
//!        ▼
//!   Topic[event] ──► Subscriber::deliver ──► mailbox ──► listen ──► output
//!                         │ full?
//!                         ├─ block: wait for room (publisher stalls)
//!                         └─ drop_newest: dropped, warn
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Under `block` a consumer that stops reading stalls the watch loop
//!   feeding it, and in turn that peer's socket. Cancel or drop the
//!   stream to release it
//! - A subscriber sees the signals of one publisher in publish order
//!
//! ## Last Modified
//! v0.1.0 - Initial event bus

pub mod broker;
pub mod signal;
pub mod subscriber;
pub mod topic;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

pub use broker::Broker;
pub use signal::Signal;
pub use subscriber::{Delivery, Subscriber, SubscriberId};
pub use topic::Topic;

pub use crate::config::DeliveryPolicy;

// ============================================
// EventType
// ============================================

/// Kinds of events a node publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    /// The node bound its listen address; payload is the address.
    SelfListening,
    /// A handshake completed; payload is the peer's socket identity.
    NewPeerDetected,
    /// A message arrived; payload is the plaintext.
    MessageReceived,
    /// A peer was dropped (idle, I/O or security failure).
    PeerDisconnected,
    /// A connection was closed cleanly by either side.
    ClosedConnection,
}

impl EventType {
    /// Every event type, in lifecycle order.
    pub const ALL: [Self; 5] = [
        Self::SelfListening,
        Self::NewPeerDetected,
        Self::MessageReceived,
        Self::PeerDisconnected,
        Self::ClosedConnection,
    ];

    /// Kebab-case name used in logs.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::SelfListening => "self-listening",
            Self::NewPeerDetected => "new-peer-detected",
            Self::MessageReceived => "message-received",
            Self::PeerDisconnected => "peer-disconnected",
            Self::ClosedConnection => "closed-connection",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================
// Events Trait
// ============================================

/// Publish/subscribe capability set.
#[async_trait]
pub trait Events: Send + Sync {
    /// Adds `subscriber` to the topic for `event`.
    fn register(&self, event: EventType, subscriber: &Arc<Subscriber>);

    /// Removes `subscriber` from the topic for `event`.
    ///
    /// Returns `false` when the topic or subscriber is unknown.
    fn unregister(&self, event: EventType, subscriber: &Subscriber) -> bool;

    /// Fans `signal` out to its topic; returns how many subscribers
    /// accepted it. Waits on subscribers whose policy is `block`.
    async fn publish(&self, signal: Signal) -> usize;
}
