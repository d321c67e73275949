// ============================================
// File: crates/peerlink-node/src/events/topic.rs
// ============================================
//! # Topic
//!
//! Subscribers of one event type. Positions are indexed so removal is
//! O(1) (`swap_remove` plus one index fix-up).
//!
//! ## Last Modified
//! v0.1.0 - Initial topic

use std::collections::HashMap;
use std::sync::Arc;

use crate::events::{Subscriber, SubscriberId};

/// Ordered set of subscribers for one event type.
#[derive(Debug, Default)]
pub struct Topic {
    subscribers: Vec<Arc<Subscriber>>,
    positions: HashMap<SubscriberId, usize>,
}

impl Topic {
    /// Creates an empty topic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a subscriber; returns `false` if it is already present.
    pub fn add(&mut self, subscriber: &Arc<Subscriber>) -> bool {
        let id = subscriber.id();
        if self.positions.contains_key(&id) {
            return false;
        }
        self.positions.insert(id, self.subscribers.len());
        self.subscribers.push(Arc::clone(subscriber));
        true
    }

    /// Removes a subscriber; returns `false` if it is unknown.
    pub fn remove(&mut self, id: SubscriberId) -> bool {
        let Some(index) = self.positions.remove(&id) else {
            return false;
        };
        self.subscribers.swap_remove(index);
        if let Some(moved) = self.subscribers.get(index) {
            self.positions.insert(moved.id(), index);
        }
        true
    }

    /// True if the subscriber is present.
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.positions.contains_key(&id)
    }

    /// Subscribers in registration order (until a removal swaps one in).
    #[must_use]
    pub fn subscribers(&self) -> &[Arc<Subscriber>] {
        &self.subscribers
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    /// True if nobody is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }
}
