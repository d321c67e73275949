// ============================================
// File: crates/peerlink-node/src/events/signal.rs
// ============================================
//! # Signal
//!
//! Read-only event envelope. `reply` writes straight to the peer that
//! triggered the event, bypassing the broker.
//!
//! ## Last Modified
//! v0.1.0 - Initial signal envelope

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{NodeError, Result};
use crate::events::EventType;
use crate::peer::Peer;

/// An event delivered to subscribers.
#[derive(Clone)]
pub struct Signal {
    event: EventType,
    payload: Bytes,
    peer: Option<Arc<Peer>>,
}

impl Signal {
    /// Wraps an event, its payload and the peer it concerns.
    #[must_use]
    pub fn new(event: EventType, payload: impl Into<Bytes>, peer: Option<Arc<Peer>>) -> Self {
        Self {
            event,
            payload: payload.into(),
            peer,
        }
    }

    /// Kind of event.
    #[must_use]
    pub const fn event(&self) -> EventType {
        self.event
    }

    /// Event payload; see [`EventType`] for what each kind carries.
    #[must_use]
    pub const fn payload(&self) -> &Bytes {
        &self.payload
    }

    /// Peer that triggered the event, if any.
    #[must_use]
    pub fn peer(&self) -> Option<&Arc<Peer>> {
        self.peer.as_ref()
    }

    /// Sends `data` to the originating peer.
    ///
    /// # Errors
    /// `NoReplyPeer` for node-level events, otherwise as [`Peer::send`].
    pub async fn reply(&self, data: &[u8]) -> Result<usize> {
        let peer = self.peer.as_ref().ok_or(NodeError::NoReplyPeer)?;
        peer.send(data).await
    }
}

impl fmt::Debug for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("event", &self.event)
            .field("payload_len", &self.payload.len())
            .field("peer", &self.peer.as_ref().map(|p| p.socket().to_string()))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reply_without_peer() {
        let signal = Signal::new(EventType::SelfListening, "127.0.0.1:9090", None);
        assert_eq!(signal.event(), EventType::SelfListening);
        assert_eq!(&signal.payload()[..], b"127.0.0.1:9090");
        assert!(matches!(signal.reply(b"hi").await, Err(NodeError::NoReplyPeer)));
    }
}
