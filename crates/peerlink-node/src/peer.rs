// ============================================
// File: crates/peerlink-node/src/peer.rs
// ============================================
//! # Peer Handle
//!
//! ## Creation Reason
//! One connected remote: its socket identity, its encrypted session and
//! the write half of its stream. The read half belongs to the watch loop.
//!
//! ## Connection State
//! ```text
//! Connecting ──► Handshaking ──► Connected ──► Disconnected
//!      │               │                            ▲
//!      └───────────────┴────────── failure ─────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - `send` holds the writer lock across encrypt and write so counters
//!   reach the wire in order
//! - `close` is idempotent and only ever shuts the write half; the watch
//!   loop notices through the `closed` watch channel
//! - A failed or timed-out write may leave half a frame on the wire, so
//!   `send` closes the peer with `CloseReason::WriteFailed` and the watch
//!   loop unroutes it
//! - Every successful read or write calls `touch`
//!
//! ## Last Modified
//! v0.1.0 - Initial peer handle

use std::time::Duration;

use parking_lot::RwLock;
use tokio::io::AsyncWriteExt;
use tokio::sync::{watch, Mutex, MutexGuard};
use tracing::{debug, trace, warn};

use peerlink_common::{AtomicInstant, SocketId};
use peerlink_core::TRANSPORT_OVERHEAD;
use peerlink_transport::{write_frame, BoxedWriter, TransportError};

use crate::error::{NodeError, Result};
use crate::services::Session;

/// Bound on how long `close` waits for an in-flight write.
const CLOSE_GRACE: Duration = Duration::from_secs(1);

// ============================================
// ConnectionState
// ============================================

/// Per-connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Socket open, handshake not started.
    Connecting,
    /// Noise XX messages in flight.
    Handshaking,
    /// Session established and routed.
    Connected,
    /// Closed; terminal.
    Disconnected,
}

/// Why a peer was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// `close` was called (node shutdown, teardown, replacement).
    Local,
    /// A write failed or timed out and the stream is no longer framed.
    WriteFailed,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Handshaking => write!(f, "Handshaking"),
            Self::Connected => write!(f, "Connected"),
            Self::Disconnected => write!(f, "Disconnected"),
        }
    }
}

// ============================================
// PeerLimits
// ============================================

/// Limits applied to one peer.
#[derive(Debug, Clone, Copy)]
pub struct PeerLimits {
    /// Idle deadline, also the bound on a single write.
    pub deadline: Duration,
    /// Largest plaintext accepted by `send` and by the watch loop.
    pub max_payload: usize,
}

impl PeerLimits {
    /// Largest frame body a peer with these limits may put on the wire.
    #[must_use]
    pub const fn max_frame(&self) -> usize {
        self.max_payload + TRANSPORT_OVERHEAD
    }
}

impl Default for PeerLimits {
    fn default() -> Self {
        Self {
            deadline: Duration::from_secs(1800),
            max_payload: 65_536,
        }
    }
}

// ============================================
// Peer
// ============================================

/// A connected remote node.
pub struct Peer {
    socket: SocketId,
    session: Session,
    writer: Mutex<BoxedWriter>,
    state: RwLock<ConnectionState>,
    last_activity: AtomicInstant,
    closed: watch::Sender<Option<CloseReason>>,
    limits: PeerLimits,
}

impl Peer {
    /// Wraps the write half of a fresh connection.
    #[must_use]
    pub fn new(socket: SocketId, writer: BoxedWriter, limits: PeerLimits) -> Self {
        let (closed, _) = watch::channel(None);
        Self {
            socket,
            session: Session::new(),
            writer: Mutex::new(writer),
            state: RwLock::new(ConnectionState::Connecting),
            last_activity: AtomicInstant::now(),
            closed,
            limits,
        }
    }

    /// Socket identity this peer is routed under.
    #[must_use]
    pub const fn socket(&self) -> &SocketId {
        &self.socket
    }

    /// Encrypted session.
    #[must_use]
    pub const fn session(&self) -> &Session {
        &self.session
    }

    /// Limits applied to this peer.
    #[must_use]
    pub const fn limits(&self) -> PeerLimits {
        self.limits
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.read()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write();
        if *current != ConnectionState::Disconnected {
            trace!(peer = %self.socket, from = %*current, to = %state, "peer state");
            *current = state;
        }
    }

    /// Extends the idle deadline.
    pub fn touch(&self) {
        self.last_activity.touch();
    }

    /// Time since the last successful read or write.
    #[must_use]
    pub fn idle_for(&self) -> Duration {
        self.last_activity.idle_for()
    }

    /// Exclusive access to the write half (handshake and `send`).
    pub(crate) async fn lock_writer(&self) -> MutexGuard<'_, BoxedWriter> {
        self.writer.lock().await
    }

    /// Encrypts and writes one message.
    ///
    /// Returns the number of plaintext bytes sent, which is always
    /// `payload.len()`; framing and AEAD overhead are not counted.
    ///
    /// # Errors
    /// - `PeerClosed` after `close`
    /// - `PayloadTooLarge` above `max_payload`
    /// - `Timeout` if the write does not finish within the deadline
    /// - Session and transport errors otherwise
    ///
    /// A write error or timeout also closes the peer.
    pub async fn send(&self, payload: &[u8]) -> Result<usize> {
        if self.is_closed() {
            return Err(NodeError::PeerClosed {
                socket: self.socket.to_string(),
            });
        }
        if payload.len() > self.limits.max_payload {
            return Err(NodeError::PayloadTooLarge {
                size: payload.len(),
                max: self.limits.max_payload,
            });
        }

        let written = {
            let mut writer = self.writer.lock().await;
            let body = self.session.encrypt(payload)?;

            tokio::time::timeout(
                self.limits.deadline,
                write_frame(&mut *writer, &body, self.limits.max_frame()),
            )
            .await
            .unwrap_or_else(|_| Err(TransportError::timeout(format!("write to {}", self.socket))))
        };

        if let Err(e) = written {
            warn!(peer = %self.socket, error = %e, "Write failed, closing peer");
            self.shut(CloseReason::WriteFailed).await;
            return Err(e.into());
        }

        self.touch();
        trace!(peer = %self.socket, len = payload.len(), "message sent");
        Ok(payload.len())
    }

    /// True once `close` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.borrow().is_some()
    }

    /// Why the peer was closed, if it was.
    #[must_use]
    pub fn close_reason(&self) -> Option<CloseReason> {
        *self.closed.borrow()
    }

    /// Receiver that turns `Some` on close.
    #[must_use]
    pub fn closed_watch(&self) -> watch::Receiver<Option<CloseReason>> {
        self.closed.subscribe()
    }

    /// Marks the peer disconnected and shuts the write half.
    ///
    /// Returns `false` if the peer was already closed.
    pub async fn close(&self) -> bool {
        self.shut(CloseReason::Local).await
    }

    async fn shut(&self, reason: CloseReason) -> bool {
        let first = self.closed.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
        if !first {
            return false;
        }
        *self.state.write() = ConnectionState::Disconnected;

        match tokio::time::timeout(CLOSE_GRACE, self.writer.lock()).await {
            Ok(mut writer) => {
                if let Err(e) = writer.shutdown().await {
                    debug!(peer = %self.socket, error = %e, "writer shutdown failed");
                }
            }
            Err(_) => debug!(peer = %self.socket, "writer busy, skipping shutdown"),
        }

        debug!(peer = %self.socket, ?reason, "peer closed");
        true
    }
}

impl std::fmt::Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer")
            .field("socket", &self.socket)
            .field("state", &self.state())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::AsyncWrite;

    use super::*;
    use peerlink_core::crypto::{CipherState, SessionKey};
    use peerlink_transport::{read_frame, Connection, ReadOutcome};

    /// Writer that never makes progress.
    struct StuckWriter;

    impl AsyncWrite for StuckWriter {
        fn poll_write(
            self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            _buf: &[u8],
        ) -> Poll<io::Result<usize>> {
            Poll::Pending
        }

        fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
            Poll::Ready(Ok(()))
        }
    }

    fn established(writer: BoxedWriter, limits: PeerLimits) -> Peer {
        let peer = Peer::new(SocketId::new("127.0.0.1:7000").unwrap(), writer, limits);
        peer.session()
            .set_ciphers(
                CipherState::with_key(SessionKey::from_bytes([1u8; 32])),
                CipherState::with_key(SessionKey::from_bytes([2u8; 32])),
            )
            .unwrap();
        peer
    }

    #[tokio::test]
    async fn test_send_writes_one_frame() {
        let (local, mut remote) = Connection::pair();
        let peer = established(local.writer, PeerLimits::default());

        assert_eq!(peer.send(b"hello").await.unwrap(), 5);

        let outcome = read_frame(&mut remote.reader, 1024).await.unwrap();
        let ReadOutcome::Frame(body) = outcome else {
            panic!("expected a frame, got {outcome:?}");
        };
        assert_eq!(body.len(), 5 + TRANSPORT_OVERHEAD);
        assert_eq!(&body[..8], &0u64.to_le_bytes());
    }

    #[tokio::test]
    async fn test_send_rejects_large_payload() {
        let limits = PeerLimits {
            max_payload: 4,
            ..PeerLimits::default()
        };
        let peer = established(Box::new(tokio::io::sink()), limits);
        let err = peer.send(b"too long").await.unwrap_err();
        assert!(matches!(err, NodeError::PayloadTooLarge { size: 8, max: 4 }));
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_sends_eof() {
        let (local, mut remote) = Connection::pair();
        let peer = established(local.writer, PeerLimits::default());
        let mut closed = peer.closed_watch();

        assert!(peer.close().await);
        assert!(!peer.close().await);
        assert!(peer.is_closed());
        assert_eq!(*closed.borrow_and_update(), Some(CloseReason::Local));
        assert_eq!(peer.state(), ConnectionState::Disconnected);

        assert_eq!(read_frame(&mut remote.reader, 64).await.unwrap(), ReadOutcome::Closed);
        assert!(matches!(peer.send(b"x").await, Err(NodeError::PeerClosed { .. })));
    }

    #[tokio::test]
    async fn test_stalled_write_closes_peer() {
        let limits = PeerLimits {
            deadline: Duration::from_millis(50),
            ..PeerLimits::default()
        };
        let peer = established(Box::new(StuckWriter), limits);

        let err = peer.send(b"hello").await.unwrap_err();
        assert!(matches!(err, NodeError::Transport(TransportError::Timeout { .. })));
        assert!(peer.is_closed());
        assert_eq!(peer.close_reason(), Some(CloseReason::WriteFailed));
        assert_eq!(peer.state(), ConnectionState::Disconnected);

        // Nothing more goes after the partial frame.
        assert!(matches!(peer.send(b"again").await, Err(NodeError::PeerClosed { .. })));
        assert!(!peer.close().await);
    }

    #[tokio::test]
    async fn test_write_error_closes_peer() {
        // The far end is gone, so every write is a broken pipe.
        let (dead, _) = tokio::io::duplex(64);
        let peer = established(Box::new(dead), PeerLimits::default());

        assert!(peer.send(b"hello").await.is_err());
        assert_eq!(peer.close_reason(), Some(CloseReason::WriteFailed));
    }

    #[test]
    fn test_state_is_terminal_after_disconnect() {
        let peer = Peer::new(
            SocketId::new("127.0.0.1:7001").unwrap(),
            Box::new(tokio::io::sink()),
            PeerLimits::default(),
        );
        assert_eq!(peer.state(), ConnectionState::Connecting);
        peer.set_state(ConnectionState::Handshaking);
        peer.set_state(ConnectionState::Disconnected);
        peer.set_state(ConnectionState::Connected);
        assert_eq!(peer.state(), ConnectionState::Disconnected);
    }
}
