// ============================================
// File: crates/peerlink-node/src/handlers/watch.rs
// ============================================
//! # Peer Watch Loop
//!
//! ## Creation Reason
//! Owns the read half of one established connection: decrypts inbound
//! frames, publishes them, and tears the peer down when it goes away.
//!
//! ## Loop Outcomes
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────┐
//! │ Read outcome             │ Action                                   │
//! ├──────────────────────────┼──────────────────────────────────────────┤
//! │ frame, decrypts          │ touch, publish MessageReceived, continue │
//! │ oversized frame          │ drained, warn, continue                  │
//! │ EOF at frame boundary    │ remove, close, publish ClosedConnection  │
//! │ idle past deadline       │ remove, close, publish PeerDisconnected  │
//! │ I/O or decrypt failure   │ remove, close, publish PeerDisconnected  │
//! │ `send` failed mid-write  │ remove, publish PeerDisconnected         │
//! │ local close / shutdown   │ exit quietly                             │
//! └──────────────────────────┴──────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The deadline slides: it is measured from the peer's last successful
//!   read or write, so outbound traffic keeps a quiet reader alive
//! - A pending read is never dropped mid-frame while the peer is alive;
//!   the timer is re-armed around the same read future
//! - This loop is the only place `PeerDisconnected` is published
//! - Publishing awaits the broker, so a consumer that stops reading
//!   under the `block` policy pauses this loop (and the peer's socket)
//!
//! ## Last Modified
//! v0.1.0 - Initial watch loop

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

use peerlink_transport::{read_frame, BoxedReader, ReadOutcome, TransportError};

use crate::error::NodeError;
use crate::events::{EventType, Events, Signal};
use crate::peer::{CloseReason, Peer};
use crate::services::Router;

/// Shared node state a watch loop needs.
pub struct WatchContext {
    /// Peer table the peer is removed from on teardown.
    pub router: Arc<dyn Router>,
    /// Where received messages and teardown events go.
    pub events: Arc<dyn Events>,
    /// Node-wide shutdown flag.
    pub shutdown: Arc<AtomicBool>,
    /// Fires once when the node closes.
    pub shutdown_rx: broadcast::Receiver<()>,
}

enum Next {
    Read(ReadOutcome),
    Failed(TransportError),
    Idle,
    Local,
}

enum Exit {
    Local,
    RemoteClosed,
    Idle,
    Failed(NodeError),
    WriteFailed,
}

fn local_exit(peer: &Peer) -> Exit {
    match peer.close_reason() {
        Some(CloseReason::WriteFailed) => Exit::WriteFailed,
        _ => Exit::Local,
    }
}

/// Runs until the peer disconnects, is closed locally, or the node shuts
/// down.
pub async fn watch(peer: Arc<Peer>, mut reader: BoxedReader, mut ctx: WatchContext) {
    let socket = peer.socket().clone();
    let limits = peer.limits();
    let mut closed = peer.closed_watch();

    debug!(peer = %socket, "Watch loop started");

    let exit = loop {
        if ctx.shutdown.load(Ordering::Acquire) {
            break Exit::Local;
        }
        if peer.is_closed() {
            break local_exit(&peer);
        }

        let next = {
            let read = read_frame(&mut reader, limits.max_frame());
            tokio::pin!(read);

            loop {
                let remaining = limits.deadline.saturating_sub(peer.idle_for());
                if remaining.is_zero() {
                    break Next::Idle;
                }

                tokio::select! {
                    biased;
                    _ = ctx.shutdown_rx.recv() => break Next::Local,
                    changed = closed.changed() => {
                        if changed.is_err() || closed.borrow().is_some() {
                            break Next::Local;
                        }
                    }
                    result = &mut read => {
                        break match result {
                            Ok(outcome) => Next::Read(outcome),
                            Err(e) => Next::Failed(e),
                        };
                    }
                    () = tokio::time::sleep(remaining) => {}
                }
            }
        };

        match next {
            Next::Local if ctx.shutdown.load(Ordering::Acquire) => break Exit::Local,
            Next::Local => break local_exit(&peer),
            Next::Idle => break Exit::Idle,
            Next::Failed(e) => break Exit::Failed(e.into()),
            Next::Read(ReadOutcome::Closed) => break Exit::RemoteClosed,
            Next::Read(ReadOutcome::Oversized { len }) => {
                peer.touch();
                warn!(
                    peer = %socket,
                    len,
                    max = limits.max_frame(),
                    "Oversized frame discarded"
                );
            }
            Next::Read(ReadOutcome::Frame(body)) => match peer.session().decrypt(body) {
                Ok(payload) => {
                    peer.touch();
                    trace!(peer = %socket, len = payload.len(), "Message received");
                    ctx.events
                        .publish(Signal::new(
                            EventType::MessageReceived,
                            payload,
                            Some(Arc::clone(&peer)),
                        ))
                        .await;
                }
                Err(e) => break Exit::Failed(e),
            },
        }
    };

    match exit {
        Exit::Local => debug!(peer = %socket, "Watch loop exiting"),
        Exit::RemoteClosed => {
            info!(peer = %socket, "Connection closed by peer");
            teardown(&peer, &ctx, EventType::ClosedConnection).await;
        }
        Exit::Idle => {
            info!(peer = %socket, deadline = ?limits.deadline, "Peer idle timeout");
            teardown(&peer, &ctx, EventType::PeerDisconnected).await;
        }
        Exit::Failed(e) => {
            if e.is_security_error() {
                warn!(peer = %socket, error = %e, "Peer dropped: security failure");
            } else {
                info!(peer = %socket, error = %e, "Peer disconnected");
            }
            teardown(&peer, &ctx, EventType::PeerDisconnected).await;
        }
        Exit::WriteFailed => {
            info!(peer = %socket, "Peer disconnected after a failed write");
            ctx.router.remove(&peer);
            announce(&peer, &ctx, EventType::PeerDisconnected).await;
        }
    }
}

/// Removes and closes the peer, then publishes `event` unless someone
/// else closed it first.
async fn teardown(peer: &Arc<Peer>, ctx: &WatchContext, event: EventType) {
    ctx.router.remove(peer);
    if peer.close().await {
        announce(peer, ctx, event).await;
    }
}

async fn announce(peer: &Arc<Peer>, ctx: &WatchContext, event: EventType) {
    ctx.events
        .publish(Signal::new(
            event,
            peer.socket().to_bytes(),
            Some(Arc::clone(peer)),
        ))
        .await;
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::io::AsyncWriteExt;
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    use peerlink_common::SocketId;
    use peerlink_core::crypto::{CipherState, SessionKey};
    use peerlink_transport::{write_frame, BoxedWriter, Connection};

    use super::*;
    use crate::config::DeliveryPolicy;
    use crate::events::{Broker, Subscriber};
    use crate::peer::{ConnectionState, PeerLimits};
    use crate::services::{PeerTable, Session};

    struct Harness {
        peer: Arc<Peer>,
        router: Arc<PeerTable>,
        remote: Session,
        remote_writer: BoxedWriter,
        signals: mpsc::Receiver<Signal>,
        shutdown_tx: broadcast::Sender<()>,
        task: JoinHandle<()>,
    }

    fn keyed(enc: u8, dec: u8) -> (CipherState, CipherState) {
        (
            CipherState::with_key(SessionKey::from_bytes([enc; 32])),
            CipherState::with_key(SessionKey::from_bytes([dec; 32])),
        )
    }

    fn start(limits: PeerLimits) -> Harness {
        start_with(limits, None)
    }

    fn start_with(limits: PeerLimits, writer: Option<BoxedWriter>) -> Harness {
        let (local, remote_conn) = Connection::pair();
        let (reader, pipe_writer) = local.into_split();
        let writer = writer.unwrap_or(pipe_writer);
        let (_remote_reader, remote_writer) = remote_conn.into_split();

        let peer = Arc::new(Peer::new(SocketId::from(local_addr()), writer, limits));
        let (enc, dec) = keyed(1, 2);
        peer.session().set_ciphers(enc, dec).unwrap();
        peer.set_state(ConnectionState::Connected);

        let remote = Session::new();
        let (enc, dec) = keyed(2, 1);
        remote.set_ciphers(enc, dec).unwrap();

        let router = Arc::new(PeerTable::new(8));
        router.add(Arc::clone(&peer)).unwrap();

        let broker = Arc::new(Broker::new());
        let subscriber = Arc::new(Subscriber::new(16, DeliveryPolicy::Block));
        for event in EventType::ALL {
            broker.register(event, &subscriber);
        }
        let (out_tx, signals) = mpsc::channel(16);
        tokio::spawn(async move {
            subscriber.listen(std::future::pending(), out_tx).await;
        });

        let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
        let ctx = WatchContext {
            router: router.clone(),
            events: broker,
            shutdown: Arc::new(AtomicBool::new(false)),
            shutdown_rx,
        };
        let task = tokio::spawn(watch(Arc::clone(&peer), reader, ctx));

        Harness {
            peer,
            router,
            remote,
            remote_writer,
            signals,
            shutdown_tx,
            task,
        }
    }

    fn local_addr() -> std::net::SocketAddr {
        "127.0.0.1:7100".parse().unwrap()
    }

    async fn next_signal(h: &mut Harness) -> Signal {
        tokio::time::timeout(Duration::from_secs(5), h.signals.recv())
            .await
            .expect("timed out waiting for a signal")
            .expect("signal stream ended")
    }

    async fn send(h: &mut Harness, payload: &[u8]) {
        let body = h.remote.encrypt(payload).unwrap();
        write_frame(&mut h.remote_writer, &body, 1 << 20).await.unwrap();
    }

    #[tokio::test]
    async fn test_message_then_clean_close() {
        let mut h = start(PeerLimits::default());

        send(&mut h, b"ping").await;
        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::MessageReceived);
        assert_eq!(&signal.payload()[..], b"ping");
        assert!(Arc::ptr_eq(signal.peer().unwrap(), &h.peer));

        h.remote_writer.shutdown().await.unwrap();
        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::ClosedConnection);
        assert_eq!(&signal.payload()[..], b"127.0.0.1:7100");

        h.task.await.unwrap();
        assert!(h.router.is_empty());
        assert_eq!(h.peer.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_oversized_frame_is_skipped() {
        let limits = PeerLimits {
            max_payload: 16,
            ..PeerLimits::default()
        };
        let mut h = start(limits);

        send(&mut h, &[0xAB; 64]).await;
        send(&mut h, b"small").await;

        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::MessageReceived);
        assert_eq!(&signal.payload()[..], b"small");
        assert_eq!(h.router.len(), 1);
    }

    #[tokio::test]
    async fn test_idle_peer_disconnected_once() {
        let limits = PeerLimits {
            deadline: Duration::from_millis(100),
            ..PeerLimits::default()
        };
        let mut h = start(limits);

        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::PeerDisconnected);
        h.task.await.unwrap();
        assert!(h.router.is_empty());

        let extra = tokio::time::timeout(Duration::from_millis(200), h.signals.recv()).await;
        assert!(extra.is_err(), "unexpected second signal");
    }

    #[tokio::test]
    async fn test_forged_frame_drops_peer() {
        let mut h = start(PeerLimits::default());

        let mut forged = vec![0u8; 8];
        forged.extend_from_slice(&[0x55; 32]);
        write_frame(&mut h.remote_writer, &forged, 1024).await.unwrap();

        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::PeerDisconnected);
        h.task.await.unwrap();
        assert!(h.router.is_empty());
        assert!(h.peer.is_closed());
    }

    #[tokio::test]
    async fn test_local_close_is_quiet() {
        let mut h = start(PeerLimits::default());

        assert!(h.peer.close().await);
        h.task.await.unwrap();

        // Still routed: removal belongs to whoever closed it.
        assert_eq!(h.router.len(), 1);
        let extra = tokio::time::timeout(Duration::from_millis(100), h.signals.recv()).await;
        assert!(extra.is_err());
    }

    #[tokio::test]
    async fn test_failed_send_unroutes_peer() {
        let (dead, _) = tokio::io::duplex(64);
        let mut h = start_with(PeerLimits::default(), Some(Box::new(dead)));

        assert!(h.peer.send(b"lost").await.is_err());

        let signal = next_signal(&mut h).await;
        assert_eq!(signal.event(), EventType::PeerDisconnected);
        assert!(Arc::ptr_eq(signal.peer().unwrap(), &h.peer));
        h.task.await.unwrap();
        assert!(h.router.is_empty());
        assert_eq!(h.peer.close_reason(), Some(CloseReason::WriteFailed));
    }

    #[tokio::test]
    async fn test_node_shutdown_stops_loop() {
        let h = start(PeerLimits::default());
        h.shutdown_tx.send(()).unwrap();
        h.task.await.unwrap();
        assert!(!h.peer.is_closed());
    }
}
