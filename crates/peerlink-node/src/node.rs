// ============================================
// File: crates/peerlink-node/src/node.rs
// ============================================
//! # Node Orchestrator
//!
//! ## Creation Reason
//! The public face of the crate: accepts and dials connections, runs the
//! handshake, routes peers, and exposes the event stream.
//!
//! ## Main Functionality
//! - `Node`: cloneable handle over the shared node state
//! - `listen`: accept loop (blocks until `close`)
//! - `dial`: outbound connection
//! - `send_message`: encrypted write to a routed peer
//! - `signals`: event stream for consumers
//! - `close`: irreversible shutdown
//!
//! ## Node Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                           Node                              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   accept / dial   ┌──────────────────────┐  │
//! │  │ Accept     │ ────────────────► │ route                │  │
//! │  │ loop       │                   │  - cap check         │  │
//! │  └────────────┘                   │  - handshake (timed) │  │
//! │                                   │  - Router::add       │  │
//! │                                   │  - spawn watch loop  │  │
//! │                                   └──────────┬───────────┘  │
//! │                                              ▼              │
//! │  ┌────────────┐   publish         ┌──────────────────────┐  │
//! │  │ Broker     │ ◄──────────────── │ watch loop (1/peer)  │  │
//! │  └─────┬──────┘                   └──────────────────────┘  │
//! │        ▼                                                    │
//! │    signals() ──► consumer                                   │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Node State
//! `Idle → Listening → Closed`; `dial` works from `Idle` too. `Closed` is
//! terminal.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Router and broker belong to one node; nothing is process-global
//! - Each accepted connection is routed on its own task so a slow
//!   handshake never stalls the accept loop
//! - `close` sets the shutdown flag before draining the router, and
//!   `route` re-checks the flag after inserting
//! - `signals` spawns, so it must be called inside a Tokio runtime
//! - `close` closes peers concurrently; each waits at most the close
//!   grace for a busy writer
//!
//! ## Last Modified
//! v0.1.0 - Initial node implementation

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use peerlink_common::SocketId;
use peerlink_core::crypto::{PublicKey, StaticKeyPair};
use peerlink_transport::{connect, Connection, TcpTransport, Transport};

use crate::config::NodeConfig;
use crate::error::{ErrorKind, NodeError, Result};
use crate::events::{Broker, EventType, Events, Signal, Subscriber};
use crate::handlers::{watch, WatchContext};
use crate::peer::{ConnectionState, Peer, PeerLimits};
use crate::services::{Handshake, PeerTable, Router};

// ============================================
// NodeState
// ============================================

/// Node-level lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Created, or back from a failed `listen`.
    Idle,
    /// Accept loop running.
    Listening,
    /// `close` was called; terminal.
    Closed,
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Listening => write!(f, "Listening"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

// ============================================
// Node
// ============================================

struct NodeInner {
    config: NodeConfig,
    identity: StaticKeyPair,
    router: Arc<PeerTable>,
    broker: Arc<Broker>,
    state: RwLock<NodeState>,
    local_addr: RwLock<Option<SocketAddr>>,
    shutdown: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
}

/// A peer-to-peer node.
///
/// # Lifecycle
/// 1. Create with `Node::new(config)`
/// 2. Subscribe with `node.signals(cancel)`
/// 3. Run `node.listen().await` and/or `node.dial(addr).await`
/// 4. Shut down with `node.close().await`
#[derive(Clone)]
pub struct Node {
    inner: Arc<NodeInner>,
}

impl Node {
    /// Creates a node, using the configured identity or a fresh one.
    ///
    /// # Errors
    /// Returns a config error if validation fails.
    pub fn new(config: NodeConfig) -> Result<Self> {
        config.validate()?;
        let identity = config
            .identity
            .load()?
            .unwrap_or_else(StaticKeyPair::generate);
        Self::with_identity(config, identity)
    }

    /// Creates a node with an explicit static identity.
    ///
    /// # Errors
    /// Returns a config error if validation fails.
    pub fn with_identity(config: NodeConfig, identity: StaticKeyPair) -> Result<Self> {
        config.validate()?;

        let (shutdown_tx, _) = broadcast::channel(1);
        let router = Arc::new(PeerTable::new(usize::from(
            config.limits.max_peers_connected,
        )));

        info!(public_key = %identity.public_key(), "Node created");

        Ok(Self {
            inner: Arc::new(NodeInner {
                config,
                identity,
                router,
                broker: Arc::new(Broker::new()),
                state: RwLock::new(NodeState::Idle),
                local_addr: RwLock::new(None),
                shutdown: Arc::new(AtomicBool::new(false)),
                shutdown_tx,
            }),
        })
    }

    // ========================================
    // Accessors
    // ========================================

    /// Configuration the node was built with.
    #[must_use]
    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> NodeState {
        *self.inner.state.read()
    }

    /// True once `close` has started.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.shutdown.load(Ordering::Acquire)
    }

    /// Address the accept loop is bound to, once listening.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.read()
    }

    /// Static public key peers authenticate this node by.
    #[must_use]
    pub fn public_key(&self) -> PublicKey {
        self.inner.identity.public_key()
    }

    /// Number of routed peers.
    #[must_use]
    pub fn peer_count(&self) -> usize {
        self.inner.router.len()
    }

    /// Socket identities of every routed peer.
    #[must_use]
    pub fn peers(&self) -> Vec<SocketId> {
        self.inner
            .router
            .peers()
            .iter()
            .map(|peer| peer.socket().clone())
            .collect()
    }

    /// Looks up a routed peer.
    #[must_use]
    pub fn peer(&self, socket: &str) -> Option<Arc<Peer>> {
        self.inner.router.query(socket)
    }

    fn limits(&self) -> PeerLimits {
        PeerLimits {
            deadline: self.inner.config.limits.peer_deadline(),
            max_payload: self.inner.config.limits.max_payload(),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            return Err(NodeError::Closed);
        }
        Ok(())
    }

    async fn publish(&self, event: EventType, payload: impl Into<Bytes>, peer: Option<Arc<Peer>>) {
        self.inner
            .broker
            .publish(Signal::new(event, payload, peer))
            .await;
    }

    // ========================================
    // Listen
    // ========================================

    /// Binds the configured address and accepts connections until the
    /// node is closed.
    ///
    /// # Errors
    /// - `Closed` / `AlreadyListening` for a wrong node state
    /// - Transport errors if binding or accepting fails
    pub async fn listen(&self) -> Result<()> {
        {
            let mut state = self.inner.state.write();
            match *state {
                NodeState::Closed => return Err(NodeError::Closed),
                NodeState::Listening => return Err(NodeError::AlreadyListening),
                NodeState::Idle => *state = NodeState::Listening,
            }
        }

        let transport = match TcpTransport::bind(&self.inner.config.network.listen_addr).await {
            Ok(transport) => transport,
            Err(e) => {
                error!(
                    addr = %self.inner.config.network.listen_addr,
                    error = %e,
                    "Failed to bind"
                );
                self.stop_listening();
                return Err(e.into());
            }
        };

        let addr = transport.local_addr()?;
        *self.inner.local_addr.write() = Some(addr);

        let mut shutdown_rx = self.inner.shutdown_tx.subscribe();
        if self.is_closed() {
            let _ = transport.shutdown().await;
            return Ok(());
        }

        info!(addr = %addr, "Node listening");
        self.publish(EventType::SelfListening, addr.to_string(), None)
            .await;

        let result = loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    debug!("Accept loop received shutdown signal");
                    break Ok(());
                }
                accepted = transport.accept() => match accepted {
                    Ok(conn) => {
                        debug!(remote = %conn.remote, "Accepted connection");
                        let node = self.clone();
                        tokio::spawn(async move { node.handle_inbound(conn).await });
                    }
                    Err(_) if self.is_closed() => break Ok(()),
                    Err(e) => {
                        error!(error = %e, "Accept failed");
                        break Err(e.into());
                    }
                },
            }
        };

        if let Err(e) = transport.shutdown().await {
            warn!(error = %e, "Transport shutdown error");
        }
        if result.is_err() {
            self.stop_listening();
        }
        info!(addr = %addr, "Accept loop stopped");
        result
    }

    fn stop_listening(&self) {
        let mut state = self.inner.state.write();
        if *state == NodeState::Listening {
            *state = NodeState::Idle;
            *self.inner.local_addr.write() = None;
        }
    }

    async fn handle_inbound(&self, conn: Connection) {
        let socket = SocketId::from(conn.remote);
        if let Err(e) = self.route(conn, socket.clone(), false).await {
            match e.kind() {
                ErrorKind::Security | ErrorKind::Overflow => {
                    warn!(peer = %socket, error = %e, "Inbound connection rejected");
                }
                _ => debug!(peer = %socket, error = %e, "Inbound connection failed"),
            }
        }
    }

    // ========================================
    // Dial
    // ========================================

    /// Connects to `socket` (`host:port`) and completes the handshake as
    /// initiator.
    ///
    /// # Errors
    /// Address, connect, handshake or capacity errors.
    pub async fn dial(&self, socket: &str) -> Result<()> {
        self.ensure_open()?;
        let id = SocketId::new(socket)?;

        info!(peer = %id, "Dialing");
        let conn = connect(id.as_str(), self.inner.config.network.dial_timeout()).await?;
        self.route(conn, id, true).await.map(|_| ())
    }

    // ========================================
    // Routing
    // ========================================

    async fn route(&self, conn: Connection, socket: SocketId, initiator: bool) -> Result<Arc<Peer>> {
        self.ensure_open()?;

        let router = &self.inner.router;
        if router.is_full() && router.query(socket.as_str()).is_none() {
            warn!(
                peer = %socket,
                limit = router.max_peers(),
                "Connection rejected: peer limit reached"
            );
            return Err(NodeError::MaxPeersExceeded {
                limit: router.max_peers(),
            });
        }

        let (mut reader, writer) = conn.into_split();
        let peer = Arc::new(Peer::new(socket.clone(), writer, self.limits()));
        peer.set_state(ConnectionState::Handshaking);
        debug!(peer = %socket, initiator, "Handshake starting");

        let handshake = async {
            let mut writer = peer.lock_writer().await;
            let mut hs = Handshake::new(
                &mut reader,
                &mut *writer,
                peer.session(),
                self.inner.identity.clone(),
            );
            hs.start(initiator).await
        };
        let outcome = tokio::time::timeout(self.inner.config.limits.handshake_timeout(), handshake)
            .await
            .unwrap_or_else(|_| Err(NodeError::handshake(socket.as_str(), "timed out")));

        if let Err(e) = outcome {
            if e.is_security_error() {
                warn!(peer = %socket, error = %e, "Handshake failed: security violation");
            } else {
                info!(peer = %socket, error = %e, "Handshake failed");
            }
            peer.close().await;
            return Err(e);
        }

        peer.set_state(ConnectionState::Connected);
        peer.touch();
        if let Some(remote) = peer.session().remote_static() {
            info!(peer = %socket, remote_key = %remote, initiator, "Handshake complete");
        }

        let superseded = match router.add(Arc::clone(&peer)) {
            Ok(superseded) => superseded,
            Err(e) => {
                peer.close().await;
                return Err(e);
            }
        };
        if let Some(old) = superseded {
            info!(peer = %socket, "Replacing existing connection");
            old.close().await;
        }

        let shutdown_rx = self.inner.shutdown_tx.subscribe();
        if self.is_closed() {
            router.remove(&peer);
            peer.close().await;
            return Err(NodeError::Closed);
        }

        self.publish(
            EventType::NewPeerDetected,
            socket.to_bytes(),
            Some(Arc::clone(&peer)),
        )
        .await;

        let ctx = WatchContext {
            router: router.clone(),
            events: self.inner.broker.clone(),
            shutdown: Arc::clone(&self.inner.shutdown),
            shutdown_rx,
        };
        tokio::spawn(watch(Arc::clone(&peer), reader, ctx));

        Ok(peer)
    }

    // ========================================
    // Messaging
    // ========================================

    /// Encrypts and sends `payload` to the peer routed under `socket`.
    ///
    /// Returns the number of plaintext bytes sent (`payload.len()`), not
    /// the bytes written to the wire.
    ///
    /// # Errors
    /// `PeerNotFound` if no such peer, otherwise as [`Peer::send`].
    pub async fn send_message(&self, socket: &str, payload: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        let peer = self
            .inner
            .router
            .query(socket)
            .ok_or_else(|| NodeError::peer_not_found(socket))?;
        peer.send(payload).await
    }

    /// Streams every node event until `cancel` resolves or the node is
    /// closed.
    pub fn signals<F>(&self, cancel: F) -> mpsc::Receiver<Signal>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let events = &self.inner.config.events;
        let subscriber = Arc::new(Subscriber::new(events.mailbox_capacity, events.delivery));
        for event in EventType::ALL {
            self.inner.broker.register(event, &subscriber);
        }
        if self.is_closed() {
            subscriber.close();
        }

        let (tx, rx) = mpsc::channel(events.mailbox_capacity);
        let broker = Arc::clone(&self.inner.broker);
        tokio::spawn(async move {
            subscriber.listen(cancel, tx).await;
            for event in EventType::ALL {
                broker.unregister(event, &subscriber);
            }
            subscriber.close();
        });
        rx
    }

    // ========================================
    // Shutdown
    // ========================================

    /// Closes every peer and stops all loops. Irreversible and idempotent.
    pub async fn close(&self) {
        if self.inner.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("Closing node");
        *self.inner.state.write() = NodeState::Closed;

        let peers = self.inner.router.clear();
        let count = peers.len();

        let mut closing = JoinSet::new();
        for peer in peers {
            closing.spawn(async move {
                let closed = peer.close().await;
                (peer, closed)
            });
        }
        while let Some(joined) = closing.join_next().await {
            match joined {
                Ok((peer, true)) => {
                    self.publish(
                        EventType::ClosedConnection,
                        peer.socket().to_bytes(),
                        Some(Arc::clone(&peer)),
                    )
                    .await;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Peer close task failed"),
            }
        }

        let _ = self.inner.shutdown_tx.send(());
        self.inner.broker.clear();

        info!(peers = count, "Node closed");
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Node")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("peers", &self.peer_count())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn config() -> NodeConfig {
        NodeConfig::from_str("[network]\nlisten_addr = \"127.0.0.1:0\"\n").unwrap()
    }

    async fn wait_listening(node: &Node) -> SocketAddr {
        for _ in 0..200 {
            if let Some(addr) = node.local_addr() {
                return addr;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("node never started listening");
    }

    #[test]
    fn test_identity_from_config() {
        let key = StaticKeyPair::generate();
        let mut cfg = config();
        cfg.identity.private_key = Some(key.to_base64());

        let node = Node::new(cfg).unwrap();
        assert_eq!(node.public_key(), key.public_key());
        assert_eq!(node.state(), NodeState::Idle);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut cfg = config();
        cfg.limits.max_peers_connected = 0;
        assert!(Node::new(cfg).unwrap_err().is_config_error());
    }

    #[tokio::test]
    async fn test_listen_twice_then_close() {
        let node = Node::new(config()).unwrap();
        let listener = tokio::spawn({
            let node = node.clone();
            async move { node.listen().await }
        });

        let addr = wait_listening(&node).await;
        assert_ne!(addr.port(), 0);
        assert_eq!(node.state(), NodeState::Listening);
        assert!(matches!(node.listen().await, Err(NodeError::AlreadyListening)));

        node.close().await;
        listener.await.unwrap().unwrap();
        assert_eq!(node.state(), NodeState::Closed);
        assert!(matches!(node.listen().await, Err(NodeError::Closed)));
    }

    #[tokio::test]
    async fn test_bind_failure_returns_to_idle() {
        let taken = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();

        let mut cfg = config();
        cfg.network.listen_addr = addr.to_string();
        let node = Node::new(cfg).unwrap();

        // SO_REUSEADDR does not allow two listeners on one port.
        assert!(node.listen().await.is_err());
        assert_eq!(node.state(), NodeState::Idle);
        assert!(node.local_addr().is_none());
    }

    #[tokio::test]
    async fn test_closed_node_rejects_operations() {
        let node = Node::new(config()).unwrap();
        node.close().await;
        node.close().await;

        assert!(node.is_closed());
        assert!(matches!(node.dial("127.0.0.1:1").await, Err(NodeError::Closed)));
        assert!(matches!(
            node.send_message("127.0.0.1:1", b"x").await,
            Err(NodeError::Closed)
        ));

        let mut signals = node.signals(std::future::pending());
        assert!(signals.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_send_to_unknown_peer() {
        let node = Node::new(config()).unwrap();
        let err = node.send_message("127.0.0.1:4", b"hello").await.unwrap_err();
        assert!(matches!(err, NodeError::PeerNotFound { .. }));
        assert!(err.is_recoverable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_does_not_serialize_busy_peers() {
        let node = Node::new(config()).unwrap();
        let peers: Vec<_> = (0..5)
            .map(|i| {
                let socket = SocketId::new(format!("127.0.0.1:{}", 7200 + i)).unwrap();
                Arc::new(Peer::new(socket, Box::new(tokio::io::sink()), PeerLimits::default()))
            })
            .collect();
        for peer in &peers {
            node.inner.router.add(Arc::clone(peer)).unwrap();
        }

        // Every writer is mid-write, so each close waits out its grace.
        let mut busy = Vec::new();
        for peer in &peers {
            busy.push(peer.lock_writer().await);
        }

        let started = tokio::time::Instant::now();
        node.close().await;
        let elapsed = started.elapsed();

        assert!(elapsed < Duration::from_secs(2), "close took {elapsed:?}");
        assert!(peers.iter().all(|peer| peer.is_closed()));
        assert_eq!(node.peer_count(), 0);
        drop(busy);
    }

    #[tokio::test]
    async fn test_dial_invalid_address() {
        let node = Node::new(config()).unwrap();
        assert!(node.dial("no-port-here").await.is_err());
    }
}
