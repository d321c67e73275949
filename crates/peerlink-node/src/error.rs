// ============================================
// File: crates/peerlink-node/src/error.rs
// ============================================
//! # Node Error Types
//!
//! ## Creation Reason
//! One error type for the node layer, sorted into the five kinds the
//! node reacts to differently.
//!
//! ## Error Kinds
//! | Kind        | Examples                              | Effect                      |
//! |-------------|---------------------------------------|-----------------------------|
//! | Network     | bind, accept, dial                    | aborts `listen` / `dial`    |
//! | Operational | handshake failure, unknown peer       | one connection or call      |
//! | Overflow    | peer cap, payload cap                 | rejected, others unaffected |
//! | Security    | bad MAC, replay, missing cipher state | connection aborted          |
//! | Config      | load / validation                     | node never starts           |
//!
//! ## Last Modified
//! v0.1.0 - Initial node error taxonomy

use thiserror::Error;

use peerlink_common::error::CommonError;
use peerlink_core::error::CoreError;
use peerlink_transport::error::TransportError;

/// Result type for node operations.
pub type Result<T> = std::result::Result<T, NodeError>;

/// Coarse classification of a [`NodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Listen, dial, bind or accept failure.
    Network,
    /// Failure scoped to one connection or call.
    Operational,
    /// A configured limit was hit.
    Overflow,
    /// Authentication or protocol integrity failure.
    Security,
    /// Invalid or unreadable configuration.
    Config,
}

/// Node error types.
#[derive(Error, Debug)]
pub enum NodeError {
    /// Configuration file could not be read or parsed.
    #[error("Failed to load configuration from '{path}': {reason}")]
    ConfigLoad {
        /// File that was being loaded
        path: String,
        /// Read or parse failure
        reason: String,
    },

    /// A configuration value is out of range.
    #[error("Invalid configuration: {field} - {reason}")]
    ConfigInvalid {
        /// Dotted field name, e.g. `limits.max_peers_connected`
        field: String,
        /// Why it was rejected
        reason: String,
    },

    /// `listen` called while the accept loop is running.
    #[error("Node is already listening")]
    AlreadyListening,

    /// The node has been closed.
    #[error("Node is closed")]
    Closed,

    /// The peer table is full.
    #[error("Peer limit reached: max {limit} peers")]
    MaxPeersExceeded {
        /// Configured cap
        limit: usize,
    },

    /// Plaintext exceeds the configured maximum.
    #[error("Payload too large: {size} bytes (max: {max})")]
    PayloadTooLarge {
        /// Offered payload size
        size: usize,
        /// Configured maximum
        max: usize,
    },

    /// No peer is routed under this socket identity.
    #[error("Peer not found: {socket}")]
    PeerNotFound {
        /// Socket identity looked up
        socket: String,
    },

    /// The peer was closed before or during the operation.
    #[error("Peer {socket} is closed")]
    PeerClosed {
        /// Socket identity of the peer
        socket: String,
    },

    /// `reply` on a signal that carries no peer.
    #[error("Signal has no peer to reply to")]
    NoReplyPeer,

    /// The Noise handshake did not complete.
    #[error("Handshake with {socket} failed: {reason}")]
    Handshake {
        /// Socket identity of the remote
        socket: String,
        /// Failure detail
        reason: String,
    },

    /// Authentication or replay failure; the peer is dropped.
    #[error("Security violation: {reason}")]
    Security {
        /// Failure detail (never key material)
        reason: String,
    },

    /// Error from the common crate.
    #[error(transparent)]
    Common(#[from] CommonError),

    /// Error from the crypto core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Error from the transport layer.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Raw I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// Creates a `ConfigLoad` error.
    pub fn config_load(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigLoad {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `ConfigInvalid` error.
    pub fn config_invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Handshake` error.
    pub fn handshake(socket: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Handshake {
            socket: socket.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Security` error.
    pub fn security(reason: impl Into<String>) -> Self {
        Self::Security {
            reason: reason.into(),
        }
    }

    /// Creates a `PeerNotFound` error.
    pub fn peer_not_found(socket: impl Into<String>) -> Self {
        Self::PeerNotFound {
            socket: socket.into(),
        }
    }

    /// Classifies the error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ConfigLoad { .. } | Self::ConfigInvalid { .. } => ErrorKind::Config,
            Self::MaxPeersExceeded { .. } | Self::PayloadTooLarge { .. } => ErrorKind::Overflow,
            Self::Security { .. } => ErrorKind::Security,
            Self::Core(e) if e.is_suspicious() => ErrorKind::Security,
            Self::Transport(e) if e.is_framing_error() => ErrorKind::Overflow,
            Self::Transport(e) if e.is_network_error() => ErrorKind::Network,
            Self::Io(_) => ErrorKind::Network,
            _ => ErrorKind::Operational,
        }
    }

    /// Load or validation failure.
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(self, Self::ConfigLoad { .. } | Self::ConfigInvalid { .. })
    }

    /// Authentication, replay or handshake-integrity failure.
    #[must_use]
    pub fn is_security_error(&self) -> bool {
        self.kind() == ErrorKind::Security
    }

    /// Fatal to the operation that raised it (`listen`, `dial`, startup).
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Network | ErrorKind::Config)
    }

    /// The node keeps running and other connections are unaffected.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Operational | ErrorKind::Overflow)
    }
}
