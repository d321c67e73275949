// ============================================
// File: crates/peerlink-transport/src/traits.rs
// ============================================
//! # Transport Traits
//!
//! ## Creation Reason
//! Defines the listener interface and the connection handle the node
//! works with, so the node never names a concrete socket type.
//!
//! ## Main Functionality
//! - `Transport`: stream listener interface (accept, local address, shutdown)
//! - `Connection`: boxed read half, boxed write half and both addresses
//!
//! ## Design Philosophy
//! - Async-first design with `async_trait`
//! - Halves are boxed trait objects so TCP streams and in-memory pipes
//!   are interchangeable
//!
//! ## ⚠️ Important Note for Next Developer
//! - Implementations must be Send + Sync for use in async contexts
//! - The read half is owned by exactly one task (the watch loop)
//!
//! ## Last Modified
//! v0.1.0 - Initial trait definitions

use std::fmt;
use std::net::SocketAddr;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};

use crate::error::Result;

/// Read half of a connection.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// Write half of a connection.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

// ============================================
// Connection
// ============================================

/// An established byte stream, split into halves.
pub struct Connection {
    /// Inbound half.
    pub reader: BoxedReader,
    /// Outbound half.
    pub writer: BoxedWriter,
    /// Address of the remote end.
    pub remote: SocketAddr,
    /// Address of the local end.
    pub local: SocketAddr,
}

impl Connection {
    /// Wraps two halves of a stream.
    #[must_use]
    pub fn new(
        reader: BoxedReader,
        writer: BoxedWriter,
        remote: SocketAddr,
        local: SocketAddr,
    ) -> Self {
        Self {
            reader,
            writer,
            remote,
            local,
        }
    }

    /// Splits into `(reader, writer)`.
    #[must_use]
    pub fn into_split(self) -> (BoxedReader, BoxedWriter) {
        (self.reader, self.writer)
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("remote", &self.remote)
            .field("local", &self.local)
            .finish_non_exhaustive()
    }
}

// ============================================
// Transport Trait
// ============================================

/// Abstract interface for a stream listener.
///
/// # Thread Safety
/// Implementations must be `Send + Sync` to allow sharing across
/// async tasks.
///
/// # Example
/// ```ignore
/// async fn serve<T: Transport>(transport: &T) -> Result<()> {
///     loop {
///         let conn = transport.accept().await?;
///         tokio::spawn(handle(conn));
///     }
/// }
/// ```
#[async_trait]
pub trait Transport: Send + Sync {
    /// Waits for the next inbound connection.
    ///
    /// # Errors
    /// `ShuttingDown` after `shutdown`, `AcceptFailed` on socket errors.
    async fn accept(&self) -> Result<Connection>;

    /// Returns the local address this transport is bound to.
    ///
    /// # Errors
    /// Returns error if address cannot be determined
    fn local_addr(&self) -> Result<SocketAddr>;

    /// Stops accepting connections.
    ///
    /// # Errors
    /// Returns error if shutdown fails
    async fn shutdown(&self) -> Result<()>;

    /// Returns `true` if the transport is still accepting.
    fn is_active(&self) -> bool;
}
