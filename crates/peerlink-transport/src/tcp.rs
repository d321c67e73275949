// ============================================
// File: crates/peerlink-transport/src/tcp.rs
// ============================================
//! # TCP Transport Implementation
//!
//! ## Creation Reason
//! Listener and dialer for peer streams.
//!
//! ## Main Functionality
//! - `TcpTransport`: `Transport` implementation over a Tokio `TcpListener`
//! - `connect`: outbound stream with a deadline
//! - Socket configuration (`SO_REUSEADDR`, `TCP_NODELAY`)
//!
//! ## ⚠️ Important Note for Next Developer
//! - Binding goes through socket2 so socket options are set before bind
//! - Port 0 binds an ephemeral port; read it back with `local_addr`
//!
//! ## Last Modified
//! v0.1.0 - Initial TCP transport

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, trace};

use crate::error::{Result, TransportError};
use crate::traits::{Connection, Transport};

/// Listen backlog.
const BACKLOG: i32 = 1024;

// ============================================
// TcpTransport
// ============================================

/// TCP listener implementing [`Transport`].
///
/// # Example
/// ```ignore
/// use peerlink_transport::{TcpTransport, Transport};
///
/// let transport = TcpTransport::bind("127.0.0.1:0").await?;
/// let conn = transport.accept().await?;
/// ```
pub struct TcpTransport {
    listener: TcpListener,
    local_addr: SocketAddr,
    shutdown: AtomicBool,
}

impl TcpTransport {
    /// Binds a listener to an address string.
    ///
    /// # Errors
    /// `InvalidAddress` if the string is not `ip:port`, otherwise as
    /// [`Self::bind_addr`].
    pub async fn bind(addr: impl AsRef<str>) -> Result<Self> {
        let addr_str = addr.as_ref();
        let socket_addr: SocketAddr =
            addr_str
                .parse()
                .map_err(|_| TransportError::InvalidAddress {
                    addr: addr_str.to_string(),
                })?;

        Self::bind_addr(socket_addr).await
    }

    /// Binds a listener to a socket address.
    ///
    /// # Socket Options
    /// - `SO_REUSEADDR`: quick rebinding after restart
    /// - Non-blocking: required by Tokio
    ///
    /// # Errors
    /// `AddressInUse` or `BindFailed`.
    pub async fn bind_addr(addr: SocketAddr) -> Result<Self> {
        debug!("Binding TCP transport to {}", addr);

        let domain = if addr.is_ipv4() {
            Domain::IPV4
        } else {
            Domain::IPV6
        };

        let socket = Socket::new(domain, Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| TransportError::io("creating TCP socket", e))?;

        socket
            .set_reuse_address(true)
            .map_err(|e| TransportError::io("setting SO_REUSEADDR", e))?;

        socket
            .set_nonblocking(true)
            .map_err(|e| TransportError::io("setting non-blocking", e))?;

        socket.bind(&addr.into()).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AddrInUse {
                TransportError::AddressInUse { addr }
            } else {
                TransportError::bind_failed(addr, e.to_string())
            }
        })?;

        socket
            .listen(BACKLOG)
            .map_err(|e| TransportError::bind_failed(addr, e.to_string()))?;

        let std_listener: std::net::TcpListener = socket.into();
        let listener = TcpListener::from_std(std_listener)
            .map_err(|e| TransportError::io("converting to Tokio listener", e))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("getting local address", e))?;

        info!("TCP transport bound to {}", local_addr);

        Ok(Self {
            listener,
            local_addr,
            shutdown: AtomicBool::new(false),
        })
    }

    /// Checks if the transport has been shut down.
    #[must_use]
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

fn into_connection(stream: TcpStream, remote: SocketAddr) -> Result<Connection> {
    stream
        .set_nodelay(true)
        .map_err(|e| TransportError::io("setting TCP_NODELAY", e))?;
    let local = stream
        .local_addr()
        .map_err(|e| TransportError::io("getting local address", e))?;
    let (reader, writer) = stream.into_split();
    Ok(Connection::new(Box::new(reader), Box::new(writer), remote, local))
}

#[async_trait]
impl Transport for TcpTransport {
    async fn accept(&self) -> Result<Connection> {
        if self.is_shutdown() {
            return Err(TransportError::ShuttingDown);
        }

        let (stream, remote) =
            self.listener
                .accept()
                .await
                .map_err(|e| TransportError::AcceptFailed {
                    reason: e.to_string(),
                })?;

        trace!("Accepted connection from {}", remote);
        into_connection(stream, remote)
    }

    fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.local_addr)
    }

    async fn shutdown(&self) -> Result<()> {
        // The listening socket closes when the transport is dropped.
        self.shutdown.store(true, Ordering::Release);
        debug!("TCP transport on {} shut down", self.local_addr);
        Ok(())
    }

    fn is_active(&self) -> bool {
        !self.is_shutdown()
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("local_addr", &self.local_addr)
            .field("shutdown", &self.is_shutdown())
            .finish()
    }
}

// ============================================
// Dialer
// ============================================

/// Opens a stream to `addr` (`host:port`), giving up after `deadline`.
///
/// # Errors
/// `Timeout` if the deadline passes, `ConnectFailed` otherwise.
pub async fn connect(addr: &str, deadline: Duration) -> Result<Connection> {
    let stream = tokio::time::timeout(deadline, TcpStream::connect(addr))
        .await
        .map_err(|_| TransportError::timeout(format!("connect to {addr}")))?
        .map_err(|e| TransportError::connect_failed(addr, e.to_string()))?;

    let remote = stream
        .peer_addr()
        .map_err(|e| TransportError::connect_failed(addr, e.to_string()))?;

    debug!("Connected to {} ({})", addr, remote);
    into_connection(stream, remote)
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{read_frame, write_frame, ReadOutcome};

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap();
        assert_ne!(addr.port(), 0);
        assert!(transport.is_active());
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let result = TcpTransport::bind("not-an-address").await;
        assert!(matches!(result, Err(TransportError::InvalidAddress { .. })));
    }

    #[tokio::test]
    async fn test_accept_and_exchange_frames() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        let addr = transport.local_addr().unwrap().to_string();

        let dial = tokio::spawn(async move {
            let mut conn = connect(&addr, Duration::from_secs(5)).await.unwrap();
            write_frame(&mut conn.writer, b"hello", 1024).await.unwrap();
            conn
        });

        let mut inbound = transport.accept().await.unwrap();
        let outbound = dial.await.unwrap();
        assert_eq!(inbound.remote, outbound.local);

        let frame = read_frame(&mut inbound.reader, 1024).await.unwrap();
        assert_eq!(frame, ReadOutcome::Frame(bytes::Bytes::from_static(b"hello")));
    }

    #[tokio::test]
    async fn test_accept_after_shutdown() {
        let transport = TcpTransport::bind("127.0.0.1:0").await.unwrap();
        transport.shutdown().await.unwrap();
        assert!(matches!(transport.accept().await, Err(TransportError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Bind then drop to get a port nobody listens on.
        let addr = {
            let t = TcpTransport::bind("127.0.0.1:0").await.unwrap();
            t.local_addr().unwrap().to_string()
        };
        let err = connect(&addr, Duration::from_secs(5)).await.unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
    }
}
