// ============================================
// File: crates/peerlink-transport/src/error.rs
// ============================================
//! # Transport Error Types
//!
//! ## Creation Reason
//! Errors raised while binding, accepting, dialing and moving frames
//! over a stream.
//!
//! ## Error Categories
//! 1. **Network Errors**: bind, connect, accept, send and receive failures
//! 2. **Framing Errors**: oversized frames, streams closed mid-frame
//! 3. **Configuration Errors**: unparsable addresses
//! 4. **System Errors**: timeouts, shutdown, raw I/O
//!
//! ## ⚠️ Important Note for Next Developer
//! - A clean EOF between frames is NOT an error (see `frame::ReadOutcome`)
//! - Network errors are often transient; framing errors never are
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use std::io;
use std::net::SocketAddr;

use thiserror::Error;

use peerlink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for transport operations.
pub type Result<T> = std::result::Result<T, TransportError>;

// ============================================
// TransportError
// ============================================

/// Transport layer error types.
#[derive(Error, Debug)]
pub enum TransportError {
    // ========================================
    // Network Errors
    // ========================================

    /// Failed to bind to address.
    #[error("Failed to bind to {addr}: {reason}")]
    BindFailed {
        /// Address we tried to bind to
        addr: SocketAddr,
        /// Why binding failed
        reason: String,
    },

    /// Address already in use.
    #[error("Address {addr} already in use")]
    AddressInUse {
        /// The address that's in use
        addr: SocketAddr,
    },

    /// Outbound connection could not be established.
    #[error("Failed to connect to {addr}: {reason}")]
    ConnectFailed {
        /// Dialed address
        addr: String,
        /// Why the connection failed
        reason: String,
    },

    /// Accepting an inbound connection failed.
    #[error("Failed to accept connection: {reason}")]
    AcceptFailed {
        /// Why accept failed
        reason: String,
    },

    // ========================================
    // Framing Errors
    // ========================================

    /// A frame is larger than the allowed maximum.
    #[error("Frame too large: {len} bytes exceeds max {max}")]
    FrameTooLarge {
        /// Announced or requested length
        len: usize,
        /// Maximum allowed length
        max: usize,
    },

    /// The stream ended in the middle of a frame.
    #[error("Connection closed mid-frame: {context}")]
    ConnectionClosed {
        /// Which part of the frame was being read
        context: String,
    },

    // ========================================
    // Configuration Errors
    // ========================================

    /// Invalid socket address.
    #[error("Invalid address: {addr}")]
    InvalidAddress {
        /// The invalid address string
        addr: String,
    },

    // ========================================
    // System Errors
    // ========================================

    /// Operation timed out.
    #[error("Operation timed out: {operation}")]
    Timeout {
        /// What operation timed out
        operation: String,
    },

    /// Transport is shutting down.
    #[error("Transport is shutting down")]
    ShuttingDown,

    // ========================================
    // Wrapped Errors
    // ========================================

    /// I/O error from the system.
    #[error("I/O error: {context}")]
    Io {
        /// What was happening when the error occurred
        context: String,
        /// Underlying I/O error
        #[source]
        source: io::Error,
    },

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl TransportError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates a `BindFailed` error.
    pub fn bind_failed(addr: SocketAddr, reason: impl Into<String>) -> Self {
        Self::BindFailed {
            addr,
            reason: reason.into(),
        }
    }

    /// Creates a `ConnectFailed` error.
    pub fn connect_failed(addr: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectFailed {
            addr: addr.into(),
            reason: reason.into(),
        }
    }

    /// Creates a `Timeout` error.
    pub fn timeout(operation: impl Into<String>) -> Self {
        Self::Timeout {
            operation: operation.into(),
        }
    }

    /// Creates a `ConnectionClosed` error.
    pub fn closed(context: impl Into<String>) -> Self {
        Self::ConnectionClosed {
            context: context.into(),
        }
    }

    /// Creates an `Io` error with context.
    pub fn io(context: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this error is transient and retryable.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectFailed { .. } | Self::AcceptFailed { .. } => true,
            Self::Io { source, .. } => matches!(
                source.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            _ => false,
        }
    }

    /// Returns `true` if this is a network-related error.
    #[must_use]
    pub const fn is_network_error(&self) -> bool {
        matches!(
            self,
            Self::BindFailed { .. }
                | Self::AddressInUse { .. }
                | Self::ConnectFailed { .. }
                | Self::AcceptFailed { .. }
                | Self::ConnectionClosed { .. }
                | Self::Timeout { .. }
                | Self::Io { .. }
        )
    }

    /// Returns `true` if the peer violated the framing rules.
    #[must_use]
    pub const fn is_framing_error(&self) -> bool {
        matches!(self, Self::FrameTooLarge { .. })
    }
}

// ============================================
// Error Conversions
// ============================================

impl From<io::Error> for TransportError {
    fn from(err: io::Error) -> Self {
        Self::Io {
            context: "unspecified I/O operation".into(),
            source: err,
        }
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TransportError::bind_failed("127.0.0.1:8080".parse().unwrap(), "denied");
        assert!(err.to_string().contains("127.0.0.1:8080"));
        assert!(err.to_string().contains("denied"));

        let err = TransportError::FrameTooLarge { len: 70_000, max: 65_536 };
        assert!(err.to_string().contains("70000"));
    }

    #[test]
    fn test_error_classification() {
        let err = TransportError::connect_failed("127.0.0.1:1", "refused");
        assert!(err.is_network_error());
        assert!(err.is_retryable());

        let err = TransportError::FrameTooLarge { len: 10, max: 5 };
        assert!(err.is_framing_error());
        assert!(!err.is_retryable());

        assert!(!TransportError::ShuttingDown.is_network_error());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::TimedOut, "timed out");
        let transport_err: TransportError = io_err.into();
        assert!(transport_err.is_retryable());
    }
}
