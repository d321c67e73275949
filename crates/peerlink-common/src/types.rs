// ============================================
// File: crates/peerlink-common/src/types.rs
// ============================================
//! # Core Type Definitions
//!
//! ## Creation Reason
//! A peer is identified by the `host:port` string of its connection
//! endpoint. Wrapping it in a newtype keeps unvalidated strings out of
//! the peer table and event payloads.
//!
//! ## Main Functionality
//! - `SocketId`: validated, owned socket identity
//!
//! ## ⚠️ Important Note for Next Developer
//! - `SocketId` is always an owned copy of the bytes it was built from
//! - Equality is textual: `127.0.0.1:9090` and `localhost:9090` differ
//! - `Borrow<str>` lets maps keyed by `SocketId` be queried with `&str`
//!
//! ## Last Modified
//! v0.1.0 - Initial type definitions

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::SocketAddr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{CommonError, Result};

// ============================================
// SocketId
// ============================================

/// Socket identity of a peer: `host:port`.
///
/// # Example
/// ```
/// use peerlink_common::SocketId;
///
/// let id: SocketId = "127.0.0.1:9090".parse().unwrap();
/// assert_eq!(id.host(), "127.0.0.1");
/// assert_eq!(id.port(), 9090);
///
/// assert!("no-port".parse::<SocketId>().is_err());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SocketId {
    value: String,
    port: u16,
    host_len: usize,
}

impl SocketId {
    /// Parses and validates a socket identity.
    ///
    /// # Errors
    /// Returns `InvalidSocket` if the host is empty or the port is not a
    /// valid `u16`.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        let (host, port) = value
            .rsplit_once(':')
            .ok_or_else(|| CommonError::invalid_socket(&value, "expected host:port"))?;

        if host.is_empty() {
            return Err(CommonError::invalid_socket(&value, "host cannot be empty"));
        }

        let port: u16 = port
            .parse()
            .map_err(|_| CommonError::invalid_socket(&value, format!("invalid port '{port}'")))?;

        let host_len = host.len();
        Ok(Self {
            value,
            port,
            host_len,
        })
    }

    /// Returns the identity as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.value
    }

    /// Returns the host part (without the port).
    #[must_use]
    pub fn host(&self) -> &str {
        &self.value[..self.host_len]
    }

    /// Returns the port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns the identity as raw bytes, e.g. for an event payload.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        self.value.as_bytes().to_vec()
    }
}

impl From<SocketAddr> for SocketId {
    fn from(addr: SocketAddr) -> Self {
        let value = addr.to_string();
        let host_len = value.len() - addr.port().to_string().len() - 1;
        Self {
            value,
            port: addr.port(),
            host_len,
        }
    }
}

impl FromStr for SocketId {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for SocketId {
    type Error = CommonError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SocketId> for String {
    fn from(id: SocketId) -> Self {
        id.value
    }
}

// Identity is the text alone; `port` and `host_len` are derived from it.
// Hash must agree with `str` for the `Borrow<str>` lookups.
impl PartialEq for SocketId {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl Eq for SocketId {}

impl Hash for SocketId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}

impl PartialOrd for SocketId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SocketId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.value)
    }
}

impl AsRef<str> for SocketId {
    fn as_ref(&self) -> &str {
        &self.value
    }
}

impl Borrow<str> for SocketId {
    fn borrow(&self) -> &str {
        &self.value
    }
}

// ============================================
// Tests
// ============================================
