// ============================================
// File: crates/peerlink-transport/src/mock.rs
// ============================================
//! # In-Memory Connections
//!
//! ## Creation Reason
//! Lets handshake and watch-loop tests run without sockets.
//!
//! ## Usage in Tests
//! ```ignore
//! let (a, b) = Connection::pair();
//! write_frame(&mut a.writer, b"ping", 64).await?;
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Test-only; enabled by `cfg(test)` or the `mock` feature
//! - The other side sees EOF once a writer is shut down or both halves
//!   of an end are dropped
//!
//! ## Last Modified
//! v0.1.0 - Initial mock implementation

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicU16, Ordering};

use tokio::io::{duplex, split};

use crate::traits::Connection;

/// Buffer size of each in-memory pipe.
const PIPE_CAPACITY: usize = 64 * 1024;

static NEXT_PORT: AtomicU16 = AtomicU16::new(40_000);

fn fake_addr() -> SocketAddr {
    let port = NEXT_PORT.fetch_add(1, Ordering::Relaxed);
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, port))
}

impl Connection {
    /// Creates two connected in-memory ends with distinct fake addresses.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (left, right) = duplex(PIPE_CAPACITY);
        let (left_addr, right_addr) = (fake_addr(), fake_addr());

        let (lr, lw) = split(left);
        let (rr, rw) = split(right);

        (
            Self::new(Box::new(lr), Box::new(lw), right_addr, left_addr),
            Self::new(Box::new(rr), Box::new(rw), left_addr, right_addr),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{read_frame, write_frame, ReadOutcome};

    #[tokio::test]
    async fn test_pair_is_connected() {
        let (mut a, mut b) = Connection::pair();
        assert_eq!(a.remote, b.local);
        assert_eq!(b.remote, a.local);

        write_frame(&mut a.writer, b"ping", 64).await.unwrap();
        assert_eq!(
            read_frame(&mut b.reader, 64).await.unwrap(),
            ReadOutcome::Frame(bytes::Bytes::from_static(b"ping"))
        );
    }
}
