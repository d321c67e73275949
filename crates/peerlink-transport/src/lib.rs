// ============================================
// File: crates/peerlink-transport/src/lib.rs
// ============================================
//! # PeerLink Transport - Network I/O Layer
//!
//! ## Creation Reason
//! Moves bytes between peers: TCP listening and dialing plus the
//! length-prefixed framing every peer stream uses. Knows nothing about
//! keys or sessions.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`traits`]: `Transport` listener trait and the `Connection` handle
//! - [`tcp`]: TCP listener and dialer
//! - [`frame`]: `u32` big-endian length-prefixed frames
//! - [`error`]: Transport-specific error types
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 peerlink-node                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   peerlink-core         peerlink-transport          │
//! │                         You are here ◄──            │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             peerlink-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always go through the traits so tests can swap in memory pipes
//! - In-memory pairs are available with the `mock` feature
//!
//! ## Last Modified
//! v0.1.0 - Initial transport layer implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod frame;
pub mod tcp;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export primary types
pub use error::{Result, TransportError};
pub use frame::{read_frame, write_frame, ReadOutcome};
pub use tcp::{connect, TcpTransport};
pub use traits::{BoxedReader, BoxedWriter, Connection, Transport};
