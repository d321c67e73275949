// ============================================
// File: crates/peerlink-common/src/lib.rs
// ============================================
//! # peerlink Common - Shared Utilities Library
//!
//! ## Creation Reason
//! Holds the small set of types every other peerlink crate agrees on,
//! so socket identities and activity clocks mean the same thing in the
//! transport layer, the handshake engine and the node.
//!
//! ## Main Functionality
//! - [`types`]: `SocketId`, the owned `host:port` identity of a peer
//! - [`time`]: `AtomicInstant` for lock-free idle tracking
//! - [`error`]: `CommonError` and the `Result` alias
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                peerlink-node                        │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   peerlink-core       peerlink-transport            │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │            peerlink-common  ◄── You are here        │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - This crate is the foundation, changes ripple everywhere
//! - Keep dependencies minimal (no tokio here)
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod time;
pub mod types;

pub use error::{CommonError, Result};
pub use time::AtomicInstant;
pub use types::SocketId;
