// ============================================
// File: crates/peerlink-node/src/handlers/mod.rs
// ============================================
//! # Connection Handlers
//!
//! ## Creation Reason
//! Per-connection tasks spawned by the node once a peer is routed.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`watch`]: inbound frame loop for one peer
//!
//! ## Data Flow
//! ```text
//! Peer → TCP:
//!   1. Read one length-prefixed frame
//!   2. Decrypt with the session's receive state
//!   3. Publish MessageReceived with the plaintext
//!
//! Node → Peer:
//!   1. Node::send_message / Signal::reply
//!   2. Peer::send encrypts and writes under the writer lock
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - One watch task per peer; it owns the read half
//! - Update peer activity on every frame
//! - Log security failures at warn level
//!
//! ## Last Modified
//! v0.1.0 - Initial handlers structure

pub mod watch;

pub use watch::{watch, WatchContext};
