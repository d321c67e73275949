// ============================================
// File: crates/peerlink-node/src/lib.rs
// ============================================
//! # PeerLink Node Library
//!
//! ## Creation Reason
//! Runs a peer-to-peer node: listens and dials over TCP, authenticates
//! every connection with a Noise XX handshake, keeps the routed peers, and
//! hands everything that happens to consumers as signals.
//!
//! ## Main Functionality
//!
//! ### Modules
//! - [`config`]: Node configuration (TOML)
//! - [`node`]: Node orchestration (listen, dial, send, signals, close)
//! - [`peer`]: One established connection
//! - [`services`]: Session, handshake and router
//! - [`events`]: Broker, topics, subscribers and signals
//! - [`handlers`]: Per-peer watch loop
//! - [`error`]: Node-specific error types
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          PeerLink Node                          │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────────┐    │
//! │  │   Config    │────►│    Node     │────►│  Watch loops    │    │
//! │  │             │     │             │     │  (one per peer) │    │
//! │  └─────────────┘     └──────┬──────┘     └────────┬────────┘    │
//! │                             │                     │             │
//! │         ┌───────────────────┼─────────────────────┤             │
//! │         ▼                   ▼                     ▼             │
//! │  ┌─────────────┐     ┌─────────────┐     ┌─────────────┐        │
//! │  │  Handshake  │     │   Router    │     │   Broker    │        │
//! │  │  + Session  │     │ (PeerTable) │     │  (signals)  │        │
//! │  └─────────────┘     └─────────────┘     └─────────────┘        │
//! │                                                                 │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                     Transport Layer (TCP, framed)               │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Data Flow
//! ```text
//! Peer → TCP → frame → decrypt → MessageReceived → consumer
//! consumer → send_message / reply → encrypt → frame → TCP → Peer
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Every node owns its router and broker; run as many as you like in
//!   one process
//! - Configuration changes require a restart (no hot-reload)
//! - `close` is terminal; build a new node to start again
//!
//! ## Last Modified
//! v0.1.0 - Initial node library

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod node;
pub mod peer;
pub mod services;

// Re-export primary types
pub use config::{DeliveryPolicy, NodeConfig};
pub use error::{ErrorKind, NodeError, Result};
pub use events::{Broker, EventType, Events, Signal, Subscriber};
pub use node::{Node, NodeState};
pub use peer::{CloseReason, ConnectionState, Peer};
pub use services::{PeerTable, Router, Session};

pub use peerlink_common::SocketId;
pub use peerlink_core::crypto::{PublicKey, StaticKeyPair};
