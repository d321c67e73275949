// ============================================
// File: crates/peerlink-node/src/services/mod.rs
// ============================================
//! # Node Services
//!
//! ## Creation Reason
//! Per-peer state and the logic that establishes it, kept apart from
//! the accept loop and the event bus.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`session`]: encrypt/decrypt cipher states of one peer
//! - [`handshake`]: drives the Noise XX exchange over a stream
//! - [`router`]: socket identity → peer table
//!
//! ## Service Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Service Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌──────────────────┐   ┌─────────────────────────────────┐ │
//! │  │  Handshake       │   │      Session                    │ │
//! │  │                  │──►│  - enc / dec cipher states      │ │
//! │  │  - 3 messages    │   │  - remote static key            │ │
//! │  │  - timed by node │   │  - traffic counters             │ │
//! │  └──────────────────┘   └─────────────────────────────────┘ │
//! │                                                             │
//! │  ┌─────────────────────────────────────────────────────────┐ │
//! │  │      Router (PeerTable)                                 │ │
//! │  │  - add / remove / query by socket identity              │ │
//! │  │  - connection cap                                       │ │
//! │  └─────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A session is installed exactly once, by a finished handshake
//! - The router holds `Arc<Peer>`; removal is by pointer, so a stale
//!   watch loop never evicts its replacement
//!
//! ## Last Modified
//! v0.1.0 - Initial services structure

pub mod handshake;
pub mod router;
pub mod session;

// Re-export primary types
pub use handshake::Handshake;
pub use router::{PeerTable, Router};
pub use session::{Session, SessionStats};
