// ============================================
// File: crates/peerlink-core/src/protocol/mod.rs
// ============================================
//! # Protocol Module
//!
//! ## Creation Reason
//! Defines what travels on a peer stream once the XX handshake is over.
//!
//! ## Main Functionality
//! - [`codec`]: binary encoding of `TransportFrame`
//! - Size constants shared by the transport and node crates
//!
//! ## Protocol Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase                          │
//! │  [len u32 BE][msg1: 32]  [len][msg2: 96]  [len][msg3: 64]   │
//! ├─────────────────────────────────────────────────────────────┤
//! │                    Transport Phase                          │
//! │  [len u32 BE][counter u64 LE][ciphertext || tag]            │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - ANY wire change breaks every deployed peer
//! - Length prefix is big-endian, the counter is little-endian
//!
//! ## Last Modified
//! v0.1.0 - Initial protocol definitions

pub mod codec;

use bytes::Bytes;

use crate::crypto::cipher::ENCRYPTION_OVERHEAD;

pub use codec::{Codec, ProtocolCodec};

// ============================================
// Constants
// ============================================

/// Size of the stream length prefix (u32, big-endian).
pub const FRAME_HEADER_SIZE: usize = 4;

/// Size of the counter at the start of a transport body.
pub const TRANSPORT_HEADER_SIZE: usize = 8;

/// Bytes a transport body adds on top of the plaintext.
pub const TRANSPORT_OVERHEAD: usize = TRANSPORT_HEADER_SIZE + ENCRYPTION_OVERHEAD;

/// Hard upper bound for any frame body.
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

// ============================================
// TransportFrame
// ============================================

/// Encrypted application message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportFrame {
    /// Sender's counter, used as the AEAD nonce.
    pub counter: u64,
    /// Ciphertext including the Poly1305 tag.
    pub ciphertext: Bytes,
}

impl TransportFrame {
    /// Size of the encoded body.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        TRANSPORT_HEADER_SIZE + self.ciphertext.len()
    }
}
