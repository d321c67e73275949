// ============================================
// File: crates/peerlink-core/src/protocol/codec.rs
// ============================================
//! # Protocol Codec
//!
//! ## Creation Reason
//! Binary encoding of the transport-phase frame body: the sender's
//! counter followed by the AEAD output.
//!
//! ## Main Functionality
//! - `Codec` trait: generic encode/decode interface
//! - `ProtocolCodec`: implementation for `TransportFrame`
//!
//! ## Wire Format
//! ```text
//! ┌──────────────────────┬──────────────────────────────────┐
//! │ counter (u64, LE)    │ ciphertext || tag (16 bytes)     │
//! │ 8 bytes              │ variable                          │
//! └──────────────────────┴──────────────────────────────────┘
//! ```
//! The stream layer prepends its own 4-byte big-endian length.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Always validate buffer lengths before reading
//! - The counter is authenticated implicitly: it is the AEAD nonce
//!
//! ## Last Modified
//! v0.1.0 - Initial codec implementation

use bytes::{Buf, BufMut, Bytes, BytesMut};

use super::{TransportFrame, TRANSPORT_HEADER_SIZE};
use crate::crypto::cipher::ENCRYPTION_OVERHEAD;
use crate::error::{CoreError, Result};

// ============================================
// Codec Trait
// ============================================

/// Trait for encoding and decoding protocol messages.
///
/// # Type Parameters
/// * `T` - The message type to encode/decode
pub trait Codec<T> {
    /// Encodes a message into a byte buffer.
    fn encode(&self, msg: &T, buf: &mut BytesMut);

    /// Decodes a message from bytes.
    ///
    /// # Errors
    /// Returns an error if the buffer does not hold a valid message.
    fn decode(&self, buf: &mut Bytes) -> Result<T>;
}

// ============================================
// ProtocolCodec
// ============================================

/// Codec implementation for protocol frames.
#[derive(Debug, Default, Clone)]
pub struct ProtocolCodec;

impl ProtocolCodec {
    /// Creates a new protocol codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Encodes a frame into a fresh `Bytes`.
    #[must_use]
    pub fn encode_to_bytes(&self, frame: &TransportFrame) -> Bytes {
        let mut buf = BytesMut::with_capacity(frame.encoded_len());
        self.encode(frame, &mut buf);
        buf.freeze()
    }
}

impl Codec<TransportFrame> for ProtocolCodec {
    fn encode(&self, msg: &TransportFrame, buf: &mut BytesMut) {
        buf.reserve(msg.encoded_len());
        buf.put_u64_le(msg.counter);
        buf.put_slice(&msg.ciphertext);
    }

    fn decode(&self, buf: &mut Bytes) -> Result<TransportFrame> {
        let min = TRANSPORT_HEADER_SIZE + ENCRYPTION_OVERHEAD;
        if buf.len() < min {
            return Err(CoreError::too_short(min, buf.len()));
        }

        let counter = buf.get_u64_le();
        let ciphertext = buf.split_to(buf.len());

        Ok(TransportFrame {
            counter,
            ciphertext,
        })
    }
}

// ============================================
// Tests
// ============================================
