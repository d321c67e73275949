// ============================================
// File: crates/peerlink-core/src/lib.rs
// ============================================
//! # PeerLink Core - Handshake & Cryptography Library
//!
//! ## Creation Reason
//! Holds everything security-relevant that does not touch a socket: the
//! Noise XX state machine, the per-direction cipher states and the
//! transport frame codec. Keeping it I/O free makes every step testable
//! in isolation.
//!
//! ## Main Functionality
//!
//! ### Crypto Module ([`crypto`])
//! - Key types (`StaticKeyPair`, `EphemeralKeyPair`, `PublicKey`, `SessionKey`)
//! - `HandshakeState` for `Noise_XX_25519_ChaChaPoly_SHA256`
//! - `CipherState` (ChaCha20-Poly1305 with a 64-bit counter)
//! - HKDF-SHA256 chaining
//!
//! ### Protocol Module ([`protocol`])
//! - `TransportFrame` and its binary codec
//! - Framing constants
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                 peerlink-node                       │
//! │                    │                                │
//! │         ┌──────────┴──────────┐                     │
//! │         ▼                     ▼                     │
//! │   peerlink-core         peerlink-transport          │
//! │   You are here                │                     │
//! │         │                     │                     │
//! │         └──────────┬──────────┘                     │
//! │                    ▼                                │
//! │             peerlink-common                         │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Security Guarantees
//! - **Confidentiality**: ChaCha20-Poly1305 authenticated encryption
//! - **Mutual Authentication**: both static keys are proven through DH
//! - **Forward Secrecy**: fresh X25519 ephemerals per handshake
//! - **Replay Protection**: counters only move forward
//!
//! ## ⚠️ Important Note for Next Developer
//! - ALL cryptographic code uses audited RustCrypto / dalek crates
//! - ALL keys MUST implement Zeroize for secure cleanup
//!
//! ## Last Modified
//! v0.1.0 - Initial implementation

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod crypto;
pub mod error;
pub mod protocol;

// Re-export commonly used items
pub use crypto::{
    CipherState, EphemeralKeyPair, HandshakeState, PublicKey, SessionKey, StaticKeyPair,
};
pub use error::{CoreError, Result};
pub use protocol::{
    ProtocolCodec, TransportFrame, FRAME_HEADER_SIZE, MAX_FRAME_SIZE, TRANSPORT_HEADER_SIZE,
    TRANSPORT_OVERHEAD,
};
