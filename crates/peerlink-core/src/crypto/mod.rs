// ============================================
// File: crates/peerlink-core/src/crypto/mod.rs
// ============================================
//! # Cryptography Module
//!
//! ## Creation Reason
//! Implements `Noise_XX_25519_ChaChaPoly_SHA256` on top of audited
//! RustCrypto / dalek primitives. Only the protocol orchestration lives
//! here; the curve, the AEAD and the hash come from external crates.
//!
//! ## Main Functionality
//!
//! ### Submodules
//! - [`keys`]: X25519 static and ephemeral key pairs, `SessionKey`
//! - [`kdf`]: Noise `HASH` and two-output `HKDF`
//! - [`cipher`]: `CipherState` (key + 64-bit nonce) over ChaCha20-Poly1305
//! - [`handshake`]: `SymmetricState` and the XX `HandshakeState`
//!
//! ## Cryptographic Design
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Handshake Phase (XX)                     │
//! │  Initiator                                      Responder   │
//! │    │                                              │         │
//! │    │  -> e ─────────────────────────────────────► │         │
//! │    │ ◄───────────────────────── <- e, ee, s, es   │         │
//! │    │  -> s, se ─────────────────────────────────► │         │
//! │    │                                              │         │
//! │    │        Split() ─► (c1, c2)                   │         │
//! └─────────────────────────────────────────────────────────────┘
//!
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transport Phase                          │
//! │   initiator: encrypt=c1 decrypt=c2                          │
//! │   responder: encrypt=c2 decrypt=c1                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER roll your own primitives
//! - ALL secret keys implement Zeroize
//! - A (key, nonce) pair must never repeat
//!
//! ## Last Modified
//! v0.1.0 - Initial crypto implementation

pub mod cipher;
pub mod handshake;
pub mod kdf;
pub mod keys;

pub use cipher::CipherState;
pub use handshake::{HandshakeState, SymmetricState};
pub use keys::{EphemeralKeyPair, PublicKey, SessionKey, StaticKeyPair};

// ============================================
// Constants
// ============================================

/// Noise protocol name; exactly 32 bytes so it seeds `h` directly.
pub const PROTOCOL_NAME: &[u8; 32] = b"Noise_XX_25519_ChaChaPoly_SHA256";

/// Size of an X25519 public key (Noise `DHLEN`).
pub const X25519_PUBLIC_KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 key.
pub const CHACHA20_KEY_SIZE: usize = 32;

/// Size of a ChaCha20-Poly1305 nonce.
pub const CHACHA20_NONCE_SIZE: usize = 12;

/// Size of the Poly1305 authentication tag.
pub const POLY1305_TAG_SIZE: usize = 16;

/// Size of a SHA-256 digest (Noise `HASHLEN`).
pub const HASH_SIZE: usize = 32;
