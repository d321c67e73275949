// ============================================
// File: crates/peerlink-core/src/crypto/keys.rs
// ============================================
//! # Cryptographic Key Types
//!
//! ## Creation Reason
//! Key types for the XX handshake with proper hygiene (zeroize on drop,
//! no secret material in `Debug`).
//!
//! ## Main Functionality
//! - `StaticKeyPair`: long-term X25519 identity (the Noise `s`)
//! - `EphemeralKeyPair`: per-handshake X25519 key (the Noise `e`)
//! - `PublicKey`: 32-byte X25519 public key, base64 on the wire of config
//!   files and logs
//! - `SessionKey`: symmetric ChaCha20-Poly1305 key held by a cipher state
//!
//! ## Key Lifecycle
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │  StaticKeyPair (long-term)                                 │
//! │  ├─ Loaded from config or generated at node start          │
//! │  ├─ Sent encrypted in XX messages 2 and 3                  │
//! │  └─ Identifies the node to its peers                       │
//! │                                                            │
//! │  EphemeralKeyPair (per handshake)                          │
//! │  ├─ Generated fresh for every connection                   │
//! │  ├─ Used for up to two DH operations (ee + es/se)          │
//! │  └─ Dropped (and zeroed) when the handshake state drops    │
//! │                                                            │
//! │  SessionKey (per direction)                                │
//! │  ├─ Produced by MixKey / Split                             │
//! │  └─ Zeroed when its cipher state drops                     │
//! └────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - Private keys are never logged or serialized except by `keygen`
//! - Every DH result is checked for contributory behaviour
//!
//! ## Last Modified
//! v0.1.0 - Initial key type definitions

use std::fmt;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use x25519_dalek::{PublicKey as X25519PublicKey, ReusableSecret, SharedSecret, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use super::{CHACHA20_KEY_SIZE, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

/// Output of a Diffie-Hellman operation, zeroed on drop.
pub type DhOutput = Zeroizing<[u8; X25519_PUBLIC_KEY_SIZE]>;

fn checked_shared(shared: &SharedSecret) -> Result<DhOutput> {
    // Low-order remote points yield an all-zero secret.
    if !shared.was_contributory() {
        return Err(CoreError::key_exchange("non-contributory remote public key"));
    }
    Ok(Zeroizing::new(*shared.as_bytes()))
}

// ============================================
// PublicKey
// ============================================

/// X25519 public key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct PublicKey([u8; X25519_PUBLIC_KEY_SIZE]);

impl PublicKey {
    /// Wraps raw public key bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; X25519_PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parses a public key from a slice.
    ///
    /// # Errors
    /// Returns `InvalidKey` if the slice is not 32 bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let arr: [u8; X25519_PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "public key must be {X25519_PUBLIC_KEY_SIZE} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(arr))
    }

    /// Returns the raw bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; X25519_PUBLIC_KEY_SIZE] {
        &self.0
    }

    fn as_dalek(&self) -> X25519PublicKey {
        X25519PublicKey::from(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({}...)", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&BASE64.encode(self.0))
    }
}

impl Serialize for PublicKey {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        if serializer.is_human_readable() {
            serializer.serialize_str(&BASE64.encode(self.0))
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let bytes = if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            BASE64.decode(&s).map_err(serde::de::Error::custom)?
        } else {
            <Vec<u8>>::deserialize(deserializer)?
        };
        Self::from_slice(&bytes).map_err(serde::de::Error::custom)
    }
}

// ============================================
// StaticKeyPair
// ============================================

/// Long-term X25519 identity of a node.
///
/// # Example
/// ```
/// use peerlink_core::crypto::StaticKeyPair;
///
/// let alice = StaticKeyPair::generate();
/// let bob = StaticKeyPair::generate();
///
/// let ab = alice.dh(&bob.public_key()).unwrap();
/// let ba = bob.dh(&alice.public_key()).unwrap();
/// assert_eq!(*ab, *ba);
/// ```
#[derive(Clone)]
pub struct StaticKeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl StaticKeyPair {
    /// Generates a new identity from the OS random number generator.
    #[must_use]
    pub fn generate() -> Self {
        Self::from_secret(StaticSecret::random_from_rng(OsRng))
    }

    fn from_secret(secret: StaticSecret) -> Self {
        let public = PublicKey(X25519PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Restores an identity from its 32 private key bytes.
    ///
    /// # Errors
    /// Returns `InvalidKey` if `bytes` is not 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let mut key_bytes: [u8; 32] = bytes.try_into().map_err(|_| {
            CoreError::invalid_key(format!(
                "X25519 private key must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;
        let secret = StaticSecret::from(key_bytes);
        key_bytes.zeroize();
        Ok(Self::from_secret(secret))
    }

    /// Restores an identity from a base64 private key.
    ///
    /// # Errors
    /// Returns an error if the string is not base64 or not 32 bytes.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            BASE64
                .decode(encoded.trim())
                .map_err(peerlink_common::CommonError::from)?,
        );
        Self::from_bytes(&bytes)
    }

    /// Exports the private key as base64.
    ///
    /// # Security Warning
    /// Only meant for writing a freshly generated key to a config file.
    #[must_use]
    pub fn to_base64(&self) -> String {
        let bytes = Zeroizing::new(self.secret.to_bytes());
        BASE64.encode(*bytes)
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Diffie-Hellman with a remote public key.
    ///
    /// # Errors
    /// Returns `KeyExchange` if the result is non-contributory.
    pub fn dh(&self, remote: &PublicKey) -> Result<DhOutput> {
        checked_shared(&self.secret.diffie_hellman(&remote.as_dalek()))
    }
}

impl fmt::Debug for StaticKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

// ============================================
// EphemeralKeyPair
// ============================================

/// Per-handshake X25519 key pair.
///
/// XX uses `e` twice on each side (`ee` plus `es` or `se`), so the
/// secret is a `ReusableSecret` that lives exactly as long as the
/// handshake state owning it.
pub struct EphemeralKeyPair {
    secret: ReusableSecret,
    public: PublicKey,
}

impl EphemeralKeyPair {
    /// Generates a new ephemeral key pair.
    #[must_use]
    pub fn generate() -> Self {
        let secret = ReusableSecret::random_from_rng(OsRng);
        let public = PublicKey(X25519PublicKey::from(&secret).to_bytes());
        Self { secret, public }
    }

    /// Returns the public key.
    #[must_use]
    pub const fn public_key(&self) -> PublicKey {
        self.public
    }

    /// Diffie-Hellman with a remote public key.
    ///
    /// # Errors
    /// Returns `KeyExchange` if the result is non-contributory.
    pub fn dh(&self, remote: &PublicKey) -> Result<DhOutput> {
        checked_shared(&self.secret.diffie_hellman(&remote.as_dalek()))
    }
}

impl fmt::Debug for EphemeralKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKeyPair")
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}

// ============================================
// SessionKey
// ============================================

/// Symmetric ChaCha20-Poly1305 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKey([u8; CHACHA20_KEY_SIZE]);

impl SessionKey {
    /// Creates a session key from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; CHACHA20_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Returns the raw key bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; CHACHA20_KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionKey([REDACTED])")
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_keypair_generation() {
        let kp1 = StaticKeyPair::generate();
        let kp2 = StaticKeyPair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
    }

    #[test]
    fn test_static_keypair_base64_restore() {
        let kp = StaticKeyPair::generate();
        let restored = StaticKeyPair::from_base64(&kp.to_base64()).unwrap();
        assert_eq!(kp.public_key(), restored.public_key());
    }

    #[test]
    fn test_static_keypair_rejects_bad_length() {
        assert!(StaticKeyPair::from_bytes(&[1u8; 31]).is_err());
        assert!(StaticKeyPair::from_base64("AAAA").is_err());
        assert!(StaticKeyPair::from_base64("not base64!").is_err());
    }

    #[test]
    fn test_ephemeral_static_agreement() {
        let e = EphemeralKeyPair::generate();
        let s = StaticKeyPair::generate();

        let es = e.dh(&s.public_key()).unwrap();
        let se = s.dh(&e.public_key()).unwrap();
        assert_eq!(*es, *se);

        // Reusable: a second DH with the same ephemeral works.
        let other = StaticKeyPair::generate();
        assert!(e.dh(&other.public_key()).is_ok());
    }

    #[test]
    fn test_low_order_point_rejected() {
        let s = StaticKeyPair::generate();
        let zero = PublicKey::from_bytes([0u8; 32]);
        assert!(matches!(s.dh(&zero), Err(CoreError::KeyExchange { .. })));
    }

    #[test]
    fn test_public_key_serialization() {
        let public = StaticKeyPair::generate().public_key();
        let json = serde_json::to_string(&public).unwrap();
        let restored: PublicKey = serde_json::from_str(&json).unwrap();
        assert_eq!(public, restored);
        assert_eq!(json.trim_matches('"'), public.to_string());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let kp = StaticKeyPair::generate();
        let debug = format!("{kp:?}");
        assert!(!debug.contains(&kp.to_base64()));
        assert_eq!(format!("{:?}", SessionKey::from_bytes([7; 32])), "SessionKey([REDACTED])");
    }
}
