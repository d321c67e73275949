// ============================================
// File: crates/peerlink-node/src/services/session.rs
// ============================================
//! # Encrypted Session
//!
//! ## Creation Reason
//! Holds the two transport cipher states a finished handshake produces and
//! turns plaintext into transport frame bodies and back.
//!
//! ## Main Functionality
//! - `Session`: install-once cipher pair plus the authenticated remote key
//! - `SessionStats`: per-session traffic counters
//!
//! ## Session Lifecycle
//! ```text
//! ┌──────────────┐   set_ciphers (once)   ┌─────────────┐
//! │ Unestablished│ ─────────────────────► │ Established │
//! └──────────────┘                        └─────────────┘
//!   encrypt/decrypt                         encrypt → enc state
//!   fail with InvalidState                  decrypt → dec state
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - The encrypt and decrypt states are never swapped or shared; our
//!   encrypt state pairs with the remote decrypt state
//! - Callers that need wire ordering must hold their writer lock across
//!   `encrypt` and the write, so counters hit the wire in order
//! - A failed `decrypt` leaves the receive counter untouched
//!
//! ## Last Modified
//! v0.1.0 - Initial session implementation

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::trace;

use peerlink_core::crypto::{CipherState, PublicKey};
use peerlink_core::error::CoreError;
use peerlink_core::protocol::{Codec, ProtocolCodec, TransportFrame};

use crate::error::{NodeError, Result};

// ============================================
// Session Statistics
// ============================================

/// Session statistics.
#[derive(Debug, Default)]
pub struct SessionStats {
    /// Plaintext bytes decrypted.
    pub bytes_rx: AtomicU64,
    /// Plaintext bytes encrypted.
    pub bytes_tx: AtomicU64,
    /// Messages decrypted.
    pub messages_rx: AtomicU64,
    /// Messages encrypted.
    pub messages_tx: AtomicU64,
    /// Frames that failed authentication or replay checks.
    pub rejected: AtomicU64,
}

impl SessionStats {
    /// Counts one decrypted message.
    pub fn record_rx(&self, bytes: u64) {
        self.bytes_rx.fetch_add(bytes, Ordering::Relaxed);
        self.messages_rx.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one encrypted message.
    pub fn record_tx(&self, bytes: u64) {
        self.bytes_tx.fetch_add(bytes, Ordering::Relaxed);
        self.messages_tx.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts one rejected frame.
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            bytes_rx: self.bytes_rx.load(Ordering::Relaxed),
            bytes_tx: self.bytes_tx.load(Ordering::Relaxed),
            messages_rx: self.messages_rx.load(Ordering::Relaxed),
            messages_tx: self.messages_tx.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Plain copy of [`SessionStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Plaintext bytes decrypted.
    pub bytes_rx: u64,
    /// Plaintext bytes encrypted.
    pub bytes_tx: u64,
    /// Messages decrypted.
    pub messages_rx: u64,
    /// Messages encrypted.
    pub messages_tx: u64,
    /// Frames rejected.
    pub rejected: u64,
}

// ============================================
// Session
// ============================================

struct CipherPair {
    enc: Mutex<CipherState>,
    dec: Mutex<CipherState>,
}

/// Post-handshake encrypted duplex.
#[derive(Default)]
pub struct Session {
    ciphers: OnceLock<CipherPair>,
    remote_static: OnceLock<PublicKey>,
    codec: ProtocolCodec,
    stats: SessionStats,
}

impl Session {
    /// Creates an unestablished session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs the transport cipher states. Succeeds once per session.
    ///
    /// # Errors
    /// `Security` if either state has no key or ciphers are already set.
    pub fn set_ciphers(&self, enc: CipherState, dec: CipherState) -> Result<()> {
        let which = match (enc.has_key(), dec.has_key()) {
            (true, true) => None,
            (false, true) => Some("encrypt"),
            (true, false) => Some("decrypt"),
            (false, false) => Some("both"),
        };
        if let Some(which) = which {
            return Err(CoreError::MissingCipherState { which }.into());
        }

        self.ciphers
            .set(CipherPair {
                enc: Mutex::new(enc),
                dec: Mutex::new(dec),
            })
            .map_err(|_| NodeError::security("session ciphers already installed"))
    }

    /// Records the remote static key learnt during the handshake.
    ///
    /// # Errors
    /// `Security` if a different key was already recorded.
    pub fn set_remote_static(&self, key: PublicKey) -> Result<()> {
        let stored = self.remote_static.get_or_init(|| key);
        if *stored != key {
            return Err(NodeError::security("remote static key changed"));
        }
        Ok(())
    }

    /// Remote static key, once authenticated.
    #[must_use]
    pub fn remote_static(&self) -> Option<PublicKey> {
        self.remote_static.get().copied()
    }

    /// True once cipher states are installed.
    #[must_use]
    pub fn is_established(&self) -> bool {
        self.ciphers.get().is_some()
    }

    /// Traffic counters.
    #[must_use]
    pub const fn stats(&self) -> &SessionStats {
        &self.stats
    }

    fn pair(&self, operation: &str) -> Result<&CipherPair> {
        self.ciphers
            .get()
            .ok_or_else(|| CoreError::invalid_state(operation, "established session").into())
    }

    /// Encrypts `plaintext` into a transport frame body.
    ///
    /// # Errors
    /// `InvalidState` before the handshake, `NonceExhausted` after 2^64 - 1
    /// messages.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Bytes> {
        let pair = self.pair("encrypt")?;
        let (counter, ciphertext) = pair.enc.lock().seal(plaintext)?;

        let frame = TransportFrame {
            counter,
            ciphertext: Bytes::from(ciphertext),
        };
        trace!(counter, len = plaintext.len(), "sealed transport frame");

        self.stats.record_tx(plaintext.len() as u64);
        Ok(self.codec.encode_to_bytes(&frame))
    }

    /// Decrypts a transport frame body.
    ///
    /// # Errors
    /// - `MessageTooShort` / `MalformedMessage` for a truncated body
    /// - `Decryption` on authentication failure
    /// - `ReplayDetected` for a counter below the expected one
    pub fn decrypt(&self, body: Bytes) -> Result<Bytes> {
        let pair = self.pair("decrypt")?;
        let mut body = body;

        let result = self
            .codec
            .decode(&mut body)
            .and_then(|frame: TransportFrame| pair.dec.lock().open(frame.counter, &frame.ciphertext));

        match result {
            Ok(plaintext) => {
                self.stats.record_rx(plaintext.len() as u64);
                Ok(Bytes::from(plaintext))
            }
            Err(e) => {
                self.stats.record_rejected();
                Err(e.into())
            }
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("established", &self.is_established())
            .field("remote_static", &self.remote_static())
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use peerlink_core::crypto::SessionKey;

    fn pair() -> (Session, Session) {
        let k1 = SessionKey::from_bytes([1u8; 32]);
        let k2 = SessionKey::from_bytes([2u8; 32]);

        let a = Session::new();
        a.set_ciphers(
            CipherState::with_key(k1.clone()),
            CipherState::with_key(k2.clone()),
        )
        .unwrap();

        let b = Session::new();
        b.set_ciphers(CipherState::with_key(k2), CipherState::with_key(k1))
            .unwrap();
        (a, b)
    }

    #[test]
    fn test_duplex_round_trip() {
        let (a, b) = pair();

        let body = a.encrypt(b"hello from a").unwrap();
        assert_eq!(&b.decrypt(body).unwrap()[..], b"hello from a");

        let body = b.encrypt(b"hello from b").unwrap();
        assert_eq!(&a.decrypt(body).unwrap()[..], b"hello from b");

        assert_eq!(a.stats().snapshot().messages_tx, 1);
        assert_eq!(a.stats().snapshot().messages_rx, 1);
    }

    #[test]
    fn test_own_ciphertext_is_rejected() {
        let (a, _b) = pair();
        let body = a.encrypt(b"loopback").unwrap();
        let err = a.decrypt(body).unwrap_err();
        assert!(err.is_security_error());
        assert_eq!(a.stats().snapshot().rejected, 1);
    }

    #[test]
    fn test_unestablished_session() {
        let session = Session::new();
        assert!(!session.is_established());
        assert!(matches!(
            session.encrypt(b"x"),
            Err(NodeError::Core(CoreError::InvalidState { .. }))
        ));
        assert!(session.decrypt(Bytes::from_static(&[0u8; 40])).is_err());
    }

    #[test]
    fn test_missing_cipher_state_rejected() {
        let session = Session::new();
        let err = session
            .set_ciphers(
                CipherState::with_key(SessionKey::from_bytes([1u8; 32])),
                CipherState::empty(),
            )
            .unwrap_err();
        assert!(err.is_security_error());
        assert!(!session.is_established());
    }

    #[test]
    fn test_ciphers_install_once() {
        let (a, _b) = pair();
        let err = a
            .set_ciphers(
                CipherState::with_key(SessionKey::from_bytes([3u8; 32])),
                CipherState::with_key(SessionKey::from_bytes([4u8; 32])),
            )
            .unwrap_err();
        assert!(err.is_security_error());
    }

    #[test]
    fn test_replayed_frame_rejected() {
        let (a, b) = pair();
        let first = a.encrypt(b"one").unwrap();
        b.decrypt(first.clone()).unwrap();

        let err = b.decrypt(first).unwrap_err();
        assert!(matches!(err, NodeError::Core(CoreError::ReplayDetected { .. })));
    }

    #[test]
    fn test_truncated_body() {
        let (_a, b) = pair();
        let err = b.decrypt(Bytes::from_static(&[0u8; 10])).unwrap_err();
        assert!(!err.is_security_error());
    }

    #[test]
    fn test_remote_static_is_sticky() {
        let session = Session::new();
        let key = PublicKey::from_bytes([9u8; 32]);
        session.set_remote_static(key).unwrap();
        session.set_remote_static(key).unwrap();
        assert!(session
            .set_remote_static(PublicKey::from_bytes([8u8; 32]))
            .is_err());
        assert_eq!(session.remote_static(), Some(key));
    }
}
