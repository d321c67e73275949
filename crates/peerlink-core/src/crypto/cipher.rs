// ============================================
// File: crates/peerlink-core/src/crypto/cipher.rs
// ============================================
//! # Cipher State
//!
//! ## Creation Reason
//! One direction of an encrypted channel: a ChaCha20-Poly1305 key plus a
//! 64-bit counter. Used inside the handshake (`EncryptAndHash`) and, after
//! `Split`, for transport messages.
//!
//! ## Main Functionality
//! - `CipherState::encrypt_with_ad` / `decrypt_with_ad`: Noise semantics,
//!   implicit nonce that advances on success
//! - `CipherState::seal` / `open`: transport semantics, the counter travels
//!   with the frame and the receiver only accepts counters that move forward
//!
//! ## Nonce Construction
//! ```text
//! nonce (12 bytes) = 0x00000000 (4 bytes) || counter (8 bytes LE)
//! ```
//!
//! ## ⚠️ Important Note for Next Developer
//! - A cipher state is either an encryptor or a decryptor, never both
//! - Counter `u64::MAX` is reserved; reaching it fails with `NonceExhausted`
//! - `open` tolerates gaps (skipped frames) but never a counter below the
//!   next expected one
//!
//! ## Last Modified
//! v0.1.0 - Initial cipher state implementation

use std::fmt;

use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Nonce,
};

use super::keys::SessionKey;
use super::{CHACHA20_NONCE_SIZE, POLY1305_TAG_SIZE};
use crate::error::{CoreError, Result};

/// Overhead added by encryption (auth tag).
pub const ENCRYPTION_OVERHEAD: usize = POLY1305_TAG_SIZE;

/// Constructs a nonce from a counter value.
fn make_nonce(counter: u64) -> Nonce {
    let mut nonce = [0u8; CHACHA20_NONCE_SIZE];
    nonce[4..].copy_from_slice(&counter.to_le_bytes());
    Nonce::from(nonce)
}

// ============================================
// CipherState
// ============================================

/// Key + counter for one direction.
///
/// # Example
/// ```
/// use peerlink_core::crypto::{CipherState, SessionKey};
///
/// let key = [9u8; 32];
/// let mut tx = CipherState::with_key(SessionKey::from_bytes(key));
/// let mut rx = CipherState::with_key(SessionKey::from_bytes(key));
///
/// let (counter, ciphertext) = tx.seal(b"ping").unwrap();
/// assert_eq!(rx.open(counter, &ciphertext).unwrap(), b"ping");
/// ```
pub struct CipherState {
    key: Option<SessionKey>,
    nonce: u64,
}

impl CipherState {
    /// Creates a cipher state without a key (handshake start).
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            key: None,
            nonce: 0,
        }
    }

    /// Creates a cipher state with `key` and counter 0.
    #[must_use]
    pub const fn with_key(key: SessionKey) -> Self {
        Self {
            key: Some(key),
            nonce: 0,
        }
    }

    /// Replaces the key and resets the counter (Noise `InitializeKey`).
    pub fn initialize_key(&mut self, key: SessionKey) {
        self.key = Some(key);
        self.nonce = 0;
    }

    /// Returns `true` once a key is installed.
    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.key.is_some()
    }

    /// Next counter value this state will use.
    #[must_use]
    pub const fn nonce(&self) -> u64 {
        self.nonce
    }

    fn cipher(key: &SessionKey) -> Result<ChaCha20Poly1305> {
        ChaCha20Poly1305::new_from_slice(key.as_bytes())
            .map_err(|_| CoreError::encryption("failed to create cipher"))
    }

    fn check_nonce(&self) -> Result<()> {
        if self.nonce == u64::MAX {
            return Err(CoreError::NonceExhausted);
        }
        Ok(())
    }

    /// Noise `EncryptWithAd`. Without a key the plaintext is returned as is.
    ///
    /// # Errors
    /// `NonceExhausted` when the counter is used up, `Encryption` if the
    /// AEAD fails.
    pub fn encrypt_with_ad(&mut self, ad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let Some(key) = &self.key else {
            return Ok(plaintext.to_vec());
        };
        self.check_nonce()?;

        let ciphertext = Self::cipher(key)?
            .encrypt(
                &make_nonce(self.nonce),
                Payload {
                    msg: plaintext,
                    aad: ad,
                },
            )
            .map_err(|_| CoreError::encryption("ChaCha20-Poly1305 encryption failed"))?;

        self.nonce += 1;
        Ok(ciphertext)
    }

    /// Noise `DecryptWithAd`. Without a key the ciphertext is returned as is.
    ///
    /// # Errors
    /// `Decryption` if authentication fails; the counter is not advanced.
    pub fn decrypt_with_ad(&mut self, ad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let Some(key) = &self.key else {
            return Ok(ciphertext.to_vec());
        };
        self.check_nonce()?;

        if ciphertext.len() < ENCRYPTION_OVERHEAD {
            return Err(CoreError::too_short(ENCRYPTION_OVERHEAD, ciphertext.len()));
        }

        let plaintext = Self::cipher(key)?
            .decrypt(
                &make_nonce(self.nonce),
                Payload {
                    msg: ciphertext,
                    aad: ad,
                },
            )
            .map_err(|_| CoreError::Decryption)?;

        self.nonce += 1;
        Ok(plaintext)
    }

    // ========================================
    // Transport
    // ========================================

    /// Encrypts a transport message and returns the counter it used.
    ///
    /// # Errors
    /// `InvalidState` without a key, otherwise as `encrypt_with_ad`.
    pub fn seal(&mut self, plaintext: &[u8]) -> Result<(u64, Vec<u8>)> {
        if !self.has_key() {
            return Err(CoreError::invalid_state("seal", "keyed cipher state"));
        }
        let counter = self.nonce;
        let ciphertext = self.encrypt_with_ad(&[], plaintext)?;
        Ok((counter, ciphertext))
    }

    /// Decrypts a transport message sent with `counter`.
    ///
    /// # Errors
    /// `ReplayDetected` if `counter` is below the next expected value,
    /// `Decryption` if authentication fails. In both cases the state is
    /// left untouched.
    pub fn open(&mut self, counter: u64, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if !self.has_key() {
            return Err(CoreError::invalid_state("open", "keyed cipher state"));
        }
        if counter < self.nonce {
            return Err(CoreError::replay(counter, self.nonce));
        }

        let expected = self.nonce;
        self.nonce = counter;
        match self.decrypt_with_ad(&[], ciphertext) {
            Ok(plaintext) => Ok(plaintext),
            Err(e) => {
                self.nonce = expected;
                Err(e)
            }
        }
    }
}

impl fmt::Debug for CipherState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CipherState")
            .field("has_key", &self.has_key())
            .field("nonce", &self.nonce)
            .finish()
    }
}

// ============================================
// Tests
// ============================================
