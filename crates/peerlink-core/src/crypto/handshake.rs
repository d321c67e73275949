// ============================================
// File: crates/peerlink-core/src/crypto/handshake.rs
// ============================================
//! # XX Handshake State Machine
//!
//! ## Creation Reason
//! Drives the three messages of `Noise_XX_25519_ChaChaPoly_SHA256`.
//! Both peers prove ownership of their static key through DH, so no
//! signatures are involved and neither side needs to know the other's
//! key in advance.
//!
//! ## Main Functionality
//! - `SymmetricState`: chaining key `ck`, handshake hash `h` and the
//!   handshake-phase `CipherState`
//! - `HandshakeState`: token processing for the XX pattern, turn tracking
//!   and the final `Split`
//!
//! ## Handshake Flow
//! ```text
//! Initiator                                          Responder
//!   │                                                    │
//!   │  msg1: e                              (32 bytes)   │
//!   │ ─────────────────────────────────────────────────► │
//!   │                                                    │
//!   │  msg2: e, ee, s, es                   (96 bytes)   │
//!   │ ◄───────────────────────────────────────────────── │
//!   │                                                    │
//!   │  msg3: s, se                          (64 bytes)   │
//!   │ ─────────────────────────────────────────────────► │
//!   │                                                    │
//!   │ ═════════════ Split() -> (c1, c2) ════════════════ │
//! ```
//! Sizes assume an empty payload. Once a key is mixed in, every static
//! key and every payload carries a 16-byte tag.
//!
//! ## ⚠️ Important Note for Next Developer
//! - `es` / `se` are computed differently per role (see `mix_dh`)
//! - Any error poisons the state; start a new handshake instead of retrying
//! - Never log `ck`, `h` or DH outputs
//!
//! ## Last Modified
//! v0.1.0 - Initial XX handshake implementation

use std::fmt;

use tracing::trace;
use zeroize::Zeroizing;

use super::cipher::{CipherState, ENCRYPTION_OVERHEAD};
use super::kdf::{hash, hkdf2};
use super::keys::{EphemeralKeyPair, PublicKey, SessionKey, StaticKeyPair};
use super::{HASH_SIZE, PROTOCOL_NAME, X25519_PUBLIC_KEY_SIZE};
use crate::error::{CoreError, Result};

/// Cipher states produced by a finished handshake, as
/// `(encrypt, decrypt)` for the local side.
pub type TransportCiphers = (CipherState, CipherState);

// ============================================
// SymmetricState
// ============================================

/// Noise `SymmetricState`.
pub struct SymmetricState {
    cipher: CipherState,
    ck: Zeroizing<[u8; HASH_SIZE]>,
    h: [u8; HASH_SIZE],
}

impl SymmetricState {
    /// `InitializeSymmetric` for a 32-byte protocol name.
    #[must_use]
    pub fn initialize(protocol_name: &[u8; HASH_SIZE]) -> Self {
        Self {
            cipher: CipherState::empty(),
            ck: Zeroizing::new(*protocol_name),
            h: *protocol_name,
        }
    }

    /// `h = HASH(h || data)`
    pub fn mix_hash(&mut self, data: &[u8]) {
        self.h = hash(&[&self.h, data]);
    }

    /// `ck, k = HKDF(ck, ikm)`, then installs `k`.
    ///
    /// # Errors
    /// Propagates key derivation failures.
    pub fn mix_key(&mut self, ikm: &[u8]) -> Result<()> {
        let (ck, k) = hkdf2(&self.ck, ikm)?;
        self.ck = ck;
        self.cipher.initialize_key(SessionKey::from_bytes(*k));
        Ok(())
    }

    /// Encrypts with `h` as associated data and mixes the ciphertext.
    ///
    /// # Errors
    /// Propagates cipher failures.
    pub fn encrypt_and_hash(&mut self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let ciphertext = self.cipher.encrypt_with_ad(&self.h, plaintext)?;
        self.mix_hash(&ciphertext);
        Ok(ciphertext)
    }

    /// Decrypts with `h` as associated data and mixes the ciphertext.
    ///
    /// # Errors
    /// `Decryption` if the tag does not verify.
    pub fn decrypt_and_hash(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>> {
        let plaintext = self.cipher.decrypt_with_ad(&self.h, ciphertext)?;
        self.mix_hash(ciphertext);
        Ok(plaintext)
    }

    /// Derives the two transport cipher states `(c1, c2)`.
    ///
    /// # Errors
    /// Propagates key derivation failures.
    pub fn split(&self) -> Result<(CipherState, CipherState)> {
        let (k1, k2) = hkdf2(&self.ck, &[])?;
        Ok((
            CipherState::with_key(SessionKey::from_bytes(*k1)),
            CipherState::with_key(SessionKey::from_bytes(*k2)),
        ))
    }

    /// Returns `true` once a key has been mixed in.
    #[must_use]
    pub const fn has_key(&self) -> bool {
        self.cipher.has_key()
    }

    /// Current handshake hash.
    #[must_use]
    pub const fn handshake_hash(&self) -> [u8; HASH_SIZE] {
        self.h
    }
}

// ============================================
// Pattern
// ============================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Token {
    E,
    S,
    EE,
    ES,
    SE,
}

/// `XX: -> e / <- e, ee, s, es / -> s, se`
const XX_PATTERN: [&[Token]; 3] = [
    &[Token::E],
    &[Token::E, Token::EE, Token::S, Token::ES],
    &[Token::S, Token::SE],
];

/// Number of messages in the pattern.
pub const HANDSHAKE_MESSAGES: usize = XX_PATTERN.len();

/// Largest handshake message with an empty payload (message 2).
pub const MAX_HANDSHAKE_MESSAGE_SIZE: usize =
    2 * X25519_PUBLIC_KEY_SIZE + 2 * ENCRYPTION_OVERHEAD;

fn take<'a>(msg: &mut &'a [u8], n: usize) -> Result<&'a [u8]> {
    if msg.len() < n {
        return Err(CoreError::too_short(n, msg.len()));
    }
    let (head, tail) = msg.split_at(n);
    *msg = tail;
    Ok(head)
}

// ============================================
// HandshakeState
// ============================================

/// Noise `HandshakeState` for the XX pattern.
///
/// # Example
/// ```
/// use peerlink_core::crypto::{HandshakeState, StaticKeyPair};
///
/// let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
/// let mut bob = HandshakeState::new(StaticKeyPair::generate(), false, b"");
/// let mut buf = [0u8; 96];
///
/// let (n, _) = alice.write_message(&[], &mut buf).unwrap();
/// bob.read_message(&buf[..n]).unwrap();
/// let (n, _) = bob.write_message(&[], &mut buf).unwrap();
/// alice.read_message(&buf[..n]).unwrap();
/// let (n, alice_ciphers) = alice.write_message(&[], &mut buf).unwrap();
/// let (_, bob_ciphers) = bob.read_message(&buf[..n]).unwrap();
///
/// let (mut a_enc, _) = alice_ciphers.unwrap();
/// let (_, mut b_dec) = bob_ciphers.unwrap();
/// let (counter, ct) = a_enc.seal(b"hi").unwrap();
/// assert_eq!(b_dec.open(counter, &ct).unwrap(), b"hi");
/// ```
pub struct HandshakeState {
    symmetric: SymmetricState,
    s: StaticKeyPair,
    e: Option<EphemeralKeyPair>,
    rs: Option<PublicKey>,
    re: Option<PublicKey>,
    initiator: bool,
    step: usize,
    poisoned: bool,
}

impl HandshakeState {
    /// `Initialize` with the local static key and a prologue both sides
    /// must agree on.
    #[must_use]
    pub fn new(s: StaticKeyPair, initiator: bool, prologue: &[u8]) -> Self {
        let mut symmetric = SymmetricState::initialize(PROTOCOL_NAME);
        symmetric.mix_hash(prologue);
        Self {
            symmetric,
            s,
            e: None,
            rs: None,
            re: None,
            initiator,
            step: 0,
            poisoned: false,
        }
    }

    /// Returns `true` for the initiating side.
    #[must_use]
    pub const fn is_initiator(&self) -> bool {
        self.initiator
    }

    /// Returns `true` after the third message.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.step >= HANDSHAKE_MESSAGES
    }

    /// Returns `true` if the next message is ours to write.
    #[must_use]
    pub const fn is_my_turn(&self) -> bool {
        (self.step % 2 == 0) == self.initiator
    }

    /// Index (0-based) of the next message.
    #[must_use]
    pub const fn step(&self) -> usize {
        self.step
    }

    /// Remote static key, known after message 2 (initiator) or 3
    /// (responder).
    #[must_use]
    pub const fn remote_static(&self) -> Option<PublicKey> {
        self.rs
    }

    /// Current handshake hash; equal on both sides once finished.
    #[must_use]
    pub const fn handshake_hash(&self) -> [u8; HASH_SIZE] {
        self.symmetric.handshake_hash()
    }

    /// Exact size of the next message when its payload is empty.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        if self.is_finished() {
            return 0;
        }
        let mut keyed = self.symmetric.has_key();
        let mut len = 0;
        for token in XX_PATTERN[self.step] {
            match token {
                Token::E => len += X25519_PUBLIC_KEY_SIZE,
                Token::S => {
                    len += X25519_PUBLIC_KEY_SIZE;
                    if keyed {
                        len += ENCRYPTION_OVERHEAD;
                    }
                }
                Token::EE | Token::ES | Token::SE => keyed = true,
            }
        }
        if keyed {
            len += ENCRYPTION_OVERHEAD;
        }
        len
    }

    fn ensure_turn(&self, writing: bool) -> Result<()> {
        if self.poisoned {
            return Err(CoreError::invalid_state("handshake", "state not poisoned"));
        }
        if self.is_finished() {
            return Err(CoreError::invalid_state("handshake", "unfinished handshake"));
        }
        if self.is_my_turn() != writing {
            let op = if writing { "write_message" } else { "read_message" };
            return Err(CoreError::invalid_state(op, "peer's turn"));
        }
        Ok(())
    }

    fn local_ephemeral(&self) -> Result<&EphemeralKeyPair> {
        self.e
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("dh", "local ephemeral key"))
    }

    fn remote_ephemeral(&self) -> Result<&PublicKey> {
        self.re
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("dh", "remote ephemeral key"))
    }

    fn remote_static_key(&self) -> Result<&PublicKey> {
        self.rs
            .as_ref()
            .ok_or_else(|| CoreError::invalid_state("dh", "remote static key"))
    }

    fn mix_dh(&mut self, token: Token) -> Result<()> {
        let shared = match (token, self.initiator) {
            (Token::EE, _) => self.local_ephemeral()?.dh(self.remote_ephemeral()?)?,
            (Token::ES, true) | (Token::SE, false) => {
                self.local_ephemeral()?.dh(self.remote_static_key()?)?
            }
            (Token::ES, false) | (Token::SE, true) => self.s.dh(self.remote_ephemeral()?)?,
            _ => return Err(CoreError::invalid_state("mix_dh", "DH token")),
        };
        self.symmetric.mix_key(&*shared)
    }

    fn finish_step(&mut self) -> Result<Option<TransportCiphers>> {
        self.step += 1;
        if !self.is_finished() {
            return Ok(None);
        }
        let (c1, c2) = self.symmetric.split()?;
        // Ephemeral secrets are no longer needed.
        self.e = None;
        trace!(initiator = self.initiator, "XX handshake split");
        Ok(Some(if self.initiator { (c1, c2) } else { (c2, c1) }))
    }

    /// Writes the next handshake message into `out`.
    ///
    /// Returns the number of bytes written and, after the last message,
    /// the `(encrypt, decrypt)` cipher states.
    ///
    /// # Errors
    /// - `InvalidState` when it is not our turn or the handshake is over
    /// - `MessageTooLarge` if `out` cannot hold the message
    /// - Crypto errors from DH or AEAD
    pub fn write_message(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
    ) -> Result<(usize, Option<TransportCiphers>)> {
        self.ensure_turn(true)?;
        let result = self.write_inner(payload, out);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn write_inner(
        &mut self,
        payload: &[u8],
        out: &mut [u8],
    ) -> Result<(usize, Option<TransportCiphers>)> {
        let mut message = Vec::with_capacity(self.expected_len() + payload.len());

        for &token in XX_PATTERN[self.step] {
            match token {
                Token::E => {
                    let e = EphemeralKeyPair::generate();
                    let public = e.public_key();
                    message.extend_from_slice(public.as_bytes());
                    self.symmetric.mix_hash(public.as_bytes());
                    self.e = Some(e);
                }
                Token::S => {
                    let public = self.s.public_key();
                    let sealed = self.symmetric.encrypt_and_hash(public.as_bytes())?;
                    message.extend_from_slice(&sealed);
                }
                dh => self.mix_dh(dh)?,
            }
        }
        let sealed = self.symmetric.encrypt_and_hash(payload)?;
        message.extend_from_slice(&sealed);

        if message.len() > out.len() {
            return Err(CoreError::too_large(out.len(), message.len()));
        }
        out[..message.len()].copy_from_slice(&message);

        trace!(step = self.step, len = message.len(), "wrote handshake message");
        let ciphers = self.finish_step()?;
        Ok((message.len(), ciphers))
    }

    /// Processes the next handshake message from the peer.
    ///
    /// Returns the decrypted payload and, after the last message, the
    /// `(encrypt, decrypt)` cipher states.
    ///
    /// # Errors
    /// - `InvalidState` when it is our turn or the handshake is over
    /// - `MessageTooShort` if the message cannot hold the fixed fields
    /// - `Decryption` / `KeyExchange` on tampered or hostile input
    pub fn read_message(&mut self, message: &[u8]) -> Result<(Vec<u8>, Option<TransportCiphers>)> {
        self.ensure_turn(false)?;
        let result = self.read_inner(message);
        if result.is_err() {
            self.poisoned = true;
        }
        result
    }

    fn read_inner(&mut self, message: &[u8]) -> Result<(Vec<u8>, Option<TransportCiphers>)> {
        let expected = self.expected_len();
        if message.len() < expected {
            return Err(CoreError::too_short(expected, message.len()));
        }

        let mut rest = message;
        for &token in XX_PATTERN[self.step] {
            match token {
                Token::E => {
                    let re = PublicKey::from_slice(take(&mut rest, X25519_PUBLIC_KEY_SIZE)?)?;
                    self.symmetric.mix_hash(re.as_bytes());
                    self.re = Some(re);
                }
                Token::S => {
                    let len = if self.symmetric.has_key() {
                        X25519_PUBLIC_KEY_SIZE + ENCRYPTION_OVERHEAD
                    } else {
                        X25519_PUBLIC_KEY_SIZE
                    };
                    let raw = take(&mut rest, len)?;
                    let rs = self.symmetric.decrypt_and_hash(raw)?;
                    self.rs = Some(PublicKey::from_slice(&rs)?);
                }
                dh => self.mix_dh(dh)?,
            }
        }
        let payload = self.symmetric.decrypt_and_hash(rest)?;

        trace!(step = self.step, len = message.len(), "read handshake message");
        let ciphers = self.finish_step()?;
        Ok((payload, ciphers))
    }
}

impl fmt::Debug for HandshakeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandshakeState")
            .field("initiator", &self.initiator)
            .field("step", &self.step)
            .field("local", &self.s.public_key())
            .field("remote", &self.rs)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    struct Finished {
        initiator: TransportCiphers,
        responder: TransportCiphers,
        alice: HandshakeState,
        bob: HandshakeState,
    }

    fn run(prologue_a: &[u8], prologue_b: &[u8]) -> Result<Finished> {
        let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, prologue_a);
        let mut bob = HandshakeState::new(StaticKeyPair::generate(), false, prologue_b);
        let mut buf = [0u8; MAX_HANDSHAKE_MESSAGE_SIZE];

        let (n, _) = alice.write_message(&[], &mut buf)?;
        assert_eq!(n, 32);
        bob.read_message(&buf[..n])?;

        let (n, _) = bob.write_message(&[], &mut buf)?;
        assert_eq!(n, 96);
        alice.read_message(&buf[..n])?;

        let (n, a) = alice.write_message(&[], &mut buf)?;
        assert_eq!(n, 64);
        let (_, b) = bob.read_message(&buf[..n])?;

        Ok(Finished {
            initiator: a.unwrap(),
            responder: b.unwrap(),
            alice,
            bob,
        })
    }

    #[test]
    fn test_full_xx_handshake() {
        let Finished {
            initiator: (mut a_enc, mut a_dec),
            responder: (mut b_enc, mut b_dec),
            alice,
            bob,
        } = run(b"peerlink", b"peerlink").unwrap();

        assert!(alice.is_finished() && bob.is_finished());
        assert_eq!(alice.handshake_hash(), bob.handshake_hash());
        assert_eq!(alice.remote_static(), Some(bob.s.public_key()));
        assert_eq!(bob.remote_static(), Some(alice.s.public_key()));

        let (c, ct) = a_enc.seal(b"to bob").unwrap();
        assert_eq!(b_dec.open(c, &ct).unwrap(), b"to bob");
        let (c, ct) = b_enc.seal(b"to alice").unwrap();
        assert_eq!(a_dec.open(c, &ct).unwrap(), b"to alice");
    }

    #[test]
    fn test_expected_lengths() {
        let alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
        assert_eq!(alice.expected_len(), 32);
        assert_eq!(MAX_HANDSHAKE_MESSAGE_SIZE, 96);
    }

    #[test]
    fn test_prologue_mismatch_fails() {
        let result = run(b"one", b"two");
        assert!(matches!(result, Err(CoreError::Decryption)));
    }

    #[test]
    fn test_tampered_message_two_rejected() {
        let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
        let mut bob = HandshakeState::new(StaticKeyPair::generate(), false, b"");
        let mut buf = [0u8; 96];

        let (n, _) = alice.write_message(&[], &mut buf).unwrap();
        bob.read_message(&buf[..n]).unwrap();
        let (n, _) = bob.write_message(&[], &mut buf).unwrap();
        buf[40] ^= 0x01;
        assert!(matches!(alice.read_message(&buf[..n]), Err(CoreError::Decryption)));

        // Poisoned afterwards.
        assert!(alice.write_message(&[], &mut buf).is_err());
    }

    #[test]
    fn test_wrong_turn_and_short_message() {
        let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
        let mut bob = HandshakeState::new(StaticKeyPair::generate(), false, b"");
        let mut buf = [0u8; 96];

        assert!(matches!(
            alice.read_message(&[0u8; 32]),
            Err(CoreError::InvalidState { .. })
        ));
        assert!(matches!(
            bob.read_message(&[0u8; 10]),
            Err(CoreError::MessageTooShort { expected: 32, actual: 10 })
        ));
        assert!(bob.write_message(&[], &mut buf).is_err());
    }

    #[test]
    fn test_output_buffer_too_small() {
        let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
        let mut buf = [0u8; 16];
        assert!(matches!(
            alice.write_message(&[], &mut buf),
            Err(CoreError::MessageTooLarge { .. })
        ));
    }

    #[test]
    fn test_payload_is_carried() {
        let mut alice = HandshakeState::new(StaticKeyPair::generate(), true, b"");
        let mut bob = HandshakeState::new(StaticKeyPair::generate(), false, b"");
        let mut buf = [0u8; 256];

        let (n, _) = alice.write_message(b"hello", &mut buf).unwrap();
        let (payload, _) = bob.read_message(&buf[..n]).unwrap();
        assert_eq!(payload, b"hello");

        let (n, _) = bob.write_message(b"secret", &mut buf).unwrap();
        assert_eq!(n, 96 + 6);
        let (payload, _) = alice.read_message(&buf[..n]).unwrap();
        assert_eq!(payload, b"secret");
    }
}
