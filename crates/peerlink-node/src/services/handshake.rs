// ============================================
// File: crates/peerlink-node/src/services/handshake.rs
// ============================================
//! # Handshake Engine
//!
//! ## Creation Reason
//! Drives the pure XX state machine from `peerlink-core` over a live
//! stream and installs the resulting cipher states into a `Session`.
//!
//! ## Handshake Flow
//! ```text
//!   Initiator (dialer)                    Responder (listener)
//!   ──────────────────                    ────────────────────
//!   send  msg1  -> e                 ──►  recv  msg1
//!   recv  msg2                       ◄──  send  msg2  <- e, ee, s, es
//!   send  msg3  -> s, se             ──►  recv  msg3
//!   split → (enc=c1, dec=c2)              split → (enc=c2, dec=c1)
//!   Session::set_ciphers                  Session::set_ciphers
//! ```
//!
//! ## Error Handling
//! - Wrong-length or oversized frames: malformed, connection dropped
//! - Bad MAC or low-order key: security error, connection dropped
//! - EOF or I/O error mid-handshake: transport error
//! - No retry; the caller closes the connection on any error
//!
//! ## ⚠️ Important Note for Next Developer
//! - One scratch buffer sized for the largest message serves every send
//! - The caller bounds the whole exchange with a timeout
//! - The session stays unusable unless all three messages succeed
//!
//! ## Last Modified
//! v0.1.0 - Initial handshake engine

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, trace};

use peerlink_core::crypto::handshake::{TransportCiphers, MAX_HANDSHAKE_MESSAGE_SIZE};
use peerlink_core::crypto::{CipherState, HandshakeState, PublicKey, StaticKeyPair};
use peerlink_core::error::CoreError;
use peerlink_transport::{read_frame, write_frame, ReadOutcome, TransportError};

use crate::error::Result;
use crate::services::Session;

/// Prologue mixed into the handshake hash.
pub const PROLOGUE: &[u8] = b"";

/// Drives one handshake over a reader/writer pair.
pub struct Handshake<'a, R: ?Sized, W: ?Sized> {
    reader: &'a mut R,
    writer: &'a mut W,
    session: &'a Session,
    identity: StaticKeyPair,
    state: Option<HandshakeState>,
    pending: Option<TransportCiphers>,
    buf: [u8; MAX_HANDSHAKE_MESSAGE_SIZE],
}

impl<'a, R, W> Handshake<'a, R, W>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    /// Borrows the connection halves and the session the keys end up in.
    pub fn new(
        reader: &'a mut R,
        writer: &'a mut W,
        session: &'a Session,
        identity: StaticKeyPair,
    ) -> Self {
        Self {
            reader,
            writer,
            session,
            identity,
            state: None,
            pending: None,
            buf: [0u8; MAX_HANDSHAKE_MESSAGE_SIZE],
        }
    }

    /// Runs the handshake in the given role.
    ///
    /// # Errors
    /// Any transport, protocol or security failure; the connection must
    /// then be closed.
    pub async fn start(&mut self, initiator: bool) -> Result<()> {
        if initiator {
            self.initiate().await
        } else {
            self.answer().await
        }
    }

    /// Initiator side: send, receive, send.
    ///
    /// # Errors
    /// See [`Self::start`].
    pub async fn initiate(&mut self) -> Result<()> {
        self.begin(true)?;
        self.send().await?;
        self.recv().await?;
        self.send().await?;
        self.finalize()
    }

    /// Responder side: receive, send, receive.
    ///
    /// # Errors
    /// See [`Self::start`].
    pub async fn answer(&mut self) -> Result<()> {
        self.begin(false)?;
        self.recv().await?;
        self.send().await?;
        self.recv().await?;
        self.finalize()
    }

    /// True once all three messages have been processed.
    #[must_use]
    pub fn finish(&self) -> bool {
        self.state.as_ref().is_some_and(HandshakeState::is_finished)
    }

    /// Rejects a finished handshake that did not yield both cipher states.
    ///
    /// # Errors
    /// `MissingCipherState` (security) naming the absent side.
    pub fn valid(&self, enc: Option<&CipherState>, dec: Option<&CipherState>) -> Result<()> {
        if !self.finish() {
            return Ok(());
        }
        let which = match (enc.is_some(), dec.is_some()) {
            (true, true) => return Ok(()),
            (false, true) => "encrypt",
            (true, false) => "decrypt",
            (false, false) => "both",
        };
        Err(CoreError::MissingCipherState { which }.into())
    }

    /// Remote static key, once message 2 (initiator) or 3 (responder)
    /// has been read.
    #[must_use]
    pub fn remote_static(&self) -> Option<PublicKey> {
        self.state.as_ref().and_then(HandshakeState::remote_static)
    }

    fn begin(&mut self, initiator: bool) -> Result<()> {
        if self.state.is_some() {
            return Err(CoreError::invalid_state("start", "fresh handshake").into());
        }
        debug!(initiator, "handshake started");
        self.state = Some(HandshakeState::new(self.identity.clone(), initiator, PROLOGUE));
        Ok(())
    }

    fn state_mut(&mut self) -> Result<&mut HandshakeState> {
        self.state
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("handshake step", "started").into())
    }

    async fn send(&mut self) -> Result<()> {
        let state = self
            .state
            .as_mut()
            .ok_or_else(|| CoreError::invalid_state("send", "started"))?;
        let step = state.step();
        let (len, ciphers) = state.write_message(&[], &mut self.buf)?;

        write_frame(&mut *self.writer, &self.buf[..len], MAX_HANDSHAKE_MESSAGE_SIZE).await?;
        trace!(message = step + 1, len, "handshake message sent");

        if ciphers.is_some() {
            self.pending = ciphers;
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<()> {
        let expected = self.state_mut()?.expected_len();

        let body = match read_frame(&mut *self.reader, MAX_HANDSHAKE_MESSAGE_SIZE).await? {
            ReadOutcome::Frame(body) => body,
            ReadOutcome::Oversized { len } => {
                return Err(CoreError::too_large(MAX_HANDSHAKE_MESSAGE_SIZE, len).into());
            }
            ReadOutcome::Closed => return Err(TransportError::closed("handshake").into()),
        };

        let state = self.state_mut()?;
        let step = state.step();
        if body.len() != expected {
            return Err(CoreError::malformed(format!(
                "handshake message {} is {} bytes, expected {expected}",
                step + 1,
                body.len()
            ))
            .into());
        }

        let (_payload, ciphers) = state.read_message(&body)?;
        trace!(message = step + 1, len = body.len(), "handshake message received");

        if ciphers.is_some() {
            self.pending = ciphers;
        }
        Ok(())
    }

    fn finalize(&mut self) -> Result<()> {
        if !self.finish() {
            return Err(CoreError::invalid_state("finalize", "finished handshake").into());
        }

        let (enc, dec) = self.pending.take().map_or((None, None), |(e, d)| (Some(e), Some(d)));
        self.valid(enc.as_ref(), dec.as_ref())?;

        if let (Some(enc), Some(dec)) = (enc, dec) {
            self.session.set_ciphers(enc, dec)?;
        }
        if let Some(remote) = self.remote_static() {
            self.session.set_remote_static(remote)?;
        }

        debug!(remote = ?self.remote_static(), "handshake complete");
        Ok(())
    }
}

// ============================================
// Tests
// ============================================
