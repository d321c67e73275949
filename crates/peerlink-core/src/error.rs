// ============================================
// File: crates/peerlink-core/src/error.rs
// ============================================
//! # Core Error Types
//!
//! ## Creation Reason
//! Errors raised by the handshake state machine, the cipher states and
//! the frame codec.
//!
//! ## Error Categories
//! 1. **Crypto Errors**: key exchange, AEAD, key derivation, nonce exhaustion
//! 2. **Protocol Errors**: malformed or out-of-order handshake messages,
//!    replayed transport counters
//! 3. **State Errors**: operations issued before the handshake finished
//!
//! ## ⚠️ Important Note for Next Developer
//! - NEVER include key material in error messages
//! - `is_suspicious` drives whether a peer is dropped with a warning
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

use peerlink_common::error::CommonError;

// ============================================
// Result Type Alias
// ============================================

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;

// ============================================
// CoreError
// ============================================

/// Core error types for protocol and cryptographic operations.
#[derive(Error, Debug)]
pub enum CoreError {
    // ========================================
    // Cryptographic Errors
    // ========================================

    /// Key material could not be parsed or generated.
    #[error("Invalid key: {context}")]
    InvalidKey {
        /// Which key was being handled
        context: String,
    },

    /// Key exchange produced an unusable result.
    #[error("Key exchange failed: {reason}")]
    KeyExchange {
        /// Why key exchange failed
        reason: String,
    },

    /// Encryption operation failed.
    #[error("Encryption failed: {context}")]
    Encryption {
        /// What was being encrypted
        context: String,
    },

    /// Decryption operation failed (authentication failure).
    #[error("Decryption failed: authentication error")]
    Decryption,

    /// Key derivation failed.
    #[error("Key derivation failed: {reason}")]
    KeyDerivation {
        /// Why derivation failed
        reason: String,
    },

    /// The 64-bit counter of a cipher state is used up.
    #[error("Nonce space exhausted for cipher state")]
    NonceExhausted,

    // ========================================
    // Protocol Errors
    // ========================================

    /// Message is malformed or arrived out of order.
    #[error("Malformed message: {reason}")]
    MalformedMessage {
        /// What's wrong with the message
        reason: String,
    },

    /// Message is too short to be valid.
    #[error("Message too short: expected at least {expected} bytes, got {actual}")]
    MessageTooShort {
        /// Minimum expected length
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Message exceeds maximum allowed size.
    #[error("Message too large: max {max} bytes, got {actual}")]
    MessageTooLarge {
        /// Maximum allowed size
        max: usize,
        /// Actual size received
        actual: usize,
    },

    /// Replay detected (counter went backwards).
    #[error("Replay detected: counter {received} below expected {expected}")]
    ReplayDetected {
        /// Counter value received
        received: u64,
        /// Minimum expected counter
        expected: u64,
    },

    // ========================================
    // State Errors
    // ========================================

    /// Operation not valid in current state.
    #[error("Invalid state for operation: {operation} requires {required_state}")]
    InvalidState {
        /// What operation was attempted
        operation: String,
        /// What state was required
        required_state: String,
    },

    /// A finished handshake is missing one of its cipher states.
    #[error("Missing cipher state: {which}")]
    MissingCipherState {
        /// `encrypt`, `decrypt` or `both`
        which: &'static str,
    },

    // ========================================
    // Wrapped Errors
    // ========================================

    /// Error from common crate.
    #[error(transparent)]
    Common(#[from] CommonError),
}

impl CoreError {
    // ========================================
    // Convenience Constructors
    // ========================================

    /// Creates an `InvalidKey` error.
    pub fn invalid_key(context: impl Into<String>) -> Self {
        Self::InvalidKey {
            context: context.into(),
        }
    }

    /// Creates a `KeyExchange` error.
    pub fn key_exchange(reason: impl Into<String>) -> Self {
        Self::KeyExchange {
            reason: reason.into(),
        }
    }

    /// Creates an `Encryption` error.
    pub fn encryption(context: impl Into<String>) -> Self {
        Self::Encryption {
            context: context.into(),
        }
    }

    /// Creates a `MalformedMessage` error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedMessage {
            reason: reason.into(),
        }
    }

    /// Creates a `MessageTooShort` error.
    #[must_use]
    pub const fn too_short(expected: usize, actual: usize) -> Self {
        Self::MessageTooShort { expected, actual }
    }

    /// Creates a `MessageTooLarge` error.
    #[must_use]
    pub const fn too_large(max: usize, actual: usize) -> Self {
        Self::MessageTooLarge { max, actual }
    }

    /// Creates a `ReplayDetected` error.
    #[must_use]
    pub const fn replay(received: u64, expected: u64) -> Self {
        Self::ReplayDetected { received, expected }
    }

    /// Creates an `InvalidState` error.
    pub fn invalid_state(operation: impl Into<String>, required_state: impl Into<String>) -> Self {
        Self::InvalidState {
            operation: operation.into(),
            required_state: required_state.into(),
        }
    }

    // ========================================
    // Error Classification
    // ========================================

    /// Returns `true` if this is a cryptographic error.
    #[must_use]
    pub const fn is_crypto_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidKey { .. }
                | Self::KeyExchange { .. }
                | Self::Encryption { .. }
                | Self::Decryption
                | Self::KeyDerivation { .. }
                | Self::NonceExhausted
        )
    }

    /// Returns `true` if this is a protocol error.
    #[must_use]
    pub const fn is_protocol_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedMessage { .. }
                | Self::MessageTooShort { .. }
                | Self::MessageTooLarge { .. }
                | Self::ReplayDetected { .. }
        )
    }

    /// Returns `true` if this error might indicate an attack or a
    /// desynchronised peer. The connection must be dropped, never
    /// downgraded.
    #[must_use]
    pub const fn is_suspicious(&self) -> bool {
        matches!(
            self,
            Self::Decryption
                | Self::KeyExchange { .. }
                | Self::ReplayDetected { .. }
                | Self::MissingCipherState { .. }
        )
    }
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CoreError::too_short(96, 32);
        assert!(err.to_string().contains("96"));
        assert!(err.to_string().contains("32"));

        let err = CoreError::MissingCipherState { which: "decrypt" };
        assert!(err.to_string().contains("decrypt"));
    }

    #[test]
    fn test_error_classification() {
        assert!(CoreError::Decryption.is_crypto_error());
        assert!(CoreError::Decryption.is_suspicious());

        let replay = CoreError::replay(3, 9);
        assert!(replay.is_protocol_error());
        assert!(replay.is_suspicious());

        let malformed = CoreError::malformed("wrong length");
        assert!(malformed.is_protocol_error());
        assert!(!malformed.is_suspicious());

        assert!(CoreError::MissingCipherState { which: "both" }.is_suspicious());
    }

    #[test]
    fn test_common_error_conversion() {
        let common = CommonError::invalid_length(32, 31);
        let core: CoreError = common.into();
        assert!(matches!(core, CoreError::Common(_)));
    }
}
