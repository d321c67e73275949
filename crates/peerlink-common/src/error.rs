// ============================================
// File: crates/peerlink-common/src/error.rs
// ============================================
//! # Common Error Types
//!
//! ## Creation Reason
//! Errors raised by the parsing helpers in this crate. Higher crates
//! wrap them with `#[from]`.
//!
//! ## ⚠️ Important Note for Next Developer
//! - Never put key material into an error message
//!
//! ## Last Modified
//! v0.1.0 - Initial error definitions

use thiserror::Error;

/// Common result type for operations that may fail.
pub type Result<T> = std::result::Result<T, CommonError>;

/// Error types shared across peerlink crates.
///
/// # Example
/// ```
/// use peerlink_common::{CommonError, SocketId};
///
/// let err = SocketId::new("localhost").unwrap_err();
/// assert!(matches!(err, CommonError::InvalidSocket { .. }));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommonError {
    /// Not a usable `host:port` socket identity.
    #[error("Invalid socket '{value}': {reason}")]
    InvalidSocket {
        /// The rejected input
        value: String,
        /// What is wrong with it
        reason: String,
    },

    /// Byte length doesn't match the fixed size of the target type.
    #[error("Invalid length: expected {expected}, got {actual}")]
    InvalidLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length received
        actual: usize,
    },

    /// Text encoding (base64, hex) could not be decoded.
    #[error("Decoding error ({context}): {details}")]
    Decoding {
        /// What was being decoded
        context: String,
        /// Decoder message
        details: String,
    },
}

impl CommonError {
    /// Creates an `InvalidSocket` error.
    pub fn invalid_socket(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSocket {
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Creates an `InvalidLength` error.
    #[must_use]
    pub const fn invalid_length(expected: usize, actual: usize) -> Self {
        Self::InvalidLength { expected, actual }
    }

    /// Creates a `Decoding` error.
    pub fn decoding(context: impl Into<String>, details: impl Into<String>) -> Self {
        Self::Decoding {
            context: context.into(),
            details: details.into(),
        }
    }
}

impl From<base64::DecodeError> for CommonError {
    fn from(err: base64::DecodeError) -> Self {
        Self::decoding("base64", err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = CommonError::invalid_socket("nope", "expected host:port");
        assert_eq!(err.to_string(), "Invalid socket 'nope': expected host:port");

        let err = CommonError::invalid_length(32, 7);
        assert_eq!(err.to_string(), "Invalid length: expected 32, got 7");
    }

    #[test]
    fn test_base64_error_conversion() {
        use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

        let err: CommonError = BASE64.decode("***").unwrap_err().into();
        assert!(matches!(err, CommonError::Decoding { ref context, .. } if context == "base64"));
    }
}
