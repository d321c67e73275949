// ============================================
// File: crates/peerlink-core/src/crypto/kdf.rs
// ============================================
//! # Key Derivation Functions
//!
//! ## Creation Reason
//! Noise needs `HASH` (SHA-256) and a two-output `HKDF` keyed by the
//! chaining key. Both are thin wrappers over `sha2` and `hkdf`.
//!
//! ## Main Functionality
//! - `hash`: SHA-256 over a list of slices
//! - `hkdf2`: `(output1, output2) = HKDF(chaining_key, ikm)`
//!
//! ## Equivalence
//! Noise defines `temp = HMAC(ck, ikm)`, `o1 = HMAC(temp, 0x01)`,
//! `o2 = HMAC(temp, o1 || 0x02)`. That is RFC 5869 extract with
//! `salt = ck` followed by expand with empty `info`, so a 64-byte
//! `Hkdf::expand` yields `o1 || o2`.
//!
//! ## Last Modified
//! v0.1.0 - Initial KDF implementation

use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

use super::HASH_SIZE;
use crate::error::{CoreError, Result};

/// Pair of derived 32-byte outputs, zeroed on drop.
pub type KeyPairOutput = (Zeroizing<[u8; HASH_SIZE]>, Zeroizing<[u8; HASH_SIZE]>);

/// SHA-256 over the concatenation of `parts`.
#[must_use]
pub fn hash(parts: &[&[u8]]) -> [u8; HASH_SIZE] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    hasher.finalize().into()
}

/// Noise `HKDF` with two outputs.
///
/// # Errors
/// Returns `KeyDerivation` if expansion fails (cannot happen for 64
/// bytes of SHA-256 output, but the API is fallible).
pub fn hkdf2(chaining_key: &[u8; HASH_SIZE], ikm: &[u8]) -> Result<KeyPairOutput> {
    let hk = Hkdf::<Sha256>::new(Some(chaining_key), ikm);

    let mut okm = Zeroizing::new([0u8; HASH_SIZE * 2]);
    hk.expand(&[], &mut okm[..])
        .map_err(|_| CoreError::KeyDerivation {
            reason: "HKDF expansion failed for 64 bytes".into(),
        })?;

    let mut first = Zeroizing::new([0u8; HASH_SIZE]);
    let mut second = Zeroizing::new([0u8; HASH_SIZE]);
    first.copy_from_slice(&okm[..HASH_SIZE]);
    second.copy_from_slice(&okm[HASH_SIZE..]);
    Ok((first, second))
}

// ============================================
// Tests
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use hkdf::hmac::{Hmac, Mac};

    fn hmac(key: &[u8], data: &[&[u8]]) -> [u8; 32] {
        let mut mac = <Hmac<Sha256> as Mac>::new_from_slice(key).unwrap();
        for d in data {
            mac.update(d);
        }
        mac.finalize().into_bytes().into()
    }

    #[test]
    fn test_hkdf2_matches_noise_definition() {
        let ck = [0x11u8; 32];
        let ikm = [0x22u8; 32];

        let temp = hmac(&ck, &[&ikm]);
        let o1 = hmac(&temp, &[&[0x01]]);
        let o2 = hmac(&temp, &[&o1, &[0x02]]);

        let (a, b) = hkdf2(&ck, &ikm).unwrap();
        assert_eq!(*a, o1);
        assert_eq!(*b, o2);
    }

    #[test]
    fn test_hkdf2_empty_ikm() {
        let ck = [0x33u8; 32];
        let (a, b) = hkdf2(&ck, &[]).unwrap();
        assert_ne!(*a, *b);
    }

    #[test]
    fn test_hash_concatenates() {
        assert_eq!(hash(&[b"ab", b"cd"]), hash(&[b"abcd"]));
        assert_ne!(hash(&[b"ab"]), hash(&[b"ba"]));
    }
}
