//! Hash function primitives.
//!
//! SHA-256, double SHA-256, RIPEMD-160 and Hash160 as used by transaction
//! ids, addresses and token-group identifier derivation, plus `Hash256`, a
//! 32-byte digest that displays in reversed-hex order like transaction ids.

use std::fmt;
use std::str::FromStr;

use ripemd::Ripemd160;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::PrimitivesError;

/// Compute SHA-256 hash of the input data.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Compute double SHA-256 (SHA-256d) hash of the input data.
///
/// Used for transaction ids and for token-group identifier derivation.
///
/// # Arguments
/// * `data` - Byte slice to hash.
///
/// # Returns
/// A 32-byte double-SHA-256 digest.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Compute RIPEMD-160 hash of the input data.
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    Ripemd160::digest(data).into()
}

/// Compute Hash160: RIPEMD-160(SHA-256(data)).
///
/// Key and script hashes inside pay-to-key-hash and pay-to-script-hash
/// templates are Hash160 digests.
pub fn hash160(data: &[u8]) -> [u8; 20] {
    ripemd160(&sha256(data))
}

/// A 32-byte digest stored in internal byte order.
///
/// `Display` and `FromStr` use the reversed hex form that block explorers
/// show for transaction ids.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    /// The all-zero hash, used as the previous txid of coinbase inputs.
    pub const ZERO: Hash256 = Hash256([0u8; 32]);

    /// Wrap a 32-byte array in internal byte order.
    pub fn new(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }

    /// Build a hash from a slice that must be exactly 32 bytes.
    ///
    /// # Arguments
    /// * `bytes` - Internal-order bytes.
    ///
    /// # Returns
    /// The hash, or `InvalidHash` for a wrong length.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let arr: [u8; 32] = bytes.try_into().map_err(|_| {
            PrimitivesError::InvalidHash(format!("expected 32 bytes, got {}", bytes.len()))
        })?;
        Ok(Hash256(arr))
    }

    /// Hash `data` with SHA-256d.
    pub fn digest(data: &[u8]) -> Self {
        Hash256(sha256d(data))
    }

    /// Borrow the internal-order bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// True when every byte is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut reversed = self.0;
        reversed.reverse();
        f.write_str(&hex::encode(reversed))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self)
    }
}

impl FromStr for Hash256 {
    type Err = PrimitivesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = hex::decode(s)?;
        if bytes.len() != 32 {
            return Err(PrimitivesError::InvalidHash(format!(
                "expected 64 hex characters, got {}",
                s.len()
            )));
        }
        bytes.reverse();
        Hash256::from_slice(&bytes)
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SHA-256 of the empty string.
    #[test]
    fn test_sha256_empty() {
        assert_eq!(
            hex::encode(sha256(b"")),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    /// SHA-256d of "hello" matches the well-known vector.
    #[test]
    fn test_sha256d_hello() {
        assert_eq!(
            hex::encode(sha256d(b"hello")),
            "9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"
        );
    }

    /// Hash160 of the empty string.
    #[test]
    fn test_hash160_empty() {
        assert_eq!(
            hex::encode(hash160(b"")),
            "b472a266d0bd89c13706a4132ccfb16f7c3b9fcb"
        );
    }

    /// Display reverses the byte order and FromStr undoes it.
    #[test]
    fn test_hash256_display_is_reversed() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0x01;
        let h = Hash256::new(bytes);
        let s = h.to_string();
        assert!(s.ends_with("01"));
        assert!(s.starts_with("00"));
        let parsed: Hash256 = s.parse().expect("parse");
        assert_eq!(parsed, h);
    }

    /// Wrong-length input is rejected.
    #[test]
    fn test_hash256_from_slice_wrong_len() {
        assert!(Hash256::from_slice(&[0u8; 31]).is_err());
        assert!("abcd".parse::<Hash256>().is_err());
    }
}
