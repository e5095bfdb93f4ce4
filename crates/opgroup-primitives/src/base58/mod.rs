//! Base58 and Base58Check encoding.
//!
//! Addresses in configuration files and user-facing output are
//! Base58Check strings: `version || payload || sha256d(version || payload)[..4]`.

use crate::hash::sha256d;
use crate::PrimitivesError;

/// Encode bytes with the Bitcoin Base58 alphabet.
pub fn encode(data: &[u8]) -> String {
    bs58::encode(data).with_alphabet(bs58::Alphabet::BITCOIN).into_string()
}

/// Decode a Base58 string.
///
/// # Arguments
/// * `s` - The Base58 string.
///
/// # Returns
/// The decoded bytes, or `InvalidBase58` for characters outside the alphabet.
pub fn decode(s: &str) -> Result<Vec<u8>, PrimitivesError> {
    bs58::decode(s)
        .with_alphabet(bs58::Alphabet::BITCOIN)
        .into_vec()
        .map_err(|e| PrimitivesError::InvalidBase58(e.to_string()))
}

/// Encode `version || payload` with a 4-byte checksum appended.
pub fn check_encode(version: u8, payload: &[u8]) -> String {
    let mut data = Vec::with_capacity(1 + payload.len() + 4);
    data.push(version);
    data.extend_from_slice(payload);
    let checksum = sha256d(&data);
    data.extend_from_slice(&checksum[..4]);
    encode(&data)
}

/// Decode a Base58Check string into its version byte and payload.
///
/// # Arguments
/// * `s` - The Base58Check string.
///
/// # Returns
/// `(version, payload)`, or an error when the string is too short or the
/// checksum does not match.
pub fn check_decode(s: &str) -> Result<(u8, Vec<u8>), PrimitivesError> {
    let data = decode(s)?;
    if data.len() < 5 {
        return Err(PrimitivesError::InvalidBase58(format!(
            "decoded length {} is shorter than version plus checksum",
            data.len()
        )));
    }
    let (body, checksum) = data.split_at(data.len() - 4);
    if sha256d(body)[..4] != *checksum {
        return Err(PrimitivesError::ChecksumMismatch);
    }
    Ok((body[0], body[1..].to_vec()))
}
