//! Group identifier derivation.
//!
//! A new group's id is the double SHA-256 of the first spent outpoint, the
//! description payload (when present) and a 48-bit nonce. The nonce is
//! searched until byte 31 of the hash equals the requested id flags, and the
//! creation authority carries it so validators can recompute the id.

use opgroup_primitives::hash::Hash256;
use opgroup_primitives::util::ByteWriter;
use opgroup_script::Script;
use opgroup_transaction::OutPoint;
use rand::RngCore;
use tracing::debug;

use crate::flags::{AuthorityFlags, IdFlags};
use crate::group_id::{GroupId, ID_FLAGS_INDEX};
use crate::TokenError;

/// Hash committing a creation to its outpoint, description and nonce.
pub fn group_id_hash(outpoint: &OutPoint, description: &Script, nonce: u64) -> Hash256 {
    let mut w = ByteWriter::with_capacity(OutPoint::SIZE + description.len() + 16);
    outpoint.write_to(&mut w);
    if !description.is_empty() {
        w.write_var_bytes(description.as_bytes());
    }
    w.write_u64_le(nonce);
    Hash256::digest(w.as_bytes())
}

/// Recompute the id a creation authority commits to.
pub fn expected_group_id(outpoint: &OutPoint, description: &Script, authority: AuthorityFlags) -> GroupId {
    GroupId::from_hash(&group_id_hash(outpoint, description, authority.nonce()))
}

/// Search for a group id carrying `flags` from a random starting nonce.
///
/// # Arguments
/// * `outpoint` - First input of the creating transaction.
/// * `description` - The description OP_RETURN, or an empty script.
/// * `flags` - Id flags the resulting id must carry in byte 31.
/// * `max_iterations` - Attempts before giving up.
///
/// # Returns
/// The id and the nonce to place in the creation authority, or
/// `DerivationExhausted`.
pub fn derive_group_id(
    outpoint: &OutPoint,
    description: &Script,
    flags: IdFlags,
    max_iterations: u64,
) -> Result<(GroupId, u64), TokenError> {
    let mut rng = rand::thread_rng();
    let start = rng.next_u64();
    let step = rng.next_u64() | 1;
    derive_group_id_from(outpoint, description, flags, start, step, max_iterations)
}

/// Deterministic form of [`derive_group_id`]: nonces are
/// `start + k * step` masked to 48 bits, zero skipped.
pub fn derive_group_id_from(
    outpoint: &OutPoint,
    description: &Script,
    flags: IdFlags,
    start: u64,
    step: u64,
    max_iterations: u64,
) -> Result<(GroupId, u64), TokenError> {
    let mask = !AuthorityFlags::ALL_BITS.0;
    let mut nonce = start;
    for _ in 0..max_iterations {
        nonce = nonce.wrapping_add(step);
        let candidate = nonce & mask;
        if candidate == 0 {
            continue;
        }
        let hash = group_id_hash(outpoint, description, candidate);
        if hash.as_bytes()[ID_FLAGS_INDEX] == flags.0 {
            debug!(%outpoint, nonce = candidate, "derived group id");
            return Ok((GroupId::from_hash(&hash), candidate));
        }
    }
    Err(TokenError::DerivationExhausted(max_iterations))
}
