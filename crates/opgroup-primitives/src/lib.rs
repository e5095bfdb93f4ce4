/// Token-group SDK - Hashing, base58 and binary codec primitives.
///
/// This crate provides the leaf building blocks shared by the other crates:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - Base58 and Base58Check encoding for addresses
/// - Compact-size integers with a cursor reader and an append-only writer

pub mod hash;
pub mod base58;
pub mod util;

mod error;
pub use error::PrimitivesError;
