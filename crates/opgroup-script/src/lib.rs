/// Token-group SDK - Locking scripts, chunk decoding and destinations.
///
/// Provides the `Script` byte-vector type, the opcode subset the token-group
/// protocol touches, push-data chunk decoding, and the pay-to-key-hash /
/// pay-to-script-hash destinations with their Base58Check addresses.

pub mod opcodes;
pub mod chunk;
pub mod script;
pub mod address;

mod error;
pub use error::ScriptError;
pub use script::Script;
pub use address::{Address, Destination, Network};
pub use chunk::ScriptChunk;
