/// Error types for script operations.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// A push opcode promised more bytes than the script contains.
    #[error("push data truncated at offset {0}")]
    DataTooSmall(usize),

    /// Push payload larger than any push opcode can carry.
    #[error("push data too big: {0} bytes")]
    DataTooBig(usize),

    /// `push_opcode` was handed a push-data opcode.
    #[error("use push_data for push opcodes: 0x{0:02x}")]
    InvalidOpcodeType(u8),

    /// Invalid hex string.
    #[error("invalid hex: {0}")]
    InvalidHex(String),

    /// Address string could not be decoded.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Address version byte does not belong to the expected network.
    #[error("address version {version} is not valid for {network:?}")]
    WrongNetwork { version: u8, network: crate::Network },

    /// An underlying primitives error.
    #[error("primitives error: {0}")]
    Primitives(#[from] opgroup_primitives::PrimitivesError),
}
