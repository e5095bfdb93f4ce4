/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// An error occurred during binary/hex serialization or deserialization.
    #[error("serialization error: {0}")]
    SerializationError(String),
    /// Bytes were left over after the lock time.
    #[error("{0} trailing bytes after transaction")]
    TrailingBytes(usize),
    /// An underlying script error (forwarded from `opgroup-script`).
    #[error("script error: {0}")]
    Script(#[from] opgroup_script::ScriptError),
    /// An underlying primitives error (forwarded from `opgroup-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] opgroup_primitives::PrimitivesError),
}
