use opgroup_tokens::{GroupId, TokenError};
use opgroup_transaction::OutPoint;

/// Error types for token transaction construction.
#[derive(Debug, thiserror::Error)]
pub enum WalletError {
    /// Not enough of an asset to cover the request, fees included.
    #[error("insufficient {asset}: needed {needed}, available {available}")]
    InsufficientFunds { asset: String, needed: i64, available: i64 },

    #[error("keypool ran out")]
    KeypoolExhausted,

    /// No authority coin grants the capability the operation needs.
    #[error("no authority available: {0}")]
    NoAuthority(String),

    #[error("no coins available: {0}")]
    NoCoins(String),

    #[error("coin {0} is not available for spending")]
    CoinUnavailable(OutPoint),

    #[error("unknown token group {0}")]
    UnknownGroup(GroupId),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("signing failed: {0}")]
    SigningFailed(String),

    #[error("transaction rejected: {0}")]
    CommitRejected(String),

    #[error(transparent)]
    Token(#[from] TokenError),
}
