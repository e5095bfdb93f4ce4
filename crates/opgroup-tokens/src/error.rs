use opgroup_transaction::OutPoint;

use crate::group_id::GroupId;

/// Reject code for malformed or otherwise invalid transactions.
pub const REJECT_INVALID: u32 = 0x10;
/// Reject code for transactions whose token groups do not balance.
pub const REJECT_GROUP_IMBALANCE: u32 = 0x104;

/// Error types for token-group operations outside consensus validation.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// A group identifier could not be decoded.
    #[error("invalid group id: {0}")]
    InvalidGroupId(String),

    /// A display value could not be parsed as a token amount.
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    /// An amount outside the token money range.
    #[error("amount out of range: {0}")]
    AmountOutOfRange(i64),

    /// An authority word that is not recognised.
    #[error("unknown authority: {0}")]
    UnknownAuthority(String),

    /// Description parameters rejected before building a payload.
    #[error("invalid description: {0}")]
    InvalidDescription(String),

    /// Identifier derivation hit its iteration bound.
    #[error("no group id found after {0} iterations")]
    DerivationExhausted(u64),

    /// Strict registry mode refused a conflicting creation.
    #[error("registry conflict for {id}: {reason}")]
    RegistryConflict { id: GroupId, reason: String },

    /// A parameter file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Persistence failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("script error: {0}")]
    Script(#[from] opgroup_script::ScriptError),

    #[error("transaction error: {0}")]
    Transaction(#[from] opgroup_transaction::TransactionError),
}

/// Error types for the creation-record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key in the creation keyspace that does not decode.
    #[error("corrupt key: {0}")]
    CorruptKey(String),
}

/// Consensus rejection of a transaction by the token-group rules.
///
/// Every variant maps to a reject code and a short reject reason; the
/// `Display` form carries the detail.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GroupViolation {
    #[error("output {0} carries a malformed group prefix")]
    BadGroupScript(usize),

    #[error("output {0} carries a zero group quantity")]
    ZeroQuantity(usize),

    #[error("token quantity overflow in group {0}")]
    TokenOverflow(GroupId),

    #[error("input {0} is missing or already spent")]
    MissingInput(OutPoint),

    #[error("management group {0} created without a management input")]
    ManagementWithoutKey(GroupId),

    #[error("authority for group {0} created without permission")]
    PermissionEscalation(GroupId),

    #[error("group {0} minted tokens without permission")]
    MintWithoutAuthority(GroupId),

    #[error("group {0} melted tokens without permission")]
    MeltWithoutAuthority(GroupId),

    #[error("group {0} has unauthorized output authorities")]
    UnauthorizedAuthorities(GroupId),

    #[error("group {0} output script does not match any input script")]
    ScriptMismatch(GroupId),

    #[error("group {group} native value does not balance: {input} in, {output} out")]
    NativeImbalance { group: GroupId, input: u64, output: u64 },

    #[error("management fee not paid: needed {needed}, paid {paid}")]
    ManagementFeeUnpaid { needed: i64, paid: i64 },
}

impl GroupViolation {
    /// The reject code reported to peers.
    pub fn reject_code(&self) -> u32 {
        match self {
            GroupViolation::BadGroupScript(_)
            | GroupViolation::ZeroQuantity(_)
            | GroupViolation::TokenOverflow(_)
            | GroupViolation::MissingInput(_)
            | GroupViolation::ManagementWithoutKey(_) => REJECT_INVALID,
            _ => REJECT_GROUP_IMBALANCE,
        }
    }

    /// Short machine-readable reject reason.
    pub fn reason(&self) -> &'static str {
        match self {
            GroupViolation::BadGroupScript(_) => "bad OP_GROUP",
            GroupViolation::ZeroQuantity(_) => "OP_GROUP quantity is zero",
            GroupViolation::TokenOverflow(_) => "token overflow",
            GroupViolation::MissingInput(_) => "missing-inputs",
            GroupViolation::ManagementWithoutKey(_) => {
                "Only the Token Management key can create management tokens"
            }
            GroupViolation::PermissionEscalation(_) => "grouped-permission-escalation",
            GroupViolation::MintWithoutAuthority(_)
            | GroupViolation::MeltWithoutAuthority(_)
            | GroupViolation::UnauthorizedAuthorities(_) => "token-group-imbalance",
            GroupViolation::ScriptMismatch(_) => "token-group-script-mismatch",
            GroupViolation::NativeImbalance { .. } => "token-group-native-imbalance",
            GroupViolation::ManagementFeeUnpaid { .. } => "token-group-fee-unpaid",
        }
    }
}
