/// Token-group SDK - Wallet construction layer.
///
/// Builds, signs and commits token transactions (group creation, mint,
/// melt, send, authority management) on top of a host wallet's coins,
/// keys, fee estimate and signer, and answers token balance queries.

mod error;
pub use error::WalletError;

pub mod backend;
pub mod selection;
pub mod construct;
pub mod wallet;
pub mod balances;
pub mod memory;

pub use backend::{CoinCandidate, CoinSource, FeeEstimator, KeyPool, KeyReservation, TransactionSigner, WalletBackend};
pub use construct::{construct_transaction, ConstructionStage, TxPlan};
pub use memory::MemoryWallet;
pub use selection::{coin_selection, group_coin_selection, nearest_greater_coin, CoinSelector, GreedySelector, Selection};
pub use wallet::{renew_authority, subgroup_id, Configured, DroppedAuthorities, Recipient, TokenWallet};

#[cfg(test)]
mod tests;
