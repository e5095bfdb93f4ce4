/// Token-group SDK - Protocol engine for grouped (token) outputs.
///
/// Group identifiers and authority flags, the grouped locking-script codec,
/// the consensus balance validator, identifier derivation, the group
/// registry with its description filters and management-fee schedule, and
/// persistence of creation records.

pub mod group_id;
pub mod flags;
pub mod amount;
pub mod codec;
pub mod description;
pub mod creation;
pub mod filters;
pub mod registry;
pub mod fees;
pub mod derivation;
pub mod validator;
pub mod params;
pub mod store;

mod error;
pub use error::{GroupViolation, StoreError, TokenError, REJECT_GROUP_IMBALANCE, REJECT_INVALID};
pub use group_id::GroupId;
pub use flags::{AuthorityFlags, IdFlags};
pub use codec::{GroupParse, GroupPayload, TokenGroupInfo};
pub use description::TokenGroupDescription;
pub use creation::{TokenGroupCreation, TokenGroupStatus};
pub use registry::{GroupRegistry, ManagementSlot, SharedRegistry};
pub use fees::FeeSchedule;
pub use derivation::derive_group_id;
pub use params::TokenParams;
pub use validator::{check_token_groups, token_tx_stats, Coin, CoinsView, GroupBalance, GroupBalances, TokenTxStats};
pub use store::{MemoryTokenStore, SledTokenStore, TokenStore};
