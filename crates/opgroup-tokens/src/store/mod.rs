//! Persistence of group creation records.
//!
//! Records are keyed by `'c' || group id` and hold the creation as it
//! appeared on chain; description filters run again whenever records are
//! loaded into a registry.

mod memory;
mod sled_store;

pub use memory::MemoryTokenStore;
pub use sled_store::SledTokenStore;

use opgroup_transaction::Transaction;
use tracing::{debug, info};

use crate::creation::{creation_from_transaction, is_any_output_group_creation, TokenGroupCreation};
use crate::error::StoreError;
use crate::flags::IdFlags;
use crate::group_id::GroupId;
use crate::registry::GroupRegistry;
use crate::TokenError;

/// Prefix byte of the creation keyspace.
pub const CREATION_KEY_PREFIX: u8 = b'c';

/// Blocks between batch flushes during a reindex.
pub const REINDEX_FLUSH_INTERVAL: u32 = 100;

/// Key/value store of creation records.
///
/// Batch operations are atomic.
pub trait TokenStore: Send + Sync {
    fn write_batch(&self, creations: &[TokenGroupCreation]) -> Result<(), StoreError>;

    fn write(&self, id: &GroupId, creation: &TokenGroupCreation) -> Result<(), StoreError>;

    fn read(&self, id: &GroupId) -> Result<Option<TokenGroupCreation>, StoreError>;

    fn erase_batch(&self, ids: &[GroupId]) -> Result<(), StoreError>;

    fn erase(&self, id: &GroupId) -> Result<(), StoreError>;

    /// Every record in the creation keyspace, in key order.
    fn find_all(&self) -> Result<Vec<TokenGroupCreation>, StoreError>;

    /// Erase every record in the creation keyspace.
    fn drop_all(&self) -> Result<(), StoreError>;
}

pub fn creation_key(id: &GroupId) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + id.len());
    key.push(CREATION_KEY_PREFIX);
    key.extend_from_slice(id.as_bytes());
    key
}

pub fn group_from_key(key: &[u8]) -> Result<GroupId, StoreError> {
    match key.split_first() {
        Some((&CREATION_KEY_PREFIX, id)) => Ok(GroupId::from_bytes(id)),
        _ => Err(StoreError::CorruptKey(hex::encode(key))),
    }
}

/// A block's height and transactions, as replayed by [`reindex`].
#[derive(Clone, Debug, Default)]
pub struct IndexedBlock {
    pub height: u32,
    pub transactions: Vec<Transaction>,
}

/// Group creations defined by the transactions of one block.
pub fn block_creations(transactions: &[Transaction]) -> Vec<TokenGroupCreation> {
    transactions
        .iter()
        .filter(|tx| !tx.is_coinbase() && is_any_output_group_creation(tx, IdFlags::NONE))
        .filter_map(creation_from_transaction)
        .collect()
}

/// Reset `registry` and fill it from `store`.
///
/// # Returns
/// The number of records read.
pub fn load_from_store<S: TokenStore + ?Sized>(
    store: &S,
    registry: &mut GroupRegistry,
) -> Result<usize, TokenError> {
    registry.reset_groups();
    let creations = store.find_all()?;
    let count = creations.len();
    registry.add_groups(creations)?;
    info!(count, "loaded token groups from store");
    Ok(count)
}

/// Rebuild `store` and `registry` from the chain.
///
/// Blocks below the activation height are skipped. Creations are written
/// and registered every [`REINDEX_FLUSH_INTERVAL`] blocks and once more at
/// the end.
///
/// # Arguments
/// * `store` - Store to drop and refill.
/// * `registry` - Registry to reset and refill.
/// * `blocks` - The active chain in height order.
///
/// # Returns
/// The number of creations found.
pub fn reindex<S, I>(store: &S, registry: &mut GroupRegistry, blocks: I) -> Result<usize, TokenError>
where
    S: TokenStore + ?Sized,
    I: IntoIterator<Item = IndexedBlock>,
{
    store.drop_all()?;
    registry.reset_groups();
    let activation_height = registry.params().activation_height;
    info!(activation_height, "reindexing token database");

    let mut pending: Vec<TokenGroupCreation> = Vec::new();
    let mut total = 0;
    for block in blocks {
        if block.height < activation_height {
            continue;
        }
        if block.height % 1000 == 0 {
            info!(height = block.height, "reindexing token database");
        }
        let found = block_creations(&block.transactions);
        if !found.is_empty() {
            debug!(height = block.height, count = found.len(), "token creations in block");
        }
        pending.extend(found);

        if block.height % REINDEX_FLUSH_INTERVAL == 0 {
            total += flush(store, registry, &mut pending)?;
        }
    }
    total += flush(store, registry, &mut pending)?;
    info!(total, "token database reindex complete");
    Ok(total)
}

fn flush<S: TokenStore + ?Sized>(
    store: &S,
    registry: &mut GroupRegistry,
    pending: &mut Vec<TokenGroupCreation>,
) -> Result<usize, TokenError> {
    if pending.is_empty() {
        return Ok(0);
    }
    store.write_batch(pending)?;
    let count = pending.len();
    registry.add_groups(pending.drain(..))?;
    Ok(count)
}

/// Persist and register the creations of a newly connected block.
pub fn connect_block<S: TokenStore + ?Sized>(
    store: &S,
    registry: &mut GroupRegistry,
    transactions: &[Transaction],
) -> Result<usize, TokenError> {
    let mut pending = block_creations(transactions);
    flush(store, registry, &mut pending)
}

/// Remove the creations of a disconnected block from store and registry.
pub fn disconnect_block<S: TokenStore + ?Sized>(
    store: &S,
    registry: &mut GroupRegistry,
    transactions: &[Transaction],
) -> Result<usize, TokenError> {
    let removed: Vec<GroupId> = transactions
        .iter()
        .rev()
        .filter_map(|tx| registry.remove_group(tx))
        .collect();
    if !removed.is_empty() {
        store.erase_batch(&removed)?;
    }
    Ok(removed.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::{creation, creation_tx, test_params};

    #[test]
    fn test_creation_key_roundtrip() {
        let id = GroupId::new(vec![3; 40]);
        let key = creation_key(&id);
        assert_eq!(key[0], b'c');
        assert_eq!(group_from_key(&key).expect("decode"), id);
        assert!(group_from_key(b"x123").is_err());
        assert!(group_from_key(&[]).is_err());
    }

    #[test]
    fn test_block_creations_skip_plain_transactions() {
        let txs = vec![Transaction::new(), creation_tx(1, "GRV", "Grav", 2)];
        let found = block_creations(&txs);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].description.ticker, "GRV");
    }

    /// Records persist unfiltered; filters apply on load.
    #[test]
    fn test_load_from_store_refilters() {
        let store = MemoryTokenStore::new();
        let a = creation(1, "GRV", "Grav", 2);
        let b = creation(2, "grv", "Other", 2);
        store.write_batch(&[a.clone(), b.clone()]).expect("write");

        let mut reg = GroupRegistry::new(test_params());
        assert_eq!(load_from_store(&store, &mut reg).expect("load"), 2);
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.lookup_by_ticker("GRV"), Some(a.group()));
        assert_eq!(store.read(b.group()).expect("read").expect("b").description.ticker, "grv");
    }

    /// Creations after the last flush boundary are still registered.
    #[test]
    fn test_reindex_flushes_tail() {
        let store = MemoryTokenStore::new();
        store.write_batch(&[creation(9, "OLD", "Old", 2)]).expect("write");
        let mut params = test_params();
        params.activation_height = 50;
        let mut reg = GroupRegistry::new(params);

        let blocks = vec![
            IndexedBlock { height: 40, transactions: vec![creation_tx(1, "PRE", "Pre", 2)] },
            IndexedBlock { height: 100, transactions: vec![creation_tx(2, "AAA", "Aaa", 2)] },
            IndexedBlock { height: 101, transactions: vec![creation_tx(3, "BBB", "Bbb", 2)] },
        ];
        assert_eq!(reindex(&store, &mut reg, blocks).expect("reindex"), 2);
        assert_eq!(store.find_all().expect("all").len(), 2);
        assert!(reg.lookup_by_ticker("BBB").is_some());
        assert!(reg.lookup_by_ticker("PRE").is_none());
        assert!(reg.lookup_by_ticker("OLD").is_none());
    }

    #[test]
    fn test_connect_disconnect() {
        let store = MemoryTokenStore::new();
        let mut reg = GroupRegistry::new(test_params());
        let txs = vec![creation_tx(1, "GRV", "Grav", 2)];
        assert_eq!(connect_block(&store, &mut reg, &txs).expect("connect"), 1);
        assert_eq!(reg.len(), 2);
        assert_eq!(disconnect_block(&store, &mut reg, &txs).expect("disconnect"), 1);
        assert_eq!(reg.len(), 1);
        assert!(store.find_all().expect("all").is_empty());
    }
}
