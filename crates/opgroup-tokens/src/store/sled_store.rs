use std::path::Path;

use tracing::debug;

use super::{creation_key, group_from_key, TokenStore, CREATION_KEY_PREFIX};
use crate::creation::TokenGroupCreation;
use crate::error::StoreError;
use crate::group_id::GroupId;

/// Name of the sled tree holding creation records.
const TOKENS_TREE: &str = "tokens";

/// Creation records in a sled tree, JSON-encoded.
#[derive(Clone, Debug)]
pub struct SledTokenStore {
    tree: sled::Tree,
}

impl SledTokenStore {
    /// Open (or create) the store under `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = sled::open(path.as_ref())?;
        debug!(path = %path.as_ref().display(), "opened token store");
        Self::from_db(&db)
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self, StoreError> {
        let db = sled::Config::new().temporary(true).open()?;
        Self::from_db(&db)
    }

    pub fn from_db(db: &sled::Db) -> Result<Self, StoreError> {
        Ok(SledTokenStore { tree: db.open_tree(TOKENS_TREE)? })
    }

    /// Flush pending writes to disk.
    pub fn flush(&self) -> Result<(), StoreError> {
        self.tree.flush()?;
        Ok(())
    }
}

impl TokenStore for SledTokenStore {
    fn write_batch(&self, creations: &[TokenGroupCreation]) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for c in creations {
            batch.insert(creation_key(c.group()), serde_json::to_vec(c)?);
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn write(&self, id: &GroupId, creation: &TokenGroupCreation) -> Result<(), StoreError> {
        self.tree.insert(creation_key(id), serde_json::to_vec(creation)?)?;
        Ok(())
    }

    fn read(&self, id: &GroupId) -> Result<Option<TokenGroupCreation>, StoreError> {
        match self.tree.get(creation_key(id))? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn erase_batch(&self, ids: &[GroupId]) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for id in ids {
            batch.remove(creation_key(id));
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }

    fn erase(&self, id: &GroupId) -> Result<(), StoreError> {
        self.tree.remove(creation_key(id))?;
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<TokenGroupCreation>, StoreError> {
        let mut creations = Vec::new();
        for item in self.tree.scan_prefix([CREATION_KEY_PREFIX]) {
            let (key, value) = item?;
            group_from_key(&key)?;
            creations.push(serde_json::from_slice(&value)?);
        }
        Ok(creations)
    }

    fn drop_all(&self) -> Result<(), StoreError> {
        let mut batch = sled::Batch::default();
        for key in self.tree.scan_prefix([CREATION_KEY_PREFIX]).keys() {
            batch.remove(key?);
        }
        self.tree.apply_batch(batch)?;
        Ok(())
    }
}
