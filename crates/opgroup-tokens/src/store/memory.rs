use std::collections::BTreeMap;

use parking_lot::RwLock;

use super::{creation_key, group_from_key, TokenStore};
use crate::creation::TokenGroupCreation;
use crate::error::StoreError;
use crate::group_id::GroupId;

/// In-memory store, for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    records: RwLock<BTreeMap<Vec<u8>, TokenGroupCreation>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn write_batch(&self, creations: &[TokenGroupCreation]) -> Result<(), StoreError> {
        let mut records = self.records.write();
        for c in creations {
            records.insert(creation_key(c.group()), c.clone());
        }
        Ok(())
    }

    fn write(&self, id: &GroupId, creation: &TokenGroupCreation) -> Result<(), StoreError> {
        self.records.write().insert(creation_key(id), creation.clone());
        Ok(())
    }

    fn read(&self, id: &GroupId) -> Result<Option<TokenGroupCreation>, StoreError> {
        Ok(self.records.read().get(&creation_key(id)).cloned())
    }

    fn erase_batch(&self, ids: &[GroupId]) -> Result<(), StoreError> {
        let mut records = self.records.write();
        for id in ids {
            records.remove(&creation_key(id));
        }
        Ok(())
    }

    fn erase(&self, id: &GroupId) -> Result<(), StoreError> {
        self.records.write().remove(&creation_key(id));
        Ok(())
    }

    fn find_all(&self) -> Result<Vec<TokenGroupCreation>, StoreError> {
        self.records
            .read()
            .iter()
            .map(|(key, c)| group_from_key(key).map(|_| c.clone()))
            .collect()
    }

    fn drop_all(&self) -> Result<(), StoreError> {
        self.records.write().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::tests::creation;

    #[test]
    fn test_write_read_erase() {
        let store = MemoryTokenStore::new();
        let a = creation(1, "GRV", "Grav", 2);
        store.write(a.group(), &a).expect("write");
        assert_eq!(store.read(a.group()).expect("read"), Some(a.clone()));
        store.erase(a.group()).expect("erase");
        assert!(store.is_empty());
        assert_eq!(store.read(a.group()).expect("read"), None);
    }
}
