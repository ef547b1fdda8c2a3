//! An in-memory store.

use parking_lot::RwLock;

use crate::{Bytes, KeyValueStorageTraits, MaybeBytes, StorageError, StoreKey};

use std::collections::{btree_map::Entry, BTreeMap};

/// An in-memory store.
///
/// Every operation holds the map lock for its whole duration, so each is atomic with respect to the others.
#[derive(Debug)]
pub struct MemoryStore {
    data_map: RwLock<BTreeMap<StoreKey, Bytes>>,
}

impl MemoryStore {
    /// Create a new, empty memory store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data_map: RwLock::new(BTreeMap::default()),
        }
    }

    /// Returns the number of keys in the store.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data_map.read().len()
    }

    /// Returns true if the store has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data_map.read().is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueStorageTraits for MemoryStore {
    fn set_if_absent(&self, key: &StoreKey, value: Bytes) -> Result<bool, StorageError> {
        let mut data_map = self.data_map.write();
        match data_map.entry(key.clone()) {
            Entry::Vacant(entry) => {
                entry.insert(value);
                Ok(true)
            }
            Entry::Occupied(_) => Ok(false),
        }
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.read().get(key).cloned())
    }

    fn get_and_set(&self, key: &StoreKey, value: Bytes) -> Result<MaybeBytes, StorageError> {
        Ok(self.data_map.write().insert(key.clone(), value))
    }

    fn compare_and_set(
        &self,
        key: &StoreKey,
        expected: &[u8],
        value: Bytes,
    ) -> Result<bool, StorageError> {
        let mut data_map = self.data_map.write();
        match data_map.get_mut(key) {
            Some(current) if current.as_ref() == expected => {
                *current = value;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn supports_compare_and_set(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn memory_store() -> Result<(), Box<dyn Error>> {
        let store = MemoryStore::new();
        crate::store_test::store_set_if_absent(&store)?;
        crate::store_test::store_get_and_set(&store)?;
        crate::store_test::store_compare_and_set(&store)?;
        crate::store_test::store_concurrent_set_if_absent(&store)?;
        crate::store_test::store_concurrent_get_and_set(&store)?;
        crate::store_test::store_related_keys(&store)?;
        Ok(())
    }

    #[test]
    fn memory_len() -> Result<(), Box<dyn Error>> {
        let store = MemoryStore::new();
        assert!(store.is_empty());
        store.set_if_absent(&"a".try_into()?, Bytes::from_static(b"0"))?;
        store.get_and_set(&"b".try_into()?, Bytes::from_static(b"1"))?;
        assert_eq!(store.len(), 2);
        Ok(())
    }
}
