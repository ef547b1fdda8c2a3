use super::{Bytes, MaybeBytes, StorageError, StoreKey};

/// Key-value storage traits.
///
/// Every method must be linearizable with respect to the other methods on the same key: each call appears to take effect atomically at a single point in time.
/// No ordering is required between different keys.
pub trait KeyValueStorageTraits: Send + Sync {
    /// Store `value` at `key` only if `key` currently has no value.
    ///
    /// Returns `true` if the value was stored.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn set_if_absent(&self, key: &StoreKey, value: Bytes) -> Result<bool, StorageError>;

    /// Retrieve the value (bytes) associated with a given [`StoreKey`].
    ///
    /// Returns [`None`] if the key is not set.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError>;

    /// Replace the value at `key` with `value`, returning the value present immediately before the replacement.
    ///
    /// Returns [`None`] if the key was not set, in which case `value` is stored.
    ///
    /// # Errors
    /// Returns a [`StorageError`] if there is an underlying storage error.
    fn get_and_set(&self, key: &StoreKey, value: Bytes) -> Result<MaybeBytes, StorageError>;

    /// Replace the value at `key` with `value` only if the current value equals `expected`.
    ///
    /// Returns `true` if the value was replaced.
    /// A key which is not set never matches.
    ///
    /// The default implementation returns [`StorageError::Unsupported`].
    ///
    /// # Errors
    /// Returns a [`StorageError`] if the store does not support compare-and-set or there is an underlying storage error.
    fn compare_and_set(
        &self,
        key: &StoreKey,
        expected: &[u8],
        value: Bytes,
    ) -> Result<bool, StorageError> {
        let _ = (key, expected, value);
        Err(StorageError::Unsupported(
            "compare_and_set is not supported by this store".to_string(),
        ))
    }

    /// Returns true if the store implements [`compare_and_set`](KeyValueStorageTraits::compare_and_set).
    fn supports_compare_and_set(&self) -> bool {
        false
    }
}
