//! A storage adapter which records performance metrics.

use crate::{Bytes, KeyValueStorageTraits, MaybeBytes, StorageError, StoreKey};

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// The performance metrics storage adapter. Accumulates metrics, such as bytes read and written.
///
/// It is intended to aid in testing by allowing the application to validate that metrics (e.g., bytes read/written, total read/write operations) match expected values for specific operations.
///
/// A read is any operation which returns a stored value ([`get`](KeyValueStorageTraits::get) and [`get_and_set`](KeyValueStorageTraits::get_and_set)).
/// A write is any operation which changed the stored value, so a refused [`set_if_absent`](KeyValueStorageTraits::set_if_absent) or [`compare_and_set`](KeyValueStorageTraits::compare_and_set) is not a write.
#[derive(Debug)]
pub struct PerformanceMetricsStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    bytes_read: AtomicUsize,
    bytes_written: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    refused_writes: AtomicUsize,
}

impl<TStorage: ?Sized> PerformanceMetricsStorageAdapter<TStorage> {
    /// Create a new performance metrics storage adapter.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self {
            storage,
            bytes_read: AtomicUsize::default(),
            bytes_written: AtomicUsize::default(),
            reads: AtomicUsize::default(),
            writes: AtomicUsize::default(),
            refused_writes: AtomicUsize::default(),
        }
    }

    /// Returns the number of bytes read.
    pub fn bytes_read(&self) -> usize {
        self.bytes_read.load(Ordering::Relaxed)
    }

    /// Returns the number of bytes written.
    pub fn bytes_written(&self) -> usize {
        self.bytes_written.load(Ordering::Relaxed)
    }

    /// Returns the number of read requests.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of write requests which changed a stored value.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of conditional write requests which were refused.
    pub fn refused_writes(&self) -> usize {
        self.refused_writes.load(Ordering::Relaxed)
    }

    fn record_read(&self, value: &MaybeBytes) {
        self.bytes_read
            .fetch_add(value.as_ref().map_or(0, Bytes::len), Ordering::Relaxed);
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    fn record_write(&self, written: bool, len: usize) {
        if written {
            self.bytes_written.fetch_add(len, Ordering::Relaxed);
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.refused_writes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl<TStorage: ?Sized + KeyValueStorageTraits> KeyValueStorageTraits
    for PerformanceMetricsStorageAdapter<TStorage>
{
    fn set_if_absent(&self, key: &StoreKey, value: Bytes) -> Result<bool, StorageError> {
        let len = value.len();
        let stored = self.storage.set_if_absent(key, value)?;
        self.record_write(stored, len);
        Ok(stored)
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let value = self.storage.get(key)?;
        self.record_read(&value);
        Ok(value)
    }

    fn get_and_set(&self, key: &StoreKey, value: Bytes) -> Result<MaybeBytes, StorageError> {
        let len = value.len();
        let previous = self.storage.get_and_set(key, value)?;
        self.record_read(&previous);
        self.record_write(true, len);
        Ok(previous)
    }

    fn compare_and_set(
        &self,
        key: &StoreKey,
        expected: &[u8],
        value: Bytes,
    ) -> Result<bool, StorageError> {
        let len = value.len();
        let replaced = self.storage.compare_and_set(key, expected, value)?;
        self.record_write(replaced, len);
        Ok(replaced)
    }

    fn supports_compare_and_set(&self) -> bool {
        self.storage.supports_compare_and_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use std::error::Error;

    #[test]
    fn performance_metrics() -> Result<(), Box<dyn Error>> {
        let store = PerformanceMetricsStorageAdapter::new(Arc::new(MemoryStore::new()));
        let key: StoreKey = "42".try_into()?;
        assert!(store.set_if_absent(&key, Bytes::from_static(b"100"))?);
        assert!(!store.set_if_absent(&key, Bytes::from_static(b"200"))?);
        assert_eq!(store.get(&key)?, Some(Bytes::from_static(b"100")));
        assert_eq!(
            store.get_and_set(&key, Bytes::from_static(b"3000"))?,
            Some(Bytes::from_static(b"100"))
        );
        assert!(!store.compare_and_set(&key, b"100", Bytes::from_static(b"4"))?);
        assert!(store.compare_and_set(&key, b"3000", Bytes::from_static(b"4"))?);

        assert_eq!(store.reads(), 2);
        assert_eq!(store.bytes_read(), 6);
        assert_eq!(store.writes(), 3);
        assert_eq!(store.bytes_written(), 8);
        assert_eq!(store.refused_writes(), 2);
        assert!(store.supports_compare_and_set());
        Ok(())
    }
}
