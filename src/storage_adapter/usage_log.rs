//! A storage adapter which prints function calls.

use std::{io::Write, sync::Arc};

use parking_lot::Mutex;

use crate::{Bytes, KeyValueStorageTraits, MaybeBytes, StorageError, StoreKey};

/// The usage log storage adapter. Logs storage method calls.
///
/// It is intended to aid in debugging lock contention by revealing the sequence of store operations made by each lock attempt.
///
/// A failure to write the log is returned as an error from [`get`](KeyValueStorageTraits::get), but ignored by the mutating methods.
///
/// ### Example (log to stdout)
/// ```rust
/// # use std::sync::Arc;
/// # use parking_lot::Mutex;
/// # use expiring_lock::store::MemoryStore;
/// # use expiring_lock::storage_adapter::usage_log::UsageLogStorageAdapter;
/// let store = Arc::new(MemoryStore::new());
/// let log_writer = Arc::new(Mutex::new(
///     // std::io::BufWriter::new(
///     std::io::stdout(),
///     //    )
/// ));
/// let store = Arc::new(UsageLogStorageAdapter::new(store, log_writer, || {
///     chrono::Utc::now().format("[%T%.3f] ").to_string()
/// }));
/// ````
///
/// Two lock attempts on a key, the second after the first hold expired, print outputs like:
/// ```text
/// [23:41:19.885] set_if_absent(42, 1000110000) -> Ok(true)
/// [23:41:34.885] set_if_absent(42, 1000125000) -> Ok(false)
/// [23:41:34.885] get(42) -> Ok(Some("1000110000"))
/// [23:41:34.886] get_and_set(42, 1000125000) -> Ok(Some("1000110000"))
/// ```
pub struct UsageLogStorageAdapter<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    handle: Arc<Mutex<dyn Write + Send>>,
    prefix_func: fn() -> String,
}

impl<TStorage: ?Sized> core::fmt::Debug for UsageLogStorageAdapter<TStorage> {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        writeln!(f, "usage log")
    }
}

impl<TStorage: ?Sized> UsageLogStorageAdapter<TStorage> {
    /// Create a new usage log storage adapter.
    pub fn new(
        storage: Arc<TStorage>,
        handle: Arc<Mutex<dyn Write + Send>>,
        prefix_func: fn() -> String,
    ) -> Self {
        Self {
            storage,
            handle,
            prefix_func,
        }
    }
}

/// Formats a store value for the log.
struct DisplayValue<'a>(Option<&'a [u8]>);

impl core::fmt::Debug for DisplayValue<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.0 {
            Some(value) => write!(f, "Some({:?})", String::from_utf8_lossy(value)),
            None => write!(f, "None"),
        }
    }
}

fn display_result(result: &Result<MaybeBytes, StorageError>) -> String {
    match result {
        Ok(value) => format!("Ok({:?})", DisplayValue(value.as_deref())),
        Err(err) => format!("Err({err})"),
    }
}

impl<TStorage: ?Sized + KeyValueStorageTraits> KeyValueStorageTraits
    for UsageLogStorageAdapter<TStorage>
{
    fn set_if_absent(&self, key: &StoreKey, value: Bytes) -> Result<bool, StorageError> {
        let value_str = String::from_utf8_lossy(&value).into_owned();
        let result = self.storage.set_if_absent(key, value);
        // The store has already applied any change, so a failed log write must not replace its result
        let _ = writeln!(
            self.handle.lock(),
            "{}set_if_absent({key}, {value_str}) -> {result:?}",
            (self.prefix_func)(),
        );
        result
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let result = self.storage.get(key);
        writeln!(
            self.handle.lock(),
            "{}get({key}) -> {}",
            (self.prefix_func)(),
            display_result(&result)
        )?;
        result
    }

    fn get_and_set(&self, key: &StoreKey, value: Bytes) -> Result<MaybeBytes, StorageError> {
        let value_str = String::from_utf8_lossy(&value).into_owned();
        let result = self.storage.get_and_set(key, value);
        let _ = writeln!(
            self.handle.lock(),
            "{}get_and_set({key}, {value_str}) -> {}",
            (self.prefix_func)(),
            display_result(&result)
        );
        result
    }

    fn compare_and_set(
        &self,
        key: &StoreKey,
        expected: &[u8],
        value: Bytes,
    ) -> Result<bool, StorageError> {
        let value_str = String::from_utf8_lossy(&value).into_owned();
        let result = self.storage.compare_and_set(key, expected, value);
        let _ = writeln!(
            self.handle.lock(),
            "{}compare_and_set({key}, {}, {value_str}) -> {result:?}",
            (self.prefix_func)(),
            String::from_utf8_lossy(expected)
        );
        result
    }

    fn supports_compare_and_set(&self) -> bool {
        self.storage.supports_compare_and_set()
    }
}
