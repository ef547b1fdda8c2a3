//! A crash-tolerant expiring mutual-exclusion lock built on a shared key-value store.
//!
//! Independent processes can coordinate access to a single logical resource (e.g. "only one worker may process product `42` at a time") without a dedicated lock server.
//! The lock state lives entirely in a key-value store under a caller-chosen key.
//! The stored value is the *absolute expiry timestamp* of the current hold, so a lock abandoned by a crashed or hung holder becomes stale and can be reclaimed by another caller.
//!
//! The store is an injected capability implementing [`KeyValueStorageTraits`]: atomic set-if-absent, plain get, and atomic get-and-set.
//! This crate includes an in-memory store and a filesystem store (unix), as well as storage adapters for usage logging and performance metrics.
//!
//! ## Example
//! ```rust
//! # use std::sync::Arc;
//! use expiring_lock::{store::MemoryStore, ExpiringLock};
//!
//! let store = Arc::new(MemoryStore::new());
//! let lock = ExpiringLock::new(store);
//!
//! // The caller computes `now + max hold` before attempting to acquire
//! let expiry = lock.expiry_from_now();
//! assert!(lock.try_acquire("product/42", &expiry.to_string())?);
//!
//! // A second caller is refused until the hold expires
//! assert!(!lock.try_acquire("product/42", &lock.expiry_from_now().to_string())?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! There is no retry loop and no unlock: a caller wanting retry-until-acquired semantics loops externally with its own backoff and deadline.
//!
//! ## Crate Features
//!  - `tests`: store conformance testing functions (for external store development).
//!
//! ## Licence
//! `expiring_lock` is licensed under either of
//!  - the Apache License, Version 2.0 <http://www.apache.org/licenses/LICENSE-2.0> or
//!  - the MIT license <http://opensource.org/licenses/MIT>, at your option.

#![warn(unused_variables)]
#![warn(dead_code)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![deny(clippy::missing_panics_doc)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod clock;
pub mod config;
mod expiring_lock;
mod lock_expiry;
pub mod storage_adapter;
mod storage_sync;
pub mod store;
mod store_key;


use std::sync::Arc;

use thiserror::Error;

pub use self::expiring_lock::{
    AcquireOutcome, ExpiringLock, ExpiringLockOptions, LockError, ReclaimMode,
};
pub use self::lock_expiry::{LockExpiry, LockExpiryError};
pub use self::storage_sync::KeyValueStorageTraits;
pub use self::store_key::{StoreKey, StoreKeyError};

/// [`Arc`] wrapped key-value storage.
pub type KeyValueStorage = Arc<dyn KeyValueStorageTraits>;

/// The type for bytes used in store get and set methods.
///
/// An alias for [`bytes::Bytes`].
pub type Bytes = bytes::Bytes;

/// An alias for bytes which may or may not be available.
///
/// When a value is read from a store, it returns `MaybeBytes` which is [`None`] if the key is not set.
pub type MaybeBytes = Option<Bytes>;

/// A storage error.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// An invalid store key.
    #[error("invalid store key {0}")]
    InvalidStoreKey(#[from] StoreKeyError),
    /// The requested method is not supported.
    #[error("{0}")]
    Unsupported(String),
    /// Any other error.
    #[error("{0}")]
    Other(String),
}

impl From<&str> for StorageError {
    fn from(err: &str) -> Self {
        Self::Other(err.to_string())
    }
}

impl From<String> for StorageError {
    fn from(err: String) -> Self {
        Self::Other(err)
    }
}
