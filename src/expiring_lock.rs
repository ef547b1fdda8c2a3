//! The expiring lock.

use std::{sync::Arc, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    clock::{Clock, SystemClock},
    config::global_config,
    Bytes, KeyValueStorageTraits, LockExpiry, LockExpiryError, StorageError, StoreKey,
    StoreKeyError,
};

/// How a stale lock is reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReclaimMode {
    /// Replace the stale value with [`get_and_set`](KeyValueStorageTraits::get_and_set) and win only if the replaced value is the stale value that was read.
    ///
    /// Works with any store. Of several callers racing on the same stale value, only the first replacement observes it, so at most one wins.
    /// However, a losing caller has still overwritten the winner's expiry with its own, so the stored expiry may not belong to the holder.
    /// Racers that read different stale values (e.g. through clock skew) can both win.
    #[default]
    GetAndSet,
    /// Replace the stale value with [`compare_and_set`](KeyValueStorageTraits::compare_and_set).
    ///
    /// A losing caller writes nothing, so the stored expiry always belongs to the holder.
    /// Requires a store supporting compare-and-set.
    CompareAndSwap,
}

/// Options for an [`ExpiringLock`].
///
/// The defaults are taken from the [global configuration](crate::config::global_config).
/// The options serialise as JSON like:
/// ```json
/// {
///     "max_hold_ms": 10000,
///     "reclaim_mode": "get_and_set"
/// }
/// ```
/// `reclaim_mode` is optional and defaults to `get_and_set`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ExpiringLockOptions {
    max_hold_ms: u64,
    #[serde(default)]
    reclaim_mode: ReclaimMode,
}

impl Default for ExpiringLockOptions {
    fn default() -> Self {
        let config = global_config();
        let mut options = Self {
            max_hold_ms: 0,
            reclaim_mode: config.lock_reclaim_mode(),
        };
        options.set_max_hold(config.lock_max_hold());
        options
    }
}

impl ExpiringLockOptions {
    /// Returns the maximum duration a holder may keep the lock before it becomes stale.
    #[must_use]
    pub fn max_hold(&self) -> Duration {
        Duration::from_millis(self.max_hold_ms)
    }

    /// Set the maximum duration a holder may keep the lock before it becomes stale.
    ///
    /// Truncated to whole milliseconds.
    pub fn set_max_hold(&mut self, max_hold: Duration) -> &mut Self {
        self.max_hold_ms = u64::try_from(max_hold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Returns the [`ReclaimMode`].
    #[must_use]
    pub fn reclaim_mode(&self) -> ReclaimMode {
        self.reclaim_mode
    }

    /// Set the [`ReclaimMode`].
    pub fn set_reclaim_mode(&mut self, reclaim_mode: ReclaimMode) -> &mut Self {
        self.reclaim_mode = reclaim_mode;
        self
    }
}

/// The result of a lock acquisition attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    /// The key was not set, and now holds the caller's expiry.
    Acquired,
    /// The previous hold had expired and the caller won the reclaim.
    Reclaimed {
        /// The expiry of the stale hold.
        previous: LockExpiry,
    },
    /// The current hold has not expired.
    Held {
        /// The expiry of the current hold.
        expiry: LockExpiry,
    },
    /// The previous hold had expired but another caller reclaimed it first.
    LostRace {
        /// The expiry of the stale hold.
        expired: LockExpiry,
    },
    /// The key was set when the caller tried to create it, but unset when read back.
    Vanished,
}

impl AcquireOutcome {
    /// Returns true if the caller now holds the lock.
    #[must_use]
    pub fn is_acquired(&self) -> bool {
        matches!(self, Self::Acquired | Self::Reclaimed { .. })
    }
}

/// A lock error.
#[derive(Debug, Error)]
pub enum LockError {
    /// An invalid key or expiry value. No store operation was made.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// The value stored at the key is not a lock expiry.
    #[error("lock value {value:?} at key {key} is not a valid expiry timestamp")]
    CorruptLockValue {
        /// The lock key.
        key: StoreKey,
        /// The stored value (lossily converted to UTF-8).
        value: String,
    },
    /// A store operation failed.
    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StorageError),
}

impl From<StoreKeyError> for LockError {
    fn from(err: StoreKeyError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

impl From<LockExpiryError> for LockError {
    fn from(err: LockExpiryError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}

/// A mutual-exclusion lock whose state is an expiry timestamp in a key-value store.
///
/// A lock attempt proceeds as follows:
///  1. Store the caller's expiry if the key is unset. If stored, the caller holds the lock.
///  2. Otherwise, read the stored expiry. If it has not passed, the lock is held by someone else.
///  3. Otherwise, the lock is stale: replace the stale expiry with the caller's expiry according to the [`ReclaimMode`]. The caller holds the lock if its replacement was the one to displace the stale value.
///
/// A lock attempt is a single try: it never blocks beyond the store operations and never retries.
/// A refused attempt never modifies the stored value.
///
/// There is no release: a hold ends when its expiry passes.
/// There is no holder identity or fencing token: any caller may reclaim a stale lock.
pub struct ExpiringLock<TStorage: ?Sized> {
    storage: Arc<TStorage>,
    clock: Arc<dyn Clock>,
    options: ExpiringLockOptions,
}

impl<TStorage: ?Sized> core::fmt::Debug for ExpiringLock<TStorage> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ExpiringLock")
            .field("clock", &self.clock)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<TStorage: ?Sized + KeyValueStorageTraits> ExpiringLock<TStorage> {
    /// Create a new expiring lock over `storage` with default options and the system clock.
    #[must_use]
    pub fn new(storage: Arc<TStorage>) -> Self {
        Self::new_with_options(storage, ExpiringLockOptions::default())
    }

    /// Create a new expiring lock over `storage` with `options` and the system clock.
    #[must_use]
    pub fn new_with_options(storage: Arc<TStorage>, options: ExpiringLockOptions) -> Self {
        Self {
            storage,
            clock: Arc::new(SystemClock),
            options,
        }
    }

    /// Use `clock` to decide whether holds have expired.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Returns the underlying storage.
    #[must_use]
    pub fn storage(&self) -> &Arc<TStorage> {
        &self.storage
    }

    /// Returns the lock options.
    #[must_use]
    pub fn options(&self) -> &ExpiringLockOptions {
        &self.options
    }

    /// Returns the expiry of a hold starting now: the current time plus the [max hold](ExpiringLockOptions::max_hold).
    #[must_use]
    pub fn expiry_from_now(&self) -> LockExpiry {
        LockExpiry::after(self.clock.now_millis(), self.options.max_hold())
    }

    /// Try to acquire the lock on `key` with a hold expiring at `expiry_value` (milliseconds since the UNIX epoch as a decimal string).
    ///
    /// Returns `true` if the caller now holds the lock, and `false` if another caller holds it and its hold has not expired.
    /// On success, the store holds `expiry_value` verbatim.
    ///
    /// # Errors
    /// Returns a [`LockError`] if:
    ///  - `key` is empty or otherwise invalid, or `expiry_value` is not a valid expiry ([`LockError::InvalidArgument`]),
    ///  - the stored value is not a valid expiry ([`LockError::CorruptLockValue`]), or
    ///  - a store operation fails ([`LockError::StoreUnavailable`]).
    pub fn try_acquire(&self, key: &str, expiry_value: &str) -> Result<bool, LockError> {
        let key = StoreKey::new(key)?;
        expiry_value.parse::<LockExpiry>()?;
        let outcome = self.acquire_value(&key, Bytes::copy_from_slice(expiry_value.as_bytes()))?;
        Ok(outcome.is_acquired())
    }

    /// Try to acquire the lock on `key` for the [max hold](ExpiringLockOptions::max_hold) from now.
    ///
    /// Returns the expiry of the new hold if acquired.
    ///
    /// # Errors
    /// See [`try_acquire`](ExpiringLock::try_acquire).
    pub fn try_acquire_for_max_hold(&self, key: &str) -> Result<Option<LockExpiry>, LockError> {
        let key = StoreKey::new(key)?;
        let expiry = self.expiry_from_now();
        Ok(self.acquire(&key, expiry)?.is_acquired().then_some(expiry))
    }

    /// Try to acquire the lock on `key` with a hold expiring at `expiry`, returning how the attempt resolved.
    ///
    /// # Errors
    /// Returns a [`LockError`] if the stored value is not a valid expiry or a store operation fails.
    pub fn acquire(&self, key: &StoreKey, expiry: LockExpiry) -> Result<AcquireOutcome, LockError> {
        self.acquire_value(key, expiry.to_bytes())
    }

    fn acquire_value(&self, key: &StoreKey, value: Bytes) -> Result<AcquireOutcome, LockError> {
        if self.storage.set_if_absent(key, value.clone())? {
            return Ok(AcquireOutcome::Acquired);
        }

        let Some(current) = self.storage.get(key)? else {
            return Ok(AcquireOutcome::Vanished);
        };
        let current_expiry =
            LockExpiry::from_bytes(&current).map_err(|_| LockError::CorruptLockValue {
                key: key.clone(),
                value: String::from_utf8_lossy(&current).into_owned(),
            })?;
        if !current_expiry.is_expired_at(self.clock.now_millis()) {
            return Ok(AcquireOutcome::Held {
                expiry: current_expiry,
            });
        }

        let reclaimed = match self.options.reclaim_mode {
            ReclaimMode::GetAndSet => self
                .storage
                .get_and_set(key, value)?
                .is_some_and(|previous| previous == current),
            ReclaimMode::CompareAndSwap => self.storage.compare_and_set(key, &current, value)?,
        };
        Ok(if reclaimed {
            AcquireOutcome::Reclaimed {
                previous: current_expiry,
            }
        } else {
            AcquireOutcome::LostRace {
                expired: current_expiry,
            }
        })
    }
}
