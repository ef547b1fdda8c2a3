//! Global configuration options.

use std::{
    sync::{OnceLock, RwLock, RwLockReadGuard, RwLockWriteGuard},
    time::Duration,
};

use crate::ReclaimMode;

/// Global configuration options for the `expiring_lock` crate.
///
/// Retrieve the global [`Config`] with [`global_config`] and modify it with [`global_config_mut`].
/// These are the defaults of [`ExpiringLockOptions`](crate::ExpiringLockOptions); options passed explicitly to a lock take precedence.
///
/// ## Lock Max Hold
///  > default: 10 seconds
///
/// The maximum duration a holder may keep a lock before it becomes stale and may be reclaimed by another caller.
/// It should comfortably exceed the time a holder needs for its critical section plus the clock skew between processes.
///
/// ## Lock Reclaim Mode
///  > default: [`ReclaimMode::GetAndSet`]
///
/// How a stale lock is reclaimed. See [`ReclaimMode`].
#[derive(Debug)]
pub struct Config {
    lock_max_hold: Duration,
    lock_reclaim_mode: ReclaimMode,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            lock_max_hold: Duration::from_secs(10),
            lock_reclaim_mode: ReclaimMode::GetAndSet,
        }
    }
}

impl Config {
    /// Get the [lock max hold](#lock-max-hold) configuration.
    #[must_use]
    pub fn lock_max_hold(&self) -> Duration {
        self.lock_max_hold
    }

    /// Set the [lock max hold](#lock-max-hold) configuration.
    pub fn set_lock_max_hold(&mut self, max_hold: Duration) {
        self.lock_max_hold = max_hold;
    }

    /// Get the [lock reclaim mode](#lock-reclaim-mode) configuration.
    #[must_use]
    pub fn lock_reclaim_mode(&self) -> ReclaimMode {
        self.lock_reclaim_mode
    }

    /// Set the [lock reclaim mode](#lock-reclaim-mode) configuration.
    pub fn set_lock_reclaim_mode(&mut self, reclaim_mode: ReclaimMode) {
        self.lock_reclaim_mode = reclaim_mode;
    }
}

static CONFIG: OnceLock<RwLock<Config>> = OnceLock::new();

/// Returns a reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config() -> RwLockReadGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .read()
        .unwrap()
}

/// Returns a mutable reference to the global configuration.
///
/// # Panics
/// This function panics if the underlying lock has been poisoned and might panic if the global config is already held by the current thread.
pub fn global_config_mut() -> RwLockWriteGuard<'static, Config> {
    CONFIG
        .get_or_init(|| RwLock::new(Config::default()))
        .write()
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_lock_max_hold() {
        assert_eq!(global_config().lock_max_hold(), Duration::from_secs(10));
        global_config_mut().set_lock_max_hold(Duration::from_secs(30));
        assert_eq!(global_config().lock_max_hold(), Duration::from_secs(30));
        global_config_mut().set_lock_max_hold(Duration::from_secs(10));
    }

    #[test]
    fn config_lock_reclaim_mode() {
        let config = Config::default();
        assert_eq!(config.lock_reclaim_mode(), ReclaimMode::GetAndSet);
        let mut config = config;
        config.set_lock_reclaim_mode(ReclaimMode::CompareAndSwap);
        assert_eq!(config.lock_reclaim_mode(), ReclaimMode::CompareAndSwap);
    }
}
