#![allow(missing_docs)]
#![cfg(unix)]

use std::{error::Error, sync::Arc, time::Duration};

use parking_lot::Mutex;

use expiring_lock::{
    clock::ManualClock, storage_adapter::usage_log::UsageLogStorageAdapter,
    store::FilesystemStore, AcquireOutcome, ExpiringLock, ExpiringLockOptions, LockExpiry,
    ReclaimMode,
};

fn options(reclaim_mode: ReclaimMode) -> ExpiringLockOptions {
    let mut options = ExpiringLockOptions::default();
    options
        .set_max_hold(Duration::from_secs(10))
        .set_reclaim_mode(reclaim_mode);
    options
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_workers_single_holder() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let clock = Arc::new(ManualClock::new(1_000_100_000));

    // Each worker opens its own store, as separate processes would
    let expiries = std::thread::scope(|s| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.path();
                let clock = clock.clone();
                s.spawn(
                    move || -> Result<Option<LockExpiry>, Box<dyn Error + Send + Sync>> {
                        let store = Arc::new(FilesystemStore::new(path)?);
                        let lock = ExpiringLock::new_with_options(
                            store,
                            options(ReclaimMode::CompareAndSwap),
                        )
                        .with_clock(clock);
                        Ok(lock.try_acquire_for_max_hold("product/42")?)
                    },
                )
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("worker panicked"))
            .collect::<Result<Vec<_>, _>>()
    })
    .map_err(|err| err.to_string())?;

    let holders: Vec<LockExpiry> = expiries.into_iter().flatten().collect();
    assert_eq!(holders, [LockExpiry::from_millis(1_000_110_000)]);
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_scenario_usage_log() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let clock = Arc::new(ManualClock::new(1_000_100_000));
    let log_writer = Arc::new(Mutex::new(Vec::<u8>::new()));

    let holder_a = ExpiringLock::new_with_options(
        Arc::new(FilesystemStore::new(path.path())?),
        options(ReclaimMode::GetAndSet),
    )
    .with_clock(clock.clone());
    let store_b = Arc::new(UsageLogStorageAdapter::new(
        Arc::new(FilesystemStore::new(path.path())?),
        log_writer.clone(),
        String::new,
    ));
    let holder_b = ExpiringLock::new_with_options(store_b, options(ReclaimMode::GetAndSet))
        .with_clock(clock.clone());

    assert!(holder_a.try_acquire("42", "1000110000")?);

    clock.set(1_000_100_005);
    assert_eq!(
        holder_b.acquire(&"42".try_into()?, LockExpiry::from_millis(1_000_120_005))?,
        AcquireOutcome::Held {
            expiry: LockExpiry::from_millis(1_000_110_000)
        }
    );

    clock.set(1_000_115_000);
    assert!(holder_b.try_acquire("42", "1000125000")?);
    assert!(!holder_a.try_acquire("42", "1000125001")?);

    assert_eq!(
        String::from_utf8(log_writer.lock().clone())?,
        "set_if_absent(42, 1000120005) -> Ok(false)\n\
         get(42) -> Ok(Some(\"1000110000\"))\n\
         set_if_absent(42, 1000125000) -> Ok(false)\n\
         get(42) -> Ok(Some(\"1000110000\"))\n\
         get_and_set(42, 1000125000) -> Ok(Some(\"1000110000\"))\n"
    );
    Ok(())
}

#[test]
#[cfg_attr(miri, ignore)]
fn filesystem_parent_and_child_keys() -> Result<(), Box<dyn Error>> {
    let path = tempfile::TempDir::new()?;
    let lock = ExpiringLock::new_with_options(
        Arc::new(FilesystemStore::new(path.path())?),
        options(ReclaimMode::CompareAndSwap),
    )
    .with_clock(Arc::new(ManualClock::new(1_000_100_000)));

    assert!(lock.try_acquire("product", "1000110000")?);
    assert!(lock.try_acquire("product/42", "1000110000")?);
    assert!(lock.try_acquire("/product", "1000110000")?);
    assert!(!lock.try_acquire("product", "1000110001")?);
    assert!(!lock.try_acquire("product/42", "1000110001")?);
    Ok(())
}
