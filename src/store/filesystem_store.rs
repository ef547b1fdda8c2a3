//! A filesystem store.
//!
//! Values are stored as files under `<base_directory>/data/`, one flat file per key.
//! The file name is the key with `%` and `/` percent-encoded (`%25`, `%2F`), and a leading `.` encoded as `%2E`, so every key maps to a distinct name inside the directory.
//! Every operation holds an advisory [`flock(2)`](https://man7.org/linux/man-pages/man2/flock.2.html) (via [`fs2::FileExt`]) on a per-key lock file under `<base_directory>/locks/`:
//! exclusive for [`set_if_absent`](KeyValueStorageTraits::set_if_absent), [`get_and_set`](KeyValueStorageTraits::get_and_set) and [`compare_and_set`](KeyValueStorageTraits::compare_and_set), shared for [`get`](KeyValueStorageTraits::get).
//! `flock` locks belong to open file descriptions, so operations are atomic across threads of one process as well as across processes sharing the directory.
//!
//! Values are written to a temporary file and renamed into place, so a crash mid-write never leaves a torn value.
//!
//! A key whose encoded name exceeds the file system's name length limit fails with [`StorageError::IOError`].

use std::{
    fs::{File, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use fs2::FileExt;
use thiserror::Error;

use crate::{Bytes, KeyValueStorageTraits, MaybeBytes, StorageError, StoreKey};

const DATA_DIRECTORY: &str = "data";
const LOCKS_DIRECTORY: &str = "locks";

/// A file system store.
#[derive(Debug)]
pub struct FilesystemStore {
    base_directory: PathBuf,
}

/// A filesystem store creation error.
#[derive(Debug, Error)]
pub enum FilesystemStoreCreateError {
    /// An IO error.
    #[error(transparent)]
    IOError(#[from] std::io::Error),
    /// The path is not valid on this system.
    #[error("base directory {0:?} is not valid")]
    InvalidBaseDirectory(PathBuf),
    /// The path points to an existing file rather than a directory.
    #[error("base directory {0:?} is an existing file")]
    ExistingFile(PathBuf),
}

/// Holds a `flock` on a key lock file until dropped.
struct KeyLockGuard {
    _file: File,
}

impl FilesystemStore {
    /// Create a new file system store at a given `base_directory`.
    /// The base directory will be created if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns a [`FilesystemStoreCreateError`] if `base_directory`:
    ///   - is not valid,
    ///   - points to an existing file rather than a directory, or
    ///   - cannot be created.
    pub fn new<P: AsRef<Path>>(
        base_directory: P,
    ) -> Result<FilesystemStore, FilesystemStoreCreateError> {
        let base_directory = base_directory.as_ref().to_path_buf();
        if base_directory.as_os_str().is_empty() {
            return Err(FilesystemStoreCreateError::InvalidBaseDirectory(
                base_directory,
            ));
        }
        if base_directory.is_file() {
            return Err(FilesystemStoreCreateError::ExistingFile(base_directory));
        }
        std::fs::create_dir_all(base_directory.join(DATA_DIRECTORY))?;
        std::fs::create_dir_all(base_directory.join(LOCKS_DIRECTORY))?;
        Ok(FilesystemStore { base_directory })
    }

    /// Returns the base directory of the store.
    #[must_use]
    pub fn base_directory(&self) -> &Path {
        &self.base_directory
    }

    /// Maps a [`StoreKey`] to the filesystem [`PathBuf`] holding its value.
    #[must_use]
    pub fn key_to_fspath(&self, key: &StoreKey) -> PathBuf {
        self.base_directory
            .join(DATA_DIRECTORY)
            .join(key_to_file_name(key))
    }

    fn key_to_lock_fspath(&self, key: &StoreKey, extension: &str) -> PathBuf {
        let mut file_name = key_to_file_name(key);
        file_name.push_str(extension);
        self.base_directory.join(LOCKS_DIRECTORY).join(file_name)
    }

    fn lock_key(&self, key: &StoreKey, exclusive: bool) -> Result<KeyLockGuard, StorageError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(self.key_to_lock_fspath(key, ".lock"))?;
        loop {
            let locked = if exclusive {
                FileExt::lock_exclusive(&file)
            } else {
                FileExt::lock_shared(&file)
            };
            match locked {
                Ok(()) => return Ok(KeyLockGuard { _file: file }),
                Err(err) if err.kind() == ErrorKind::Interrupted => {}
                Err(err) => return Err(err.into()),
            }
        }
    }

    fn read_value(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        match std::fs::read(self.key_to_fspath(key)) {
            Ok(value) => Ok(Some(Bytes::from(value))),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn write_value(&self, key: &StoreKey, value: &[u8]) -> Result<(), StorageError> {
        let path = self.key_to_fspath(key);
        // Only written while the exclusive key lock is held
        let tmp_path = self.key_to_lock_fspath(key, ".tmp");
        let mut file = File::create(&tmp_path)?;
        file.write_all(value)?;
        file.sync_all()?;
        std::fs::rename(&tmp_path, &path)?;
        Ok(())
    }
}

/// Encodes a key as a single file name.
///
/// The mapping is injective: `%` is always encoded, so an encoded sequence never collides with a literal one.
fn key_to_file_name(key: &StoreKey) -> String {
    let mut file_name = String::with_capacity(key.as_str().len());
    for (i, c) in key.as_str().char_indices() {
        match c {
            '%' => file_name.push_str("%25"),
            '/' => file_name.push_str("%2F"),
            '.' if i == 0 => file_name.push_str("%2E"),
            c => file_name.push(c),
        }
    }
    file_name
}

impl KeyValueStorageTraits for FilesystemStore {
    fn set_if_absent(&self, key: &StoreKey, value: Bytes) -> Result<bool, StorageError> {
        let _lock = self.lock_key(key, true)?;
        if self.read_value(key)?.is_some() {
            return Ok(false);
        }
        self.write_value(key, &value)?;
        Ok(true)
    }

    fn get(&self, key: &StoreKey) -> Result<MaybeBytes, StorageError> {
        let _lock = self.lock_key(key, false)?;
        self.read_value(key)
    }

    fn get_and_set(&self, key: &StoreKey, value: Bytes) -> Result<MaybeBytes, StorageError> {
        let _lock = self.lock_key(key, true)?;
        let previous = self.read_value(key)?;
        self.write_value(key, &value)?;
        Ok(previous)
    }

    fn compare_and_set(
        &self,
        key: &StoreKey,
        expected: &[u8],
        value: Bytes,
    ) -> Result<bool, StorageError> {
        let _lock = self.lock_key(key, true)?;
        match self.read_value(key)? {
            Some(current) if current.as_ref() == expected => {
                self.write_value(key, &value)?;
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
    #[cfg_attr(miri, ignore)]
    fn filesystem() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        crate::store_test::store_set_if_absent(&store)?;
        crate::store_test::store_get_and_set(&store)?;
        crate::store_test::store_compare_and_set(&store)?;
        crate::store_test::store_concurrent_set_if_absent(&store)?;
        crate::store_test::store_concurrent_get_and_set(&store)?;
        crate::store_test::store_related_keys(&store)?;
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn filesystem_key_file_names() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store = FilesystemStore::new(path.path())?;
        let data = path.path().join(DATA_DIRECTORY);
        for (key, file_name) in [
            ("product", "product"),
            ("product/42", "product%2F42"),
            ("/orders/42/", "%2Forders%2F42%2F"),
            ("100%", "100%25"),
            ("product%2F42", "product%252F42"),
            ("..", "%2E."),
            (".hidden.lock", "%2Ehidden.lock"),
        ] {
            assert_eq!(store.key_to_fspath(&key.try_into()?), data.join(file_name));
        }

        // A key and its "child" are both plain files
        let parent: StoreKey = "product".try_into()?;
        let child: StoreKey = "product/42".try_into()?;
        assert!(store.set_if_absent(&parent, Bytes::from_static(b"1000110000"))?);
        assert!(store.set_if_absent(&child, Bytes::from_static(b"1000110001"))?);
        assert!(store.key_to_fspath(&parent).is_file());
        assert!(store.key_to_fspath(&child).is_file());
        Ok(())
    }

    #[test]
    #[cfg_attr(miri, ignore)]
    fn filesystem_shared_directory() -> Result<(), Box<dyn Error>> {
        let path = tempfile::TempDir::new()?;
        let store_a = FilesystemStore::new(path.path())?;
        let store_b = FilesystemStore::new(path.path())?;
        let key: StoreKey = "product/42".try_into()?;

        assert!(store_a.set_if_absent(&key, Bytes::from_static(b"1000110000"))?);
        assert!(!store_b.set_if_absent(&key, Bytes::from_static(b"1000120005"))?);
        assert_eq!(
            store_b.get_and_set(&key, Bytes::from_static(b"1000125000"))?,
            Some(Bytes::from_static(b"1000110000"))
        );
        assert_eq!(store_a.get(&key)?, Some(Bytes::from_static(b"1000125000")));
        assert_eq!(
            std::fs::read(store_a.key_to_fspath(&key))?,
            b"1000125000".to_vec()
        );

        // Values persist across store instances
        drop(store_a);
        drop(store_b);
        let store = FilesystemStore::new(path.path())?;
        assert_eq!(store.get(&key)?, Some(Bytes::from_static(b"1000125000")));
        Ok(())
    }

    #[test]
    fn filesystem_existing_file() -> Result<(), Box<dyn Error>> {
        let file = tempfile::NamedTempFile::new()?;
        assert!(matches!(
            FilesystemStore::new(file.path()),
            Err(FilesystemStoreCreateError::ExistingFile(_))
        ));
        assert!(matches!(
            FilesystemStore::new(""),
            Err(FilesystemStoreCreateError::InvalidBaseDirectory(_))
        ));
        Ok(())
    }
}
