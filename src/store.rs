//! Key-value stores.
//!
//! - [`MemoryStore`]: an in-memory store, useful for tests and for coordinating threads within one process.
//! - [`FilesystemStore`] (unix): a store in a directory, shareable by independent processes on the same host or a shared filesystem with `flock` support.

mod memory_store;
pub use memory_store::MemoryStore;

#[cfg(unix)]
mod filesystem_store;
#[cfg(unix)]
pub use filesystem_store::{FilesystemStore, FilesystemStoreCreateError};
