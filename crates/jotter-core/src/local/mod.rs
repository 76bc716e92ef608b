//! Device-local storage for guest entries.
//!
//! Storage is a plain string key-value contract so the guest collection can
//! live in SQLite on desktop and CLI, or in memory for tests and throwaway
//! sessions.

mod guest;
mod memory;

use std::sync::Arc;

use crate::error::Result;

pub use guest::{GuestEntryStore, DEFAULT_GUEST_STORAGE_KEY};
pub use memory::MemoryKeyValueStore;

/// Namespaced string storage on the caller's device
pub trait KeyValueStore: Send + Sync {
    /// Read the value stored under `key`, if any
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Erase `key` entirely; erasing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        (**self).remove(key)
    }
}
