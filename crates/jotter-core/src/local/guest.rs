//! Guest entry collection persisted as one serialized list

use super::KeyValueStore;
use crate::error::{Error, Result};
use crate::models::Entry;

/// Storage key the guest collection lives under unless configured otherwise
pub const DEFAULT_GUEST_STORAGE_KEY: &str = "guest_entries";

/// Local adapter for the guest collection.
///
/// The whole collection is one JSON array under a single key that nothing
/// else writes.
#[derive(Debug, Clone)]
pub struct GuestEntryStore<K> {
    store: K,
    key: String,
}

impl<K: KeyValueStore> GuestEntryStore<K> {
    /// Create an adapter over `store` using the default key
    pub fn new(store: K) -> Self {
        Self::with_key(store, DEFAULT_GUEST_STORAGE_KEY)
    }

    /// Create an adapter over `store` using a custom key
    pub fn with_key(store: K, key: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
        }
    }

    /// The storage key holding the collection
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The underlying key-value store
    pub const fn store(&self) -> &K {
        &self.store
    }

    /// Read the collection in persisted order.
    ///
    /// Never fails: missing data reads as empty, and unreadable data reads as
    /// empty after logging the fault.
    pub fn read(&self) -> Vec<Entry> {
        self.try_read().unwrap_or_else(|error| {
            tracing::warn!("Guest entries unreadable, starting empty: {}", error);
            Vec::new()
        })
    }

    /// Read the collection, surfacing storage and decode faults.
    pub fn try_read(&self) -> Result<Vec<Entry>> {
        let Some(raw) = self.store.get(&self.key)? else {
            return Ok(Vec::new());
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_str(&raw).map_err(|error| {
            Error::Storage(format!(
                "guest entries under '{}' are corrupt: {error}",
                self.key
            ))
        })
    }

    /// Replace the persisted collection.
    pub fn write(&self, entries: &[Entry]) -> Result<()> {
        let serialized = serde_json::to_string(entries)?;
        self.store.set(&self.key, &serialized)
    }

    /// Empty the collection, then erase the key entirely.
    pub fn clear(&self) -> Result<()> {
        self.write(&[])?;
        self.store.remove(&self.key)
    }

    /// The raw persisted payload, if any
    pub fn raw(&self) -> Result<Option<String>> {
        self.store.get(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::MemoryKeyValueStore;
    use crate::models::NewEntry;
    use crate::util::now_utc;
    use pretty_assertions::assert_eq;

    fn entry(title: &str) -> Entry {
        Entry::new_local(NewEntry::new(title, "body"), now_utc())
    }

    #[test]
    fn read_missing_key_is_empty() {
        let guest = GuestEntryStore::new(MemoryKeyValueStore::new());
        assert!(guest.read().is_empty());
        assert!(guest.try_read().unwrap().is_empty());
    }

    #[test]
    fn write_then_read_preserves_order() {
        let guest = GuestEntryStore::new(MemoryKeyValueStore::new());
        let entries = vec![entry("second"), entry("first")];

        guest.write(&entries).unwrap();
        assert_eq!(guest.read(), entries);
    }

    #[test]
    fn corrupt_payload_reads_empty_but_reports() {
        let store = MemoryKeyValueStore::new();
        store.set(DEFAULT_GUEST_STORAGE_KEY, "{not json").unwrap();
        let guest = GuestEntryStore::new(store);

        assert!(guest.read().is_empty());
        assert!(matches!(guest.try_read(), Err(Error::Storage(_))));
    }

    #[test]
    fn clear_erases_key() {
        let store = MemoryKeyValueStore::new();
        let guest = GuestEntryStore::new(store.clone());
        guest.write(&[entry("one")]).unwrap();

        guest.clear().unwrap();
        assert!(!store.contains_key(DEFAULT_GUEST_STORAGE_KEY));
        assert!(guest.read().is_empty());
    }

    #[test]
    fn custom_key_is_respected() {
        let store = MemoryKeyValueStore::new();
        let guest = GuestEntryStore::with_key(store.clone(), "journal.guest");
        guest.write(&[entry("one")]).unwrap();

        assert!(store.contains_key("journal.guest"));
        assert!(!store.contains_key(DEFAULT_GUEST_STORAGE_KEY));
    }
}
