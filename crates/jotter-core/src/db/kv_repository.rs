//! SQLite-backed key-value store

use std::sync::{Mutex, PoisonError};

use rusqlite::{params, OptionalExtension};

use super::Database;
use crate::error::Result;
use crate::local::KeyValueStore;

/// `KeyValueStore` over the `kv_store` table of a local [`Database`]
pub struct SqliteKeyValueStore {
    db: Mutex<Database>,
}

impl SqliteKeyValueStore {
    /// Create a store that owns the given database
    pub const fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn db(&self) -> std::sync::MutexGuard<'_, Database> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KeyValueStore for SqliteKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db();
        let value = db
            .connection()
            .query_row(
                "SELECT value FROM kv_store WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        self.db().connection().execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.db()
            .connection()
            .execute("DELETE FROM kv_store WHERE key = ?", params![key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local::GuestEntryStore;
    use crate::models::{Entry, NewEntry};
    use crate::util::now_utc;
    use tempfile::tempdir;

    fn setup() -> SqliteKeyValueStore {
        SqliteKeyValueStore::new(Database::open_in_memory().unwrap())
    }

    #[test]
    fn test_get_missing_key() {
        let store = setup();
        assert_eq!(store.get("missing").unwrap(), None);
    }

    #[test]
    fn test_set_overwrites() {
        let store = setup();
        store.set("key", "one").unwrap();
        store.set("key", "two").unwrap();
        assert_eq!(store.get("key").unwrap().as_deref(), Some("two"));
    }

    #[test]
    fn test_remove() {
        let store = setup();
        store.set("key", "one").unwrap();
        store.remove("key").unwrap();
        store.remove("key").unwrap(); // Missing key is fine
        assert_eq!(store.get("key").unwrap(), None);
    }

    #[test]
    fn test_guest_entries_survive_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("jotter.db");
        let entry = Entry::new_local(NewEntry::new("Kept", "On disk"), now_utc());

        {
            let guest =
                GuestEntryStore::new(SqliteKeyValueStore::new(Database::open(&db_path).unwrap()));
            guest.write(std::slice::from_ref(&entry)).unwrap();
        }

        let guest =
            GuestEntryStore::new(SqliteKeyValueStore::new(Database::open(&db_path).unwrap()));
        assert_eq!(guest.read(), vec![entry]);
    }
}
