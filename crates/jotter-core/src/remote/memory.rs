//! In-process remote store.
//!
//! Behaves like the hosted table: server-assigned ids, per-owner isolation,
//! transactional batch inserts. Call counters and failure switches make it
//! usable as a test double.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::watch;
use uuid::Uuid;

use super::{RemoteError, RemoteResult, RemoteStore};
use crate::models::{Entry, EntryChanges, EntryDraft, EntryId};

#[derive(Clone)]
pub struct MemoryRemoteStore {
    inner: Arc<Inner>,
}

struct Inner {
    rows: Mutex<Vec<Entry>>,
    fail_all: AtomicBool,
    fail_batches: AtomicBool,
    batch_gate: watch::Sender<bool>,
    list_gate: watch::Sender<bool>,
    calls: CallCounters,
}

#[derive(Default)]
struct CallCounters {
    list: AtomicUsize,
    insert_one: AtomicUsize,
    insert_batch: AtomicUsize,
    update_one: AtomicUsize,
    delete_one: AtomicUsize,
}

impl Default for MemoryRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemoteStore {
    #[must_use]
    pub fn new() -> Self {
        let (batch_gate, _) = watch::channel(true);
        let (list_gate, _) = watch::channel(true);
        Self {
            inner: Arc::new(Inner {
                rows: Mutex::new(Vec::new()),
                fail_all: AtomicBool::new(false),
                fail_batches: AtomicBool::new(false),
                batch_gate,
                list_gate,
                calls: CallCounters::default(),
            }),
        }
    }

    /// Make every operation fail as if the network were down
    pub fn set_offline(&self, offline: bool) {
        self.inner.fail_all.store(offline, Ordering::SeqCst);
    }

    /// Make batch inserts fail while other operations keep working
    pub fn set_fail_batches(&self, fail: bool) {
        self.inner.fail_batches.store(fail, Ordering::SeqCst);
    }

    /// Hold batch inserts in flight until [`Self::resume_batches`]
    pub fn pause_batches(&self) {
        self.inner.batch_gate.send_replace(false);
    }

    pub fn resume_batches(&self) {
        self.inner.batch_gate.send_replace(true);
    }

    /// Hold collection loads in flight until [`Self::resume_lists`]
    pub fn pause_lists(&self) {
        self.inner.list_gate.send_replace(false);
    }

    pub fn resume_lists(&self) {
        self.inner.list_gate.send_replace(true);
    }

    /// Insert a row directly, bypassing counters and failure switches
    pub fn seed(&self, draft: EntryDraft) -> Entry {
        let entry = draft.into_entry(new_server_id());
        self.rows().push(entry.clone());
        entry
    }

    /// Snapshot of the rows owned by `owner_user_id`, newest first
    pub fn entries_for(&self, owner_user_id: &str) -> Vec<Entry> {
        let mut rows: Vec<Entry> = self
            .rows()
            .iter()
            .filter(|entry| entry.owner_user_id.as_deref() == Some(owner_user_id))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        rows
    }

    pub fn list_calls(&self) -> usize {
        self.inner.calls.list.load(Ordering::SeqCst)
    }

    pub fn insert_one_calls(&self) -> usize {
        self.inner.calls.insert_one.load(Ordering::SeqCst)
    }

    pub fn insert_batch_calls(&self) -> usize {
        self.inner.calls.insert_batch.load(Ordering::SeqCst)
    }

    /// Total number of operations attempted, failed ones included
    pub fn total_calls(&self) -> usize {
        let calls = &self.inner.calls;
        [
            &calls.list,
            &calls.insert_one,
            &calls.insert_batch,
            &calls.update_one,
            &calls.delete_one,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }

    fn rows(&self) -> MutexGuard<'_, Vec<Entry>> {
        self.inner.rows.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_online(&self) -> RemoteResult<()> {
        if self.inner.fail_all.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(
                "remote store is offline".to_string(),
            ));
        }
        Ok(())
    }

    /// Find the row index for `id`, enforcing ownership.
    fn owned_index(rows: &[Entry], owner_user_id: &str, id: &EntryId) -> RemoteResult<usize> {
        let index = rows
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| RemoteError::NotFound(id.to_string()))?;
        if rows[index].owner_user_id.as_deref() != Some(owner_user_id) {
            return Err(RemoteError::Unauthorized(id.to_string()));
        }
        Ok(index)
    }
}

impl RemoteStore for MemoryRemoteStore {
    async fn list(&self, owner_user_id: &str) -> RemoteResult<Vec<Entry>> {
        self.inner.calls.list.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.inner.list_gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(RemoteError::Unavailable("list gate closed".to_string()));
        }

        self.check_online()?;
        Ok(self.entries_for(owner_user_id))
    }

    async fn insert_one(&self, draft: EntryDraft) -> RemoteResult<Entry> {
        self.inner.calls.insert_one.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let entry = draft.into_entry(new_server_id());
        self.rows().push(entry.clone());
        Ok(entry)
    }

    async fn insert_batch(&self, drafts: Vec<EntryDraft>) -> RemoteResult<Vec<Entry>> {
        self.inner.calls.insert_batch.fetch_add(1, Ordering::SeqCst);

        let mut gate = self.inner.batch_gate.subscribe();
        let gate_open = gate.wait_for(|open| *open).await.is_ok();
        if !gate_open {
            return Err(RemoteError::Unavailable("batch gate closed".to_string()));
        }

        self.check_online()?;
        if self.inner.fail_batches.load(Ordering::SeqCst) {
            return Err(RemoteError::Unavailable(
                "batch insert rejected".to_string(),
            ));
        }

        let inserted: Vec<Entry> = drafts
            .into_iter()
            .map(|draft| draft.into_entry(new_server_id()))
            .collect();
        self.rows().extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn update_one(
        &self,
        owner_user_id: &str,
        id: &EntryId,
        changes: EntryChanges,
    ) -> RemoteResult<Entry> {
        self.inner.calls.update_one.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let mut rows = self.rows();
        let index = Self::owned_index(&rows, owner_user_id, id)?;
        changes.apply_to(&mut rows[index]);
        Ok(rows[index].clone())
    }

    async fn delete_one(&self, owner_user_id: &str, id: &EntryId) -> RemoteResult<()> {
        self.inner.calls.delete_one.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        let mut rows = self.rows();
        let index = Self::owned_index(&rows, owner_user_id, id)?;
        rows.remove(index);
        Ok(())
    }
}

fn new_server_id() -> EntryId {
    EntryId::from(Uuid::new_v4().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntryPatch, NewEntry};
    use crate::util::now_utc;
    use chrono::Duration;

    fn draft(title: &str, owner: &str) -> EntryDraft {
        EntryDraft::new(NewEntry::new(title, "body"), owner, now_utc())
    }

    #[tokio::test]
    async fn list_is_owner_scoped_and_newest_first() {
        let store = MemoryRemoteStore::new();
        let now = now_utc();
        store.seed(EntryDraft::new(
            NewEntry::new("old", "").created_at(now - Duration::days(2)),
            "alice",
            now,
        ));
        store.seed(EntryDraft::new(NewEntry::new("new", "").created_at(now), "alice", now));
        store.seed(draft("bob's", "bob"));

        let titles: Vec<String> = store
            .list("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|entry| entry.title)
            .collect();
        assert_eq!(titles, vec!["new", "old"]);
    }

    #[tokio::test]
    async fn failed_batch_inserts_nothing() {
        let store = MemoryRemoteStore::new();
        store.set_fail_batches(true);

        let result = store
            .insert_batch(vec![draft("a", "alice"), draft("b", "alice")])
            .await;
        assert!(matches!(result, Err(RemoteError::Unavailable(_))));
        assert!(store.entries_for("alice").is_empty());
        assert_eq!(store.insert_batch_calls(), 1);
    }

    #[tokio::test]
    async fn update_distinguishes_missing_from_foreign_rows() {
        let store = MemoryRemoteStore::new();
        let bobs = store.seed(draft("bob's", "bob"));
        let changes = EntryPatch::default().title("x").into_changes(now_utc());

        let foreign = store.update_one("alice", &bobs.id, changes.clone()).await;
        assert!(matches!(foreign, Err(RemoteError::Unauthorized(_))));

        let missing = store
            .update_one("alice", &EntryId::from("nope"), changes)
            .await;
        assert!(matches!(missing, Err(RemoteError::NotFound(_))));
    }

    #[tokio::test]
    async fn delete_removes_only_the_owned_row() {
        let store = MemoryRemoteStore::new();
        let mine = store.seed(draft("mine", "alice"));
        let theirs = store.seed(draft("theirs", "bob"));

        assert!(matches!(
            store.delete_one("alice", &theirs.id).await,
            Err(RemoteError::Unauthorized(_))
        ));
        store.delete_one("alice", &mine.id).await.unwrap();
        assert!(store.entries_for("alice").is_empty());
        assert_eq!(store.entries_for("bob").len(), 1);
    }

    #[tokio::test]
    async fn offline_store_counts_attempts() {
        let store = MemoryRemoteStore::new();
        store.set_offline(true);

        assert!(store.list("alice").await.is_err());
        assert!(store.insert_one(draft("a", "alice")).await.is_err());
        assert_eq!(store.total_calls(), 2);
    }
}
