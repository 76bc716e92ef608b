//! Entries coordinator.
//!
//! One CRUD surface over two stores. The current identity decides which
//! store is active: signed out uses the guest collection on the device,
//! signed in uses the remote table scoped to that user. The first time a
//! user signs in with guest entries on the device, those entries are copied
//! to the remote store in one batch and then erased locally.
//!
//! The cached collection is the single source of truth for readers. It is
//! guarded by a short synchronous lock that is never held across an await.
//! Every identity change bumps an epoch, and remote results are only applied
//! if their epoch is still current, so a late response from a signed-out
//! session never lands in a guest cache.

mod listener;

use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::error::{Error, Result};
use crate::identity::IdentityState;
use crate::local::{GuestEntryStore, KeyValueStore};
use crate::models::{fresh_updated_at, Entry, EntryDraft, EntryId, EntryPatch, NewEntry};
use crate::remote::{RemoteError, RemoteStore};
use crate::util::now_utc;

pub use listener::IdentityListener;

/// Upper bound on batch rounds per migration. Each round picks up guest
/// entries created while the previous batch was in flight.
const MAX_MIGRATION_ROUNDS: usize = 3;

/// Which store serves CRUD calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageMode {
    Local,
    Remote { user_id: String },
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Local => f.write_str("local"),
            Self::Remote { user_id } => write!(f, "remote ({user_id})"),
        }
    }
}

/// Coordinator lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Phase {
    /// No identity state received yet
    #[default]
    Uninitialized,
    /// Guest collection is active. Also the resting state of a signed-in
    /// user whose migration failed and awaits a retry.
    LocalActive,
    /// Guest entries are being copied to `user_id`'s remote collection;
    /// CRUD still goes to the guest collection.
    Migrating { user_id: String },
    RemoteActive { user_id: String },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MigrationOutcome {
    pub migrated_count: usize,
}

impl MigrationOutcome {
    const fn none() -> Self {
        Self { migrated_count: 0 }
    }
}

#[derive(Debug, Default)]
struct State {
    phase: Phase,
    identity: Option<IdentityState>,
    epoch: u64,
    cache: Vec<Entry>,
    storage_fault: Option<String>,
}

impl State {
    fn mode(&self) -> Result<StorageMode> {
        match &self.phase {
            Phase::Uninitialized => Err(Error::NotInitialized),
            Phase::LocalActive | Phase::Migrating { .. } => Ok(StorageMode::Local),
            Phase::RemoteActive { user_id } => Ok(StorageMode::Remote {
                user_id: user_id.clone(),
            }),
        }
    }

    /// Whether the cache currently mirrors the guest collection
    const fn caches_guest_entries(&self) -> bool {
        matches!(self.phase, Phase::LocalActive | Phase::Migrating { .. })
    }

    fn index_of(&self, id: &EntryId) -> Result<usize> {
        self.cache
            .iter()
            .position(|entry| &entry.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// Work left over after an identity transition has been applied.
///
/// A pending load already counts towards `is_loading`, so there is no window
/// between the transition and the spawned load where the coordinator looks
/// idle with an empty cache.
#[derive(Debug)]
enum FollowUp {
    LoadRemote {
        user_id: String,
        epoch: u64,
        loading: LoadingGuard,
    },
    Migrate {
        user_id: String,
    },
}

/// Routes entry CRUD by identity and owns guest-to-remote migration.
pub struct EntriesCoordinator<K, R> {
    local: GuestEntryStore<K>,
    remote: Option<R>,
    state: Mutex<State>,
    migrating: AtomicBool,
    loading: Arc<AtomicUsize>,
}

impl<K: KeyValueStore, R: RemoteStore> EntriesCoordinator<K, R> {
    pub fn new(local: GuestEntryStore<K>, remote: R) -> Self {
        Self::build(local, Some(remote))
    }

    /// Coordinator without a remote store. Signed-in identities still switch
    /// to remote mode, where every call fails as not configured.
    pub fn local_only(local: GuestEntryStore<K>) -> Self {
        Self::build(local, None)
    }

    fn build(local: GuestEntryStore<K>, remote: Option<R>) -> Self {
        Self {
            local,
            remote,
            state: Mutex::new(State::default()),
            migrating: AtomicBool::new(false),
            loading: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub const fn guest_store(&self) -> &GuestEntryStore<K> {
        &self.local
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase.clone()
    }

    /// Active store, or `None` before the first identity state
    pub fn mode(&self) -> Option<StorageMode> {
        self.lock().mode().ok()
    }

    /// Last identity state applied
    pub fn identity(&self) -> Option<IdentityState> {
        self.lock().identity.clone()
    }

    /// True until the first identity state arrives, and while a remote
    /// collection load is pending or in flight.
    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::SeqCst) > 0 || self.lock().phase == Phase::Uninitialized
    }

    pub fn is_migrating(&self) -> bool {
        self.migrating.load(Ordering::SeqCst)
    }

    /// Most recent local storage fault, if any
    pub fn last_storage_fault(&self) -> Option<String> {
        self.lock().storage_fault.clone()
    }

    /// The cached collection, newest first.
    pub fn list(&self) -> Result<Vec<Entry>> {
        let state = self.lock();
        state.mode()?;
        Ok(state.cache.clone())
    }

    pub fn get(&self, id: &EntryId) -> Result<Entry> {
        let state = self.lock();
        state.mode()?;
        let index = state.index_of(id)?;
        Ok(state.cache[index].clone())
    }

    pub async fn create(&self, fields: NewEntry) -> Result<Entry> {
        let (user_id, epoch) = {
            let mut state = self.lock();
            match state.mode()? {
                StorageMode::Local => {
                    let entry = Entry::new_local(fields, now_utc());
                    state.cache.insert(0, entry.clone());
                    self.persist_guest_entries(&mut state);
                    tracing::debug!("Created guest entry {}", entry.id);
                    return Ok(entry);
                }
                StorageMode::Remote { user_id } => (user_id, state.epoch),
            }
        };

        let draft = EntryDraft::new(fields, &user_id, now_utc());
        let entry = self.remote()?.insert_one(draft).await?;
        self.apply_if_current(epoch, |state| state.cache.insert(0, entry.clone()));
        Ok(entry)
    }

    /// Replace the patched fields and refresh `updated_at`.
    pub async fn update(&self, id: &EntryId, patch: EntryPatch) -> Result<Entry> {
        let (user_id, epoch, prior) = {
            let mut state = self.lock();
            match state.mode()? {
                StorageMode::Local => {
                    let index = state.index_of(id)?;
                    state.cache[index].apply(patch, now_utc());
                    let entry = state.cache[index].clone();
                    self.persist_guest_entries(&mut state);
                    return Ok(entry);
                }
                StorageMode::Remote { user_id } => {
                    let prior = state
                        .index_of(id)
                        .ok()
                        .map(|index| state.cache[index].updated_at);
                    (user_id, state.epoch, prior)
                }
            }
        };

        let now = now_utc();
        let updated_at = prior.map_or(now, |prior| fresh_updated_at(prior, now));
        let entry = self
            .remote()?
            .update_one(&user_id, id, patch.into_changes(updated_at))
            .await?;
        self.apply_if_current(epoch, |state| {
            if let Some(slot) = state.cache.iter_mut().find(|cached| cached.id == entry.id) {
                slot.clone_from(&entry);
            }
        });
        Ok(entry)
    }

    pub async fn delete(&self, id: &EntryId) -> Result<()> {
        let (user_id, epoch) = {
            let mut state = self.lock();
            match state.mode()? {
                StorageMode::Local => {
                    let index = state.index_of(id)?;
                    state.cache.remove(index);
                    self.persist_guest_entries(&mut state);
                    return Ok(());
                }
                StorageMode::Remote { user_id } => (user_id, state.epoch),
            }
        };

        self.remote()?.delete_one(&user_id, id).await?;
        self.apply_if_current(epoch, |state| state.cache.retain(|entry| &entry.id != id));
        Ok(())
    }

    /// Reload the cache from the active store.
    ///
    /// A failed remote load keeps the previous cache and returns the error.
    pub async fn refresh(&self) -> Result<()> {
        let (user_id, epoch) = {
            let mut state = self.lock();
            match state.mode()? {
                StorageMode::Local => {
                    let entries = self.read_guest_entries(&mut state);
                    state.cache = entries;
                    return Ok(());
                }
                StorageMode::Remote { user_id } => (user_id, state.epoch),
            }
        };

        let _loading = self.enter_loading();
        let entries = self.fetch_remote(&user_id).await?;
        self.apply_if_current(epoch, |state| state.cache = entries);
        Ok(())
    }

    /// Apply an identity state and run whatever it triggers to completion.
    ///
    /// Returns the migration result when the state triggered one.
    pub async fn apply_identity(&self, next: IdentityState) -> Result<MigrationOutcome> {
        match self.transition(next) {
            Some(follow_up) => self.run_follow_up(follow_up).await,
            None => Ok(MigrationOutcome::none()),
        }
    }

    /// Copy every guest entry to the signed-in user's remote collection.
    ///
    /// Returns zero without touching either store when signed out, when
    /// there are no guest entries, or when a migration is already running.
    pub async fn migrate_guest_entries(&self) -> Result<MigrationOutcome> {
        let user_id = {
            let mut state = self.lock();
            let Some(user_id) = state
                .identity
                .as_ref()
                .and_then(IdentityState::user_id)
                .map(str::to_string)
            else {
                return Ok(MigrationOutcome::none());
            };
            if self.guest_snapshot(&mut state).is_empty() {
                tracing::debug!("No guest entries to migrate for {}", user_id);
                return Ok(MigrationOutcome::none());
            }
            user_id
        };
        self.migrate_for(&user_id).await
    }

    /// Synchronous half of an identity change: pick the phase, swap the
    /// cache, and report the async work still owed.
    fn transition(&self, next: IdentityState) -> Option<FollowUp> {
        let mut state = self.lock();

        if state.identity.as_ref() == Some(&next) {
            // A signed-in user parked in LocalActive has a failed migration
            // waiting; hearing the identity again is the retry signal.
            return match (&next, &state.phase) {
                (IdentityState::SignedIn { user_id }, Phase::LocalActive) => {
                    Some(FollowUp::Migrate {
                        user_id: user_id.clone(),
                    })
                }
                _ => None,
            };
        }

        state.identity = Some(next.clone());
        state.epoch += 1;

        match next {
            IdentityState::SignedOut => {
                state.phase = Phase::LocalActive;
                let entries = self.read_guest_entries(&mut state);
                state.cache = entries;
                tracing::info!(
                    "Signed out; serving {} guest entries",
                    state.cache.len()
                );
                None
            }
            IdentityState::SignedIn { user_id } => {
                let guest_entries = self.read_guest_entries(&mut state);
                if guest_entries.is_empty() {
                    tracing::info!("Signed in as {}; loading remote entries", user_id);
                    state.phase = Phase::RemoteActive {
                        user_id: user_id.clone(),
                    };
                    state.cache.clear();
                    Some(FollowUp::LoadRemote {
                        user_id,
                        epoch: state.epoch,
                        loading: self.enter_loading(),
                    })
                } else {
                    tracing::info!(
                        "Signed in as {} with {} guest entries to migrate",
                        user_id,
                        guest_entries.len()
                    );
                    state.phase = Phase::LocalActive;
                    state.cache = guest_entries;
                    Some(FollowUp::Migrate { user_id })
                }
            }
        }
    }

    async fn run_follow_up(&self, follow_up: FollowUp) -> Result<MigrationOutcome> {
        match follow_up {
            FollowUp::LoadRemote {
                user_id,
                epoch,
                loading,
            } => {
                self.load_remote(&user_id, epoch, loading).await;
                Ok(MigrationOutcome::none())
            }
            FollowUp::Migrate { user_id } => self.migrate_for(&user_id).await,
        }
    }

    async fn migrate_for(&self, user_id: &str) -> Result<MigrationOutcome> {
        let Some(_guard) = MigrationGuard::acquire(&self.migrating) else {
            tracing::debug!("Migration already in flight; ignoring trigger");
            return Ok(MigrationOutcome::none());
        };
        let remote = self.remote()?;

        let epoch = {
            let mut state = self.lock();
            if state.identity.as_ref().and_then(IdentityState::user_id) != Some(user_id) {
                return Ok(MigrationOutcome::none());
            }
            if state.phase == Phase::LocalActive {
                state.phase = Phase::Migrating {
                    user_id: user_id.to_string(),
                };
            }
            state.epoch
        };

        let mut migrated_count = 0;
        // Held from the switch to remote mode until the reload lands
        let mut loading = None;
        for round in 1..=MAX_MIGRATION_ROUNDS {
            let snapshot = {
                let mut state = self.lock();
                if state.epoch != epoch {
                    return Ok(MigrationOutcome { migrated_count });
                }
                let snapshot = self.guest_snapshot(&mut state);
                if snapshot.is_empty() {
                    if state.caches_guest_entries() {
                        self.switch_to_remote(&mut state, user_id);
                        loading = Some(self.enter_loading());
                    }
                    break;
                }
                snapshot
            };

            let drafts = snapshot
                .iter()
                .map(|entry| entry.to_draft(user_id))
                .collect();
            let inserted = match remote.insert_batch(drafts).await {
                Ok(inserted) => inserted,
                Err(error) => {
                    let mut state = self.lock();
                    if state.epoch == epoch && matches!(state.phase, Phase::Migrating { .. }) {
                        state.phase = Phase::LocalActive;
                    }
                    tracing::warn!(
                        "Guest migration for {} failed; guest entries kept: {}",
                        user_id,
                        error
                    );
                    return Err(error.into());
                }
            };
            migrated_count += inserted.len();
            tracing::info!(
                "Migrated {} guest entries to {} (round {})",
                inserted.len(),
                user_id,
                round
            );

            let migrated_ids: HashSet<EntryId> =
                snapshot.into_iter().map(|entry| entry.id).collect();
            {
                let mut state = self.lock();
                self.forget_migrated(&mut state, &migrated_ids);
                if state.epoch != epoch {
                    return Ok(MigrationOutcome { migrated_count });
                }
                if round == MAX_MIGRATION_ROUNDS {
                    tracing::warn!(
                        "Guest entries still arriving after {} rounds; the rest migrate on next sign-in",
                        MAX_MIGRATION_ROUNDS
                    );
                    self.switch_to_remote(&mut state, user_id);
                    loading = Some(self.enter_loading());
                }
            }
        }

        // Nothing was inserted and the active store did not change, so the
        // remote cache is still accurate.
        let loading = match loading {
            Some(loading) => loading,
            None if migrated_count > 0 => self.enter_loading(),
            None => return Ok(MigrationOutcome { migrated_count }),
        };
        self.load_remote(user_id, epoch, loading).await;
        Ok(MigrationOutcome { migrated_count })
    }

    /// The guest collection as it stands right now.
    fn guest_snapshot(&self, state: &mut State) -> Vec<Entry> {
        if state.caches_guest_entries() {
            state.cache.clone()
        } else {
            self.read_guest_entries(state)
        }
    }

    /// Drop entries confirmed remote from the guest collection, erasing the
    /// storage key once nothing is left.
    fn forget_migrated(&self, state: &mut State, migrated_ids: &HashSet<EntryId>) {
        let mut remaining = self.guest_snapshot(state);
        remaining.retain(|entry| !migrated_ids.contains(&entry.id));

        let persisted = if remaining.is_empty() {
            self.local.clear()
        } else {
            self.local.write(&remaining)
        };
        if let Err(error) = persisted {
            Self::record_storage_fault(state, &error);
        }

        if state.caches_guest_entries() {
            state.cache = remaining;
        }
    }

    fn switch_to_remote(&self, state: &mut State, user_id: &str) {
        if state.caches_guest_entries() {
            state.cache.clear();
        }
        state.phase = Phase::RemoteActive {
            user_id: user_id.to_string(),
        };
        tracing::info!("Now serving remote entries for {}", user_id);
    }

    /// Load the remote collection into the cache. Failures leave the cache
    /// as it was and are only logged. `is_loading` stays set until `_loading`
    /// is dropped on return.
    async fn load_remote(&self, user_id: &str, epoch: u64, _loading: LoadingGuard) {
        match self.fetch_remote(user_id).await {
            Ok(entries) => {
                let count = entries.len();
                if self.apply_if_current(epoch, |state| state.cache = entries) {
                    tracing::debug!("Loaded {} remote entries for {}", count, user_id);
                }
            }
            Err(error) => {
                tracing::warn!("Failed to load remote entries for {}: {}", user_id, error);
            }
        }
    }

    async fn fetch_remote(&self, user_id: &str) -> Result<Vec<Entry>> {
        Ok(self.remote()?.list(user_id).await?)
    }

    fn enter_loading(&self) -> LoadingGuard {
        LoadingGuard::enter(&self.loading)
    }

    fn remote(&self) -> Result<&R> {
        self.remote
            .as_ref()
            .ok_or_else(|| Error::from(RemoteError::NotConfigured))
    }

    fn read_guest_entries(&self, state: &mut State) -> Vec<Entry> {
        self.local.try_read().unwrap_or_else(|error| {
            Self::record_storage_fault(state, &error);
            Vec::new()
        })
    }

    fn persist_guest_entries(&self, state: &mut State) {
        if let Err(error) = self.local.write(&state.cache) {
            Self::record_storage_fault(state, &error);
        }
    }

    fn record_storage_fault(state: &mut State, error: &Error) {
        tracing::warn!("Guest storage fault: {}", error);
        state.storage_fault = Some(error.to_string());
    }

    /// Run `apply` against the state only if no identity change happened
    /// since `epoch` was read.
    fn apply_if_current(&self, epoch: u64, apply: impl FnOnce(&mut State)) -> bool {
        let mut state = self.lock();
        if state.epoch != epoch {
            tracing::debug!("Discarding remote result from a previous identity");
            return false;
        }
        apply(&mut state);
        true
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Holds the migration flag for the lifetime of one migration.
struct MigrationGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> MigrationGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for MigrationGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// One pending remote load. Owns its counter so it can travel inside a
/// spawned follow-up.
#[derive(Debug)]
struct LoadingGuard {
    counter: Arc<AtomicUsize>,
}

impl LoadingGuard {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self {
            counter: Arc::clone(counter),
        }
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}
