//! Remote entry store contract and implementations.
//!
//! Every operation is one independent, fallible round trip scoped to an
//! owner. Nothing here retries; retry policy belongs to the caller.

mod memory;
mod profiles;
mod rest;
mod supabase;

use std::future::Future;

use thiserror::Error;

use crate::models::{Entry, EntryChanges, EntryDraft, EntryId};

pub use memory::MemoryRemoteStore;
pub use profiles::SupabaseProfileStore;
pub use rest::SupabaseRestClient;
pub use supabase::SupabaseEntryStore;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Remote store is not configured for this build.")]
    NotConfigured,
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote API error: {0}")]
    Api(String),
    #[error("Remote store unavailable: {0}")]
    Unavailable(String),
    #[error("Invalid remote payload: {0}")]
    InvalidPayload(String),
    #[error("Entry not found: {0}")]
    NotFound(String),
    #[error("Entry {0} belongs to another user")]
    Unauthorized(String),
    #[error("Session rejected by the remote store: {0}. Sign in again.")]
    SessionRejected(String),
}

pub type RemoteResult<T> = Result<T, RemoteError>;

impl From<RemoteError> for crate::Error {
    fn from(error: RemoteError) -> Self {
        match error {
            RemoteError::NotFound(id) => Self::NotFound(id),
            RemoteError::Unauthorized(message) => Self::Unauthorized(message),
            other => Self::Remote(other.to_string()),
        }
    }
}

/// Network-backed CRUD over entries owned by an authenticated identity
pub trait RemoteStore: Send + Sync {
    /// All entries owned by `owner_user_id`, newest `created_at` first
    fn list(&self, owner_user_id: &str) -> impl Future<Output = RemoteResult<Vec<Entry>>> + Send;

    /// Insert one entry and return it with its server-assigned id
    fn insert_one(&self, draft: EntryDraft) -> impl Future<Output = RemoteResult<Entry>> + Send;

    /// Insert every draft or none of them
    fn insert_batch(
        &self,
        drafts: Vec<EntryDraft>,
    ) -> impl Future<Output = RemoteResult<Vec<Entry>>> + Send;

    /// Apply a partial update to an entry owned by `owner_user_id`
    fn update_one(
        &self,
        owner_user_id: &str,
        id: &EntryId,
        changes: EntryChanges,
    ) -> impl Future<Output = RemoteResult<Entry>> + Send;

    /// Delete an entry owned by `owner_user_id`
    fn delete_one(
        &self,
        owner_user_id: &str,
        id: &EntryId,
    ) -> impl Future<Output = RemoteResult<()>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_errors_map_to_core_kinds() {
        assert!(matches!(
            crate::Error::from(RemoteError::NotFound("x".into())),
            crate::Error::NotFound(_)
        ));
        assert!(matches!(
            crate::Error::from(RemoteError::Unauthorized("x".into())),
            crate::Error::Unauthorized(_)
        ));
        assert!(crate::Error::from(RemoteError::Unavailable("offline".into())).is_remote_failure());
    }
}
