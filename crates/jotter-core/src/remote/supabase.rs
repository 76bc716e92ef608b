//! Supabase (PostgREST) implementation of the remote entry store.

use reqwest::{Method, RequestBuilder};
use serde::Deserialize;

use super::{RemoteError, RemoteResult, RemoteStore, SupabaseRestClient};
use crate::models::{Entry, EntryChanges, EntryDraft, EntryId};

const OWNER_COLUMN: &str = "owner_user_id";

/// Entries table accessed through PostgREST.
///
/// Row-level security on the table is the real ownership boundary; the
/// owner filters sent here keep queries scoped even without it.
///
/// Under row-level security the follow-up ownership lookup after an
/// unmatched update or delete cannot see other users' rows either, so a
/// foreign id reports `NotFound`. `Unauthorized` only comes back when the
/// table has no such policy, or when the server answers 403.
#[derive(Clone)]
pub struct SupabaseEntryStore {
    client: SupabaseRestClient,
    table: String,
}

#[derive(Debug, Deserialize)]
struct RowOwner {
    owner_user_id: Option<String>,
}

impl SupabaseEntryStore {
    pub fn new(client: SupabaseRestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    fn list_request(&self, owner_user_id: &str) -> RequestBuilder {
        self.client.request(Method::GET, &self.table).query(&[
            ("select", "*".to_string()),
            (OWNER_COLUMN, eq(owner_user_id)),
            ("order", "created_at.desc".to_string()),
        ])
    }

    fn insert_request(&self, drafts: &[EntryDraft]) -> RequestBuilder {
        self.client
            .request(Method::POST, &self.table)
            .header("Prefer", "return=representation")
            .json(drafts)
    }

    fn owned_row_request(&self, method: Method, owner_user_id: &str, id: &EntryId) -> RequestBuilder {
        self.client
            .request(method, &self.table)
            .header("Prefer", "return=representation")
            .query(&[("id", eq(id.as_str())), (OWNER_COLUMN, eq(owner_user_id))])
    }

    /// Tell "no such row" apart from "row owned by someone else" after a
    /// scoped write matched nothing.
    async fn missing_row_error(&self, owner_user_id: &str, id: &EntryId) -> RemoteError {
        let lookup = self
            .client
            .request(Method::GET, &self.table)
            .query(&[
                ("select", format!("id,{OWNER_COLUMN}")),
                ("id", eq(id.as_str())),
            ]);

        classify_missing_row(
            self.client.send_rows::<RowOwner>(lookup).await,
            owner_user_id,
            id,
        )
    }
}

/// A failed ownership lookup is reported as that failure: an outage must
/// not read as "entry not found".
fn classify_missing_row(
    lookup: RemoteResult<Vec<RowOwner>>,
    owner_user_id: &str,
    id: &EntryId,
) -> RemoteError {
    match lookup {
        Ok(rows) => match rows.into_iter().next() {
            Some(row) if row.owner_user_id.as_deref() != Some(owner_user_id) => {
                RemoteError::Unauthorized(id.to_string())
            }
            _ => RemoteError::NotFound(id.to_string()),
        },
        Err(error) => {
            tracing::debug!("Ownership lookup for entry {} failed: {}", id, error);
            error
        }
    }
}

impl RemoteStore for SupabaseEntryStore {
    async fn list(&self, owner_user_id: &str) -> RemoteResult<Vec<Entry>> {
        self.client.send_rows(self.list_request(owner_user_id)).await
    }

    async fn insert_one(&self, draft: EntryDraft) -> RemoteResult<Entry> {
        let rows = self
            .client
            .send_rows::<Entry>(self.insert_request(std::slice::from_ref(&draft)))
            .await?;
        rows.into_iter().next().ok_or_else(|| {
            RemoteError::InvalidPayload("insert response did not include the new row".to_string())
        })
    }

    async fn insert_batch(&self, drafts: Vec<EntryDraft>) -> RemoteResult<Vec<Entry>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        // One POST of an array is one INSERT statement, so PostgREST commits
        // all rows or none.
        let rows = self
            .client
            .send_rows::<Entry>(self.insert_request(&drafts))
            .await?;
        if rows.len() != drafts.len() {
            return Err(RemoteError::InvalidPayload(format!(
                "batch insert returned {} rows for {} entries",
                rows.len(),
                drafts.len()
            )));
        }
        Ok(rows)
    }

    async fn update_one(
        &self,
        owner_user_id: &str,
        id: &EntryId,
        changes: EntryChanges,
    ) -> RemoteResult<Entry> {
        let request = self
            .owned_row_request(Method::PATCH, owner_user_id, id)
            .json(&changes);
        let rows = self.client.send_rows::<Entry>(request).await?;
        match rows.into_iter().next() {
            Some(entry) => Ok(entry),
            None => Err(self.missing_row_error(owner_user_id, id).await),
        }
    }

    async fn delete_one(&self, owner_user_id: &str, id: &EntryId) -> RemoteResult<()> {
        let request = self.owned_row_request(Method::DELETE, owner_user_id, id);
        let rows = self.client.send_rows::<serde_json::Value>(request).await?;
        if rows.is_empty() {
            return Err(self.missing_row_error(owner_user_id, id).await);
        }
        Ok(())
    }
}

fn eq(value: &str) -> String {
    format!("eq.{value}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SupabaseConfig;

    fn store() -> SupabaseEntryStore {
        let config = SupabaseConfig::new("https://demo.supabase.co", "anon").unwrap();
        SupabaseEntryStore::new(SupabaseRestClient::new(&config).unwrap(), "entries")
    }

    #[test]
    fn list_request_scopes_by_owner_newest_first() {
        let request = store().list_request("user-1").build().unwrap();
        let query = request.url().query().unwrap();
        assert!(query.contains("owner_user_id=eq.user-1"));
        assert!(query.contains("order=created_at.desc"));
    }

    #[test]
    fn owned_row_request_filters_id_and_owner() {
        let id = EntryId::from("abc");
        let request = store()
            .owned_row_request(Method::DELETE, "user-1", &id)
            .build()
            .unwrap();
        let query = request.url().query().unwrap();
        assert!(query.contains("id=eq.abc"));
        assert!(query.contains("owner_user_id=eq.user-1"));
        assert_eq!(request.headers()["Prefer"], "return=representation");
    }

    fn owned_by(owner: &str) -> RowOwner {
        RowOwner {
            owner_user_id: Some(owner.to_string()),
        }
    }

    #[test]
    fn failed_ownership_lookup_keeps_its_error() {
        let id = EntryId::from("abc");
        let outage = classify_missing_row(
            Err(RemoteError::Unavailable("connection reset".to_string())),
            "user-1",
            &id,
        );
        assert!(matches!(outage, RemoteError::Unavailable(message) if message == "connection reset"));

        let expired = classify_missing_row(
            Err(RemoteError::SessionRejected("JWT expired".to_string())),
            "user-1",
            &id,
        );
        assert!(matches!(expired, RemoteError::SessionRejected(_)));
    }

    #[test]
    fn ownership_lookup_separates_missing_from_foreign_rows() {
        let id = EntryId::from("abc");
        assert!(matches!(
            classify_missing_row(Ok(vec![owned_by("user-2")]), "user-1", &id),
            RemoteError::Unauthorized(_)
        ));
        assert!(matches!(
            classify_missing_row(Ok(Vec::new()), "user-1", &id),
            RemoteError::NotFound(_)
        ));
        // Row exists and is ours: it vanished between the write and the lookup
        assert!(matches!(
            classify_missing_row(Ok(vec![owned_by("user-1")]), "user-1", &id),
            RemoteError::NotFound(_)
        ));
    }

    #[test]
    fn insert_request_posts_json_array() {
        let draft = EntryDraft {
            title: "T".to_string(),
            content: "C".to_string(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
            owner_user_id: "user-1".to_string(),
        };
        let request = store().insert_request(&[draft]).build().unwrap();
        let body = request.body().and_then(|body| body.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_slice(body).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["owner_user_id"], "user-1");
        assert!(json[0].get("id").is_none());
    }
}
