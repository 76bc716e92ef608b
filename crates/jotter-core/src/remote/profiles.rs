//! Supabase profiles table access

use reqwest::Method;

use super::{RemoteError, RemoteResult, SupabaseRestClient};
use crate::models::Profile;

#[derive(Clone)]
pub struct SupabaseProfileStore {
    client: SupabaseRestClient,
    table: String,
}

impl SupabaseProfileStore {
    pub fn new(client: SupabaseRestClient, table: impl Into<String>) -> Self {
        Self {
            client,
            table: table.into(),
        }
    }

    /// Fetch the profile for `user_id`; `None` when no row exists yet.
    pub async fn fetch(&self, user_id: &str) -> RemoteResult<Option<Profile>> {
        let request = self
            .client
            .request(Method::GET, &self.table)
            .query(&[("select", "*".to_string()), ("id", format!("eq.{user_id}"))]);
        let rows = self.client.send_rows::<Profile>(request).await?;
        Ok(rows.into_iter().next())
    }

    /// Create the profile row for a freshly signed-up user.
    pub async fn create(&self, profile: &Profile) -> RemoteResult<Profile> {
        let request = self
            .client
            .request(Method::POST, &self.table)
            .header("Prefer", "return=representation")
            .json(std::slice::from_ref(profile));
        let rows = self.client.send_rows::<Profile>(request).await?;
        rows.into_iter().next().ok_or_else(|| {
            RemoteError::InvalidPayload("profile insert returned no row".to_string())
        })
    }
}
