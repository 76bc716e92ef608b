//! Supabase auth client.
//!
//! Wraps the GoTrue password flow and keeps three things in step with the
//! session: the persisted copy, the bearer token on the shared PostgREST
//! client, and the [`IdentityHub`] the entries coordinator listens to.

use std::fmt;

use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::SupabaseConfig;
use crate::identity::{IdentityHub, IdentityState};
use crate::models::Profile;
use crate::remote::{SupabaseProfileStore, SupabaseRestClient};
use crate::util::{compact_text, normalize_text_option, unix_timestamp_now};

const EXPIRY_SKEW_SECONDS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.expires_at <= unix_timestamp_now() + EXPIRY_SKEW_SECONDS
    }

    pub fn identity(&self) -> IdentityState {
        IdentityState::signed_in(self.user.id.clone())
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Supabase auth is not configured.")]
    NotConfigured,
    #[error("Invalid auth configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Profile setup failed: {0}")]
    Profile(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    identity: Option<IdentityHub>,
    rest: Option<SupabaseRestClient>,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(config: &SupabaseConfig, store: S) -> AuthResult<Self> {
        Ok(Self {
            auth_url: config.auth_url(),
            anon_key: config.anon_key.clone(),
            client: Client::builder().build()?,
            store,
            identity: None,
            rest: None,
        })
    }

    /// Publish every session change to `hub`.
    #[must_use]
    pub fn with_identity(mut self, hub: IdentityHub) -> Self {
        self.identity = Some(hub);
        self
    }

    /// Keep the bearer token of `rest` (and its clones) in step with the session.
    #[must_use]
    pub fn with_rest_client(mut self, rest: SupabaseRestClient) -> Self {
        self.rest = Some(rest);
        self
    }

    pub fn auth_url(&self) -> &str {
        &self.auth_url
    }

    /// Load the persisted session, refreshing it when expired.
    ///
    /// Announces the outcome either way, so a listener learns the startup
    /// identity from this call.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored_session) = self.store.load_session()? else {
            self.announce(None);
            return Ok(None);
        };

        if !stored_session.is_expired() {
            self.announce(Some(&stored_session));
            return Ok(Some(stored_session));
        }

        match self.refresh_session(&stored_session.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Failed to refresh persisted session: {}", error);
                self.store.clear_session()?;
                self.announce(None);
                Ok(None)
            }
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/signup", self.auth_url))
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        match response.into_session()? {
            Some(session) => {
                self.store.save_session(&session)?;
                self.announce(Some(&session));
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    /// Sign up and create the user's profile row.
    ///
    /// The profile can only be written with a live session, so accounts that
    /// still need email confirmation get their row on first sign-in instead
    /// (see [`Self::ensure_profile`]).
    pub async fn sign_up_with_profile(
        &self,
        email: &str,
        password: &str,
        username: Option<String>,
        profiles: &SupabaseProfileStore,
    ) -> AuthResult<SignUpOutcome> {
        let outcome = self.sign_up(email, password).await?;
        if let SignUpOutcome::SignedIn(session) = &outcome {
            let profile = Profile {
                id: session.user.id.clone(),
                username: normalize_text_option(username),
            };
            profiles
                .create(&profile)
                .await
                .map_err(|error| AuthError::Profile(error.to_string()))?;
            tracing::info!("Created profile for user {}", session.user.id);
        }
        Ok(outcome)
    }

    /// Fetch the profile for `session`, creating an empty one if missing.
    pub async fn ensure_profile(
        &self,
        session: &AuthSession,
        profiles: &SupabaseProfileStore,
    ) -> AuthResult<Profile> {
        let existing = profiles
            .fetch(&session.user.id)
            .await
            .map_err(|error| AuthError::Profile(error.to_string()))?;
        if let Some(profile) = existing {
            return Ok(profile);
        }
        profiles
            .create(&Profile {
                id: session.user.id.clone(),
                username: None,
            })
            .await
            .map_err(|error| AuthError::Profile(error.to_string()))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        validate_credentials(email, password)?;

        let payload = serde_json::json!({
            "email": email,
            "password": password,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "password")])
                .json(&payload),
        );

        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Sign-in response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        self.announce(Some(&session));
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        if refresh_token.trim().is_empty() {
            return Err(AuthError::InvalidConfiguration(
                "Refresh token must not be empty".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "refresh_token": refresh_token,
        });
        let request = self.public_request(
            self.client
                .post(format!("{}/token", self.auth_url))
                .query(&[("grant_type", "refresh_token")])
                .json(&payload),
        );
        let response = self.send_auth_request(request).await?;
        let session = response.into_session()?.ok_or_else(|| {
            AuthError::Api("Refresh response did not include an active session".to_string())
        })?;

        self.store.save_session(&session)?;
        self.announce(Some(&session));
        Ok(session)
    }

    /// Revoke the session server-side and forget it locally.
    ///
    /// An already-expired token (401) still counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let request = self
            .client
            .post(format!("{}/logout", self.auth_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token);

        let response = request.send().await?;
        if !(response.status().is_success() || response.status() == StatusCode::UNAUTHORIZED) {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }

        self.store.clear_session()?;
        self.announce(None);
        Ok(())
    }

    fn announce(&self, session: Option<&AuthSession>) {
        if let Some(rest) = &self.rest {
            rest.set_access_token(session.map(|session| session.access_token.clone()));
        }
        if let Some(hub) = &self.identity {
            hub.publish(session.map_or(IdentityState::SignedOut, AuthSession::identity));
        }
    }

    fn public_request(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.anon_key)
            .header("Authorization", format!("Bearer {}", self.anon_key))
    }

    async fn send_auth_request(&self, request: RequestBuilder) -> AuthResult<SupabaseAuthResponse> {
        let response = request.send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json::<SupabaseAuthResponse>().await?)
    }
}

fn validate_credentials(email: &str, password: &str) -> AuthResult<()> {
    if email.trim().is_empty() {
        return Err(AuthError::Api("Email is required".to_string()));
    }
    if password.trim().is_empty() {
        return Err(AuthError::Api("Password is required".to_string()));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
    session: Option<SupabaseAuthResponseSession>,
}

impl SupabaseAuthResponse {
    // GoTrue returns the session either flat or nested under `session`
    // depending on the endpoint.
    fn into_session(self) -> AuthResult<Option<AuthSession>> {
        let nested = self.session;
        let access_token = self
            .access_token
            .or_else(|| nested.as_ref().and_then(|session| session.access_token.clone()));
        let refresh_token = self
            .refresh_token
            .or_else(|| nested.as_ref().and_then(|session| session.refresh_token.clone()));
        let expires_in = self
            .expires_in
            .or_else(|| nested.as_ref().and_then(|session| session.expires_in));
        let expires_at = self
            .expires_at
            .or_else(|| nested.as_ref().and_then(|session| session.expires_at))
            .or_else(|| expires_in.map(|seconds| unix_timestamp_now().saturating_add(seconds)));
        let user = self
            .user
            .or_else(|| nested.and_then(|session| session.user))
            .map(Into::into);

        match (access_token, refresh_token, expires_at, user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "Auth response did not include enough session fields".to_string(),
            )),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseAuthResponseSession {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<SupabaseUser>,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl From<SupabaseUser> for AuthUser {
    fn from(value: SupabaseUser) -> Self {
        Self {
            id: value.id,
            email: value.email,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SupabaseErrorResponse {
    error: Option<String>,
    error_description: Option<String>,
    message: Option<String>,
    msg: Option<String>,
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<SupabaseErrorResponse>(body) {
        if let Some(message) = payload
            .message
            .or(payload.msg)
            .or(payload.error_description)
            .or(payload.error)
        {
            return format!("{} ({})", message.trim(), status.as_u16());
        }
    }

    let trimmed = compact_text(body);
    if trimmed.is_empty() {
        format!("HTTP {}", status.as_u16())
    } else {
        format!("{} ({})", trimmed, status.as_u16())
    }
}
