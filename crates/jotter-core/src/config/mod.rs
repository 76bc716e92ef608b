//! Client configuration.
//!
//! `SupabaseConfig` locates the hosted project used for auth and the remote
//! entry store. `StoreConfig` names the tables and the local storage key.
//! Both are safe-to-ship public values; secrets never belong here.

use serde::{Deserialize, Serialize};

use crate::local::DEFAULT_GUEST_STORAGE_KEY;
use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_ENTRIES_TABLE: &str = "entries";
const DEFAULT_PROFILES_TABLE: &str = "profiles";

/// Supabase project URL and anon/public key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct SupabaseConfig {
    pub url: String,
    pub anon_key: String,
}

impl SupabaseConfig {
    /// Validate and normalize a project URL and key.
    pub fn new(url: impl AsRef<str>, anon_key: impl AsRef<str>) -> Result<Self, String> {
        let url = normalize_project_url(url.as_ref())?;
        let anon_key = anon_key.as_ref().trim();
        if anon_key.is_empty() {
            return Err("Supabase anon key must not be empty".to_string());
        }
        Ok(Self {
            url,
            anon_key: anon_key.to_string(),
        })
    }

    /// Build from optional parts: both absent means "not configured",
    /// exactly one present is an error.
    pub fn resolve(url: Option<String>, anon_key: Option<String>) -> Result<Option<Self>, String> {
        match (normalize_text_option(url), normalize_text_option(anon_key)) {
            (None, None) => Ok(None),
            (Some(url), Some(anon_key)) => Self::new(url, anon_key).map(Some),
            (Some(_), None) => Err("SUPABASE_ANON_KEY is required with SUPABASE_URL".to_string()),
            (None, Some(_)) => Err("SUPABASE_URL is required with SUPABASE_ANON_KEY".to_string()),
        }
    }

    /// Read `SUPABASE_URL` / `SUPABASE_ANON_KEY` from the environment.
    pub fn from_env() -> Result<Option<Self>, String> {
        Self::resolve(
            std::env::var("SUPABASE_URL").ok(),
            std::env::var("SUPABASE_ANON_KEY").ok(),
        )
    }

    /// GoTrue auth endpoint base
    pub fn auth_url(&self) -> String {
        format!("{}/auth/v1", self.url)
    }

    /// PostgREST endpoint base
    pub fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }
}

/// Table names and the local storage key used by the entries engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields, default)]
pub struct StoreConfig {
    pub entries_table: String,
    pub profiles_table: String,
    pub guest_storage_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            entries_table: DEFAULT_ENTRIES_TABLE.to_string(),
            profiles_table: DEFAULT_PROFILES_TABLE.to_string(),
            guest_storage_key: DEFAULT_GUEST_STORAGE_KEY.to_string(),
        }
    }
}

impl StoreConfig {
    /// Defaults overridden by `JOTTER_ENTRIES_TABLE`, `JOTTER_PROFILES_TABLE`
    /// and `JOTTER_GUEST_KEY` when set.
    pub fn from_env() -> Self {
        Self::default().with_overrides(
            std::env::var("JOTTER_ENTRIES_TABLE").ok(),
            std::env::var("JOTTER_PROFILES_TABLE").ok(),
            std::env::var("JOTTER_GUEST_KEY").ok(),
        )
    }

    #[must_use]
    pub fn with_overrides(
        mut self,
        entries_table: Option<String>,
        profiles_table: Option<String>,
        guest_storage_key: Option<String>,
    ) -> Self {
        if let Some(value) = normalize_text_option(entries_table) {
            self.entries_table = value;
        }
        if let Some(value) = normalize_text_option(profiles_table) {
            self.profiles_table = value;
        }
        if let Some(value) = normalize_text_option(guest_storage_key) {
            self.guest_storage_key = value;
        }
        self
    }

    /// Parse a JSON store config, filling omitted fields with defaults.
    pub fn parse(payload: &str) -> Result<Self, String> {
        let config: Self = serde_json::from_str(payload)
            .map_err(|error| format!("invalid store config JSON: {error}"))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("entries_table", &self.entries_table),
            ("profiles_table", &self.profiles_table),
            ("guest_storage_key", &self.guest_storage_key),
        ] {
            if value.trim().is_empty() {
                return Err(format!("store config field '{field}' must not be empty"));
            }
        }
        Ok(())
    }
}

/// Trim a project URL and strip any trailing service path.
fn normalize_project_url(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err("Supabase URL must not be empty".to_string());
    }
    if !is_http_url(trimmed) {
        return Err("Supabase URL must include http:// or https://".to_string());
    }
    let base = trimmed
        .strip_suffix("/auth/v1")
        .or_else(|| trimmed.strip_suffix("/rest/v1"))
        .unwrap_or(trimmed);
    Ok(base.to_string())
}
