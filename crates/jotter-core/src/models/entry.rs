//! Journal entry model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque entry identifier.
///
/// Guest entries get a client-minted UUID v7 (time-sortable, unique within
/// the device). Remote entries carry whatever id the server assigned. The two
/// id spaces are never compared with each other.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Mint a new identifier for a guest entry
    #[must_use]
    pub fn new_local() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryId {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(crate::Error::InvalidInput(
                "entry id must not be empty".into(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl From<String> for EntryId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EntryId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A journal entry, either guest-local or remote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier within its collection
    pub id: EntryId,
    /// Title text, stored exactly as given
    pub title: String,
    /// Body text, stored exactly as given
    pub content: String,
    /// Caller-supplied creation time (may be backdated)
    pub created_at: DateTime<Utc>,
    /// Time of the last create or update
    pub updated_at: DateTime<Utc>,
    /// Owning identity; only set on remote entries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_user_id: Option<String>,
}

impl Entry {
    /// Build a guest entry with a freshly minted local id.
    #[must_use]
    pub fn new_local(fields: NewEntry, now: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new_local(),
            title: fields.title,
            content: fields.content,
            created_at: fields.created_at.unwrap_or(now),
            updated_at: now,
            owner_user_id: None,
        }
    }

    /// Apply a patch in place, stamping `updated_at` no earlier than before.
    pub fn apply(&mut self, patch: EntryPatch, now: DateTime<Utc>) {
        if let Some(title) = patch.title {
            self.title = title;
        }
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(created_at) = patch.created_at {
            self.created_at = created_at;
        }
        self.updated_at = fresh_updated_at(self.updated_at, now);
    }

    /// Strip the id and attach an owner, ready for a remote insert.
    #[must_use]
    pub fn to_draft(&self, owner_user_id: &str) -> EntryDraft {
        EntryDraft {
            title: self.title.clone(),
            content: self.content.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner_user_id: owner_user_id.to_string(),
        }
    }
}

/// Fields supplied by the caller when creating an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,
    pub content: String,
    /// Defaults to the time of creation when omitted
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl NewEntry {
    #[must_use]
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            created_at: None,
        }
    }

    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }
}

/// Partial replacement of an entry's caller-owned fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl EntryPatch {
    #[must_use]
    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    #[must_use]
    pub const fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// True when the patch would change nothing but `updated_at`
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none() && self.content.is_none() && self.created_at.is_none()
    }

    /// Remote form of this patch with the coordinator's `updated_at` stamp.
    #[must_use]
    pub fn into_changes(self, updated_at: DateTime<Utc>) -> EntryChanges {
        EntryChanges {
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at,
        }
    }
}

/// Id-less entry payload for remote inserts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryDraft {
    pub title: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub owner_user_id: String,
}

impl EntryDraft {
    #[must_use]
    pub fn new(fields: NewEntry, owner_user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            title: fields.title,
            content: fields.content,
            created_at: fields.created_at.unwrap_or(now),
            updated_at: now,
            owner_user_id: owner_user_id.to_string(),
        }
    }

    /// Materialize the draft under a server-assigned id.
    #[must_use]
    pub fn into_entry(self, id: EntryId) -> Entry {
        Entry {
            id,
            title: self.title,
            content: self.content,
            created_at: self.created_at,
            updated_at: self.updated_at,
            owner_user_id: Some(self.owner_user_id),
        }
    }
}

/// Partial remote update. `None` fields are left untouched by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryChanges {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl EntryChanges {
    /// Apply the changes to an entry in place.
    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(title) = &self.title {
            entry.title.clone_from(title);
        }
        if let Some(content) = &self.content {
            entry.content.clone_from(content);
        }
        if let Some(created_at) = self.created_at {
            entry.created_at = created_at;
        }
        entry.updated_at = self.updated_at;
    }
}

/// The new `updated_at` for an entry last touched at `prior`.
#[must_use]
pub fn fresh_updated_at(prior: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    now.max(prior)
}
