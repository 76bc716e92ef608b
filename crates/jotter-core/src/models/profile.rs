//! User profile model

use serde::{Deserialize, Serialize};

/// Public profile row created alongside a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth user
    pub id: String,
    /// Display name chosen at sign-up
    #[serde(default)]
    pub username: Option<String>,
}

impl Profile {
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: Some(username.into()),
        }
    }

    /// Username to show, falling back to the given label
    #[must_use]
    pub fn display_name<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_name_falls_back_when_blank() {
        let profile = Profile {
            id: "user".to_string(),
            username: Some("  ".to_string()),
        };
        assert_eq!(profile.display_name("someone"), "someone");
        assert_eq!(Profile::new("user", "ada").display_name("someone"), "ada");
    }
}
