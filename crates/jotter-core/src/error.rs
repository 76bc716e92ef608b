//! Error types for jotter-core

use thiserror::Error;

/// Result type alias using jotter-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in jotter-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Local storage fault (read, write, or erase of the guest collection)
    #[error("Storage error: {0}")]
    Storage(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote store fault (network, server, or malformed payload)
    #[error("Remote store error: {0}")]
    Remote(String),

    /// Entry not found
    #[error("Entry not found: {0}")]
    NotFound(String),

    /// Entry exists but is not owned by the current identity
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// CRUD was attempted before the first identity state arrived
    #[error("Entries are not loaded yet")]
    NotInitialized,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error came from the remote store and may succeed on retry.
    #[must_use]
    pub const fn is_remote_failure(&self) -> bool {
        matches!(self, Self::Remote(_))
    }
}
