//! jotter-core - Core library for Jotter
//!
//! Journal entries that live on the device while signed out and in a
//! Supabase table while signed in. The [`EntriesCoordinator`] routes CRUD by
//! identity and migrates guest entries the first time a user signs in.

pub mod auth;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod export;
pub mod identity;
pub mod local;
pub mod models;
pub mod remote;
pub mod util;

pub use coordinator::{EntriesCoordinator, IdentityListener, MigrationOutcome, Phase, StorageMode};
pub use error::{Error, Result};
pub use identity::{IdentityHub, IdentitySource, IdentityState, IdentitySubscription};
pub use models::{Entry, EntryId, EntryPatch, NewEntry};
