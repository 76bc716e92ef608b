//! Data models for Jotter

mod entry;
mod profile;

pub use entry::{
    fresh_updated_at, Entry, EntryChanges, EntryDraft, EntryId, EntryPatch, NewEntry,
};
pub use profile::Profile;
