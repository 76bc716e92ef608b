use std::env;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use chrono::{DateTime, NaiveDate, Utc};
use jotter_core::config::StoreConfig;
use jotter_core::db::{Database, SqliteKeyValueStore};
use jotter_core::local::GuestEntryStore;
use jotter_core::remote::{SupabaseEntryStore, SupabaseProfileStore, SupabaseRestClient};
use jotter_core::{
    EntriesCoordinator, Entry, EntryId, IdentityHub, IdentitySource, IdentityState,
    MigrationOutcome,
};
use serde::Serialize;

use crate::auth::SupabaseAuthService;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

pub type CliCoordinator = EntriesCoordinator<SqliteKeyValueStore, SupabaseEntryStore>;

/// Everything a command needs: the coordinator plus, when the profile has a
/// Supabase project, the auth service feeding it.
pub struct AppContext {
    pub coordinator: CliCoordinator,
    pub profile_name: String,
    pub remote: Option<RemoteContext>,
}

pub struct RemoteContext {
    pub hub: IdentityHub,
    pub auth: SupabaseAuthService,
    pub profiles: SupabaseProfileStore,
}

impl AppContext {
    pub fn require_remote(&self) -> Result<&RemoteContext, CliError> {
        self.remote.as_ref().ok_or(CliError::RemoteNotConfigured)
    }

    /// Hand the coordinator whatever identity the hub holds now.
    ///
    /// A failed migration leaves guest entries in place; it is reported and
    /// retried on the next run.
    pub async fn sync_identity(&self) -> MigrationOutcome {
        let identity = self
            .remote
            .as_ref()
            .map_or(IdentityState::SignedOut, |remote| remote.hub.current());
        match self.coordinator.apply_identity(identity).await {
            Ok(outcome) => {
                if outcome.migrated_count > 0 {
                    tracing::info!("Moved {} guest entries into the account", outcome.migrated_count);
                }
                outcome
            }
            Err(error) => {
                tracing::warn!("Could not switch storage for the current identity: {}", error);
                MigrationOutcome::default()
            }
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EntryListItem {
    pub id: String,
    pub title: String,
    pub preview: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
    pub relative_time: String,
}

/// Open the local database, wire up Supabase when configured, and apply the
/// restored identity.
pub async fn open_context(db_path: &Path, profile: Option<&str>) -> Result<AppContext, CliError> {
    let config = CliProfilesConfig::load().map_err(CliError::Config)?;
    let profile_name = config.resolve_profile_name(profile);
    let supabase = config
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .supabase_config()
        .map_err(CliError::Config)?;
    let store_config = StoreConfig::from_env();

    let database = Database::open(db_path)?;
    let local = GuestEntryStore::with_key(
        SqliteKeyValueStore::new(database),
        store_config.guest_storage_key.clone(),
    );

    let Some(supabase) = supabase else {
        let context = AppContext {
            coordinator: EntriesCoordinator::local_only(local),
            profile_name,
            remote: None,
        };
        context.sync_identity().await;
        return Ok(context);
    };

    let rest = SupabaseRestClient::new(&supabase).map_err(jotter_core::Error::from)?;
    let entries = SupabaseEntryStore::new(rest.clone(), store_config.entries_table.clone());
    let profiles = SupabaseProfileStore::new(rest.clone(), store_config.profiles_table.clone());
    let hub = IdentityHub::default();
    let auth = SupabaseAuthService::new(&profile_name, &supabase, hub.clone(), rest)
        .map_err(|error| CliError::Auth(error.to_string()))?;

    if let Err(error) = auth.restore_session().await {
        tracing::warn!("Failed to restore session for profile '{}': {}", profile_name, error);
    }

    let context = AppContext {
        coordinator: EntriesCoordinator::new(local, entries),
        profile_name,
        remote: Some(RemoteContext {
            hub,
            auth,
            profiles,
        }),
    };
    context.sync_identity().await;
    Ok(context)
}

/// Find an entry by exact id, then by unique id prefix.
pub fn resolve_entry(entry_query: &str, coordinator: &CliCoordinator) -> Result<Entry, CliError> {
    if let Ok(entry) = coordinator.get(&EntryId::from(entry_query)) {
        return Ok(entry);
    }

    let mut matching = coordinator
        .list()?
        .into_iter()
        .filter(|entry| entry.id.as_str().starts_with(entry_query))
        .collect::<Vec<Entry>>();

    match matching.len() {
        0 => Err(CliError::EntryNotFound(entry_query.to_string())),
        1 => Ok(matching.remove(0)),
        _ => {
            let options = matching
                .iter()
                .take(3)
                .map(|entry| short_id(&entry.id))
                .collect::<Vec<_>>()
                .join(", ");

            Err(CliError::AmbiguousEntryId(format!(
                "ID prefix '{entry_query}' is ambiguous; matches: {options}"
            )))
        }
    }
}

pub fn format_entry_lines(entries: &[Entry]) -> Vec<String> {
    let now_ms = Utc::now().timestamp_millis();
    entries
        .iter()
        .map(|entry| {
            let id = short_id(&entry.id);
            let date = entry.created_at.format("%Y-%m-%d");
            let preview = entry_preview(entry, 40);
            let relative_time = format_relative_time(entry.updated_at.timestamp_millis(), now_ms);
            format!("{id:<13}  {date}  {preview:<40}  {relative_time}")
        })
        .collect()
}

pub fn entry_to_list_item(entry: &Entry) -> EntryListItem {
    let now_ms = Utc::now().timestamp_millis();
    EntryListItem {
        id: entry.id.to_string(),
        title: entry.title.clone(),
        preview: entry_preview(entry, 80),
        content: entry.content.clone(),
        created_at: entry.created_at.to_rfc3339(),
        updated_at: entry.updated_at.to_rfc3339(),
        relative_time: format_relative_time(entry.updated_at.timestamp_millis(), now_ms),
    }
}

/// Title when present, otherwise the first content line, whitespace collapsed.
pub fn entry_preview(entry: &Entry, max_chars: usize) -> String {
    let source = if entry.title.trim().is_empty() {
        entry.content.lines().next().unwrap_or("")
    } else {
        entry.title.as_str()
    };
    let collapsed = source.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

pub fn short_id(id: &EntryId) -> String {
    id.as_str().chars().take(13).collect()
}

pub fn format_relative_time(timestamp_ms: i64, now_ms: i64) -> String {
    let diff = now_ms.saturating_sub(timestamp_ms);
    let minute = 60_000;
    let hour = 60 * minute;
    let day = 24 * hour;
    let week = 7 * day;
    let month = 30 * day;
    let year = 365 * day;

    if diff < minute {
        "just now".to_string()
    } else if diff < hour {
        format!("{}m ago", diff / minute)
    } else if diff < day {
        format!("{}h ago", diff / hour)
    } else if diff < week {
        format!("{}d ago", diff / day)
    } else if diff < month {
        format!("{}w ago", diff / week)
    } else if diff < year {
        format!("{}mo ago", diff / month)
    } else {
        format!("{}y ago", diff / year)
    }
}

/// Arguments, then piped stdin, then `$EDITOR`.
pub fn resolve_entry_content(content_parts: &[String]) -> Result<String, CliError> {
    if let Some(content) = normalize_content(&content_parts.join(" ")) {
        return Ok(content);
    }

    if let Some(content) = read_piped_stdin()? {
        return Ok(content);
    }

    if let Some(content) = capture_editor_input()? {
        return Ok(content);
    }

    Err(CliError::EmptyContent)
}

pub fn normalize_content(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn normalize_entry_identifier(id: &str) -> Result<String, CliError> {
    let trimmed = id.trim();
    if trimmed.is_empty() {
        Err(CliError::EmptyEntryId)
    } else {
        Ok(trimmed.to_string())
    }
}

/// Accept a calendar date (midnight UTC) or a full RFC 3339 timestamp.
pub fn parse_entry_date(value: &str) -> Result<DateTime<Utc>, CliError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    DateTime::parse_from_rfc3339(trimmed)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|_| CliError::InvalidDate(trimmed.to_string()))
}

pub fn read_piped_stdin() -> Result<Option<String>, CliError> {
    let stdin = io::stdin();
    if stdin.is_terminal() {
        return Ok(None);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    Ok(normalize_content(&buffer))
}

pub fn capture_editor_input() -> Result<Option<String>, CliError> {
    capture_editor_input_with_initial("")
}

pub fn capture_editor_input_with_initial(
    initial_content: &str,
) -> Result<Option<String>, CliError> {
    let editor = preferred_editor();
    let temp_file = create_temp_entry_file_path();
    std::fs::write(&temp_file, initial_content)?;

    let launch_result = launch_editor(&editor, &temp_file);
    let entry_content = std::fs::read_to_string(&temp_file)?;
    let _ = std::fs::remove_file(&temp_file);

    launch_result?;
    Ok(normalize_content(&entry_content))
}

pub fn launch_editor(editor: &str, file_path: &Path) -> Result<(), CliError> {
    match Command::new(editor).arg(file_path).status() {
        Ok(status) => {
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        // EDITOR may carry arguments, e.g. "code --wait"
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            let mut parts = editor.split_whitespace();
            let Some(program) = parts.next() else {
                return Err(CliError::EditorFailed("empty EDITOR command".into()));
            };

            let mut command = Command::new(program);
            command.args(parts).arg(file_path);

            let status = command.status()?;
            if status.success() {
                Ok(())
            } else {
                Err(CliError::EditorFailed(format!(
                    "`{editor}` exited with status {status}"
                )))
            }
        }
        Err(err) => Err(CliError::Io(err)),
    }
}

pub fn preferred_editor() -> String {
    env::var("VISUAL")
        .or_else(|_| env::var("EDITOR"))
        .unwrap_or_else(|_| default_editor().to_string())
}

pub const fn default_editor() -> &'static str {
    if cfg!(windows) {
        "notepad"
    } else {
        "vi"
    }
}

pub fn create_temp_entry_file_path() -> PathBuf {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |duration| duration.as_nanos());
    env::temp_dir().join(format!("jotter-entry-{}-{now}.md", std::process::id()))
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> Result<PathBuf, CliError> {
    if let Some(path) = cli_db_path.or_else(|| env::var_os("JOTTER_DB_PATH").map(PathBuf::from)) {
        return Ok(path);
    }
    default_db_path()
}

pub fn default_db_path() -> Result<PathBuf, CliError> {
    dirs::data_dir()
        .map(|dir| dir.join("jotter").join("jotter.db"))
        .ok_or_else(|| CliError::Config("Failed to resolve CLI data directory".to_string()))
}
