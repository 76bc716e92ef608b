use chrono::{TimeZone, Utc};
use jotter_core::db::{Database, SqliteKeyValueStore};
use jotter_core::local::GuestEntryStore;
use jotter_core::{EntriesCoordinator, Entry, Phase};
use pretty_assertions::assert_eq;

use crate::cli::{CompletionShell, ExportFormat};
use crate::commands::add::run_add;
use crate::commands::common::{
    default_editor, entry_preview, format_entry_lines, format_relative_time, normalize_content,
    normalize_entry_identifier, parse_entry_date, resolve_entry, AppContext,
};
use crate::commands::completions::run_completions;
use crate::commands::config::{merge_profile, missing_profile_fields};
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::migrate::run_migrate;
use crate::config_profiles::CliProfile;
use crate::error::CliError;

fn entry(id: &str, title: &str, content: &str) -> Entry {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
    Entry {
        id: id.into(),
        title: title.to_string(),
        content: content.to_string(),
        created_at: at,
        updated_at: at,
        owner_user_id: None,
    }
}

async fn context_with(database: Database, seed: &[Entry]) -> AppContext {
    let local = GuestEntryStore::new(SqliteKeyValueStore::new(database));
    if !seed.is_empty() {
        local.write(seed).unwrap();
    }
    let context = AppContext {
        coordinator: EntriesCoordinator::local_only(local),
        profile_name: "test".to_string(),
        remote: None,
    };
    context.sync_identity().await;
    context
}

async fn local_context(seed: &[Entry]) -> AppContext {
    context_with(Database::open_in_memory().unwrap(), seed).await
}

#[test]
fn normalize_content_trims_and_rejects_empty() {
    assert_eq!(normalize_content("  hello  "), Some("hello".to_string()));
    assert_eq!(normalize_content(" \n\t "), None);
}

#[test]
fn normalize_content_keeps_multiline_text() {
    assert_eq!(
        normalize_content("line 1\nline 2\n"),
        Some("line 1\nline 2".to_string())
    );
}

#[test]
fn default_editor_is_defined() {
    assert!(!default_editor().is_empty());
}

#[test]
fn format_relative_time_units() {
    let now = 10_000_000_000;
    assert_eq!(format_relative_time(now - 30_000, now), "just now");
    assert_eq!(format_relative_time(now - 120_000, now), "2m ago");
    assert_eq!(format_relative_time(now - 2 * 60 * 60_000, now), "2h ago");
    assert_eq!(format_relative_time(now - 3 * 24 * 60 * 60_000, now), "3d ago");
}

#[test]
fn entry_preview_prefers_title_and_truncates_with_ellipsis() {
    let titled = entry("a", "Morning pages", "ignored body");
    assert_eq!(entry_preview(&titled, 40), "Morning pages");

    let untitled = entry(
        "b",
        "  ",
        "This is a very long sentence that should be shortened\nsecond line",
    );
    assert_eq!(entry_preview(&untitled, 20), "This is a very lo...");
}

#[test]
fn format_entry_lines_show_short_id_and_date() {
    let lines = format_entry_lines(&[entry(
        "11111111-1111-4111-8111-111111111111",
        "Walk",
        "Went to the park",
    )]);
    assert_eq!(lines.len(), 1);
    assert!(lines[0].starts_with("11111111-1111  2024-03-01  Walk"));
}

#[test]
fn normalize_entry_identifier_rejects_empty() {
    assert!(matches!(
        normalize_entry_identifier(" \n "),
        Err(CliError::EmptyEntryId)
    ));
    assert_eq!(normalize_entry_identifier("  abc123  ").unwrap(), "abc123");
}

#[test]
fn parse_entry_date_accepts_calendar_dates_and_rfc3339() {
    assert_eq!(
        parse_entry_date("2024-02-29").unwrap(),
        Utc.with_ymd_and_hms(2024, 2, 29, 0, 0, 0).unwrap()
    );
    assert_eq!(
        parse_entry_date("2024-02-29T10:30:00+02:00").unwrap(),
        Utc.with_ymd_and_hms(2024, 2, 29, 8, 30, 0).unwrap()
    );
    assert!(matches!(
        parse_entry_date("last tuesday"),
        Err(CliError::InvalidDate(_))
    ));
}

#[tokio::test(flavor = "current_thread")]
async fn resolve_entry_supports_exact_and_prefix_id() {
    let context = local_context(&[
        entry("11111111-1111-4111-8111-111111111111", "A", "Entry A"),
        entry("11111111-1111-4111-8111-222222222222", "B", "Entry B"),
    ])
    .await;

    let exact = resolve_entry("11111111-1111-4111-8111-111111111111", &context.coordinator)
        .unwrap();
    assert_eq!(exact.content, "Entry A");

    let prefixed = resolve_entry("11111111-1111-4111-8111-2", &context.coordinator).unwrap();
    assert_eq!(prefixed.content, "Entry B");

    let ambiguous = resolve_entry("11111111", &context.coordinator);
    assert!(matches!(ambiguous, Err(CliError::AmbiguousEntryId(_))));

    let missing = resolve_entry("ffff", &context.coordinator);
    assert!(matches!(missing, Err(CliError::EntryNotFound(_))));
}

#[tokio::test(flavor = "current_thread")]
async fn add_edit_delete_round_trip_through_guest_storage() {
    let context = local_context(&[]).await;

    run_add(
        &context,
        Some(" Garden ".to_string()),
        Some("2023-06-01"),
        &["planted".to_string(), "tomatoes".to_string()],
    )
    .await
    .unwrap();

    let created = context.coordinator.list().unwrap().remove(0);
    assert_eq!(created.title, "Garden");
    assert_eq!(created.content, "planted tomatoes");
    assert_eq!(
        created.created_at,
        Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap()
    );

    run_edit(
        &context,
        created.id.as_str(),
        None,
        None,
        Some("planted basil".to_string()),
    )
    .await
    .unwrap();
    let edited = context.coordinator.get(&created.id).unwrap();
    assert_eq!(edited.title, "Garden");
    assert_eq!(edited.content, "planted basil");
    assert!(edited.updated_at >= created.updated_at);

    run_delete(&context, created.id.as_str()).await.unwrap();
    assert!(context.coordinator.list().unwrap().is_empty());
    assert!(context.coordinator.guest_store().read().is_empty());
}

#[tokio::test(flavor = "current_thread")]
async fn edit_rejects_blank_replacement_content() {
    let context = local_context(&[entry("entry-1", "", "Keep me")]).await;

    let result = run_edit(&context, "entry-1", None, None, Some("   ".to_string())).await;
    assert!(matches!(result, Err(CliError::EmptyEditedContent)));
    assert_eq!(context.coordinator.get(&"entry-1".into()).unwrap().content, "Keep me");
}

#[tokio::test(flavor = "current_thread")]
async fn entries_persist_across_invocations() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("jotter.db");

    {
        let context = context_with(Database::open(&db_path).unwrap(), &[]).await;
        run_add(&context, None, None, &["first run".to_string()])
            .await
            .unwrap();
    }

    let reopened = context_with(Database::open(&db_path).unwrap(), &[]).await;
    let entries = reopened.coordinator.list().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].content, "first run");
}

#[tokio::test(flavor = "current_thread")]
async fn local_only_context_is_signed_out_and_refuses_migrate() {
    let context = local_context(&[entry("entry-1", "", "guest")]).await;
    assert_eq!(context.coordinator.phase(), Phase::LocalActive);

    let result = run_migrate(&context).await;
    assert!(matches!(result, Err(CliError::RemoteNotConfigured)));
    assert_eq!(context.coordinator.guest_store().read().len(), 1);
}

#[tokio::test(flavor = "current_thread")]
async fn export_writes_json_file() {
    let context = local_context(&[entry("entry-1", "Title", "Body")]).await;
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("export.json");

    run_export(&context, ExportFormat::Json, Some(&output_path)).unwrap();

    let exported = std::fs::read_to_string(&output_path).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&exported).unwrap();
    assert_eq!(parsed[0]["id"], "entry-1");
    assert_eq!(parsed[0]["title"], "Title");
    assert_eq!(parsed[0]["created_at"], "2024-03-01T09:00:00.000Z");
}

#[test]
fn completions_write_zsh_script() {
    let dir = tempfile::tempdir().unwrap();
    let output_path = dir.path().join("_jotter");

    run_completions(CompletionShell::Zsh, Some(&output_path)).unwrap();

    let script = std::fs::read_to_string(&output_path).unwrap();
    assert!(script.contains("#compdef jotter"));
    assert!(script.contains("_jotter()"));
}

#[test]
fn merge_profile_keeps_existing_fields_and_validates_url() {
    let existing = CliProfile {
        supabase_url: Some("https://project.supabase.co".to_string()),
        supabase_anon_key: Some("old-key".to_string()),
    };

    let merged = merge_profile(&existing, None, Some(" new-key ".to_string())).unwrap();
    assert_eq!(
        merged.supabase_url.as_deref(),
        Some("https://project.supabase.co")
    );
    assert_eq!(merged.supabase_anon_key.as_deref(), Some("new-key"));
    assert!(missing_profile_fields(&merged).is_empty());

    let invalid = merge_profile(&existing, Some("project.supabase.co".to_string()), None);
    assert!(matches!(invalid, Err(CliError::Config(_))));

    assert_eq!(
        missing_profile_fields(&CliProfile::default()),
        vec!["supabase_url", "supabase_anon_key"]
    );
}
