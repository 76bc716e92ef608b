use jotter_core::EntryPatch;

use crate::commands::common::{
    capture_editor_input_with_initial, normalize_content, normalize_entry_identifier,
    parse_entry_date, resolve_entry, AppContext,
};
use crate::error::CliError;

pub async fn run_edit(
    context: &AppContext,
    id: &str,
    title: Option<String>,
    date: Option<&str>,
    content: Option<String>,
) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let entry = resolve_entry(&normalized_id, &context.coordinator)?;

    let mut patch = EntryPatch::default();
    if let Some(title) = title {
        patch = patch.title(title.trim());
    }
    if let Some(date) = date {
        patch = patch.created_at(parse_entry_date(date)?);
    }

    // Only fall back to the editor when nothing else was asked for
    let edited_content = match content {
        Some(content) => Some(normalize_content(&content).ok_or(CliError::EmptyEditedContent)?),
        None if patch.is_empty() => Some(
            capture_editor_input_with_initial(&entry.content)?
                .ok_or(CliError::EmptyEditedContent)?,
        ),
        None => None,
    };
    if let Some(edited_content) = edited_content {
        if edited_content != entry.content {
            patch = patch.content(edited_content);
        }
    }

    if patch.is_empty() {
        println!("{}", entry.id);
        return Ok(());
    }

    let updated = context.coordinator.update(&entry.id, patch).await?;
    println!("{}", updated.id);
    Ok(())
}
