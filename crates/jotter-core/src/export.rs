//! Entry export as JSON or Markdown.

use std::fmt::Write as _;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Entry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportFormat {
    Json,
    Markdown,
}

impl ExportFormat {
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Markdown => "md",
        }
    }
}

/// Entry as written to an export file. Owner ids stay out of exports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub id: String,
    pub title: String,
    pub content: String,
    pub created_at: String,
    pub updated_at: String,
}

#[must_use]
pub fn entry_to_export_item(entry: &Entry) -> ExportEntry {
    ExportEntry {
        id: entry.id.to_string(),
        title: entry.title.clone(),
        content: entry.content.clone(),
        created_at: rfc3339(entry.created_at),
        updated_at: rfc3339(entry.updated_at),
    }
}

/// Render entries as pretty-printed JSON.
pub fn render_json_export(entries: &[Entry]) -> serde_json::Result<String> {
    let items = entries
        .iter()
        .map(entry_to_export_item)
        .collect::<Vec<ExportEntry>>();
    serde_json::to_string_pretty(&items)
}

/// Render entries as Markdown, one frontmatter block per entry.
#[must_use]
pub fn render_markdown_export(entries: &[Entry]) -> String {
    let mut output = String::new();

    for (index, entry) in entries.iter().enumerate() {
        if index > 0 {
            output.push('\n');
        }

        let item = entry_to_export_item(entry);
        let _ = writeln!(output, "---");
        let _ = writeln!(output, "id: {}", item.id);
        let _ = writeln!(output, "created_at: {}", item.created_at);
        let _ = writeln!(output, "updated_at: {}", item.updated_at);
        let _ = writeln!(output, "---");
        let _ = writeln!(output);
        if !item.title.is_empty() {
            let _ = writeln!(output, "# {}", item.title);
            let _ = writeln!(output);
        }
        output.push_str(&item.content);
        output.push('\n');
    }

    output
}

pub fn render_entries_export(entries: &[Entry], format: ExportFormat) -> serde_json::Result<String> {
    match format {
        ExportFormat::Json => render_json_export(entries),
        ExportFormat::Markdown => Ok(render_markdown_export(entries)),
    }
}

/// Default export file name, stable for a given timestamp.
#[must_use]
pub fn suggested_export_file_name(format: ExportFormat, timestamp_ms: i64) -> String {
    format!("jotter-export-{timestamp_ms}.{}", format.extension())
}

fn rfc3339(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn entry(title: &str, content: &str) -> Entry {
        let at = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();
        Entry {
            id: "entry-1".into(),
            title: title.to_string(),
            content: content.to_string(),
            created_at: at,
            updated_at: at,
            owner_user_id: Some("user-1".to_string()),
        }
    }

    #[test]
    fn export_item_uses_rfc3339_and_drops_owner() {
        let item = entry_to_export_item(&entry("Morning", "Coffee"));
        assert_eq!(item.created_at, "2024-05-06T07:08:09.000Z");

        let json = render_json_export(&[entry("Morning", "Coffee")]).unwrap();
        assert!(!json.contains("owner_user_id"));
        assert!(json.contains("\"title\": \"Morning\""));
    }

    #[test]
    fn markdown_export_includes_frontmatter_title_and_content() {
        let rendered = render_markdown_export(&[entry("Morning", "Coffee"), entry("", "Untitled")]);
        assert!(rendered.contains("id: entry-1"));
        assert!(rendered.contains("created_at: 2024-05-06T07:08:09.000Z"));
        assert!(rendered.contains("# Morning\n\nCoffee\n"));
        assert!(rendered.contains("---\n\nUntitled\n"));
    }

    #[test]
    fn suggested_export_file_name_uses_format_extension() {
        assert_eq!(
            suggested_export_file_name(ExportFormat::Json, 123),
            "jotter-export-123.json"
        );
        assert_eq!(
            suggested_export_file_name(ExportFormat::Markdown, 456),
            "jotter-export-456.md"
        );
    }
}
