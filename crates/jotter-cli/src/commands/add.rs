use jotter_core::NewEntry;

use crate::commands::common::{parse_entry_date, resolve_entry_content, AppContext};
use crate::error::CliError;

pub async fn run_add(
    context: &AppContext,
    title: Option<String>,
    date: Option<&str>,
    content_parts: &[String],
) -> Result<(), CliError> {
    let content = resolve_entry_content(content_parts)?;
    let mut fields = NewEntry::new(title.unwrap_or_default().trim(), content);
    if let Some(date) = date {
        fields = fields.created_at(parse_entry_date(date)?);
    }

    let entry = context.coordinator.create(fields).await?;
    println!("{}", entry.id);
    Ok(())
}
