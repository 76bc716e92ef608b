use crate::commands::common::{
    entry_to_list_item, normalize_entry_identifier, resolve_entry, AppContext,
};
use crate::error::CliError;

pub fn run_show(context: &AppContext, id: &str, as_json: bool) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let entry = resolve_entry(&normalized_id, &context.coordinator)?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&entry_to_list_item(&entry))?);
        return Ok(());
    }

    println!("id:      {}", entry.id);
    println!("date:    {}", entry.created_at.format("%Y-%m-%d %H:%M UTC"));
    println!("updated: {}", entry.updated_at.format("%Y-%m-%d %H:%M UTC"));
    if !entry.title.is_empty() {
        println!();
        println!("# {}", entry.title);
    }
    println!();
    println!("{}", entry.content);
    Ok(())
}
