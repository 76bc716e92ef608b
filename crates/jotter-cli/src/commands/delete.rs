use crate::commands::common::{normalize_entry_identifier, resolve_entry, AppContext};
use crate::error::CliError;

pub async fn run_delete(context: &AppContext, id: &str) -> Result<(), CliError> {
    let normalized_id = normalize_entry_identifier(id)?;
    let entry = resolve_entry(&normalized_id, &context.coordinator)?;

    context.coordinator.delete(&entry.id).await?;
    println!("{}", entry.id);
    Ok(())
}
