use jotter_core::{IdentitySource, StorageMode};

use crate::commands::common::AppContext;
use crate::error::CliError;

/// Retry moving guest entries into the signed-in account.
pub async fn run_migrate(context: &AppContext) -> Result<(), CliError> {
    let remote = context.require_remote()?;
    let outcome = context.coordinator.migrate_guest_entries().await?;

    match context.coordinator.mode() {
        Some(StorageMode::Remote { .. }) => {
            println!("Migrated {} guest entries", outcome.migrated_count);
        }
        _ if remote.hub.current().is_signed_in() => {
            println!("Guest entries are still on this device; try again later");
        }
        _ => {
            println!(
                "Profile '{}' is not signed in. Run `jotter auth login` first.",
                context.profile_name
            );
        }
    }
    Ok(())
}
