use crate::commands::common::{entry_to_list_item, format_entry_lines, AppContext, EntryListItem};
use crate::error::CliError;

pub fn run_list(context: &AppContext, limit: usize, as_json: bool) -> Result<(), CliError> {
    let entries = context
        .coordinator
        .list()?
        .into_iter()
        .take(limit)
        .collect::<Vec<_>>();

    if as_json {
        let json_items = entries
            .iter()
            .map(entry_to_list_item)
            .collect::<Vec<EntryListItem>>();
        println!("{}", serde_json::to_string_pretty(&json_items)?);
    } else {
        for line in format_entry_lines(&entries) {
            println!("{line}");
        }
    }

    Ok(())
}
