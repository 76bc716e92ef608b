use std::path::Path;

use jotter_core::export::{render_entries_export, ExportFormat as CoreExportFormat};

use crate::cli::ExportFormat;
use crate::commands::common::AppContext;
use crate::error::CliError;

pub fn run_export(
    context: &AppContext,
    format: ExportFormat,
    output_path: Option<&Path>,
) -> Result<(), CliError> {
    let entries = context.coordinator.list()?;
    let rendered = render_entries_export(&entries, format.into())?;

    if let Some(path) = output_path {
        std::fs::write(path, rendered)?;
        println!("{}", path.display());
    } else {
        println!("{rendered}");
    }

    Ok(())
}

impl From<ExportFormat> for CoreExportFormat {
    fn from(format: ExportFormat) -> Self {
        match format {
            ExportFormat::Json => Self::Json,
            ExportFormat::Markdown => Self::Markdown,
        }
    }
}
