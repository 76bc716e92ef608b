//! Jotter CLI - Command-line journal
//!
//! Entries stay on this device until you sign in, then move to your account.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;

#[cfg(test)]
mod tests;

use clap::{CommandFactory, Parser};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Commands};
use crate::commands::add::run_add;
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::{open_context, resolve_db_path, AppContext};
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::delete::run_delete;
use crate::commands::edit::run_edit;
use crate::commands::export::run_export;
use crate::commands::list::run_list;
use crate::commands::migrate::run_migrate;
use crate::commands::show::run_show;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    let Some(command) = cli.command else {
        if cli.entry.is_empty() {
            Cli::command().print_help()?;
            println!();
            return Ok(());
        }
        // Quick capture mode: jotter "today I ..."
        let context = open_context(&resolve_db_path(cli.db_path)?, profile).await?;
        return run_add(&context, None, None, &cli.entry).await;
    };

    match command {
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
        Commands::Config { command } => run_config(command, profile)?,
        command => {
            let context = open_context(&resolve_db_path(cli.db_path)?, profile).await?;
            run_entry_command(&context, command).await?;
        }
    }

    Ok(())
}

async fn run_entry_command(context: &AppContext, command: Commands) -> Result<(), CliError> {
    match command {
        Commands::Add {
            title,
            date,
            content,
        } => run_add(context, title, date.as_deref(), &content).await,
        Commands::List { limit, json } => run_list(context, limit, json),
        Commands::Show { id, json } => run_show(context, &id, json),
        Commands::Edit {
            id,
            title,
            date,
            content,
        } => run_edit(context, &id, title, date.as_deref(), content).await,
        Commands::Delete { id } => run_delete(context, &id).await,
        Commands::Migrate => run_migrate(context).await,
        Commands::Export { format, output } => run_export(context, format, output.as_deref()),
        Commands::Auth { command } => run_auth(context, command).await,
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),
    }
}

fn init_tracing() {
    let mut filter = EnvFilter::from_default_env();
    for directive in ["jotter=info", "jotter_core=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
