//! Fieldbook CLI - offline-first inspection records from the command line
//!
//! Records are written to the local store first and delivered to the remote
//! disk by `fieldbook sync`.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;
#[cfg(test)]
mod tests;

use clap::Parser;

use crate::cli::{Cli, Commands, SyncCommands};
use crate::commands::auth_cmd::run_auth;
use crate::commands::common::resolve_db_path;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::queue::run_queue;
use crate::commands::records::{run_add, run_delete, run_list, run_show, run_update};
use crate::commands::sync::{run_sync, run_sync_status, run_sync_watch};
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

    match cli.command {
        Commands::Add { collection, json } => {
            run_add(collection.into(), json.as_deref(), &resolve_db_path(cli.db_path)?).await
        }
        Commands::Update {
            collection,
            id,
            json,
        } => {
            run_update(
                collection.into(),
                &id,
                json.as_deref(),
                &resolve_db_path(cli.db_path)?,
            )
            .await
        }
        Commands::Delete { collection, id } => {
            run_delete(collection.into(), &id, &resolve_db_path(cli.db_path)?).await
        }
        Commands::Show { collection, id } => {
            run_show(collection.into(), &id, &resolve_db_path(cli.db_path)?).await
        }
        Commands::List { collection, json } => {
            run_list(collection.into(), json, &resolve_db_path(cli.db_path)?).await
        }
        Commands::Sync {
            command,
            watch,
            interval,
        } => {
            let db_path = resolve_db_path(cli.db_path)?;
            match command {
                Some(SyncCommands::Status { json }) => run_sync_status(json, &db_path).await,
                None if watch => run_sync_watch(profile, interval, &db_path).await,
                None => run_sync(profile, &db_path).await,
            }
        }
        Commands::Queue { command } => run_queue(command, &resolve_db_path(cli.db_path)?).await,
        Commands::Auth { command } => run_auth(command, profile).await,
        Commands::Config { command } => run_config(command, profile),
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref()),
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("fieldbook=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
