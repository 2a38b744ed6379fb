//! OpPanel CLI - production terminal from the command line
//!
//! Records machine events, falling back to a local queue while the remote
//! database is unreachable, and drains that queue on demand or periodically.

mod cli;
mod cli_config;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::{load_settings, resolve_config_path, resolve_db_path};
use crate::commands::config::run_config;
use crate::commands::queue::run_queue;
use crate::commands::record::run_record;
use crate::commands::sync::{run_sync, run_worker};
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

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "oppanel=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);
    let config_path = resolve_config_path(cli.config);

    match cli.command {
        Commands::Config { command } => run_config(command, &config_path)?,
        Commands::Record { event } => {
            let settings = load_settings(&config_path)?;
            run_record(event, &db_path, &settings).await?;
        }
        Commands::Queue { command } => {
            let settings = load_settings(&config_path)?;
            run_queue(command, &db_path, &settings).await?;
        }
        Commands::Sync => {
            let settings = load_settings(&config_path)?;
            run_sync(&db_path, &settings).await?;
        }
        Commands::Run { interval } => {
            let settings = load_settings(&config_path)?;
            run_worker(interval, &db_path, &settings).await?;
        }
    }

    Ok(())
}
