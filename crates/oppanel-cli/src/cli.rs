use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "oppanel")]
#[command(about = "Record production events and sync the offline write queue")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local queue database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Optional path to CLI config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Record a production event (written directly, queued when offline)
    Record {
        #[command(subcommand)]
        event: RecordCommands,
    },
    /// Inspect or extend the offline write queue
    Queue {
        #[command(subcommand)]
        command: QueueCommands,
    },
    /// Run one drain cycle against the remote database
    Sync,
    /// Keep draining the queue periodically until interrupted
    Run {
        /// Seconds between drain cycles (overrides config)
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
    /// Manage the CLI config file
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Args, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Station {
    /// Machine id
    #[arg(long = "machine", value_name = "ID")]
    pub machine_id: i64,
    /// Operator id
    #[arg(long = "operator", value_name = "ID")]
    pub operator_id: i64,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum RecordCommands {
    /// Start a production session
    Start {
        #[command(flatten)]
        station: Station,
    },
    /// Stop the open production session
    Stop {
        #[command(flatten)]
        station: Station,
        /// Stop reason code (e.g. Mola)
        #[arg(long)]
        reason: String,
    },
    /// Report a machine error
    Error {
        #[command(flatten)]
        station: Station,
        /// Error description
        #[arg(long)]
        reason: String,
    },
    /// Report produced part count
    Count {
        #[command(flatten)]
        station: Station,
        /// Number of parts
        #[arg(long)]
        quantity: u32,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum QueueCommands {
    /// List queued intents in drain order
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Queue a raw insert
    AddInsert {
        /// Target table
        #[arg(long)]
        table: String,
        /// Record as a JSON object
        #[arg(long, value_name = "JSON")]
        data: String,
    },
    /// Queue a session close
    AddClose {
        #[command(flatten)]
        station: Station,
        /// Stop reason code
        #[arg(long)]
        reason: String,
        /// End timestamp (RFC 3339, defaults to now)
        #[arg(long, value_name = "TS")]
        ended_at: Option<String>,
        /// Sessions table (overrides config)
        #[arg(long)]
        table: Option<String>,
    },
    /// Print the number of queued intents
    Count,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommands {
    /// Create or update the config file
    Init {
        /// Supabase project URL
        #[arg(long, value_name = "URL")]
        supabase_url: Option<String>,
        /// Supabase anon/public key
        #[arg(long, value_name = "KEY")]
        supabase_anon_key: Option<String>,
        /// Seconds between drain cycles
        #[arg(long, value_name = "SECS")]
        sync_interval_secs: Option<u64>,
        /// Remote sessions table
        #[arg(long, value_name = "NAME")]
        sessions_table: Option<String>,
        /// Remote events table
        #[arg(long, value_name = "NAME")]
        events_table: Option<String>,
    },
    /// Show the effective configuration
    Show,
}
