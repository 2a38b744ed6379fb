use std::io;

use oppanel_core::config::ConfigError;
use oppanel_core::remote::RemoteError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] oppanel_core::Error),
    #[error(transparent)]
    Remote(#[from] RemoteError),
    #[error(transparent)]
    Settings(#[from] ConfigError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("{0}")]
    InvalidInput(String),
    #[error(
        "Remote database is not configured. Run `oppanel config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    RemoteNotConfigured,
    #[error("Event could not be written remotely or queued locally; record it by hand")]
    EventLost,
}
