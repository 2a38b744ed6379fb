use std::env;
use std::path::{Path, PathBuf};

use oppanel_core::config::SyncSettings;
use oppanel_core::connectivity::{ConnectivityFlag, TcpProbe};
use oppanel_core::db::SqliteIntentLog;
use oppanel_core::models::format_timestamp;
use oppanel_core::remote::SupabaseStore;
use oppanel_core::util::{compact_text, normalize_text_option};
use oppanel_core::{QueueManager, WriteIntent};
use serde::Serialize;
use serde_json::Value;

use crate::cli_config::{default_config_path, CliConfig};
use crate::error::CliError;

pub type CliQueueManager = QueueManager<SqliteIntentLog, SupabaseStore, ConnectivityFlag>;

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, Serialize)]
pub struct QueueListItem {
    pub id: i64,
    pub table: String,
    pub action: String,
    pub data: Value,
    pub created_at: String,
}

pub fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("OPPANEL_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

pub fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oppanel")
        .join("oppanel.db")
}

pub fn resolve_config_path(cli_config_path: Option<PathBuf>) -> PathBuf {
    cli_config_path.unwrap_or_else(default_config_path)
}

pub fn load_config(config_path: &Path) -> Result<CliConfig, CliError> {
    CliConfig::load_from_path(config_path).map_err(CliError::Config)
}

/// Environment values win over the config file.
pub fn load_settings(config_path: &Path) -> Result<SyncSettings, CliError> {
    let config = load_config(config_path)?;
    Ok(settings_from(&config, |name| env::var(name).ok())?)
}

pub fn settings_from(
    config: &CliConfig,
    env_lookup: impl Fn(&str) -> Option<String>,
) -> Result<SyncSettings, oppanel_core::config::ConfigError> {
    SyncSettings::from_lookup(|name| {
        normalize_text_option(env_lookup(name)).or_else(|| config.lookup(name))
    })
}

pub fn open_log(db_path: &Path) -> Result<SqliteIntentLog, CliError> {
    Ok(SqliteIntentLog::open(db_path)?)
}

/// Build a manager whose connectivity flag is seeded by one probe.
///
/// The probe is returned so long-running commands can keep the flag fresh
/// with [`TcpProbe::spawn_monitor`].
pub async fn build_manager(
    db_path: &Path,
    settings: &SyncSettings,
) -> Result<(CliQueueManager, TcpProbe), CliError> {
    let (url, anon_key) = settings.remote().ok_or(CliError::RemoteNotConfigured)?;
    let store = SupabaseStore::with_timeout(url, anon_key, settings.request_timeout)?;
    let probe = TcpProbe::for_url(url, settings.probe_timeout).ok_or_else(|| {
        CliError::Config(format!("Cannot derive a host to probe from {url}"))
    })?;
    let online = ConnectivityFlag::new(probe.check().await);

    Ok((QueueManager::new(open_log(db_path)?, store, online), probe))
}

pub fn intent_to_list_item(intent: &WriteIntent) -> Result<QueueListItem, CliError> {
    let data = serde_json::from_str(&intent.action.to_data()?)?;
    Ok(QueueListItem {
        id: intent.id.get(),
        table: intent.table.clone(),
        action: intent.action.kind().to_string(),
        data,
        created_at: format_timestamp(intent.created_at),
    })
}

pub fn format_intent_lines(intents: &[WriteIntent]) -> Vec<String> {
    intents
        .iter()
        .map(|intent| {
            let data = intent
                .action
                .to_data()
                .map(|raw| intent_preview(&raw))
                .unwrap_or_default();
            format!(
                "{:>5}  {}  {:<15}  {}  {}",
                intent.id,
                format_timestamp(intent.created_at),
                intent.action.kind(),
                intent.table,
                data
            )
        })
        .collect()
}

pub fn intent_preview(raw: &str) -> String {
    let compact = compact_text(raw);
    if compact.chars().count() <= PREVIEW_CHARS {
        return compact;
    }
    let mut preview: String = compact.chars().take(PREVIEW_CHARS - 3).collect();
    preview.push_str("...");
    preview
}
