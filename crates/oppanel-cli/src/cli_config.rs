//! Persistent CLI configuration file.

use std::path::{Path, PathBuf};

use oppanel_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

const CONFIG_FILE_NAME: &str = "cli-config.json";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliConfig {
    #[serde(default = "default_config_version")]
    pub version: u32,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default)]
    pub sync_interval_secs: Option<u64>,
    #[serde(default)]
    pub probe_timeout_ms: Option<u64>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default)]
    pub sessions_table: Option<String>,
    #[serde(default)]
    pub events_table: Option<String>,
}

const fn default_config_version() -> u32 {
    1
}

pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("oppanel")
        .join(CONFIG_FILE_NAME)
}

impl CliConfig {
    pub fn load_from_path(path: &Path) -> Result<Self, String> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)
            .map_err(|error| format!("Failed to read config at {}: {}", path.display(), error))?;
        let mut config = serde_json::from_str::<Self>(&raw)
            .map_err(|error| format!("Failed to parse config at {}: {}", path.display(), error))?;
        config.normalize();
        Ok(config)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|error| {
                format!(
                    "Failed to create config directory {}: {}",
                    parent.display(),
                    error
                )
            })?;
        }

        let mut normalized = self.clone();
        normalized.normalize();
        let serialized = serde_json::to_string_pretty(&normalized)
            .map_err(|error| format!("Failed to serialize config: {error}"))?;
        std::fs::write(path, serialized)
            .map_err(|error| format!("Failed to write config at {}: {}", path.display(), error))
    }

    /// Value for a settings variable name, as stored in this file.
    pub fn lookup(&self, name: &str) -> Option<String> {
        match name {
            "SUPABASE_URL" => self.supabase_url.clone(),
            "SUPABASE_ANON_KEY" => self.supabase_anon_key.clone(),
            "OPPANEL_SYNC_INTERVAL_SECS" => self.sync_interval_secs.map(|value| value.to_string()),
            "OPPANEL_PROBE_TIMEOUT_MS" => self.probe_timeout_ms.map(|value| value.to_string()),
            "OPPANEL_REQUEST_TIMEOUT_SECS" => {
                self.request_timeout_secs.map(|value| value.to_string())
            }
            "OPPANEL_SESSIONS_TABLE" => self.sessions_table.clone(),
            "OPPANEL_EVENTS_TABLE" => self.events_table.clone(),
            _ => None,
        }
    }

    fn normalize(&mut self) {
        self.supabase_url = normalize_text_option(self.supabase_url.take());
        self.supabase_anon_key = normalize_text_option(self.supabase_anon_key.take());
        self.sessions_table = normalize_text_option(self.sessions_table.take());
        self.events_table = normalize_text_option(self.events_table.take());
    }
}
