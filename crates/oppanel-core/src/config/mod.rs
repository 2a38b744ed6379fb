//! Runtime configuration for the sync layer.
//!
//! Values come from a lookup function so callers can layer sources
//! (environment first, then a config file) without this module knowing about
//! either.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_SESSIONS_TABLE: &str = "durus_loglari";
pub const DEFAULT_EVENTS_TABLE: &str = "uretim_loglari";
const DEFAULT_SYNC_INTERVAL_SECS: &str = "30";
const DEFAULT_PROBE_TIMEOUT_MS: &str = "1500";
const DEFAULT_REQUEST_TIMEOUT_SECS: &str = "10";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone, PartialEq, Eq)]
pub struct SyncSettings {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub sync_interval: Duration,
    pub probe_timeout: Duration,
    pub request_timeout: Duration,
    pub sessions_table: String,
    pub events_table: String,
}

impl fmt::Debug for SyncSettings {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncSettings")
            .field("supabase_url", &self.supabase_url)
            .field(
                "supabase_anon_key",
                &self.supabase_anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("sync_interval", &self.sync_interval)
            .field("probe_timeout", &self.probe_timeout)
            .field("request_timeout", &self.request_timeout)
            .field("sessions_table", &self.sessions_table)
            .field("events_table", &self.events_table)
            .finish()
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let supabase_url = normalize_text_option(lookup("SUPABASE_URL"));
        let supabase_anon_key = normalize_text_option(lookup("SUPABASE_ANON_KEY"));

        match (&supabase_url, &supabase_anon_key) {
            (Some(url), Some(_)) if !is_http_url(url) => {
                return Err(ConfigError::Invalid(
                    "SUPABASE_URL must start with http:// or https://".to_string(),
                ));
            }
            (Some(_), None) | (None, Some(_)) => {
                return Err(ConfigError::Invalid(
                    "SUPABASE_URL and SUPABASE_ANON_KEY must be set together".to_string(),
                ));
            }
            _ => {}
        }

        let sync_interval_secs = parse_positive_u64(
            &value_or_default(&lookup, "OPPANEL_SYNC_INTERVAL_SECS", DEFAULT_SYNC_INTERVAL_SECS),
            "OPPANEL_SYNC_INTERVAL_SECS",
        )?;
        let probe_timeout_ms = parse_positive_u64(
            &value_or_default(&lookup, "OPPANEL_PROBE_TIMEOUT_MS", DEFAULT_PROBE_TIMEOUT_MS),
            "OPPANEL_PROBE_TIMEOUT_MS",
        )?;
        let request_timeout_secs = parse_positive_u64(
            &value_or_default(
                &lookup,
                "OPPANEL_REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            "OPPANEL_REQUEST_TIMEOUT_SECS",
        )?;

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            sync_interval: Duration::from_secs(sync_interval_secs),
            probe_timeout: Duration::from_millis(probe_timeout_ms),
            request_timeout: Duration::from_secs(request_timeout_secs),
            sessions_table: value_or_default(
                &lookup,
                "OPPANEL_SESSIONS_TABLE",
                DEFAULT_SESSIONS_TABLE,
            ),
            events_table: value_or_default(&lookup, "OPPANEL_EVENTS_TABLE", DEFAULT_EVENTS_TABLE),
        })
    }

    /// Supabase URL and anon key when the remote store is configured.
    pub fn remote(&self) -> Option<(&str, &str)> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (Some(url), Some(key)) => Some((url.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            sync_interval: Duration::from_secs(30),
            probe_timeout: Duration::from_millis(1500),
            request_timeout: Duration::from_secs(10),
            sessions_table: DEFAULT_SESSIONS_TABLE.to_string(),
            events_table: DEFAULT_EVENTS_TABLE.to_string(),
        }
    }
}

fn value_or_default(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    normalize_text_option(lookup(name)).unwrap_or_else(|| default.to_string())
}

fn parse_positive_u64(value: &str, name: &str) -> Result<u64, ConfigError> {
    match value.parse::<u64>() {
        Ok(parsed) if parsed > 0 => Ok(parsed),
        _ => Err(ConfigError::Invalid(format!(
            "{name} must be a positive integer, got '{value}'"
        ))),
    }
}
