use std::env;
use std::path::Path;

use oppanel_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::cli_config::CliConfig;
use crate::commands::common::{load_config, settings_from};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, config_path: &Path) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            supabase_url,
            supabase_anon_key,
            sync_interval_secs,
            sessions_table,
            events_table,
        } => {
            let existing = load_config(config_path)?;
            let updates = CliConfig {
                supabase_url,
                supabase_anon_key,
                sync_interval_secs,
                sessions_table,
                events_table,
                ..CliConfig::default()
            };
            let merged = merge_config(existing, updates)?;
            merged
                .save_to_path(config_path)
                .map_err(CliError::Config)?;
            println!("Saved config to {}", config_path.display());
            Ok(())
        }
        ConfigCommands::Show => run_config_show(config_path),
    }
}

/// Overlay explicit values (then `SUPABASE_*` from the environment) onto the
/// stored config and validate the result.
pub fn merge_config(existing: CliConfig, updates: CliConfig) -> Result<CliConfig, CliError> {
    let supabase_url = normalize_text_option(updates.supabase_url)
        .or_else(|| normalize_text_option(env::var("SUPABASE_URL").ok()))
        .or(existing.supabase_url);
    if let Some(url) = supabase_url.as_deref() {
        if !is_http_url(url) {
            return Err(CliError::Config(
                "supabase_url must start with http:// or https://".to_string(),
            ));
        }
    }

    let merged = CliConfig {
        version: existing.version.max(1),
        supabase_url,
        supabase_anon_key: normalize_text_option(updates.supabase_anon_key)
            .or_else(|| normalize_text_option(env::var("SUPABASE_ANON_KEY").ok()))
            .or(existing.supabase_anon_key),
        sync_interval_secs: updates.sync_interval_secs.or(existing.sync_interval_secs),
        probe_timeout_ms: updates.probe_timeout_ms.or(existing.probe_timeout_ms),
        request_timeout_secs: updates
            .request_timeout_secs
            .or(existing.request_timeout_secs),
        sessions_table: normalize_text_option(updates.sessions_table).or(existing.sessions_table),
        events_table: normalize_text_option(updates.events_table).or(existing.events_table),
    };

    settings_from(&merged, |_| None)?;
    Ok(merged)
}

fn run_config_show(config_path: &Path) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let settings = settings_from(&config, |name| env::var(name).ok())?;

    println!("Config file: {}", config_path.display());
    println!(
        "Supabase URL: {}",
        settings.supabase_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Supabase anon key: {}",
        if settings.supabase_anon_key.is_some() {
            "[REDACTED]"
        } else {
            "(not set)"
        }
    );
    println!("Sync interval: {}s", settings.sync_interval.as_secs());
    println!("Probe timeout: {}ms", settings.probe_timeout.as_millis());
    println!("Request timeout: {}s", settings.request_timeout.as_secs());
    println!("Sessions table: {}", settings.sessions_table);
    println!("Events table: {}", settings.events_table);
    Ok(())
}
