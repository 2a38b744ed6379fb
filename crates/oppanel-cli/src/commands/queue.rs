use std::path::Path;

use chrono::Utc;
use oppanel_core::config::SyncSettings;
use oppanel_core::db::IntentLog;
use oppanel_core::models::{parse_timestamp, NewIntent, SessionClose};
use oppanel_core::{IntentAction, WriteIntent};
use serde_json::Value;

use crate::cli::QueueCommands;
use crate::commands::common::{
    format_intent_lines, intent_to_list_item, open_log, QueueListItem,
};
use crate::error::CliError;

pub async fn run_queue(
    command: QueueCommands,
    db_path: &Path,
    settings: &SyncSettings,
) -> Result<(), CliError> {
    match command {
        QueueCommands::List { json } => run_queue_list(json, db_path).await,
        QueueCommands::AddInsert { table, data } => {
            let action = IntentAction::Insert(parse_record(&data)?);
            enqueue(db_path, &table, action).await
        }
        QueueCommands::AddClose {
            station,
            reason,
            ended_at,
            table,
        } => {
            let ended_at = match ended_at {
                Some(value) => parse_timestamp(value.trim())?,
                None => Utc::now(),
            };
            let action = IntentAction::CloseSession(SessionClose::new(
                station.machine_id,
                station.operator_id,
                ended_at,
                reason.trim(),
            ));
            let table = table.unwrap_or_else(|| settings.sessions_table.clone());
            enqueue(db_path, &table, action).await
        }
        QueueCommands::Count => {
            let log = open_log(db_path)?;
            println!("{}", log.count().await?);
            Ok(())
        }
    }
}

/// Queued intents in the order a drain cycle would attempt them.
pub async fn list_queue(db_path: &Path) -> Result<Vec<WriteIntent>, CliError> {
    let log = open_log(db_path)?;
    let mut intents = log.list_all().await?;
    intents.sort_by_key(WriteIntent::order_key);
    Ok(intents)
}

async fn run_queue_list(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let intents = list_queue(db_path).await?;

    if as_json {
        let json_items = intents
            .iter()
            .map(intent_to_list_item)
            .collect::<Result<Vec<QueueListItem>, CliError>>()?;
        println!("{}", serde_json::to_string_pretty(&json_items)?);
        return Ok(());
    }

    if intents.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    for line in format_intent_lines(&intents) {
        println!("{line}");
    }
    Ok(())
}

async fn enqueue(db_path: &Path, table: &str, action: IntentAction) -> Result<(), CliError> {
    let log = open_log(db_path)?;
    let id = log.enqueue(&NewIntent::new(table.trim(), action)).await?;
    println!("{id}");
    Ok(())
}

pub fn parse_record(raw: &str) -> Result<Value, CliError> {
    let value: Value = serde_json::from_str(raw.trim())?;
    if !value.is_object() {
        return Err(CliError::InvalidInput(
            "Insert data must be a JSON object".to_string(),
        ));
    }
    Ok(value)
}
