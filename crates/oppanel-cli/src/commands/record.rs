use std::path::Path;

use oppanel_core::config::SyncSettings;
use oppanel_core::db::IntentLog;
use oppanel_core::models::NewIntent;
use oppanel_core::{ProductionEvent, WriteOutcome};

use crate::cli::RecordCommands;
use crate::commands::common::{build_manager, open_log};
use crate::error::CliError;

pub fn event_from_command(command: RecordCommands) -> Result<ProductionEvent, CliError> {
    let event = match command {
        RecordCommands::Start { station } => {
            ProductionEvent::start(station.machine_id, station.operator_id)
        }
        RecordCommands::Stop { station, reason } => ProductionEvent::stop(
            station.machine_id,
            station.operator_id,
            required_text(&reason, "Stop reason")?,
        ),
        RecordCommands::Error { station, reason } => ProductionEvent::error(
            station.machine_id,
            station.operator_id,
            required_text(&reason, "Error description")?,
        ),
        RecordCommands::Count { station, quantity } => {
            ProductionEvent::part_count(station.machine_id, station.operator_id, quantity)
        }
    };
    Ok(event)
}

fn required_text(value: &str, label: &str) -> Result<String, CliError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(CliError::InvalidInput(format!("{label} cannot be empty")));
    }
    Ok(value.to_string())
}

pub async fn run_record(
    command: RecordCommands,
    db_path: &Path,
    settings: &SyncSettings,
) -> Result<(), CliError> {
    let event = event_from_command(command)?;
    let (table, action) = event.to_intent(&settings.sessions_table, &settings.events_table);
    let label = format!(
        "{} for machine {} / operator {}",
        event.kind, event.machine_id, event.operator_id
    );

    if settings.remote().is_none() {
        let log = open_log(db_path)?;
        let id = log.enqueue(&NewIntent::new(table, action)).await?;
        println!("Recorded {label} (remote not configured; queued as intent {id})");
        return Ok(());
    }

    let (manager, _) = build_manager(db_path, settings).await?;
    match manager.write_or_enqueue(&table, action).await {
        WriteOutcome::Written => println!("Recorded {label}"),
        WriteOutcome::Queued(id) => println!("Recorded {label} (queued as intent {id})"),
        WriteOutcome::NothingToClose => {
            println!("No open session for {label}; nothing to stop");
        }
        WriteOutcome::Lost => return Err(CliError::EventLost),
    }
    Ok(())
}
