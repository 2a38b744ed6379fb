use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use oppanel_core::config::SyncSettings;
use oppanel_core::sync::{shutdown_signal, SyncWorker, DEFAULT_RECONNECT_POLL};
use oppanel_core::{DrainOutcome, DrainReport, StatusObserver, SyncStatus};

use crate::commands::common::build_manager;
use crate::error::CliError;

pub async fn run_sync(db_path: &Path, settings: &SyncSettings) -> Result<(), CliError> {
    let (manager, _) = build_manager(db_path, settings).await?;

    let printer = |status: SyncStatus| println!("Status: {status}");
    let observer: &dyn StatusObserver = &printer;
    let report = manager.process_queue(Some(observer)).await;

    println!("{}", describe_report(&report, manager.pending().await));
    Ok(())
}

pub async fn run_worker(
    interval: Option<u64>,
    db_path: &Path,
    settings: &SyncSettings,
) -> Result<(), CliError> {
    let interval = match interval {
        Some(0) => {
            return Err(CliError::InvalidInput(
                "Interval must be a positive number of seconds".to_string(),
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => settings.sync_interval,
    };

    let (manager, probe) = build_manager(db_path, settings).await?;
    let manager = Arc::new(manager);
    let monitor = probe.spawn_monitor(
        manager.connectivity().clone(),
        DEFAULT_RECONNECT_POLL,
    );
    manager.subscribe(Arc::new(|status: SyncStatus| {
        tracing::info!("Sync status: {}", status);
    }));

    println!(
        "Syncing every {}s ({} queued). Press Ctrl-C to stop.",
        interval.as_secs(),
        manager.pending().await
    );
    let summary = SyncWorker::new(manager.clone(), interval)
        .run(shutdown_signal())
        .await;
    monitor.abort();

    println!(
        "Stopped after {} cycles: {} applied, {} discarded, {} still queued",
        summary.cycles,
        summary.applied,
        summary.discarded,
        manager.pending().await
    );
    Ok(())
}

pub fn describe_report(report: &DrainReport, pending: usize) -> String {
    match report.outcome {
        DrainOutcome::Offline => format!("Offline; {pending} intents stay queued"),
        DrainOutcome::Idle => "Queue is empty; nothing to sync".to_string(),
        DrainOutcome::AlreadyRunning => "Another sync is in progress".to_string(),
        DrainOutcome::Completed => format!(
            "Synced {} of {}: {} applied, {} discarded, {} retained",
            report.applied + report.discarded,
            report.attempted,
            report.applied,
            report.discarded,
            report.retained
        ),
    }
}
