//! Background drain scheduling.
//!
//! Runs a drain cycle on a fixed interval and immediately after the terminal
//! comes back online. Cycles never overlap: each one is awaited before the
//! next trigger is considered, and the queue manager's own guard covers any
//! other caller draining concurrently.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;

use crate::connectivity::Connectivity;
use crate::db::IntentLog;
use crate::queue::{DrainReport, QueueManager};
use crate::remote::RemoteStore;

/// How often connectivity is polled for an offline-to-online transition.
pub const DEFAULT_RECONNECT_POLL: Duration = Duration::from_secs(2);

/// Totals over the lifetime of one [`SyncWorker::run`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WorkerSummary {
    /// Cycles that actually ran (not skipped as offline, idle, or overlapping).
    pub cycles: usize,
    pub applied: usize,
    pub discarded: usize,
}

impl WorkerSummary {
    fn record(&mut self, report: &DrainReport) {
        if report.ran() {
            self.cycles += 1;
            self.applied += report.applied;
            self.discarded += report.discarded;
        }
    }
}

pub struct SyncWorker<L, R, C> {
    manager: Arc<QueueManager<L, R, C>>,
    interval: Duration,
    reconnect_poll: Duration,
}

impl<L, R, C> SyncWorker<L, R, C>
where
    L: IntentLog,
    R: RemoteStore,
    C: Connectivity,
{
    pub fn new(manager: Arc<QueueManager<L, R, C>>, interval: Duration) -> Self {
        Self {
            manager,
            interval,
            reconnect_poll: DEFAULT_RECONNECT_POLL,
        }
    }

    #[must_use]
    pub const fn with_reconnect_poll(mut self, reconnect_poll: Duration) -> Self {
        self.reconnect_poll = reconnect_poll;
        self
    }

    pub fn manager(&self) -> &Arc<QueueManager<L, R, C>> {
        &self.manager
    }

    /// Drain until `shutdown` resolves.
    ///
    /// The first cycle starts right away. A cycle in flight when shutdown
    /// fires is finished before returning.
    pub async fn run(&self, shutdown: impl Future<Output = ()>) -> WorkerSummary {
        let mut summary = WorkerSummary::default();

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut reconnect = tokio::time::interval(self.reconnect_poll);
        reconnect.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut was_online = self.manager.connectivity().is_online();
        tracing::info!(
            "Sync worker started (interval {:?}, {})",
            self.interval,
            if was_online { "online" } else { "offline" }
        );

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    let report = self.manager.process_queue(None).await;
                    summary.record(&report);
                }
                _ = reconnect.tick() => {
                    let online = self.manager.connectivity().is_online();
                    if online && !was_online {
                        tracing::info!("Connectivity restored; draining queue");
                        let report = self.manager.process_queue(None).await;
                        summary.record(&report);
                    }
                    was_online = online;
                }
            }
        }

        tracing::info!(
            "Sync worker stopped after {} cycles ({} applied, {} discarded)",
            summary.cycles,
            summary.applied,
            summary.discarded
        );
        summary
    }
}

/// Resolves on Ctrl+C, or SIGTERM on Unix.
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    () = ctrl_c_or_never(tokio::signal::ctrl_c()) => {}
                    _ = term.recv() => {}
                }
            }
            Err(error) => {
                tracing::warn!("SIGTERM handler unavailable: {}", error);
                ctrl_c_or_never(tokio::signal::ctrl_c()).await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c_or_never(tokio::signal::ctrl_c()).await;
    }
}

/// Waits for Ctrl+C; a handler that cannot be installed never fires.
async fn ctrl_c_or_never(ctrl_c: impl Future<Output = std::io::Result<()>>) {
    if let Err(error) = ctrl_c.await {
        tracing::warn!("Ctrl+C handler unavailable: {}", error);
        std::future::pending::<()>().await;
    }
}
