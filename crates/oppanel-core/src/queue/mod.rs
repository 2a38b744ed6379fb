//! Write-intent queue manager.
//!
//! Owns the offline path for production writes: intents that could not reach
//! the remote store are appended to an [`IntentLog`] and replayed by drain
//! cycles. Delivery is at-least-once. An intent whose remote write succeeded
//! is re-sent if the process dies before the local row is removed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::connectivity::Connectivity;
use crate::db::IntentLog;
use crate::models::{IntentAction, IntentId, NewIntent, SessionClose, WriteIntent};
use crate::remote::{RemoteError, RemoteStore};
use crate::state::{StatusObserver, SyncStatus};


/// How a drain cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DrainOutcome {
    /// Every snapshotted intent was attempted.
    #[default]
    Completed,
    /// The connectivity oracle reported offline; nothing was attempted.
    Offline,
    /// The log held no deliverable intents (or could not be read).
    Idle,
    /// Another cycle was still in flight.
    AlreadyRunning,
}

/// Summary of one drain cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DrainReport {
    pub outcome: DrainOutcome,
    /// Intents in the snapshot.
    pub attempted: usize,
    /// Confirmed remotely and removed locally.
    pub applied: usize,
    /// Removed without a remote change (no open session to close).
    pub discarded: usize,
    /// Left in the log for the next cycle.
    pub retained: usize,
}

impl DrainReport {
    const fn short_circuit(outcome: DrainOutcome) -> Self {
        Self {
            outcome,
            attempted: 0,
            applied: 0,
            discarded: 0,
            retained: 0,
        }
    }

    /// Whether the cycle actually ran (and therefore emitted status updates).
    pub const fn ran(&self) -> bool {
        matches!(self.outcome, DrainOutcome::Completed)
    }
}

/// Result of [`QueueManager::write_or_enqueue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Written directly to the remote store.
    Written,
    /// Persisted locally for a later drain cycle.
    Queued(IntentId),
    /// A session close found no open session remotely; nothing to do.
    NothingToClose,
    /// Neither the remote write nor local persistence succeeded.
    Lost,
}

/// Remote result of one intent.
enum Reconciled {
    Applied,
    Mismatch,
    Failed(RemoteError),
}

/// Releases the in-progress flag when a cycle ends, however it ends.
struct DrainGuard<'a>(&'a AtomicBool);

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives reconciliation of the local intent log against the remote store.
///
/// Constructed once and passed to whatever records events or schedules
/// drains; all collaborators are injected.
pub struct QueueManager<L, R, C> {
    log: L,
    remote: R,
    connectivity: C,
    observers: Mutex<Vec<Arc<dyn StatusObserver>>>,
    draining: AtomicBool,
}

impl<L, R, C> QueueManager<L, R, C>
where
    L: IntentLog,
    R: RemoteStore,
    C: Connectivity,
{
    pub fn new(log: L, remote: R, connectivity: C) -> Self {
        Self {
            log,
            remote,
            connectivity,
            observers: Mutex::new(Vec::new()),
            draining: AtomicBool::new(false),
        }
    }

    pub const fn log(&self) -> &L {
        &self.log
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    pub const fn connectivity(&self) -> &C {
        &self.connectivity
    }

    /// Register an observer for every future drain cycle.
    pub fn subscribe(&self, observer: Arc<dyn StatusObserver>) {
        self.observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Persist an intent for later delivery.
    ///
    /// Returns `false` when local storage failed; the intent is then lost and
    /// the caller decides how to alert the operator.
    pub async fn add_to_queue(&self, table: &str, action: IntentAction) -> bool {
        self.enqueue(NewIntent::new(table, action)).await.is_some()
    }

    /// Number of pending intents, zero when the log cannot be read.
    pub async fn pending(&self) -> usize {
        match self.log.count().await {
            Ok(count) => count,
            Err(error) => {
                tracing::error!("Failed to count queued intents: {}", error);
                0
            }
        }
    }

    /// Write directly when possible, otherwise queue.
    ///
    /// Direct writes are only attempted while online and with an empty queue,
    /// so a fresh event never overtakes older queued ones.
    pub async fn write_or_enqueue(&self, table: &str, action: IntentAction) -> WriteOutcome {
        let intent = NewIntent::new(table, action);

        if !self.connectivity.is_online() {
            tracing::debug!("Offline; queueing {} for {}", intent.action.kind(), table);
        } else if self.pending().await > 0 {
            tracing::debug!(
                "Queue not empty; queueing {} for {} behind older intents",
                intent.action.kind(),
                table
            );
        } else {
            match self.reconcile(&intent.table, &intent.action).await {
                Reconciled::Applied => return WriteOutcome::Written,
                Reconciled::Mismatch => {
                    Self::log_mismatch(&intent.table, &intent.action);
                    return WriteOutcome::NothingToClose;
                }
                Reconciled::Failed(error) => {
                    tracing::warn!(
                        "Direct write of {} to {} failed, queueing: {}",
                        intent.action.kind(),
                        table,
                        error
                    );
                }
            }
        }

        self.enqueue(intent)
            .await
            .map_or(WriteOutcome::Lost, WriteOutcome::Queued)
    }

    /// Run one drain cycle.
    ///
    /// `on_status` receives `SYNCING` and `ONLINE` in addition to subscribed
    /// observers. Nothing is reported when the cycle short-circuits, and no
    /// error escapes: failures are logged and the affected intents stay queued.
    pub async fn process_queue(&self, on_status: Option<&dyn StatusObserver>) -> DrainReport {
        if self
            .draining
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Drain cycle already in progress; skipping");
            return DrainReport::short_circuit(DrainOutcome::AlreadyRunning);
        }
        let _guard = DrainGuard(&self.draining);

        if !self.connectivity.is_online() {
            return DrainReport::short_circuit(DrainOutcome::Offline);
        }

        let snapshot = match self.log.list_all().await {
            Ok(intents) if intents.is_empty() => {
                return DrainReport::short_circuit(DrainOutcome::Idle);
            }
            Ok(intents) => intents,
            Err(error) => {
                tracing::error!("Failed to load queued intents: {}", error);
                return DrainReport::short_circuit(DrainOutcome::Idle);
            }
        };

        self.notify(SyncStatus::Syncing, on_status);
        let report = self.drain_snapshot(snapshot).await;
        self.notify(SyncStatus::Online, on_status);

        tracing::info!(
            "Drain cycle finished: {} attempted, {} applied, {} discarded, {} retained",
            report.attempted,
            report.applied,
            report.discarded,
            report.retained
        );
        report
    }

    async fn drain_snapshot(&self, mut snapshot: Vec<WriteIntent>) -> DrainReport {
        let mut report = DrainReport::default();
        snapshot.sort_by_key(WriteIntent::order_key);
        report.attempted = snapshot.len();

        for intent in &snapshot {
            match self.reconcile(&intent.table, &intent.action).await {
                Reconciled::Applied => {
                    if self.remove(intent).await {
                        tracing::debug!("Synced queued intent {} to {}", intent.id, intent.table);
                        report.applied += 1;
                    } else {
                        report.retained += 1;
                    }
                }
                Reconciled::Mismatch => {
                    Self::log_mismatch(&intent.table, &intent.action);
                    if self.remove(intent).await {
                        report.discarded += 1;
                    } else {
                        report.retained += 1;
                    }
                }
                Reconciled::Failed(error) => {
                    tracing::warn!(
                        "Could not sync queued intent {} ({} to {}), will retry later: {}",
                        intent.id,
                        intent.action.kind(),
                        intent.table,
                        error
                    );
                    report.retained += 1;
                }
            }
        }

        report
    }

    async fn reconcile(&self, table: &str, action: &IntentAction) -> Reconciled {
        let result = match action {
            IntentAction::Insert(record) => self.remote.insert(table, record).await,
            IntentAction::CloseSession(close) => return self.close_session(table, close).await,
        };

        match result {
            Ok(()) => Reconciled::Applied,
            Err(error) => Reconciled::Failed(error),
        }
    }

    /// Find-then-update for a session close.
    async fn close_session(&self, table: &str, close: &SessionClose) -> Reconciled {
        let lookup = self
            .remote
            .find_open_session(table, close.machine_id, close.operator_id)
            .await;

        let session = match lookup {
            Ok(Some(session)) => session,
            Ok(None) => return Reconciled::Mismatch,
            Err(error) if error.is_no_rows() => return Reconciled::Mismatch,
            Err(error) => return Reconciled::Failed(error),
        };

        match self.remote.update_session(table, session.id, close).await {
            Ok(()) => Reconciled::Applied,
            Err(error) => Reconciled::Failed(error),
        }
    }

    /// Remove a reconciled intent; a local failure keeps it for a re-send.
    async fn remove(&self, intent: &WriteIntent) -> bool {
        match self.log.remove(intent.id).await {
            Ok(()) => true,
            Err(error) => {
                tracing::error!(
                    "Critical: intent {} reached {} but could not be removed locally; it will be sent again: {}",
                    intent.id,
                    intent.table,
                    error
                );
                false
            }
        }
    }

    async fn enqueue(&self, intent: NewIntent) -> Option<IntentId> {
        match self.log.enqueue(&intent).await {
            Ok(id) => {
                tracing::info!(
                    "Queued {} for {} as intent {}",
                    intent.action.kind(),
                    intent.table,
                    id
                );
                Some(id)
            }
            Err(error) => {
                tracing::error!(
                    "Failed to queue {} for {}: {}",
                    intent.action.kind(),
                    intent.table,
                    error
                );
                None
            }
        }
    }

    fn log_mismatch(table: &str, action: &IntentAction) {
        if let IntentAction::CloseSession(close) = action {
            tracing::warn!(
                "No open session in {} for machine {} / operator {}; dropping close ({})",
                table,
                close.machine_id,
                close.operator_id,
                close.reason
            );
        }
    }

    fn notify(&self, status: SyncStatus, on_status: Option<&dyn StatusObserver>) {
        tracing::debug!("Sync status: {}", status);
        let observers = self
            .observers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for observer in &observers {
            observer.on_status(status);
        }
        if let Some(callback) = on_status {
            callback.on_status(status);
        }
    }
}
