//! Shared sync status types.

use std::fmt;

/// Coarse status reported to observers around a drain cycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SyncStatus {
    /// A drain cycle is replaying queued intents.
    Syncing,
    /// The last drain cycle finished; the terminal is connected.
    Online,
}

impl SyncStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Syncing => "SYNCING",
            Self::Online => "ONLINE",
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receives status transitions emitted by the queue manager.
///
/// Closures taking a [`SyncStatus`] implement this trait, so a UI badge and a
/// logger can both subscribe without a dedicated type.
pub trait StatusObserver: Send + Sync {
    fn on_status(&self, status: SyncStatus);
}

impl<F> StatusObserver for F
where
    F: Fn(SyncStatus) + Send + Sync,
{
    fn on_status(&self, status: SyncStatus) {
        self(status);
    }
}
