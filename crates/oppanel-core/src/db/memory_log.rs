//! In-memory intent log

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{IntentId, NewIntent, WriteIntent};

use super::IntentLog;

/// Process-local `IntentLog` used where durability is not needed (tests, demos).
///
/// Writes can be switched off to reproduce local storage failures.
#[derive(Default)]
pub struct MemoryIntentLog {
    state: Mutex<MemoryState>,
    read_only: AtomicBool,
}

#[derive(Default)]
struct MemoryState {
    last_id: i64,
    intents: BTreeMap<IntentId, WriteIntent>,
}

impl MemoryIntentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `enqueue` and `remove` fail as if the disk were full
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.read_only.load(Ordering::SeqCst) {
            Err(Error::Database("intent log is read-only".into()))
        } else {
            Ok(())
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| Error::Database("intent log lock poisoned".into()))
    }
}

impl IntentLog for MemoryIntentLog {
    async fn enqueue(&self, intent: &NewIntent) -> Result<IntentId> {
        self.ensure_writable()?;
        if intent.table.trim().is_empty() {
            return Err(Error::InvalidInput("target table must not be empty".into()));
        }

        let mut state = self.lock()?;
        state.last_id += 1;
        let id = IntentId::new(state.last_id);
        state.intents.insert(
            id,
            WriteIntent {
                id,
                table: intent.table.clone(),
                action: intent.action.clone(),
                created_at: intent.created_at,
            },
        );
        Ok(id)
    }

    async fn list_all(&self) -> Result<Vec<WriteIntent>> {
        Ok(self.lock()?.intents.values().cloned().collect())
    }

    async fn remove(&self, id: IntentId) -> Result<()> {
        self.ensure_writable()?;
        self.lock()?.intents.remove(&id);
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.lock()?.intents.len())
    }
}
