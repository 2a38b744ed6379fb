//! Durable local log of write intents

use std::path::Path;
use std::sync::Arc;

use rusqlite::{params, Connection, OptionalExtension};
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::models::{
    format_timestamp, parse_timestamp, IntentAction, IntentId, NewIntent, WriteIntent,
};

use super::Database;

/// Trait for the ordered store of not-yet-confirmed write intents
#[allow(async_fn_in_trait)]
pub trait IntentLog {
    /// Append an intent and return its newly assigned id
    async fn enqueue(&self, intent: &NewIntent) -> Result<IntentId>;

    /// Snapshot every pending intent in insertion order
    ///
    /// Stored rows that no longer decode into an intent are dropped from the
    /// log rather than returned.
    async fn list_all(&self) -> Result<Vec<WriteIntent>>;

    /// Delete an intent; missing ids are a no-op
    async fn remove(&self, id: IntentId) -> Result<()>;

    /// Number of pending intents
    async fn count(&self) -> Result<usize>;
}

/// `SQLite` implementation of `IntentLog`
///
/// Cloning shares the connection, so the application can enqueue while a
/// drain cycle holds another handle.
#[derive(Clone)]
pub struct SqliteIntentLog {
    conn: Arc<Mutex<Connection>>,
}

/// Row as stored, before the action payload is decoded
struct StoredRow {
    id: i64,
    table: String,
    action: String,
    data: String,
    created_at: String,
}

impl SqliteIntentLog {
    /// Wrap an opened (and migrated) database
    pub fn new(database: Database) -> Self {
        Self {
            conn: Arc::new(Mutex::new(database.into_connection())),
        }
    }

    /// Open the log at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(Database::open(path)?))
    }

    /// Open an in-memory log (useful for testing)
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self::new(Database::open_in_memory()?))
    }

    /// Fetch a single intent by id
    pub async fn get(&self, id: IntentId) -> Result<Option<WriteIntent>> {
        let conn = self.conn.lock().await;
        let row = conn
            .query_row(
                "SELECT id, \"table\", action, data, created_at FROM offline_queue WHERE id = ?",
                params![id.get()],
                Self::parse_row,
            )
            .optional()?;

        row.map(Self::decode).transpose()
    }

    fn parse_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredRow> {
        Ok(StoredRow {
            id: row.get(0)?,
            table: row.get(1)?,
            action: row.get(2)?,
            data: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    fn decode(row: StoredRow) -> Result<WriteIntent> {
        Ok(WriteIntent {
            id: IntentId::new(row.id),
            table: row.table,
            action: IntentAction::from_parts(&row.action, &row.data)?,
            created_at: parse_timestamp(&row.created_at)?,
        })
    }
}

impl IntentLog for SqliteIntentLog {
    async fn enqueue(&self, intent: &NewIntent) -> Result<IntentId> {
        if intent.table.trim().is_empty() {
            return Err(Error::InvalidInput("target table must not be empty".into()));
        }

        let data = intent.action.to_data()?;
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO offline_queue (\"table\", action, data, created_at) VALUES (?, ?, ?, ?)",
            params![
                intent.table,
                intent.action.kind(),
                data,
                format_timestamp(intent.created_at)
            ],
        )?;

        Ok(IntentId::new(conn.last_insert_rowid()))
    }

    async fn list_all(&self) -> Result<Vec<WriteIntent>> {
        let rows = {
            let conn = self.conn.lock().await;
            let mut stmt = conn.prepare(
                "SELECT id, \"table\", action, data, created_at
                 FROM offline_queue
                 ORDER BY id ASC",
            )?;
            let rows = stmt
                .query_map([], Self::parse_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut intents = Vec::with_capacity(rows.len());
        let mut unreadable = Vec::new();
        for row in rows {
            let id = row.id;
            match Self::decode(row) {
                Ok(intent) => intents.push(intent),
                Err(error) => {
                    tracing::warn!("Discarding undecodable queued intent {}: {}", id, error);
                    unreadable.push(id);
                }
            }
        }

        if !unreadable.is_empty() {
            let conn = self.conn.lock().await;
            for id in unreadable {
                if let Err(error) =
                    conn.execute("DELETE FROM offline_queue WHERE id = ?", params![id])
                {
                    tracing::error!("Failed to discard queued intent {}: {}", id, error);
                }
            }
        }

        Ok(intents)
    }

    async fn remove(&self, id: IntentId) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute("DELETE FROM offline_queue WHERE id = ?", params![id.get()])?;
        Ok(())
    }

    async fn count(&self) -> Result<usize> {
        let conn = self.conn.lock().await;
        let count = conn.query_row("SELECT COUNT(*) FROM offline_queue", [], |row| {
            row.get::<_, usize>(0)
        })?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SessionClose;
    use chrono::{Duration, TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn insert(table: &str, value: i64) -> NewIntent {
        NewIntent::new(table, IntentAction::Insert(serde_json::json!({ "value": value })))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_enqueue_and_list() {
        let log = SqliteIntentLog::open_in_memory().unwrap();

        let first = log.enqueue(&insert("uretim_loglari", 1)).await.unwrap();
        let second = log.enqueue(&insert("uretim_loglari", 2)).await.unwrap();
        assert!(second > first);

        let intents = log.list_all().await.unwrap();
        assert_eq!(intents.len(), 2);
        assert_eq!(intents[0].id, first);
        assert_eq!(intents[1].id, second);
        assert_eq!(
            intents[0].action,
            IntentAction::Insert(serde_json::json!({ "value": 1 }))
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_close_session_survives_storage() {
        let log = SqliteIntentLog::open_in_memory().unwrap();
        let ended_at = Utc.with_ymd_and_hms(2025, 3, 4, 14, 30, 0).unwrap();
        let action = IntentAction::CloseSession(SessionClose::new(7, 3, ended_at, "Mola"));

        let id = log
            .enqueue(&NewIntent::new("durus_loglari", action.clone()).with_created_at(ended_at))
            .await
            .unwrap();

        let stored = log.get(id).await.unwrap().unwrap();
        assert_eq!(stored.table, "durus_loglari");
        assert_eq!(stored.action, action);
        assert_eq!(stored.created_at, ended_at);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remove_is_idempotent() {
        let log = SqliteIntentLog::open_in_memory().unwrap();
        let id = log.enqueue(&insert("t", 1)).await.unwrap();

        log.remove(id).await.unwrap();
        log.remove(id).await.unwrap();
        log.remove(IntentId::new(9_999)).await.unwrap();

        assert_eq!(log.count().await.unwrap(), 0);
        assert!(log.get(id).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_ids_are_never_reused() {
        let log = SqliteIntentLog::open_in_memory().unwrap();
        let first = log.enqueue(&insert("t", 1)).await.unwrap();
        log.remove(first).await.unwrap();

        let second = log.enqueue(&insert("t", 2)).await.unwrap();
        assert!(second > first);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejects_empty_table() {
        let log = SqliteIntentLog::open_in_memory().unwrap();
        assert!(log.enqueue(&insert("  ", 1)).await.is_err());
        assert_eq!(log.count().await.unwrap(), 0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_undecodable_rows_are_discarded() {
        let log = SqliteIntentLog::open_in_memory().unwrap();
        let kept = log.enqueue(&insert("t", 1)).await.unwrap();
        {
            let conn = log.conn.lock().await;
            conn.execute(
                "INSERT INTO offline_queue (\"table\", action, data, created_at) VALUES ('t', 'UPSERT', '{}', '2025-01-01T00:00:00.000Z')",
                [],
            )
            .unwrap();
            conn.execute(
                "INSERT INTO offline_queue (\"table\", action, data, created_at) VALUES ('t', 'INSERT', '{}', 'yesterday')",
                [],
            )
            .unwrap();
        }
        assert_eq!(log.count().await.unwrap(), 3);

        let intents = log.list_all().await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].id, kept);
        assert_eq!(log.count().await.unwrap(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_intents_survive_reopen() {
        let tmp = tempdir().unwrap();
        let db_path = tmp.path().join("queue.db");
        let created_at = Utc::now() - Duration::minutes(5);

        {
            let log = SqliteIntentLog::open(&db_path).unwrap();
            log.enqueue(&insert("uretim_loglari", 42).with_created_at(created_at))
                .await
                .unwrap();
        }

        let reopened = SqliteIntentLog::open(&db_path).unwrap();
        let intents = reopened.list_all().await.unwrap();
        assert_eq!(intents.len(), 1);
        assert_eq!(intents[0].table, "uretim_loglari");
        assert_eq!(
            intents[0].created_at.timestamp_millis(),
            created_at.timestamp_millis()
        );
    }
}
