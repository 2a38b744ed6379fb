//! Boundary to the remote production database.

mod supabase;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::models::SessionClose;

pub use supabase::{normalize_rest_url, SupabaseStore};

/// PostgREST code for "the lookup matched no rows".
pub const NO_ROWS_CODE: &str = "PGRST116";

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Invalid remote configuration: {0}")]
    InvalidConfiguration(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse JSON payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Remote API error: {message} ({status})")]
    Api {
        status: u16,
        code: Option<String>,
        message: String,
    },
}

impl RemoteError {
    /// Whether the remote reported an expected empty result rather than a failure.
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::Api { code: Some(code), .. } if code == NO_ROWS_CODE)
    }
}

pub type RemoteResult<T> = Result<T, RemoteError>;

/// The open production session found for a machine/operator pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenSession {
    pub id: i64,
    /// Session start (`baslangic`), as reported by the remote.
    #[serde(rename = "baslangic", default)]
    pub started_at: Option<String>,
}

/// Remote operations the queue manager needs.
///
/// Lookups that match nothing return `Ok(None)`; every other failure is an
/// error and is treated as transient by the caller.
#[allow(async_fn_in_trait)]
pub trait RemoteStore {
    /// Insert a full record into `table`
    async fn insert(&self, table: &str, record: &Value) -> RemoteResult<()>;

    /// Most recent session in `table` for the pair whose end timestamp is unset
    async fn find_open_session(
        &self,
        table: &str,
        machine_id: i64,
        operator_id: i64,
    ) -> RemoteResult<Option<OpenSession>>;

    /// Stamp end timestamp and reason onto session `id`
    async fn update_session(&self, table: &str, id: i64, close: &SessionClose)
        -> RemoteResult<()>;
}
