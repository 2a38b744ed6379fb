//! Write intent model

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Local surrogate key of a queued intent.
///
/// Assigned by the log at enqueue time, monotonically increasing and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct IntentId(i64);

impl IntentId {
    #[must_use]
    pub const fn new(value: i64) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Fields needed to close the open production session of a machine/operator pair.
///
/// Serialized with the remote column names (`bitis` = end timestamp,
/// `sebep` = reason code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClose {
    pub machine_id: i64,
    pub operator_id: i64,
    #[serde(rename = "bitis")]
    pub ended_at: DateTime<Utc>,
    #[serde(rename = "sebep")]
    pub reason: String,
}

impl SessionClose {
    pub fn new(
        machine_id: i64,
        operator_id: i64,
        ended_at: DateTime<Utc>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            machine_id,
            operator_id,
            ended_at,
            reason: reason.into(),
        }
    }

    /// Columns written onto the remote session row.
    #[must_use]
    pub fn update_fields(&self) -> Value {
        serde_json::json!({
            "bitis": format_timestamp(self.ended_at),
            "sebep": self.reason,
        })
    }
}

/// What a queued intent does once it reaches the remote store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentAction {
    /// Insert the full record into the target table.
    Insert(Value),
    /// Find the open session for the pair and stamp its end time and reason.
    CloseSession(SessionClose),
}

impl IntentAction {
    /// Persisted action name for inserts.
    pub const INSERT: &'static str = "INSERT";
    /// Persisted action name for session closes.
    pub const CLOSE_SESSION: &'static str = "STOP_PRODUCTION";

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => Self::INSERT,
            Self::CloseSession(_) => Self::CLOSE_SESSION,
        }
    }

    /// Serialize the payload for the `data` column.
    pub fn to_data(&self) -> Result<String> {
        match self {
            Self::Insert(record) => Ok(serde_json::to_string(record)?),
            Self::CloseSession(close) => Ok(serde_json::to_string(close)?),
        }
    }

    /// Rebuild an action from its persisted `action` and `data` columns.
    pub fn from_parts(kind: &str, data: &str) -> Result<Self> {
        match kind {
            Self::INSERT => Ok(Self::Insert(serde_json::from_str(data)?)),
            Self::CLOSE_SESSION => Ok(Self::CloseSession(serde_json::from_str(data)?)),
            other => Err(Error::InvalidInput(format!(
                "unknown queued action: {other}"
            ))),
        }
    }
}

/// An intent about to be written to the local log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIntent {
    pub table: String,
    pub action: IntentAction,
    pub created_at: DateTime<Utc>,
}

impl NewIntent {
    /// Create an intent stamped with the current time.
    pub fn new(table: impl Into<String>, action: IntentAction) -> Self {
        Self {
            table: table.into(),
            action,
            created_at: Utc::now(),
        }
    }

    /// Override the enqueue timestamp.
    #[must_use]
    pub const fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// A deferred write awaiting confirmation against the remote store.
///
/// Presence in the local log means "pending"; there is no status field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteIntent {
    pub id: IntentId,
    pub table: String,
    pub action: IntentAction,
    pub created_at: DateTime<Utc>,
}

impl WriteIntent {
    /// Key used to order a drain cycle: enqueue time, then insertion order.
    #[must_use]
    pub const fn order_key(&self) -> (DateTime<Utc>, IntentId) {
        (self.created_at, self.id)
    }
}

/// Render a timestamp the way it is persisted locally and sent remotely.
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a persisted RFC 3339 timestamp.
pub fn parse_timestamp(value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| Error::InvalidInput(format!("invalid timestamp '{value}': {error}")))
}
