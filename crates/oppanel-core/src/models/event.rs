//! Production event model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::intent::{format_timestamp, IntentAction, SessionClose};

/// Kind of event an operator records at the terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventKind {
    /// Production run started; opens a session.
    Start,
    /// Production stopped with a reason; closes the open session.
    Stop,
    /// Machine fault with a reason.
    Error,
    /// Produced part count.
    PartCount,
}

impl EventKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Stop => "STOP",
            Self::Error => "ERROR",
            Self::PartCount => "PART_COUNT",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "START" => Ok(Self::Start),
            "STOP" => Ok(Self::Stop),
            "ERROR" => Ok(Self::Error),
            "PART_COUNT" | "COUNT" => Ok(Self::PartCount),
            other => Err(format!("unknown event kind: {other}")),
        }
    }
}

/// A production event tied to a machine and the operator at the terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductionEvent {
    pub machine_id: i64,
    pub operator_id: i64,
    pub kind: EventKind,
    pub reason: Option<String>,
    pub quantity: Option<u32>,
    pub recorded_at: DateTime<Utc>,
}

impl ProductionEvent {
    fn new(machine_id: i64, operator_id: i64, kind: EventKind) -> Self {
        Self {
            machine_id,
            operator_id,
            kind,
            reason: None,
            quantity: None,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn start(machine_id: i64, operator_id: i64) -> Self {
        Self::new(machine_id, operator_id, EventKind::Start)
    }

    #[must_use]
    pub fn stop(machine_id: i64, operator_id: i64, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(machine_id, operator_id, EventKind::Stop)
        }
    }

    #[must_use]
    pub fn error(machine_id: i64, operator_id: i64, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(machine_id, operator_id, EventKind::Error)
        }
    }

    #[must_use]
    pub fn part_count(machine_id: i64, operator_id: i64, quantity: u32) -> Self {
        Self {
            quantity: Some(quantity),
            ..Self::new(machine_id, operator_id, EventKind::PartCount)
        }
    }

    /// Override the event timestamp.
    #[must_use]
    pub const fn at(mut self, recorded_at: DateTime<Utc>) -> Self {
        self.recorded_at = recorded_at;
        self
    }

    /// Translate the event into the table and action to write remotely.
    ///
    /// Starts insert a session row with an open end, stops close it, and the
    /// remaining kinds land in the events table.
    pub fn to_intent(&self, sessions_table: &str, events_table: &str) -> (String, IntentAction) {
        match self.kind {
            EventKind::Start => (
                sessions_table.to_string(),
                IntentAction::Insert(serde_json::json!({
                    "machine_id": self.machine_id,
                    "operator_id": self.operator_id,
                    "baslangic": format_timestamp(self.recorded_at),
                    "bitis": null,
                })),
            ),
            EventKind::Stop => (
                sessions_table.to_string(),
                IntentAction::CloseSession(SessionClose::new(
                    self.machine_id,
                    self.operator_id,
                    self.recorded_at,
                    self.reason.clone().unwrap_or_default(),
                )),
            ),
            EventKind::Error | EventKind::PartCount => (
                events_table.to_string(),
                IntentAction::Insert(serde_json::json!({
                    "machine_id": self.machine_id,
                    "operator_id": self.operator_id,
                    "event_type": self.kind.as_str(),
                    "reason": self.reason,
                    "quantity": self.quantity,
                    "recorded_at": format_timestamp(self.recorded_at),
                })),
            ),
        }
    }
}
