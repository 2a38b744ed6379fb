//! Data models for OpPanel

mod event;
mod intent;

pub use event::{EventKind, ProductionEvent};
pub use intent::{
    format_timestamp, parse_timestamp, IntentAction, IntentId, NewIntent, SessionClose,
    WriteIntent,
};
