//! Local database layer for OpPanel

mod connection;
mod intent_log;
mod memory_log;
mod migrations;

pub use connection::Database;
pub use intent_log::{IntentLog, SqliteIntentLog};
pub use memory_log::MemoryIntentLog;
