//! oppanel-core - Core library for OpPanel
//!
//! This crate contains the production event models, the durable write-intent
//! log, and the queue manager that reconciles queued writes with the remote
//! production database once the terminal is back online.

pub mod config;
pub mod connectivity;
pub mod db;
pub mod error;
pub mod models;
pub mod queue;
pub mod remote;
pub mod state;
pub mod sync;
pub mod util;

pub use error::{Error, Result};
pub use models::{IntentAction, IntentId, ProductionEvent, WriteIntent};
pub use queue::{DrainOutcome, DrainReport, QueueManager, WriteOutcome};
pub use state::{StatusObserver, SyncStatus};
