pub mod common;
pub mod config;
pub mod queue;
pub mod record;
pub mod sync;
