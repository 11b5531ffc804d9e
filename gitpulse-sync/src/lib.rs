//! # gitpulse-sync
//!
//! The active half of gitpulse: watches a working directory, schedules
//! flushes of the change ledger, and drives the checkpoint repository
//! through a serialized git operation queue.

pub mod config;
pub mod executor;
pub mod git;
pub mod scheduler;
pub mod service;
pub mod watcher;

pub use config::SyncConfig;
pub use executor::SyncExecutor;
pub use scheduler::{Flusher, SyncScheduler};
pub use service::SyncService;
pub use watcher::FileWatcher;
