//! # gitpulse-core
//!
//! Core library for gitpulse - change aggregation for scheduled git checkpoints.
//!
//! This crate provides the pure pieces of the pipeline: deciding whether a
//! filesystem event is trackable, coalescing repeated events per path into a
//! single pending change, composing checkpoint messages, and the typed event
//! surface callers subscribe to. Everything that touches a repository lives
//! in `gitpulse-sync`.

pub mod classifier;
pub mod compose;
pub mod error;
pub mod events;
pub mod ledger;
pub mod models;

pub use classifier::{ChangeClassifier, ClassifierConfig};
pub use compose::{DefaultComposer, MessageComposer};
pub use error::{Error, Result};
pub use events::{EventHub, SyncEvent};
pub use ledger::ChangeLedger;
pub use models::{ChangeKind, ChangeRecord, CommitId, SyncJob};
