use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    pub fn as_str(&self) -> &str {
        match self {
            ChangeKind::Added => "added",
            ChangeKind::Modified => "modified",
            ChangeKind::Deleted => "deleted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "added" => Some(ChangeKind::Added),
            "modified" => Some(ChangeKind::Modified),
            "deleted" => Some(ChangeKind::Deleted),
            _ => None,
        }
    }
}

/// Outcome of merging a new event into an already-tracked path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Keep tracking the path with the given kind.
    Keep(ChangeKind),
    /// The events cancel out; drop the record entirely.
    Remove,
}

impl ChangeKind {
    /// Kind-transition table for coalescing repeated events on one path.
    ///
    /// A file added then edited is still "new"; a file added then deleted
    /// before a flush never happened as far as the checkpoint is concerned.
    pub fn apply(existing: ChangeKind, incoming: ChangeKind) -> Transition {
        use ChangeKind::*;
        match (existing, incoming) {
            (Deleted, Added) => Transition::Keep(Added),
            (Added, Modified) => Transition::Keep(Added),
            (Added, Deleted) => Transition::Remove,
            (Modified, Deleted) => Transition::Keep(Deleted),
            (_, incoming) => Transition::Keep(incoming),
        }
    }
}

/// One pending file change awaiting the next checkpoint.
///
/// The ledger holds at most one record per path; new events update the
/// record in place via the transition table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub path: PathBuf,
    pub kind: ChangeKind,
    pub observed_at: DateTime<Utc>,
    /// Inline snapshot of the file at event time, when the watcher could
    /// read it. Deletes carry none.
    pub content: Option<Vec<u8>>,
    pub content_hash: Option<String>,
}

impl ChangeRecord {
    pub fn new(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            path,
            kind,
            observed_at: Utc::now(),
            content: None,
            content_hash: None,
        }
    }

    pub fn with_content(mut self, content: Vec<u8>) -> Self {
        self.content_hash = Some(Self::hash_content(&content));
        self.content = Some(content);
        self
    }

    fn hash_content(content: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(content);
        hex::encode(hasher.finalize())
    }
}

/// An immutable snapshot of the ledger plus its composed message.
///
/// Created at flush time, consumed exactly once by the executor, and
/// discarded after terminal success or failure.
#[derive(Debug, Clone)]
pub struct SyncJob {
    pub id: Uuid,
    pub records: Vec<ChangeRecord>,
    pub message: String,
}

impl SyncJob {
    pub fn new(records: Vec<ChangeRecord>, message: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            records,
            message,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Identifier of a created commit (full hex object id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitId(pub String);

impl std::fmt::Display for CommitId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
