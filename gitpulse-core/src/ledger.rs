use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::models::{ChangeKind, ChangeRecord, Transition};

/// In-memory coalesced set of pending file changes awaiting sync.
///
/// All mutation goes through one mutex; `record` and `snapshot_and_clear`
/// are short critical sections that never block on IO. A record arriving
/// while a snapshot is taken lands in the next cycle, never in both.
#[derive(Debug, Default)]
pub struct ChangeLedger {
    inner: Mutex<LedgerInner>,
}

#[derive(Debug, Default)]
struct LedgerInner {
    records: HashMap<PathBuf, ChangeRecord>,
    /// Paths in order of first observation; drives stable snapshots.
    order: Vec<PathBuf>,
}

impl ChangeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a new event into the ledger via the kind-transition table.
    ///
    /// An `Added` followed by a `Deleted` removes the entry outright; a
    /// `Modified` whose content hash equals the tracked one is dropped as
    /// a no-op write.
    pub fn record(&self, record: ChangeRecord) {
        let mut inner = self.inner.lock().unwrap();

        let existing = inner
            .records
            .get(&record.path)
            .map(|e| (e.kind, e.content_hash.clone()));

        match existing {
            None => {
                inner.order.push(record.path.clone());
                inner.records.insert(record.path.clone(), record);
            }
            Some((existing_kind, existing_hash)) => {
                if record.kind == ChangeKind::Modified
                    && record.content_hash.is_some()
                    && record.content_hash == existing_hash
                {
                    debug!(path = %record.path.display(), "ignoring no-op modify");
                    return;
                }

                match ChangeKind::apply(existing_kind, record.kind) {
                    Transition::Keep(kind) => {
                        let entry = inner.records.get_mut(&record.path).unwrap();
                        entry.kind = kind;
                        entry.observed_at = record.observed_at;
                        if record.content.is_some() {
                            entry.content = record.content;
                            entry.content_hash = record.content_hash;
                        } else if kind == ChangeKind::Deleted {
                            entry.content = None;
                            entry.content_hash = None;
                        }
                    }
                    Transition::Remove => {
                        inner.records.remove(&record.path);
                        inner.order.retain(|p| p != &record.path);
                    }
                }
            }
        }
    }

    /// Atomically capture all pending records (in first-observation order)
    /// and reset the ledger for the next cycle.
    pub fn snapshot_and_clear(&self) -> Vec<ChangeRecord> {
        let mut inner = self.inner.lock().unwrap();
        let drained = std::mem::take(&mut *inner);

        let mut records = drained.records;
        drained
            .order
            .into_iter()
            .filter_map(|path| records.remove(&path))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a path is currently tracked (test and status helper).
    pub fn contains(&self, path: &Path) -> bool {
        self.inner.lock().unwrap().records.contains_key(path)
    }
}
