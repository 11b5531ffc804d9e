use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use notify::{Event, EventKind, RecursiveMode, Watcher};
use notify_debouncer_full::{new_debouncer, DebounceEventResult, Debouncer, FileIdMap};
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use gitpulse_core::{ChangeClassifier, ChangeKind, ChangeLedger, ChangeRecord};

/// Bridges filesystem events into the ledger.
///
/// Events are debounced, relativized against the project root, filtered
/// through the classifier, and coalesced into the ledger. The watcher holds
/// no other state; dropping it stops the stream.
pub struct FileWatcher {
    _debouncer: Debouncer<notify::RecommendedWatcher, FileIdMap>,
}

impl FileWatcher {
    pub fn new(
        root: PathBuf,
        classifier: Arc<RwLock<ChangeClassifier>>,
        ledger: Arc<ChangeLedger>,
    ) -> anyhow::Result<Self> {
        let (tx, mut rx) = mpsc::channel(100);

        let debouncer = new_debouncer(
            Duration::from_millis(500),
            None,
            move |result: DebounceEventResult| {
                if let Err(e) = tx.blocking_send(result) {
                    error!("Failed to send event: {}", e);
                }
            },
        )?;

        let mut watcher = Self {
            _debouncer: debouncer,
        };

        watcher
            ._debouncer
            .watcher()
            .watch(&root, RecursiveMode::Recursive)?;

        info!("File watcher started for {:?}", root);

        tokio::spawn(async move {
            while let Some(result) = rx.recv().await {
                match result {
                    Ok(events) => {
                        for event in events {
                            Self::handle_event(event.event, &root, &classifier, &ledger);
                        }
                    }
                    Err(errors) => {
                        for error in errors {
                            error!("Watch error: {:?}", error);
                        }
                    }
                }
            }
        });

        Ok(watcher)
    }

    fn handle_event(
        event: Event,
        root: &Path,
        classifier: &Arc<RwLock<ChangeClassifier>>,
        ledger: &Arc<ChangeLedger>,
    ) {
        let kind = match event.kind {
            EventKind::Create(_) => ChangeKind::Added,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Deleted,
            _ => return,
        };

        for path in event.paths {
            let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();

            let accepted = {
                let classifier = classifier.read().unwrap();
                // The bookkeeping check needs the absolute path; exclude
                // patterns and extensions work on the relative one.
                !path.starts_with(&classifier.config().bookkeeping_dir)
                    && classifier.classify(&relative)
            };
            if !accepted {
                debug!("Ignoring {:?}", relative);
                continue;
            }

            let mut record = ChangeRecord::new(relative, kind);
            if kind != ChangeKind::Deleted {
                if let Ok(content) = std::fs::read(&path) {
                    record = record.with_content(content);
                }
            }

            debug!("Recording {:?} as {}", record.path, kind.as_str());
            ledger.record(record);
        }
    }
}
