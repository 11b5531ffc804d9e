use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tokio::sync::broadcast;
use tracing::info;

use gitpulse_core::{
    ChangeClassifier, ChangeKind, ChangeLedger, ChangeRecord, DefaultComposer, Error, EventHub,
    MessageComposer, Result, SyncEvent,
};

use crate::config::SyncConfig;
use crate::executor::SyncExecutor;
use crate::scheduler::SyncScheduler;
use crate::watcher::FileWatcher;

/// Wires the whole pipeline together: classifier, ledger, scheduler,
/// executor, and (optionally) a filesystem watcher.
///
/// External collaborators interact only with this surface: feed events in
/// with [`SyncService::on_file_event`] or [`SyncService::watch`], adjust
/// configuration with the setters, and subscribe to [`SyncEvent`]s.
pub struct SyncService {
    config: SyncConfig,
    ledger: Arc<ChangeLedger>,
    classifier: Arc<RwLock<ChangeClassifier>>,
    scheduler: SyncScheduler,
    executor: SyncExecutor,
    events: EventHub,
    watcher: Option<FileWatcher>,
}

impl SyncService {
    pub fn new(config: SyncConfig) -> Self {
        Self::with_composer(config, Arc::new(DefaultComposer))
    }

    /// Build the pipeline with a caller-supplied message composer.
    pub fn with_composer(config: SyncConfig, composer: Arc<dyn MessageComposer>) -> Self {
        let events = EventHub::new();
        let ledger = Arc::new(ChangeLedger::new());
        let classifier = Arc::new(RwLock::new(ChangeClassifier::new(
            config.classifier_config(),
        )));
        let executor = SyncExecutor::new(&config, events.clone());
        let scheduler = SyncScheduler::new(
            Arc::clone(&ledger),
            Arc::new(executor.clone()),
            composer,
        );

        Self {
            config,
            ledger,
            classifier,
            scheduler,
            executor,
            events,
            watcher: None,
        }
    }

    /// Bootstrap the checkpoint repository against the configured remote.
    /// Must succeed before any flush is attempted.
    pub async fn ensure_repository(&self) -> Result<()> {
        let url = self
            .config
            .remote_url
            .as_deref()
            .ok_or_else(|| Error::Config("no remote URL configured".to_string()))?;
        self.executor.ensure_repository(url).await
    }

    /// Attach a filesystem watcher on the project root.
    pub fn watch(&mut self) -> anyhow::Result<()> {
        let watcher = FileWatcher::new(
            self.config.project_root.clone(),
            Arc::clone(&self.classifier),
            Arc::clone(&self.ledger),
        )?;
        self.watcher = Some(watcher);
        Ok(())
    }

    /// Arm the flush timer at the configured cadence.
    pub fn start(&self) {
        self.scheduler.start_minutes(self.config.interval_minutes);
    }

    /// Inbound event from an external file-watching collaborator. `path`
    /// is relative to the project root.
    pub fn on_file_event(&self, path: &Path, kind: ChangeKind) {
        let accepted = {
            let classifier = self.classifier.read().unwrap();
            // The bookkeeping check needs the absolute path; exclude
            // patterns and extensions work on the relative one.
            let absolute = self.config.project_root.join(path);
            !absolute.starts_with(&classifier.config().bookkeeping_dir)
                && classifier.classify(path)
        };
        if !accepted {
            return;
        }

        let mut record = ChangeRecord::new(path.to_path_buf(), kind);
        if kind != ChangeKind::Deleted {
            if let Ok(content) = std::fs::read(self.config.project_root.join(path)) {
                record = record.with_content(content);
            }
        }
        self.ledger.record(record);
    }

    pub fn set_exclude_patterns(&self, patterns: Vec<String>) {
        let mut classifier = self.classifier.write().unwrap();
        let config = classifier.config().clone().with_exclude_patterns(patterns);
        *classifier = ChangeClassifier::new(config);
    }

    pub fn set_interval(&self, minutes: u64) {
        self.scheduler.update_frequency_minutes(minutes);
    }

    /// Force a flush outside the timer cadence.
    pub fn flush_now(&self) {
        self.scheduler.flush_now();
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn ledger(&self) -> &Arc<ChangeLedger> {
        &self.ledger
    }

    pub fn pending_changes(&self) -> usize {
        self.ledger.len()
    }

    /// Stop scheduling. An in-flight flush finishes on its own; the
    /// executor queue closes when the service is dropped.
    pub fn shutdown(&mut self) {
        self.scheduler.stop();
        self.watcher = None;
        info!("sync service stopped");
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Path of the checkpoint repository, for status display.
    pub fn repo_root(&self) -> &PathBuf {
        &self.config.repo_root
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(dir: &TempDir) -> SyncService {
        let config = SyncConfig::new(
            dir.path().to_path_buf(),
            dir.path().join(".gitpulse"),
        );
        SyncService::new(config)
    }

    #[tokio::test]
    async fn test_on_file_event_records_trackable_paths() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        svc.on_file_event(Path::new("src/lib.rs"), ChangeKind::Added);
        svc.on_file_event(Path::new("picture.png"), ChangeKind::Added);

        assert_eq!(svc.pending_changes(), 1);
    }

    #[tokio::test]
    async fn test_on_file_event_ignores_bookkeeping_dir() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        // The checkpoint repository lives under the project root; events
        // from inside it must never feed back into the ledger.
        svc.on_file_event(
            Path::new(".gitpulse/changes/20260827140850290-00-1497ba2a-x.rs"),
            ChangeKind::Added,
        );

        assert_eq!(svc.pending_changes(), 0);
    }

    #[tokio::test]
    async fn test_set_exclude_patterns_takes_effect() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        svc.on_file_event(Path::new("vendor/lib.rs"), ChangeKind::Added);
        assert_eq!(svc.pending_changes(), 1);

        svc.set_exclude_patterns(vec!["vendor/**".to_string()]);
        svc.on_file_event(Path::new("vendor/other.rs"), ChangeKind::Added);
        assert_eq!(svc.pending_changes(), 1);
    }

    #[tokio::test]
    async fn test_ensure_repository_requires_remote_url() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);

        let err = svc.ensure_repository().await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_event_subscription() {
        let dir = TempDir::new().unwrap();
        let svc = service(&dir);
        let _rx = svc.subscribe();
    }
}
