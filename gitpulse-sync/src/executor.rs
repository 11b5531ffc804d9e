//! Serialized executor for repository mutations.
//!
//! All mutating calls pass through one FIFO queue drained by a single
//! worker task; at most one repository-mutating operation runs at any
//! instant. A failing job rejects only its own reply channel - the worker
//! loop keeps draining.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{info, warn};

use gitpulse_core::{CommitId, Error, EventHub, Result, SyncEvent, SyncJob};

use crate::config::SyncConfig;
use crate::git::{GitRepo, PushOutcome};
use crate::scheduler::Flusher;

/// Subdirectory of the checkpoint repository where inline change content
/// is materialized.
const CHANGES_DIR: &str = "changes";

enum Op {
    Ensure {
        remote_url: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Submit {
        job: SyncJob,
        reply: oneshot::Sender<Result<CommitId>>,
    },
}

/// Handle to the executor. Cloning shares the same queue and worker.
#[derive(Clone)]
pub struct SyncExecutor {
    tx: mpsc::UnboundedSender<Op>,
}

impl SyncExecutor {
    pub fn new(config: &SyncConfig, events: EventHub) -> Self {
        let gate = Arc::new(Semaphore::new(config.process_limit.max(1)));
        let repo = GitRepo::new(config.repo_root.clone(), config.branch.clone(), gate);
        let worker = Worker { repo, events };

        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(worker.run(rx));

        Self { tx }
    }

    /// Queue an idempotent repository bootstrap: init if missing, reconcile
    /// the origin URL, and align the local branch with the remote tip.
    pub async fn ensure_repository(&self, remote_url: &str) -> Result<()> {
        if remote_url.is_empty() {
            return Err(Error::Config("remote URL is empty".to_string()));
        }
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Ensure {
                remote_url: remote_url.to_string(),
                reply,
            })
            .map_err(|_| Error::ExecutorClosed)?;
        rx.await.map_err(|_| Error::ExecutorClosed)?
    }

    /// Queue a sync job; resolves once the job reaches terminal success or
    /// terminal failure. Jobs are processed strictly in submission order.
    pub async fn submit_job(&self, job: SyncJob) -> Result<CommitId> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Op::Submit { job, reply })
            .map_err(|_| Error::ExecutorClosed)?;
        rx.await.map_err(|_| Error::ExecutorClosed)?
    }
}

#[async_trait]
impl Flusher for SyncExecutor {
    async fn submit(&self, job: SyncJob) -> Result<CommitId> {
        self.submit_job(job).await
    }
}

struct Worker {
    repo: GitRepo,
    events: EventHub,
}

impl Worker {
    async fn run(self, mut rx: mpsc::UnboundedReceiver<Op>) {
        while let Some(op) = rx.recv().await {
            match op {
                Op::Ensure { remote_url, reply } => {
                    self.events.operation_start("ensure_repository");
                    let result = self.ensure_repository(&remote_url).await;
                    if let Err(e) = &result {
                        self.events.error(e.to_string());
                    }
                    self.events.operation_end("ensure_repository");
                    let _ = reply.send(result);
                }
                Op::Submit { job, reply } => {
                    self.events.operation_start("sync");
                    let result = self.run_job(&job).await;
                    match &result {
                        Ok(commit) => {
                            info!(job = %job.id, %commit, "sync complete");
                        }
                        Err(e) => {
                            warn!(job = %job.id, error = %e, "sync failed");
                            self.events.error(e.to_string());
                        }
                    }
                    self.events.operation_end("sync");
                    let _ = reply.send(result);
                }
            }
        }
    }

    async fn ensure_repository(&self, remote_url: &str) -> Result<()> {
        if !self.repo.is_initialized() {
            std::fs::create_dir_all(self.repo.root())?;
            self.repo.init().await?;
            self.repo.ensure_identity().await?;
            self.repo
                .commit("initialize checkpoint repository", true)
                .await?;
            info!(root = %self.repo.root().display(), "initialized checkpoint repository");
        } else {
            self.repo.ensure_identity().await?;
        }

        std::fs::create_dir_all(self.repo.root().join(CHANGES_DIR))?;

        match self.repo.remote_url().await {
            None => self.repo.remote_add(remote_url).await?,
            Some(existing) if existing != remote_url => {
                warn!(%existing, new = %remote_url, "replacing origin URL");
                self.repo.remote_set_url(remote_url).await?;
            }
            Some(_) => {}
        }

        // Align with the remote when it already has history; a missing
        // remote branch just means this is the first-ever sync.
        if self.repo.fetch().await? {
            self.repo.reset_to_remote().await?;
        }

        Ok(())
    }

    async fn run_job(&self, job: &SyncJob) -> Result<CommitId> {
        let staged = self.materialize(job)?;

        self.repo.add(&staged).await?;
        // Records without inline content (deletes, unread files) still get
        // their checkpoint message recorded.
        self.repo.commit(&job.message, staged.is_empty()).await?;
        self.events.emit(SyncEvent::Commit {
            message: job.message.clone(),
        });

        if self.repo.remote_url().await.is_none() {
            // Local-only checkpointing until a remote is configured.
            warn!("no origin configured, keeping checkpoint local");
            return self.repo.head_commit().await;
        }

        if self.repo.fetch().await? {
            self.repo.merge_remote().await?;
        }

        match self.repo.push().await? {
            PushOutcome::Pushed => {}
            PushOutcome::Rejected(reason) => {
                // The remote advanced between our fetch and push. Rebase
                // onto the new tip and retry exactly once.
                info!(%reason, "push rejected, rebasing onto remote tip");
                self.repo.fetch().await?;
                match self.repo.rebase_onto_remote().await {
                    Ok(()) => {}
                    Err(Error::Git(stderr)) => {
                        return Err(Error::Conflict {
                            branch: self.repo.branch().to_string(),
                            message: format!("{} ({stderr})", job.message),
                        });
                    }
                    Err(e) => return Err(e),
                }
                match self.repo.push().await? {
                    PushOutcome::Pushed => {}
                    PushOutcome::Rejected(reason) => {
                        return Err(Error::Network {
                            operation: "push".to_string(),
                            message: reason,
                        });
                    }
                }
            }
        }
        self.events.emit(SyncEvent::Push {
            branch: self.repo.branch().to_string(),
        });

        self.repo.head_commit().await
    }

    /// Write each record's inline content as its own file under `changes/`,
    /// named with a sortable timestamp prefix, the record's position in the
    /// batch, and the original base name. Returns repo-relative paths of
    /// exactly the files to stage.
    fn materialize(&self, job: &SyncJob) -> Result<Vec<PathBuf>> {
        let changes_root = self.repo.root().join(CHANGES_DIR);
        std::fs::create_dir_all(&changes_root)?;

        let mut staged = Vec::new();
        for (index, record) in job.records.iter().enumerate() {
            let Some(content) = &record.content else {
                continue;
            };

            let base = record
                .path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    Error::InvalidPath(record.path.to_string_lossy().into_owned())
                })?;
            let stamp = Utc::now().format("%Y%m%d%H%M%S%3f");
            let hash8 = record
                .content_hash
                .as_deref()
                .map(|h| &h[..8.min(h.len())])
                .unwrap_or("00000000");
            // The record index keeps same-named files from different
            // directories (mod.rs, __init__.py) from colliding within one
            // job; the stamp shares one millisecond across the batch.
            let name = format!("{stamp}-{index:02}-{hash8}-{base}");

            std::fs::write(changes_root.join(&name), content)?;
            staged.push(PathBuf::from(CHANGES_DIR).join(name));
        }

        Ok(staged)
    }
}
