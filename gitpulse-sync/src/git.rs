//! Thin async wrapper around the `git` CLI.
//!
//! Every subprocess spawn passes through a shared semaphore so the whole
//! executor never has more than `process_limit` external processes in
//! flight, independent of the operation queue.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use gitpulse_core::{CommitId, Error, Result};

const MAX_SPAWN_RETRIES: u32 = 3;
const SPAWN_BACKOFF_BASE_MS: u64 = 100;

/// Outcome of a push attempt. Rejections (remote advanced under us) are a
/// normal part of the protocol, not errors.
#[derive(Debug)]
pub enum PushOutcome {
    Pushed,
    Rejected(String),
}

/// Handle to the checkpoint repository, addressed through the `git` CLI.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
    branch: String,
    gate: Arc<Semaphore>,
}

impl GitRepo {
    pub fn new(root: PathBuf, branch: String, gate: Arc<Semaphore>) -> Self {
        Self { root, branch, gate }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    /// Run a git command and return trimmed stdout.
    ///
    /// Spawn-level resource exhaustion is retried with linearly increasing
    /// backoff; a failing git invocation maps to `Error::Git` with stderr.
    async fn run(&self, args: &[&str]) -> Result<String> {
        let _permit = self
            .gate
            .acquire()
            .await
            .map_err(|_| Error::ExecutorClosed)?;

        let mut attempt: u32 = 0;
        loop {
            debug!(?args, "git");
            match Command::new("git")
                .args(args)
                .current_dir(&self.root)
                .output()
                .await
            {
                Ok(output) => {
                    if output.status.success() {
                        return Ok(String::from_utf8_lossy(&output.stdout).trim().to_string());
                    }
                    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
                    return Err(Error::Git(stderr));
                }
                Err(e) if is_resource_exhaustion(&e) => {
                    attempt += 1;
                    if attempt > MAX_SPAWN_RETRIES {
                        return Err(Error::Transient(format!(
                            "failed to spawn git after {MAX_SPAWN_RETRIES} retries: {e}"
                        )));
                    }
                    let backoff =
                        Duration::from_millis(SPAWN_BACKOFF_BASE_MS * u64::from(attempt));
                    warn!(attempt, ?backoff, "git spawn hit resource limits, backing off");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(Error::Io(e)),
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.root.join(".git").exists()
    }

    pub async fn init(&self) -> Result<()> {
        self.run(&["init", "--initial-branch", self.branch.as_str()])
            .await?;
        Ok(())
    }

    /// Set a local commit identity if none is configured, so the initial
    /// commit never fails on a fresh machine.
    pub async fn ensure_identity(&self) -> Result<()> {
        if self.run(&["config", "user.email"]).await.is_err() {
            self.run(&["config", "user.email", "gitpulse@localhost"])
                .await?;
            self.run(&["config", "user.name", "gitpulse"]).await?;
        }
        // Checkpoint commits are never signed.
        self.run(&["config", "commit.gpgsign", "false"]).await?;
        Ok(())
    }

    pub async fn remote_url(&self) -> Option<String> {
        self.run(&["remote", "get-url", "origin"]).await.ok()
    }

    pub async fn remote_add(&self, url: &str) -> Result<()> {
        self.run(&["remote", "add", "origin", url]).await?;
        Ok(())
    }

    pub async fn remote_set_url(&self, url: &str) -> Result<()> {
        self.run(&["remote", "set-url", "origin", url]).await?;
        Ok(())
    }

    /// Fetch the remote branch. Returns `Ok(false)` when the remote exists
    /// but does not have the branch yet (first-ever sync).
    pub async fn fetch(&self) -> Result<bool> {
        match self.run(&["fetch", "origin", self.branch.as_str()]).await {
            Ok(_) => Ok(true),
            Err(Error::Git(stderr)) if is_missing_remote_ref(&stderr) => Ok(false),
            Err(Error::Git(stderr)) if is_network_failure(&stderr) => Err(Error::Network {
                operation: "fetch".to_string(),
                message: stderr,
            }),
            Err(e) => Err(e),
        }
    }

    /// Hard-align the local branch with the fetched remote tip.
    pub async fn reset_to_remote(&self) -> Result<()> {
        let target = format!("origin/{}", self.branch);
        self.run(&["reset", "--hard", target.as_str()]).await?;
        Ok(())
    }

    /// Stage exactly the given paths (relative to the repo root). Never a
    /// blanket stage-all.
    pub async fn add(&self, paths: &[PathBuf]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut args: Vec<&str> = vec!["add", "--"];
        let rendered: Vec<String> = paths
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect();
        args.extend(rendered.iter().map(String::as_str));
        self.run(&args).await?;
        Ok(())
    }

    pub async fn commit(&self, message: &str, allow_empty: bool) -> Result<()> {
        let mut args = vec!["commit", "-m", message];
        if allow_empty {
            args.push("--allow-empty");
        }
        self.run(&args).await?;
        Ok(())
    }

    /// Merge the fetched remote tip into the local branch. On conflict the
    /// merge is aborted and the repository is left as before the merge.
    pub async fn merge_remote(&self) -> Result<()> {
        let target = format!("origin/{}", self.branch);
        match self.run(&["merge", "--no-edit", target.as_str()]).await {
            Ok(_) => Ok(()),
            Err(Error::Git(stderr)) => {
                let _ = self.run(&["merge", "--abort"]).await;
                Err(Error::Conflict {
                    branch: self.branch.clone(),
                    message: stderr,
                })
            }
            Err(e) => Err(e),
        }
    }

    pub async fn push(&self) -> Result<PushOutcome> {
        let refspec = format!("{0}:{0}", self.branch);
        match self.run(&["push", "origin", refspec.as_str()]).await {
            Ok(_) => Ok(PushOutcome::Pushed),
            Err(Error::Git(stderr)) if is_non_fast_forward(&stderr) => {
                Ok(PushOutcome::Rejected(stderr))
            }
            Err(Error::Git(stderr)) if is_network_failure(&stderr) => Err(Error::Network {
                operation: "push".to_string(),
                message: stderr,
            }),
            Err(e) => Err(e),
        }
    }

    /// Rebase local commits onto the fetched remote tip. On conflict the
    /// rebase is aborted, leaving the branch in its pre-rebase state.
    pub async fn rebase_onto_remote(&self) -> Result<()> {
        let target = format!("origin/{}", self.branch);
        match self.run(&["rebase", target.as_str()]).await {
            Ok(_) => Ok(()),
            Err(Error::Git(stderr)) => {
                let _ = self.run(&["rebase", "--abort"]).await;
                Err(Error::Git(stderr))
            }
            Err(e) => Err(e),
        }
    }

    /// One-line description of the latest checkpoint, for status display.
    pub async fn head_summary(&self) -> Result<String> {
        self.run(&["log", "-1", "--format=%h %s (%cr)"]).await
    }

    pub async fn head_commit(&self) -> Result<CommitId> {
        let oid = self.run(&["rev-parse", "HEAD"]).await?;
        Ok(CommitId(oid))
    }

    /// Parent object ids of HEAD, used by tests to check rebase ancestry.
    pub async fn head_parents(&self) -> Result<Vec<String>> {
        let out = self.run(&["rev-list", "--parents", "-n", "1", "HEAD"]).await?;
        Ok(out.split_whitespace().skip(1).map(String::from).collect())
    }
}

fn is_resource_exhaustion(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::WouldBlock | std::io::ErrorKind::OutOfMemory
    )
}

fn is_non_fast_forward(stderr: &str) -> bool {
    stderr.contains("non-fast-forward")
        || stderr.contains("fetch first")
        || stderr.contains("stale info")
        || stderr.contains("failed to push some refs")
}

fn is_missing_remote_ref(stderr: &str) -> bool {
    stderr.contains("couldn't find remote ref") || stderr.contains("Couldn't find remote ref")
}

fn is_network_failure(stderr: &str) -> bool {
    stderr.contains("Could not resolve host")
        || stderr.contains("unable to access")
        || stderr.contains("Connection refused")
        || stderr.contains("Connection timed out")
}
