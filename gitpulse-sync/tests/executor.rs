//! End-to-end executor tests against a real `git` binary and a local bare
//! repository standing in for the remote.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::Semaphore;

use gitpulse_core::{ChangeKind, ChangeRecord, Error, EventHub, SyncEvent, SyncJob};
use gitpulse_sync::config::SyncConfig;
use gitpulse_sync::executor::SyncExecutor;
use gitpulse_sync::git::{GitRepo, PushOutcome};

fn run_git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "`git {args:?}` failed:\n{}",
            String::from_utf8_lossy(&output.stderr)
        );
    }
}

fn git_stdout(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("failed to run `git {args:?}`: {e}"));
    assert!(
        output.status.success(),
        "`git {args:?}` failed:\n{}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Bare repository standing in for the hosting provider.
fn bare_remote(dir: &TempDir) -> PathBuf {
    let remote = dir.path().join("remote.git");
    std::fs::create_dir_all(&remote).unwrap();
    run_git(&remote, &["init", "--bare"]);
    remote
}

/// Clone of the remote used to simulate a concurrent writer.
fn other_writer(dir: &TempDir, remote: &Path) -> PathBuf {
    let clone = dir.path().join("other");
    run_git(dir.path(), &["clone", remote.to_str().unwrap(), "other"]);
    run_git(&clone, &["config", "user.email", "other@test.com"]);
    run_git(&clone, &["config", "user.name", "Other Writer"]);
    run_git(&clone, &["config", "commit.gpgsign", "false"]);
    clone
}

fn config(dir: &TempDir, remote: &Path) -> SyncConfig {
    SyncConfig::new(dir.path().join("project"), dir.path().join("work"))
        .with_remote_url(remote.to_string_lossy())
}

fn record(path: &str, kind: ChangeKind, content: &[u8]) -> ChangeRecord {
    ChangeRecord::new(PathBuf::from(path), kind).with_content(content.to_vec())
}

#[tokio::test]
async fn ensure_repository_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    let url = remote.to_string_lossy();
    for _ in 0..3 {
        executor.ensure_repository(&url).await.unwrap();
    }

    let work = dir.path().join("work");
    assert_eq!(git_stdout(&work, &["remote", "get-url", "origin"]), url);
    assert_eq!(git_stdout(&work, &["remote"]), "origin");
}

#[tokio::test]
async fn ensure_repository_replaces_stale_remote_url() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    let work = dir.path().join("work");
    let url = remote.to_string_lossy();
    executor.ensure_repository(&url).await.unwrap();

    run_git(&work, &["remote", "set-url", "origin", "/nonexistent"]);
    executor.ensure_repository(&url).await.unwrap();

    assert_eq!(git_stdout(&work, &["remote", "get-url", "origin"]), url);
}

#[tokio::test]
async fn submit_commits_and_pushes_one_checkpoint() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    executor
        .ensure_repository(&remote.to_string_lossy())
        .await
        .unwrap();

    let job = SyncJob::new(
        vec![
            record("a.ts", ChangeKind::Modified, b"let a = 1;"),
            record("b.ts", ChangeKind::Added, b"let b = 2;"),
        ],
        "msg".to_string(),
    );
    let commit = executor.submit_job(job).await.unwrap();

    let work = dir.path().join("work");
    assert_eq!(git_stdout(&work, &["log", "-1", "--format=%s"]), "msg");
    assert_eq!(git_stdout(&work, &["rev-parse", "HEAD"]), commit.0);
    // Both files were materialized, staged, and committed; nothing strays.
    let staged = git_stdout(
        &work,
        &["show", "--stat", "--format=", "HEAD"],
    );
    assert!(staged.contains("a.ts"));
    assert!(staged.contains("b.ts"));
    assert_eq!(git_stdout(&work, &["status", "--porcelain"]), "");
    // The remote received the checkpoint.
    assert_eq!(git_stdout(&remote, &["log", "-1", "--format=%s", "main"]), "msg");
}

#[tokio::test]
async fn submit_keeps_same_basename_records_distinct() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    executor
        .ensure_repository(&remote.to_string_lossy())
        .await
        .unwrap();

    // Identical basename and identical content from two directories.
    let job = SyncJob::new(
        vec![
            record("a/mod.rs", ChangeKind::Added, b"pub mod x;"),
            record("b/mod.rs", ChangeKind::Added, b"pub mod x;"),
        ],
        "two modules".to_string(),
    );
    executor.submit_job(job).await.unwrap();

    let work = dir.path().join("work");
    let committed = git_stdout(&work, &["show", "--name-only", "--format=", "HEAD"]);
    assert_eq!(
        committed.lines().count(),
        2,
        "both records must land as separate files: {committed}"
    );
}

#[tokio::test]
async fn submit_merges_remote_advance_before_pushing() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    executor
        .ensure_repository(&remote.to_string_lossy())
        .await
        .unwrap();
    executor
        .submit_job(SyncJob::new(
            vec![record("first.rs", ChangeKind::Added, b"one")],
            "first checkpoint".to_string(),
        ))
        .await
        .unwrap();

    // A concurrent writer advances the remote.
    let other = other_writer(&dir, &remote);
    std::fs::write(other.join("elsewhere.txt"), "other change").unwrap();
    run_git(&other, &["add", "elsewhere.txt"]);
    run_git(&other, &["commit", "-m", "remote advance"]);
    run_git(&other, &["push", "origin", "HEAD:main"]);

    executor
        .submit_job(SyncJob::new(
            vec![record("second.rs", ChangeKind::Added, b"two")],
            "second checkpoint".to_string(),
        ))
        .await
        .unwrap();

    let subjects = git_stdout(&remote, &["log", "--format=%s", "main"]);
    assert!(subjects.contains("second checkpoint"));
    assert!(subjects.contains("remote advance"));
    assert!(subjects.contains("first checkpoint"));
}

#[tokio::test]
async fn submit_without_remote_keeps_checkpoint_local() {
    let dir = TempDir::new().unwrap();
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let gate = Arc::new(Semaphore::new(5));
    let repo = GitRepo::new(work.clone(), "main".to_string(), gate);
    repo.init().await.unwrap();
    repo.ensure_identity().await.unwrap();

    let config = SyncConfig::new(dir.path().join("project"), work.clone());
    let events = EventHub::new();
    let mut rx = events.subscribe();
    let executor = SyncExecutor::new(&config, events);

    executor
        .submit_job(SyncJob::new(
            vec![record("local.rs", ChangeKind::Added, b"x")],
            "local checkpoint".to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(
        git_stdout(&work, &["log", "-1", "--format=%s"]),
        "local checkpoint"
    );

    // Commit event emitted, but no push happened.
    let mut saw_commit = false;
    while let Ok(event) = rx.try_recv() {
        match event {
            SyncEvent::Commit { message } => {
                assert_eq!(message, "local checkpoint");
                saw_commit = true;
            }
            SyncEvent::Push { .. } => panic!("pushed without a remote"),
            _ => {}
        }
    }
    assert!(saw_commit);
}

#[tokio::test]
async fn push_rejected_then_rebase_retry_succeeds() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let gate = Arc::new(Semaphore::new(5));
    let repo = GitRepo::new(work.clone(), "main".to_string(), Arc::clone(&gate));
    repo.init().await.unwrap();
    repo.ensure_identity().await.unwrap();
    repo.commit("seed", true).await.unwrap();
    repo.remote_add(&remote.to_string_lossy()).await.unwrap();
    assert!(matches!(repo.push().await.unwrap(), PushOutcome::Pushed));

    // Remote advances while we are preparing a local commit.
    let other = other_writer(&dir, &remote);
    std::fs::write(other.join("theirs.txt"), "theirs").unwrap();
    run_git(&other, &["add", "theirs.txt"]);
    run_git(&other, &["commit", "-m", "their commit"]);
    run_git(&other, &["push", "origin", "HEAD:main"]);
    let their_tip = git_stdout(&other, &["rev-parse", "HEAD"]);

    std::fs::write(work.join("ours.txt"), "ours").unwrap();
    repo.add(&[PathBuf::from("ours.txt")]).await.unwrap();
    repo.commit("our commit", false).await.unwrap();

    // Stale push is rejected, one rebase-and-retry lands it.
    assert!(matches!(
        repo.push().await.unwrap(),
        PushOutcome::Rejected(_)
    ));
    repo.fetch().await.unwrap();
    repo.rebase_onto_remote().await.unwrap();
    assert!(matches!(repo.push().await.unwrap(), PushOutcome::Pushed));

    // Our commit now sits on top of their tip.
    assert_eq!(repo.head_parents().await.unwrap(), vec![their_tip.clone()]);
    assert_eq!(git_stdout(&remote, &["rev-parse", "main"]), repo.head_commit().await.unwrap().0);
}

/// Forces the executor's own push-rejected branch: a pre-push hook in the
/// work repository advances the remote from a side clone and fails the
/// first push, so `submit_job` must fetch, rebase, and retry exactly once.
#[cfg(unix)]
#[tokio::test]
async fn submit_rebases_and_retries_after_push_rejection() {
    use std::os::unix::fs::PermissionsExt;

    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let executor = SyncExecutor::new(&config, EventHub::new());

    executor
        .ensure_repository(&remote.to_string_lossy())
        .await
        .unwrap();
    executor
        .submit_job(SyncJob::new(
            vec![record("first.rs", ChangeKind::Added, b"one")],
            "first checkpoint".to_string(),
        ))
        .await
        .unwrap();

    let work = dir.path().join("work");
    let other = other_writer(&dir, &remote);
    let marker = dir.path().join("advance-once");
    std::fs::write(&marker, "").unwrap();

    let hook_path = work.join(".git/hooks/pre-push");
    std::fs::write(
        &hook_path,
        format!(
            "#!/bin/sh\n\
             if [ -f \"{marker}\" ]; then\n\
             \trm -f \"{marker}\"\n\
             \tgit -C \"{other}\" commit --allow-empty -m \"remote advance\" >/dev/null 2>&1\n\
             \tgit -C \"{other}\" push origin HEAD:main >/dev/null 2>&1\n\
             \texit 1\n\
             fi\n\
             exit 0\n",
            marker = marker.display(),
            other = other.display(),
        ),
    )
    .unwrap();
    std::fs::set_permissions(&hook_path, std::fs::Permissions::from_mode(0o755)).unwrap();

    executor
        .submit_job(SyncJob::new(
            vec![record("second.rs", ChangeKind::Added, b"two")],
            "second checkpoint".to_string(),
        ))
        .await
        .unwrap();

    // Hook fired once, the retry landed.
    assert!(!marker.exists());
    let subjects = git_stdout(&remote, &["log", "--format=%s", "main"]);
    assert!(subjects.contains("second checkpoint"));
    assert!(subjects.contains("remote advance"));

    // Linear history proves a rebase, not a merge: our commit's sole parent
    // is the commit the remote gained mid-push.
    let their_tip = git_stdout(&other, &["rev-parse", "HEAD"]);
    let gate = Arc::new(Semaphore::new(5));
    let repo = GitRepo::new(work, "main".to_string(), gate);
    assert_eq!(repo.head_parents().await.unwrap(), vec![their_tip]);
}

#[tokio::test]
async fn rebase_conflict_aborts_and_leaves_pre_rebase_state() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let work = dir.path().join("work");
    std::fs::create_dir_all(&work).unwrap();

    let gate = Arc::new(Semaphore::new(5));
    let repo = GitRepo::new(work.clone(), "main".to_string(), gate);
    repo.init().await.unwrap();
    repo.ensure_identity().await.unwrap();
    std::fs::write(work.join("shared.txt"), "base\n").unwrap();
    repo.add(&[PathBuf::from("shared.txt")]).await.unwrap();
    repo.commit("base", false).await.unwrap();
    repo.remote_add(&remote.to_string_lossy()).await.unwrap();
    assert!(matches!(repo.push().await.unwrap(), PushOutcome::Pushed));

    // Both sides rewrite the same line.
    let other = other_writer(&dir, &remote);
    std::fs::write(other.join("shared.txt"), "theirs\n").unwrap();
    run_git(&other, &["add", "shared.txt"]);
    run_git(&other, &["commit", "-m", "their edit"]);
    run_git(&other, &["push", "origin", "HEAD:main"]);

    std::fs::write(work.join("shared.txt"), "ours\n").unwrap();
    repo.add(&[PathBuf::from("shared.txt")]).await.unwrap();
    repo.commit("our edit", false).await.unwrap();
    let pre_rebase = repo.head_commit().await.unwrap();

    assert!(matches!(
        repo.push().await.unwrap(),
        PushOutcome::Rejected(_)
    ));
    repo.fetch().await.unwrap();
    let err = repo.rebase_onto_remote().await.unwrap_err();
    assert!(matches!(err, Error::Git(_)));

    // The abort restored the branch; no rebase left in progress.
    assert_eq!(repo.head_commit().await.unwrap(), pre_rebase);
    assert_eq!(git_stdout(&work, &["status", "--porcelain"]), "");
}

#[tokio::test]
async fn submit_events_bracket_the_operation() {
    let dir = TempDir::new().unwrap();
    let remote = bare_remote(&dir);
    let config = config(&dir, &remote);
    let events = EventHub::new();
    let mut rx = events.subscribe();
    let executor = SyncExecutor::new(&config, events);

    executor
        .ensure_repository(&remote.to_string_lossy())
        .await
        .unwrap();
    executor
        .submit_job(SyncJob::new(
            vec![record("a.rs", ChangeKind::Added, b"x")],
            "checkpoint".to_string(),
        ))
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = rx.try_recv() {
        seen.push(event);
    }

    assert!(seen.contains(&SyncEvent::OperationStart {
        name: "sync".to_string()
    }));
    assert!(seen.contains(&SyncEvent::Commit {
        message: "checkpoint".to_string()
    }));
    assert!(seen.contains(&SyncEvent::Push {
        branch: "main".to_string()
    }));
    assert!(seen.contains(&SyncEvent::OperationEnd {
        name: "sync".to_string()
    }));
    // No error event on the happy path.
    assert!(!seen
        .iter()
        .any(|e| matches!(e, SyncEvent::Error { .. })));
}
