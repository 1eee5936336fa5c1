//! Worktree state machine: create, refresh and remove.

#![allow(clippy::expect_used)]

use branchfarm_cli::application::services::worktree::{self, WorktreeState};
use branchfarm_cli::domain::outcome::StepOutcome;
use branchfarm_cli::infra::fs::HostFs;

use crate::mocks::{RecordingReporter, ScriptedRunner, materialize_worktree};

#[tokio::test]
async fn test_refresh_with_every_command_failing_still_succeeds() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("wt");
    std::fs::create_dir_all(path.join(".git")).expect("worktree");
    let runner = ScriptedRunner::new()
        .exit("fetch", 1)
        .exit("checkout", 1)
        .exit("pull", 1);
    let reporter = RecordingReporter::default();

    let outcome = worktree::setup(&runner, &HostFs, &reporter, dir.path(), &path, "main")
        .await
        .expect("refresh never errors");

    assert_eq!(outcome.warnings().len(), 4);
    assert!(runner.ran("checkout -b main origin/main"));
    assert!(!runner.ran("worktree add"));
}

#[tokio::test]
async fn test_refresh_tolerates_missing_git_binary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new().missing("git");

    let outcome = worktree::refresh(&runner, dir.path(), "main").await;

    assert!(matches!(outcome, StepOutcome::Warned(w) if w.len() == 4));
}

#[tokio::test]
async fn test_create_uses_local_branch_when_no_remote() {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = dir.path().join("repo");
    let path = dir.path().join("worktrees/topic");
    let runner = ScriptedRunner::new()
        .exit("refs/remotes/origin/topic", 1)
        .effect("worktree add", materialize_worktree);
    let reporter = RecordingReporter::default();

    let outcome = worktree::setup(&runner, &HostFs, &reporter, &repo, &path, "topic")
        .await
        .expect("create");

    assert_eq!(outcome, StepOutcome::Completed);
    assert_eq!(worktree::state(&HostFs, &path), WorktreeState::Exists);
    let add = runner
        .commands()
        .into_iter()
        .find(|c| c.contains("worktree add"))
        .expect("worktree add");
    assert!(add.ends_with(&format!("{} topic", path.display())), "unexpected: {add}");
    assert!(runner.ran("fetch -p"));
}

#[tokio::test]
async fn test_failed_fetch_aborts_creation() {
    let dir = tempfile::tempdir().expect("tempdir");
    let runner = ScriptedRunner::new().exit("fetch", 1);
    let reporter = RecordingReporter::default();

    let result = worktree::setup(
        &runner,
        &HostFs,
        &reporter,
        dir.path(),
        &dir.path().join("wt"),
        "main",
    )
    .await;

    assert!(result.is_err());
    assert!(!runner.ran("worktree add"));
}

#[tokio::test]
async fn test_remove_is_a_no_op_without_git_marker() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("plain-dir");
    std::fs::create_dir_all(&path).expect("dir");
    let runner = ScriptedRunner::new();

    let removed = worktree::remove(&runner, &HostFs, dir.path(), &path)
        .await
        .expect("remove");

    assert!(!removed);
    assert!(runner.commands().is_empty());
}

#[test]
fn test_git_file_marks_a_linked_worktree() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".git"), "gitdir: /repo/.git/worktrees/x\n").expect("git file");
    assert_eq!(worktree::state(&HostFs, dir.path()), WorktreeState::Exists);
}
