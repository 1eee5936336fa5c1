//! Application service: git worktree lifecycle.
//!
//! A worktree path is either absent or present (`<path>/.git` exists, as a
//! file or directory). Create and refresh converge both states onto a
//! checked-out branch; remove returns to absent.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::{Cmd, CommandRunner, LocalFs, ProgressReporter};
use crate::domain::outcome::StepOutcome;

/// Observed state of a worktree path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorktreeState {
    NotExist,
    Exists,
}

/// Inspect `path`.
#[must_use]
pub fn state(fs: &impl LocalFs, path: &Path) -> WorktreeState {
    if fs.exists(&path.join(".git")) {
        WorktreeState::Exists
    } else {
        WorktreeState::NotExist
    }
}

fn git(dir: &Path) -> Cmd {
    Cmd::new("git").arg("-C").arg(dir.to_string_lossy())
}

/// Ensure a worktree for `branch` exists at `path`, creating or refreshing it.
///
/// # Errors
///
/// Returns an error if a fresh worktree cannot be created. Failures while
/// refreshing an existing worktree are reported as warnings instead.
pub async fn setup(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    repo_dir: &Path,
    path: &Path,
    branch: &str,
) -> Result<StepOutcome> {
    if !runner.dry_run() {
        if let Some(parent) = path.parent() {
            fs.create_dir_all(parent)?;
        }
    }
    match state(fs, path) {
        WorktreeState::Exists => {
            reporter.step(&format!("worktree exists at {}, updating", path.display()));
            Ok(refresh(runner, path, branch).await)
        }
        WorktreeState::NotExist => {
            reporter.step(&format!("creating worktree at {}", path.display()));
            create(runner, repo_dir, path, branch).await?;
            Ok(StepOutcome::Completed)
        }
    }
}

/// Fetch, then add the worktree from the remote branch, the local branch, or
/// a new branch off the current HEAD, in that order of preference.
///
/// # Errors
///
/// Returns an error if the fetch or `worktree add` fails.
pub async fn create(
    runner: &impl CommandRunner,
    repo_dir: &Path,
    path: &Path,
    branch: &str,
) -> Result<()> {
    runner.run(&git(repo_dir).args(["fetch", "-p"])).await?;

    let path_arg = path.to_string_lossy().into_owned();
    let add = git(repo_dir).args(["worktree", "add"]).arg(path_arg);
    let cmd = if ref_exists(runner, repo_dir, &format!("refs/remotes/origin/{branch}")).await {
        tracing::info!(branch, "adding worktree from remote branch");
        add.args(["-B", branch]).arg(format!("origin/{branch}"))
    } else if ref_exists(runner, repo_dir, &format!("refs/heads/{branch}")).await {
        tracing::info!(branch, "adding worktree from local branch");
        add.arg(branch)
    } else {
        tracing::info!(branch, "adding worktree on a new branch");
        add.args(["-b", branch])
    };
    runner.run(&cmd).await?;
    Ok(())
}

async fn ref_exists(runner: &impl CommandRunner, repo_dir: &Path, reference: &str) -> bool {
    let cmd = git(repo_dir)
        .args(["show-ref", "--verify", "--quiet", reference])
        .read_only();
    runner
        .try_run(&cmd)
        .await
        .is_ok_and(|out| out.success())
}

/// Bring an existing worktree up to date. Every sub-step is best-effort.
pub async fn refresh(runner: &impl CommandRunner, path: &Path, branch: &str) -> StepOutcome {
    let remote = format!("origin/{branch}");
    let steps = [
        git(path).args(["fetch", "-p"]),
        git(path).args(["checkout", branch]),
        git(path).args(["checkout", "-b", branch, remote.as_str()]),
        git(path).args(["pull", "--ff-only"]),
    ];
    let mut warnings = Vec::new();
    for cmd in &steps {
        match runner.try_run(cmd).await {
            Ok(out) if out.success() => {}
            Ok(out) => {
                tracing::debug!(command = %cmd, code = ?out.code, "refresh step failed");
                warnings.push(format!("`{cmd}` exited with {:?}", out.code));
            }
            Err(e) => {
                tracing::debug!(command = %cmd, error = %e, "refresh step failed");
                warnings.push(format!("`{cmd}` failed: {e}"));
            }
        }
    }
    StepOutcome::from_warnings(warnings)
}

/// Remove the worktree if present. Returns whether anything was removed.
///
/// # Errors
///
/// Returns an error if `git worktree remove` fails.
pub async fn remove(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    repo_dir: &Path,
    path: &Path,
) -> Result<bool> {
    if state(fs, path) == WorktreeState::NotExist {
        return Ok(false);
    }
    let cmd = git(repo_dir)
        .args(["worktree", "remove", "--force"])
        .arg(path.to_string_lossy());
    runner.run(&cmd).await?;
    tracing::info!(path = %path.display(), "worktree removed");
    Ok(true)
}
