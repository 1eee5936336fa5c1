//! Application service: tmux sessions.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::{Cmd, CommandRunner, ProgressReporter};

fn tmux() -> Cmd {
    Cmd::new("tmux")
}

/// Whether the session exists. Runs even in dry-run mode; a missing `tmux`
/// binary counts as "no session".
pub async fn exists(runner: &impl CommandRunner, name: &str) -> bool {
    let cmd = tmux().args(["has-session", "-t", name]).read_only();
    match runner.try_run(&cmd).await {
        Ok(out) => out.success(),
        Err(e) => {
            tracing::debug!(error = %e, "tmux has-session could not run");
            false
        }
    }
}

/// Create a detached session rooted at `dir`, unless it already exists.
///
/// `inherited` names the runtime variables present in this process; they are
/// removed from the session environment and the initial window, which was
/// spawned with them, is replaced by a clean one.
///
/// # Errors
///
/// Returns an error if any tmux command fails.
pub async fn create(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    name: &str,
    dir: &Path,
    inherited: &[String],
) -> Result<bool> {
    if exists(runner, name).await {
        reporter.step(&format!("tmux session exists: {name}"));
        return Ok(false);
    }
    reporter.step(&format!("creating tmux session: {name}"));
    let dir_arg = dir.to_string_lossy().into_owned();

    runner
        .run(&tmux().args(["new-session", "-d", "-s", name, "-c", dir_arg.as_str()]))
        .await?;
    for var in inherited {
        runner
            .run(&tmux().args(["set-environment", "-t", name, "-r", var.as_str()]))
            .await?;
    }
    runner
        .run(&tmux().args(["new-window", "-t", name, "-c", dir_arg.as_str()]))
        .await?;
    runner
        .run(&tmux().args(["kill-window", "-t"]).arg(format!("{name}:^")))
        .await?;
    runner
        .run(&tmux().args(["move-window", "-t", name, "-r"]))
        .await?;
    tracing::info!(session = name, "tmux session created");
    Ok(true)
}

/// Kill the session if it exists. Returns whether it was killed.
///
/// # Errors
///
/// Returns an error if `tmux kill-session` fails.
pub async fn kill(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    name: &str,
) -> Result<bool> {
    if !exists(runner, name).await {
        return Ok(false);
    }
    reporter.step(&format!("killing tmux session: {name}"));
    runner
        .run(&tmux().args(["kill-session", "-t", name]))
        .await?;
    Ok(true)
}
