//! Application service: PostgreSQL databases for an environment.
//!
//! Existence is checked before every create or drop, so each operation is
//! idempotent and issues at most one mutating command.

use std::path::Path;

use anyhow::Result;

use crate::application::ports::{Cmd, CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::environment::{ENV_FILE, load_env_vars, prefixed, runtime_env};
use crate::domain::envfile;
use crate::domain::runtime::RuntimeManager;

/// Database names listed by `psql -lqt` (first `|`-separated column).
#[must_use]
pub fn parse_database_list(output: &str) -> Vec<&str> {
    output
        .lines()
        .filter_map(|line| line.split('|').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .collect()
}

/// Whether `name` exists on the local server. Always `false` in dry-run mode.
///
/// # Errors
///
/// Returns an error if `psql` cannot be run or exits non-zero.
pub async fn exists(runner: &impl CommandRunner, name: &str) -> Result<bool> {
    if runner.dry_run() {
        return Ok(false);
    }
    let out = runner.run(&Cmd::new("psql").arg("-lqt").read_only()).await?;
    Ok(parse_database_list(&out.stdout).contains(&name))
}

/// Create `name` unless it exists. Returns whether it was created.
///
/// # Errors
///
/// Returns an error if the existence check or `createdb` fails.
pub async fn create_if_missing(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    name: &str,
) -> Result<bool> {
    if exists(runner, name).await? {
        reporter.step(&format!("database exists: {name}"));
        return Ok(false);
    }
    reporter.step(&format!("creating database: {name}"));
    runner.run(&Cmd::new("createdb").arg(name)).await?;
    tracing::info!(database = name, "database created");
    Ok(true)
}

/// Drop `name` if it exists. Returns whether it was dropped.
///
/// # Errors
///
/// Returns an error if the existence check or `dropdb` fails.
pub async fn drop_if_exists(
    runner: &impl CommandRunner,
    reporter: &impl ProgressReporter,
    name: &str,
) -> Result<bool> {
    if !exists(runner, name).await? {
        reporter.step(&format!("database doesn't exist: {name}"));
        return Ok(false);
    }
    reporter.step(&format!("dropping database: {name}"));
    runner.run(&Cmd::new("dropdb").arg(name)).await?;
    tracing::info!(database = name, "database dropped");
    Ok(true)
}

/// Everything a prepare command needs besides the command itself.
pub struct PrepareContext<'a> {
    pub worktree: &'a Path,
    pub base_env_file: &'a Path,
    pub runtime: &'a dyn RuntimeManager,
    pub version_file: &'a str,
}

/// Run an application-level database command (e.g. `bin/rails db:prepare`)
/// inside the worktree.
///
/// The command sees the base env file merged with the worktree `.env`, a
/// `RAILS_ENV` marker when `target_env` is set, `BUNDLE_GEMFILE`, and the
/// runtime version pin. Inherited runtime variables are scrubbed. A blank
/// command is a no-op.
///
/// # Errors
///
/// Returns an error if the command fails.
pub async fn prepare(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    ctx: &PrepareContext<'_>,
    command: &str,
    target_env: Option<&str>,
) -> Result<()> {
    let words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
    if words.is_empty() {
        reporter.step("skipping: no command specified");
        return Ok(());
    }

    let env_file = ctx.worktree.join(ENV_FILE);
    let mut vars = load_env_vars(fs, &[ctx.base_env_file, env_file.as_path()]);
    if let Some(target) = target_env {
        envfile::set(&mut vars, "RAILS_ENV".to_string(), target.to_string());
    }
    let vars = envfile::merge(vars, runtime_env(fs, ctx.runtime, ctx.worktree, ctx.version_file));

    match target_env {
        Some(target) => reporter.step(&format!("running: {command} (RAILS_ENV={target})")),
        None => reporter.step(&format!("running: {command}")),
    }
    let cmd = prefixed(ctx.runtime.exec_prefix(), words)
        .current_dir(ctx.worktree)
        .envs(vars)
        .unbundled();
    runner.run(&cmd).await?;
    Ok(())
}
