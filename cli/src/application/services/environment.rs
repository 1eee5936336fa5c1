//! Application service: per-worktree files and process environment.
//!
//! Writes `.env` / `.envrc`, copies shared project files, creates symlinks,
//! and assembles the variables child processes run with. Imports only from
//! `crate::domain` and `crate::application::ports`.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::application::ports::{Cmd, CommandRunner, LocalFs, ProgressReporter};
use crate::domain::config::{ProjectConfig, Symlink};
use crate::domain::envfile::{self, EnvVars};
use crate::domain::naming::EnvNames;
use crate::domain::outcome::StepOutcome;
use crate::domain::runtime::{RuntimeManager, parse_version};

pub const ENV_FILE: &str = ".env";
pub const ENVRC_FILE: &str = ".envrc";

/// Write the worktree's `.env` and `.envrc` according to the project flags.
///
/// Returns the path of the written `.env`, if any. Nothing is written in
/// dry-run mode, but the path is still returned.
///
/// # Errors
///
/// Returns an error if the base env file cannot be read or a file cannot be
/// written.
pub async fn write_env_files(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    config: &ProjectConfig,
    names: &EnvNames,
    port: u16,
) -> Result<(Option<PathBuf>, StepOutcome)> {
    let generated = envfile::generated(names, port);
    let dry_run = runner.dry_run();
    let mut env_file = None;
    let mut outcome = StepOutcome::Completed;

    if config.use_env_file {
        let path = names.worktree.join(ENV_FILE);
        let base = load_env_vars(fs, &[config.base_env_file.as_path()]);
        let content = envfile::render_env(base, generated.clone());
        if dry_run {
            reporter.step(&format!("[dry-run] would write {}", path.display()));
        } else {
            fs.write(&path, &content)?;
            reporter.step(&format!("wrote {}", path.display()));
        }
        env_file = Some(path);
    } else {
        reporter.step("skipping .env (use_env_file: false)");
    }

    if config.use_envrc {
        let path = names.worktree.join(ENVRC_FILE);
        let content = envfile::render_envrc(&config.base_env_file, &generated);
        if dry_run {
            reporter.step(&format!("[dry-run] would write {}", path.display()));
        } else {
            fs.write(&path, &content)?;
            reporter.step(&format!("wrote {}", path.display()));
        }
        outcome = allow_direnv(runner, &names.worktree).await;
    } else {
        reporter.step("skipping .envrc (use_envrc: false)");
    }

    Ok((env_file, outcome))
}

/// Best-effort `direnv allow` in the worktree.
pub async fn allow_direnv(runner: &impl CommandRunner, worktree: &Path) -> StepOutcome {
    let cmd = Cmd::new("direnv").arg("allow").current_dir(worktree);
    match runner.run(&cmd).await {
        Ok(_) => StepOutcome::Completed,
        Err(e) => {
            tracing::warn!(error = %e, "direnv allow failed");
            StepOutcome::Warned(vec![format!("direnv allow failed: {e:#}")])
        }
    }
}

/// Recursively copy `copy_files_dir` into the worktree.
///
/// # Errors
///
/// Returns an error if the source is not a directory or a copy fails.
pub fn copy_files(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    dry_run: bool,
    source: &Path,
    worktree: &Path,
) -> Result<()> {
    if !fs.is_dir(source) {
        anyhow::bail!("copy_files_dir is not a directory: {}", source.display());
    }
    if dry_run {
        reporter.step(&format!(
            "[dry-run] would copy {} into {}",
            source.display(),
            worktree.display()
        ));
        return Ok(());
    }
    let copied = fs.copy_tree(source, worktree)?;
    reporter.step(&format!("copied {copied} file(s) from {}", source.display()));
    Ok(())
}

/// Create each configured symlink inside the worktree, replacing existing
/// entries.
///
/// # Errors
///
/// Returns an error if a link cannot be created.
pub fn create_symlinks(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    dry_run: bool,
    links: &[Symlink],
    worktree: &Path,
) -> Result<()> {
    for link in links {
        let path = worktree.join(&link.dest);
        if dry_run {
            reporter.step(&format!(
                "[dry-run] would link {} -> {}",
                path.display(),
                link.source.display()
            ));
            continue;
        }
        if !fs.exists(&link.source) {
            tracing::warn!(source = %link.source.display(), "symlink target does not exist");
        }
        fs.symlink(&link.source, &path)?;
        reporter.step(&format!("linked {} -> {}", link.dest.display(), link.source.display()));
    }
    Ok(())
}

/// Merge env files in order; later files win. Missing or unreadable files are
/// skipped.
#[must_use]
pub fn load_env_vars(fs: &impl LocalFs, paths: &[&Path]) -> EnvVars {
    paths
        .iter()
        .filter(|p| fs.exists(p))
        .filter_map(|p| match fs.read_to_string(p) {
            Ok(content) => Some(envfile::parse(&content)),
            Err(e) => {
                tracing::warn!(path = %p.display(), error = %e, "skipping unreadable env file");
                None
            }
        })
        .fold(EnvVars::new(), envfile::merge)
}

/// Read the runtime version pinned in the worktree.
///
/// # Errors
///
/// Returns an error if the version file is missing or has no ruby entry.
pub fn read_version(fs: &impl LocalFs, worktree: &Path, version_file: &str) -> Result<String> {
    let path = worktree.join(version_file);
    let content = fs
        .read_to_string(&path)
        .with_context(|| format!("reading runtime version from {}", path.display()))?;
    parse_version(version_file, &content)
}

/// Variables every runtime-bound command runs with: `BUNDLE_GEMFILE` plus the
/// manager's version pin when the version file parses.
#[must_use]
pub fn runtime_env(
    fs: &impl LocalFs,
    runtime: &dyn RuntimeManager,
    worktree: &Path,
    version_file: &str,
) -> EnvVars {
    let mut vars = vec![(
        "BUNDLE_GEMFILE".to_string(),
        worktree.join("Gemfile").to_string_lossy().into_owned(),
    )];
    match read_version(fs, worktree, version_file) {
        Ok(version) => vars.extend(runtime.version_env(&version)),
        Err(e) => tracing::debug!(error = %e, "no runtime version pin"),
    }
    vars
}

/// `prefix` followed by `words` as a single command.
#[must_use]
pub fn prefixed(prefix: Vec<String>, words: Vec<String>) -> Cmd {
    let mut parts = prefix.into_iter().chain(words);
    let program = parts.next().unwrap_or_default();
    Cmd::new(program).args(parts)
}
