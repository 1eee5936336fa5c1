//! Application service: runtime, package and JS asset installation.
//!
//! All steps are fail-fast except where noted.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;

use crate::application::ports::{Cmd, CommandRunner, LocalFs, ProgressReporter};
use crate::application::services::environment::{
    load_env_vars, prefixed, read_version, runtime_env,
};
use crate::domain::config::ProjectConfig;
use crate::domain::envfile::{self, EnvVars};
use crate::domain::runtime::RuntimeManager;

static YARN_WORD: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new(r"\byarn\b").expect("valid yarn pattern")
});

/// Install the worktree's runtime version (if missing) and pin it locally.
///
/// In dry-run mode an unreadable version file skips the step with a warning.
///
/// # Errors
///
/// Returns an error if the version file cannot be read, or the install or
/// pin command fails.
pub async fn install_runtime(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    runtime: &dyn RuntimeManager,
    worktree: &Path,
    version_file: &str,
) -> Result<()> {
    let version = match read_version(fs, worktree, version_file) {
        Ok(v) => v,
        Err(e) if runner.dry_run() => {
            reporter.warn(&format!("[dry-run] skipping runtime install: {e:#}"));
            return Ok(());
        }
        Err(e) => return Err(e),
    };
    reporter.step(&format!("installing ruby {version} (if needed)"));
    if let Some(cmd) = runtime.install(&version).and_then(Cmd::from_argv) {
        runner.run(&cmd).await?;
    }
    let dir = worktree.to_string_lossy();
    if let Some(mut cmd) = runtime.pin(&version, &dir).and_then(Cmd::from_argv) {
        if runtime.pins_in_dir() {
            cmd = cmd.current_dir(worktree);
        }
        runner.run(&cmd).await?;
    }
    Ok(())
}

/// Configure excluded groups, then `bundle install` unless `bundle check`
/// already passes.
///
/// # Errors
///
/// Returns an error if `bundle config` or `bundle install` fails.
pub async fn install_packages(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    runtime: &dyn RuntimeManager,
    worktree: &Path,
    config: &ProjectConfig,
) -> Result<()> {
    let env = runtime_env(fs, runtime, worktree, &config.runtime_version_file);
    let bundle = |words: &[&str]| {
        prefixed(
            runtime.bundle_prefix(),
            words.iter().map(|w| (*w).to_string()).collect(),
        )
        .current_dir(worktree)
        .envs(env.clone())
        .unbundled()
    };

    if let Some(without) = &config.bundle_without {
        runner
            .run(&bundle(&["config", "set", "without", without.as_str()]))
            .await?;
    }

    let check = runner.try_run(&bundle(&["check"])).await?;
    if check.success() && !runner.dry_run() {
        reporter.step("bundle satisfied, skipping install");
        return Ok(());
    }
    reporter.step("installing gems");
    runner.run(&bundle(&["install"])).await?;
    Ok(())
}

/// Run the configured JS install command, routed through corepack when the
/// project pins a package manager.
///
/// # Errors
///
/// Returns an error if `NPM_TOKEN` is required but missing, or the command
/// fails.
pub async fn install_js(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    config: &ProjectConfig,
    worktree: &Path,
    env_file: Option<&Path>,
    nvm_dir: &Path,
) -> Result<()> {
    let Some(command) = &config.js_install_cmd else {
        return Ok(());
    };
    let vars = js_env(fs, config, env_file)?;
    let mut command = command.clone();
    if uses_corepack(fs, worktree) {
        reporter.step("detected packageManager field, using corepack");
        match find_corepack(fs, nvm_dir) {
            Some(corepack) => command = with_corepack(&command, &corepack),
            None => reporter.warn("corepack not found, falling back to plain yarn"),
        }
    }
    runner.run(&shell(&command, worktree, vars)).await?;
    Ok(())
}

/// Run the configured JS asset build command.
///
/// # Errors
///
/// Returns an error if `NPM_TOKEN` is required but missing, or the command
/// fails.
pub async fn build_js(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    config: &ProjectConfig,
    worktree: &Path,
    env_file: Option<&Path>,
) -> Result<()> {
    let Some(command) = &config.js_build_cmd else {
        return Ok(());
    };
    let vars = js_env(fs, config, env_file)?;
    runner.run(&shell(command, worktree, vars)).await?;
    Ok(())
}

/// Run each post-create command in order under the runtime's exec prefix.
///
/// # Errors
///
/// Returns the first failing command's error.
pub async fn run_post_create(
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    runtime: &dyn RuntimeManager,
    worktree: &Path,
    config: &ProjectConfig,
) -> Result<()> {
    for command in &config.post_create_commands {
        let words: Vec<String> = command.split_whitespace().map(str::to_string).collect();
        if words.is_empty() {
            continue;
        }
        reporter.step(&format!("running: {command}"));
        let env = runtime_env(fs, runtime, worktree, &config.runtime_version_file);
        let cmd = prefixed(runtime.exec_prefix(), words)
            .current_dir(worktree)
            .envs(env)
            .unbundled();
        runner.run(&cmd).await?;
    }
    Ok(())
}

fn shell(command: &str, worktree: &Path, vars: EnvVars) -> Cmd {
    Cmd::new("sh")
        .args(["-c", command])
        .current_dir(worktree)
        .envs(vars)
}

/// Base env file merged with the worktree `.env`.
///
/// # Errors
///
/// Returns an error when `require_npm_token` is set and no `NPM_TOKEN` is
/// defined.
pub fn js_env(fs: &impl LocalFs, config: &ProjectConfig, env_file: Option<&Path>) -> Result<EnvVars> {
    let mut paths = vec![config.base_env_file.as_path()];
    paths.extend(env_file);
    let vars = load_env_vars(fs, &paths);
    if config.require_npm_token && envfile::get(&vars, "NPM_TOKEN").is_none() {
        anyhow::bail!("NPM_TOKEN not set; add it to the base env file");
    }
    Ok(vars)
}

/// Whether `package.json` declares a `packageManager`.
#[must_use]
pub fn uses_corepack(fs: &impl LocalFs, worktree: &Path) -> bool {
    let path = worktree.join("package.json");
    fs.read_to_string(&path)
        .ok()
        .and_then(|content| serde_json::from_str::<serde_json::Value>(&content).ok())
        .is_some_and(|json| json.get("packageManager").is_some())
}

/// Replace each standalone `yarn` word with `<corepack> yarn`.
#[must_use]
pub fn with_corepack(command: &str, corepack: &Path) -> String {
    let replacement = format!("{} yarn", corepack.display());
    YARN_WORD
        .replace_all(command, regex::NoExpand(&replacement))
        .into_owned()
}

/// Locate `corepack`: newest nvm-managed node first, then Homebrew node, then
/// `PATH`.
#[must_use]
pub fn find_corepack(fs: &impl LocalFs, nvm_dir: &Path) -> Option<PathBuf> {
    let versions_dir = nvm_dir.join("versions").join("node");
    let mut versions = fs.list_dir(&versions_dir);
    versions.sort_by_key(|p| std::cmp::Reverse(node_version_key(p)));

    versions
        .into_iter()
        .map(|v| v.join("bin").join("corepack"))
        .chain([
            PathBuf::from("/opt/homebrew/opt/node/bin/corepack"),
            PathBuf::from("/usr/local/opt/node/bin/corepack"),
        ])
        .find(|p| fs.exists(p))
        .or_else(|| fs.which("corepack"))
}

/// `v20.11.0` → `[20, 11, 0]`; unparsable components sort first.
fn node_version_key(path: &Path) -> Vec<u64> {
    path.file_name()
        .map(|n| n.to_string_lossy().trim_start_matches('v').to_string())
        .unwrap_or_default()
        .split('.')
        .map(|part| part.parse().unwrap_or(0))
        .collect()
}
