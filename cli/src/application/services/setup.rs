//! Application service: one-time workspace preparation for a project.

use std::path::{Path, PathBuf};

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::{LocalFs, ProgressReporter};
use crate::domain::config::PROJECT_CONFIG_FILE;

/// Per-workspace directory holding shared env and files.
pub const WORKSPACE_DIR: &str = ".branchfarm";

/// What happened to `.branchfarm/base.env`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BaseEnvState {
    AlreadyExists,
    Created,
    ExampleMissing,
}

/// Result of `setup`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SetupReport {
    pub workspace: PathBuf,
    pub files_dir: PathBuf,
    pub base_env: PathBuf,
    pub base_env_state: BaseEnvState,
}

/// Prepare `<workspace>/.branchfarm/`: ensure `files/` exists and seed
/// `base.env` from `base.env.example` when it is absent.
///
/// # Errors
///
/// Returns an error if the workspace has no `.branchfarm.yml`, or a directory
/// or file cannot be created.
pub fn setup(
    fs: &impl LocalFs,
    reporter: &impl ProgressReporter,
    dry_run: bool,
    workspace: &Path,
) -> Result<SetupReport> {
    let config_file = workspace.join(PROJECT_CONFIG_FILE);
    if !fs.exists(&config_file) {
        anyhow::bail!("No {PROJECT_CONFIG_FILE} found in {}", workspace.display());
    }
    reporter.success(&format!("{PROJECT_CONFIG_FILE}: found"));

    let dir = workspace.join(WORKSPACE_DIR);
    let files_dir = dir.join("files");
    let base_env = dir.join("base.env");
    let example = dir.join("base.env.example");

    if !dry_run {
        fs.create_dir_all(&files_dir)?;
    }
    reporter.success(&format!("{WORKSPACE_DIR}/files/: ready"));

    let base_env_state = if fs.exists(&base_env) {
        reporter.success(&format!("{WORKSPACE_DIR}/base.env: already exists"));
        BaseEnvState::AlreadyExists
    } else if fs.exists(&example) {
        if !dry_run {
            fs.copy_file(&example, &base_env)?;
        }
        reporter.success(&format!("{WORKSPACE_DIR}/base.env: created from base.env.example"));
        BaseEnvState::Created
    } else {
        reporter.warn(&format!("{WORKSPACE_DIR}/base.env.example: not found (skipping)"));
        BaseEnvState::ExampleMissing
    };

    Ok(SetupReport {
        workspace: workspace.to_path_buf(),
        files_dir,
        base_env,
        base_env_state,
    })
}
