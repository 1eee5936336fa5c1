//! YAML loading for global settings and project configurations.
//!
//! Schema types and validation live in `crate::domain::config`; this module
//! only locates files, reads them, merges local overrides and checks the
//! paths a configuration points at.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_yaml::{Mapping, Value};

use crate::domain::config::{
    PROJECT_CONFIG_FILE, ProjectConfig, RawProjectConfig, RawSettings, Settings,
};
use crate::domain::error::ConfigError;

/// Locates and reads branchfarm configuration files.
pub struct YamlConfigLoader {
    root: PathBuf,
    home: PathBuf,
    settings_path: PathBuf,
}

impl YamlConfigLoader {
    /// Resolve locations from the environment: `BRANCHFARM_HOME` (default
    /// `~/.branchfarm`) and `BRANCHFARM_CONFIG` (default `<root>/config.yaml`).
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    pub fn from_env() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
        let root = std::env::var_os("BRANCHFARM_HOME")
            .map_or_else(|| home.join(".branchfarm"), PathBuf::from);
        let settings_path = std::env::var_os("BRANCHFARM_CONFIG")
            .map_or_else(|| root.join("config.yaml"), PathBuf::from);
        Ok(Self::with_paths(root, home, settings_path))
    }

    /// Explicit locations (used in tests).
    #[must_use]
    pub fn with_paths(root: PathBuf, home: PathBuf, settings_path: PathBuf) -> Self {
        Self {
            root,
            home,
            settings_path,
        }
    }

    /// Load global settings; a missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or names an
    /// unsupported runtime manager.
    pub fn load_settings(&self) -> Result<Settings> {
        let raw: RawSettings = if self.settings_path.exists() {
            let content = std::fs::read_to_string(&self.settings_path)
                .with_context(|| format!("cannot read {}", self.settings_path.display()))?;
            if content.trim().is_empty() {
                RawSettings::default()
            } else {
                serde_yaml::from_str(&content)
                    .with_context(|| format!("cannot parse {}", self.settings_path.display()))?
            }
        } else {
            RawSettings::default()
        };
        Ok(Settings::resolve(raw, &self.root, &self.home)?)
    }

    /// Path of the configuration file for `project`.
    ///
    /// Tries `<workspaces_dir>/<project>/.branchfarm.yml`, then
    /// `<root>/projects/<project>.yml`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::UnknownProject`] when neither exists.
    pub fn find_project(settings: &Settings, project: &str) -> Result<PathBuf, ConfigError> {
        let workspace = settings.workspaces_dir.join(project).join(PROJECT_CONFIG_FILE);
        if workspace.is_file() {
            return Ok(workspace);
        }
        let fallback = settings.projects_dir().join(format!("{project}.yml"));
        if fallback.is_file() {
            return Ok(fallback);
        }
        Err(ConfigError::UnknownProject {
            project: project.to_string(),
            workspace: settings.workspaces_dir.join(project),
            fallback,
        })
    }

    /// Load, merge and validate the configuration for `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the project is unknown, the YAML is invalid, a
    /// required key is missing, or `repo_dir` / `base_env_file` do not exist.
    pub fn load_project(settings: &Settings, project: &str) -> Result<ProjectConfig> {
        let path = Self::find_project(settings, project)?;
        let raw = read_merged(&path)?;
        let config = ProjectConfig::resolve(raw, &path, settings)?;
        check_paths(&config)?;
        tracing::debug!(project, path = %path.display(), "project config loaded");
        Ok(config)
    }
}

/// `.branchfarm.yml` → `.branchfarm.local.yml`, `foo.yml` → `foo.local.yml`.
fn local_override_path(path: &Path) -> PathBuf {
    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    let local = name
        .strip_suffix(".yml")
        .map_or_else(|| format!("{name}.local"), |stem| format!("{stem}.local.yml"));
    path.with_file_name(local)
}

fn read_mapping(path: &Path) -> Result<Mapping> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("cannot read {}", path.display()))?;
    let value: Value =
        serde_yaml::from_str(&content).with_context(|| format!("cannot parse {}", path.display()))?;
    match value {
        Value::Mapping(map) => Ok(map),
        Value::Null => Ok(Mapping::new()),
        _ => anyhow::bail!("{} must contain a YAML mapping", path.display()),
    }
}

/// Read a project file and shallow-merge its local override (local wins).
///
/// # Errors
///
/// Returns an error if either file is unreadable or not a YAML mapping.
pub fn read_merged(path: &Path) -> Result<RawProjectConfig> {
    let mut base = read_mapping(path)?;
    let local_path = local_override_path(path);
    if local_path.is_file() {
        for (key, value) in read_mapping(&local_path)? {
            base.insert(key, value);
        }
    }
    serde_yaml::from_value(Value::Mapping(base))
        .with_context(|| format!("invalid project config {}", path.display()))
}

fn check_paths(config: &ProjectConfig) -> Result<(), ConfigError> {
    if !config.repo_dir.is_dir() {
        return Err(ConfigError::NotADirectory {
            key: "repo_dir".to_string(),
            path: config.repo_dir.clone(),
        });
    }
    if !config.base_env_file.exists() {
        return Err(ConfigError::FileNotFound {
            key: "base_env_file".to_string(),
            path: config.base_env_file.clone(),
        });
    }
    Ok(())
}
