//! Domain types and validators for branchfarm configuration.
//!
//! Pure functions only: no I/O, no async, no filesystem access. The YAML
//! loader in `crate::infra::config` reads files and hands the raw values here.

use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::error::ConfigError;
use crate::domain::runtime::RuntimeKind;

// ── Constants ────────────────────────────────────────────────────────────────

/// Keys every project configuration must define with a non-empty value.
pub const REQUIRED_KEYS: &[&str] = &[
    "project_key",
    "repo_dir",
    "worktrees_dir",
    "base_env_file",
    "base_domain_template",
    "port_range_start",
    "port_range_end",
    "db_prefix_template",
];

pub const DEFAULT_DB_PREPARE_CMD: &str = "bin/rails db:prepare";
pub const DEFAULT_VERSION_FILE: &str = ".ruby-version";
pub const PROJECT_CONFIG_FILE: &str = ".branchfarm.yml";

// ── Global settings ──────────────────────────────────────────────────────────

/// Machine-wide settings stored in `~/.branchfarm/config.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RawSettings {
    /// Manage Caddy reverse-proxy routes.
    pub caddy: bool,
    /// Manage tmux sessions.
    pub tmux: bool,
    pub caddy_snippets_dir: Option<String>,
    pub caddyfile: Option<String>,
    pub workspaces_dir: Option<String>,
    #[serde(alias = "ruby_manager")]
    pub runtime_manager: String,
    pub state_dir: Option<String>,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            caddy: true,
            tmux: true,
            caddy_snippets_dir: None,
            caddyfile: None,
            workspaces_dir: None,
            runtime_manager: "rbenv".to_string(),
            state_dir: None,
        }
    }
}

/// Resolved, immutable global settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// branchfarm home (`~/.branchfarm` unless `BRANCHFARM_HOME` is set).
    pub root: PathBuf,
    pub home: PathBuf,
    pub proxy_enabled: bool,
    pub session_enabled: bool,
    pub caddy_snippets_dir: PathBuf,
    pub caddyfile: Option<PathBuf>,
    pub workspaces_dir: PathBuf,
    pub runtime_manager: RuntimeKind,
    pub state_dir: PathBuf,
}

impl Settings {
    /// Resolve raw settings against the branchfarm root and home directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime manager name is not supported.
    pub fn resolve(raw: RawSettings, root: &Path, home: &Path) -> Result<Self, ConfigError> {
        let vars = PathVars {
            workspace_root: root,
            home,
            branchfarm_root: root,
        };
        let expand = |value: Option<String>, default: PathBuf| {
            value.map_or(default, |v| expand_path(&v, &vars))
        };
        Ok(Self {
            root: root.to_path_buf(),
            home: home.to_path_buf(),
            proxy_enabled: raw.caddy,
            session_enabled: raw.tmux,
            caddy_snippets_dir: expand(raw.caddy_snippets_dir, root.join("caddy").join("snippets")),
            caddyfile: raw.caddyfile.map(|v| expand_path(&v, &vars)),
            workspaces_dir: expand(raw.workspaces_dir, home.join("Code")),
            runtime_manager: raw.runtime_manager.parse()?,
            state_dir: expand(raw.state_dir, root.join("state")),
        })
    }

    /// Directory holding legacy per-project configs (`<root>/projects`).
    #[must_use]
    pub fn projects_dir(&self) -> PathBuf {
        self.root.join("projects")
    }
}

// ── Project configuration ────────────────────────────────────────────────────

/// A `{source, dest}` pair from the `symlinks` key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawSymlink {
    pub source: String,
    pub dest: String,
}

/// Project configuration exactly as written in `.branchfarm.yml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RawProjectConfig {
    pub project_key: Option<String>,
    pub repo_dir: Option<String>,
    pub worktrees_dir: Option<String>,
    pub base_env_file: Option<String>,
    pub base_domain_template: Option<String>,
    pub port_range_start: Option<i64>,
    pub port_range_end: Option<i64>,
    pub db_prefix_template: Option<String>,
    pub caddy_snippets_dir: Option<String>,
    pub use_env_file: Option<bool>,
    pub use_envrc: Option<bool>,
    pub require_npm_token: Option<bool>,
    #[serde(alias = "ruby_version_file")]
    pub runtime_version_file: Option<String>,
    #[serde(alias = "ruby_manager")]
    pub runtime_manager: Option<String>,
    pub bundle_without: Option<String>,
    pub js_install_cmd: Option<String>,
    pub js_build_cmd: Option<String>,
    #[serde(alias = "rails_db_prepare_cmd")]
    pub db_prepare_cmd: Option<String>,
    #[serde(alias = "rails_db_seed_cmd")]
    pub db_seed_cmd: Option<String>,
    pub parallel_test_setup_cmd: Option<String>,
    pub post_create_commands: Vec<String>,
    pub copy_files_dir: Option<String>,
    pub symlinks: Vec<RawSymlink>,
}

/// A symlink to create inside each worktree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symlink {
    /// Absolute link target.
    pub source: PathBuf,
    /// Link path relative to the worktree root.
    pub dest: PathBuf,
}

/// Resolved, validated, immutable project configuration.
///
/// Constructed once per invocation and passed by reference into every
/// provisioner; nothing looks configuration up implicitly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectConfig {
    pub project_key: String,
    pub config_path: PathBuf,
    pub workspace_root: PathBuf,
    pub repo_dir: PathBuf,
    pub worktrees_dir: PathBuf,
    pub base_env_file: PathBuf,
    pub base_domain_template: String,
    pub db_prefix_template: String,
    pub port_range: RangeInclusive<u16>,
    pub use_env_file: bool,
    pub use_envrc: bool,
    pub require_npm_token: bool,
    pub runtime_version_file: String,
    pub runtime_manager: RuntimeKind,
    pub bundle_without: Option<String>,
    pub js_install_cmd: Option<String>,
    pub js_build_cmd: Option<String>,
    pub db_prepare_cmd: String,
    pub db_seed_cmd: Option<String>,
    pub parallel_test_setup_cmd: Option<String>,
    pub post_create_commands: Vec<String>,
    pub copy_files_dir: Option<PathBuf>,
    pub symlinks: Vec<Symlink>,
    pub caddy_snippets_dir: PathBuf,
    pub caddyfile: Option<PathBuf>,
    pub proxy_enabled: bool,
    pub session_enabled: bool,
}

impl ProjectConfig {
    /// Validate raw values and resolve paths against the workspace root.
    ///
    /// Filesystem checks (repo dir exists, base env file exists) are left to
    /// the loader.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] for missing required keys, out-of-range
    /// ports, templates without a `%s` placeholder, or an unknown runtime.
    pub fn resolve(
        raw: RawProjectConfig,
        config_path: &Path,
        settings: &Settings,
    ) -> Result<Self, ConfigError> {
        let missing = missing_keys(&raw);
        if !missing.is_empty() {
            return Err(ConfigError::MissingKeys {
                path: config_path.to_path_buf(),
                keys: missing,
            });
        }

        let workspace_root = config_path
            .parent()
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
        let vars = PathVars {
            workspace_root: &workspace_root,
            home: &settings.home,
            branchfarm_root: &settings.root,
        };

        let start = port_value("port_range_start", raw.port_range_start)?;
        let end = port_value("port_range_end", raw.port_range_end)?;
        if start > end {
            return Err(ConfigError::InvalidValue {
                key: "port_range_end".to_string(),
                value: end.to_string(),
                hint: format!("port_range_end must not be below port_range_start ({start})"),
            });
        }

        let base_domain_template = template_value("base_domain_template", raw.base_domain_template)?;
        let db_prefix_template = template_value("db_prefix_template", raw.db_prefix_template)?;

        let runtime_manager = match raw.runtime_manager {
            Some(name) => name.parse()?,
            None => settings.runtime_manager,
        };

        Ok(Self {
            project_key: raw.project_key.unwrap_or_default(),
            config_path: config_path.to_path_buf(),
            repo_dir: expand_required(raw.repo_dir, &vars),
            worktrees_dir: expand_required(raw.worktrees_dir, &vars),
            base_env_file: expand_required(raw.base_env_file, &vars),
            base_domain_template,
            db_prefix_template,
            port_range: start..=end,
            use_env_file: raw.use_env_file.unwrap_or(true),
            use_envrc: raw.use_envrc.unwrap_or(true),
            require_npm_token: raw.require_npm_token.unwrap_or(false),
            runtime_version_file: raw
                .runtime_version_file
                .unwrap_or_else(|| DEFAULT_VERSION_FILE.to_string()),
            runtime_manager,
            bundle_without: non_blank(raw.bundle_without),
            js_install_cmd: non_blank(raw.js_install_cmd),
            js_build_cmd: non_blank(raw.js_build_cmd),
            db_prepare_cmd: raw
                .db_prepare_cmd
                .unwrap_or_else(|| DEFAULT_DB_PREPARE_CMD.to_string()),
            db_seed_cmd: non_blank(raw.db_seed_cmd),
            parallel_test_setup_cmd: non_blank(raw.parallel_test_setup_cmd),
            post_create_commands: raw.post_create_commands,
            copy_files_dir: raw.copy_files_dir.map(|d| expand_path(&d, &vars)),
            symlinks: raw
                .symlinks
                .into_iter()
                .map(|link| Symlink {
                    source: expand_path(&link.source, &vars),
                    dest: PathBuf::from(link.dest),
                })
                .collect(),
            caddy_snippets_dir: raw
                .caddy_snippets_dir
                .map_or_else(|| settings.caddy_snippets_dir.clone(), |d| expand_path(&d, &vars)),
            caddyfile: settings.caddyfile.clone(),
            proxy_enabled: settings.proxy_enabled,
            session_enabled: settings.session_enabled,
            workspace_root,
        })
    }
}

fn missing_keys(raw: &RawProjectConfig) -> Vec<String> {
    let blank = |v: &Option<String>| v.as_deref().is_none_or(|s| s.trim().is_empty());
    let present = [
        !blank(&raw.project_key),
        !blank(&raw.repo_dir),
        !blank(&raw.worktrees_dir),
        !blank(&raw.base_env_file),
        !blank(&raw.base_domain_template),
        raw.port_range_start.is_some(),
        raw.port_range_end.is_some(),
        !blank(&raw.db_prefix_template),
    ];
    REQUIRED_KEYS
        .iter()
        .zip(present)
        .filter(|(_, ok)| !ok)
        .map(|(key, _)| (*key).to_string())
        .collect()
}

fn port_value(key: &str, value: Option<i64>) -> Result<u16, ConfigError> {
    let value = value.unwrap_or_default();
    u16::try_from(value)
        .ok()
        .filter(|port| *port > 0)
        .ok_or_else(|| ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            hint: "Ports must be between 1 and 65535".to_string(),
        })
}

fn template_value(key: &str, value: Option<String>) -> Result<String, ConfigError> {
    let value = value.unwrap_or_default();
    if value.contains("%s") {
        Ok(value)
    } else {
        Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value,
            hint: "Templates must contain a %s placeholder for the slug".to_string(),
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

// ── Path expansion ───────────────────────────────────────────────────────────

/// Substitution values for `$WORKSPACE_ROOT`, `$HOME` and `$BRANCHFARM_ROOT`.
pub struct PathVars<'a> {
    pub workspace_root: &'a Path,
    pub home: &'a Path,
    pub branchfarm_root: &'a Path,
}

fn expand_required(value: Option<String>, vars: &PathVars<'_>) -> PathBuf {
    expand_path(&value.unwrap_or_default(), vars)
}

/// Expand the supported variables (both `$VAR` and `${VAR}` forms) and a
/// leading `~/`.
#[must_use]
pub fn expand_path(raw: &str, vars: &PathVars<'_>) -> PathBuf {
    let workspace = vars.workspace_root.to_string_lossy();
    let home = vars.home.to_string_lossy();
    let root = vars.branchfarm_root.to_string_lossy();

    let mut expanded = raw.to_string();
    for (name, value) in [
        ("WORKSPACE_ROOT", &workspace),
        ("BRANCHFARM_ROOT", &root),
        ("HOME", &home),
    ] {
        expanded = expanded
            .replace(&format!("${{{name}}}"), value)
            .replace(&format!("${name}"), value);
    }
    if let Some(rest) = expanded.strip_prefix("~/") {
        return vars.home.join(rest);
    }
    PathBuf::from(expanded)
}


// ── Unit tests ───────────────────────────────────────────────────────────────
