//! Language runtime manager capability.
//!
//! Each supported manager style implements [`RuntimeManager`]; the variant is
//! chosen once from configuration via [`RuntimeKind::manager`] and used
//! polymorphically afterwards. The methods only build argument vectors, the
//! caller decides how to run them.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};

use crate::domain::error::ConfigError;

/// Environment variable prefixes and names that a process inherits from a
/// Ruby toolchain and that must not leak into provisioned environments.
pub const INHERITED_RUNTIME_PREFIXES: &[&str] = &["BUNDLE", "GEM_"];
pub const INHERITED_RUNTIME_VARS: &[&str] = &["RUBYLIB", "RUBYOPT", "RBENV_VERSION", "RBENV_DIR"];

/// Returns `true` when `name` is a runtime/bundler variable to scrub.
#[must_use]
pub fn is_inherited_runtime_var(name: &str) -> bool {
    INHERITED_RUNTIME_PREFIXES.iter().any(|p| name.starts_with(p))
        || INHERITED_RUNTIME_VARS.contains(&name)
}

/// Supported runtime management styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeKind {
    Rbenv,
    Asdf,
    Mise,
    System,
}

impl FromStr for RuntimeKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rbenv" => Ok(Self::Rbenv),
            "asdf" => Ok(Self::Asdf),
            "mise" => Ok(Self::Mise),
            "system" => Ok(Self::System),
            other => Err(ConfigError::UnsupportedRuntime(other.to_string())),
        }
    }
}

impl fmt::Display for RuntimeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Rbenv => "rbenv",
            Self::Asdf => "asdf",
            Self::Mise => "mise",
            Self::System => "system",
        })
    }
}

impl RuntimeKind {
    /// Select the capability implementation for this kind.
    #[must_use]
    pub fn manager(self) -> Box<dyn RuntimeManager> {
        match self {
            Self::Rbenv => Box::new(Rbenv),
            Self::Asdf => Box::new(Asdf),
            Self::Mise => Box::new(Mise),
            Self::System => Box::new(SystemRuntime),
        }
    }
}

/// Capability interface over a runtime version manager.
pub trait RuntimeManager: Send + Sync {
    /// Command installing `version` if missing, or `None` when nothing to do.
    fn install(&self, version: &str) -> Option<Vec<String>>;

    /// Command pinning `version` for the directory `dir`.
    fn pin(&self, version: &str, dir: &str) -> Option<Vec<String>>;

    /// Prefix for running the interpreter under the managed runtime.
    fn exec_prefix(&self) -> Vec<String>;

    /// Prefix for running the package manager under the managed runtime.
    fn bundle_prefix(&self) -> Vec<String>;

    /// Variables pinning `version` for child processes.
    fn version_env(&self, version: &str) -> Vec<(String, String)>;

    /// Whether `pin` must run with the target directory as working directory.
    fn pins_in_dir(&self) -> bool {
        true
    }
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| (*p).to_string()).collect()
}

struct Rbenv;

impl RuntimeManager for Rbenv {
    fn install(&self, version: &str) -> Option<Vec<String>> {
        Some(argv(&["rbenv", "install", "-s", version]))
    }
    fn pin(&self, version: &str, _dir: &str) -> Option<Vec<String>> {
        Some(argv(&["rbenv", "local", version]))
    }
    fn exec_prefix(&self) -> Vec<String> {
        argv(&["rbenv", "exec", "ruby"])
    }
    fn bundle_prefix(&self) -> Vec<String> {
        argv(&["rbenv", "exec", "bundle"])
    }
    fn version_env(&self, version: &str) -> Vec<(String, String)> {
        vec![("RBENV_VERSION".to_string(), version.to_string())]
    }
}

struct Asdf;

impl RuntimeManager for Asdf {
    fn install(&self, version: &str) -> Option<Vec<String>> {
        Some(argv(&["asdf", "install", "ruby", version]))
    }
    fn pin(&self, version: &str, _dir: &str) -> Option<Vec<String>> {
        Some(argv(&["asdf", "local", "ruby", version]))
    }
    fn exec_prefix(&self) -> Vec<String> {
        argv(&["asdf", "exec", "ruby"])
    }
    fn bundle_prefix(&self) -> Vec<String> {
        argv(&["asdf", "exec", "bundle"])
    }
    fn version_env(&self, version: &str) -> Vec<(String, String)> {
        vec![("ASDF_RUBY_VERSION".to_string(), version.to_string())]
    }
}

struct Mise;

impl RuntimeManager for Mise {
    fn install(&self, version: &str) -> Option<Vec<String>> {
        Some(vec![
            "mise".to_string(),
            "install".to_string(),
            format!("ruby@{version}"),
        ])
    }
    fn pin(&self, version: &str, dir: &str) -> Option<Vec<String>> {
        Some(vec![
            "mise".to_string(),
            "use".to_string(),
            "--path".to_string(),
            dir.to_string(),
            format!("ruby@{version}"),
        ])
    }
    fn exec_prefix(&self) -> Vec<String> {
        argv(&["mise", "exec", "--", "ruby"])
    }
    fn bundle_prefix(&self) -> Vec<String> {
        argv(&["mise", "exec", "--", "bundle"])
    }
    fn version_env(&self, version: &str) -> Vec<(String, String)> {
        vec![("MISE_RUBY_VERSION".to_string(), version.to_string())]
    }
    fn pins_in_dir(&self) -> bool {
        false
    }
}

struct SystemRuntime;

impl RuntimeManager for SystemRuntime {
    fn install(&self, _version: &str) -> Option<Vec<String>> {
        None
    }
    fn pin(&self, _version: &str, _dir: &str) -> Option<Vec<String>> {
        None
    }
    fn exec_prefix(&self) -> Vec<String> {
        argv(&["ruby"])
    }
    fn bundle_prefix(&self) -> Vec<String> {
        argv(&["bundle"])
    }
    fn version_env(&self, _version: &str) -> Vec<(String, String)> {
        Vec::new()
    }
}

/// Extract the runtime version from a version file's contents.
///
/// `.tool-versions` expects a `ruby X` line, `.mise.toml` a `ruby = "X"` line,
/// anything else is read as a bare version string.
///
/// # Errors
///
/// Returns an error if the file has no ruby entry or is empty.
pub fn parse_version(file_name: &str, content: &str) -> Result<String> {
    let version = if file_name.ends_with(".tool-versions") {
        content
            .lines()
            .map(str::trim)
            .find_map(|l| l.strip_prefix("ruby "))
            .map(|v| v.trim().to_string())
    } else if file_name.contains(".mise.toml") {
        content
            .lines()
            .map(str::trim)
            .filter(|l| l.starts_with("ruby") && l["ruby".len()..].trim_start().starts_with('='))
            .find_map(|l| l.split_once('='))
            .map(|(_, v)| v.chars().filter(|c| !matches!(c, '"' | '\'') && !c.is_whitespace()).collect())
    } else {
        Some(content.trim().to_string())
    };

    match version {
        Some(v) if !v.is_empty() => Ok(v),
        _ => bail!("No ruby entry in {file_name}"),
    }
}
