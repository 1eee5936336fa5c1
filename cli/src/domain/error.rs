//! Typed domain error enums.
//!
//! This module has zero imports from `crate::infra`, `crate::commands`,
//! `crate::application`, `tokio`, `std::fs`, `std::process`, or `std::net`.
//! All error types implement `thiserror::Error` and convert to `anyhow::Error`
//! via the `?` operator.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

// ── Config errors ─────────────────────────────────────────────────────────────

/// Errors raised while resolving global settings or a project configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(
        "Unknown project '{project}' (no .branchfarm.yml in {} or {})",
        .workspace.display(),
        .fallback.display()
    )]
    UnknownProject {
        project: String,
        workspace: PathBuf,
        fallback: PathBuf,
    },

    #[error("Missing required config keys in {}: {}", .path.display(), .keys.join(", "))]
    MissingKeys { path: PathBuf, keys: Vec<String> },

    #[error("Invalid value for {key}: {value}\n\n{hint}")]
    InvalidValue {
        key: String,
        value: String,
        hint: String,
    },

    #[error("{key} is not a directory: {}", .path.display())]
    NotADirectory { key: String, path: PathBuf },

    #[error("{key} not found: {}", .path.display())]
    FileNotFound { key: String, path: PathBuf },

    #[error("Unsupported runtime manager '{0}'. Choose from: rbenv, asdf, mise, system")]
    UnsupportedRuntime(String),

    #[error("Invalid format '{0}'. Use PROJECT/BRANCH or PROJECT BRANCH")]
    InvalidTarget(String),

    #[error("Invalid slug '{0}'. Use lowercase letters and digits separated by single dashes")]
    InvalidSlug(String),

    #[error("Invalid registry key {0:?}: keys must be non-empty and free of tabs and line breaks")]
    InvalidRegistryKey(String),
}

// ── Provisioning errors ───────────────────────────────────────────────────────

/// External subsystem touched by a parallel provisioning task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    Proxy,
    Database,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Proxy => f.write_str("proxy"),
            Self::Database => f.write_str("database"),
        }
    }
}

/// One failed task of a parallel group, captured at the join point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFailure {
    pub subsystem: Subsystem,
    pub message: String,
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.subsystem, self.message)
    }
}

/// Errors raised by the provisioning workflow and its collaborators.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("No free port available in range {start}..={end}")]
    ResourceExhausted { start: u16, end: u16 },

    #[error("`{command}` failed ({}){}", exit_label(.code), stderr_suffix(.stderr))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("Background tasks failed: {}", join_failures(.failures))]
    Aggregated { failures: Vec<TaskFailure> },
}

impl ProvisionError {
    /// Subsystems named by an aggregated failure, in join order.
    #[must_use]
    pub fn failed_subsystems(&self) -> Vec<Subsystem> {
        match self {
            Self::Aggregated { failures } => failures.iter().map(|f| f.subsystem).collect(),
            _ => Vec::new(),
        }
    }
}

#[allow(clippy::ref_option)]
fn exit_label(code: &Option<i32>) -> String {
    code.map_or_else(|| "terminated by signal".to_string(), |c| format!("exit code {c}"))
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!(":\n{trimmed}")
    }
}

fn join_failures(failures: &[TaskFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
