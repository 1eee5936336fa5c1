//! Derived identifiers for a branch environment.
//!
//! Every name here is a pure function of the project key, the slug and the
//! project configuration. Nothing is persisted; callers recompute on every
//! invocation.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::domain::config::ProjectConfig;
use crate::domain::error::ConfigError;

static NON_SLUG_CHARS: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new("[^a-z0-9]+").expect("valid slug pattern")
});

/// Normalize a branch name into a filesystem- and host-safe slug.
///
/// `Feature/JIRA-12_login` becomes `feature-jira-12-login`.
#[must_use]
pub fn slugify(branch: &str) -> String {
    let lowered = branch.to_lowercase();
    NON_SLUG_CHARS
        .replace_all(&lowered, "-")
        .trim_matches('-')
        .to_string()
}

static SLUG_SHAPE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)] // compile-time constant pattern
    Regex::new("^[a-z0-9]+(-[a-z0-9]+)*$").expect("valid slug shape")
});

/// Accept only slugs `slugify` could have produced.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidSlug`] for anything else, including path
/// separators, `:` and whitespace.
pub fn validate_slug(slug: &str) -> Result<(), ConfigError> {
    if SLUG_SHAPE.is_match(slug) {
        Ok(())
    } else {
        Err(ConfigError::InvalidSlug(slug.to_string()))
    }
}

/// Split a `PROJECT/BRANCH` argument, or accept an explicit second argument.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidTarget`] when no branch can be found.
pub fn parse_target(target: &str, branch: Option<&str>) -> Result<(String, String), ConfigError> {
    if let Some(branch) = branch {
        return Ok((target.to_string(), branch.to_string()));
    }
    match target.split_once('/') {
        Some((project, branch)) if !project.is_empty() && !branch.is_empty() => {
            Ok((project.to_string(), branch.to_string()))
        }
        _ => Err(ConfigError::InvalidTarget(target.to_string())),
    }
}

/// Registry key for a project environment: `project_key:slug`.
#[must_use]
pub fn allocation_key(project_key: &str, slug: &str) -> String {
    format!("{project_key}:{slug}")
}

/// Split a registry key back into `(project_key, slug)`.
#[must_use]
pub fn split_allocation_key(key: &str) -> (&str, &str) {
    key.split_once(':').unwrap_or((key, ""))
}

/// Interactive session name for an environment.
#[must_use]
pub fn session_name(project_key: &str, slug: &str) -> String {
    format!("{project_key}-{slug}")
}

/// Fill the single `%s` placeholder of a naming template.
#[must_use]
pub fn render_template(template: &str, slug: &str) -> String {
    template.replacen("%s", slug, 1)
}

/// Every identifier derived for one environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvNames {
    pub project_key: String,
    pub slug: String,
    pub key: String,
    pub host: String,
    pub dev_db: String,
    pub test_db: String,
    pub session: String,
    pub worktree: PathBuf,
}

impl EnvNames {
    #[must_use]
    pub fn derive(config: &ProjectConfig, slug: &str) -> Self {
        let prefix = render_template(&config.db_prefix_template, slug);
        Self {
            project_key: config.project_key.clone(),
            slug: slug.to_string(),
            key: allocation_key(&config.project_key, slug),
            host: render_template(&config.base_domain_template, slug),
            dev_db: format!("{prefix}_dev"),
            test_db: format!("{prefix}_test"),
            session: session_name(&config.project_key, slug),
            worktree: config.worktrees_dir.join(slug),
        }
    }
}
