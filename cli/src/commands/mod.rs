//! Command implementations

pub mod create;
pub mod list;
pub mod remove;
pub mod setup;
pub mod status;

use anyhow::Result;
use clap::Args;

use crate::domain::naming::{parse_target, slugify, validate_slug};

/// `PROJECT/BRANCH` or `PROJECT BRANCH`, plus an optional slug override.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Target as PROJECT/BRANCH (or PROJECT followed by BRANCH)
    pub target: String,

    /// Branch name, when not given as PROJECT/BRANCH
    pub branch: Option<String>,

    /// Override the slug derived from the branch name
    #[arg(long)]
    pub slug: Option<String>,
}

/// Project, branch and slug named by a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub project: String,
    pub branch: String,
    pub slug: String,
}

impl TargetArgs {
    /// Split the target and derive the slug.
    ///
    /// # Errors
    ///
    /// Returns an error if the target is neither `PROJECT/BRANCH` nor
    /// `PROJECT BRANCH`, the slug is empty, or a `--slug` override is not a
    /// plain slug.
    pub fn resolve(&self) -> Result<Target> {
        let (project, branch) = parse_target(&self.target, self.branch.as_deref())?;
        let slug = match &self.slug {
            Some(slug) => {
                validate_slug(slug)?;
                slug.clone()
            }
            None => slugify(&branch),
        };
        if slug.is_empty() {
            anyhow::bail!("Cannot derive a slug from branch '{branch}'; pass --slug");
        }
        Ok(Target {
            project,
            branch,
            slug,
        })
    }
}

/// Names of inherited runtime variables set in this process.
#[must_use]
pub fn inherited_runtime_vars() -> Vec<String> {
    std::env::vars_os()
        .filter_map(|(name, _)| name.into_string().ok())
        .filter(|name| crate::domain::runtime::is_inherited_runtime_var(name))
        .collect()
}
