//! Application service: create and remove orchestration.
//!
//! `Workflow` owns nothing; it borrows the resolved configuration and every
//! port for one invocation. Sequential steps are wrapped with their name as
//! error context so the CLI can report which step failed.

mod create;
mod remove;

use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::application::ports::{CommandRunner, LocalFs, PortRegistry, ProgressReporter};
use crate::application::services::proxy::ProxyTarget;
use crate::domain::config::ProjectConfig;
use crate::domain::naming::EnvNames;
use crate::domain::runtime::RuntimeManager;

/// Flags for `create`.
#[derive(Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct CreateOptions {
    /// Explicit port; bypasses range allocation.
    pub port: Option<u16>,
    pub no_deps: bool,
    pub no_db: bool,
    pub no_proxy: bool,
    pub no_session: bool,
}

/// Flags for `remove`.
#[derive(Debug, Clone, Default)]
pub struct RemoveOptions {
    pub keep_db: bool,
}

/// What `create` provisioned.
#[derive(Debug, Clone, Serialize)]
pub struct CreateSummary {
    pub project: String,
    pub branch: String,
    pub slug: String,
    pub port: u16,
    pub host: String,
    pub worktree: PathBuf,
    pub dev_db: String,
    pub test_db: String,
    pub proxy: bool,
    pub database: bool,
    pub session: Option<String>,
    pub use_envrc: bool,
    /// Tolerated failures from best-effort steps.
    pub warnings: Vec<String>,
}

/// What `remove` tore down.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoveSummary {
    pub project: String,
    pub slug: String,
    pub session_killed: bool,
    pub worktree_removed: bool,
    pub databases_dropped: Vec<String>,
    pub port_released: Option<u16>,
    pub warnings: Vec<String>,
}

/// Create/remove orchestrator for one project.
pub struct Workflow<'a, R, G, F, P> {
    pub config: &'a ProjectConfig,
    pub runner: &'a R,
    pub registry: &'a G,
    pub fs: &'a F,
    pub reporter: &'a P,
    pub runtime: Box<dyn RuntimeManager>,
    /// nvm installation root, searched for `corepack`.
    pub nvm_dir: PathBuf,
    /// Runtime variables present in this process, scrubbed from sessions.
    pub inherited_vars: Vec<String>,
}

impl<'a, R, G, F, P> Workflow<'a, R, G, F, P>
where
    R: CommandRunner,
    G: PortRegistry,
    F: LocalFs,
    P: ProgressReporter,
{
    #[must_use]
    pub fn new(
        config: &'a ProjectConfig,
        runner: &'a R,
        registry: &'a G,
        fs: &'a F,
        reporter: &'a P,
        home: PathBuf,
    ) -> Self {
        Self {
            config,
            runner,
            registry,
            fs,
            reporter,
            runtime: config.runtime_manager.manager(),
            nvm_dir: home.join(".nvm"),
            inherited_vars: Vec::new(),
        }
    }

    /// Names of runtime variables to strip from new sessions.
    #[must_use]
    pub fn with_inherited_vars(mut self, vars: Vec<String>) -> Self {
        self.inherited_vars = vars;
        self
    }

    /// Search this nvm root instead of `~/.nvm`.
    #[must_use]
    pub fn with_nvm_dir(mut self, dir: PathBuf) -> Self {
        self.nvm_dir = dir;
        self
    }

    fn names(&self, slug: &str) -> EnvNames {
        EnvNames::derive(self.config, slug)
    }

    fn proxy_target(&self) -> ProxyTarget<'_> {
        ProxyTarget {
            snippets_dir: &self.config.caddy_snippets_dir,
            caddyfile: self.config.caddyfile.as_deref(),
        }
    }
}

/// Announce `name`, run `fut`, and tag any error with `name`.
async fn step<T>(
    reporter: &impl ProgressReporter,
    name: &str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    reporter.step(name);
    fut.await.with_context(|| name.to_string())
}
