//! Application service: read-only reports over the registry and the host.
//!
//! Nothing here mutates state or takes the registry lock.

use std::path::PathBuf;

use anyhow::Result;
use serde::Serialize;

use crate::application::ports::{CommandRunner, LocalFs, PortProbe, PortRegistry};
use crate::application::services::{database, session, worktree};
use crate::domain::config::ProjectConfig;
use crate::domain::naming::{EnvNames, session_name, split_allocation_key};
use crate::domain::registry::entries_for_project;

/// Whether a worktree path is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorktreePresence {
    Ok,
    Missing,
    /// The project configuration could not be loaded.
    Unknown,
}

/// One row of `list`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListRow {
    pub project: String,
    pub slug: String,
    pub port: u16,
    pub worktree: WorktreePresence,
    /// Session name when it is running.
    pub session: Option<String>,
}

/// List registered environments, optionally for one project.
///
/// `worktrees_dir` resolves a project key to its worktrees directory;
/// `None` marks the worktree as unknown.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub async fn list(
    registry: &impl PortRegistry,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    project: Option<&str>,
    mut worktrees_dir: impl FnMut(&str) -> Option<PathBuf>,
) -> Result<Vec<ListRow>> {
    let snapshot = registry.entries().await?;
    let snapshot = match project {
        Some(project) => entries_for_project(&snapshot, project),
        None => snapshot,
    };

    let mut rows = Vec::with_capacity(snapshot.len());
    for (key, port) in &snapshot {
        let (project, slug) = split_allocation_key(key);
        let presence = match worktrees_dir(project) {
            Some(dir) => match worktree::state(fs, &dir.join(slug)) {
                worktree::WorktreeState::Exists => WorktreePresence::Ok,
                worktree::WorktreeState::NotExist => WorktreePresence::Missing,
            },
            None => WorktreePresence::Unknown,
        };
        let name = session_name(project, slug);
        let session = session::exists(runner, &name).await.then_some(name);
        rows.push(ListRow {
            project: project.to_string(),
            slug: slug.to_string(),
            port: *port,
            worktree: presence,
            session,
        });
    }
    Ok(rows)
}

/// Detailed state of one environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnvStatus {
    pub project: String,
    pub slug: String,
    pub port: Option<u16>,
    pub port_in_use: bool,
    pub host: String,
    pub worktree: PathBuf,
    pub worktree_exists: bool,
    pub dev_db: String,
    /// `None` when the database server could not be queried.
    pub dev_db_exists: Option<bool>,
    pub test_db: String,
    pub test_db_exists: Option<bool>,
    pub session: String,
    pub session_active: bool,
}

/// Inspect the environment under `slug`.
///
/// # Errors
///
/// Returns an error if the registry cannot be read.
pub async fn status(
    config: &ProjectConfig,
    registry: &impl PortRegistry,
    runner: &impl CommandRunner,
    fs: &impl LocalFs,
    probe: &dyn PortProbe,
    slug: &str,
) -> Result<EnvStatus> {
    let names = EnvNames::derive(config, slug);
    let port = registry.get(&names.key).await?;
    let port_in_use = port.is_some_and(|p| probe.is_listening(p));

    let dev_db_exists = db_exists(runner, &names.dev_db).await;
    let test_db_exists = db_exists(runner, &names.test_db).await;
    let session_active = session::exists(runner, &names.session).await;

    Ok(EnvStatus {
        worktree_exists: worktree::state(fs, &names.worktree) == worktree::WorktreeState::Exists,
        project: names.project_key,
        slug: names.slug,
        port,
        port_in_use,
        host: names.host,
        worktree: names.worktree,
        dev_db: names.dev_db,
        dev_db_exists,
        test_db: names.test_db,
        test_db_exists,
        session: names.session,
        session_active,
    })
}

async fn db_exists(runner: &impl CommandRunner, name: &str) -> Option<bool> {
    match database::exists(runner, name).await {
        Ok(exists) => Some(exists),
        Err(e) => {
            tracing::debug!(database = name, error = %e, "database check failed");
            None
        }
    }
}
