//! `branchfarm list [PROJECT]`: registered environments.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::status;
use crate::infra::config::YamlConfigLoader;
use crate::output::Renderer;

/// Arguments for the list command.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// Only show environments of this project
    pub project: Option<String>,
}

/// Run `branchfarm list`.
///
/// # Errors
///
/// Returns an error if the named project is unknown or the registry cannot
/// be read.
pub async fn run(app: &AppContext, args: &ListArgs) -> Result<()> {
    let project_key = match &args.project {
        Some(project) => Some(app.project(project)?.project_key),
        None => None,
    };

    let settings = &app.settings;
    let rows = status::list(
        &app.registry,
        &app.runner,
        &app.fs,
        project_key.as_deref(),
        |project| match YamlConfigLoader::load_project(settings, project) {
            Ok(config) => Some(config.worktrees_dir),
            Err(e) => {
                tracing::debug!(project, error = %e, "cannot resolve worktrees dir");
                None
            }
        },
    )
    .await?;

    match app.renderer() {
        Renderer::Human(r) => r.render_list(&rows),
        Renderer::Json(r) => r.render(&rows)?,
    }
    Ok(())
}
