//! `branchfarm setup PROJECT`: prepare a project workspace.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::setup;
use crate::output::{Renderer, TerminalReporter};

/// Arguments for the setup command.
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Project name (directory under the workspaces dir)
    pub project: String,
}

/// Run `branchfarm setup`.
///
/// The project configuration is not loaded or validated, since its
/// `base_env_file` usually does not exist yet.
///
/// # Errors
///
/// Returns an error if the project has no `.branchfarm.yml` or the workspace
/// directory cannot be prepared.
pub fn run(app: &AppContext, args: &SetupArgs) -> Result<()> {
    let workspace = app.settings.workspaces_dir.join(&args.project);
    app.output
        .header(&format!("Setting up {} workspace at {}", args.project, workspace.display()));

    let reporter = TerminalReporter::new(&app.output);
    let report = setup::setup(&app.fs, &reporter, app.dry_run, &workspace)?;

    match app.renderer() {
        Renderer::Human(r) => r.render_setup(&args.project, &report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(())
}
