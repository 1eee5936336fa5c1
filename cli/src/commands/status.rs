//! `branchfarm status PROJECT/BRANCH`: inspect one environment.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::status;
use crate::commands::TargetArgs;
use crate::output::Renderer;

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

/// Run `branchfarm status`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or the registry cannot
/// be read.
pub async fn run(app: &AppContext, args: &StatusArgs) -> Result<()> {
    let target = args.target.resolve()?;
    let config = app.project(&target.project)?;
    let report = status::status(
        &config,
        &app.registry,
        &app.runner,
        &app.fs,
        app.probe.as_ref(),
        &target.slug,
    )
    .await?;

    match app.renderer() {
        Renderer::Human(r) => r.render_status(&report),
        Renderer::Json(r) => r.render(&report)?,
    }
    Ok(())
}
