//! `branchfarm remove PROJECT/BRANCH`: tear down a branch environment.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::workflow::{RemoveOptions, Workflow};
use crate::commands::TargetArgs;
use crate::output::{Renderer, TerminalReporter};

/// Arguments for the remove command.
#[derive(Args, Debug)]
pub struct RemoveArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Keep the dev and test databases
    #[arg(long)]
    pub keep_db: bool,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

/// Run `branchfarm remove`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the prompt fails, or a
/// teardown step fails.
pub async fn run(app: &AppContext, args: &RemoveArgs) -> Result<()> {
    let target = args.target.resolve()?;
    let config = app.project(&target.project)?;

    if !app.output.quiet {
        println!();
        println!("Removing environment: {}/{}", config.project_key, target.slug);
        println!();
    }

    let skip_prompt = args.yes || app.non_interactive || app.dry_run;
    if !skip_prompt && !app.confirm("Remove worktree, route, session and databases?", false)? {
        println!("Cancelled.");
        return Ok(());
    }

    let reporter = TerminalReporter::new(&app.output);
    let workflow = Workflow::new(
        &config,
        &app.runner,
        &app.registry,
        &app.fs,
        &reporter,
        app.settings.home.clone(),
    );
    let summary = workflow
        .remove(
            &target.slug,
            &RemoveOptions {
                keep_db: args.keep_db,
            },
        )
        .await?;

    match app.renderer() {
        Renderer::Human(r) => r.render_remove(&summary),
        Renderer::Json(r) => r.render(&summary)?,
    }
    Ok(())
}
