//! `branchfarm create PROJECT/BRANCH`: provision a branch environment.

use anyhow::Result;
use clap::Args;

use crate::app::AppContext;
use crate::application::services::workflow::{CreateOptions, Workflow};
use crate::commands::{TargetArgs, inherited_runtime_vars};
use crate::output::{Renderer, TerminalReporter};

/// Arguments for the create command.
#[derive(Args, Debug)]
#[allow(clippy::struct_excessive_bools)]
pub struct CreateArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Use this port instead of allocating one from the project range
    #[arg(long)]
    pub port: Option<u16>,

    /// Skip runtime, package and JS installation
    #[arg(long)]
    pub no_deps: bool,

    /// Skip database creation and preparation
    #[arg(long)]
    pub no_db: bool,

    /// Skip the reverse-proxy route
    #[arg(long, alias = "no-caddy")]
    pub no_proxy: bool,

    /// Skip the tmux session
    #[arg(long, alias = "no-tmux")]
    pub no_session: bool,
}

impl CreateArgs {
    fn options(&self) -> CreateOptions {
        CreateOptions {
            port: self.port,
            no_deps: self.no_deps,
            no_db: self.no_db,
            no_proxy: self.no_proxy,
            no_session: self.no_session,
        }
    }
}

/// Run `branchfarm create`.
///
/// # Errors
///
/// Returns an error if the configuration is invalid or any provisioning step
/// fails.
pub async fn run(app: &AppContext, args: &CreateArgs) -> Result<()> {
    let target = args.target.resolve()?;
    let config = app.project(&target.project)?;

    let renderer = app.renderer();
    if let Renderer::Human(r) = &renderer {
        r.render_create_plan(&config.project_key, &target.branch, &target.slug, app.dry_run);
    }

    let reporter = TerminalReporter::new(&app.output);
    let mut workflow = Workflow::new(
        &config,
        &app.runner,
        &app.registry,
        &app.fs,
        &reporter,
        app.settings.home.clone(),
    )
    .with_inherited_vars(inherited_runtime_vars());
    if let Some(dir) = std::env::var_os("NVM_DIR") {
        workflow = workflow.with_nvm_dir(dir.into());
    }

    let summary = workflow
        .create(&target.branch, &target.slug, &args.options())
        .await?;

    match renderer {
        Renderer::Human(r) => r.render_create(&summary),
        Renderer::Json(r) => r.render(&summary)?,
    }
    Ok(())
}
