//! CLI argument parsing with clap derive

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::app::{AppContext, AppFlags, BehaviourFlags, OutputFlags};
use crate::commands;

/// Per-branch development environments: worktree, port, proxy route,
/// databases and session
#[derive(Parser)]
#[command(
    name = "branchfarm",
    version,
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Show what would be done without changing anything
    #[arg(long, global = true)]
    pub dry_run: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create (or refresh) the environment for a branch
    Create(commands::create::CreateArgs),

    /// Remove the environment for a branch
    Remove(commands::remove::RemoveArgs),

    /// List registered environments
    List(commands::list::ListArgs),

    /// Prepare the .branchfarm/ directory of a project workspace
    Setup(commands::setup::SetupArgs),

    /// Show the state of one environment
    Status(commands::status::StatusArgs),
}

impl Cli {
    /// Whether errors should be printed as a JSON object.
    #[must_use]
    pub fn wants_json(&self) -> bool {
        self.json
    }

    /// Execute the CLI command.
    ///
    /// # Errors
    ///
    /// Returns an error if settings cannot be loaded or the command fails.
    pub async fn run(self) -> Result<()> {
        let Cli {
            json,
            quiet,
            no_color,
            dry_run,
            command,
        } = self;
        let app = AppContext::new(&AppFlags {
            output: OutputFlags {
                no_color,
                quiet,
                json,
            },
            behaviour: BehaviourFlags { dry_run },
        })?;

        match command {
            Command::Create(args) => commands::create::run(&app, &args).await,
            Command::Remove(args) => commands::remove::run(&app, &args).await,
            Command::List(args) => commands::list::run(&app, &args).await,
            Command::Setup(args) => commands::setup::run(&app, &args),
            Command::Status(args) => commands::status::run(&app, &args).await,
        }
    }
}
