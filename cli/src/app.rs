//! Application context: unified state passed to every command handler.
//!
//! `AppContext` is built once in `Cli::run()` from the global flags and the
//! resolved settings, and owns the concrete infrastructure every command
//! shares: the command runner, the port registry, the filesystem and the
//! liveness probe.

use std::sync::Arc;

use anyhow::Result;

use crate::domain::config::{ProjectConfig, Settings};
use crate::infra::command_runner::TokioCommandRunner;
use crate::infra::config::YamlConfigLoader;
use crate::infra::fs::HostFs;
use crate::infra::network::TcpPortProbe;
use crate::infra::registry::FilePortRegistry;
use crate::output::{HumanRenderer, JsonRenderer, OutputContext, Renderer};

/// Output rendering mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Human-readable terminal output (default).
    Human,
    /// Machine-readable JSON output.
    Json,
}

/// Output rendering flags.
pub struct OutputFlags {
    /// Disable ANSI color output.
    pub no_color: bool,
    /// Suppress non-error output.
    pub quiet: bool,
    /// Enable JSON output mode.
    pub json: bool,
}

/// Behaviour flags.
pub struct BehaviourFlags {
    /// Log mutating commands instead of running them.
    pub dry_run: bool,
}

/// Flags passed from the top-level CLI to `AppContext::new`.
pub struct AppFlags {
    /// Output rendering options.
    pub output: OutputFlags,
    /// Behaviour options.
    pub behaviour: BehaviourFlags,
}

/// Unified application context passed to every command handler.
pub struct AppContext {
    /// Terminal output context (colors, quiet mode). Always quiet in JSON
    /// mode so stdout carries only the JSON document.
    pub output: OutputContext,
    /// Output rendering mode (human vs JSON).
    pub mode: OutputMode,
    pub dry_run: bool,
    /// When `true`, skip interactive prompts and use defaults.
    ///
    /// Set when the `CI` or `BRANCHFARM_YES` environment variables are
    /// present.
    pub non_interactive: bool,
    pub settings: Settings,
    pub runner: TokioCommandRunner,
    pub registry: FilePortRegistry,
    pub fs: HostFs,
    pub probe: Arc<TcpPortProbe>,
}

impl AppContext {
    /// Construct an `AppContext` from top-level CLI flags.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined or the
    /// global settings file is invalid.
    pub fn new(flags: &AppFlags) -> Result<Self> {
        let loader = YamlConfigLoader::from_env()?;
        let settings = loader.load_settings()?;
        Ok(Self::with_settings(flags, settings))
    }

    /// Construct an `AppContext` around already-resolved settings.
    #[must_use]
    pub fn with_settings(flags: &AppFlags, settings: Settings) -> Self {
        let non_interactive =
            std::env::var_os("CI").is_some() || std::env::var_os("BRANCHFARM_YES").is_some();
        let dry_run = flags.behaviour.dry_run;

        let mode = if flags.output.json {
            OutputMode::Json
        } else {
            OutputMode::Human
        };
        let quiet = flags.output.quiet || flags.output.json;

        let mut runner = TokioCommandRunner::new(dry_run);
        if !quiet {
            runner = runner.with_echo(|cmd| println!("  [dry-run] {cmd}"));
        }

        let probe = Arc::new(TcpPortProbe);
        let registry = FilePortRegistry::new(&settings.state_dir, probe.clone(), dry_run);

        Self {
            output: OutputContext::new(flags.output.no_color, quiet),
            mode,
            dry_run,
            non_interactive,
            runner,
            registry,
            fs: HostFs,
            probe,
            settings,
        }
    }

    /// Load and validate the configuration for `project`.
    ///
    /// # Errors
    ///
    /// Returns an error if the project is unknown or its configuration is
    /// invalid.
    pub fn project(&self, project: &str) -> Result<ProjectConfig> {
        YamlConfigLoader::load_project(&self.settings, project)
    }

    /// Returns `true` when JSON output mode is active.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.mode == OutputMode::Json
    }

    /// Returns the appropriate `Renderer` variant for the current output mode.
    #[must_use]
    pub fn renderer(&self) -> Renderer<'_> {
        match self.mode {
            OutputMode::Human => Renderer::Human(HumanRenderer::new(&self.output)),
            OutputMode::Json => Renderer::Json(JsonRenderer),
        }
    }

    /// Ask the user for confirmation.
    ///
    /// When `non_interactive` is `true` (`CI` or `BRANCHFARM_YES` set),
    /// returns `default` immediately without prompting.
    ///
    /// # Errors
    ///
    /// Returns an error if the terminal prompt fails (e.g. no TTY available).
    pub fn confirm(&self, prompt: &str, default: bool) -> Result<bool> {
        if self.non_interactive {
            return Ok(default);
        }
        let confirmed = dialoguer::Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()?;
        Ok(confirmed)
    }
}
