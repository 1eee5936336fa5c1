//! Infrastructure implementation of the `CommandRunner` port.
//!
//! `TokioCommandRunner` is the production implementation that uses tokio
//! for async process execution. Commands run to completion; there is no
//! timeout.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::io::AsyncReadExt;

use crate::application::ports::{Cmd, CommandOutput, CommandRunner};
use crate::domain::runtime::is_inherited_runtime_var;

/// Production `CommandRunner`: spawns real processes via `tokio::process`.
///
/// With `dry_run` set, mutating commands are logged, passed to the echo
/// callback if one is installed, and reported as successful without being
/// spawned.
pub struct TokioCommandRunner {
    dry_run: bool,
    echo: Option<Echo>,
}

/// Receives each command simulated in dry-run mode.
pub type Echo = Box<dyn Fn(&Cmd) + Send + Sync>;

impl TokioCommandRunner {
    #[must_use]
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            echo: None,
        }
    }

    /// Install a callback for simulated commands.
    #[must_use]
    pub fn with_echo(mut self, echo: impl Fn(&Cmd) + Send + Sync + 'static) -> Self {
        self.echo = Some(Box::new(echo));
        self
    }
}

impl CommandRunner for TokioCommandRunner {
    fn dry_run(&self) -> bool {
        self.dry_run
    }

    async fn try_run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        if self.dry_run && !cmd.read_only {
            tracing::info!(command = %cmd, "dry-run: not executed");
            if let Some(echo) = &self.echo {
                echo(cmd);
            }
            return Ok(CommandOutput::ok());
        }

        tracing::debug!(command = %cmd, dir = ?cmd.dir, "spawning");
        let mut command = tokio::process::Command::new(&cmd.program);
        command
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &cmd.dir {
            command.current_dir(dir);
        }
        if cmd.unbundled {
            for (name, _) in std::env::vars_os() {
                if name.to_str().is_some_and(is_inherited_runtime_var) {
                    command.env_remove(&name);
                }
            }
        }
        command.envs(cmd.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let mut child = command
            .spawn()
            .with_context(|| format!("failed to spawn {}", cmd.program))?;

        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        let (status, stdout, stderr) = tokio::join!(
            child.wait(),
            async {
                let mut buf = Vec::new();
                if let Some(ref mut h) = stdout_handle {
                    let _ = h.read_to_end(&mut buf).await;
                }
                buf
            },
            async {
                let mut buf = Vec::new();
                if let Some(ref mut h) = stderr_handle {
                    let _ = h.read_to_end(&mut buf).await;
                }
                buf
            },
        );
        let status = status.with_context(|| format!("waiting for {}", cmd.program))?;
        tracing::debug!(command = %cmd, code = ?status.code(), "finished");

        Ok(CommandOutput {
            code: status.code(),
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
        })
    }
}
