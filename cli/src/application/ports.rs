//! Port trait definitions for the Application layer.
//!
//! Ports are the interfaces (contracts) that infrastructure must fulfill.
//! This file imports only from `crate::domain`, never from `crate::infra`,
//! `crate::commands`, or `crate::output`.

use std::fmt;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::domain::error::ProvisionError;
use crate::domain::registry::Snapshot;

// ── Value Types ───────────────────────────────────────────────────────────────

/// An external command: program, arguments, working directory and extra
/// environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cmd {
    pub program: String,
    pub args: Vec<String>,
    pub dir: Option<PathBuf>,
    pub envs: Vec<(String, String)>,
    /// Strip inherited runtime/bundler variables before spawning.
    pub unbundled: bool,
    /// Side-effect-free probe; executed even in dry-run mode.
    pub read_only: bool,
}

impl Cmd {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Build from an argument vector, `None` when it is empty.
    #[must_use]
    pub fn from_argv(argv: Vec<String>) -> Option<Self> {
        let mut parts = argv.into_iter();
        let program = parts.next()?;
        Some(Self::new(program).args(parts))
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    #[must_use]
    pub fn envs<I>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        self.envs.extend(envs);
        self
    }

    #[must_use]
    pub fn unbundled(mut self) -> Self {
        self.unbundled = true;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl fmt::Display for Cmd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    /// A successful, silent result (used for simulated commands).
    #[must_use]
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl From<std::process::Output> for CommandOutput {
    fn from(output: std::process::Output) -> Self {
        Self {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        }
    }
}

// ── Command Runner Port ───────────────────────────────────────────────────────

/// Abstracts process execution so infrastructure can be swapped or mocked.
///
/// In dry-run mode implementations log mutating commands instead of running
/// them and report success; commands marked [`Cmd::read_only`] still run.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Whether mutating commands are simulated.
    fn dry_run(&self) -> bool;

    /// Run a command and return its output whatever the exit status.
    ///
    /// # Errors
    ///
    /// Returns an error only if the process cannot be spawned or awaited.
    async fn try_run(&self, cmd: &Cmd) -> Result<CommandOutput>;

    /// Run a command, failing on a non-zero exit.
    ///
    /// # Errors
    ///
    /// Returns [`ProvisionError::CommandFailed`] on a non-zero exit, or the
    /// spawn error from [`CommandRunner::try_run`].
    async fn run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        let output = self.try_run(cmd).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(ProvisionError::CommandFailed {
                command: cmd.to_string(),
                code: output.code,
                stderr: output.stderr,
            }
            .into())
        }
    }
}

// ── Port Registry Port ────────────────────────────────────────────────────────

/// Persistent key→port bindings shared by every process on the host.
///
/// Each mutating call is a single critical section: lock, load, compute,
/// persist, unlock.
#[allow(async_fn_in_trait)]
pub trait PortRegistry {
    /// Return the existing binding for `key`, or bind the lowest free port in
    /// `range`.
    async fn allocate(&self, key: &str, range: RangeInclusive<u16>) -> Result<u16>;
    /// Bind `key` to `port` unconditionally.
    async fn register(&self, key: &str, port: u16) -> Result<u16>;
    /// Current binding for `key`. Does not take the lock.
    async fn get(&self, key: &str) -> Result<Option<u16>>;
    /// Delete the binding for `key`; a missing key is a no-op.
    async fn remove(&self, key: &str) -> Result<Option<u16>>;
    /// Full snapshot. Does not take the lock.
    async fn entries(&self) -> Result<Snapshot>;
}

// ── Network Probe Port ────────────────────────────────────────────────────────

/// Checks whether something accepts connections on a local port.
pub trait PortProbe: Send + Sync {
    fn is_listening(&self, port: u16) -> bool;
}

// ── Filesystem Port ───────────────────────────────────────────────────────────

/// Abstracts local filesystem access used by the services.
pub trait LocalFs {
    fn exists(&self, path: &Path) -> bool;
    fn is_dir(&self, path: &Path) -> bool;
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn write(&self, path: &Path, content: &str) -> Result<()>;
    /// # Errors
    ///
    /// Returns an error if the file cannot be read.
    fn read_to_string(&self, path: &Path) -> Result<String>;
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be removed.
    fn remove_file(&self, path: &Path) -> Result<()>;
    /// Copy `path` to `dest` (regular file).
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn copy_file(&self, path: &Path, dest: &Path) -> Result<()>;
    /// Recursively copy the contents of `src` into `dest`, returning the number
    /// of files copied.
    ///
    /// # Errors
    ///
    /// Returns an error if any entry cannot be copied.
    fn copy_tree(&self, src: &Path, dest: &Path) -> Result<usize>;
    /// Create a symlink at `link` pointing to `target`, replacing an existing
    /// link or regular file.
    ///
    /// # Errors
    ///
    /// Returns an error if `link` is a real directory or the link cannot be
    /// created.
    fn symlink(&self, target: &Path, link: &Path) -> Result<()>;
    /// Immediate children of `path`; empty when it is not a readable directory.
    fn list_dir(&self, path: &Path) -> Vec<PathBuf>;
    /// Locate an executable on `PATH`.
    fn which(&self, program: &str) -> Option<PathBuf>;
}

// ── Progress Reporting Port ───────────────────────────────────────────────────

/// Abstracts progress reporting so services can emit events without
/// depending on the Presentation layer. Sync trait.
pub trait ProgressReporter {
    /// Emit an in-progress step message.
    fn step(&self, message: &str);
    /// Emit a success message.
    fn success(&self, message: &str);
    /// Emit a warning message.
    fn warn(&self, message: &str);
}
