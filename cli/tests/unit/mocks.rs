//! Shared mock infrastructure for unit tests.
//!
//! Provides a scripted [`CommandRunner`], a recording [`ProgressReporter`]
//! and an on-disk project fixture so each test file doesn't have to
//! re-define the same boilerplate.

#![allow(clippy::expect_used, dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use branchfarm_cli::application::ports::{
    Cmd, CommandOutput, CommandRunner, PortProbe, ProgressReporter,
};
use branchfarm_cli::domain::config::{ProjectConfig, Settings};
use branchfarm_cli::infra::config::YamlConfigLoader;
use branchfarm_cli::infra::registry::FilePortRegistry;
use tempfile::TempDir;

// ── Command runner ────────────────────────────────────────────────────────────

type Effect = Box<dyn Fn(&Cmd) + Send + Sync>;

enum Reply {
    Exit { code: i32, stdout: String },
    SpawnError,
}

/// Runner that answers from a script and records every command.
///
/// Rules match when their pattern is a substring of the rendered command;
/// the first match wins. Unmatched commands succeed with empty output.
#[derive(Default)]
pub struct ScriptedRunner {
    dry_run: bool,
    rules: Vec<(String, Reply)>,
    effects: Vec<(String, Effect)>,
    calls: Mutex<Vec<Cmd>>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dry_run(mut self) -> Self {
        self.dry_run = true;
        self
    }

    /// Commands containing `pattern` exit with `code`.
    pub fn exit(mut self, pattern: &str, code: i32) -> Self {
        self.rules.push((
            pattern.to_string(),
            Reply::Exit {
                code,
                stdout: String::new(),
            },
        ));
        self
    }

    /// Commands containing `pattern` succeed and print `stdout`.
    pub fn stdout(mut self, pattern: &str, stdout: &str) -> Self {
        self.rules.push((
            pattern.to_string(),
            Reply::Exit {
                code: 0,
                stdout: stdout.to_string(),
            },
        ));
        self
    }

    /// Commands containing `pattern` cannot be spawned.
    pub fn missing(mut self, pattern: &str) -> Self {
        self.rules.push((pattern.to_string(), Reply::SpawnError));
        self
    }

    /// Run `effect` whenever a command containing `pattern` succeeds.
    pub fn effect(mut self, pattern: &str, effect: impl Fn(&Cmd) + Send + Sync + 'static) -> Self {
        self.effects.push((pattern.to_string(), Box::new(effect)));
        self
    }

    /// Rendered commands, in call order.
    pub fn commands(&self) -> Vec<String> {
        self.calls
            .lock()
            .expect("calls lock")
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    pub fn calls(&self) -> Vec<Cmd> {
        self.calls.lock().expect("calls lock").clone()
    }

    /// Whether any recorded command contains `pattern`.
    pub fn ran(&self, pattern: &str) -> bool {
        self.commands().iter().any(|c| c.contains(pattern))
    }
}

impl CommandRunner for ScriptedRunner {
    fn dry_run(&self) -> bool {
        self.dry_run
    }

    async fn try_run(&self, cmd: &Cmd) -> Result<CommandOutput> {
        self.calls.lock().expect("calls lock").push(cmd.clone());
        let rendered = cmd.to_string();
        let reply = self
            .rules
            .iter()
            .find(|(pattern, _)| rendered.contains(pattern.as_str()))
            .map(|(_, reply)| reply);
        let output = match reply {
            Some(Reply::SpawnError) => anyhow::bail!("failed to spawn {}", cmd.program),
            Some(Reply::Exit { code, stdout }) => CommandOutput {
                code: Some(*code),
                stdout: stdout.clone(),
                stderr: if *code == 0 {
                    String::new()
                } else {
                    format!("{} failed", cmd.program)
                },
            },
            None => CommandOutput::ok(),
        };
        if output.success() {
            for (pattern, effect) in &self.effects {
                if rendered.contains(pattern.as_str()) {
                    effect(cmd);
                }
            }
        }
        Ok(output)
    }
}

/// Effect for `git worktree add`: materialize the worktree with a `.git`
/// directory, the way git would.
pub fn materialize_worktree(cmd: &Cmd) {
    let path = cmd
        .args
        .iter()
        .position(|a| a == "add")
        .and_then(|i| cmd.args.get(i + 1))
        .expect("worktree add path");
    std::fs::create_dir_all(Path::new(path).join(".git")).expect("create worktree");
}

// ── Reporter ──────────────────────────────────────────────────────────────────

/// Records every reported line, prefixed by its kind.
#[derive(Default)]
pub struct RecordingReporter {
    lines: Mutex<Vec<String>>,
}

impl RecordingReporter {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().expect("lines lock").clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.lines()
            .into_iter()
            .filter_map(|l| l.strip_prefix("warn: ").map(str::to_string))
            .collect()
    }

    fn push(&self, kind: &str, message: &str) {
        self.lines
            .lock()
            .expect("lines lock")
            .push(format!("{kind}: {message}"));
    }
}

impl ProgressReporter for RecordingReporter {
    fn step(&self, message: &str) {
        self.push("step", message);
    }

    fn success(&self, message: &str) {
        self.push("success", message);
    }

    fn warn(&self, message: &str) {
        self.push("warn", message);
    }
}

// ── Port probe ────────────────────────────────────────────────────────────────

/// Probe reporting the listed ports as live.
pub struct FakeProbe(pub Vec<u16>);

impl PortProbe for FakeProbe {
    fn is_listening(&self, port: u16) -> bool {
        self.0.contains(&port)
    }
}

pub fn registry_at(state_dir: &Path) -> FilePortRegistry {
    FilePortRegistry::new(state_dir, Arc::new(FakeProbe(Vec::new())), false)
}

// ── Project fixture ───────────────────────────────────────────────────────────

const PROJECT_YAML: &str = "\
project_key: app
repo_dir: $WORKSPACE_ROOT/repo
worktrees_dir: $WORKSPACE_ROOT/worktrees
base_env_file: $WORKSPACE_ROOT/.branchfarm/base.env
base_domain_template: '%s.app.test'
port_range_start: 5000
port_range_end: 5002
db_prefix_template: app_%s
";

/// A workspace for project `app` under a temporary home directory.
pub struct Fixture {
    pub dir: TempDir,
    pub settings: Settings,
    pub config: ProjectConfig,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_project_yaml("")
    }

    /// Fixture whose `.branchfarm.yml` has `extra` appended.
    pub fn with_project_yaml(extra: &str) -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let home = dir.path().join("home");
        let root = home.join(".branchfarm");
        let workspace = dir.path().join("ws").join("app");
        std::fs::create_dir_all(workspace.join("repo")).expect("repo dir");
        std::fs::create_dir_all(workspace.join(".branchfarm")).expect("workspace dir");
        std::fs::create_dir_all(&root).expect("root dir");
        std::fs::write(workspace.join(".branchfarm/base.env"), "SECRET_KEY=abc\nPORT=1\n")
            .expect("base env");
        std::fs::write(
            workspace.join(".branchfarm.yml"),
            format!("{PROJECT_YAML}{extra}"),
        )
        .expect("project yaml");

        let caddyfile = dir.path().join("Caddyfile");
        std::fs::write(&caddyfile, "import snippets/*\n").expect("caddyfile");
        let settings_path = root.join("config.yaml");
        std::fs::write(
            &settings_path,
            format!(
                "workspaces_dir: {}\ncaddyfile: {}\nruntime_manager: system\n",
                dir.path().join("ws").display(),
                caddyfile.display()
            ),
        )
        .expect("settings yaml");

        let loader = YamlConfigLoader::with_paths(root, home, settings_path);
        let settings = loader.load_settings().expect("settings");
        let config = YamlConfigLoader::load_project(&settings, "app").expect("project");
        Self {
            dir,
            settings,
            config,
        }
    }

    pub fn registry(&self) -> FilePortRegistry {
        registry_at(&self.settings.state_dir)
    }

    pub fn dry_run_registry(&self) -> FilePortRegistry {
        FilePortRegistry::new(
            &self.settings.state_dir,
            Arc::new(FakeProbe(Vec::new())),
            true,
        )
    }

    pub fn worktree(&self, slug: &str) -> PathBuf {
        self.config.worktrees_dir.join(slug)
    }

    pub fn home(&self) -> PathBuf {
        self.settings.home.clone()
    }
}
