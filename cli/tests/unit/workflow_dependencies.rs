//! `Workflow::create` with dependency installation enabled: command order,
//! fail-fast behaviour and the environment handed to database preparation.

#![allow(clippy::expect_used)]

use std::path::Path;

use branchfarm_cli::application::ports::Cmd;
use branchfarm_cli::application::services::database::{self, PrepareContext};
use branchfarm_cli::application::services::workflow::{CreateOptions, Workflow};
use branchfarm_cli::domain::runtime::RuntimeKind;
use branchfarm_cli::infra::fs::HostFs;

use crate::mocks::{Fixture, RecordingReporter, ScriptedRunner, materialize_worktree};

const RBENV_PROJECT: &str = "\
runtime_manager: rbenv
bundle_without: development:test
";

const JS_PROJECT: &str = "\
js_install_cmd: yarn install
js_build_cmd: yarn build
";

fn no_session() -> CreateOptions {
    CreateOptions {
        no_session: true,
        ..CreateOptions::default()
    }
}

/// Materialize the worktree and drop `files` into it.
fn checkout_with(
    files: &'static [(&'static str, &'static str)],
) -> impl Fn(&Cmd) + Send + Sync + 'static {
    move |cmd: &Cmd| {
        materialize_worktree(cmd);
        let path = cmd
            .args
            .iter()
            .position(|a| a == "add")
            .and_then(|i| cmd.args.get(i + 1))
            .expect("worktree add path");
        for (name, content) in files {
            std::fs::write(Path::new(path).join(name), content).expect("write checkout file");
        }
    }
}

fn position(commands: &[String], pattern: &str) -> usize {
    commands
        .iter()
        .position(|c| c.contains(pattern))
        .unwrap_or_else(|| panic!("no command containing {pattern:?} in {commands:#?}"))
}

fn env_value<'a>(cmd: &'a Cmd, key: &str) -> Option<&'a str> {
    cmd.envs
        .iter()
        .rev()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

#[tokio::test]
async fn test_create_installs_runtime_and_gems_before_preparing_databases() {
    let fx = Fixture::with_project_yaml(RBENV_PROJECT);
    let runner = ScriptedRunner::new()
        .exit("bundle check", 1)
        .effect("worktree add", checkout_with(&[(".ruby-version", "3.3.0\n")]));
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    workflow
        .create("feature/gems", "feature-gems", &no_session())
        .await
        .expect("create succeeds");

    let commands = runner.commands();
    let order = [
        "rbenv install -s 3.3.0",
        "rbenv local 3.3.0",
        "rbenv exec bundle config set without development:test",
        "rbenv exec bundle check",
        "rbenv exec bundle install",
        "rbenv exec ruby bin/rails db:prepare",
    ];
    let positions: Vec<usize> = order.iter().map(|p| position(&commands, p)).collect();
    assert!(
        positions.windows(2).all(|w| w[0] < w[1]),
        "unexpected order: {commands:#?}"
    );

    let worktree = fx.worktree("feature-gems");
    let pin = runner
        .calls()
        .into_iter()
        .find(|c| c.to_string() == "rbenv local 3.3.0")
        .expect("pin ran");
    assert_eq!(pin.dir.as_deref(), Some(worktree.as_path()));

    let install = runner
        .calls()
        .into_iter()
        .find(|c| c.to_string().contains("bundle install"))
        .expect("bundle install ran");
    assert!(install.unbundled);
    assert_eq!(env_value(&install, "RBENV_VERSION"), Some("3.3.0"));
    assert_eq!(
        env_value(&install, "BUNDLE_GEMFILE").map(Path::new),
        Some(worktree.join("Gemfile").as_path())
    );
}

#[tokio::test]
async fn test_satisfied_bundle_skips_gem_install() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::new()
        .effect("worktree add", checkout_with(&[(".ruby-version", "3.3.0\n")]));
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    workflow
        .create("main", "main", &no_session())
        .await
        .expect("create succeeds");

    assert!(runner.ran("bundle check"));
    assert!(!runner.ran("bundle install"));
    assert!(!runner.ran("bundle config"));
    assert!(
        reporter
            .lines()
            .iter()
            .any(|l| l.contains("bundle satisfied, skipping install"))
    );
    assert!(runner.ran("bin/rails db:prepare"));
}

#[tokio::test]
async fn test_failed_gem_install_stops_before_database_preparation() {
    let fx = Fixture::with_project_yaml(JS_PROJECT);
    let runner = ScriptedRunner::new()
        .exit("bundle check", 1)
        .exit("bundle install", 1)
        .effect("worktree add", checkout_with(&[(".ruby-version", "3.3.0\n")]));
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let err = workflow
        .create("feature/x", "feature-x", &no_session())
        .await
        .expect_err("gem install failure surfaces");

    assert_eq!(err.to_string(), "dependency installation");
    assert!(!runner.ran("sh -c"));
    assert!(!runner.ran("db:prepare"));
}

#[tokio::test]
async fn test_missing_version_file_fails_dependency_installation() {
    let fx = Fixture::with_project_yaml(RBENV_PROJECT);
    let runner = ScriptedRunner::new().effect("worktree add", materialize_worktree);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let err = workflow
        .create("feature/x", "feature-x", &no_session())
        .await
        .expect_err("unreadable version file surfaces");

    assert_eq!(err.to_string(), "dependency installation");
    assert!(format!("{err:#}").contains(".ruby-version"));
    assert!(!runner.ran("rbenv install"));
    assert!(!runner.ran("bundle"));
    assert!(!runner.ran("db:prepare"));
}

#[tokio::test]
async fn test_required_npm_token_missing_aborts_before_js_install() {
    let fx = Fixture::with_project_yaml(&format!("{JS_PROJECT}require_npm_token: true\n"));
    let runner = ScriptedRunner::new()
        .effect("worktree add", checkout_with(&[(".ruby-version", "3.3.0\n")]));
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let err = workflow
        .create("feature/x", "feature-x", &no_session())
        .await
        .expect_err("missing NPM_TOKEN surfaces");

    assert!(format!("{err:#}").contains("NPM_TOKEN not set"));
    assert!(runner.ran("bundle check"));
    assert!(!runner.ran("sh -c"));
    assert!(!runner.ran("db:prepare"));
}

#[tokio::test]
async fn test_package_manager_field_routes_yarn_through_newest_corepack() {
    let fx = Fixture::with_project_yaml(JS_PROJECT);
    let versions = fx.home().join(".nvm/versions/node");
    for version in ["v18.19.0", "v20.11.0"] {
        let bin = versions.join(version).join("bin");
        std::fs::create_dir_all(&bin).expect("node bin dir");
        std::fs::write(bin.join("corepack"), "").expect("corepack");
    }
    let runner = ScriptedRunner::new().effect(
        "worktree add",
        checkout_with(&[
            (".ruby-version", "3.3.0\n"),
            ("package.json", r#"{"packageManager": "yarn@4.1.0"}"#),
        ]),
    );
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    workflow
        .create("feature/js", "feature-js", &no_session())
        .await
        .expect("create succeeds");

    let corepack = versions.join("v20.11.0/bin/corepack");
    let commands = runner.commands();
    let install = position(
        &commands,
        &format!("sh -c {} yarn install", corepack.display()),
    );
    let build = position(&commands, "sh -c yarn build");
    let prepare = position(&commands, "bin/rails db:prepare");
    assert!(install < build && build < prepare, "unexpected order: {commands:#?}");

    let js = runner
        .calls()
        .into_iter()
        .find(|c| c.to_string().contains("yarn install"))
        .expect("js install ran");
    assert_eq!(env_value(&js, "SECRET_KEY"), Some("abc"));
    assert_eq!(env_value(&js, "PORT"), Some("5000"));
}

#[tokio::test]
async fn test_database_preparation_sees_worktree_env_over_base_env() {
    let fx = Fixture::with_project_yaml(RBENV_PROJECT);
    let runner = ScriptedRunner::new()
        .effect("worktree add", checkout_with(&[(".ruby-version", "3.3.0\n")]));
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    workflow
        .create("feature/db", "feature-db", &no_session())
        .await
        .expect("create succeeds");

    let prepares: Vec<Cmd> = runner
        .calls()
        .into_iter()
        .filter(|c| c.to_string().contains("db:prepare"))
        .collect();
    assert_eq!(prepares.len(), 2);

    let worktree = fx.worktree("feature-db");
    for cmd in &prepares {
        assert_eq!(cmd.dir.as_deref(), Some(worktree.as_path()));
        assert!(cmd.unbundled);
        assert_eq!(env_value(cmd, "PORT"), Some("5000"));
        assert_eq!(env_value(cmd, "SECRET_KEY"), Some("abc"));
        assert_eq!(env_value(cmd, "RBENV_VERSION"), Some("3.3.0"));
        assert!(
            env_value(cmd, "BUNDLE_GEMFILE").is_some_and(|v| v.ends_with("Gemfile")),
            "missing BUNDLE_GEMFILE: {:?}",
            cmd.envs
        );
    }
    assert_eq!(env_value(&prepares[0], "RAILS_ENV"), None);
    assert_eq!(env_value(&prepares[1], "RAILS_ENV"), Some("test"));
}

#[tokio::test]
async fn test_prepare_without_version_file_runs_unpinned() {
    let fx = Fixture::new();
    let worktree = fx.worktree("bare");
    std::fs::create_dir_all(&worktree).expect("worktree");
    let runtime = RuntimeKind::Rbenv.manager();
    let runner = ScriptedRunner::new();
    let reporter = RecordingReporter::default();
    let ctx = PrepareContext {
        worktree: &worktree,
        base_env_file: &fx.config.base_env_file,
        runtime: runtime.as_ref(),
        version_file: &fx.config.runtime_version_file,
    };

    database::prepare(&runner, &HostFs, &reporter, &ctx, "bin/rails db:seed", Some("test"))
        .await
        .expect("prepare tolerates a missing version file");

    let calls = runner.calls();
    assert_eq!(calls.len(), 1);
    let cmd = &calls[0];
    assert_eq!(cmd.to_string(), "rbenv exec ruby bin/rails db:seed");
    assert_eq!(env_value(cmd, "RBENV_VERSION"), None);
    assert_eq!(env_value(cmd, "RAILS_ENV"), Some("test"));
    assert_eq!(env_value(cmd, "PORT"), Some("1"));
    assert!(env_value(cmd, "BUNDLE_GEMFILE").is_some());
}
