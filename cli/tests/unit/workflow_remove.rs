//! `Workflow::remove` against a scripted runner and a real temp workspace.

#![allow(clippy::expect_used)]

use branchfarm_cli::application::ports::PortRegistry;
use branchfarm_cli::application::services::workflow::{RemoveOptions, Workflow};
use branchfarm_cli::infra::fs::HostFs;

use crate::mocks::{Fixture, RecordingReporter, ScriptedRunner};

const PSQL_LIST: &str = " app_main_dev  | me | UTF8 |\n app_main_test | me | UTF8 |\n postgres | me | UTF8 |\n";

/// Fixture with a registered port, a snippet and a worktree for `main`.
async fn provisioned() -> Fixture {
    let fx = Fixture::new();
    fx.registry().register("app:main", 5001).await.expect("register");
    std::fs::create_dir_all(&fx.config.caddy_snippets_dir).expect("snippets dir");
    std::fs::write(fx.config.caddy_snippets_dir.join("app-main.caddy"), "@app_main\n")
        .expect("snippet");
    std::fs::create_dir_all(fx.worktree("main").join(".git")).expect("worktree");
    fx
}

#[tokio::test]
async fn test_remove_tears_everything_down_in_order() {
    let fx = provisioned().await;
    let runner = ScriptedRunner::new().stdout("psql -lqt", PSQL_LIST);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let summary = workflow
        .remove("main", &RemoveOptions::default())
        .await
        .expect("remove");

    assert!(summary.session_killed);
    assert!(summary.worktree_removed);
    assert_eq!(summary.databases_dropped, vec!["app_main_dev", "app_main_test"]);
    assert_eq!(summary.port_released, Some(5001));
    assert!(!fx.config.caddy_snippets_dir.join("app-main.caddy").exists());
    assert_eq!(registry.get("app:main").await.expect("get"), None);

    let commands = runner.commands();
    let position = |pattern: &str| {
        commands
            .iter()
            .position(|c| c.contains(pattern))
            .unwrap_or_else(|| panic!("{pattern} not run: {commands:?}"))
    };
    assert!(position("tmux kill-session") < position("caddy reload"));
    assert!(position("caddy reload") < position("worktree remove --force"));
    assert!(position("worktree remove --force") < position("dropdb app_main_dev"));
}

#[tokio::test]
async fn test_remove_leaves_sessions_alone_when_sessions_are_disabled() {
    let mut fx = provisioned().await;
    fx.config.session_enabled = false;
    let runner = ScriptedRunner::new().stdout("psql -lqt", PSQL_LIST);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let summary = workflow
        .remove("main", &RemoveOptions::default())
        .await
        .expect("remove");

    assert!(!summary.session_killed);
    assert!(!runner.ran("tmux"));
    assert!(summary.worktree_removed);
    assert_eq!(summary.port_released, Some(5001));
}

#[tokio::test]
async fn test_keep_db_skips_drops() {
    let fx = provisioned().await;
    let runner = ScriptedRunner::new().stdout("psql -lqt", PSQL_LIST);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let summary = workflow
        .remove("main", &RemoveOptions { keep_db: true })
        .await
        .expect("remove");

    assert!(summary.databases_dropped.is_empty());
    assert!(!runner.ran("dropdb"));
    assert_eq!(summary.port_released, Some(5001));
}

#[tokio::test]
async fn test_remove_of_absent_environment_is_a_no_op() {
    let fx = Fixture::new();
    let runner = ScriptedRunner::new().exit("tmux has-session", 1);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let summary = workflow
        .remove("ghost", &RemoveOptions::default())
        .await
        .expect("idempotent remove");

    assert!(!summary.session_killed);
    assert!(!summary.worktree_removed);
    assert!(summary.databases_dropped.is_empty());
    assert_eq!(summary.port_released, None);
    assert!(!runner.ran("kill-session"));
    assert!(!runner.ran("worktree remove"));
    assert!(!runner.ran("dropdb"));
}

#[tokio::test]
async fn test_failed_proxy_reload_is_swallowed() {
    let fx = provisioned().await;
    let runner = ScriptedRunner::new()
        .stdout("psql -lqt", PSQL_LIST)
        .exit("caddy reload", 1);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let summary = workflow
        .remove("main", &RemoveOptions::default())
        .await
        .expect("reload failure tolerated");

    assert_eq!(summary.warnings.len(), 1);
    assert!(summary.warnings[0].contains("caddy reload failed"));
    assert!(summary.worktree_removed);
    assert_eq!(summary.port_released, Some(5001));
}

#[tokio::test]
async fn test_worktree_removal_failure_aborts_before_databases() {
    let fx = provisioned().await;
    let runner = ScriptedRunner::new()
        .stdout("psql -lqt", PSQL_LIST)
        .exit("worktree remove", 1);
    let registry = fx.registry();
    let reporter = RecordingReporter::default();
    let workflow = Workflow::new(&fx.config, &runner, &registry, &HostFs, &reporter, fx.home());

    let err = workflow
        .remove("main", &RemoveOptions::default())
        .await
        .expect_err("worktree removal fails");

    assert!(format!("{err:#}").starts_with("worktree removal"));
    assert!(!runner.ran("dropdb"));
    assert_eq!(registry.get("app:main").await.expect("get"), Some(5001));
}
