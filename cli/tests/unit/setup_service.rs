//! One-time workspace preparation.

#![allow(clippy::expect_used)]

use branchfarm_cli::application::services::setup::{self, BaseEnvState};
use branchfarm_cli::infra::fs::HostFs;

use crate::mocks::RecordingReporter;

fn workspace_with_example() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".branchfarm.yml"), "project_key: app\n").expect("yml");
    std::fs::create_dir_all(dir.path().join(".branchfarm")).expect("dir");
    std::fs::write(dir.path().join(".branchfarm/base.env.example"), "SECRET_KEY=\n")
        .expect("example");
    dir
}

#[test]
fn test_setup_seeds_base_env_once() {
    let dir = workspace_with_example();
    let reporter = RecordingReporter::default();

    let first = setup::setup(&HostFs, &reporter, false, dir.path()).expect("first setup");
    assert_eq!(first.base_env_state, BaseEnvState::Created);
    assert!(first.files_dir.is_dir());
    assert_eq!(
        std::fs::read_to_string(&first.base_env).expect("base env"),
        "SECRET_KEY=\n"
    );

    std::fs::write(&first.base_env, "SECRET_KEY=edited\n").expect("edit");
    let second = setup::setup(&HostFs, &reporter, false, dir.path()).expect("second setup");
    assert_eq!(second.base_env_state, BaseEnvState::AlreadyExists);
    assert_eq!(
        std::fs::read_to_string(&second.base_env).expect("base env"),
        "SECRET_KEY=edited\n"
    );
}

#[test]
fn test_setup_dry_run_touches_nothing() {
    let dir = workspace_with_example();
    let reporter = RecordingReporter::default();

    let report = setup::setup(&HostFs, &reporter, true, dir.path()).expect("setup");

    assert_eq!(report.base_env_state, BaseEnvState::Created);
    assert!(!report.files_dir.exists());
    assert!(!report.base_env.exists());
}

#[test]
fn test_setup_without_example_warns() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::write(dir.path().join(".branchfarm.yml"), "project_key: app\n").expect("yml");
    let reporter = RecordingReporter::default();

    let report = setup::setup(&HostFs, &reporter, false, dir.path()).expect("setup");

    assert_eq!(report.base_env_state, BaseEnvState::ExampleMissing);
    assert_eq!(reporter.warnings().len(), 1);
}

#[test]
fn test_setup_requires_project_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reporter = RecordingReporter::default();

    let err = setup::setup(&HostFs, &reporter, false, dir.path()).expect_err("no yml");

    assert!(err.to_string().contains("No .branchfarm.yml found"));
}
