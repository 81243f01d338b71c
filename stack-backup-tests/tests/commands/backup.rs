//! Tests for the 'backup' command
//!
//! Backups use the real `tar` binary; containers are mocked.

use serial_test::serial;
use stack_backup::config::load_config;
use stack_backup::managers::backup::{BackupError, BackupManager};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use test_utils::{
    timestamp, tooling_postgres, ConfigBuilder, IntegrationRegistry, MockContainerOps, MockExecutor,
    MockResponse, RealExecutor, TestContext,
};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test]
async fn test_backup_archives_each_project_and_includes_dumps() {
    let builder = ConfigBuilder::new()
        .add_project("mau-app")
        .add_project("tooling")
        .add_stateless_dir("tmp")
        .add_project_file("tooling", "data/infisical/postgres/PG_VERSION", "16")
        .with_integration(tooling_postgres());
    let backup_dir = builder.backup_dir();
    let (config, _dir) = builder.persist();

    let registry = IntegrationRegistry::from_config(&config.integrations);
    let runtime = MockContainerOps::new()
        .with_running(&["tooling_infisical-db.1"])
        .with_file_content(b"CREATE TABLE secrets();");
    let manager = BackupManager::new(
        Arc::new(config),
        registry,
        Arc::new(runtime),
        Arc::new(RealExecutor::new()),
    );

    let summary = manager
        .run_at(timestamp(2024, 6, 1), SystemTime::now())
        .await
        .unwrap();

    assert_eq!(summary.succeeded(), 2);
    assert!(summary.failed().is_empty());

    let ctx = TestContext::new();
    let archive = backup_dir.join("tooling_2024-06-01-00-00-00.tar.gz");
    assert!(backup_dir.join("mau-app_2024-06-01-00-00-00.tar.gz").exists());
    stack_backup::backup::Archiver::new(Arc::new(RealExecutor::new()), None)
        .extract(&archive, ctx.temp_dir())
        .await
        .unwrap();

    assert_eq!(
        ctx.read_file("tooling/data/postgres/dumps/dump.sql").unwrap(),
        "CREATE TABLE secrets();"
    );
    assert!(!ctx.file_exists("tooling/data/infisical/postgres/PG_VERSION"));
}

#[tokio::test]
async fn test_sweep_runs_after_failed_projects() {
    let builder = ConfigBuilder::new().add_project("app").add_project("broken");
    let backup_dir = builder.backup_dir();
    let (config, _dir) = builder.persist();

    let old = backup_dir.join("app_2024-01-01-00-00-00.tar.gz");
    std::fs::write(&old, "old").unwrap();
    std::fs::File::options()
        .write(true)
        .open(&old)
        .unwrap()
        .set_modified(SystemTime::now() - 30 * DAY)
        .unwrap();

    let executor = MockExecutor::new().with_default_response(MockResponse::failure("tar: boom"));
    let manager = BackupManager::new(
        Arc::new(config),
        IntegrationRegistry::new(),
        Arc::new(MockContainerOps::new()),
        Arc::new(executor),
    );

    let summary = manager.run().await.unwrap();

    assert_eq!(summary.failed().len(), 2);
    assert_eq!(summary.sweep.as_ref().unwrap().deleted, vec![old.clone()]);
    assert!(!old.exists());
}

#[tokio::test]
async fn test_missing_base_dir_is_fatal() {
    let builder = ConfigBuilder::new();
    let (mut config, dir) = builder.persist();
    config.base_dir = Some(dir.path().join("nope"));

    let manager = BackupManager::new(
        Arc::new(config),
        IntegrationRegistry::new(),
        Arc::new(MockContainerOps::new()),
        Arc::new(MockExecutor::new()),
    );

    let err = manager.run().await.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BackupError>(),
        Some(BackupError::Discovery { .. })
    ));
}

#[tokio::test]
#[serial]
async fn test_environment_drives_backup_directories() {
    let builder = ConfigBuilder::new().add_project("app");
    let base = builder.base_dir();
    let out = builder.temp_dir().join("from-env");
    let (_, _dir) = builder.persist();

    std::env::set_var("BASE_DIR", &base);
    std::env::set_var("BACKUP_DIR", &out);
    let config = load_config(None);
    std::env::remove_var("BASE_DIR");
    std::env::remove_var("BACKUP_DIR");
    let config = config.unwrap();

    let executor = MockExecutor::new();
    let manager = BackupManager::new(
        Arc::new(config),
        IntegrationRegistry::new(),
        Arc::new(MockContainerOps::new()),
        Arc::new(executor.clone()),
    );
    manager.run().await.unwrap();

    assert!(out.is_dir());
    let tar = &executor.calls_to("tar")[0];
    assert!(tar.has_arg(&out.display().to_string()));
    assert!(tar.has_arg(&base.display().to_string()));
}
