//! Tests for the 'restore' command
//!
//! Local restores use the real `tar` binary; the bucket and containers are mocked.

use stack_backup::backup::{Archiver, BackupArchive};
use stack_backup::managers::restore::{
    resolve_latest, ReconnectOutcome, RestoreDestination, RestoreError, RestoreManager, RestoreRequest,
};
use std::sync::Arc;
use test_utils::{
    archive_key, archive_name, timestamp, tooling_postgres, tooling_redis, ContainerCall, IntegrationRegistry, MemoryStore,
    MockContainerOps, RealExecutor, StoreCall, TestContext, TEST_BUCKET, TEST_PREFIX,
};

/// Build a real archive of `base/{project}` and return its bytes
async fn build_archive(ctx: &TestContext, project: &str) -> (String, Vec<u8>) {
    let archive = BackupArchive::new(project, timestamp(2024, 6, 1));
    let path = Archiver::new(Arc::new(RealExecutor::new()), None)
        .create(&ctx.path("base"), &archive, &ctx.create_subdir("backups"), &[])
        .await
        .unwrap();
    (archive.file_name(), std::fs::read(path).unwrap())
}

fn manager(store: &MemoryStore, runtime: &MockContainerOps, registry: IntegrationRegistry) -> RestoreManager {
    RestoreManager::new(
        Arc::new(store.clone()),
        Arc::new(runtime.clone()),
        registry,
        Arc::new(RealExecutor::new()),
        TEST_PREFIX,
        None,
    )
}

#[tokio::test]
async fn test_restore_without_backups_performs_no_download() {
    let ctx = TestContext::new();
    let store = MemoryStore::new(TEST_BUCKET);
    let runtime = MockContainerOps::new();

    let err = manager(&store, &runtime, IntegrationRegistry::new())
        .run(&RestoreRequest {
            project: "svcA".to_string(),
            archive: None,
            destination: RestoreDestination::Local {
                root: ctx.create_subdir("restore"),
            },
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RestoreError>(),
        Some(RestoreError::NoBackupsFound { project }) if project == "svcA"
    ));
    assert_eq!(
        store.get_calls(),
        vec![StoreCall::List {
            prefix: "backups/svcA/".to_string()
        }]
    );
}

#[tokio::test]
async fn test_latest_of_three_is_resolved() {
    let store = MemoryStore::new(TEST_BUCKET)
        .with_object(&archive_key("svcA", &archive_name("svcA", 2024, 6, 2)), b"2", timestamp(2024, 6, 2))
        .with_object(&archive_key("svcA", &archive_name("svcA", 2024, 6, 3)), b"3", timestamp(2024, 6, 3))
        .with_object(&archive_key("svcA", &archive_name("svcA", 2024, 6, 1)), b"1", timestamp(2024, 6, 1));

    let latest = resolve_latest(&store, TEST_PREFIX, "svcA").await.unwrap();

    assert_eq!(latest, archive_name("svcA", 2024, 6, 3));
}

#[tokio::test]
async fn test_local_restore_merges_and_restores_database() {
    let ctx = TestContext::new();
    ctx.create_file("base/tooling/data/app/settings.json", "restored");
    ctx.create_file("base/tooling/data/postgres/dumps/dump.sql", "-- dump");
    let (file, bytes) = build_archive(&ctx, "tooling").await;

    ctx.create_file("restore/tooling/data/app/settings.json", "stale");
    ctx.create_file("restore/tooling/data/app/local.json", "untouched");

    let store = MemoryStore::new(TEST_BUCKET).with_object(&archive_key("tooling", &file), &bytes, timestamp(2024, 6, 1));
    let runtime = MockContainerOps::new()
        .with_running(&["tooling_infisical-db.1"])
        .with_stack("tooling", &["tooling_infisical", "tooling_infisical-db"]);
    let registry = IntegrationRegistry::from_config(&[tooling_postgres()]);

    let report = manager(&store, &runtime, registry)
        .run(&RestoreRequest {
            project: "tooling".to_string(),
            archive: None,
            destination: RestoreDestination::Local {
                root: ctx.path("restore"),
            },
        })
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.archive, file);
    assert_eq!(ctx.read_file("restore/tooling/data/app/settings.json").unwrap(), "restored");
    assert_eq!(ctx.read_file("restore/tooling/data/app/local.json").unwrap(), "untouched");

    assert!(report.databases[0].is_completed());
    assert!(runtime
        .exec_commands_for("tooling_infisical-db.1")
        .iter()
        .any(|c| c.iter().any(|a| a.contains("DROP SCHEMA public CASCADE"))));

    assert!(matches!(report.reconnect, Some(ReconnectOutcome::Redeployed { .. })));
    assert_eq!(runtime.redeployed(), vec!["tooling"]);
}

#[tokio::test]
async fn test_manual_action_when_nothing_to_redeploy() {
    let ctx = TestContext::new();
    ctx.create_file("base/svcA/data/file.txt", "content");
    let (file, bytes) = build_archive(&ctx, "svcA").await;
    let store = MemoryStore::new(TEST_BUCKET).with_object(&archive_key("svcA", &file), &bytes, timestamp(2024, 6, 1));
    let runtime = MockContainerOps::new();

    let report = manager(&store, &runtime, IntegrationRegistry::new())
        .run(&RestoreRequest {
            project: "svcA".to_string(),
            archive: Some(file.clone()),
            destination: RestoreDestination::Local {
                root: ctx.create_subdir("restore"),
            },
        })
        .await
        .unwrap();

    assert_eq!(report.reconnect, Some(ReconnectOutcome::ManualActionRequired));
    assert!(report.databases.is_empty());
    assert!(!runtime
        .get_calls()
        .iter()
        .any(|c| matches!(c, ContainerCall::RedeployStack { .. })));
}

#[tokio::test]
async fn test_missing_explicit_archive_fails_download() {
    let ctx = TestContext::new();
    let store = MemoryStore::new(TEST_BUCKET);
    let runtime = MockContainerOps::new();

    let err = manager(&store, &runtime, IntegrationRegistry::new())
        .run(&RestoreRequest {
            project: "svcA".to_string(),
            archive: Some(archive_name("svcA", 2024, 6, 1)),
            destination: RestoreDestination::Local {
                root: ctx.create_subdir("restore"),
            },
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<RestoreError>(),
        Some(RestoreError::Download { .. })
    ));
    assert!(!ctx.file_exists("restore/svcA"));
}

#[tokio::test]
async fn test_dumps_are_kept_when_databases_are_down() {
    let ctx = TestContext::new();
    ctx.create_file("base/tooling/data/app/settings.json", "restored");
    ctx.create_file("base/tooling/data/postgres/dumps/dump.sql", "-- dump");
    ctx.create_file("base/tooling/data/redis/dumps/dump.rdb", "REDIS0011");
    let (file, bytes) = build_archive(&ctx, "tooling").await;

    let store = MemoryStore::new(TEST_BUCKET).with_object(&archive_key("tooling", &file), &bytes, timestamp(2024, 6, 1));
    let runtime = MockContainerOps::new();
    let registry = IntegrationRegistry::from_config(&[tooling_postgres(), tooling_redis()]);

    let report = manager(&store, &runtime, registry)
        .run(&RestoreRequest {
            project: "tooling".to_string(),
            archive: None,
            destination: RestoreDestination::Local {
                root: ctx.create_subdir("restore"),
            },
        })
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.databases.len(), 2);
    assert!(report
        .databases
        .iter()
        .all(|d| matches!(d.result, Ok(test_utils::StepOutcome::Skipped { .. }))));
    assert!(!runtime.get_calls().iter().any(|c| matches!(
        c,
        ContainerCall::Exec { .. } | ContainerCall::CopyTo { .. }
    )));

    assert_eq!(ctx.read_file("restore/tooling/data/app/settings.json").unwrap(), "restored");
    assert_eq!(ctx.read_file("restore/tooling/data/postgres/dumps/dump.sql").unwrap(), "-- dump");
    assert_eq!(ctx.read_file("restore/tooling/data/redis/dumps/dump.rdb").unwrap(), "REDIS0011");
    assert_eq!(report.reconnect, Some(ReconnectOutcome::ManualActionRequired));
}
