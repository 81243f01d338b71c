//! Tests for restores relayed to a second host

use stack_backup::managers::remote::RemoteTarget;
use stack_backup::managers::restore::{RestoreDestination, RestoreManager, RestoreRequest};
use std::path::PathBuf;
use std::sync::Arc;
use test_utils::{
    archive_key, archive_name, timestamp, tooling_postgres, IntegrationRegistry, MemoryStore, MockContainerOps,
    MockExecutor, MockResponse, TEST_BUCKET, TEST_PREFIX,
};

fn request(identity: Option<&str>) -> RestoreRequest {
    RestoreRequest {
        project: "tooling".to_string(),
        archive: None,
        destination: RestoreDestination::Remote(RemoteTarget {
            host: "ops@backup-host".to_string(),
            destination: "/srv/restore".to_string(),
            identity_file: identity.map(PathBuf::from),
        }),
    }
}

fn store() -> MemoryStore {
    let file = archive_name("tooling", 2024, 6, 1);
    MemoryStore::new(TEST_BUCKET).with_object(&archive_key("tooling", &file), b"archive", timestamp(2024, 6, 1))
}

#[tokio::test]
async fn test_remote_restore_copies_and_extracts_only() {
    let executor = MockExecutor::new();
    let runtime = MockContainerOps::new()
        .with_running(&["tooling_infisical-db.1"])
        .with_stack("tooling", &["tooling_web"]);
    let manager = RestoreManager::new(
        Arc::new(store()),
        Arc::new(runtime.clone()),
        IntegrationRegistry::from_config(&[tooling_postgres()]),
        Arc::new(executor.clone()),
        TEST_PREFIX,
        None,
    );

    let report = manager.run(&request(Some("/home/ops/.ssh/id_ed25519"))).await.unwrap();

    assert!(report.extraction.is_ok());
    assert!(report.databases.is_empty());
    assert!(report.reconnect.is_none());
    assert!(runtime.get_calls().is_empty());

    let scp = &executor.calls_to("scp")[0];
    assert_eq!(scp.args[..2], ["-i", "/home/ops/.ssh/id_ed25519"]);
    assert!(scp.args[2].ends_with(&archive_name("tooling", 2024, 6, 1)));
    assert_eq!(scp.args[3], "ops@backup-host:/srv/restore/");

    let extract = executor.calls_to("ssh").pop().unwrap();
    assert!(extract.has_arg("--overwrite"));
    assert!(!executor.was_called("tar"));
}

#[tokio::test]
async fn test_remote_failure_is_reported_not_raised() {
    let executor = MockExecutor::new().expect("ssh", MockResponse::failure("Permission denied (publickey)"));
    let manager = RestoreManager::new(
        Arc::new(store()),
        Arc::new(MockContainerOps::new()),
        IntegrationRegistry::new(),
        Arc::new(executor.clone()),
        TEST_PREFIX,
        None,
    );

    let report = manager.run(&request(None)).await.unwrap();

    assert!(report.extraction.is_err());
    assert!(!executor.was_called("scp"));
}
