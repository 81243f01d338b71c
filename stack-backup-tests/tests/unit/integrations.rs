//! Tests for the integration registry against a mocked runtime

use std::path::Path;
use test_utils::{
    tooling_postgres, tooling_redis, ContainerCall, IntegrationRegistry, MockContainerOps, StepOutcome,
    TestContext,
};

#[tokio::test]
async fn test_dump_skips_when_containers_are_down() {
    let ctx = TestContext::new();
    let registry = IntegrationRegistry::from_config(&[tooling_postgres(), tooling_redis()]);
    let runtime = MockContainerOps::new();

    let reports = registry
        .dump_project(&runtime, "tooling", &ctx.path("tooling"))
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| matches!(r.result, Ok(StepOutcome::Skipped { .. }))));
}

#[tokio::test]
async fn test_projects_without_integrations_do_nothing() {
    let registry = IntegrationRegistry::from_config(&[tooling_postgres()]);
    let runtime = MockContainerOps::new().with_running(&["mau-app_db.1"]);

    let reports = registry
        .dump_project(&runtime, "mau-app", Path::new("/nonexistent/mau-app"))
        .await;

    assert!(reports.is_empty());
    assert!(runtime.get_calls().is_empty());
}

#[tokio::test]
async fn test_restore_pushes_both_artifacts_back() {
    let ctx = TestContext::new();
    ctx.create_file("tooling/data/postgres/dumps/dump.sql", "-- dump");
    ctx.create_file("tooling/data/redis/dumps/dump.rdb", "REDIS0011");

    let registry = IntegrationRegistry::from_config(&[tooling_postgres(), tooling_redis()]);
    let runtime = MockContainerOps::new()
        .with_running(&["tooling_infisical-db.1", "tooling_infisical-redis.1"]);

    let reports = registry
        .restore_project(&runtime, "tooling", &ctx.path("tooling"))
        .await;

    assert!(reports.iter().all(|r| r.is_completed()));

    let copied: Vec<_> = runtime
        .get_calls()
        .into_iter()
        .filter_map(|c| match c {
            ContainerCall::CopyTo { container, .. } => Some(container),
            _ => None,
        })
        .collect();
    assert_eq!(copied, vec!["tooling_infisical-db.1", "tooling_infisical-redis.1"]);
}

#[tokio::test]
async fn test_restore_failure_is_isolated() {
    let ctx = TestContext::new();
    ctx.create_file("tooling/data/postgres/dumps/dump.sql", "-- dump");
    ctx.create_file("tooling/data/redis/dumps/dump.rdb", "REDIS0011");

    let registry = IntegrationRegistry::from_config(&[tooling_postgres(), tooling_redis()]);
    let runtime = MockContainerOps::new()
        .with_running(&["tooling_infisical-db.1", "tooling_infisical-redis.1"])
        .with_failing_container("tooling_infisical-db.1");

    let reports = registry
        .restore_project(&runtime, "tooling", &ctx.path("tooling"))
        .await;

    assert!(reports[0].is_failure());
    assert!(reports[1].is_completed());
}

#[tokio::test]
async fn test_restore_skips_when_containers_are_down() {
    let ctx = TestContext::new();
    ctx.create_file("tooling/data/postgres/dumps/dump.sql", "-- dump");
    ctx.create_file("tooling/data/redis/dumps/dump.rdb", "REDIS0011");

    let registry = IntegrationRegistry::from_config(&[tooling_postgres(), tooling_redis()]);
    let runtime = MockContainerOps::new();

    let reports = registry
        .restore_project(&runtime, "tooling", &ctx.path("tooling"))
        .await;

    assert_eq!(reports.len(), 2);
    assert!(reports
        .iter()
        .all(|r| matches!(r.result, Ok(StepOutcome::Skipped { .. }))));
    assert!(runtime
        .get_calls()
        .iter()
        .all(|c| matches!(c, ContainerCall::FindRunning { .. })));

    assert_eq!(ctx.read_file("tooling/data/postgres/dumps/dump.sql").unwrap(), "-- dump");
    assert_eq!(ctx.read_file("tooling/data/redis/dumps/dump.rdb").unwrap(), "REDIS0011");
}
