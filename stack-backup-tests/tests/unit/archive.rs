//! Tests for the tar-based archiver
//!
//! These use the real `tar` binary.

use stack_backup::backup::{Archiver, BackupArchive};
use std::sync::Arc;
use test_utils::{timestamp, RealExecutor, TestContext};

fn archiver() -> Archiver {
    Archiver::new(Arc::new(RealExecutor::new()), None)
}

fn seed_project(ctx: &TestContext) {
    ctx.create_file("base/tooling/data/app/config.json", r#"{"port": 8080}"#);
    ctx.create_file("base/tooling/data/postgres/dumps/dump.sql", "CREATE TABLE t();");
    ctx.create_file("base/tooling/data/infisical/postgres/PG_VERSION", "16");
    ctx.create_file("base/tooling/README.md", "tooling stack");
}

#[tokio::test]
async fn test_round_trip_reproduces_tree_minus_excludes() {
    let ctx = TestContext::new();
    seed_project(&ctx);
    let archive = BackupArchive::new("tooling", timestamp(2024, 6, 1));

    let path = archiver()
        .create(
            &ctx.path("base"),
            &archive,
            &ctx.create_subdir("backups"),
            &["tooling/data/infisical/postgres".to_string()],
        )
        .await
        .unwrap();
    assert_eq!(
        path.file_name().unwrap(),
        "tooling_2024-06-01-00-00-00.tar.gz"
    );

    let restore = ctx.create_subdir("restore");
    archiver().extract(&path, &restore).await.unwrap();

    assert_eq!(
        ctx.read_file("restore/tooling/data/app/config.json").unwrap(),
        r#"{"port": 8080}"#
    );
    assert_eq!(
        ctx.read_file("restore/tooling/data/postgres/dumps/dump.sql").unwrap(),
        "CREATE TABLE t();"
    );
    assert_eq!(ctx.read_file("restore/tooling/README.md").unwrap(), "tooling stack");
    assert!(!ctx.file_exists("restore/tooling/data/infisical/postgres"));
}

#[tokio::test]
async fn test_extract_merges_into_existing_tree() {
    let ctx = TestContext::new();
    seed_project(&ctx);
    let archive = BackupArchive::new("tooling", timestamp(2024, 6, 1));
    let path = archiver()
        .create(&ctx.path("base"), &archive, &ctx.create_subdir("backups"), &[])
        .await
        .unwrap();

    ctx.create_file("restore/tooling/README.md", "stale copy");
    ctx.create_file("restore/tooling/local-only.txt", "keep me");

    archiver().extract(&path, &ctx.path("restore")).await.unwrap();

    assert_eq!(ctx.read_file("restore/tooling/README.md").unwrap(), "tooling stack");
    assert_eq!(ctx.read_file("restore/tooling/local-only.txt").unwrap(), "keep me");
}

#[tokio::test]
async fn test_failed_archive_leaves_no_partial_file() {
    let ctx = TestContext::new();
    ctx.create_subdir("base");
    let archive = BackupArchive::new("ghost", timestamp(2024, 6, 1));

    let result = archiver()
        .create(&ctx.path("base"), &archive, &ctx.create_subdir("backups"), &[])
        .await;

    assert!(result.is_err());
    assert!(ctx.list_files("backups").is_empty());
}
