//! Tests for the local retention sweep

use stack_backup::backup::sweep_old_archives;
use std::time::{Duration, SystemTime};
use test_utils::{archive_name, timestamp, TestContext};

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test]
async fn test_january_archive_expires_by_june_tenth() {
    let ctx = TestContext::new();
    let january = archive_name("svcA", 2024, 1, 1);
    let june = archive_name("svcA", 2024, 6, 1);
    let now: SystemTime = timestamp(2024, 6, 10).into();

    ctx.create_file_modified_at(&format!("backups/{}", january), "old", timestamp(2024, 1, 1).into());
    // Keep the June file inside the window relative to "now"
    ctx.create_file_modified_at(&format!("backups/{}", june), "new", now - 2 * DAY);

    let report = sweep_old_archives(&ctx.path("backups"), 7 * DAY, now)
        .await
        .unwrap();

    assert_eq!(report.deleted.len(), 1);
    assert_eq!(ctx.list_files("backups"), vec![june]);
}

#[tokio::test]
async fn test_boundary_one_second_past_window() {
    let ctx = TestContext::new();
    let now = SystemTime::now();
    ctx.create_file_modified_at("backups/expired.tar.gz", "", now - 7 * DAY - Duration::from_secs(1));
    ctx.create_file_modified_at("backups/kept.tar.gz", "", now - 6 * DAY);

    let report = sweep_old_archives(&ctx.path("backups"), 7 * DAY, now)
        .await
        .unwrap();

    assert_eq!(report.kept, 1);
    assert_eq!(ctx.list_files("backups"), vec!["kept.tar.gz"]);
}

#[tokio::test]
async fn test_sweep_is_idempotent() {
    let ctx = TestContext::new();
    let now = SystemTime::now();
    ctx.create_file_modified_at("backups/a.tar.gz", "", now - 30 * DAY);

    let first = sweep_old_archives(&ctx.path("backups"), 7 * DAY, now).await.unwrap();
    let second = sweep_old_archives(&ctx.path("backups"), 7 * DAY, now).await.unwrap();

    assert_eq!(first.deleted.len(), 1);
    assert!(second.deleted.is_empty());
    assert_eq!(second.kept, 0);
}
