//! Tests for the 'upload' command

use stack_backup::managers::upload::{UploadError, UploadManager, UploadStatus};
use std::sync::Arc;
use test_utils::{archive_key, archive_name, timestamp, MemoryStore, StoreCall, TestContext, TEST_BUCKET, TEST_PREFIX};

#[tokio::test]
async fn test_uploads_missing_object_then_skips_it() {
    let ctx = TestContext::new();
    let file = archive_name("svcA", 2024, 6, 1);
    ctx.create_file(&format!("backups/{}", file), "archive bytes");
    let store = MemoryStore::new(TEST_BUCKET);
    let manager = UploadManager::new(Arc::new(store.clone()), &ctx.path("backups"), TEST_PREFIX);

    let first = manager.run().await.unwrap();
    assert_eq!(first.files[0].status, UploadStatus::Uploaded);
    assert_eq!(first.files[0].key, archive_key("svcA", &file));
    assert_eq!(store.object(&archive_key("svcA", &file)).unwrap(), b"archive bytes");

    let second = manager.run().await.unwrap();
    assert_eq!(second.files[0].status, UploadStatus::Skipped);
    assert_eq!(store.put_count(), 1);
    assert_eq!(store.keys().len(), 1);
}

#[tokio::test]
async fn test_existing_remote_object_is_not_overwritten() {
    let ctx = TestContext::new();
    let file = archive_name("svcA", 2024, 6, 1);
    ctx.create_file(&format!("backups/{}", file), "local bytes");
    let store = MemoryStore::new(TEST_BUCKET).with_object(
        &archive_key("svcA", &file),
        b"remote bytes",
        timestamp(2024, 6, 1),
    );
    let manager = UploadManager::new(Arc::new(store.clone()), &ctx.path("backups"), TEST_PREFIX);

    let summary = manager.run().await.unwrap();

    assert_eq!(summary.skipped(), 1);
    assert_eq!(store.object(&archive_key("svcA", &file)).unwrap(), b"remote bytes");
}

#[tokio::test]
async fn test_missing_bucket_aborts_before_any_upload() {
    let ctx = TestContext::new();
    ctx.create_file(&format!("backups/{}", archive_name("svcA", 2024, 6, 1)), "x");
    let store = MemoryStore::missing_bucket(TEST_BUCKET);
    let manager = UploadManager::new(Arc::new(store.clone()), &ctx.path("backups"), TEST_PREFIX);

    let err = manager.run().await.unwrap_err();

    assert!(err.downcast_ref::<UploadError>().is_some());
    assert_eq!(store.get_calls(), vec![StoreCall::BucketExists]);
}

#[tokio::test]
async fn test_keys_use_text_before_first_underscore() {
    let ctx = TestContext::new();
    ctx.create_file("backups/mau-app_2024-06-01-00-00-00.tar.gz", "a");
    ctx.create_file("backups/tooling_2024-06-01-00-00-00.tar.gz", "b");
    ctx.create_file("backups/stack-backup.lock", "");
    let store = MemoryStore::new(TEST_BUCKET);
    let manager = UploadManager::new(Arc::new(store.clone()), &ctx.path("backups"), TEST_PREFIX);

    let summary = manager.run().await.unwrap();

    assert_eq!(summary.uploaded(), 2);
    assert_eq!(
        store.keys(),
        vec![
            "backups/mau-app/mau-app_2024-06-01-00-00-00.tar.gz",
            "backups/tooling/tooling_2024-06-01-00-00-00.tar.gz",
        ]
    );
}
