//! Upload manager - ships local archives to the object store

use crate::backup::archive::{remote_key_for_file, ARCHIVE_SUFFIX};
use crate::utils::store_ops::ObjectStore;
use anyhow::{Context, Result};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Bucket '{bucket}' does not exist")]
    BucketNotFound { bucket: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadStatus {
    Uploaded,
    /// An object already exists at the key
    Skipped,
    Failed(String),
}

/// Result for one local archive
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file: PathBuf,
    pub key: String,
    pub status: UploadStatus,
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    pub files: Vec<FileUpload>,
}

impl UploadSummary {
    fn count(&self, wanted: fn(&UploadStatus) -> bool) -> usize {
        self.files.iter().filter(|f| wanted(&f.status)).count()
    }

    pub fn uploaded(&self) -> usize {
        self.count(|s| *s == UploadStatus::Uploaded)
    }

    pub fn skipped(&self) -> usize {
        self.count(|s| *s == UploadStatus::Skipped)
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, UploadStatus::Failed(_)))
    }
}

pub struct UploadManager {
    store: Arc<dyn ObjectStore>,
    backup_dir: PathBuf,
    key_prefix: String,
}

impl UploadManager {
    pub fn new(store: Arc<dyn ObjectStore>, backup_dir: &Path, key_prefix: &str) -> Self {
        Self {
            store,
            backup_dir: backup_dir.to_path_buf(),
            key_prefix: key_prefix.to_string(),
        }
    }

    /// Upload every local archive not yet present remotely. All uploads run
    /// concurrently; one failed file does not affect the others.
    pub async fn run(&self) -> Result<UploadSummary> {
        let bucket = self.store.bucket().to_string();

        let exists = self
            .store
            .bucket_exists()
            .await
            .with_context(|| format!("Failed to check bucket '{}'", bucket))?;
        if !exists {
            return Err(UploadError::BucketNotFound { bucket }.into());
        }

        let candidates = self.local_archives().await?;
        info!(
            "Uploading {} archive(s) from {:?} to bucket '{}'",
            candidates.len(),
            self.backup_dir,
            bucket
        );

        let files = join_all(
            candidates
                .into_iter()
                .map(|(file, key)| self.upload_file(file, key)),
        )
        .await;

        let summary = UploadSummary { files };
        info!(
            "Upload summary: {} uploaded, {} skipped, {} failed",
            summary.uploaded(),
            summary.skipped(),
            summary.failed()
        );

        Ok(summary)
    }

    /// Archive files in the backup directory paired with their remote keys,
    /// sorted by file name
    async fn local_archives(&self) -> Result<Vec<(PathBuf, String)>> {
        let mut entries = tokio::fs::read_dir(&self.backup_dir)
            .await
            .with_context(|| format!("Failed to read backup directory: {:?}", self.backup_dir))?;

        let mut archives = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !is_file || !name.ends_with(ARCHIVE_SUFFIX) {
                continue;
            }

            match remote_key_for_file(&self.key_prefix, name) {
                Some(key) => archives.push((path.clone(), key)),
                None => warn!("Skipping {}: name does not start with a project", name),
            }
        }

        archives.sort();
        Ok(archives)
    }

    async fn upload_file(&self, file: PathBuf, key: String) -> FileUpload {
        let status = match self.try_upload(&file, &key).await {
            Ok(status) => status,
            Err(e) => {
                error!("Failed to upload {}: {:#}", file.display(), e);
                UploadStatus::Failed(format!("{:#}", e))
            }
        };

        FileUpload { file, key, status }
    }

    async fn try_upload(&self, file: &Path, key: &str) -> Result<UploadStatus> {
        if self.store.object_exists(key).await? {
            info!("Skipping {}: already exists at {}", file.display(), key);
            return Ok(UploadStatus::Skipped);
        }

        self.store.put_file(key, file).await?;
        info!("Uploaded {} to {}", file.display(), key);
        Ok(UploadStatus::Uploaded)
    }
}
