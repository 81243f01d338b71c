//! Archive naming and the tar-based archiver
//!
//! Archives are named `{project}_{yyyy-mm-dd-HH-MM-SS}.tar.gz` and stored
//! remotely at `{prefix}/{project}/{file}`. The archive is rooted at the base
//! directory, so extracting it into a destination root recreates
//! `{project}/...`.

use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
pub const ARCHIVE_SUFFIX: &str = ".tar.gz";

/// A single compressed project snapshot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupArchive {
    pub project: String,
    pub timestamp: NaiveDateTime,
}

impl BackupArchive {
    /// Timestamps are truncated to whole seconds
    pub fn new(project: &str, created: DateTime<Utc>) -> Self {
        let timestamp = created.naive_utc();
        Self {
            project: project.to_string(),
            timestamp: timestamp.with_nanosecond(0).unwrap_or(timestamp),
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "{}_{}{}",
            self.project,
            self.timestamp.format(TIMESTAMP_FORMAT),
            ARCHIVE_SUFFIX
        )
    }

    pub fn local_path(&self, backup_dir: &Path) -> PathBuf {
        backup_dir.join(self.file_name())
    }

    pub fn remote_key(&self, prefix: &str) -> String {
        remote_key(prefix, &self.project, &self.file_name())
    }

    /// Parse a file name produced by [`file_name`](Self::file_name)
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(ARCHIVE_SUFFIX)?;
        let (project, stamp) = stem.rsplit_once('_')?;
        if project.is_empty() {
            return None;
        }
        let timestamp = NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).ok()?;
        Some(Self {
            project: project.to_string(),
            timestamp,
        })
    }
}

/// `{prefix}/{project}/{file}`
pub fn remote_key(prefix: &str, project: &str, file_name: &str) -> String {
    format!("{}/{}/{}", prefix.trim_matches('/'), project, file_name)
}

/// Remote key for a local archive file, using the text before the first `_`
/// as the project. `None` when the name does not follow the convention.
pub fn remote_key_for_file(prefix: &str, file_name: &str) -> Option<String> {
    if !file_name.ends_with(ARCHIVE_SUFFIX) {
        return None;
    }
    let (project, _) = file_name.split_once('_')?;
    if project.is_empty() {
        return None;
    }
    Some(remote_key(prefix, project, file_name))
}

/// Runs `tar` to create and extract project archives
#[derive(Clone)]
pub struct Archiver {
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl Archiver {
    pub fn new(executor: Arc<dyn CommandExecutor>, timeout: Option<Duration>) -> Self {
        Self { executor, timeout }
    }

    /// Archive `base_dir/{project}` into `output_dir`, skipping `excludes`
    /// (paths relative to `base_dir`). A failed run leaves no partial file.
    pub async fn create(
        &self,
        base_dir: &Path,
        archive: &BackupArchive,
        output_dir: &Path,
        excludes: &[String],
    ) -> Result<PathBuf> {
        let output_path = archive.local_path(output_dir);
        let output = output_path.display().to_string();
        let base = base_dir.display().to_string();
        let exclude_args: Vec<String> = excludes
            .iter()
            .map(|e| format!("--exclude={}", e.trim_end_matches('/')))
            .collect();

        let mut args: Vec<&str> = vec!["-czf", output.as_str()];
        args.extend(exclude_args.iter().map(String::as_str));
        args.extend(["-C", base.as_str(), archive.project.as_str()]);

        debug!("Archiving {} with {} exclusion(s)", archive.project, excludes.len());

        if let Err(e) = self
            .executor
            .run_command("tar", &args, None, self.timeout)
            .await
        {
            if tokio::fs::try_exists(&output_path).await.unwrap_or(false) {
                if let Err(rm) = tokio::fs::remove_file(&output_path).await {
                    warn!("Failed to remove partial archive {:?}: {}", output_path, rm);
                }
            }
            return Err(e).with_context(|| format!("Failed to archive project {}", archive.project));
        }

        info!("Backup created: {}", output_path.display());
        Ok(output_path)
    }

    /// Extract an archive into `destination_root`, replacing files that exist
    /// in the archive and leaving every other file untouched
    pub async fn extract(&self, archive_path: &Path, destination_root: &Path) -> Result<()> {
        let archive = archive_path.display().to_string();
        let destination = destination_root.display().to_string();

        self.executor
            .run_command(
                "tar",
                &["-xzf", &archive, "-C", &destination, "--overwrite"],
                None,
                self.timeout,
            )
            .await
            .with_context(|| format!("Failed to extract {} into {}", archive, destination))?;

        Ok(())
    }
}
