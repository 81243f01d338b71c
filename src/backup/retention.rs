//! Local retention sweep
//!
//! Removes files from the local backup directory whose modification time is
//! older than the retention window. Remote expiry is a separate, bucket-side
//! lifecycle rule and is never touched here.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Result of one sweep
#[derive(Debug, Default)]
pub struct SweepReport {
    pub deleted: Vec<PathBuf>,
    pub kept: usize,
    pub failed: Vec<(PathBuf, String)>,
}

/// Delete every regular file in `dir` modified before `now - max_age`
pub async fn sweep_old_archives(dir: &Path, max_age: Duration, now: SystemTime) -> Result<SweepReport> {
    let cutoff = now
        .checked_sub(max_age)
        .unwrap_or(SystemTime::UNIX_EPOCH);

    let mut entries = tokio::fs::read_dir(dir)
        .await
        .with_context(|| format!("Failed to read backup directory: {:?}", dir))?;

    let mut report = SweepReport::default();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let metadata = match entry.metadata().await {
            Ok(m) => m,
            Err(e) => {
                warn!("Failed to stat {:?}: {}", path, e);
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        if !metadata.is_file() {
            continue;
        }

        let modified = match metadata.modified() {
            Ok(t) => t,
            Err(e) => {
                report.failed.push((path, e.to_string()));
                continue;
            }
        };

        if modified >= cutoff {
            debug!("Keeping {:?}", path);
            report.kept += 1;
            continue;
        }

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!("Deleted old backup: {}", path.display());
                report.deleted.push(path);
            }
            Err(e) => {
                warn!("Failed to delete old backup {:?}: {}", path, e);
                report.failed.push((path, e.to_string()));
            }
        }
    }

    Ok(report)
}
