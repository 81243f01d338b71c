//! Restore manager - resolves, downloads, extracts and reconnects
//!
//! A restore walks these steps in order:
//!
//! 1. Resolve the archive name (latest remote object when none is given)
//! 2. Download into a fresh temporary directory
//! 3. Extract into the destination root (merge, never wipe), or hand the
//!    archive to [`RemoteTransfer`] for a second host
//! 4. Push embedded database dumps back into running services
//! 5. Reconnect: redeploy the project's stack, or point at its manifest
//! 6. Remove the temporary directory
//!
//! Steps 1 and 2 are fatal. Everything after is recorded in the
//! [`RestoreReport`] and never stops step 6 from running.

use super::remote::{RemoteTarget, RemoteTransfer};
use crate::backup::archive::{remote_key, Archiver, ARCHIVE_SUFFIX};
use crate::integrations::{IntegrationRegistry, StepReport};
use crate::utils::docker_ops::ContainerOperations;
use crate::utils::executor::CommandExecutor;
use crate::utils::store_ops::{ObjectStore, ObjectSummary};
use anyhow::Result;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("No backups found for project: {project}")]
    NoBackupsFound { project: String },

    #[error("Failed to download {key}: {reason}")]
    Download { key: String, reason: String },

    #[error("Failed to create a temporary working directory")]
    WorkDir(#[source] std::io::Error),
}

/// Where restored files go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreDestination {
    /// Extract on this host under the given root
    Local { root: PathBuf },
    /// Relay to another host and extract there
    Remote(RemoteTarget),
}

#[derive(Debug, Clone)]
pub struct RestoreRequest {
    pub project: String,
    /// Explicit archive file name; `None` resolves the latest
    pub archive: Option<String>,
    pub destination: RestoreDestination,
}

/// Result of the best-effort reconnect step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconnectOutcome {
    /// The project's stack was running and its services were restarted
    Redeployed { services: Vec<String> },
    /// No stack is running, but a manifest exists and can be deployed
    ManifestAvailable { manifest: PathBuf },
    ManualActionRequired,
}

#[derive(Debug)]
pub struct RestoreReport {
    pub project: String,
    pub archive: String,
    /// Extraction (local) or transfer (remote) result
    pub extraction: std::result::Result<(), String>,
    pub databases: Vec<StepReport>,
    pub reconnect: Option<ReconnectOutcome>,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.extraction.is_ok() && !self.databases.iter().any(|d| d.is_failure())
    }
}

/// Name of the newest archive under `{prefix}/{project}/`.
///
/// Newest means the latest last-modified time; objects sharing that time are
/// ordered by key and the greatest wins.
pub async fn resolve_latest(store: &dyn ObjectStore, prefix: &str, project: &str) -> Result<String> {
    list_backups(store, prefix, project)
        .await?
        .into_iter()
        .next()
        .map(|o| o.file_name().to_string())
        .ok_or_else(|| {
            anyhow::Error::from(RestoreError::NoBackupsFound {
                project: project.to_string(),
            })
        })
}

/// Remote archives of a project, newest first
pub async fn list_backups(store: &dyn ObjectStore, prefix: &str, project: &str) -> Result<Vec<ObjectSummary>> {
    let folder = format!("{}/", remote_key(prefix, project, "").trim_end_matches('/'));
    let mut objects: Vec<_> = store
        .list_objects(&folder)
        .await?
        .into_iter()
        .filter(|o| o.key.ends_with(ARCHIVE_SUFFIX))
        .collect();

    objects.sort_by(|a, b| {
        b.last_modified
            .cmp(&a.last_modified)
            .then_with(|| b.key.cmp(&a.key))
    });

    Ok(objects)
}

pub struct RestoreManager {
    store: Arc<dyn ObjectStore>,
    runtime: Arc<dyn ContainerOperations>,
    registry: IntegrationRegistry,
    archiver: Archiver,
    transfer: RemoteTransfer,
    key_prefix: String,
}

impl RestoreManager {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        runtime: Arc<dyn ContainerOperations>,
        registry: IntegrationRegistry,
        executor: Arc<dyn CommandExecutor>,
        key_prefix: &str,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            runtime,
            registry,
            archiver: Archiver::new(executor.clone(), timeout),
            transfer: RemoteTransfer::new(executor, timeout),
            key_prefix: key_prefix.to_string(),
        }
    }

    pub async fn run(&self, request: &RestoreRequest) -> Result<RestoreReport> {
        let project = request.project.as_str();

        let archive = match &request.archive {
            Some(name) => name.clone(),
            None => {
                info!("No backup file specified. Retrieving the latest backup...");
                let latest = resolve_latest(self.store.as_ref(), &self.key_prefix, project).await?;
                info!("Latest backup found: {}", latest);
                latest
            }
        };

        let work_dir = tempfile::Builder::new()
            .prefix("backup-")
            .tempdir()
            .map_err(RestoreError::WorkDir)?;

        let key = remote_key(&self.key_prefix, project, &archive);
        let local_archive = work_dir.path().join(&archive);
        self.store
            .download(&key, &local_archive)
            .await
            .map_err(|e| RestoreError::Download {
                key: key.clone(),
                reason: format!("{:#}", e),
            })?;
        info!("Backup downloaded to: {}", local_archive.display());

        let mut report = RestoreReport {
            project: project.to_string(),
            archive,
            extraction: Ok(()),
            databases: Vec::new(),
            reconnect: None,
        };

        match &request.destination {
            RestoreDestination::Local { root } => {
                self.restore_locally(project, &local_archive, root, &mut report).await;
            }
            RestoreDestination::Remote(target) => {
                if let Err(e) = self.transfer.send(&local_archive, target).await {
                    error!("Remote restore to {} failed: {:#}", target.host, e);
                    report.extraction = Err(format!("{:#}", e));
                } else {
                    info!(
                        "Files restored on {}. Restore databases and redeploy services there manually.",
                        target.host
                    );
                }
            }
        }

        let work_path = work_dir.path().to_path_buf();
        match work_dir.close() {
            Ok(()) => info!("Temporary files cleaned up"),
            Err(e) => warn!("Failed to remove temporary directory {:?}: {}", work_path, e),
        }

        Ok(report)
    }

    async fn restore_locally(
        &self,
        project: &str,
        archive: &Path,
        root: &Path,
        report: &mut RestoreReport,
    ) {
        let project_dir = root.join(project);

        if let Err(e) = self.extract(archive, root, &project_dir).await {
            error!("Extraction of {} failed: {:#}", archive.display(), e);
            report.extraction = Err(format!("{:#}", e));
            return;
        }
        info!("Backup restored to: {}", project_dir.display());

        report.databases = self
            .registry
            .restore_project(self.runtime.as_ref(), project, &project_dir)
            .await;

        report.reconnect = Some(self.reconnect(project, root).await);
    }

    async fn extract(&self, archive: &Path, root: &Path, project_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(project_dir).await?;
        self.archiver.extract(archive, root).await
    }

    /// Best-effort; runtime errors only downgrade the outcome
    async fn reconnect(&self, project: &str, root: &Path) -> ReconnectOutcome {
        match self.runtime.stack_exists(project).await {
            Ok(true) => match self.runtime.redeploy_stack(project).await {
                Ok(services) => {
                    info!("Redeployed {} service(s) of stack {}", services.len(), project);
                    return ReconnectOutcome::Redeployed { services };
                }
                Err(e) => warn!("Failed to redeploy stack {}: {:#}", project, e),
            },
            Ok(false) => {}
            Err(e) => warn!("Could not query stack {}: {:#}", project, e),
        }

        let manifest = manifest_path(root, project);
        if tokio::fs::try_exists(&manifest).await.unwrap_or(false) {
            info!("Stack {} is not running; manifest found at {}", project, manifest.display());
            return ReconnectOutcome::ManifestAvailable { manifest };
        }

        warn!(
            "Stack {} is not running and no manifest was found. Redeploy its services manually.",
            project
        );
        ReconnectOutcome::ManualActionRequired
    }
}

/// `{root}/docker-compose.{project}.yaml`
pub fn manifest_path(root: &Path, project: &str) -> PathBuf {
    root.join(format!("docker-compose.{}.yaml", project))
}
