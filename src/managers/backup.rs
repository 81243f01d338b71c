//! Backup manager - orchestrates one backup run

use crate::backup::{discover_projects, sweep_old_archives, Archiver, BackupArchive, ProjectDirectory, SweepReport};
use crate::config::{get_effective_excludes, Config};
use crate::integrations::{IntegrationRegistry, StepReport};
use crate::utils::docker_ops::ContainerOperations;
use crate::utils::executor::CommandExecutor;
use crate::utils::locker::{BackupLock, LockHeld};
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};
use thiserror::Error;
use tracing::{error, info, warn};

/// Conditions that abort a whole backup run
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("Failed to discover projects under {path:?}: {reason}")]
    Discovery { path: PathBuf, reason: String },

    #[error("Failed to create backup directory {path:?}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Another backup run is writing to {path:?}")]
    Locked { path: PathBuf },
}

/// What happened to one project
#[derive(Debug)]
pub struct ProjectOutcome {
    pub project: String,
    pub dumps: Vec<StepReport>,
    pub archive: std::result::Result<PathBuf, String>,
}

impl ProjectOutcome {
    pub fn is_success(&self) -> bool {
        self.archive.is_ok()
    }
}

/// Summary of a backup run
#[derive(Debug, Default)]
pub struct BackupSummary {
    pub projects: Vec<ProjectOutcome>,
    pub sweep: Option<SweepReport>,
}

impl BackupSummary {
    pub fn succeeded(&self) -> usize {
        self.projects.iter().filter(|p| p.is_success()).count()
    }

    pub fn failed(&self) -> Vec<&ProjectOutcome> {
        self.projects.iter().filter(|p| !p.is_success()).collect()
    }

    /// Archived projects whose dump steps reported a failure
    pub fn dump_failures(&self) -> usize {
        self.projects
            .iter()
            .flat_map(|p| p.dumps.iter())
            .filter(|d| d.is_failure())
            .count()
    }
}

pub struct BackupManager {
    config: Arc<Config>,
    registry: IntegrationRegistry,
    runtime: Arc<dyn ContainerOperations>,
    archiver: Archiver,
}

impl BackupManager {
    /// Create new backup manager
    pub fn new(
        config: Arc<Config>,
        registry: IntegrationRegistry,
        runtime: Arc<dyn ContainerOperations>,
        executor: Arc<dyn CommandExecutor>,
    ) -> Self {
        let archiver = Archiver::new(executor, config.command_timeout());
        Self {
            config,
            registry,
            runtime,
            archiver,
        }
    }

    /// Run a backup of every discovered project
    pub async fn run(&self) -> Result<BackupSummary> {
        self.run_at(Utc::now(), SystemTime::now()).await
    }

    /// Run with an explicit archive timestamp and retention clock
    pub async fn run_at(&self, started: DateTime<Utc>, now: SystemTime) -> Result<BackupSummary> {
        let base_dir = self.config.require_base_dir()?;
        let backup_dir = self.config.require_backup_dir()?;

        let _lock = match BackupLock::acquire(backup_dir) {
            Ok(lock) => lock,
            Err(e) if e.downcast_ref::<LockHeld>().is_some() => {
                return Err(BackupError::Locked {
                    path: backup_dir.to_path_buf(),
                }
                .into());
            }
            Err(e) => return Err(e.context("Failed to take the backup lock")),
        };

        let start_time = Instant::now();
        info!("Starting backup of {:?} into {:?}", base_dir, backup_dir);

        let projects = discover_projects(base_dir)
            .await
            .map_err(|e| BackupError::Discovery {
                path: base_dir.to_path_buf(),
                reason: format!("{:#}", e),
            })?;

        if projects.is_empty() {
            warn!("No project directories with a data folder under {:?}", base_dir);
        } else {
            info!("Found {} project(s) to back up", projects.len());
        }

        tokio::fs::create_dir_all(backup_dir)
            .await
            .map_err(|source| BackupError::OutputDir {
                path: backup_dir.to_path_buf(),
                source,
            })?;

        let outcomes = join_all(
            projects
                .iter()
                .map(|project| self.backup_project(project, base_dir, backup_dir, started)),
        )
        .await;

        let sweep = match sweep_old_archives(backup_dir, self.config.retention(), now).await {
            Ok(report) => {
                info!(
                    "Retention sweep: {} deleted, {} kept",
                    report.deleted.len(),
                    report.kept
                );
                Some(report)
            }
            Err(e) => {
                error!("Retention sweep failed: {:#}", e);
                None
            }
        };

        let summary = BackupSummary {
            projects: outcomes,
            sweep,
        };

        info!(
            "Backup summary: {} succeeded, {} failed in {:.2}s",
            summary.succeeded(),
            summary.failed().len(),
            start_time.elapsed().as_secs_f64()
        );

        Ok(summary)
    }

    /// Dump steps, then the archive. Never fails; the outcome carries errors.
    async fn backup_project(
        &self,
        project: &ProjectDirectory,
        base_dir: &Path,
        backup_dir: &Path,
        started: DateTime<Utc>,
    ) -> ProjectOutcome {
        info!("Backing up project: {}", project.name);

        let dumps = self
            .registry
            .dump_project(self.runtime.as_ref(), &project.name, &project.path)
            .await;

        let archive = BackupArchive::new(&project.name, started);
        let excludes = get_effective_excludes(&self.config, &project.name);

        let result = self
            .archiver
            .create(base_dir, &archive, backup_dir, &excludes)
            .await
            .context(format!("Backup of project '{}' failed", project.name));

        let archive = match result {
            Ok(path) => Ok(path),
            Err(e) => {
                error!("{:#}", e);
                Err(format!("{:#}", e))
            }
        };

        ProjectOutcome {
            project: project.name.clone(),
            dumps,
            archive,
        }
    }
}
