//! Database dump/restore hooks keyed by project
//!
//! Some services keep their state in a running database container whose files
//! on disk are owned by a container-internal user. Those directories are
//! excluded from the generic archive and captured here instead: before a
//! project is archived each registered integration writes a portable dump to
//! `{project}/data/{integration}/dumps/{file}`, and after a restore the same
//! file is pushed back into the running service.
//!
//! The orchestrators never branch on project names; they ask the
//! [`IntegrationRegistry`] for the ordered hooks of a project and run them.

pub mod postgres;
pub mod redis;

use crate::config::{IntegrationConfig, IntegrationKind};
use crate::utils::docker_ops::ContainerOperations;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

pub use postgres::PostgresIntegration;
pub use redis::RedisIntegration;

/// What a dump or restore step did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Completed { artifact: PathBuf },
    Skipped { reason: String },
}

/// Outcome of one step, with failures captured as text
#[derive(Debug, Clone)]
pub struct StepReport {
    pub integration: String,
    pub result: std::result::Result<StepOutcome, String>,
}

impl StepReport {
    pub fn is_failure(&self) -> bool {
        self.result.is_err()
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.result, Ok(StepOutcome::Completed { .. }))
    }
}

/// One provider-specific dump/restore unit
#[async_trait]
pub trait DatabaseIntegration: Send + Sync {
    /// Name used in logs and in the artifact path
    fn name(&self) -> &str;

    /// File name of the dump artifact
    fn dump_file(&self) -> &str;

    /// Where the artifact lives inside a project directory
    fn artifact_path(&self, project_dir: &Path) -> PathBuf {
        project_dir
            .join(crate::backup::discover::DATA_DIR)
            .join(self.name())
            .join("dumps")
            .join(self.dump_file())
    }

    /// Write the dump artifact into the project tree
    async fn dump(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome>;

    /// Push the dump artifact back into the running service
    async fn restore(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome>;
}

/// Maps project names to their ordered integrations
#[derive(Clone, Default)]
pub struct IntegrationRegistry {
    entries: HashMap<String, Vec<Arc<dyn DatabaseIntegration>>>,
}

impl IntegrationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from configuration, keeping declaration order
    pub fn from_config(integrations: &[IntegrationConfig]) -> Self {
        let mut registry = Self::new();

        for entry in integrations {
            let name = entry
                .name
                .clone()
                .unwrap_or_else(|| entry.kind.as_str().to_string());

            let integration: Arc<dyn DatabaseIntegration> = match &entry.kind {
                IntegrationKind::Postgres { database, user } => Arc::new(PostgresIntegration::new(
                    &name,
                    &entry.container,
                    database,
                    user,
                )),
                IntegrationKind::Redis { data_path } => {
                    Arc::new(RedisIntegration::new(&name, &entry.container, data_path))
                }
            };

            registry.register(&entry.project, integration);
        }

        registry
    }

    /// Append an integration to a project's list
    pub fn register(&mut self, project: &str, integration: Arc<dyn DatabaseIntegration>) {
        self.entries
            .entry(project.to_string())
            .or_default()
            .push(integration);
    }

    pub fn for_project(&self, project: &str) -> &[Arc<dyn DatabaseIntegration>] {
        self.entries.get(project).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Run every dump step of a project in order. Each step is isolated: a
    /// failure is logged and recorded, and the next step still runs.
    pub async fn dump_project(
        &self,
        runtime: &dyn ContainerOperations,
        project: &str,
        project_dir: &Path,
    ) -> Vec<StepReport> {
        let mut reports = Vec::new();

        for integration in self.for_project(project) {
            info!("Dumping {} for project {}", integration.name(), project);
            let result = integration.dump(runtime, project_dir).await;
            reports.push(record(project, "dump", integration.name(), result));
        }

        reports
    }

    /// Run every restore step of a project in order, isolated like
    /// [`dump_project`](Self::dump_project)
    pub async fn restore_project(
        &self,
        runtime: &dyn ContainerOperations,
        project: &str,
        project_dir: &Path,
    ) -> Vec<StepReport> {
        let mut reports = Vec::new();

        for integration in self.for_project(project) {
            info!("Restoring {} for project {}", integration.name(), project);
            let result = integration.restore(runtime, project_dir).await;
            reports.push(record(project, "restore", integration.name(), result));
        }

        reports
    }
}

fn record(project: &str, action: &str, name: &str, result: Result<StepOutcome>) -> StepReport {
    let result = match result {
        Ok(StepOutcome::Completed { artifact }) => {
            info!("{} {} completed: {}", name, action, artifact.display());
            Ok(StepOutcome::Completed { artifact })
        }
        Ok(StepOutcome::Skipped { reason }) => {
            warn!("{} {} skipped for project {}: {}", name, action, project, reason);
            Ok(StepOutcome::Skipped { reason })
        }
        Err(e) => {
            error!("{} {} failed for project {}: {:#}", name, action, project, e);
            Err(format!("{:#}", e))
        }
    };

    StepReport {
        integration: name.to_string(),
        result,
    }
}
