//! PostgreSQL dump/restore through `pg_dump` and `psql` inside the container

use super::{DatabaseIntegration, StepOutcome};
use crate::utils::docker_ops::ContainerOperations;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

/// Scratch path inside the container used while replaying a dump
const CONTAINER_RESTORE_PATH: &str = "/tmp/stack-backup-restore.sql";

pub struct PostgresIntegration {
    name: String,
    container_pattern: String,
    database: String,
    user: String,
}

impl PostgresIntegration {
    pub fn new(name: &str, container_pattern: &str, database: &str, user: &str) -> Self {
        Self {
            name: name.to_string(),
            container_pattern: container_pattern.to_string(),
            database: database.to_string(),
            user: user.to_string(),
        }
    }

    fn psql<'a>(&'a self, extra: &[&'a str]) -> Vec<&'a str> {
        let mut args = vec![
            "psql",
            "-U",
            self.user.as_str(),
            "-d",
            self.database.as_str(),
            "-v",
            "ON_ERROR_STOP=1",
            "--quiet",
        ];
        args.extend_from_slice(extra);
        args
    }

    fn not_running(&self) -> StepOutcome {
        StepOutcome::Skipped {
            reason: format!("no running container matches '{}'", self.container_pattern),
        }
    }
}

#[async_trait]
impl DatabaseIntegration for PostgresIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    fn dump_file(&self) -> &str {
        "dump.sql"
    }

    async fn dump(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome> {
        let Some(container) = runtime.find_running(&self.container_pattern).await? else {
            return Ok(self.not_running());
        };

        let artifact = self.artifact_path(project_dir);
        debug!("Dumping database {} from {}", self.database, container);

        runtime
            .exec_to_file(
                &container,
                &[
                    "pg_dump",
                    "-U",
                    &self.user,
                    "-d",
                    &self.database,
                    "--no-owner",
                ],
                &artifact,
            )
            .await
            .with_context(|| format!("pg_dump of {} failed", self.database))?;

        Ok(StepOutcome::Completed { artifact })
    }

    async fn restore(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome> {
        let artifact = self.artifact_path(project_dir);
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Ok(StepOutcome::Skipped {
                reason: format!("no dump at {}", artifact.display()),
            });
        }

        let Some(container) = runtime.find_running(&self.container_pattern).await? else {
            return Ok(self.not_running());
        };

        runtime
            .exec(
                &container,
                &self.psql(&["-c", "DROP SCHEMA public CASCADE; CREATE SCHEMA public;"]),
            )
            .await
            .with_context(|| format!("Failed to reset schema of {}", self.database))?;

        runtime
            .copy_to(&artifact, &container, CONTAINER_RESTORE_PATH)
            .await?;

        let replay = runtime
            .exec(&container, &self.psql(&["-f", CONTAINER_RESTORE_PATH]))
            .await
            .with_context(|| format!("Failed to replay dump into {}", self.database));

        if let Err(e) = runtime
            .exec(&container, &["rm", "-f", CONTAINER_RESTORE_PATH])
            .await
        {
            warn!("Failed to remove {} from {}: {}", CONTAINER_RESTORE_PATH, container, e);
        }

        replay?;
        Ok(StepOutcome::Completed { artifact })
    }
}
