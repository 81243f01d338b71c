//! Redis snapshot/reload through `redis-cli` inside the container

use super::{DatabaseIntegration, StepOutcome};
use crate::utils::docker_ops::ContainerOperations;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// Polls of LASTSAVE before a background save is considered stuck
const MAX_SAVE_POLLS: u32 = 60;

pub struct RedisIntegration {
    name: String,
    container_pattern: String,
    data_path: String,
    poll_interval: Duration,
}

impl RedisIntegration {
    pub fn new(name: &str, container_pattern: &str, data_path: &str) -> Self {
        Self {
            name: name.to_string(),
            container_pattern: container_pattern.to_string(),
            data_path: data_path.to_string(),
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Override the wait between LASTSAVE polls
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn last_save(&self, runtime: &dyn ContainerOperations, container: &str) -> Result<String> {
        let out = runtime
            .exec(container, &["redis-cli", "LASTSAVE"])
            .await
            .context("redis-cli LASTSAVE failed")?;
        Ok(out.trim().to_string())
    }

    /// Trigger BGSAVE and wait until LASTSAVE moves past its previous value
    async fn snapshot(&self, runtime: &dyn ContainerOperations, container: &str) -> Result<()> {
        let before = self.last_save(runtime, container).await?;

        runtime
            .exec(container, &["redis-cli", "BGSAVE"])
            .await
            .context("redis-cli BGSAVE failed")?;

        for attempt in 1..=MAX_SAVE_POLLS {
            let current = self.last_save(runtime, container).await?;
            if current != before {
                debug!("Background save finished after {} poll(s)", attempt);
                return Ok(());
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        anyhow::bail!(
            "Background save in {} did not finish after {} polls",
            container,
            MAX_SAVE_POLLS
        )
    }

    fn not_running(&self) -> StepOutcome {
        StepOutcome::Skipped {
            reason: format!("no running container matches '{}'", self.container_pattern),
        }
    }
}

#[async_trait]
impl DatabaseIntegration for RedisIntegration {
    fn name(&self) -> &str {
        &self.name
    }

    fn dump_file(&self) -> &str {
        "dump.rdb"
    }

    async fn dump(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome> {
        let Some(container) = runtime.find_running(&self.container_pattern).await? else {
            return Ok(self.not_running());
        };

        self.snapshot(runtime, &container).await?;

        let artifact = self.artifact_path(project_dir);
        runtime
            .copy_from(&container, &self.data_path, &artifact)
            .await
            .with_context(|| format!("Failed to copy {} out of {}", self.data_path, container))?;

        Ok(StepOutcome::Completed { artifact })
    }

    async fn restore(&self, runtime: &dyn ContainerOperations, project_dir: &Path) -> Result<StepOutcome> {
        let artifact = self.artifact_path(project_dir);
        if !tokio::fs::try_exists(&artifact).await.unwrap_or(false) {
            return Ok(StepOutcome::Skipped {
                reason: format!("no snapshot at {}", artifact.display()),
            });
        }

        let Some(container) = runtime.find_running(&self.container_pattern).await? else {
            return Ok(self.not_running());
        };

        runtime
            .copy_to(&artifact, &container, &self.data_path)
            .await?;

        runtime
            .exec(&container, &["redis-cli", "DEBUG", "RELOAD", "NOSAVE"])
            .await
            .context("redis-cli DEBUG RELOAD failed")?;

        Ok(StepOutcome::Completed { artifact })
    }
}
