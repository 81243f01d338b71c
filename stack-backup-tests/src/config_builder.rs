//! Fluent API for building test configurations
//!
//! Lays out a host in a temporary directory (`base/`, `backups/`,
//! `restore/`, `logs/`) and builds a [`Config`] pointing at it.

use stack_backup::config::{Config, IntegrationConfig, StorageConfig};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use crate::fixtures::TEST_BUCKET;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Create a new ConfigBuilder with empty base, backup and restore directories
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let dir = |name: &str| {
            let path = temp_dir.path().join(name);
            fs::create_dir_all(&path).expect("Failed to create test directory");
            path
        };

        let config = Config {
            base_dir: Some(dir("base")),
            backup_dir: Some(dir("backups")),
            restore_dir: Some(dir("restore")),
            log_directory: dir("logs"),
            storage: StorageConfig {
                bucket: Some(TEST_BUCKET.to_string()),
                region: Some("eu-central-1".to_string()),
                ..StorageConfig::default()
            },
            ..Config::default()
        };

        Self { temp_dir, config }
    }

    /// Add a stateful project (`base/{name}/data`)
    pub fn add_project(self, name: &str) -> Self {
        fs::create_dir_all(self.base_dir().join(name).join("data"))
            .expect("Failed to create project directory");
        self
    }

    /// Add a directory without a data folder
    pub fn add_stateless_dir(self, name: &str) -> Self {
        fs::create_dir_all(self.base_dir().join(name)).expect("Failed to create directory");
        self
    }

    /// Write a file below `base/{project}`
    pub fn add_project_file(self, project: &str, relative: &str, content: &str) -> Self {
        let path = self.base_dir().join(project).join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write project file");
        self
    }

    /// Add a base-relative exclude
    pub fn with_exclude(mut self, exclude: &str) -> Self {
        self.config.excludes.push(exclude.to_string());
        self
    }

    pub fn with_retention_days(mut self, days: u64) -> Self {
        self.config.retention_days = days;
        self
    }

    /// Add a database integration
    pub fn with_integration(mut self, integration: IntegrationConfig) -> Self {
        self.config.integrations.push(integration);
        self
    }

    pub fn with_bucket(mut self, bucket: &str) -> Self {
        self.config.storage.bucket = Some(bucket.to_string());
        self
    }

    /// Set the per-command timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.config.command_timeout_seconds = Some(seconds);
        self
    }

    /// Get the temp directory path
    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn base_dir(&self) -> PathBuf {
        self.temp_dir.path().join("base")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.temp_dir.path().join("backups")
    }

    pub fn restore_dir(&self) -> PathBuf {
        self.temp_dir.path().join("restore")
    }

    /// Build the Config (the directories are removed with the builder)
    pub fn build(self) -> Config {
        self.config
    }

    /// Keep the temp directory alive alongside the config
    pub fn persist(self) -> (Config, TempDir) {
        (self.config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
