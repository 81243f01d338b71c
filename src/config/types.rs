use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::loader::ConfigError;

/// Root configuration structure
///
/// Every field is optional in the TOML file; environment variables fill or
/// override them (see `loader`). Values that only some commands need are kept
/// as `Option` and checked through the `require_*` accessors.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Directory scanned for project directories
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    /// Local directory receiving archives
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Destination root for local restores
    #[serde(default)]
    pub restore_dir: Option<PathBuf>,

    /// Object store settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Local retention window in days
    #[serde(default = "default_retention_days")]
    pub retention_days: u64,

    /// Base-relative paths excluded from every archive
    #[serde(default)]
    pub excludes: Vec<String>,

    /// Timeout applied to each spawned tool (none by default)
    #[serde(default)]
    pub command_timeout_seconds: Option<u64>,

    /// Logging configuration
    #[serde(default = "default_log_directory")]
    pub log_directory: PathBuf,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_max_files")]
    pub log_max_files: u32,

    /// Database dump/restore hooks per project
    #[serde(default)]
    pub integrations: Vec<IntegrationConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_dir: None,
            backup_dir: None,
            restore_dir: None,
            storage: StorageConfig::default(),
            retention_days: default_retention_days(),
            excludes: Vec::new(),
            command_timeout_seconds: None,
            log_directory: default_log_directory(),
            log_level: default_log_level(),
            log_max_files: default_log_max_files(),
            integrations: Vec::new(),
        }
    }
}

impl Config {
    pub fn require_base_dir(&self) -> Result<&Path, ConfigError> {
        self.base_dir
            .as_deref()
            .ok_or(ConfigError::Missing(super::loader::ENV_BASE_DIR))
    }

    pub fn require_backup_dir(&self) -> Result<&Path, ConfigError> {
        self.backup_dir
            .as_deref()
            .ok_or(ConfigError::Missing(super::loader::ENV_BACKUP_DIR))
    }

    pub fn require_restore_dir(&self) -> Result<&Path, ConfigError> {
        self.restore_dir
            .as_deref()
            .ok_or(ConfigError::Missing(super::loader::ENV_RESTORE_DIR))
    }

    pub fn require_bucket(&self) -> Result<&str, ConfigError> {
        self.storage
            .bucket
            .as_deref()
            .filter(|b| !b.is_empty())
            .ok_or(ConfigError::Missing(super::loader::ENV_BUCKET))
    }

    pub fn require_region(&self) -> Result<&str, ConfigError> {
        self.storage
            .region
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or(ConfigError::Missing(super::loader::ENV_REGION))
    }

    /// Local retention window
    pub fn retention(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.retention_days.saturating_mul(SECONDS_PER_DAY))
    }

    pub fn command_timeout(&self) -> Option<std::time::Duration> {
        self.command_timeout_seconds.map(std::time::Duration::from_secs)
    }
}

/// Object store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub bucket: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// S3-compatible endpoint (path-style addressing is used when set)
    #[serde(default)]
    pub endpoint_url: Option<String>,

    /// First segment of every object key
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            region: None,
            endpoint_url: None,
            key_prefix: default_key_prefix(),
        }
    }
}

/// One dump/restore hook bound to a project
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IntegrationConfig {
    /// Project directory name the hook belongs to
    pub project: String,

    /// Name used in the artifact path; defaults to the kind
    #[serde(default)]
    pub name: Option<String>,

    /// Container name pattern (as understood by `docker ps --filter name=`)
    pub container: String,

    /// Project-relative paths excluded from the generic archive step
    #[serde(default)]
    pub excludes: Vec<String>,

    #[serde(flatten)]
    pub kind: IntegrationKind,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum IntegrationKind {
    Postgres {
        database: String,
        user: String,
    },
    Redis {
        #[serde(default = "default_redis_data_path")]
        data_path: String,
    },
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Postgres { .. } => "postgres",
            IntegrationKind::Redis { .. } => "redis",
        }
    }
}

pub(crate) const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

// Default value functions

fn default_retention_days() -> u64 { 7 }
fn default_key_prefix() -> String { "backups".to_string() }
fn default_log_directory() -> PathBuf { PathBuf::from("~/logs") }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
pub(crate) fn default_redis_data_path() -> String { "/data/dump.rdb".to_string() }
