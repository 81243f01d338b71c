use super::types::*;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

pub const ENV_BASE_DIR: &str = "BASE_DIR";
pub const ENV_BACKUP_DIR: &str = "BACKUP_DIR";
pub const ENV_RESTORE_DIR: &str = "RESTORE_DIR";
pub const ENV_BUCKET: &str = "APP_BUCKET";
pub const ENV_BUCKET_ALIAS: &str = "S3_BACKUPS_BUCKET";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_ENDPOINT: &str = "S3_ENDPOINT_URL";
pub const ENV_RETENTION_DAYS: &str = "BACKUP_RETENTION_DAYS";
pub const ENV_LOG_DIR: &str = "LOG_DIR";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Missing required setting: {0} is not set")]
    Missing(&'static str),

    #[error("Invalid setting: {0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Load configuration from an optional TOML file, then apply the process
/// environment on top of it
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// Same as [`load_config`] with an explicit variable lookup
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => {
            let contents = fs::read_to_string(path)?;
            toml::from_str(&contents)?
        }
        None => Config::default(),
    };

    apply_env(&mut config, &lookup)?;
    expand_paths(&mut config);
    validate_config(&config)?;
    Ok(config)
}

/// Environment values override file values
fn apply_env<F>(config: &mut Config, lookup: &F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
    let home = || get("HOME").map(PathBuf::from).or_else(dirs::home_dir);

    if let Some(dir) = get(ENV_BASE_DIR) {
        config.base_dir = Some(PathBuf::from(dir));
    }
    if config.base_dir.is_none() {
        config.base_dir = home();
    }

    if let Some(dir) = get(ENV_BACKUP_DIR) {
        config.backup_dir = Some(PathBuf::from(dir));
    }

    if let Some(dir) = get(ENV_RESTORE_DIR) {
        config.restore_dir = Some(PathBuf::from(dir));
    }
    if config.restore_dir.is_none() {
        config.restore_dir = home();
    }

    if let Some(bucket) = get(ENV_BUCKET).or_else(|| get(ENV_BUCKET_ALIAS)) {
        config.storage.bucket = Some(bucket);
    }
    if let Some(region) = get(ENV_REGION) {
        config.storage.region = Some(region);
    }
    if let Some(endpoint) = get(ENV_ENDPOINT) {
        config.storage.endpoint_url = Some(endpoint);
    }

    if let Some(days) = get(ENV_RETENTION_DAYS) {
        config.retention_days = days.trim().parse().map_err(|_| {
            ConfigError::Invalid(format!("{} must be a whole number of days: {}", ENV_RETENTION_DAYS, days))
        })?;
    }

    if let Some(dir) = get(ENV_LOG_DIR) {
        config.log_directory = PathBuf::from(dir);
    }
    if let Some(level) = get(ENV_LOG_LEVEL) {
        config.log_level = level;
    }

    Ok(())
}

fn expand_paths(config: &mut Config) {
    for path in [
        &mut config.base_dir,
        &mut config.backup_dir,
        &mut config.restore_dir,
    ]
    .into_iter()
    .flatten()
    {
        *path = super::expand_tilde(path);
    }
    config.log_directory = super::expand_tilde(&config.log_directory);
}

/// Validate the configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.retention_days == 0 {
        return Err(ConfigError::Invalid(
            "retention_days must be at least 1".to_string(),
        ));
    }

    if config.retention_days.checked_mul(SECONDS_PER_DAY).is_none() {
        return Err(ConfigError::Invalid(format!(
            "retention_days is too large: {}",
            config.retention_days
        )));
    }

    if config.log_level.parse::<tracing::Level>().is_err() {
        return Err(ConfigError::Invalid(format!(
            "log_level must be one of trace, debug, info, warn, error: {}",
            config.log_level
        )));
    }

    if config.storage.key_prefix.trim_matches('/').is_empty() {
        return Err(ConfigError::Invalid(
            "storage.key_prefix must not be empty".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for integration in &config.integrations {
        validate_integration(integration)?;

        let name = integration
            .name
            .clone()
            .unwrap_or_else(|| integration.kind.as_str().to_string());
        if !seen.insert((integration.project.clone(), name.clone())) {
            return Err(ConfigError::Invalid(format!(
                "Project '{}' declares integration '{}' twice",
                integration.project, name
            )));
        }
    }

    Ok(())
}

fn validate_integration(integration: &IntegrationConfig) -> Result<()> {
    if integration.project.is_empty() || integration.project.contains('/') {
        return Err(ConfigError::Invalid(format!(
            "Integration project must be a plain directory name: '{}'",
            integration.project
        )));
    }

    if integration.container.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Integration for project '{}' has an empty container pattern",
            integration.project
        )));
    }

    for exclude in &integration.excludes {
        if Path::new(exclude).is_absolute() {
            return Err(ConfigError::Invalid(format!(
                "Integration excludes are relative to the project directory: '{}'",
                exclude
            )));
        }
    }

    Ok(())
}
