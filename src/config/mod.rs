//! Configuration module for stack-backup
//!
//! Builds one explicit [`Config`] value per invocation. Every component gets
//! its settings from this value instead of reading the environment itself.
//!
//! ## Sources
//!
//! Settings are applied in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. Optional TOML file (`--config`)
//! 3. Environment variables (`BASE_DIR`, `BACKUP_DIR`, `APP_BUCKET`, ...)
//!
//! ## Example Usage
//!
//! ```no_run
//! use stack_backup::config;
//!
//! let config = config::load_config(None)?;
//! println!("Archives go to {:?}", config.require_backup_dir()?);
//! # Ok::<(), config::ConfigError>(())
//! ```

mod loader;
mod types;

pub use loader::*;
pub use types::*;

/// Merged exclude patterns for one project, relative to the base directory.
/// Global excludes come first, then the project's integration excludes
/// prefixed with the project name.
pub fn get_effective_excludes(config: &Config, project: &str) -> Vec<String> {
    let mut excludes = config.excludes.clone();

    for integration in config.integrations.iter().filter(|i| i.project == project) {
        excludes.extend(
            integration
                .excludes
                .iter()
                .map(|e| format!("{}/{}", project, e.trim_start_matches("./").trim_end_matches('/'))),
        );
    }

    excludes
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &std::path::Path) -> std::path::PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
