//! Discovery of stateful project directories

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Child directory whose presence marks a project as stateful
pub const DATA_DIR: &str = "data";

/// A project directory directly under the base path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirectory {
    pub name: String,
    pub path: PathBuf,
}

/// Immediate subdirectories of `base_dir` that contain a `data` directory,
/// sorted by name
pub async fn discover_projects(base_dir: &Path) -> Result<Vec<ProjectDirectory>> {
    let mut entries = tokio::fs::read_dir(base_dir)
        .await
        .with_context(|| format!("Failed to read base directory: {:?}", base_dir))?;

    let mut projects = Vec::new();

    while let Some(entry) = entries
        .next_entry()
        .await
        .with_context(|| format!("Failed to read base directory: {:?}", base_dir))?
    {
        let path = entry.path();
        let file_type = entry
            .file_type()
            .await
            .with_context(|| format!("Failed to stat {:?}", path))?;

        if file_type.is_symlink() {
            if is_dir(&path.join(DATA_DIR)).await {
                warn!("Skipping {:?}: symlinked project directories are not archived", path);
            }
            continue;
        }
        if !file_type.is_dir() {
            continue;
        }

        if !is_dir(&path.join(DATA_DIR)).await {
            debug!("Skipping {:?}: no {} directory", path, DATA_DIR);
            continue;
        }

        match entry.file_name().into_string() {
            Ok(name) => {
                if name.contains('_') {
                    warn!(
                        "Project {} contains '_'; its archives are keyed under '{}' and cannot be restored by this name",
                        name,
                        name.split('_').next().unwrap_or_default()
                    );
                }
                projects.push(ProjectDirectory { name, path })
            }
            Err(raw) => warn!("Skipping project with non UTF-8 name: {:?}", raw),
        }
    }

    projects.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(projects)
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_dir())
        .unwrap_or(false)
}
