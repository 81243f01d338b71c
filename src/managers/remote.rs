//! Relay of a downloaded archive to a second host over ssh/scp
//!
//! Only the files are restored remotely. Database restore and service
//! reconnection need an operator on that host.

use crate::utils::executor::CommandExecutor;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Where a remote restore goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// `user@host` or an ssh config alias
    pub host: String,
    /// Destination root on the remote host
    pub destination: String,
    pub identity_file: Option<PathBuf>,
}

/// Quote a value for a POSIX shell on the remote side
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

#[derive(Clone)]
pub struct RemoteTransfer {
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl RemoteTransfer {
    pub fn new(executor: Arc<dyn CommandExecutor>, timeout: Option<Duration>) -> Self {
        Self { executor, timeout }
    }

    /// Copy `archive` into the target's destination and extract it there with
    /// overwrite semantics
    pub async fn send(&self, archive: &Path, target: &RemoteTarget) -> Result<()> {
        let file_name = archive
            .file_name()
            .and_then(|n| n.to_str())
            .context("Archive path has no file name")?;
        let destination = target.destination.trim_end_matches('/');
        let destination = if destination.is_empty() { "/" } else { destination };
        let quoted_dest = shell_quote(destination);

        self.ssh(target, &format!("mkdir -p {}", quoted_dest))
            .await
            .with_context(|| format!("Failed to create {} on {}", destination, target.host))?;

        info!(
            "Copying {} to {}:{}",
            file_name, target.host, destination
        );
        let archive_arg = archive.display().to_string();
        let remote_arg = format!("{}:{}/", target.host, destination);
        let mut args = self.identity_args(target);
        args.push(archive_arg.as_str());
        args.push(remote_arg.as_str());

        self.executor
            .run_command("scp", &args, None, self.timeout)
            .await
            .with_context(|| format!("Failed to copy archive to {}", target.host))?;

        info!("Extracting backup on remote host: {}", target.host);
        let remote_file = format!("{}/{}", destination.trim_end_matches('/'), file_name);
        let extract = format!(
            "mkdir -p {dest} && tar -xzf {file} -C {dest} --overwrite",
            dest = quoted_dest,
            file = shell_quote(&remote_file),
        );
        self.ssh(target, &extract)
            .await
            .with_context(|| format!("Failed to extract archive on {}", target.host))?;

        info!("Backup extracted on {} under {}", target.host, destination);
        Ok(())
    }

    async fn ssh(&self, target: &RemoteTarget, command: &str) -> Result<()> {
        let mut args = self.identity_args(target);
        args.push(target.host.as_str());
        args.push(command);

        self.executor
            .run_command("ssh", &args, None, self.timeout)
            .await?;
        Ok(())
    }

    fn identity_args<'a>(&self, target: &'a RemoteTarget) -> Vec<&'a str> {
        match target.identity_file.as_deref().and_then(|p| p.to_str()) {
            Some(key) => vec!["-i", key],
            None => Vec::new(),
        }
    }
}
