//! Utilities for running commands with proper error handling and timeouts

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, error};

/// Run a command with optional timeout
pub async fn run_command(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<Output> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    if let Some(dir) = working_dir {
        cmd.current_dir(dir);
    }

    debug!("Running command: {} {}", program, args.join(" "));

    let output = with_timeout(program, timeout, cmd.output()).await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        error!("Command failed: {} {}", program, args.join(" "));
        error!("Stderr: {}", stderr.trim());
        anyhow::bail!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    if !stdout.is_empty() {
        debug!("Command output: {}", stdout.trim_end());
    }

    Ok(output)
}

/// Run a command and return stdout as string
pub async fn run_command_stdout(
    program: &str,
    args: &[&str],
    working_dir: Option<&Path>,
    timeout: Option<Duration>,
) -> Result<String> {
    let output = run_command(program, args, working_dir, timeout).await?;
    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Run a command with stdout redirected into a file
///
/// The file is created (or truncated) before the command starts and removed
/// again if the command fails, so a failed dump never leaves a partial file.
pub async fn run_command_to_file(
    program: &str,
    args: &[&str],
    output_path: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let file = std::fs::File::create(output_path)
        .with_context(|| format!("Failed to create output file: {:?}", output_path))?;

    let mut cmd = Command::new(program);
    cmd.args(args);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::from(file));
    cmd.stderr(Stdio::piped());
    cmd.kill_on_drop(true);

    debug!(
        "Running command: {} {} > {:?}",
        program,
        args.join(" "),
        output_path
    );

    let result = with_timeout(program, timeout, cmd.output()).await;

    let failure = match result {
        Ok(output) if output.status.success() => return Ok(()),
        Ok(output) => anyhow::anyhow!(
            "Command failed with exit code {:?}: {}",
            output.status.code(),
            String::from_utf8_lossy(&output.stderr).trim()
        ),
        Err(e) => e,
    };

    error!("Command failed: {} {}", program, args.join(" "));
    if let Err(e) = tokio::fs::remove_file(output_path).await {
        debug!("Failed to remove partial output {:?}: {}", output_path, e);
    }
    Err(failure)
}

async fn with_timeout<F>(program: &str, timeout: Option<Duration>, fut: F) -> Result<Output>
where
    F: std::future::Future<Output = std::io::Result<Output>>,
{
    match timeout {
        Some(limit) => match tokio::time::timeout(limit, fut).await {
            Ok(output) => output.with_context(|| format!("Failed to execute {}", program)),
            Err(_) => Err(anyhow::anyhow!("Command timed out after {:?}", limit)),
        },
        None => fut
            .await
            .with_context(|| format!("Failed to execute {}", program)),
    }
}

/// Check that a tool is available on PATH
pub fn tool_available(program: &str) -> bool {
    which::which(program).is_ok()
}
