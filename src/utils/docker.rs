//! Docker CLI helpers for dump/restore steps and service reconnection

use super::executor::CommandExecutor;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// One line of `docker ps --format '{{json .}}'`
#[derive(Debug, Deserialize)]
struct PsEntry {
    #[serde(rename = "Names")]
    names: String,
    #[serde(rename = "State", default)]
    state: Option<String>,
}

/// Parse `docker ps` JSON lines into running container names
pub fn parse_ps_output(output: &str) -> Result<Vec<String>> {
    let mut names = Vec::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let entry: PsEntry = serde_json::from_str(line)
            .with_context(|| format!("Unexpected docker ps output: {}", line))?;

        if entry.state.as_deref().map_or(true, |s| s == "running") {
            names.extend(
                entry
                    .names
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(str::to_string),
            );
        }
    }

    Ok(names)
}

/// Find a running container whose name matches the pattern
pub async fn find_running_container(
    executor: &dyn CommandExecutor,
    pattern: &str,
    timeout: Option<Duration>,
) -> Result<Option<String>> {
    let filter = format!("name={}", pattern);
    let output = executor
        .run_command_stdout(
            "docker",
            &["ps", "--filter", &filter, "--format", "{{json .}}"],
            None,
            timeout,
        )
        .await
        .context("Failed to list running containers")?;

    let mut names = parse_ps_output(&output)?;
    names.sort();
    debug!("Containers matching '{}': {:?}", pattern, names);
    Ok(names.into_iter().next())
}

/// Run a command inside a container and return its stdout
pub async fn exec(
    executor: &dyn CommandExecutor,
    container: &str,
    command: &[&str],
    timeout: Option<Duration>,
) -> Result<String> {
    let mut args = vec!["exec", container];
    args.extend_from_slice(command);

    executor
        .run_command_stdout("docker", &args, None, timeout)
        .await
        .with_context(|| format!("Failed to run '{}' in container {}", command.join(" "), container))
}

/// Run a command inside a container with stdout written to a host file
pub async fn exec_to_file(
    executor: &dyn CommandExecutor,
    container: &str,
    command: &[&str],
    output_path: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let mut args = vec!["exec", container];
    args.extend_from_slice(command);

    executor
        .run_command_to_file("docker", &args, output_path, timeout)
        .await
        .with_context(|| format!("Failed to run '{}' in container {}", command.join(" "), container))
}

/// Copy a file out of a container
pub async fn copy_from(
    executor: &dyn CommandExecutor,
    container: &str,
    source: &str,
    destination: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create directory: {:?}", parent))?;
    }

    let from = format!("{}:{}", container, source);
    let to = destination.display().to_string();
    executor
        .run_command("docker", &["cp", &from, &to], None, timeout)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from, to))?;
    Ok(())
}

/// Copy a host file into a container
pub async fn copy_to(
    executor: &dyn CommandExecutor,
    source: &Path,
    container: &str,
    destination: &str,
    timeout: Option<Duration>,
) -> Result<()> {
    let from = source.display().to_string();
    let to = format!("{}:{}", container, destination);
    executor
        .run_command("docker", &["cp", &from, &to], None, timeout)
        .await
        .with_context(|| format!("Failed to copy {} to {}", from, to))?;
    Ok(())
}

/// Check whether a swarm stack with this exact name is deployed
pub async fn stack_exists(
    executor: &dyn CommandExecutor,
    name: &str,
    timeout: Option<Duration>,
) -> Result<bool> {
    let output = executor
        .run_command_stdout("docker", &["stack", "ls", "--format", "{{.Name}}"], None, timeout)
        .await
        .context("Failed to list stacks")?;

    Ok(output.lines().any(|line| line.trim() == name))
}

/// Force a rolling update of every service in a stack
pub async fn redeploy_stack(
    executor: &dyn CommandExecutor,
    name: &str,
    timeout: Option<Duration>,
) -> Result<Vec<String>> {
    let output = executor
        .run_command_stdout(
            "docker",
            &["stack", "services", name, "--format", "{{.Name}}"],
            None,
            timeout,
        )
        .await
        .with_context(|| format!("Failed to list services of stack {}", name))?;

    let services: Vec<String> = output
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();

    for service in &services {
        info!("Restarting service: {}", service);
        executor
            .run_command(
                "docker",
                &["service", "update", "--force", "--quiet", service],
                None,
                timeout,
            )
            .await
            .with_context(|| format!("Failed to restart service {}", service))?;
    }

    Ok(services)
}

/// Deploy a stack from a compose manifest
pub async fn deploy_stack(
    executor: &dyn CommandExecutor,
    name: &str,
    manifest: &Path,
    timeout: Option<Duration>,
) -> Result<()> {
    let manifest = manifest.display().to_string();
    executor
        .run_command("docker", &["stack", "deploy", "-c", &manifest, name], None, timeout)
        .await
        .with_context(|| format!("Failed to deploy stack {} from {}", name, manifest))?;
    Ok(())
}
