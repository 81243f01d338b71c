//! Container runtime abstraction for testability
//!
//! Dump/restore integrations and service reconnection only need a handful of
//! runtime capabilities. This trait names exactly those, so the managers never
//! depend on the Docker CLI directly and tests can swap in a mock.

use super::executor::{CommandExecutor, RealExecutor};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Abstraction for container runtime operations, enabling mocking in tests
#[async_trait]
pub trait ContainerOperations: Send + Sync {
    /// Name of a running container matching the pattern, if any
    async fn find_running(&self, pattern: &str) -> Result<Option<String>>;

    /// Execute a command in a container, returning stdout
    async fn exec(&self, container: &str, command: &[&str]) -> Result<String>;

    /// Execute a command in a container, writing stdout to a host file
    async fn exec_to_file(&self, container: &str, command: &[&str], output_path: &Path) -> Result<()>;

    /// Copy a file out of a container
    async fn copy_from(&self, container: &str, source: &str, destination: &Path) -> Result<()>;

    /// Copy a host file into a container
    async fn copy_to(&self, source: &Path, container: &str, destination: &str) -> Result<()>;

    /// Whether an orchestrator stack with this name is running
    async fn stack_exists(&self, name: &str) -> Result<bool>;

    /// Rolling restart of every service in the stack; returns the service names
    async fn redeploy_stack(&self, name: &str) -> Result<Vec<String>>;

    /// Deploy a stack from a manifest on disk
    async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<()>;
}

/// Default implementation driving the Docker CLI
#[derive(Clone)]
pub struct RealDockerOps {
    executor: Arc<dyn CommandExecutor>,
    timeout: Option<Duration>,
}

impl RealDockerOps {
    pub fn new(timeout: Option<Duration>) -> Self {
        Self::with_executor(Arc::new(RealExecutor::new()), timeout)
    }

    pub fn with_executor(executor: Arc<dyn CommandExecutor>, timeout: Option<Duration>) -> Self {
        Self { executor, timeout }
    }
}

#[async_trait]
impl ContainerOperations for RealDockerOps {
    async fn find_running(&self, pattern: &str) -> Result<Option<String>> {
        super::docker::find_running_container(self.executor.as_ref(), pattern, self.timeout).await
    }

    async fn exec(&self, container: &str, command: &[&str]) -> Result<String> {
        super::docker::exec(self.executor.as_ref(), container, command, self.timeout).await
    }

    async fn exec_to_file(&self, container: &str, command: &[&str], output_path: &Path) -> Result<()> {
        super::docker::exec_to_file(self.executor.as_ref(), container, command, output_path, self.timeout)
            .await
    }

    async fn copy_from(&self, container: &str, source: &str, destination: &Path) -> Result<()> {
        super::docker::copy_from(self.executor.as_ref(), container, source, destination, self.timeout)
            .await
    }

    async fn copy_to(&self, source: &Path, container: &str, destination: &str) -> Result<()> {
        super::docker::copy_to(self.executor.as_ref(), source, container, destination, self.timeout)
            .await
    }

    async fn stack_exists(&self, name: &str) -> Result<bool> {
        super::docker::stack_exists(self.executor.as_ref(), name, self.timeout).await
    }

    async fn redeploy_stack(&self, name: &str) -> Result<Vec<String>> {
        super::docker::redeploy_stack(self.executor.as_ref(), name, self.timeout).await
    }

    async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<()> {
        super::docker::deploy_stack(self.executor.as_ref(), name, manifest, self.timeout).await
    }
}

/// Mock implementation for testing
/// Available for use in external test crates
pub mod mock {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Recorded runtime operation call
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum ContainerCall {
        FindRunning { pattern: String },
        Exec { container: String, command: Vec<String> },
        ExecToFile { container: String, command: Vec<String>, path: String },
        CopyFrom { container: String, source: String, destination: String },
        CopyTo { source: String, container: String, destination: String },
        StackExists { name: String },
        RedeployStack { name: String },
        DeployStack { name: String, manifest: String },
    }

    /// Mock container runtime for testing
    #[derive(Clone, Default)]
    pub struct MockContainerOps {
        /// Recorded operation calls
        pub calls: Arc<Mutex<Vec<ContainerCall>>>,
        /// Running container names (matched by substring, like `docker ps --filter name=`)
        running: Arc<Mutex<Vec<String>>>,
        /// Deployed stacks and their services
        stacks: Arc<Mutex<HashMap<String, Vec<String>>>>,
        /// Bytes written by exec_to_file and copy_from
        file_content: Arc<Mutex<Vec<u8>>>,
        /// Canned stdout for exec, keyed by the first command word
        exec_output: Arc<Mutex<HashMap<String, Vec<String>>>>,
        /// Containers whose exec/copy calls fail
        failing: Arc<Mutex<Vec<String>>>,
    }

    impl MockContainerOps {
        pub fn new() -> Self {
            Self {
                file_content: Arc::new(Mutex::new(b"-- mock dump".to_vec())),
                ..Self::default()
            }
        }

        /// Configure running containers
        pub fn with_running(self, names: &[&str]) -> Self {
            self.running
                .lock()
                .unwrap()
                .extend(names.iter().map(|n| n.to_string()));
            self
        }

        /// Configure a deployed stack
        pub fn with_stack(self, name: &str, services: &[&str]) -> Self {
            self.stacks.lock().unwrap().insert(
                name.to_string(),
                services.iter().map(|s| s.to_string()).collect(),
            );
            self
        }

        /// Content produced by exec_to_file and copy_from
        pub fn with_file_content(self, content: &[u8]) -> Self {
            *self.file_content.lock().unwrap() = content.to_vec();
            self
        }

        /// Queue stdout values for exec calls whose command starts with `program`.
        /// The last value repeats once the queue is drained.
        pub fn with_exec_output(self, program: &str, outputs: &[&str]) -> Self {
            self.exec_output.lock().unwrap().insert(
                program.to_string(),
                outputs.iter().map(|o| o.to_string()).collect(),
            );
            self
        }

        /// Make every exec/copy call against this container fail
        pub fn with_failing_container(self, name: &str) -> Self {
            self.failing.lock().unwrap().push(name.to_string());
            self
        }

        /// Get all recorded calls
        pub fn get_calls(&self) -> Vec<ContainerCall> {
            self.calls.lock().unwrap().clone()
        }

        /// Exec calls (including exec_to_file) against a container
        pub fn exec_commands_for(&self, container: &str) -> Vec<Vec<String>> {
            self.get_calls()
                .into_iter()
                .filter_map(|c| match c {
                    ContainerCall::Exec { container: c, command }
                    | ContainerCall::ExecToFile { container: c, command, .. }
                        if c == container =>
                    {
                        Some(command)
                    }
                    _ => None,
                })
                .collect()
        }

        pub fn redeployed(&self) -> Vec<String> {
            self.get_calls()
                .into_iter()
                .filter_map(|c| match c {
                    ContainerCall::RedeployStack { name } => Some(name),
                    _ => None,
                })
                .collect()
        }

        fn record_call(&self, call: ContainerCall) {
            self.calls.lock().unwrap().push(call);
        }

        fn check_failing(&self, container: &str) -> Result<()> {
            if self.failing.lock().unwrap().iter().any(|f| f == container) {
                anyhow::bail!("Mock failure in container {}", container);
            }
            Ok(())
        }

        fn write_content(&self, path: &Path) -> Result<()> {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(path, &*self.file_content.lock().unwrap())?;
            Ok(())
        }
    }

    fn to_strings(command: &[&str]) -> Vec<String> {
        command.iter().map(|s| s.to_string()).collect()
    }

    #[async_trait]
    impl ContainerOperations for MockContainerOps {
        async fn find_running(&self, pattern: &str) -> Result<Option<String>> {
            self.record_call(ContainerCall::FindRunning {
                pattern: pattern.to_string(),
            });
            Ok(self
                .running
                .lock()
                .unwrap()
                .iter()
                .find(|n| n.contains(pattern))
                .cloned())
        }

        async fn exec(&self, container: &str, command: &[&str]) -> Result<String> {
            self.record_call(ContainerCall::Exec {
                container: container.to_string(),
                command: to_strings(command),
            });
            self.check_failing(container)?;

            let key = command.first().copied().unwrap_or_default();
            let mut outputs = self.exec_output.lock().unwrap();
            match outputs.get_mut(key) {
                Some(queue) if queue.len() > 1 => Ok(queue.remove(0)),
                Some(queue) => Ok(queue.first().cloned().unwrap_or_default()),
                None => Ok(String::new()),
            }
        }

        async fn exec_to_file(&self, container: &str, command: &[&str], output_path: &Path) -> Result<()> {
            self.record_call(ContainerCall::ExecToFile {
                container: container.to_string(),
                command: to_strings(command),
                path: output_path.display().to_string(),
            });
            self.check_failing(container)?;
            self.write_content(output_path)
        }

        async fn copy_from(&self, container: &str, source: &str, destination: &Path) -> Result<()> {
            self.record_call(ContainerCall::CopyFrom {
                container: container.to_string(),
                source: source.to_string(),
                destination: destination.display().to_string(),
            });
            self.check_failing(container)?;
            self.write_content(destination)
        }

        async fn copy_to(&self, source: &Path, container: &str, destination: &str) -> Result<()> {
            self.record_call(ContainerCall::CopyTo {
                source: source.display().to_string(),
                container: container.to_string(),
                destination: destination.to_string(),
            });
            self.check_failing(container)
        }

        async fn stack_exists(&self, name: &str) -> Result<bool> {
            self.record_call(ContainerCall::StackExists {
                name: name.to_string(),
            });
            Ok(self.stacks.lock().unwrap().contains_key(name))
        }

        async fn redeploy_stack(&self, name: &str) -> Result<Vec<String>> {
            self.record_call(ContainerCall::RedeployStack {
                name: name.to_string(),
            });
            Ok(self
                .stacks
                .lock()
                .unwrap()
                .get(name)
                .cloned()
                .unwrap_or_default())
        }

        async fn deploy_stack(&self, name: &str, manifest: &Path) -> Result<()> {
            self.record_call(ContainerCall::DeployStack {
                name: name.to_string(),
                manifest: manifest.display().to_string(),
            });
            Ok(())
        }
    }
}
