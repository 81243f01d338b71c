//! Process spawning seam
//!
//! Everything that shells out (tar, docker, ssh, scp) goes through
//! [`CommandExecutor`] so the orchestration can be driven by [`mock::MockExecutor`].

use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    /// Run `program` to completion; a non-zero exit is an error carrying stderr
    async fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Output>;

    async fn run_command_stdout(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<String> {
        let output = self.run_command(program, args, working_dir, timeout).await?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Run `program` with stdout streamed into `output_path` (database dumps)
    async fn run_command_to_file(
        &self,
        program: &str,
        args: &[&str],
        output_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Spawns real processes through [`super::command`]
#[derive(Debug, Clone, Default)]
pub struct RealExecutor;

impl RealExecutor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CommandExecutor for RealExecutor {
    async fn run_command(
        &self,
        program: &str,
        args: &[&str],
        working_dir: Option<&Path>,
        timeout: Option<Duration>,
    ) -> Result<Output> {
        super::command::run_command(program, args, working_dir, timeout).await
    }

    async fn run_command_to_file(
        &self,
        program: &str,
        args: &[&str],
        output_path: &Path,
        timeout: Option<Duration>,
    ) -> Result<()> {
        super::command::run_command_to_file(program, args, output_path, timeout).await
    }
}

/// Scripted executor shared with the integration test crate
pub mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// One recorded invocation
    #[derive(Clone, Debug)]
    pub struct CommandCall {
        pub program: String,
        pub args: Vec<String>,
        /// Set for `run_command_to_file` calls
        pub output_path: Option<String>,
    }

    impl CommandCall {
        pub fn has_arg(&self, needle: &str) -> bool {
            self.args.iter().any(|a| a.contains(needle))
        }
    }

    /// What a scripted program prints, or the stderr it fails with
    #[derive(Clone, Debug, Default)]
    pub struct MockResponse {
        stdout: String,
        failure: Option<String>,
    }

    impl MockResponse {
        pub fn stdout(stdout: &str) -> Self {
            Self {
                stdout: stdout.to_string(),
                failure: None,
            }
        }

        pub fn failure(stderr: &str) -> Self {
            Self {
                stdout: String::new(),
                failure: Some(stderr.to_string()),
            }
        }

        fn into_output(self) -> Result<Output> {
            if let Some(stderr) = self.failure {
                anyhow::bail!("Command failed with exit code Some(1): {}", stderr);
            }
            Ok(Output {
                status: std::process::ExitStatus::default(),
                stdout: self.stdout.into_bytes(),
                stderr: Vec::new(),
            })
        }
    }

    #[derive(Default)]
    struct Script {
        calls: Vec<CommandCall>,
        /// (program, required argument fragment, response); first match wins
        rules: Vec<(String, Option<String>, MockResponse)>,
        fallback: MockResponse,
    }

    impl Script {
        fn respond(&self, program: &str, args: &[&str]) -> MockResponse {
            self.rules
                .iter()
                .find(|(p, needle, _)| {
                    p == program
                        && needle
                            .as_deref()
                            .map_or(true, |n| args.iter().any(|a| a.contains(n)))
                })
                .map(|(_, _, response)| response.clone())
                .unwrap_or_else(|| self.fallback.clone())
        }
    }

    /// Records every call and answers from a script; unscripted programs succeed
    /// with empty output
    #[derive(Clone, Default)]
    pub struct MockExecutor {
        script: Arc<Mutex<Script>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        /// Answer every call to `program` with `response`
        pub fn expect(self, program: &str, response: MockResponse) -> Self {
            self.script
                .lock()
                .unwrap()
                .rules
                .push((program.to_string(), None, response));
            self
        }

        /// Answer calls to `program` that carry an argument containing `needle`;
        /// these win over [`expect`](Self::expect)
        pub fn expect_with_arg(self, program: &str, needle: &str, response: MockResponse) -> Self {
            self.script
                .lock()
                .unwrap()
                .rules
                .insert(0, (program.to_string(), Some(needle.to_string()), response));
            self
        }

        pub fn with_default_response(self, response: MockResponse) -> Self {
            self.script.lock().unwrap().fallback = response;
            self
        }

        pub fn get_calls(&self) -> Vec<CommandCall> {
            self.script.lock().unwrap().calls.clone()
        }

        pub fn calls_to(&self, program: &str) -> Vec<CommandCall> {
            self.get_calls()
                .into_iter()
                .filter(|c| c.program == program)
                .collect()
        }

        pub fn was_called(&self, program: &str) -> bool {
            self.call_count(program) > 0
        }

        pub fn call_count(&self, program: &str) -> usize {
            self.calls_to(program).len()
        }

        fn answer(&self, program: &str, args: &[&str], output_path: Option<&Path>) -> Result<Output> {
            let mut script = self.script.lock().unwrap();
            script.calls.push(CommandCall {
                program: program.to_string(),
                args: args.iter().map(|a| a.to_string()).collect(),
                output_path: output_path.map(|p| p.display().to_string()),
            });
            script.respond(program, args).into_output()
        }
    }

    #[async_trait]
    impl CommandExecutor for MockExecutor {
        async fn run_command(
            &self,
            program: &str,
            args: &[&str],
            _working_dir: Option<&Path>,
            _timeout: Option<Duration>,
        ) -> Result<Output> {
            self.answer(program, args, None)
        }

        async fn run_command_to_file(
            &self,
            program: &str,
            args: &[&str],
            output_path: &Path,
            _timeout: Option<Duration>,
        ) -> Result<()> {
            let output = self.answer(program, args, Some(output_path))?;
            if let Some(parent) = output_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(output_path, output.stdout)?;
            Ok(())
        }
    }
}
