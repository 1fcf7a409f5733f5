//! Hands a confirmed-live URL to the end-to-end test runner.
//!
//! The runner is an npm script executed synchronously in the app directory,
//! with stdio inherited so its output streams straight to the CI log. The
//! target URL is injected into the child environment; everything else is
//! inherited from this process.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{PreflightError, Result};

/// Which test-run variant to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Start the dev server, wait for it, then run the suite against it.
    Development,
    /// Run the suite against an already deployed target.
    Production,
}

impl RunMode {
    pub fn from_dev_flag(is_development: bool) -> Self {
        if is_development {
            RunMode::Development
        } else {
            RunMode::Production
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RunMode::Development => "development",
            RunMode::Production => "production",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Target of one test run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfig {
    pub target_url: String,
    pub mode: RunMode,
}

/// Program, script names and environment variable used for test runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TestRunnerConfig {
    /// Package-manager executable (`npm`).
    pub program: String,
    /// Script run in development mode.
    pub dev_script: String,
    /// Script run in production mode.
    pub prod_script: String,
    /// Environment variable carrying the target URL.
    pub url_env_var: String,
}

impl Default for TestRunnerConfig {
    fn default() -> Self {
        Self {
            program: "npm".to_string(),
            dev_script: "test:e2e:run".to_string(),
            prod_script: "cy:run".to_string(),
            url_env_var: "CYPRESS_BASE_URL".to_string(),
        }
    }
}

impl TestRunnerConfig {
    pub fn script_for(&self, mode: RunMode) -> &str {
        match mode {
            RunMode::Development => &self.dev_script,
            RunMode::Production => &self.prod_script,
        }
    }
}

/// A fully resolved child process invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    /// Variables added on top of the inherited environment.
    pub env: Vec<(String, String)>,
}

/// Runs a child process to completion with inherited stdio.
///
/// Returns the exit code, or `None` when the child was terminated by a
/// signal.
pub trait ProcessRunner: Send + Sync {
    fn run(&self, command: &CommandSpec) -> std::io::Result<Option<i32>>;
}

/// [`ProcessRunner`] backed by `std::process::Command`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcessRunner;

impl ProcessRunner for SystemProcessRunner {
    fn run(&self, command: &CommandSpec) -> std::io::Result<Option<i32>> {
        let status = Command::new(&command.program)
            .args(&command.args)
            .current_dir(&command.working_dir)
            .envs(command.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()?;
        Ok(status.code())
    }
}

/// Executes exactly one test-run variant and maps its exit status.
#[derive(Clone)]
pub struct TestRunInvoker {
    runner: Arc<dyn ProcessRunner>,
    config: TestRunnerConfig,
}

impl TestRunInvoker {
    pub fn new(runner: Arc<dyn ProcessRunner>) -> Self {
        Self {
            runner,
            config: TestRunnerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: TestRunnerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &TestRunnerConfig {
        &self.config
    }

    /// Build the command for `mode` without running it.
    pub fn command_for(&self, working_dir: &Path, mode: RunMode, target_url: &str) -> CommandSpec {
        CommandSpec {
            program: self.config.program.clone(),
            args: vec!["run".to_string(), self.config.script_for(mode).to_string()],
            working_dir: working_dir.to_path_buf(),
            env: vec![(self.config.url_env_var.clone(), target_url.to_string())],
        }
    }

    /// Run the test suite in `working_dir` against `target_url`.
    ///
    /// Blocks until the child exits. A non-zero exit (or death by signal)
    /// fails with [`PreflightError::TestRunFailure`] naming the mode.
    pub fn run_tests(&self, working_dir: &Path, mode: RunMode, target_url: &str) -> Result<()> {
        let command = self.command_for(working_dir, mode, target_url);
        info!(
            mode = %mode,
            program = %command.program,
            script = %command.args[1],
            target_url = %target_url,
            "running end-to-end tests"
        );

        let exit_code = self
            .runner
            .run(&command)
            .map_err(|source| PreflightError::TestRunnerSpawn {
                program: command.program.clone(),
                source,
            })?;

        match exit_code {
            Some(0) => {
                info!(mode = %mode, "end-to-end tests passed");
                Ok(())
            }
            exit_code => Err(PreflightError::TestRunFailure { mode, exit_code }),
        }
    }

    /// [`run_tests`](Self::run_tests) driven by a [`RunConfig`].
    pub fn run(&self, working_dir: &Path, run: &RunConfig) -> Result<()> {
        self.run_tests(working_dir, run.mode, &run.target_url)
    }
}
