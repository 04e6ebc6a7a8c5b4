//! Worker process wrapper -- spawn, capture both streams, enforce a timeout.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::InvocationError;
use crate::config::WorkerConfig;
use crate::scenario::Scenario;

/// Short, clock-derived token that decorrelates successive worker runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seed(u32);

impl Seed {
    const MODULUS: i64 = 100_000;

    pub fn new(value: u32) -> Self {
        Self(value)
    }

    /// Wall-clock milliseconds wrapped into `0..100000`.
    pub fn from_clock() -> Self {
        Self::from_millis(chrono::Utc::now().timestamp_millis())
    }

    pub fn from_millis(millis: i64) -> Self {
        Self(millis.rem_euclid(Self::MODULUS) as u32)
    }

    pub fn value(&self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Captured output of a successful worker run.
#[derive(Debug, Clone, Default)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Anything that can run the analysis for a scenario and seed.
#[async_trait]
pub trait AnalysisRunner: Send + Sync {
    async fn run(&self, scenario: Scenario, seed: Seed) -> Result<RawOutput, InvocationError>;
}

/// Runs the worker as a child process: `<program> [args..] <scenario> <seed>`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            timeout: None,
        }
    }

    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            working_dir: config.working_dir.clone(),
            timeout: config.timeout(),
        }
    }

    /// Fixed leading arguments, e.g. the script path.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl AnalysisRunner for ProcessRunner {
    async fn run(&self, scenario: Scenario, seed: Seed) -> Result<RawOutput, InvocationError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg(scenario.as_str())
            .arg(seed.to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }

        debug!(program = %self.program, args = ?self.args, %scenario, %seed, "spawning analysis worker");
        let child = cmd.spawn().map_err(|e| InvocationError::LaunchFailed {
            program: self.program.clone(),
            message: e.to_string(),
        })?;

        // Dropping the wait future on timeout drops the child, which kills it.
        let waited = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!(program = %self.program, timeout_secs = limit.as_secs(), "analysis worker timed out");
                    InvocationError::TimedOut { after: limit }
                })?,
            None => child.wait_with_output().await,
        };
        let output = waited.map_err(|e| InvocationError::LaunchFailed {
            program: self.program.clone(),
            message: format!("failed to collect worker output: {e}"),
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(InvocationError::ExecutionFailed {
                status: output.status.code(),
                stdout,
                stderr,
            });
        }

        Ok(RawOutput { stdout, stderr })
    }
}
