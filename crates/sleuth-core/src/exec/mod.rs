//! Executor adapters: run one tool invocation and hand back its raw text.
//!
//! Two strategies sit behind the same `Executor` seam:
//! - `ProcessExecutor` spawns an external binary and supervises it.
//! - `HttpProber` makes outbound requests itself and renders one marker line
//!   per probe, so its output goes through the same parsers.

mod http;
mod process;

pub use http::{HttpProber, ProbeSpec};
pub use process::{CommandSpec, ProcessExecutor};

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::domain::{FailureKind, TaskFailure};

/// Default wall-clock budget for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// What to run for one task.
#[derive(Debug, Clone)]
pub enum Invocation {
    Process(CommandSpec),
    Http(ProbeSpec),
}

impl Invocation {
    /// Short human label for logs and error messages.
    pub fn label(&self) -> String {
        match self {
            Invocation::Process(spec) => spec.program.clone(),
            Invocation::Http(spec) => spec.base_url.to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        match self {
            Invocation::Process(spec) => spec.timeout,
            Invocation::Http(spec) => spec.timeout,
        }
    }
}

/// Captured output of a finished invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawOutput {
    pub stdout: String,
    pub stderr: String,

    /// `None` when the process was killed by a signal or there is no process.
    pub exit_code: Option<i32>,
}

impl RawOutput {
    pub fn from_stdout(stdout: impl Into<String>) -> Self {
        Self {
            stdout: stdout.into(),
            ..Self::default()
        }
    }
}

/// Why an invocation did not produce output.
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} timed out after {timeout:?}")]
    Timeout {
        program: String,
        timeout: Duration,
        /// Whatever was captured before the kill. Diagnostic only.
        partial: RawOutput,
    },

    #[error("{program} was cancelled")]
    Cancelled { program: String, partial: RawOutput },

    #[error("i/o error while supervising {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("http probe could not start: {0}")]
    Http(String),
}

impl ExecError {
    pub fn kind(&self) -> FailureKind {
        match self {
            ExecError::Spawn { .. } | ExecError::Io { .. } | ExecError::Http(_) => {
                FailureKind::SpawnFailure
            }
            ExecError::Timeout { .. } => FailureKind::Timeout,
            ExecError::Cancelled { .. } => FailureKind::Cancelled,
        }
    }

    pub fn partial_output(&self) -> Option<&RawOutput> {
        match self {
            ExecError::Timeout { partial, .. } | ExecError::Cancelled { partial, .. } => {
                Some(partial)
            }
            _ => None,
        }
    }

    pub fn to_failure(&self) -> TaskFailure {
        TaskFailure::new(self.kind(), self.to_string())
    }
}

/// Runs an `Invocation`. The scheduler only talks to this trait.
#[async_trait]
pub trait Executor: Send + Sync {
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<RawOutput, ExecError>;
}

/// Default executor: processes via `ProcessExecutor`, HTTP via `HttpProber`.
pub struct DefaultExecutor {
    process: ProcessExecutor,
    http: HttpProber,
}

impl DefaultExecutor {
    pub fn new(process: ProcessExecutor, http: HttpProber) -> Self {
        Self { process, http }
    }

    pub fn try_default() -> Result<Self, ExecError> {
        Ok(Self::new(ProcessExecutor::default(), HttpProber::new()?))
    }
}

#[async_trait]
impl Executor for DefaultExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        cancel: &CancellationToken,
    ) -> Result<RawOutput, ExecError> {
        match invocation {
            Invocation::Process(spec) => self.process.run(spec, cancel).await,
            Invocation::Http(spec) => self.http.run(spec, cancel).await,
        }
    }
}
