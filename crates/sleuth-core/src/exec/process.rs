//! ProcessExecutor: spawn one external tool and supervise it.

use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::{DEFAULT_TIMEOUT, ExecError, RawOutput};

/// Cap per stream; anything beyond is read and dropped so the child never
/// blocks on a full pipe.
const DEFAULT_MAX_OUTPUT_BYTES: usize = 4 * 1024 * 1024;

/// How long to wait for the pipes to drain after the process exits.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Executable + arguments + wall-clock budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Output accumulated incrementally by a reader task.
#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn append(&self, chunk: &[u8], limit: usize) {
        let mut buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
    }

    fn snapshot(&self) -> String {
        let buf = self.0.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&buf).into_owned()
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, buf: SharedBuf, limit: usize) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.append(&chunk[..n], limit),
            Err(e) => {
                debug!(error = %e, "output pipe read failed");
                break;
            }
        }
    }
}

/// Spawns tools with piped output and a timeout.
///
/// No retries here; retrying is the caller's business.
#[derive(Debug, Clone)]
pub struct ProcessExecutor {
    max_output_bytes: usize,
}

impl Default for ProcessExecutor {
    fn default() -> Self {
        Self {
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

impl ProcessExecutor {
    pub fn new(max_output_bytes: usize) -> Self {
        Self { max_output_bytes }
    }

    /// Run `spec` to completion, timeout, or cancellation, whichever is first.
    pub async fn run(
        &self,
        spec: &CommandSpec,
        cancel: &CancellationToken,
    ) -> Result<RawOutput, ExecError> {
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // 子孫ごと止められるように独立したプロセスグループで起動
        #[cfg(unix)]
        cmd.process_group(0);

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            program: spec.program.clone(),
            source,
        })?;
        debug!(program = %spec.program, pid = ?child.id(), "spawned tool");

        let stdout = SharedBuf::default();
        let stderr = SharedBuf::default();
        let readers: Vec<JoinHandle<()>> = [
            child
                .stdout
                .take()
                .map(|out| tokio::spawn(pump(out, stdout.clone(), self.max_output_bytes))),
            child
                .stderr
                .take()
                .map(|err| tokio::spawn(pump(err, stderr.clone(), self.max_output_bytes))),
        ]
        .into_iter()
        .flatten()
        .collect();

        let started = Instant::now();

        // 終了・タイムアウト・キャンセルのうち最初に来たものを採用
        let interrupted = tokio::select! {
            status = child.wait() => {
                let status = status.map_err(|source| ExecError::Io {
                    program: spec.program.clone(),
                    source,
                })?;
                drain(readers).await;
                let output = RawOutput {
                    stdout: stdout.snapshot(),
                    stderr: stderr.snapshot(),
                    exit_code: status.code(),
                };
                debug!(
                    program = %spec.program,
                    exit_code = ?output.exit_code,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool exited"
                );
                return Ok(output);
            }
            _ = tokio::time::sleep(spec.timeout) => Interrupt::Timeout,
            _ = cancel.cancelled() => Interrupt::Cancelled,
        };

        kill_group(&spec.program, child.id());
        if let Err(e) = child.kill().await {
            warn!(program = %spec.program, error = %e, "failed to kill tool");
        }
        // Grandchildren may still hold the pipes open; do not wait on them.
        for reader in &readers {
            reader.abort();
        }

        let partial = RawOutput {
            stdout: stdout.snapshot(),
            stderr: stderr.snapshot(),
            exit_code: None,
        };
        debug!(
            program = %spec.program,
            stdout_bytes = partial.stdout.len(),
            stderr_bytes = partial.stderr.len(),
            "partial output at interruption"
        );

        Err(match interrupted {
            Interrupt::Timeout => ExecError::Timeout {
                program: spec.program.clone(),
                timeout: spec.timeout,
                partial,
            },
            Interrupt::Cancelled => ExecError::Cancelled {
                program: spec.program.clone(),
                partial,
            },
        })
    }
}

/// SIGKILL the tool's whole process group, so helpers it spawned die too.
#[cfg(unix)]
fn kill_group(program: &str, pid: Option<u32>) {
    use nix::sys::signal::{Signal, killpg};
    use nix::unistd::Pid;

    // pid is None once the child has been reaped
    let Some(pid) = pid else {
        return;
    };
    let pgid = Pid::from_raw(pid as i32);
    if let Err(e) = killpg(pgid, Signal::SIGKILL) {
        debug!(program, pgid = pid, error = %e, "killpg failed");
    }
}

#[cfg(not(unix))]
fn kill_group(_program: &str, _pid: Option<u32>) {}

enum Interrupt {
    Timeout,
    Cancelled,
}

async fn drain(readers: Vec<JoinHandle<()>>) {
    for reader in readers {
        let abort = reader.abort_handle();
        if tokio::time::timeout(DRAIN_GRACE, reader).await.is_err() {
            abort.abort();
        }
    }
}
