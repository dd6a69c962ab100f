//! Worker invoker - one worker subprocess per task.
//!
//! Flow:
//! 1. Check that the interpreter and entry point exist (never spawn otherwise)
//! 2. Spawn `<interpreter> <entry> --prompt <task>` in the launcher root
//! 3. Drain stdout/stderr concurrently while waiting, bounded by the timeout
//! 4. On timeout: stop the process group, keep whatever output was buffered
//! 5. Map the outcome to an exit code plus merged text

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::Instrument;

use crate::config::WorkerConfig;
use crate::process::ChildGuard;

/// Exit code reported when the worker exceeded its time budget.
pub const EXIT_TIMEOUT: i32 = 124;

/// Exit code reported when the worker could not be started at all.
pub const EXIT_UNAVAILABLE: i32 = 2;

/// Exit code reported when the worker ended without an exit code or signal
/// number. On Unix a signal death reports the negated signal number instead.
pub const EXIT_SIGNALED: i32 = -1;

/// Output shown when a finished worker printed nothing.
pub const NO_OUTPUT: &str = "(no output)";

/// Output shown when a timed-out worker printed nothing.
pub const TIMEOUT_NO_OUTPUT: &str = "execution exceeded the time limit";

/// Time a timed-out worker gets between SIGTERM and SIGKILL.
const TERMINATION_GRACE: Duration = Duration::from_secs(2);

/// How long to keep draining pipes after the worker exits. Descendants that
/// inherited the pipes can hold them open indefinitely.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Task text for one invocation. Never empty after trimming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskText(String);

impl TaskText {
    /// Trim `raw`; `None` if nothing is left.
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Terminal outcome of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InvocationResult {
    pub exit_code: i32,
    pub output: String,
}

impl InvocationResult {
    fn completed(exit_code: i32, stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code,
            output: merge_output(stdout, stderr, NO_OUTPUT),
        }
    }

    fn timed_out(stdout: &str, stderr: &str) -> Self {
        Self {
            exit_code: EXIT_TIMEOUT,
            output: merge_output(stdout, stderr, TIMEOUT_NO_OUTPUT),
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn is_timeout(&self) -> bool {
        self.exit_code == EXIT_TIMEOUT
    }
}

/// Why an invocation produced no worker output.
#[derive(Debug, thiserror::Error)]
pub enum InvokeError {
    #[error("interpreter not found at {}", .0.display())]
    MissingInterpreter(PathBuf),
    #[error("entry point not found at {}", .0.display())]
    MissingEntryPoint(PathBuf),
    #[error("failed to spawn worker: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to wait for worker: {0}")]
    Wait(#[source] std::io::Error),
}

impl InvokeError {
    pub fn exit_code(&self) -> i32 {
        match self {
            InvokeError::MissingInterpreter(_)
            | InvokeError::MissingEntryPoint(_)
            | InvokeError::Spawn(_) => EXIT_UNAVAILABLE,
            InvokeError::Wait(_) => EXIT_SIGNALED,
        }
    }
}

impl From<InvokeError> for InvocationResult {
    fn from(err: InvokeError) -> Self {
        Self {
            exit_code: err.exit_code(),
            output: err.to_string(),
        }
    }
}

/// Runs the worker program as a function call: spawn, wait, capture.
#[derive(Debug, Clone)]
pub struct WorkerInvoker {
    config: WorkerConfig,
}

impl WorkerInvoker {
    pub fn new(config: WorkerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Both worker paths must exist before anything is spawned.
    pub fn check_environment(&self) -> Result<(), InvokeError> {
        if !self.config.interpreter.exists() {
            return Err(InvokeError::MissingInterpreter(
                self.config.interpreter.clone(),
            ));
        }
        if !self.config.entry_point.exists() {
            return Err(InvokeError::MissingEntryPoint(
                self.config.entry_point.clone(),
            ));
        }
        Ok(())
    }

    /// Run the worker once and wait for it, at most `timeout`.
    ///
    /// Every failure mode is folded into the returned result.
    pub async fn invoke(&self, task: &TaskText, timeout: Duration) -> InvocationResult {
        let submission_id = format!("sub_{}", uuid::Uuid::new_v4().simple());
        let span = tracing::info_span!(target: "agentdock::invoker", "invoke", %submission_id);

        async {
            match self.run(task, timeout).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(target: "agentdock::invoker", error = %e, "Worker unavailable");
                    e.into()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run(&self, task: &TaskText, timeout: Duration) -> Result<InvocationResult, InvokeError> {
        self.check_environment()?;

        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(&self.config.entry_point)
            .arg("--prompt")
            .arg(task.as_str())
            .current_dir(&self.config.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut guard = ChildGuard::spawn(&mut cmd, "worker").map_err(InvokeError::Spawn)?;
        tracing::info!(
            target: "agentdock::invoker",
            pid = ?guard.id(),
            timeout_secs = timeout.as_secs_f64(),
            "Worker started"
        );

        let (stdout_pipe, stderr_pipe) = guard
            .child_mut()
            .map(|child| (child.stdout.take(), child.stderr.take()))
            .unwrap_or((None, None));
        let limit = self.config.max_output_bytes;
        let stdout = StreamCapture::start(stdout_pipe, limit);
        let stderr = StreamCapture::start(stderr_pipe, limit);

        let started = Instant::now();
        let waited = tokio::time::timeout(timeout, guard.wait()).await;

        let result = match waited {
            Ok(status) => {
                let status = status.map_err(InvokeError::Wait)?;
                let exit_code = exit_code_of(status);
                // Anything the worker detached on purpose is left running.
                drop(guard);
                let (out, err) = (stdout.finish().await, stderr.finish().await);
                tracing::info!(
                    target: "agentdock::invoker",
                    exit_code,
                    elapsed_secs = started.elapsed().as_secs_f64(),
                    "Worker finished"
                );
                InvocationResult::completed(exit_code, &out, &err)
            }
            Err(_) => {
                tracing::warn!(
                    target: "agentdock::invoker",
                    timeout_secs = timeout.as_secs_f64(),
                    "Worker timed out, stopping"
                );
                if let Err(e) = guard.shutdown(TERMINATION_GRACE).await {
                    tracing::error!(target: "agentdock::invoker", error = %e, "Failed to stop timed-out worker");
                }
                let (out, err) = (stdout.finish().await, stderr.finish().await);
                InvocationResult::timed_out(&out, &err)
            }
        };

        Ok(result)
    }
}

/// The worker's own code, or the negated signal number it died from.
fn exit_code_of(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return -signal;
        }
    }
    EXIT_SIGNALED
}

/// stdout, then stderr on its own line, trimmed; `placeholder` if empty.
fn merge_output(stdout: &str, stderr: &str, placeholder: &str) -> String {
    let mut merged = String::with_capacity(stdout.len() + stderr.len() + 1);
    merged.push_str(stdout);
    if !stderr.is_empty() {
        merged.push('\n');
        merged.push_str(stderr);
    }

    let trimmed = merged.trim();
    if trimmed.is_empty() {
        placeholder.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Bytes read from one pipe, up to the capture limit.
#[derive(Default)]
struct Captured {
    bytes: Vec<u8>,
    truncated: bool,
}

/// Background reader appending one pipe into a shared buffer.
///
/// The buffer is shared rather than returned by the task so a timed-out
/// invocation can still collect what was read before the kill. Bytes past
/// `limit` are read and discarded so the worker never blocks on a full pipe.
struct StreamCapture {
    buf: Arc<Mutex<Captured>>,
    task: Option<JoinHandle<()>>,
    limit: usize,
}

impl StreamCapture {
    fn start<R>(reader: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Captured::default()));
        let task = reader.map(|mut reader| {
            let buf = Arc::clone(&buf);
            tokio::spawn(async move {
                let mut chunk = [0u8; 8192];
                loop {
                    match reader.read(&mut chunk).await {
                        Ok(0) | Err(_) => break,
                        Ok(n) => {
                            let mut captured = buf.lock().unwrap_or_else(|p| p.into_inner());
                            let room = limit.saturating_sub(captured.bytes.len());
                            if n > room {
                                captured.truncated = true;
                            }
                            captured.bytes.extend_from_slice(&chunk[..n.min(room)]);
                        }
                    }
                }
            })
        });
        Self { buf, task, limit }
    }

    /// Stop reading (after a bounded drain) and decode what was captured.
    ///
    /// A truncated stream loses any character cut in half at the limit and gets
    /// a visible marker line.
    async fn finish(mut self) -> String {
        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(DRAIN_TIMEOUT, &mut task).await.is_err()
        {
            task.abort();
        }
        let captured = self.buf.lock().unwrap_or_else(|p| p.into_inner());
        if !captured.truncated {
            return String::from_utf8_lossy(&captured.bytes).into_owned();
        }

        let kept = complete_utf8_prefix(&captured.bytes);
        let mut text = String::from_utf8_lossy(&captured.bytes[..kept]).into_owned();
        text.push_str(&format!("\n[output truncated after {}]", describe_size(self.limit)));
        text
    }
}

/// Length of `bytes` without a multi-byte UTF-8 sequence cut off at the end.
fn complete_utf8_prefix(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let width = match bytes[i] {
            0x80..=0xBF => continue,
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        return if i + width > bytes.len() { i } else { bytes.len() };
    }
    bytes.len()
}

fn describe_size(bytes: usize) -> String {
    const MIB: usize = 1024 * 1024;
    if bytes >= MIB && bytes % MIB == 0 {
        format!("{} MiB", bytes / MIB)
    } else {
        format!("{bytes} bytes")
    }
}
