//! Supervisor - launches the request server as a child and presents it.
//!
//! Flow:
//! 1. Launching: check the server program exists, spawn it on host/port
//! 2. Probing: poll the port until it accepts connections (bounded)
//! 3. Ready: hand the URL to a presentation surface, wait for it to close
//! 4. ShuttingDown: graceful stop, grace period, force kill
//!
//! Step 4 runs on every route out of steps 2 and 3, including failures and
//! interrupts. A panic or a dropped supervisor future still kills the child via
//! the guard's `Drop`.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use tokio::process::Command;

use crate::config::ServerConfig;
use crate::probe::{ProbeConfig, wait_for_port};
use crate::process::{ChildGuard, DEFAULT_GRACE_PERIOD};
use crate::signal::{ShutdownSignal, ShutdownSignals};
use crate::surface::{PresentationSurface, WindowSpec};

/// How long the server gets to start accepting connections.
pub const DEFAULT_READY_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Idle,
    Launching,
    Probing,
    Ready,
    Failed,
    ShuttingDown,
    Terminated,
}

#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("server program not found at {}", .0.display())]
    MissingProgram(PathBuf),
    #[error("server entry point not found at {}", .0.display())]
    MissingEntryPoint(PathBuf),
    #[error("failed to spawn server: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("server did not become reachable at {url} within {}s", .timeout.as_secs_f64())]
    NotReady { url: String, timeout: Duration },
    #[error("server exited unexpectedly ({0})")]
    ChildExited(ExitStatus),
    #[error("presentation surface failed: {0}")]
    Surface(#[source] std::io::Error),
    #[error("failed to install signal handlers: {0}")]
    Signals(#[source] std::io::Error),
    #[error("interrupted by {0:?}")]
    Interrupted(ShutdownSignal),
}

impl SupervisorError {
    /// Process exit code for the supervisor binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            SupervisorError::Interrupted(signal) => signal.exit_code(),
            _ => 1,
        }
    }
}

/// How to launch and present the request server.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Executable to run (an interpreter, or the server binary itself).
    pub program: PathBuf,
    /// Script passed to `program` first, when the server is a script.
    pub entry_point: Option<PathBuf>,
    /// Arguments placed before `--host`/`--port`.
    pub args: Vec<String>,
    /// Working directory of the server process.
    pub root: PathBuf,
    pub server: ServerConfig,
    pub ready_timeout: Duration,
    pub grace_period: Duration,
    pub probe: ProbeConfig,
    pub window: WindowSpec,
}

impl SupervisorConfig {
    pub fn new(program: impl Into<PathBuf>, root: impl Into<PathBuf>, server: ServerConfig) -> Self {
        Self {
            program: program.into(),
            entry_point: None,
            args: Vec::new(),
            root: root.into(),
            server,
            ready_timeout: DEFAULT_READY_TIMEOUT,
            grace_period: DEFAULT_GRACE_PERIOD,
            probe: ProbeConfig::default(),
            window: WindowSpec::default(),
        }
    }

    pub fn with_entry_point(mut self, entry_point: impl Into<PathBuf>) -> Self {
        self.entry_point = Some(entry_point.into());
        self
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_ready_timeout(mut self, timeout: Duration) -> Self {
        self.ready_timeout = timeout;
        self
    }

    pub fn with_grace_period(mut self, grace: Duration) -> Self {
        self.grace_period = grace;
        self
    }

    pub fn with_window(mut self, window: WindowSpec) -> Self {
        self.window = window;
        self
    }
}

pub struct Supervisor {
    config: SupervisorConfig,
    state: SupervisorState,
    history: Vec<SupervisorState>,
}

impl Supervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        Self {
            config,
            state: SupervisorState::Idle,
            history: vec![SupervisorState::Idle],
        }
    }

    pub fn state(&self) -> SupervisorState {
        self.state
    }

    /// Every state entered so far, in order.
    pub fn history(&self) -> &[SupervisorState] {
        &self.history
    }

    /// Run the full lifecycle; SIGINT, SIGTERM or SIGHUP interrupt it.
    ///
    /// Handlers are installed before the server is launched, so a signal can
    /// never take the default action while a child is running.
    pub async fn run(&mut self, surface: &dyn PresentationSurface) -> Result<(), SupervisorError> {
        let mut signals = ShutdownSignals::install().map_err(SupervisorError::Signals)?;
        self.run_until(surface, signals.recv()).await
    }

    /// Run the full lifecycle; `interrupt` resolving moves straight to shutdown.
    pub async fn run_until(
        &mut self,
        surface: &dyn PresentationSurface,
        interrupt: impl Future<Output = ShutdownSignal>,
    ) -> Result<(), SupervisorError> {
        tokio::pin!(interrupt);

        self.transition(SupervisorState::Launching);
        let mut guard = match self.launch() {
            Ok(guard) => guard,
            Err(e) => {
                tracing::error!(target: "agentdock::supervisor", error = %e, "Launch failed");
                self.transition(SupervisorState::Failed);
                self.transition(SupervisorState::Terminated);
                return Err(e);
            }
        };

        let outcome = self.supervise(&mut guard, surface, interrupt.as_mut()).await;
        match &outcome {
            Ok(()) => {}
            Err(SupervisorError::Interrupted(signal)) => {
                tracing::info!(target: "agentdock::supervisor", ?signal, "Interrupted, shutting down")
            }
            Err(e) => {
                tracing::error!(target: "agentdock::supervisor", error = %e, "Supervision failed");
                self.transition(SupervisorState::Failed);
            }
        }

        self.transition(SupervisorState::ShuttingDown);
        match guard.shutdown(self.config.grace_period).await {
            Ok(status) => {
                tracing::info!(target: "agentdock::supervisor", ?status, "Server stopped")
            }
            Err(e) => {
                tracing::error!(target: "agentdock::supervisor", error = %e, "Failed to stop server")
            }
        }
        self.transition(SupervisorState::Terminated);
        outcome
    }

    fn launch(&self) -> Result<ChildGuard, SupervisorError> {
        let config = &self.config;
        if !config.program.exists() {
            return Err(SupervisorError::MissingProgram(config.program.clone()));
        }
        if let Some(entry) = &config.entry_point
            && !entry.exists()
        {
            return Err(SupervisorError::MissingEntryPoint(entry.clone()));
        }

        let mut cmd = Command::new(&config.program);
        if let Some(entry) = &config.entry_point {
            cmd.arg(entry);
        }
        cmd.args(&config.args)
            .arg("--host")
            .arg(&config.server.host)
            .arg("--port")
            .arg(config.server.port.to_string())
            .current_dir(&config.root)
            .stdin(Stdio::null());

        let guard = ChildGuard::spawn(&mut cmd, "server").map_err(SupervisorError::Spawn)?;
        tracing::info!(
            target: "agentdock::supervisor",
            pid = ?guard.id(),
            program = %config.program.display(),
            "Server launched"
        );
        Ok(guard)
    }

    async fn supervise<F>(
        &mut self,
        guard: &mut ChildGuard,
        surface: &dyn PresentationSurface,
        mut interrupt: Pin<&mut F>,
    ) -> Result<(), SupervisorError>
    where
        F: Future<Output = ShutdownSignal>,
    {
        self.transition(SupervisorState::Probing);
        let server = self.config.server.clone();
        let url = server.url();

        let ready = tokio::select! {
            ready = wait_for_port(&server.host, server.port, self.config.ready_timeout, self.config.probe) => ready,
            status = guard.wait() => return Err(exited(status)),
            signal = interrupt.as_mut() => return Err(SupervisorError::Interrupted(signal)),
        };
        if !ready {
            return Err(SupervisorError::NotReady {
                url,
                timeout: self.config.ready_timeout,
            });
        }

        self.transition(SupervisorState::Ready);
        tokio::select! {
            presented = surface.present(&url, &self.config.window) => {
                presented.map_err(SupervisorError::Surface)?;
                tracing::info!(target: "agentdock::supervisor", "Surface closed");
                Ok(())
            }
            status = guard.wait() => Err(exited(status)),
            signal = interrupt.as_mut() => Err(SupervisorError::Interrupted(signal)),
        }
    }

    fn transition(&mut self, next: SupervisorState) {
        tracing::debug!(target: "agentdock::supervisor", from = ?self.state, to = ?next, "State change");
        self.state = next;
        self.history.push(next);
    }
}

fn exited(status: std::io::Result<ExitStatus>) -> SupervisorError {
    match status {
        Ok(status) => SupervisorError::ChildExited(status),
        Err(e) => SupervisorError::Spawn(e),
    }
}
