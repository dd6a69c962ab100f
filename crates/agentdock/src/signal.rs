//! Process signals that end the launcher.
//!
//! Every long-running entry point (`serve`, `desktop`, `run`) waits on the same
//! set so that a terminal Ctrl+C, a service manager's SIGTERM or a closed
//! terminal's SIGHUP all unwind through the child guards instead of killing the
//! launcher with the default action.

use std::io;

/// Which signal asked the launcher to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownSignal {
    Interrupt,
    Terminate,
    Hangup,
}

impl ShutdownSignal {
    /// Conventional shell exit code, 128 + signal number.
    pub fn exit_code(self) -> i32 {
        match self {
            ShutdownSignal::Hangup => 129,
            ShutdownSignal::Interrupt => 130,
            ShutdownSignal::Terminate => 143,
        }
    }
}

/// Installed handlers for the shutdown signals.
///
/// Handlers are registered in [`ShutdownSignals::install`], so a signal that
/// arrives between installing and awaiting [`ShutdownSignals::recv`] is not lost
/// and does not fall back to the default action.
#[derive(Debug)]
pub struct ShutdownSignals {
    #[cfg(unix)]
    interrupt: tokio::signal::unix::Signal,
    #[cfg(unix)]
    terminate: tokio::signal::unix::Signal,
    #[cfg(unix)]
    hangup: tokio::signal::unix::Signal,
}

impl ShutdownSignals {
    #[cfg(unix)]
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{SignalKind, signal};

        Ok(Self {
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> io::Result<Self> {
        Ok(Self {})
    }

    /// Wait for the next shutdown signal.
    #[cfg(unix)]
    pub async fn recv(&mut self) -> ShutdownSignal {
        let received = tokio::select! {
            _ = self.interrupt.recv() => ShutdownSignal::Interrupt,
            _ = self.terminate.recv() => ShutdownSignal::Terminate,
            _ = self.hangup.recv() => ShutdownSignal::Hangup,
        };
        tracing::info!(signal = ?received, "Received shutdown signal");
        received
    }

    #[cfg(not(unix))]
    pub async fn recv(&mut self) -> ShutdownSignal {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C");
        ShutdownSignal::Interrupt
    }
}

/// Wait for SIGINT, SIGTERM or SIGHUP.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed, which only happens when the
/// tokio runtime is misconfigured. That should fail fast at startup.
pub async fn shutdown_signal() -> ShutdownSignal {
    ShutdownSignals::install()
        .expect("failed to install signal handlers - is tokio runtime configured correctly?")
        .recv()
        .await
}
