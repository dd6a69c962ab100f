//! Scoped ownership of spawned child processes.
//!
//! A [`ChildGuard`] is the only owner of a child handle. Owners end its life with
//! [`ChildGuard::shutdown`] (graceful signal, grace period, force kill, reap). If a
//! guard is dropped while the child is still running (early return, panic, task
//! cancellation) the child is force-killed in `Drop`.
//!
//! On Unix children are spawned as leaders of their own process group and every
//! signal goes to the whole group, so grandchildren (a shell's `sleep`, a worker's
//! browser) go down with them.

use std::io;
use std::process::ExitStatus;
use std::time::Duration;

use tokio::process::{Child, Command};

/// Grace period between the polite stop signal and the force kill.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Owner of one spawned child process.
#[derive(Debug)]
pub struct ChildGuard {
    child: Option<Child>,
    /// Captured at spawn; tokio forgets the id once the child is reaped.
    pid: Option<u32>,
    label: &'static str,
}

impl ChildGuard {
    /// Spawn `cmd` as the leader of a fresh process group and take ownership.
    pub fn spawn(cmd: &mut Command, label: &'static str) -> io::Result<Self> {
        #[cfg(unix)]
        cmd.process_group(0);
        let child = cmd.kill_on_drop(true).spawn()?;
        Ok(Self {
            pid: child.id(),
            child: Some(child),
            label,
        })
    }

    /// OS process id, `None` once the child has been reaped.
    pub fn id(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Mutable access to the handle, e.g. to take its stdout/stderr pipes.
    pub fn child_mut(&mut self) -> Option<&mut Child> {
        self.child.as_mut()
    }

    /// Wait for the child to exit on its own.
    pub async fn wait(&mut self) -> io::Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => child.wait().await,
            None => Err(io::Error::other("child already shut down")),
        }
    }

    /// Non-blocking exit check.
    pub fn try_wait(&mut self) -> io::Result<Option<ExitStatus>> {
        match self.child.as_mut() {
            Some(child) => child.try_wait(),
            None => Err(io::Error::other("child already shut down")),
        }
    }

    /// Stop the child: polite signal, wait up to `grace`, then force kill.
    ///
    /// A stopped child's whole process group is killed once the leader is gone.
    /// Always reaps the child before returning. Returns the exit status the child
    /// ended with, or `None` if it had already been shut down.
    pub async fn shutdown(mut self, grace: Duration) -> io::Result<Option<ExitStatus>> {
        let Some(mut child) = self.child.take() else {
            return Ok(None);
        };
        let label = self.label;
        let pid = self.pid;

        // A child that exited on its own is not being stopped; whatever it
        // detached into its group is left alone.
        if let Some(status) = child.try_wait()? {
            tracing::debug!(label, ?status, "Child already exited");
            return Ok(Some(status));
        }

        tracing::debug!(label, ?pid, "Sending graceful stop to child");
        if !kill_group(pid, Signal::Term) {
            // No polite signal on this platform, go straight to the kill.
            let _ = child.start_kill();
        }

        let status = match tokio::time::timeout(grace, child.wait()).await {
            Ok(status) => status?,
            Err(_) => {
                tracing::warn!(
                    label,
                    grace_secs = grace.as_secs_f64(),
                    "Child ignored graceful stop, killing"
                );
                kill_group(pid, Signal::Kill);
                if let Err(e) = child.start_kill() {
                    tracing::debug!(label, error = %e, "start_kill after group kill");
                }
                child.wait().await?
            }
        };

        // The leader is gone; take down anything it left behind in its group.
        kill_group(pid, Signal::Kill);
        tracing::debug!(label, ?status, "Child stopped");
        Ok(Some(status))
    }
}

impl Drop for ChildGuard {
    fn drop(&mut self) {
        let Some(child) = self.child.as_mut() else {
            return;
        };
        if matches!(child.try_wait(), Ok(Some(_))) {
            return;
        }
        tracing::warn!(label = self.label, pid = ?self.pid, "Dropping live child, killing");
        kill_group(self.pid, Signal::Kill);
        let _ = child.start_kill();
    }
}

#[derive(Debug, Clone, Copy)]
enum Signal {
    Term,
    Kill,
}

/// Signal the process group led by `pid`. Returns false where unsupported.
#[cfg(unix)]
fn kill_group(pid: Option<u32>, signal: Signal) -> bool {
    use nix::sys::signal::{self, killpg};
    use nix::unistd::Pid;

    let Some(pid) = pid else {
        return true;
    };
    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    let sig = match signal {
        Signal::Term => signal::Signal::SIGTERM,
        Signal::Kill => signal::Signal::SIGKILL,
    };
    match killpg(Pid::from_raw(raw), sig) {
        Ok(()) => true,
        // Group already empty.
        Err(nix::errno::Errno::ESRCH) => true,
        Err(e) => {
            tracing::debug!(pid = raw, error = %e, "killpg failed");
            false
        }
    }
}

#[cfg(not(unix))]
fn kill_group(_pid: Option<u32>, _signal: Signal) -> bool {
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Stdio;

    fn spawn_sh(script: &str) -> ChildGuard {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", script]).stdout(Stdio::null());
        ChildGuard::spawn(&mut cmd, "test").unwrap()
    }

    fn is_alive(pid: u32) -> bool {
        nix::sys::signal::kill(nix::unistd::Pid::from_raw(pid as i32), None).is_ok()
    }

    #[tokio::test]
    async fn shutdown_stops_a_cooperative_child() {
        let guard = spawn_sh("exec sleep 30");
        let pid = guard.id().unwrap();

        let status = guard.shutdown(Duration::from_secs(5)).await.unwrap();
        assert!(!status.unwrap().success());
        assert!(!is_alive(pid));
    }

    #[tokio::test]
    async fn shutdown_escalates_when_term_is_ignored() {
        let guard = spawn_sh("trap '' TERM; while true; do sleep 0.1; done");
        let pid = guard.id().unwrap();
        // Give the shell time to install its trap.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let started = std::time::Instant::now();
        guard.shutdown(Duration::from_millis(300)).await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(!is_alive(pid));
    }

    #[tokio::test]
    async fn shutdown_after_exit_returns_status() {
        let mut guard = spawn_sh("exit 7");
        let status = guard.wait().await.unwrap();
        assert_eq!(status.code(), Some(7));

        let status = guard.shutdown(DEFAULT_GRACE_PERIOD).await.unwrap();
        assert_eq!(status.and_then(|s| s.code()), Some(7));
    }

    #[tokio::test]
    async fn drop_kills_running_child() {
        let guard = spawn_sh("exec sleep 30");
        let pid = guard.id().unwrap();
        drop(guard);

        // The signal is delivered immediately; the runtime reaps the zombie later.
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        loop {
            let gone = !is_alive(pid)
                || std::fs::read_to_string(format!("/proc/{pid}/stat"))
                    .map(|s| s.contains(") Z "))
                    .unwrap_or(true);
            if gone {
                break;
            }
            assert!(std::time::Instant::now() < deadline, "child survived drop");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    #[tokio::test]
    async fn shutdown_after_exit_leaves_group_alone() {
        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("helper");
        let mut guard = spawn_sh(&format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > {}",
            helper.display()
        ));
        guard.wait().await.unwrap();
        guard.shutdown(DEFAULT_GRACE_PERIOD).await.unwrap();

        let pid: u32 = std::fs::read_to_string(&helper)
            .unwrap()
            .trim()
            .parse()
            .unwrap();
        assert!(is_alive(pid));
        let _ = nix::sys::signal::kill(
            nix::unistd::Pid::from_raw(pid as i32),
            nix::sys::signal::Signal::SIGKILL,
        );
    }

    #[tokio::test]
    async fn shutdown_takes_down_the_group_when_stopping() {
        let dir = tempfile::tempdir().unwrap();
        let helper = dir.path().join("helper");
        let guard = spawn_sh(&format!(
            "sleep 30 >/dev/null 2>&1 & echo $! > {}; exec sleep 30",
            helper.display()
        ));
        while !helper.exists() {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        // The file may exist before the pid is flushed into it.
        tokio::time::sleep(Duration::from_millis(50)).await;
        let pid: u32 = std::fs::read_to_string(&helper)
            .unwrap()
            .trim()
            .parse()
            .unwrap();

        guard.shutdown(Duration::from_secs(2)).await.unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while is_alive(pid) && !is_zombie(pid) {
            assert!(std::time::Instant::now() < deadline, "helper survived shutdown");
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    fn is_zombie(pid: u32) -> bool {
        std::fs::read_to_string(format!("/proc/{pid}/stat"))
            .map(|s| s.contains(") Z "))
            .unwrap_or(true)
    }
}
