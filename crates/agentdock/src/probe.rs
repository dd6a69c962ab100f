//! Readiness probing: poll a TCP port until it accepts connections.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::time::Instant;

/// Polling parameters for [`wait_for_port`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeConfig {
    /// Upper bound on a single connect attempt.
    pub attempt_timeout: Duration,
    /// Pause between failed attempts.
    pub interval: Duration,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(1),
            interval: Duration::from_millis(200),
        }
    }
}

/// Poll `host:port` until a connect succeeds or `deadline` has elapsed.
///
/// Each attempt opens and immediately drops its own connection. Returns `false`
/// on timeout instead of erroring so the caller decides what failure means.
pub async fn wait_for_port(host: &str, port: u16, deadline: Duration, config: ProbeConfig) -> bool {
    let give_up_at = Instant::now() + deadline;
    let mut attempts: u32 = 0;

    loop {
        let remaining = give_up_at.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            tracing::debug!(host, port, attempts, "Port never became ready");
            return false;
        }

        attempts += 1;
        let attempt = config.attempt_timeout.min(remaining);
        match tokio::time::timeout(attempt, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                drop(stream);
                tracing::debug!(host, port, attempts, "Port ready");
                return true;
            }
            Ok(Err(e)) => tracing::trace!(host, port, error = %e, "Connect refused"),
            Err(_) => tracing::trace!(host, port, "Connect attempt timed out"),
        }

        let remaining = give_up_at.saturating_duration_since(Instant::now());
        tokio::time::sleep(config.interval.min(remaining)).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    /// A port that was free a moment ago.
    async fn free_port() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn ready_immediately_when_listening() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let started = std::time::Instant::now();
        assert!(wait_for_port("127.0.0.1", port, Duration::from_secs(5), ProbeConfig::default()).await);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn gives_up_after_deadline_without_listener() {
        let port = free_port().await;
        let config = ProbeConfig::default();
        let deadline = Duration::from_millis(800);

        let started = std::time::Instant::now();
        assert!(!wait_for_port("127.0.0.1", port, deadline, config).await);

        let elapsed = started.elapsed();
        assert!(elapsed >= deadline, "returned early: {elapsed:?}");
        assert!(
            elapsed < deadline + config.interval + Duration::from_millis(200),
            "overshot: {elapsed:?}"
        );
    }

    #[tokio::test]
    async fn sees_listener_bound_before_deadline() {
        let port = free_port().await;

        let binder = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(700)).await;
            let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
            // Keep it open while the prober connects.
            tokio::time::sleep(Duration::from_secs(3)).await;
            drop(listener);
        });

        let deadline = Duration::from_secs(2);
        let started = std::time::Instant::now();
        assert!(wait_for_port("127.0.0.1", port, deadline, ProbeConfig::default()).await);
        assert!(started.elapsed() < deadline);
        binder.abort();
    }

    #[tokio::test]
    async fn zero_deadline_is_not_ready() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        assert!(!wait_for_port("127.0.0.1", port, Duration::ZERO, ProbeConfig::default()).await);
    }
}
