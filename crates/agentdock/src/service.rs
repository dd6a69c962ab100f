//! LauncherService: transport-agnostic request handling.
//!
//! Owns the read-only launcher configuration and the worker invoker. Handlers
//! share one `Arc<LauncherService>`; nothing here is mutable, so concurrent
//! submissions never contend on a lock while their workers run.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::LauncherConfig;
use crate::invoker::{InvocationResult, TaskText, WorkerInvoker};
use crate::preflight::{ValidationReport, check_llm_config};

/// Exit code rendered for a submission with no task text.
pub const EXIT_EMPTY_PROMPT: i32 = 1;

/// What a submission produced, ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Trimmed task text echoed back into the form.
    pub prompt: String,
    pub result: InvocationResult,
}

pub struct LauncherService {
    config: LauncherConfig,
    invoker: WorkerInvoker,
}

impl LauncherService {
    pub fn new(config: LauncherConfig) -> Self {
        let invoker = WorkerInvoker::new(config.worker.clone());
        Self { config, invoker }
    }

    pub fn config(&self) -> &LauncherConfig {
        &self.config
    }

    pub fn worker_timeout(&self) -> Duration {
        self.config.worker.timeout
    }

    /// Fresh pre-flight report; the config file is re-read every time.
    pub async fn status(&self) -> ValidationReport {
        let path: PathBuf = self.config.config_path.clone();
        match tokio::task::spawn_blocking(move || check_llm_config(&path)).await {
            Ok(report) => report,
            Err(e) => {
                tracing::error!(error = %e, "Pre-flight check panicked");
                ValidationReport {
                    ok: false,
                    message: format!("parse error: {e}"),
                }
            }
        }
    }

    /// Run one submission to completion.
    ///
    /// Blank task text short-circuits with exit code 1 and no worker spawn.
    pub async fn submit(&self, raw_prompt: &str) -> Submission {
        let Some(task) = TaskText::parse(raw_prompt) else {
            tracing::debug!("Rejecting empty prompt");
            return Submission {
                prompt: String::new(),
                result: InvocationResult {
                    exit_code: EXIT_EMPTY_PROMPT,
                    output: "empty prompt".to_string(),
                },
            };
        };

        let result = self.invoker.invoke(&task, self.worker_timeout()).await;
        Submission {
            prompt: task.as_str().to_string(),
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service_in(dir: &std::path::Path) -> LauncherService {
        LauncherService::new(LauncherConfig::new(dir))
    }

    #[tokio::test]
    async fn status_reflects_config_edits() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());

        let report = service.status().await;
        assert!(!report.ok);
        assert_eq!(report.message, "config not found");

        std::fs::create_dir_all(dir.path().join("config")).unwrap();
        std::fs::write(
            dir.path().join("config/config.toml"),
            "[llm]\napi_key = \"sk-test\"\n",
        )
        .unwrap();
        assert!(service.status().await.ok);
    }

    #[tokio::test]
    async fn blank_submission_short_circuits() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());

        let submission = service.submit("  \n\t ").await;
        assert_eq!(submission.result.exit_code, EXIT_EMPTY_PROMPT);
        assert_eq!(submission.result.output, "empty prompt");
        assert!(submission.prompt.is_empty());
    }

    #[tokio::test]
    async fn submission_without_environment_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let service = service_in(dir.path());

        let submission = service.submit(" hello ").await;
        assert_eq!(submission.prompt, "hello");
        assert_eq!(
            submission.result.exit_code,
            crate::invoker::EXIT_UNAVAILABLE
        );
        assert!(submission.result.output.contains("interpreter not found"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn blank_submission_spawns_no_worker() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.sh"), "touch spawned\n").unwrap();
        let config = LauncherConfig::new(dir.path()).with_worker(
            crate::config::WorkerConfig::for_root(dir.path())
                .with_interpreter("/bin/sh")
                .with_entry_point("main.sh"),
        );
        let service = LauncherService::new(config);

        assert_eq!(service.submit("").await.result.exit_code, EXIT_EMPTY_PROMPT);
        assert!(!dir.path().join("spawned").exists());

        assert_eq!(service.submit("go").await.result.exit_code, 0);
        assert!(dir.path().join("spawned").exists());
    }
}
