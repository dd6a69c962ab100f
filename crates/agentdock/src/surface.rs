//! Presentation surfaces the supervisor hands the server URL to.
//!
//! The surface owns the user-facing lifetime: `present` returns when the user
//! closes it, and the supervisor then tears the server down.

use std::io;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::process::{ChildGuard, DEFAULT_GRACE_PERIOD};

/// Window geometry and title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub min_width: u32,
    pub min_height: u32,
}

impl Default for WindowSpec {
    fn default() -> Self {
        Self {
            title: "agentdock".to_string(),
            width: 1280,
            height: 860,
            min_width: 980,
            min_height: 680,
        }
    }
}

/// Something that shows the launcher page and blocks until it is closed.
#[async_trait]
pub trait PresentationSurface: Send + Sync {
    async fn present(&self, url: &str, window: &WindowSpec) -> io::Result<()>;
}

/// Runs an external viewer (a webview shell, a browser in app mode) and waits
/// for it to exit.
///
/// Arguments may contain `{url}`, `{title}`, `{width}`, `{height}`,
/// `{min_width}` and `{min_height}`. If no argument mentions `{url}` the URL is
/// appended.
#[derive(Debug, Clone)]
pub struct CommandSurface {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandSurface {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    fn expand_args(&self, url: &str, window: &WindowSpec) -> Vec<String> {
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                arg.replace("{url}", url)
                    .replace("{title}", &window.title)
                    .replace("{min_width}", &window.min_width.to_string())
                    .replace("{min_height}", &window.min_height.to_string())
                    .replace("{width}", &window.width.to_string())
                    .replace("{height}", &window.height.to_string())
            })
            .collect();
        if !self.args.iter().any(|arg| arg.contains("{url}")) {
            args.push(url.to_string());
        }
        args
    }
}

#[async_trait]
impl PresentationSurface for CommandSurface {
    async fn present(&self, url: &str, window: &WindowSpec) -> io::Result<()> {
        let args = self.expand_args(url, window);
        tracing::info!(program = %self.program.display(), ?args, "Opening viewer");

        let mut cmd = Command::new(&self.program);
        cmd.args(&args).stdin(Stdio::null());
        let mut guard = ChildGuard::spawn(&mut cmd, "viewer")?;

        // If the supervisor is interrupted this future is dropped and the
        // guard kills the viewer.
        let status = guard.wait().await?;
        guard.shutdown(DEFAULT_GRACE_PERIOD).await?;
        tracing::info!(?status, "Viewer closed");
        Ok(())
    }
}

/// No window: log the URL and wait for Ctrl+C.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessSurface;

#[async_trait]
impl PresentationSurface for HeadlessSurface {
    async fn present(&self, url: &str, window: &WindowSpec) -> io::Result<()> {
        tracing::info!(%url, title = %window.title, "Launcher ready, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await
    }
}
