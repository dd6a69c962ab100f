//! Launcher configuration.
//!
//! Every component receives the piece of configuration it needs at construction
//! time. Nothing reads paths, hosts or ports from process-wide state, so tests can
//! point components at temporary directories and ephemeral ports.

use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default wall-clock budget for one worker invocation.
pub const DEFAULT_WORKER_TIMEOUT: Duration = Duration::from_secs(900);

/// Default cap on captured bytes per worker output stream (10 MiB).
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 10 * 1024 * 1024;

/// Default host the request server binds to.
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default port the request server binds to.
pub const DEFAULT_PORT: u16 = 8765;

/// Address the request server listens on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

impl ServerConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `http://host:port` as handed to the presentation surface.
    pub fn url(&self) -> String {
        if self.host.contains(':') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }
}

/// How to run the worker program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Interpreter executable (the venv python by default).
    pub interpreter: PathBuf,
    /// Script handed to the interpreter.
    pub entry_point: PathBuf,
    /// Working directory of every worker process.
    pub root: PathBuf,
    pub timeout: Duration,
    /// Bytes kept per stream; the rest is read, discarded and flagged.
    pub max_output_bytes: usize,
}

impl WorkerConfig {
    /// Worker layout under `root`: `.venv` interpreter and `main.py`.
    pub fn for_root(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            interpreter: root.join(default_interpreter()),
            entry_point: root.join("main.py"),
            root,
            timeout: DEFAULT_WORKER_TIMEOUT,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }

    pub fn with_interpreter(mut self, interpreter: impl AsRef<Path>) -> Self {
        self.interpreter = resolve(&self.root, interpreter.as_ref());
        self
    }

    pub fn with_entry_point(mut self, entry_point: impl AsRef<Path>) -> Self {
        self.entry_point = resolve(&self.root, entry_point.as_ref());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_output_bytes(mut self, max: usize) -> Self {
        self.max_output_bytes = max;
        self
    }
}

/// Top-level configuration shared by the server, the supervisor and `run`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherConfig {
    pub root: PathBuf,
    pub worker: WorkerConfig,
    /// TOML file inspected by the pre-flight check.
    pub config_path: PathBuf,
    pub server: ServerConfig,
}

impl LauncherConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            worker: WorkerConfig::for_root(&root),
            config_path: root.join("config").join("config.toml"),
            server: ServerConfig::default(),
            root,
        }
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn with_config_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config_path = resolve(&self.root, path.as_ref());
        self
    }

    pub fn with_server(mut self, server: ServerConfig) -> Self {
        self.server = server;
        self
    }
}

fn default_interpreter() -> PathBuf {
    if cfg!(windows) {
        Path::new(".venv").join("Scripts").join("python.exe")
    } else {
        Path::new(".venv").join("bin").join("python")
    }
}

/// Relative paths are taken relative to the launcher root, not the caller's cwd.
fn resolve(root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        root.join(path)
    }
}
