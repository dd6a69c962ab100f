//! agentdock command-line entry points.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use agentdock::config::{DEFAULT_HOST, DEFAULT_PORT};
use agentdock::supervisor::DEFAULT_READY_TIMEOUT;
use agentdock::{
    AGENTDOCK_VERSION, CommandSurface, HeadlessSurface, LauncherConfig, LauncherService,
    PresentationSurface, ServerConfig, ShutdownSignal, ShutdownSignals, Supervisor,
    SupervisorConfig, TaskSource, TaskText, WorkerConfig, WorkerInvoker, check_llm_config,
};

/// Local launcher for a command-line agent worker
#[derive(Parser, Debug)]
#[command(name = "agentdock")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Directory the worker runs in (defaults to the current directory)
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Worker interpreter, relative to the root unless absolute
    #[arg(long, global = true)]
    interpreter: Option<PathBuf>,

    /// Worker entry script, relative to the root unless absolute
    #[arg(long, global = true)]
    entry_point: Option<PathBuf>,

    /// Config file checked before running, relative to the root unless absolute
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the launcher page over HTTP
    Serve {
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// Wall-clock budget for one worker run
        #[arg(long, default_value_t = 900)]
        timeout_secs: u64,
    },
    /// Start the server, wait for it, and open a viewer on it
    Desktop {
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        #[arg(long, default_value_t = DEFAULT_PORT)]
        port: u16,

        /// How long the server gets to start accepting connections
        #[arg(long, default_value_t = DEFAULT_READY_TIMEOUT.as_secs())]
        ready_timeout_secs: u64,

        /// Wall-clock budget for one worker run
        #[arg(long, default_value_t = 900)]
        timeout_secs: u64,

        /// Viewer program; without one the URL is logged and Ctrl+C stops
        #[arg(long)]
        viewer: Option<PathBuf>,

        /// Viewer argument, may use {url}, {title}, {width}, {height}
        #[arg(long = "viewer-arg", allow_hyphen_values = true)]
        viewer_args: Vec<String>,
    },
    /// Run the worker once from the terminal
    Run {
        /// Task text; prompted for on stdin when omitted
        #[arg(short, long)]
        prompt: Option<String>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,

        /// Wall-clock budget for the worker run
        #[arg(long, default_value_t = 900)]
        timeout_secs: u64,
    },
}

fn init_tracing() {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        let base_level = match std::env::var("AGENTDOCK_LOG").as_deref() {
            Ok("debug") => "debug",
            Ok("warn") | Ok("warning") => "warn",
            Ok("error") => "error",
            _ => "info",
        };

        EnvFilter::new(format!(
            "agentdock={level},agentdock_cli={level}",
            level = base_level
        ))
    };

    let use_json = std::env::var("LOG_FORMAT").as_deref() == Ok("json");

    if use_json {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    } else {
        let subscriber = tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr));
        let _ = subscriber.try_init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing();
    tracing::info!(version = AGENTDOCK_VERSION, "Starting agentdock");

    let root = resolve_root(cli.root.as_deref())?;

    match cli.command {
        Command::Serve {
            ref host,
            port,
            timeout_secs,
        } => {
            let server = ServerConfig::new(host.clone(), port);
            let config = launcher_config(&cli, root, timeout_secs).with_server(server.clone());
            let service = Arc::new(LauncherService::new(config));
            agentdock::transport::serve(server, service).await?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Desktop {
            ref host,
            port,
            ready_timeout_secs,
            timeout_secs,
            ref viewer,
            ref viewer_args,
        } => {
            let program = std::env::current_exe().context("failed to locate agentdock binary")?;
            let config = SupervisorConfig::new(program, &root, ServerConfig::new(host.clone(), port))
                .with_args(serve_args(&cli, &root, timeout_secs))
                .with_ready_timeout(Duration::from_secs(ready_timeout_secs));

            let surface: Box<dyn PresentationSurface> = match viewer {
                Some(program) => Box::new(CommandSurface::new(program, viewer_args.clone())),
                None => Box::new(HeadlessSurface),
            };

            let mut supervisor = Supervisor::new(config);
            match supervisor.run(surface.as_ref()).await {
                Ok(()) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    tracing::error!(error = %e, "Desktop launcher failed");
                    Ok(exit_code(e.exit_code()))
                }
            }
        }
        Command::Run {
            ref prompt,
            json,
            timeout_secs,
        } => {
            let config = launcher_config(&cli, root, timeout_secs);
            run_once(config, prompt.clone(), json).await
        }
    }
}

async fn run_once(
    config: LauncherConfig,
    prompt: Option<String>,
    json: bool,
) -> anyhow::Result<ExitCode> {
    let report = check_llm_config(&config.config_path);
    if !report.ok {
        tracing::error!(
            path = %config.config_path.display(),
            message = %report.message,
            "Configuration is not ready"
        );
        return Ok(ExitCode::FAILURE);
    }

    let source = TaskSource::from_flag(prompt);
    let raw = tokio::task::spawn_blocking(move || {
        source.obtain(std::io::stdin().lock(), std::io::stdout())
    })
    .await?
    .context("failed to read prompt")?;

    let Some(task) = TaskText::parse(&raw) else {
        tracing::warn!("empty prompt");
        return Ok(ExitCode::FAILURE);
    };

    // Installed after the prompt is read: until a worker exists the default
    // action is the right way to end on Ctrl+C.
    let mut signals = ShutdownSignals::install().context("failed to install signal handlers")?;
    run_task(&config, &task, json, signals.recv()).await
}

/// Invoke the worker once, or stop it when `interrupt` resolves first.
async fn run_task(
    config: &LauncherConfig,
    task: &TaskText,
    json: bool,
    interrupt: impl Future<Output = ShutdownSignal>,
) -> anyhow::Result<ExitCode> {
    let invoker = WorkerInvoker::new(config.worker.clone());
    let result = tokio::select! {
        result = invoker.invoke(task, config.worker.timeout) => result,
        signal = interrupt => {
            // Dropping the invocation drops its guard, which kills the worker group.
            tracing::warn!(?signal, "Interrupted, worker stopped");
            return Ok(exit_code(signal.exit_code()));
        }
    };
    tracing::info!(exit_code = result.exit_code, "Worker finished");

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", result.output);
    }
    Ok(exit_code(result.exit_code))
}

fn resolve_root(root: Option<&Path>) -> anyhow::Result<PathBuf> {
    let cwd = std::env::current_dir().context("failed to read current directory")?;
    Ok(match root {
        Some(root) => cwd.join(root),
        None => cwd,
    })
}

fn launcher_config(cli: &Cli, root: PathBuf, timeout_secs: u64) -> LauncherConfig {
    let mut worker = WorkerConfig::for_root(&root).with_timeout(Duration::from_secs(timeout_secs));
    if let Some(interpreter) = &cli.interpreter {
        worker = worker.with_interpreter(interpreter);
    }
    if let Some(entry_point) = &cli.entry_point {
        worker = worker.with_entry_point(entry_point);
    }

    let mut config = LauncherConfig::new(root).with_worker(worker);
    if let Some(path) = &cli.config {
        config = config.with_config_path(path);
    }
    config
}

/// Arguments for the `serve` child the desktop supervisor starts. The
/// supervisor appends `--host`/`--port` itself.
fn serve_args(cli: &Cli, root: &Path, timeout_secs: u64) -> Vec<String> {
    let mut args = vec![
        "serve".to_string(),
        "--root".to_string(),
        root.display().to_string(),
        "--timeout-secs".to_string(),
        timeout_secs.to_string(),
    ];
    let overrides = [
        ("--interpreter", &cli.interpreter),
        ("--entry-point", &cli.entry_point),
        ("--config", &cli.config),
    ];
    for (flag, value) in overrides {
        if let Some(value) = value {
            args.push(flag.to_string());
            args.push(value.display().to_string());
        }
    }
    args
}

/// Process exit status for a worker or supervisor code. Codes outside
/// 0..=255 (a signal kill) become 1.
fn exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
