//! agentdock: local launcher that runs an agent worker once per submitted task.

mod version;

pub mod config;
pub mod invoker;
pub mod preflight;
pub mod probe;
pub mod process;
pub mod service;
pub mod signal;
pub mod supervisor;
pub mod surface;
pub mod task_source;
pub mod transport;

pub use config::{LauncherConfig, ServerConfig, WorkerConfig};
pub use invoker::{
    EXIT_SIGNALED, EXIT_TIMEOUT, EXIT_UNAVAILABLE, InvocationResult, InvokeError, TaskText,
    WorkerInvoker,
};
pub use preflight::{ValidationReport, check_llm_config, is_placeholder_key};
pub use probe::{ProbeConfig, wait_for_port};
pub use service::{LauncherService, Submission};
pub use signal::{ShutdownSignal, ShutdownSignals, shutdown_signal};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorError, SupervisorState};
pub use surface::{CommandSurface, HeadlessSurface, PresentationSurface, WindowSpec};
pub use task_source::TaskSource;
pub use version::AGENTDOCK_VERSION;
