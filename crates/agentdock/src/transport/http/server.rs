//! HTTP server implementation.

use std::future::{Future, IntoFuture};
use std::io;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::ServerConfig;
use crate::service::LauncherService;
use crate::signal::shutdown_signal;

use super::routes::routes;

/// Bind to `config` and serve until SIGINT, SIGTERM or SIGHUP.
pub async fn serve(config: ServerConfig, service: Arc<LauncherService>) -> anyhow::Result<()> {
    let listener = bind(&config).await?;
    serve_listener(listener, service, async {
        shutdown_signal().await;
    })
    .await
}

/// Bind the listener; `host` may be a name, an IPv4 or an IPv6 literal.
pub async fn bind(config: &ServerConfig) -> io::Result<TcpListener> {
    TcpListener::bind((config.host.as_str(), config.port)).await
}

/// Serve on an already-bound listener until `shutdown` resolves.
///
/// Shutdown does not wait for in-flight submissions. They are abandoned, and when
/// the runtime shuts down each dropped worker guard kills its process group.
pub async fn serve_listener(
    listener: TcpListener,
    service: Arc<LauncherService>,
    shutdown: impl Future<Output = ()>,
) -> anyhow::Result<()> {
    let actual_addr = listener.local_addr()?;
    let app = routes(service);

    info!("Starting agentdock server on http://{}", actual_addr);

    tokio::select! {
        result = axum::serve(listener, app).into_future() => result?,
        _ = shutdown => {}
    }

    info!("Server shutdown complete");
    Ok(())
}
