//! Runtime lifecycle: bind, serve, reap, and shut down.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::common::AppConfig;
use crate::server::routes;
use crate::server::state::AppState;

/// How long in-flight transfers get to finish after Ctrl+C.
const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// A bound, running server.
pub struct RunningServer {
    pub port: u16,
    /// Cancelling stops accepting connections and drains open ones
    pub shutdown: CancellationToken,
    pub task: JoinHandle<std::io::Result<()>>,
}

fn bind_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([0, 0, 0, 0], port))
}

/// Binds `0.0.0.0:port` and serves `app` in the background.
pub async fn start_server(app: axum::Router, port: u16) -> Result<RunningServer> {
    let listener = TcpListener::bind(bind_addr(port)).await.with_context(|| {
        format!(
            "Failed to bind to port {port} - port already in use.\n\n\
             Is another handoff instance running?\n\
             Or is another service using this port?"
        )
    })?;

    let port = listener.local_addr()?.port();

    let shutdown = CancellationToken::new();
    let serve = axum::serve(listener, app).with_graceful_shutdown(shutdown.clone().cancelled_owned());
    let task = tokio::spawn(async move { serve.await });

    Ok(RunningServer {
        port,
        shutdown,
        task,
    })
}

/// Serve until Ctrl+C, then drain and stop the reaper.
pub async fn run(config: AppConfig) -> Result<()> {
    let state = AppState::new(config)?;

    let root_token = CancellationToken::new();
    let reaper = state.reaper().spawn(root_token.child_token());

    let app = routes::create_router(&state);
    let mut server = start_server(app, state.config.port).await?;
    tracing::info!(port = server.port, "handoff listening");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;
    tracing::info!("Ctrl+C received - initiating graceful shutdown");

    server.shutdown.cancel();
    root_token.cancel();

    // Waiting uploaders can hold connections for minutes; don't wait on them
    match tokio::time::timeout(SHUTDOWN_GRACE, &mut server.task).await {
        Ok(joined) => joined.context("Server task panicked")?.context("Server error")?,
        Err(_) => {
            tracing::warn!("Forced shutdown with connections still open");
            server.task.abort();
        }
    }
    reaper.await.context("Reaper task panicked")?;

    let leftover = state.store().len();
    if leftover > 0 {
        tracing::warn!(sessions = leftover, "shutting down with unreaped sessions");
    }
    tracing::info!("Server shutdown complete");

    Ok(())
}
