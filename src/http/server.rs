use super::handlers::live_sessions;
use super::routes::create_router;
use super::state::AppState;
use crate::config::ServerConfig;
use crate::engine::EngineFactory;
use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Bind the configured address and serve until Ctrl-C
pub async fn serve(config: ServerConfig, engines: Arc<dyn EngineFactory>) -> Result<()> {
    let addr = format!("{}:{}", config.bind, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve_with_shutdown(listener, AppState::new(config, engines), shutdown_signal()).await
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_with_shutdown<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!(
        "Avatar stream server listening on ws://{}{}",
        addr, state.config.ws_path
    );

    let app = create_router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .context("HTTP server failed")?;

    info!(
        "Server stopped with {} session(s) still open",
        live_sessions(&state).await
    );
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl-C, shutting down"),
        Err(e) => {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await
        }
    }
}
