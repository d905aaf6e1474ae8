use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use courier_messenger::authorization::TokenVerifier;
use courier_messenger::data_access::DataAccess;
use courier_messenger::messenger::Messenger;

use crate::routing::build_router;
use crate::state::AppState;

/// Serves HTTP and WebSocket traffic on `addr` until `shutdown` is cancelled.
/// Every socket loop watches the same token and closes its socket; the
/// registry is emptied once shutdown starts.
pub async fn run_server<D: DataAccess, A: TokenVerifier>(
    addr: &str,
    messenger: Messenger<D, A>,
    shutdown: CancellationToken,
) -> Result<()> {
    let state = AppState::new(messenger, shutdown.clone());
    let registry = state.registry.clone();
    let router = build_router(state);

    let listener = TcpListener::bind(addr).await.with_context(|| format!("Couldn't bind {addr}"))?;
    tracing::info!(addr, "listening");

    let on_shutdown = {
        let shutdown = shutdown.clone();
        async move {
            shutdown.cancelled().await;
            tracing::info!(online = registry.list_online().len(), "shutting down, forgetting sessions");
            registry.close_all();
        }
    };

    axum::serve(listener, router)
        .with_graceful_shutdown(on_shutdown)
        .await
        .context("Server error")?;

    tracing::info!("server stopped");
    Ok(())
}
