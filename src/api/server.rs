use crate::api::routes;
use crate::error::Error;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::info;

/// Serve the health check API on `addr` until `shutdown` fires or its sender is dropped.
///
/// # Errors
///
/// Returns [`Error::IO`] if `addr` can't be bound or serving fails.
pub async fn serve(addr: SocketAddr, mut shutdown: broadcast::Receiver<()>) -> Result<(), Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("health API listening on {}", listener.local_addr()?);
    axum::serve(listener, routes::new())
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
        })
        .await?;
    info!("health API stopped");
    Ok(())
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod server_tests;
