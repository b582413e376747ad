//! Binds and serves the client-facing HTTP surface.

use crate::api::handlers::SharedDistributor;
use crate::api::routes::router;
use std::net::SocketAddr;
use tracing::info;

/// Binds `addr` and serves the store/retrieve routes until the process
/// exits or the listener fails.
pub async fn serve(addr: SocketAddr, distributor: SharedDistributor) -> std::io::Result<()> {
    let app = router(distributor);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "api service listening");
    axum::serve(listener, app).await
}
