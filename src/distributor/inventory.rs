//! `StorageInventory` RPC listener: the heartbeat sink storage nodes publish
//! to. Runs alongside the HTTP front-end in `apiservice` (spec.md §4.2).

use crate::chunkmaster::ChunkMaster;
use crate::wire;
use crate::wire::rpc::{self, Request, Response, WireError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Binds `port` and applies every incoming heartbeat to `chunk_master` until
/// the process exits.
pub async fn serve(port: u16, chunk_master: Arc<ChunkMaster>) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "storage inventory listening");
    serve_listener(listener, chunk_master).await
}

/// Serves the `StorageInventory` surface on an already-bound listener. Split
/// out from `serve` so tests can bind an ephemeral port.
pub async fn serve_listener(
    listener: TcpListener,
    chunk_master: Arc<ChunkMaster>,
) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let chunk_master = Arc::clone(&chunk_master);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, chunk_master).await {
                warn!(%peer, error = %e, "inventory connection handler exited with error");
            }
        });
    }
}

async fn handle_connection(
    socket: tokio::net::TcpStream,
    chunk_master: Arc<ChunkMaster>,
) -> crate::core::Result<()> {
    let mut stream = wire::frame(socket);
    let request = match rpc::recv::<Request>(&mut stream).await? {
        Some(r) => r,
        None => return Ok(()),
    };

    match request {
        Request::Heartbeat(info) => {
            let first_contact = !chunk_master.knows_storage(&info.iam);
            chunk_master.update_storage_info(&info.iam, info.available_bytes);
            if first_contact {
                info!(storage_id = %info.iam, "new storage node joined inventory");
            }
            rpc::send(&mut stream, &Response::Ack).await
        }
        _ => {
            rpc::send(
                &mut stream,
                &Response::Err(WireError::Internal(
                    "storage inventory only accepts heartbeats".to_string(),
                )),
            )
            .await
        }
    }
}
