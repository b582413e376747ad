//! StorageNode's `Storage` RPC listener: accept, serve, and delete chunk
//! blobs. Task-per-connection, the same accept-loop-plus-`tokio::spawn`
//! shape `api/server.rs` uses one layer up the stack.

use crate::storage::{LocalStorage, Storage};
use crate::wire;
use crate::wire::rpc::{self, Request, Response, StreamFrame, WireError};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

/// Binds `port` and serves the `Storage` RPC surface against `storage`
/// until the process exits.
pub async fn serve(port: u16, storage: Arc<LocalStorage>) -> std::io::Result<()> {
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "storage service listening");
    serve_listener(listener, storage).await
}

/// Serves the `Storage` RPC surface on an already-bound listener. Split out
/// from `serve` so tests can bind an ephemeral port (`0`), read back the
/// assigned address, and only then start accepting.
pub async fn serve_listener(
    listener: TcpListener,
    storage: Arc<LocalStorage>,
) -> std::io::Result<()> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let storage = Arc::clone(&storage);
        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, storage).await {
                warn!(%peer, error = %e, "connection handler exited with error");
            }
        });
    }
}

async fn handle_connection(
    socket: tokio::net::TcpStream,
    storage: Arc<LocalStorage>,
) -> crate::core::Result<()> {
    let mut stream = wire::frame(socket);
    let request = match rpc::recv::<Request>(&mut stream).await? {
        Some(r) => r,
        None => return Ok(()), // peer closed without sending anything
    };

    match request {
        Request::Store(file_info) => handle_store(&mut stream, &storage, &file_info.file_id).await,
        Request::Retrieve(file_info) => {
            handle_retrieve(&mut stream, &storage, &file_info.file_id).await
        }
        Request::Delete(file_info) => {
            handle_delete(&mut stream, &storage, &file_info.file_id).await
        }
        Request::Heartbeat(_) => {
            // A storage node never receives heartbeats; reject politely.
            rpc::send(
                &mut stream,
                &Response::Err(WireError::Internal(
                    "storage node does not accept heartbeats".to_string(),
                )),
            )
            .await
        }
    }
}

async fn handle_store(
    stream: &mut wire::WireStream,
    storage: &LocalStorage,
    chunk_id: &str,
) -> crate::core::Result<()> {
    let mut writer = match storage.begin_store(chunk_id).await {
        Ok(w) => w,
        Err(e) => {
            warn!(chunk_id, error = %e, "store rejected");
            return rpc::send(stream, &Response::Err(WireError::from(&e))).await;
        }
    };
    rpc::send(stream, &Response::Ack).await?;

    loop {
        match rpc::recv_required::<StreamFrame>(stream).await {
            Ok(StreamFrame::Data(data)) => {
                if let Err(e) = writer.write_frame(&data).await {
                    error!(chunk_id, error = %e, "write failed mid-stream");
                    writer.abort().await;
                    return rpc::send(stream, &Response::Err(WireError::from(&e))).await;
                }
            }
            Ok(StreamFrame::End) => break,
            Err(e) => {
                writer.abort().await;
                return Err(e);
            }
        }
    }

    match writer.finish().await {
        Ok(()) => {
            info!(chunk_id, "accept chunk done");
            rpc::send(stream, &Response::Ack).await
        }
        Err(e) => rpc::send(stream, &Response::Err(WireError::from(&e))).await,
    }
}

async fn handle_retrieve(
    stream: &mut wire::WireStream,
    storage: &LocalStorage,
    chunk_id: &str,
) -> crate::core::Result<()> {
    let mut reader = match storage.begin_retrieve(chunk_id).await {
        Ok(r) => r,
        Err(e) => {
            warn!(chunk_id, error = %e, "retrieve chunk failed");
            return rpc::send(stream, &Response::Err(WireError::from(&e))).await;
        }
    };

    rpc::send(stream, &Response::Streaming).await?;
    loop {
        match reader.read_frame().await {
            Ok(Some(data)) => {
                rpc::send(stream, &StreamFrame::Data(data)).await?;
            }
            Ok(None) => break,
            Err(e) => {
                error!(chunk_id, error = %e, "read failed mid-stream");
                return Err(e);
            }
        }
    }
    rpc::send(stream, &StreamFrame::End).await?;
    info!(chunk_id, "retrieve chunk done");
    Ok(())
}

async fn handle_delete(
    stream: &mut wire::WireStream,
    storage: &LocalStorage,
    chunk_id: &str,
) -> crate::core::Result<()> {
    match storage.delete_chunk(chunk_id).await {
        Ok(()) => {
            info!(chunk_id, "delete chunk done");
            rpc::send(stream, &Response::Ack).await
        }
        Err(e) => rpc::send(stream, &Response::Err(WireError::from(&e))).await,
    }
}

