//! Client-side handle to a storage node's `Storage` RPC surface.
//!
//! A fresh TCP connection is opened per call, the way `remotestorage.go`'s
//! `NewRemoteStorage` dials once per `grpc.NewClient` but this protocol has
//! no persistent-channel multiplexing to reuse, so a per-call connection
//! keeps the client dead simple and trivially safe to use from many
//! concurrent requests.

use crate::core::error::{Error, Result};
use crate::wire::rpc::{self, Request, Response, StreamFrame};
use crate::wire::{self, FileInfo};
use std::future::Future;
use std::time::Duration;
use tokio::net::TcpStream;

/// Per-call deadline for a single Storage RPC round trip (connect, request,
/// and its immediate ack/rejection) — spec.md §5's "every RPC carries a
/// deadline", scoped to the handshake rather than an entire multi-frame
/// stream, since a stream's total duration depends on the chunk size a
/// caller picked.
const CALL_DEADLINE: Duration = Duration::from_secs(10);

async fn with_deadline<T>(fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(CALL_DEADLINE, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::DeadlineExceeded),
    }
}

/// A handle to one storage node, identified by its `host:port` address.
#[derive(Debug, Clone)]
pub struct RemoteStorage {
    addr: String,
}

impl RemoteStorage {
    /// Wraps a node's advertised address. No connection is made until a
    /// call is issued.
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    async fn connect(&self) -> Result<wire::WireStream> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .map_err(|e| Error::StorageUnavailable(format!("{}: {e}", self.addr)))?;
        Ok(wire::frame(stream))
    }

    /// Opens a `StoreData` session for `chunk_id`. Fails with
    /// `Error::ChunkAlreadyExists` if the node already holds this id.
    pub async fn open_store(&self, chunk_id: &str) -> Result<StoreSession> {
        with_deadline(async {
            let mut stream = self.connect().await?;
            rpc::send(
                &mut stream,
                &Request::Store(FileInfo {
                    file_id: chunk_id.to_string(),
                }),
            )
            .await?;
            match rpc::recv_required::<Response>(&mut stream).await? {
                Response::Ack => Ok(StoreSession { stream }),
                Response::Err(e) => Err(e.into()),
                Response::Streaming => Err(Error::Wire("unexpected streaming ack".to_string())),
            }
        })
        .await
    }

    /// Opens a `RetrieveData` session for `chunk_id`. Fails with
    /// `Error::ChunkMissing` if absent.
    pub async fn open_retrieve(&self, chunk_id: &str) -> Result<RetrieveSession> {
        with_deadline(async {
            let mut stream = self.connect().await?;
            rpc::send(
                &mut stream,
                &Request::Retrieve(FileInfo {
                    file_id: chunk_id.to_string(),
                }),
            )
            .await?;
            match rpc::recv_required::<Response>(&mut stream).await? {
                Response::Streaming => Ok(RetrieveSession {
                    stream,
                    done: false,
                }),
                Response::Err(e) => Err(e.into()),
                Response::Ack => Err(Error::Wire("unexpected ack for retrieve".to_string())),
            }
        })
        .await
    }

    /// Best-effort `DeleteData`. Fails with `Error::ChunkMissing` if the
    /// node never received this chunk — callers doing rollback should log
    /// and ignore this, per spec.md §4.2.
    pub async fn delete(&self, chunk_id: &str) -> Result<()> {
        with_deadline(async {
            let mut stream = self.connect().await?;
            rpc::send(
                &mut stream,
                &Request::Delete(FileInfo {
                    file_id: chunk_id.to_string(),
                }),
            )
            .await?;
            match rpc::recv_required::<Response>(&mut stream).await? {
                Response::Ack => Ok(()),
                Response::Err(e) => Err(e.into()),
                Response::Streaming => Err(Error::Wire("unexpected streaming ack".to_string())),
            }
        })
        .await
    }
}

/// An in-progress `StoreData` stream. Payload frames must be sent in order;
/// `finish` sends the terminator and awaits the node's final ack.
pub struct StoreSession {
    stream: wire::WireStream,
}

impl StoreSession {
    /// Forwards one frame of payload bytes, ideally ≤1 MiB.
    pub async fn send_frame(&mut self, data: Vec<u8>) -> Result<()> {
        with_deadline(rpc::send(&mut self.stream, &StreamFrame::Data(data))).await
    }

    /// Closes the stream and waits for the node to finalize the blob.
    pub async fn finish(mut self) -> Result<()> {
        with_deadline(async {
            rpc::send(&mut self.stream, &StreamFrame::End).await?;
            match rpc::recv_required::<Response>(&mut self.stream).await? {
                Response::Ack => Ok(()),
                Response::Err(e) => Err(e.into()),
                Response::Streaming => Err(Error::Wire("unexpected streaming ack".to_string())),
            }
        })
        .await
    }
}

/// An in-progress `RetrieveData` stream.
pub struct RetrieveSession {
    stream: wire::WireStream,
    done: bool,
}

impl RetrieveSession {
    /// Reads the next payload frame. Returns `Ok(None)` once the node has
    /// sent its terminator.
    pub async fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.done {
            return Ok(None);
        }
        with_deadline(async {
            match rpc::recv_required::<StreamFrame>(&mut self.stream).await? {
                StreamFrame::Data(data) => Ok(Some(data)),
                StreamFrame::End => {
                    self.done = true;
                    Ok(None)
                }
            }
        })
        .await
    }
}
