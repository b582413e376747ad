//! DataDistributor: the HTTP-facing glue between a `ChunkMaster` plan and the
//! `Storage` RPC calls that actually move bytes. See spec.md §4.3.
//!
//! A node id doubles as its dialable `host:port` address (spec.md §3), so
//! there is no separate connection-handle map to keep in sync with the
//! inventory: a `RemoteStorage` is constructed on demand from `chunk.storage_id`
//! each time a call is made.

pub mod inventory;
pub mod remote;

use crate::chunkmaster::{Chunk, ChunkMaster, ChunkPlan};
use crate::core::{self, error::Error, error::Result};
use crate::distributor::remote::{RemoteStorage, StoreSession};
use bytes::Bytes;
use futures::Stream;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};

/// Ties chunk planning to the wire protocol for one API front-end instance.
pub struct DataDistributor {
    chunk_master: Arc<ChunkMaster>,
    frame_size: usize,
}

impl DataDistributor {
    pub fn new(chunk_master: Arc<ChunkMaster>, frame_size: usize) -> Self {
        Self {
            chunk_master,
            frame_size,
        }
    }

    /// Splits `fileref` into a plan, streams `body` into each target node in
    /// order, and rolls back on any failure (spec.md §4.3 "store path").
    /// `body` yields the raw request bytes in whatever chunks the HTTP layer
    /// delivered them in; they are re-sliced here to match the plan's chunk
    /// boundaries and `frame_size`.
    pub async fn store<S>(&self, fileref: &str, size: u64, mut body: S) -> Result<()>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
    {
        let plan = self.chunk_master.split_to_chunks(fileref, size)?;
        let mut leftover = Bytes::new();

        for (i, chunk) in plan.iter().enumerate() {
            let chunk_id = core::chunk_id(fileref, chunk.order);
            let remote = RemoteStorage::new(chunk.storage_id.clone());
            let session = match remote.open_store(&chunk_id).await {
                Ok(s) => s,
                Err(e) => {
                    warn!(chunk_id = %chunk_id, error = %e, "could not open store session");
                    self.rollback_store(fileref, &plan, i).await;
                    return Err(e);
                }
            };

            if let Err(e) = self
                .forward_chunk(session, chunk.size, &mut leftover, &mut body)
                .await
            {
                warn!(chunk_id = %chunk_id, error = %e, "store failed mid-stream");
                self.rollback_store(fileref, &plan, i + 1).await;
                return Err(e);
            }
        }

        Ok(())
    }

    /// Feeds exactly `chunk_size` bytes from `body` (carrying over any
    /// partially-consumed frame in `leftover`) into `session` as ≤`frame_size`
    /// wire frames, then finalizes the blob.
    async fn forward_chunk<S>(
        &self,
        mut session: StoreSession,
        chunk_size: u64,
        leftover: &mut Bytes,
        body: &mut S,
    ) -> Result<()>
    where
        S: Stream<Item = Result<Bytes>> + Unpin,
    {
        use futures::StreamExt;

        let mut remaining = chunk_size;
        while remaining > 0 {
            if leftover.is_empty() {
                *leftover = body.next().await.ok_or_else(|| {
                    Error::Io(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "request body ended before the chunk was filled",
                    ))
                })??;
            }
            let take = (remaining as usize).min(leftover.len()).min(self.frame_size);
            let frame = leftover.split_to(take);
            session.send_frame(frame.to_vec()).await?;
            remaining -= take as u64;
        }
        session.finish().await
    }

    /// Returns every chunk's reservation and best-effort deletes the
    /// `up_to` chunks that were already placed on a node, logging (never
    /// propagating) any delete failure. Mirrors spec.md §4.2's rollback rule.
    async fn rollback_store(&self, fileref: &str, plan: &ChunkPlan, up_to: usize) {
        self.chunk_master.release_reservation(fileref, plan);
        for chunk in &plan[..up_to] {
            let chunk_id = core::chunk_id(fileref, chunk.order);
            let remote = RemoteStorage::new(chunk.storage_id.clone());
            if let Err(e) = remote.delete(&chunk_id).await {
                warn!(
                    chunk_id = %chunk_id,
                    storage_id = %chunk.storage_id,
                    error = %e,
                    "rollback delete failed, chunk may be orphaned"
                );
            }
        }
    }

    /// Looks up the recorded plan and returns a stream of the object's bytes
    /// in chunk order, pulled one node at a time (spec.md §4.3 "retrieve
    /// path"). A mid-stream failure ends the stream early; by that point the
    /// HTTP response has already started, so there is nothing left to roll
    /// back — the client simply sees a truncated body.
    pub async fn retrieve(
        &self,
        fileref: &str,
    ) -> Result<impl Stream<Item = std::io::Result<Bytes>>> {
        let plan = self.chunk_master.chunks_to_restore(fileref)?;
        let fileref = fileref.to_string();
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(4);

        tokio::spawn(async move {
            for chunk in &plan {
                if let Err(stop) = stream_one_chunk(&fileref, chunk, &tx).await {
                    if stop {
                        return;
                    }
                }
            }
        });

        Ok(ReceiverStream::new(rx))
    }
}

/// Streams one chunk's frames into `tx`. Returns `Err(true)` when the
/// receiver has gone away (client disconnected) so the caller stops early
/// instead of opening further retrieve sessions nobody will read.
async fn stream_one_chunk(
    fileref: &str,
    chunk: &Chunk,
    tx: &mpsc::Sender<std::io::Result<Bytes>>,
) -> std::result::Result<(), bool> {
    let chunk_id = core::chunk_id(fileref, chunk.order);
    let remote = RemoteStorage::new(chunk.storage_id.clone());

    let mut session = match remote.open_retrieve(&chunk_id).await {
        Ok(s) => s,
        Err(e) => {
            error!(chunk_id = %chunk_id, error = %e, "retrieve session failed");
            let _ = tx.send(Err(to_io_error(&e))).await;
            return Err(false);
        }
    };

    loop {
        match session.next_frame().await {
            Ok(Some(data)) => {
                if tx.send(Ok(Bytes::from(data))).await.is_err() {
                    return Err(true);
                }
            }
            Ok(None) => return Ok(()),
            Err(e) => {
                error!(chunk_id = %chunk_id, error = %e, "retrieve failed mid-stream");
                let _ = tx.send(Err(to_io_error(&e))).await;
                return Err(false);
            }
        }
    }
}

fn to_io_error(e: &Error) -> std::io::Error {
    std::io::Error::other(e.to_string())
}
