//! Request/response message shapes for the two RPC surfaces: `Storage`
//! (store/retrieve/delete a chunk) and `StorageInventory` (heartbeat sink).
//! See spec.md §4.4.

use crate::core::error::Error;
use crate::wire::{self, FileInfo, StorageInfo, WireStream};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};

/// One call into a storage node, or a heartbeat into the inventory listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Request {
    /// Begin a `StoreData` stream for the given chunk id.
    Store(FileInfo),
    /// `RetrieveData`: stream the named chunk back.
    Retrieve(FileInfo),
    /// `DeleteData`: remove the named chunk.
    Delete(FileInfo),
    /// `UpdateStorageInfo`: publish a heartbeat.
    Heartbeat(StorageInfo),
}

/// Reply to a `Request`, or the start of a streamed reply for `Retrieve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Response {
    /// Unary success (`DeleteData`, `UpdateStorageInfo`, or the final ack of
    /// a `StoreData` stream).
    Ack,
    /// `RetrieveData` accepted; payload frames follow as `StreamFrame`s.
    Streaming,
    /// The call failed.
    Err(WireError),
}

/// Error kinds that can cross the wire, mirroring the taxonomy in spec.md §7.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WireError {
    /// `StoreData` targeted a chunk id that already exists.
    AlreadyExists(String),
    /// `RetrieveData`/`DeleteData` targeted a chunk id that doesn't exist.
    NotFound(String),
    /// Anything else (I/O failure, decode failure, etc).
    Internal(String),
}

impl From<WireError> for Error {
    fn from(e: WireError) -> Self {
        match e {
            WireError::AlreadyExists(id) => Error::ChunkAlreadyExists(id),
            WireError::NotFound(id) => Error::ChunkMissing(id),
            WireError::Internal(msg) => Error::StorageUnavailable(msg),
        }
    }
}

impl From<&Error> for WireError {
    fn from(e: &Error) -> Self {
        match e {
            Error::ChunkAlreadyExists(id) => WireError::AlreadyExists(id.clone()),
            Error::ChunkMissing(id) => WireError::NotFound(id.clone()),
            other => WireError::Internal(other.to_string()),
        }
    }
}

/// One frame of a `StoreData`/`RetrieveData` payload stream. `End` closes the
/// stream; the recommended payload size per `Data` frame is 1 MiB.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StreamFrame {
    /// A chunk of payload bytes.
    Data(Vec<u8>),
    /// Stream terminator.
    End,
}

/// Sends one `T` as a length-prefixed frame.
pub async fn send<T: Serialize>(stream: &mut WireStream, value: &T) -> crate::core::Result<()> {
    let bytes = wire::encode(value)?;
    stream
        .send(bytes)
        .await
        .map_err(|e| Error::Wire(e.to_string()))
}

/// Receives and decodes the next frame as a `T`. Returns `Ok(None)` on clean
/// connection close.
pub async fn recv<T: for<'de> Deserialize<'de>>(
    stream: &mut WireStream,
) -> crate::core::Result<Option<T>> {
    match stream.next().await {
        Some(Ok(buf)) => Ok(Some(wire::decode(&buf)?)),
        Some(Err(e)) => Err(Error::Wire(e.to_string())),
        None => Ok(None),
    }
}

/// Receives the next frame, mapping a closed connection to `Error::Wire`
/// since every protocol exchange below expects a specific next frame.
pub async fn recv_required<T: for<'de> Deserialize<'de>>(
    stream: &mut WireStream,
) -> crate::core::Result<T> {
    recv(stream)
        .await?
        .ok_or_else(|| Error::Wire("connection closed mid-exchange".to_string()))
}
