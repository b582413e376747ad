//! The binary wire protocol spoken between the API front-end and every
//! storage node: length-prefixed `bincode` frames over a plain TCP stream.
//!
//! There is no gRPC stack in play here, so framing reaches for the natural
//! tokio-ecosystem companion instead: `tokio_util::codec::LengthDelimitedCodec`
//! wrapping a `Framed<TcpStream, _>`, the same pattern `tokio-util`'s own docs
//! use for exactly this purpose. Message bodies are `bincode`-encoded.

use crate::core::error::{Error, Result};
use bytes::{Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub mod rpc;

/// `FileInfo{file_id}` from spec.md §4.4: identifies the target blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    /// Chunk id, e.g. `<file_id>.part.<order>`.
    pub file_id: String,
}

/// `StoredUnit{file_info, data}`: one frame of chunk payload, at most
/// `frame_size` bytes (spec recommends 1 MiB).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredUnit {
    /// Target/ source file info for this unit.
    pub file_info: FileInfo,
    /// Payload bytes carried by this frame. Empty signals end-of-stream.
    pub data: Vec<u8>,
}

/// `StorageInfo{iam, available_bytes}`: heartbeat payload published to the
/// `StorageInventory` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInfo {
    /// `<hostname>:<listen_port>` identity of the reporting node.
    pub iam: String,
    /// Bytes available to unprivileged users on the node's storage volume.
    pub available_bytes: i64,
}

/// A connection framed for our length-prefixed protocol.
pub type WireStream = Framed<TcpStream, LengthDelimitedCodec>;

/// Wraps a raw TCP stream in the length-delimited frame codec.
pub fn frame(stream: TcpStream) -> WireStream {
    Framed::new(stream, LengthDelimitedCodec::new())
}

/// Encodes `value` as one length-prefixed frame.
pub fn encode<T: Serialize>(value: &T) -> Result<Bytes> {
    bincode::serialize(value)
        .map(Bytes::from)
        .map_err(|e| Error::Wire(e.to_string()))
}

/// Decodes a received frame back into `T`.
pub fn decode<T: for<'de> Deserialize<'de>>(buf: &BytesMut) -> Result<T> {
    bincode::deserialize(buf).map_err(|e| Error::Wire(e.to_string()))
}
