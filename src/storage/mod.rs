//! Local chunk persistence on a storage node.

pub mod local;

pub use local::{ChunkReader, ChunkWriter, LocalStorage};

use crate::core::Result;

/// Seam a storage node's local persistence implements. `LocalStorage` is the
/// only implementation this version ships. The three methods here are the
/// actual production seam `node::server`'s RPC handlers call — frame-driven,
/// matching how `StoreData`/`RetrieveData` move bytes over the wire rather
/// than a whole-buffer read/write a caller would never really have on hand.
pub trait Storage {
    /// Opens a new blob under `chunk_id` for frame-by-frame writing. Must
    /// fail with `Error::ChunkAlreadyExists` if a blob already exists under
    /// that id, without touching it.
    fn begin_store(
        &self,
        chunk_id: &str,
    ) -> impl std::future::Future<Output = Result<ChunkWriter>> + Send;

    /// Opens the blob under `chunk_id` for frame-by-frame reading. Must fail
    /// with `Error::ChunkMissing` if absent.
    fn begin_retrieve(
        &self,
        chunk_id: &str,
    ) -> impl std::future::Future<Output = Result<ChunkReader>> + Send;

    /// Removes the blob under `chunk_id`. Must fail with
    /// `Error::ChunkMissing` if absent.
    fn delete_chunk(&self, chunk_id: &str) -> impl std::future::Future<Output = Result<()>> + Send;
}
