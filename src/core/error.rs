//! Error types shared across the chunk master, storage nodes and HTTP front-end.
//!
//! One crate-wide `thiserror`-derived enum, the way a small service keeps its
//! error taxonomy in a single place rather than scattering `Box<dyn Error>` at
//! every layer.

use thiserror::Error;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Crate-wide error type. Each variant corresponds to a row in the error
/// taxonomy: what raised it, and what it should look like at the HTTP edge.
#[derive(Error, Debug)]
pub enum Error {
    /// Fewer live storage nodes than the configured split factor.
    #[error("not enough storage nodes")]
    NotEnoughStorageNodes,

    /// A plan already exists for this fileref.
    #[error("file already exists: {0}")]
    FileDuplicate(String),

    /// Every selected node would go negative on quota.
    #[error("not enough available storage")]
    NotEnoughAvailableStorage,

    /// No plan recorded for this fileref.
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// The RPC layer could not reach, or lost, a storage node.
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),

    /// A storage node already holds a blob under this chunk id.
    #[error("chunk already exists: {0}")]
    ChunkAlreadyExists(String),

    /// A storage node has no blob under this chunk id.
    #[error("chunk missing: {0}")]
    ChunkMissing(String),

    /// An RPC's deadline elapsed before it completed.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// Client request was missing a required `Content-Length`.
    #[error("missing content-length")]
    MissingContentLength,

    /// Configuration could not be parsed or failed validation.
    #[error("configuration error: {0}")]
    Config(String),

    /// Wire protocol framing or decoding failure.
    #[error("wire protocol error: {0}")]
    Wire(String),

    /// I/O errors bubbled up from the filesystem or the network.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Configuration error constructor, mirroring the crate's other `Error::*`
    /// helpers.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Maps an error onto the HTTP status code spec.md §4.3/§7 assigns it.
    /// `DataDistributor` handlers use this directly instead of re-deriving
    /// the mapping at each call site.
    pub fn to_status_code(&self) -> u16 {
        match self {
            Error::NotEnoughStorageNodes => 503,
            Error::FileDuplicate(_) => 409,
            Error::NotEnoughAvailableStorage => 507,
            Error::FileNotFound(_) => 404,
            Error::MissingContentLength => 400,
            Error::StorageUnavailable(_)
            | Error::ChunkAlreadyExists(_)
            | Error::ChunkMissing(_)
            | Error::DeadlineExceeded
            | Error::Config(_)
            | Error::Wire(_)
            | Error::Io(_) => 500,
        }
    }

    /// Whether the store path must roll back the in-flight plan before
    /// responding. Plan-construction errors (`NotEnoughStorageNodes`,
    /// `FileDuplicate`, `NotEnoughAvailableStorage`) never created a catalog
    /// entry, so there is nothing to undo.
    pub fn requires_rollback(&self) -> bool {
        matches!(
            self,
            Error::StorageUnavailable(_)
                | Error::ChunkAlreadyExists(_)
                | Error::ChunkMissing(_)
                | Error::DeadlineExceeded
                | Error::Io(_)
        )
    }
}
