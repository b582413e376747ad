//! Chunked object store: splits client uploads across a dynamic set of
//! storage nodes and reassembles them on retrieval.
//!
//! Module layout mirrors the dependency order leaves-first: `storage` (node
//! persistence) → `wire` (RPC framing) → `chunkmaster` (inventory + planning)
//! → `distributor` (HTTP data-plane) → `api` (HTTP front-end). `node` hosts
//! the storage node's own server loop and heartbeat sender; `core` holds the
//! config and error types every other module depends on.

#[global_allocator]
static GLOBAL: jemallocator::Jemalloc = jemallocator::Jemalloc;

pub mod api;
pub mod chunkmaster;
pub mod core;
pub mod distributor;
pub mod node;
pub mod storage;
pub mod wire;

pub use core::error::{Error, Result};

/// Installs the crate's tracing subscriber, honoring `RUST_LOG` if set.
/// Called once from each binary's `main`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
