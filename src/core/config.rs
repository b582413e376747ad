//! Configuration for both binaries.
//!
//! Each binary gets its own small config struct built from CLI flags; both
//! share the `Default`-impl-plus-`validate` shape the rest of this module
//! family uses. Every field can additionally be overridden by an environment
//! variable, applied after CLI parsing and before `validate()` — the same
//! `apply_env_overrides` shape the teacher's own `core::config` uses, scaled
//! down to this crate's two small config structs.

use crate::core::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the `apiservice` binary: the ChunkMaster + HTTP front-end
/// + inventory listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// HTTP bind address for the client-facing store/retrieve routes.
    pub http_addr: std::net::SocketAddr,

    /// Port where the `StorageInventory` heartbeat listener accepts
    /// connections.
    pub inventory_port: u16,

    /// Number of chunks to split each incoming object into.
    pub chunks_num: usize,

    /// Maximum frame size forwarded to/from a storage node in one wire
    /// message. Spec recommends 1 MiB.
    pub frame_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            http_addr: "0.0.0.0:8080".parse().unwrap(),
            inventory_port: 3609,
            chunks_num: 6,
            frame_size: 1024 * 1024,
        }
    }
}

impl ApiConfig {
    /// Validate CLI-derived values. Non-positive ports or chunk counts are
    /// rejected here so `main` can `exit(1)` uniformly.
    pub fn validate(&self) -> Result<()> {
        if self.inventory_port == 0 {
            return Err(Error::config("inventory port must be positive"));
        }
        if self.chunks_num == 0 {
            return Err(Error::config("chunks-num must be positive"));
        }
        Ok(())
    }

    /// Applies `DISTSTORAGE_*` environment variable overrides on top of the
    /// CLI-derived values, mirroring the teacher's `apply_env_overrides`.
    /// Intended to run after CLI parsing and before `validate()`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(addr) = env::var("DISTSTORAGE_HTTP_ADDR") {
            self.http_addr = addr
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_HTTP_ADDR: {e}")))?;
        }
        if let Ok(port) = env::var("DISTSTORAGE_INVENTORY_PORT") {
            self.inventory_port = port
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_INVENTORY_PORT: {e}")))?;
        }
        if let Ok(n) = env::var("DISTSTORAGE_CHUNKS_NUM") {
            self.chunks_num = n
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_CHUNKS_NUM: {e}")))?;
        }
        if let Ok(size) = env::var("DISTSTORAGE_FRAME_SIZE") {
            self.frame_size = size
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_FRAME_SIZE: {e}")))?;
        }
        Ok(())
    }
}

/// Configuration for the `storageservice` binary: local persistence +
/// heartbeat sender.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageNodeConfig {
    /// Root directory under which chunk blobs are persisted, one file per
    /// chunk id.
    pub storage_location: PathBuf,

    /// Port this node listens on for the `Storage` RPC surface.
    pub port: u16,

    /// `host:port` of the apiservice's inventory listener.
    pub inventory_host: String,

    /// How often to publish a heartbeat. Spec tolerates 1-10s; default 1s.
    pub heartbeat_interval: Duration,

    /// Maximum frame size read from or written to the wire per message.
    pub frame_size: usize,
}

impl Default for StorageNodeConfig {
    fn default() -> Self {
        Self {
            storage_location: PathBuf::new(),
            port: 45346,
            inventory_host: "localhost:3609".to_string(),
            heartbeat_interval: Duration::from_secs(1),
            frame_size: 1024 * 1024,
        }
    }
}

impl StorageNodeConfig {
    /// Validate CLI-derived values.
    pub fn validate(&self) -> Result<()> {
        if self.storage_location.as_os_str().is_empty() {
            return Err(Error::config("storage-location is required"));
        }
        if self.port == 0 {
            return Err(Error::config("port must be positive"));
        }
        if self.heartbeat_interval < Duration::from_secs(1)
            || self.heartbeat_interval > Duration::from_secs(10)
        {
            return Err(Error::config(
                "heartbeat interval out of the tolerated 1-10s range",
            ));
        }
        Ok(())
    }

    /// `iam` identity this node announces in every heartbeat: `host:port`.
    pub fn iam(&self) -> Result<String> {
        let hostname = hostname::get()
            .map_err(|e| Error::config(format!("cannot determine hostname: {e}")))?
            .to_string_lossy()
            .into_owned();
        Ok(format!("{hostname}:{}", self.port))
    }

    /// Applies `DISTSTORAGE_*` environment variable overrides on top of the
    /// CLI-derived values, mirroring the teacher's `apply_env_overrides`.
    /// Intended to run after CLI parsing and before `validate()`.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(path) = env::var("DISTSTORAGE_STORAGE_LOCATION") {
            self.storage_location = PathBuf::from(path);
        }
        if let Ok(port) = env::var("DISTSTORAGE_PORT") {
            self.port = port
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_PORT: {e}")))?;
        }
        if let Ok(host) = env::var("DISTSTORAGE_INVENTORY_HOST") {
            self.inventory_host = host;
        }
        if let Ok(secs) = env::var("DISTSTORAGE_HEARTBEAT_INTERVAL_SECS") {
            let secs: u64 = secs
                .parse()
                .map_err(|e| Error::config(format!("invalid DISTSTORAGE_HEARTBEAT_INTERVAL_SECS: {e}")))?;
            self.heartbeat_interval = Duration::from_secs(secs);
        }
        Ok(())
    }
}
