//! `storageservice`: one StorageNode — serves the `Storage` RPC surface and
//! publishes periodic heartbeats to the configured inventory endpoint.

use clap::Parser;
use distributed_storage::core::StorageNodeConfig;
use distributed_storage::node::{heartbeat, server};
use distributed_storage::storage::LocalStorage;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "storageservice", about = "Chunked object store storage node")]
struct Args {
    /// Root directory under which chunk blobs are persisted. Required;
    /// left optional here so a missing flag reaches `StorageNodeConfig::
    /// validate()` and exits 1 the same way the other two binaries'
    /// required-value checks do, rather than clap exiting 2 on its own.
    #[arg(long)]
    storage_location: Option<PathBuf>,

    /// Port this node listens on for the Storage RPC surface.
    #[arg(long, default_value_t = 45346)]
    port: u16,

    /// host:port of the apiservice's StorageInventory listener.
    #[arg(long, default_value = "localhost:3609")]
    inventory_host: String,

    /// Heartbeat interval in seconds, tolerated range 1-10.
    #[arg(long, default_value_t = 1)]
    heartbeat_interval_secs: u64,
}

#[tokio::main]
async fn main() {
    distributed_storage::init_tracing();

    let args = Args::parse();
    let mut config = StorageNodeConfig {
        storage_location: args.storage_location.unwrap_or_default(),
        port: args.port,
        inventory_host: args.inventory_host,
        heartbeat_interval: Duration::from_secs(args.heartbeat_interval_secs),
        frame_size: 1024 * 1024,
    };
    if let Err(e) = config.apply_env_overrides() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    let iam = match config.iam() {
        Ok(iam) => iam,
        Err(e) => {
            error!(error = %e, "cannot determine node identity");
            std::process::exit(1);
        }
    };

    let storage = match LocalStorage::new(config.storage_location.clone()).await {
        Ok(s) => Arc::new(s),
        Err(e) => {
            error!(error = %e, "cannot initialize storage root");
            std::process::exit(1);
        }
    };

    let server_task = tokio::spawn(server::serve(config.port, storage));
    let heartbeat_task = tokio::spawn(heartbeat::run(
        iam,
        config.storage_location,
        config.inventory_host,
        config.heartbeat_interval,
    ));

    tokio::select! {
        res = server_task => {
            if let Ok(Err(e)) = res {
                error!(error = %e, "storage server exited");
            }
            std::process::exit(1);
        }
        _ = heartbeat_task => {
            // `heartbeat::run` never returns normally.
            std::process::exit(1);
        }
    }
}
