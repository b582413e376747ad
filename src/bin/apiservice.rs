//! `apiservice`: the ChunkMaster, the HTTP data-plane, and the
//! `StorageInventory` heartbeat listener in one process.

use clap::Parser;
use distributed_storage::chunkmaster::ChunkMaster;
use distributed_storage::core::ApiConfig;
use distributed_storage::distributor::{inventory, DataDistributor};
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "apiservice", about = "Chunked object store API front-end")]
struct Args {
    /// HTTP bind address for the client-facing store/retrieve routes.
    #[arg(long, default_value = "0.0.0.0:8080")]
    http_addr: std::net::SocketAddr,

    /// Port the StorageInventory heartbeat listener accepts connections on.
    #[arg(long, default_value_t = 3609)]
    inventory_port: u16,

    /// Number of chunks to split each incoming object into.
    #[arg(long, default_value_t = 6)]
    chunks_num: usize,

    /// Maximum frame size forwarded to/from a storage node in one message.
    #[arg(long, default_value_t = 1024 * 1024)]
    frame_size: usize,
}

#[tokio::main]
async fn main() {
    distributed_storage::init_tracing();

    let args = Args::parse();
    let mut config = ApiConfig {
        http_addr: args.http_addr,
        inventory_port: args.inventory_port,
        chunks_num: args.chunks_num,
        frame_size: args.frame_size,
    };
    if let Err(e) = config.apply_env_overrides() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }
    if let Err(e) = config.validate() {
        error!(error = %e, "invalid configuration");
        std::process::exit(1);
    }

    let chunk_master = Arc::new(ChunkMaster::new(config.chunks_num));
    let distributor = Arc::new(DataDistributor::new(Arc::clone(&chunk_master), config.frame_size));

    let inventory_task = tokio::spawn(inventory::serve(config.inventory_port, chunk_master));
    let http_task = tokio::spawn(distributed_storage::api::server::serve(
        config.http_addr,
        distributor,
    ));

    tokio::select! {
        res = inventory_task => {
            if let Ok(Err(e)) = res {
                error!(error = %e, "inventory listener exited");
            }
            std::process::exit(1);
        }
        res = http_task => {
            if let Ok(Err(e)) = res {
                error!(error = %e, "http server exited");
            }
            std::process::exit(1);
        }
    }
}
