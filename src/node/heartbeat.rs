//! Periodic capacity reporting: every `heartbeat_interval`, query free disk
//! space and publish it to the configured inventory endpoint. A failed
//! heartbeat is logged and retried on the next tick; it is never fatal
//! (spec.md §4.1).

use crate::core::Error;
use crate::storage::local::available_bytes;
use crate::wire::rpc::{self, Request, Response};
use crate::wire::{self, StorageInfo};
use std::path::PathBuf;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::{error, info};

/// Fixed per-heartbeat deadline (spec.md §5: "heartbeats use a fixed 5s
/// deadline"), covering connect through ack.
const HEARTBEAT_DEADLINE: Duration = Duration::from_secs(5);

/// Runs the heartbeat loop forever. Intended to be spawned as its own task
/// from `storageservice`'s `main`.
pub async fn run(
    iam: String,
    root_dir: PathBuf,
    inventory_host: String,
    interval: Duration,
) -> ! {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        match send_one(&iam, &root_dir, &inventory_host).await {
            Ok(bytes) => info!(%iam, available_bytes = bytes, "heartbeat sent"),
            Err(e) => error!(%iam, error = %e, "heartbeat failed, will retry next tick"),
        }
    }
}

async fn send_one(
    iam: &str,
    root_dir: &std::path::Path,
    inventory_host: &str,
) -> crate::core::Result<i64> {
    let bytes = available_bytes(root_dir)?;

    match tokio::time::timeout(HEARTBEAT_DEADLINE, send_heartbeat(iam, inventory_host, bytes))
        .await
    {
        Ok(result) => result,
        Err(_) => Err(Error::DeadlineExceeded),
    }
}

async fn send_heartbeat(
    iam: &str,
    inventory_host: &str,
    bytes: i64,
) -> crate::core::Result<i64> {
    let socket = TcpStream::connect(inventory_host).await?;
    let mut stream = wire::frame(socket);
    rpc::send(
        &mut stream,
        &Request::Heartbeat(StorageInfo {
            iam: iam.to_string(),
            available_bytes: bytes,
        }),
    )
    .await?;
    match rpc::recv_required::<Response>(&mut stream).await? {
        Response::Ack => Ok(bytes),
        Response::Err(e) => Err(e.into()),
        Response::Streaming => Err(Error::Wire(
            "unexpected streaming ack for heartbeat".to_string(),
        )),
    }
}
