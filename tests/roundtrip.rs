//! End-to-end coverage of the scenarios in spec.md §8: in-process storage
//! nodes behind the real wire protocol, driven through a `DataDistributor`.

use bytes::Bytes;
use distributed_storage::chunkmaster::ChunkMaster;
use distributed_storage::core::error::Error;
use distributed_storage::distributor::DataDistributor;
use distributed_storage::node::server;
use distributed_storage::storage::LocalStorage;
use futures::{stream, StreamExt};
use std::sync::Arc;
use tokio::net::TcpListener;

/// Starts one storage node on an ephemeral port and returns its `iam`
/// address (`127.0.0.1:<port>`, fixed to loopback for test determinism) and
/// a handle that, when aborted, simulates that node dying.
async fn spawn_node() -> (String, tokio::task::JoinHandle<std::io::Result<()>>) {
    let dir = tempfile::tempdir().unwrap();
    let storage = Arc::new(LocalStorage::new(dir.path().to_path_buf()).await.unwrap());
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(server::serve_listener(listener, storage));
    // Keep the tempdir alive for the lifetime of the test process; it is
    // cleaned up on process exit, which is fine for a test binary.
    std::mem::forget(dir);
    (addr.to_string(), handle)
}

async fn seeded_cluster(
    n: usize,
    split: usize,
    available_bytes: i64,
) -> (Arc<ChunkMaster>, Arc<DataDistributor>, Vec<(String, tokio::task::JoinHandle<std::io::Result<()>>)>) {
    let chunk_master = Arc::new(ChunkMaster::new(split));
    let mut nodes = Vec::new();
    for _ in 0..n {
        let (addr, handle) = spawn_node().await;
        chunk_master.update_storage_info(&addr, available_bytes);
        nodes.push((addr, handle));
    }
    let distributor = Arc::new(DataDistributor::new(Arc::clone(&chunk_master), 1024 * 1024));
    (chunk_master, distributor, nodes)
}

fn body_of(bytes: Vec<u8>) -> impl stream::Stream<Item = distributed_storage::core::Result<Bytes>> + Unpin {
    stream::iter(vec![Ok(Bytes::from(bytes))])
}

async fn collect(
    stream: impl stream::Stream<Item = std::io::Result<Bytes>>,
) -> Vec<u8> {
    let (bytes, saw_error) = collect_tolerant(stream).await;
    assert!(!saw_error, "unexpected mid-stream error");
    bytes
}

/// Like `collect`, but stops at the first error instead of panicking and
/// reports whether one was seen, alongside the bytes collected so far.
async fn collect_tolerant(
    stream: impl stream::Stream<Item = std::io::Result<Bytes>>,
) -> (Vec<u8>, bool) {
    tokio::pin!(stream);
    let mut out = Vec::new();
    while let Some(item) = stream.next().await {
        match item {
            Ok(bytes) => out.extend_from_slice(&bytes),
            Err(_) => return (out, true),
        }
    }
    (out, false)
}

#[tokio::test]
async fn scenario_small_object_single_chunk() {
    let (_cm, distributor, _nodes) = seeded_cluster(6, 6, 10 * 1024 * 1024).await;
    let data = vec![1u8, 2, 3, 4, 5, 6, 7, 8];

    distributor.store("a", data.len() as u64, body_of(data.clone())).await.unwrap();
    let got = collect(distributor.retrieve("a").await.unwrap()).await;
    assert_eq!(got, data);
}

#[tokio::test]
async fn scenario_large_object_splits_across_all_nodes() {
    let (cm, distributor, _nodes) = seeded_cluster(6, 6, 10 * 1024 * 1024).await;
    let data: Vec<u8> = (0..9007u32).map(|i| (i % 256) as u8).collect();

    distributor.store("b", data.len() as u64, body_of(data.clone())).await.unwrap();

    let plan = cm.chunks_to_restore("b").unwrap();
    let sizes: Vec<u64> = plan.iter().map(|c| c.size).collect();
    assert_eq!(sizes, vec![1501, 1501, 1501, 1501, 1501, 1502]);

    let got = collect(distributor.retrieve("b").await.unwrap()).await;
    assert_eq!(got, data);
}

#[tokio::test]
async fn scenario_not_enough_nodes_rejected() {
    let (cm, distributor, _nodes) = seeded_cluster(5, 6, 10 * 1024 * 1024).await;

    let err = distributor.store("c", 1000, body_of(vec![0u8; 1000])).await.unwrap_err();
    assert!(matches!(err, Error::NotEnoughStorageNodes));
    assert_eq!(err.to_status_code(), 503);
    assert!(cm.chunks_to_restore("c").is_err());
}

#[tokio::test]
async fn scenario_insufficient_capacity_leaves_quota_untouched() {
    let (cm, distributor, _nodes) = seeded_cluster(6, 6, 1024).await;

    let err = distributor
        .store("d", 8192, body_of(vec![0u8; 8192]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotEnoughAvailableStorage));
    assert_eq!(err.to_status_code(), 507);
    assert!(cm.chunks_to_restore("d").is_err());
}

#[tokio::test]
async fn scenario_duplicate_fileref_rejected() {
    let (_cm, distributor, _nodes) = seeded_cluster(6, 6, 10 * 1024 * 1024).await;
    let data: Vec<u8> = (0..9007u32).map(|i| (i % 256) as u8).collect();

    distributor.store("e", data.len() as u64, body_of(data.clone())).await.unwrap();
    let err = distributor
        .store("e", 1000, body_of(vec![0u8; 1000]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::FileDuplicate(_)));
    assert_eq!(err.to_status_code(), 409);
}

#[tokio::test]
async fn scenario_retrieval_survives_dead_node_without_deleting_catalog() {
    let (cm, distributor, nodes) = seeded_cluster(6, 6, 10 * 1024 * 1024).await;
    let data: Vec<u8> = (0..9007u32).map(|i| (i % 256) as u8).collect();
    distributor.store("f", data.len() as u64, body_of(data.clone())).await.unwrap();

    let plan_before = cm.chunks_to_restore("f").unwrap();
    let chunk3 = plan_before.iter().find(|c| c.order == 3).unwrap();
    let (_, handle) = nodes
        .iter()
        .find(|(addr, _)| *addr == chunk3.storage_id)
        .expect("chunk 3's node must be one of the spawned nodes");
    handle.abort();
    // Give the aborted task's TCP listener a moment to actually unbind.
    tokio::task::yield_now().await;

    let (bytes_seen, saw_error) = collect_tolerant(distributor.retrieve("f").await.unwrap()).await;
    assert!(saw_error, "expected a mid-stream error once chunk 3's node is gone");
    // Chunks 0-2 stream through before the failure is hit.
    assert!(bytes_seen.len() < data.len());

    let plan_after = cm.chunks_to_restore("f").unwrap();
    assert_eq!(plan_before, plan_after, "retrieval must not mutate the catalog");
}
