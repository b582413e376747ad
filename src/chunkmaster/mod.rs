//! ChunkMaster: live storage inventory, chunking plans, and quota
//! reservation.
//!
//! Two logically separate state areas, each behind its own `parking_lot`
//! lock, acquired inventory-then-catalog wherever a call needs both (spec.md
//! §5). `parking_lot::RwLock` is never held across an `.await` point in this
//! module — every method here is synchronous and returns before any RPC is
//! issued.

use crate::core::error::{Error, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// One placed slice of an object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Position in the plan, `0..N-1`.
    pub order: u32,
    /// Id of the storage node holding this chunk.
    pub storage_id: String,
    /// Byte offset into the original stream.
    pub offset: u64,
    /// Size of this chunk in bytes.
    pub size: u64,
}

/// Ordered chunk list recorded for one fileref.
pub type ChunkPlan = Vec<Chunk>;

/// Inventory entry for one known storage node: its id and the ChunkMaster's
/// authoritative reservation counter for it.
#[derive(Debug, Clone)]
pub struct StorageMeta {
    /// Stable node id (`host:port`).
    pub storage_id: String,
    /// Authoritative free-space estimate. Decremented on plan creation,
    /// incremented back on rollback, tightened (never loosened) by
    /// heartbeats.
    pub available_bytes: i64,
}

/// Tracks live storage nodes and the fileref -> plan catalog, enforcing the
/// invariants in spec.md §3 and §4.2.
pub struct ChunkMaster {
    inventory: RwLock<HashMap<String, StorageMeta>>,
    catalog: RwLock<HashMap<String, ChunkPlan>>,
    split_number: usize,
}

impl ChunkMaster {
    /// Create a ChunkMaster configured to split objects into `split_number`
    /// chunks (when the object is large enough).
    pub fn new(split_number: usize) -> Self {
        Self {
            inventory: RwLock::new(HashMap::new()),
            catalog: RwLock::new(HashMap::new()),
            split_number,
        }
    }

    /// Applies one heartbeat: creates a `StorageMeta` the first time a node
    /// id is seen (seeded to `i64::MAX`, "effectively unbounded"), otherwise
    /// tightens `available_bytes` to `min(stored, reported)`. Heartbeats may
    /// only lower the estimate, never raise it — see spec.md §4.2.
    pub fn update_storage_info(&self, storage_id: &str, reported_available: i64) {
        let mut inventory = self.inventory.write();
        match inventory.get_mut(storage_id) {
            Some(meta) => {
                if reported_available < meta.available_bytes {
                    meta.available_bytes = reported_available;
                }
            }
            None => {
                inventory.insert(
                    storage_id.to_string(),
                    StorageMeta {
                        storage_id: storage_id.to_string(),
                        available_bytes: i64::MAX,
                    },
                );
            }
        }
    }

    /// Returns whether a node id is currently known to the inventory.
    pub fn knows_storage(&self, storage_id: &str) -> bool {
        self.inventory.read().contains_key(storage_id)
    }

    /// Number of live nodes in the inventory.
    pub fn live_node_count(&self) -> usize {
        self.inventory.read().len()
    }

    /// Builds a chunking plan for `fileref`/`size`, reserves quota on every
    /// selected node, and records the plan in the catalog. See spec.md §4.2
    /// for the preconditions, placement policy, and size policy this
    /// implements.
    pub fn split_to_chunks(&self, fileref: &str, size: u64) -> Result<ChunkPlan> {
        let mut inventory = self.inventory.write();
        let mut catalog = self.catalog.write();

        if inventory.len() < self.split_number {
            return Err(Error::NotEnoughStorageNodes);
        }
        if catalog.contains_key(fileref) {
            return Err(Error::FileDuplicate(fileref.to_string()));
        }

        let ranked = prioritize_storages(&inventory);

        let chunks = if (size as usize) < self.split_number {
            let target = &ranked[0];
            let available = inventory[target].available_bytes;
            if available < size as i64 {
                return Err(Error::NotEnoughAvailableStorage);
            }
            vec![Chunk {
                order: 0,
                storage_id: target.clone(),
                offset: 0,
                size,
            }]
        } else {
            let n = self.split_number as u64;
            let base_size = size / n;
            let mut chunks = Vec::with_capacity(self.split_number);
            let mut offset = 0;
            for (i, storage_id) in ranked.iter().enumerate().take(self.split_number) {
                let is_last = i + 1 == self.split_number;
                let chunk_size = if is_last {
                    size - offset
                } else {
                    base_size
                };
                chunks.push(Chunk {
                    order: i as u32,
                    storage_id: storage_id.clone(),
                    offset,
                    size: chunk_size,
                });
                offset += chunk_size;
            }

            let all_fit = chunks
                .iter()
                .all(|c| inventory[&c.storage_id].available_bytes >= c.size as i64);
            if !all_fit {
                return Err(Error::NotEnoughAvailableStorage);
            }
            chunks
        };

        for chunk in &chunks {
            inventory.get_mut(&chunk.storage_id).unwrap().available_bytes -= chunk.size as i64;
        }
        catalog.insert(fileref.to_string(), chunks.clone());

        Ok(chunks)
    }

    /// Catalog lookup for retrieval. Does not mutate any state.
    pub fn chunks_to_restore(&self, fileref: &str) -> Result<ChunkPlan> {
        self.catalog
            .read()
            .get(fileref)
            .cloned()
            .ok_or_else(|| Error::FileNotFound(fileref.to_string()))
    }

    /// Undoes a plan: returns every chunk's size to its node's
    /// `available_bytes` and removes the fileref from the catalog. Called by
    /// the DataDistributor on store failure; best-effort chunk deletes on the
    /// affected nodes are the caller's responsibility (see
    /// `distributor::DataDistributor::rollback_store`).
    pub fn release_reservation(&self, fileref: &str, plan: &[Chunk]) {
        let mut inventory = self.inventory.write();
        let mut catalog = self.catalog.write();
        for chunk in plan {
            if let Some(meta) = inventory.get_mut(&chunk.storage_id) {
                meta.available_bytes = meta.available_bytes.saturating_add(chunk.size as i64);
            }
        }
        catalog.remove(fileref);
    }
}

/// Ranks node ids by `available_bytes` descending, ties broken
/// lexicographically by node id, for deterministic chunk placement.
fn prioritize_storages(inventory: &HashMap<String, StorageMeta>) -> Vec<String> {
    let mut ranked: Vec<&StorageMeta> = inventory.values().collect();
    ranked.sort_by(|a, b| {
        b.available_bytes
            .cmp(&a.available_bytes)
            .then_with(|| a.storage_id.cmp(&b.storage_id))
    });
    ranked.into_iter().map(|m| m.storage_id.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(n: usize, each_available: i64) -> ChunkMaster {
        let cm = ChunkMaster::new(n);
        for i in 0..n {
            cm.update_storage_info(&format!("node-{i}"), each_available);
        }
        cm
    }

    #[test]
    fn not_enough_storage_nodes() {
        let cm = ChunkMaster::new(6);
        for i in 0..5 {
            cm.update_storage_info(&format!("node-{i}"), 900_000);
        }
        let err = cm.split_to_chunks("some/path", 9000).unwrap_err();
        assert!(matches!(err, Error::NotEnoughStorageNodes));
        assert!(cm.chunks_to_restore("some/path").is_err());
    }

    #[test]
    fn small_size_produces_single_chunk() {
        let cm = seeded(6, 900_000);
        let plan = cm.split_to_chunks("some/path", 3).unwrap();
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].order, 0);
        assert_eq!(plan[0].offset, 0);
        assert_eq!(plan[0].size, 3);
    }

    #[test]
    fn split_produces_contiguous_ordered_chunks() {
        let cm = seeded(6, 900_000);
        let plan = cm.split_to_chunks("some/path", 9007).unwrap();
        assert_eq!(plan.len(), 6);
        let mut sum = 0u64;
        for (i, chunk) in plan.iter().enumerate() {
            assert_eq!(chunk.order, i as u32);
            assert_eq!(chunk.offset, sum);
            sum += chunk.size;
        }
        assert_eq!(sum, 9007);
    }

    #[test]
    fn exact_chunk_sizes_for_known_remainder() {
        let cm = seeded(6, 900_000);
        let plan = cm.split_to_chunks("b", 9007).unwrap();
        let sizes: Vec<u64> = plan.iter().map(|c| c.size).collect();
        assert_eq!(sizes, vec![1501, 1501, 1501, 1501, 1501, 1502]);
    }

    #[test]
    fn duplicate_fileref_rejected_without_mutation() {
        let cm = seeded(6, 900_000);
        cm.split_to_chunks("same/path", 9007).unwrap();
        let err = cm.split_to_chunks("same/path", 1035).unwrap_err();
        assert!(matches!(err, Error::FileDuplicate(_)));
    }

    #[test]
    fn split_and_retrieve_roundtrip() {
        let cm = seeded(6, 900_000);
        let plan = cm.split_to_chunks("this/is/my/path123", 54623).unwrap();
        let restored = cm.chunks_to_restore("this/is/my/path123").unwrap();
        assert_eq!(plan, restored);
    }

    #[test]
    fn file_not_found() {
        let cm = seeded(6, 900_000);
        let err = cm.chunks_to_restore("abc/3424/ty").unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[test]
    fn insufficient_capacity_leaves_quota_untouched() {
        let cm = seeded(6, 1024);
        let before: Vec<i64> = (0..6)
            .map(|i| cm.inventory.read()[&format!("node-{i}")].available_bytes)
            .collect();
        let err = cm.split_to_chunks("d", 8192).unwrap_err();
        assert!(matches!(err, Error::NotEnoughAvailableStorage));
        let after: Vec<i64> = (0..6)
            .map(|i| cm.inventory.read()[&format!("node-{i}")].available_bytes)
            .collect();
        assert_eq!(before, after);
        assert!(cm.chunks_to_restore("d").is_err());
    }

    #[test]
    fn quota_conservation_across_reservation_and_rollback() {
        let cm = seeded(6, 900_000);
        let before: Vec<i64> = (0..6)
            .map(|i| cm.inventory.read()[&format!("node-{i}")].available_bytes)
            .collect();
        let plan = cm.split_to_chunks("e", 9007).unwrap();
        cm.release_reservation("e", &plan);
        let after: Vec<i64> = (0..6)
            .map(|i| cm.inventory.read()[&format!("node-{i}")].available_bytes)
            .collect();
        assert_eq!(before, after);
        assert!(cm.chunks_to_restore("e").is_err());
    }

    #[test]
    fn heartbeat_never_raises_available_bytes() {
        let cm = ChunkMaster::new(1);
        cm.update_storage_info("node-0", 500);
        cm.update_storage_info("node-0", 1000); // should be ignored
        assert_eq!(cm.inventory.read()["node-0"].available_bytes, 500);
        cm.update_storage_info("node-0", 100); // tightens
        assert_eq!(cm.inventory.read()["node-0"].available_bytes, 100);
    }
}
