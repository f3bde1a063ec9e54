//! The chunk store (C1, §4.1): an associative store keyed by chunk
//! coordinate, mutated only on the orchestrator's main context (§5).

use std::collections::HashMap;

use parking_lot::RwLock;

use crate::chunk::Chunk;
use crate::coord::ChunkCoord;

/// Thread-safe store of loaded chunks, keyed by chunk coordinate.
///
/// Per §5, mutation happens only from the main context at well-defined
/// checkpoints; `parking_lot::RwLock` gives workers cheap concurrent
/// reads of a consistent snapshot in between.
#[derive(Default)]
pub struct ChunkStore {
    chunks: RwLock<HashMap<ChunkCoord, Chunk>>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self {
            chunks: RwLock::new(HashMap::new()),
        }
    }

    /// Inserts an unloaded chunk at `coord` if absent, returning whether
    /// one was freshly created.
    pub fn insert_or_get(&self, coord: ChunkCoord) -> bool {
        let mut chunks = self.chunks.write();
        if chunks.contains_key(&coord) {
            false
        } else {
            chunks.insert(coord, Chunk::new(coord));
            true
        }
    }

    pub fn contains(&self, coord: ChunkCoord) -> bool {
        self.chunks.read().contains_key(&coord)
    }

    pub fn get_block(&self, coord: ChunkCoord, local: glam::IVec3) -> Option<crate::block::BlockType> {
        self.chunks
            .read()
            .get(&coord)
            .filter(|c| c.is_loaded())
            .map(|c| c.get_block(local.x, local.y, local.z))
    }

    /// Runs `f` with read access to the chunk at `coord`, if present.
    pub fn with_chunk<R>(&self, coord: ChunkCoord, f: impl FnOnce(&Chunk) -> R) -> Option<R> {
        self.chunks.read().get(&coord).map(f)
    }

    /// Runs `f` with mutable access to the chunk at `coord`, if present.
    pub fn with_chunk_mut<R>(&self, coord: ChunkCoord, f: impl FnOnce(&mut Chunk) -> R) -> Option<R> {
        self.chunks.write().get_mut(&coord).map(f)
    }

    pub fn remove(&self, coord: ChunkCoord) -> Option<Chunk> {
        self.chunks.write().remove(&coord)
    }

    pub fn len(&self) -> usize {
        self.chunks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.read().is_empty()
    }

    /// Snapshot of every currently-stored chunk coordinate, for workers
    /// to iterate outside the lock (§5).
    pub fn all_coords(&self) -> Vec<ChunkCoord> {
        self.chunks.read().keys().copied().collect()
    }

    /// Bulk iteration of `(coord, clone-of-chunk)` pairs. Cloning keeps
    /// callers from holding the read guard across their own work.
    pub fn snapshot(&self) -> Vec<(ChunkCoord, Chunk)> {
        self.chunks
            .read()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect()
    }
}
