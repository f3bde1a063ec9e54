//! Edit engine (C8, §4.8): sets blocks in an axis-aligned box, adjusting
//! per-chunk palettes and reporting which chunks a caller must re-mesh.

use glam::IVec3;

use crate::block::BlockType;
use crate::chunk::Chunk;
use crate::connectivity::compute_connectivity;
use crate::coord::{ceil_chunk_pos, chunk_pos, ChunkCoord, ALL_FACES, CHUNK_SIZE};
use crate::error::{EngineError, Result};
use crate::store::ChunkStore;

/// Result of a box edit (§7): a partially-applied edit is not itself an
/// error, so success carries both the chunks that were mutated and the
/// ones skipped because they were unloaded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EditOutcome {
    pub modified: Vec<ChunkCoord>,
    pub skipped: Vec<ChunkCoord>,
}

/// Sets every block in `[box_min, box_min + box_size)` to `block_type`
/// (§4.8). Chunks absent or unloaded within the span are logged and
/// skipped, not treated as an error (§7). When `cull_chunks` is set,
/// modified chunks have their connectivity recomputed before return.
pub fn set_block(
    store: &ChunkStore,
    box_min: IVec3,
    box_size: IVec3,
    block_type: BlockType,
    cull_chunks: bool,
) -> Result<EditOutcome> {
    if box_size.x < 0 || box_size.y < 0 || box_size.z < 0 {
        return Err(EngineError::InvalidConfig(format!(
            "box_size must be non-negative, got {box_size:?}"
        )));
    }
    let box_max = box_min + box_size;
    if box_size.x == 0 || box_size.y == 0 || box_size.z == 0 {
        return Ok(EditOutcome::default());
    }

    let span_min = chunk_pos(box_min);
    let span_max = ceil_chunk_pos(box_max); // exclusive

    let mut outcome = EditOutcome::default();

    for cz in span_min.z()..span_max.z() {
        for cy in span_min.y()..span_max.y() {
            for cx in span_min.x()..span_max.x() {
                let coord = ChunkCoord::new(cx, cy, cz);
                let applied = store.with_chunk_mut(coord, |chunk| {
                    apply_box_to_chunk(chunk, coord, box_min, box_max, block_type)
                });
                match applied {
                    Some(true) => {
                        if cull_chunks {
                            store.with_chunk_mut(coord, compute_connectivity);
                        }
                        outcome.modified.push(coord);
                    }
                    Some(false) => {
                        log::warn!("edit spans unloaded chunk {coord:?}; skipping");
                        outcome.skipped.push(coord);
                    }
                    None => {
                        log::warn!("edit spans absent chunk {coord:?}; skipping");
                        outcome.skipped.push(coord);
                    }
                }
            }
        }
    }

    Ok(outcome)
}

/// Applies the clamped box to one chunk's storage. Returns `false` if
/// the chunk is unloaded (caller treats as skipped, not mutated).
fn apply_box_to_chunk(
    chunk: &mut Chunk,
    coord: ChunkCoord,
    box_min: IVec3,
    box_max: IVec3,
    block_type: BlockType,
) -> bool {
    if !chunk.is_loaded() {
        return false;
    }
    let origin = coord.origin();
    let local_min = (box_min - origin).clamp(IVec3::ZERO, IVec3::splat(CHUNK_SIZE));
    let local_max = (box_max - origin).clamp(IVec3::ZERO, IVec3::splat(CHUNK_SIZE));
    if local_min.x >= local_max.x || local_min.y >= local_max.y || local_min.z >= local_max.z {
        return false; // box doesn't actually touch this chunk
    }

    let covers_whole_chunk = local_min == IVec3::ZERO && local_max == IVec3::splat(CHUNK_SIZE);
    if covers_whole_chunk {
        chunk.set_single_palette(block_type);
        return true;
    }

    let idx = chunk.ensure_palette_index(block_type);
    for z in local_min.z..local_max.z {
        for y in local_min.y..local_max.y {
            for x in local_min.x..local_max.x {
                chunk.set_block_raw(x, y, z, idx);
            }
        }
    }
    chunk.recompact();
    true
}

/// The modified chunks plus every one of their up-to-six neighbors whose
/// shared boundary actually falls inside the edited box (§4.8 step 5):
/// the set an orchestrator should enqueue for re-meshing.
pub fn affected_remesh_targets(
    box_min: IVec3,
    box_max: IVec3,
    modified: &[ChunkCoord],
) -> Vec<ChunkCoord> {
    let mut targets: Vec<ChunkCoord> = modified.to_vec();
    for &coord in modified {
        let origin = coord.origin();
        let local_min = (box_min - origin).clamp(IVec3::ZERO, IVec3::splat(CHUNK_SIZE));
        let local_max = (box_max - origin).clamp(IVec3::ZERO, IVec3::splat(CHUNK_SIZE));
        for face in ALL_FACES {
            let touches = match face {
                crate::coord::Face::NegY => local_min.y == 0,
                crate::coord::Face::PosY => local_max.y == CHUNK_SIZE,
                crate::coord::Face::NegZ => local_min.z == 0,
                crate::coord::Face::PosZ => local_max.z == CHUNK_SIZE,
                crate::coord::Face::NegX => local_min.x == 0,
                crate::coord::Face::PosX => local_max.x == CHUNK_SIZE,
            };
            if touches {
                let neighbor = face.neighbor(coord);
                if !targets.contains(&neighbor) {
                    targets.push(neighbor);
                }
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{AIR, STONE};
    use crate::coord::CHUNK_VOLUME;

    fn fresh_loaded_world() -> ChunkStore {
        let store = ChunkStore::new();
        store.insert_or_get(ChunkCoord::new(0, 0, 0));
        store.with_chunk_mut(ChunkCoord::new(0, 0, 0), |c| c.set_single_palette(AIR));
        store
    }

    // E2: a single-block edit at the origin in an all-air world.
    #[test]
    fn single_block_edit_creates_two_entry_palette() {
        let store = fresh_loaded_world();
        let outcome = set_block(
            &store,
            IVec3::new(0, 0, 0),
            IVec3::new(1, 1, 1),
            STONE,
            true,
        )
        .unwrap();
        assert_eq!(outcome.modified, vec![ChunkCoord::new(0, 0, 0)]);
        assert!(outcome.skipped.is_empty());
        let block = store.with_chunk(ChunkCoord::new(0, 0, 0), |c| c.get_block(0, 0, 0));
        assert_eq!(block, Some(STONE));
    }

    #[test]
    fn edit_covering_whole_chunk_collapses_to_uniform_palette() {
        let store = fresh_loaded_world();
        let outcome = set_block(
            &store,
            IVec3::new(0, 0, 0),
            IVec3::splat(CHUNK_SIZE),
            STONE,
            false,
        )
        .unwrap();
        assert_eq!(outcome.modified.len(), 1);
        store.with_chunk(ChunkCoord::new(0, 0, 0), |c| {
            assert_eq!(c.palette(), &[STONE]);
            assert!(c.blocks_dense().is_none());
        });
    }

    #[test]
    fn negative_box_size_is_rejected() {
        let store = fresh_loaded_world();
        let err = set_block(&store, IVec3::ZERO, IVec3::new(-1, 1, 1), STONE, false);
        assert!(matches!(err, Err(EngineError::InvalidConfig(_))));
    }

    // Regression: painting part of a uniform chunk with the type it
    // already holds must not panic (ensure_palette_index must allocate
    // dense storage even when the palette itself doesn't grow).
    #[test]
    fn partial_edit_with_chunks_own_uniform_type_does_not_panic() {
        let store = ChunkStore::new();
        store.insert_or_get(ChunkCoord::new(0, 0, 0));
        store.with_chunk_mut(ChunkCoord::new(0, 0, 0), |c| c.set_single_palette(STONE));

        let outcome = set_block(
            &store,
            IVec3::new(0, 0, 0),
            IVec3::new(1, 1, 1),
            STONE,
            false,
        )
        .unwrap();
        assert_eq!(outcome.modified, vec![ChunkCoord::new(0, 0, 0)]);
        let block = store.with_chunk(ChunkCoord::new(0, 0, 0), |c| c.get_block(0, 0, 0));
        assert_eq!(block, Some(STONE));
    }

    #[test]
    fn edit_spanning_unloaded_chunk_is_partial_but_coherent() {
        let store = ChunkStore::new();
        store.insert_or_get(ChunkCoord::new(0, 0, 0));
        store.with_chunk_mut(ChunkCoord::new(0, 0, 0), |c| c.set_single_palette(AIR));
        store.insert_or_get(ChunkCoord::new(1, 0, 0)); // present but never loaded

        let outcome = set_block(
            &store,
            IVec3::new(CHUNK_SIZE - 1, 0, 0),
            IVec3::new(2, 1, 1),
            STONE,
            false,
        )
        .unwrap();
        assert_eq!(outcome.modified, vec![ChunkCoord::new(0, 0, 0)]);
        assert_eq!(outcome.skipped, vec![ChunkCoord::new(1, 0, 0)]);
    }

    // set_block idempotence (§8 round-trip property).
    #[test]
    fn repeated_identical_edit_is_idempotent() {
        let store = fresh_loaded_world();
        let run = |store: &ChunkStore| {
            set_block(store, IVec3::new(2, 2, 2), IVec3::new(3, 3, 3), STONE, true).unwrap()
        };
        run(&store);
        let palette_after_first = store
            .with_chunk(ChunkCoord::new(0, 0, 0), |c| c.palette().to_vec())
            .unwrap();
        let blocks_after_first = store
            .with_chunk(ChunkCoord::new(0, 0, 0), |c| c.blocks_dense().map(|b| b.to_vec()))
            .unwrap();
        run(&store);
        let palette_after_second = store
            .with_chunk(ChunkCoord::new(0, 0, 0), |c| c.palette().to_vec())
            .unwrap();
        let blocks_after_second = store
            .with_chunk(ChunkCoord::new(0, 0, 0), |c| c.blocks_dense().map(|b| b.to_vec()))
            .unwrap();
        assert_eq!(palette_after_first, palette_after_second);
        assert_eq!(blocks_after_first, blocks_after_second);
        assert_eq!(blocks_after_first.map(|b| b.len()), Some(CHUNK_VOLUME));
    }

    #[test]
    fn affected_remesh_targets_include_touched_neighbors() {
        let modified = vec![ChunkCoord::new(0, 0, 0)];
        let targets = affected_remesh_targets(
            IVec3::new(0, 0, 0),
            IVec3::new(1, CHUNK_SIZE, CHUNK_SIZE),
            &modified,
        );
        assert!(targets.contains(&ChunkCoord::new(0, 0, 0)));
        assert!(targets.contains(&ChunkCoord::new(-1, 0, 0)));
        assert!(!targets.contains(&ChunkCoord::new(1, 0, 0)));
    }
}
