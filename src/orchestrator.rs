//! Streaming orchestrator (C9, §4.9, §5): drives chunk loading,
//! generation, connectivity, and meshing around a moving viewpoint,
//! batching CPU-heavy work onto a `rayon` worker pool.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use glam::IVec3;
use parking_lot::RwLock;
use rayon::prelude::*;

use crate::block::BlockRegistry;
use crate::chunk::ChunkFlags;
use crate::config::EngineConfig;
use crate::connectivity::compute_connectivity;
use crate::coord::{ChunkCoord, ALL_FACES};
use crate::error::Result;
use crate::generator::{fill_chunk_cpu, fill_chunks_gpu, GpuDispatcher};
use crate::mesh::{extract_mesh, MeshBuffer, Neighbors};
use crate::store::ChunkStore;

/// LIFO recycling pool for mesh buffers, bucketed by vertex capacity
/// rather than chunk identity (§3, §4.9), so a chunk that shrinks its
/// mesh doesn't force a fresh allocation for the next chunk that needs
/// roughly the same size.
#[derive(Default)]
pub struct MeshPool {
    buckets: parking_lot::Mutex<HashMap<usize, Vec<MeshBuffer>>>,
}

impl MeshPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes a recycled buffer with at least `min_capacity` vertex slots
    /// already reserved, or allocates a fresh one.
    pub fn acquire(&self, min_capacity: usize) -> MeshBuffer {
        let mut buckets = self.buckets.lock();
        if let Some(bucket) = buckets.get_mut(&min_capacity) {
            if let Some(mut buf) = bucket.pop() {
                buf.vertices.clear();
                buf.indices.clear();
                return buf;
            }
        }
        MeshBuffer {
            vertices: Vec::with_capacity(min_capacity),
            indices: Vec::with_capacity(min_capacity * 2),
        }
    }

    /// Returns a buffer to the pool, bucketed by its current capacity.
    pub fn release(&self, buf: MeshBuffer) {
        let capacity = buf.vertices.capacity();
        self.buckets.lock().entry(capacity).or_default().push(buf);
    }

    pub fn len(&self) -> usize {
        self.buckets.lock().values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Per-chunk published render state (§3 "render record").
pub struct RenderRecord {
    pub mesh: MeshBuffer,
    pub connected_faces: u16,
}

/// Outcome of one `update_viewer` pass (§4.9 steps 1-3).
#[derive(Debug, Clone, Default)]
pub struct StreamTick {
    /// Newly-created chunks now pending generation.
    pub load: Vec<ChunkCoord>,
    /// Already-loaded neighbors of newly tracked chunks, due a re-mesh
    /// once their new neighbor's data arrives.
    pub render_refresh: Vec<ChunkCoord>,
    /// Chunks disposed because they left the view distance.
    pub unloaded: Vec<ChunkCoord>,
}

/// Coordinates the chunk store, generation, connectivity, and meshing
/// around a moving viewpoint (§4.9, §5).
pub struct StreamingOrchestrator {
    store: ChunkStore,
    config: EngineConfig,
    registry: BlockRegistry,
    mesh_pool: MeshPool,
    render_map: RwLock<HashMap<ChunkCoord, RenderRecord>>,
    cancel: Arc<AtomicBool>,
    outstanding: Arc<AtomicUsize>,
}

impl StreamingOrchestrator {
    pub fn new(config: EngineConfig, registry: BlockRegistry) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: ChunkStore::new(),
            config,
            registry,
            mesh_pool: MeshPool::new(),
            render_map: RwLock::new(HashMap::new()),
            cancel: Arc::new(AtomicBool::new(false)),
            outstanding: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn store(&self) -> &ChunkStore {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn mesh_pool(&self) -> &MeshPool {
        &self.mesh_pool
    }

    pub fn render_map_len(&self) -> usize {
        self.render_map.read().len()
    }

    pub fn has_render_record(&self, coord: ChunkCoord) -> bool {
        self.render_map.read().contains_key(&coord)
    }

    /// Cancellation token threaded through every asynchronous step (§5).
    pub fn cancellation_token(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// §4.9 steps 1-3: marks every tracked chunk out of view, re-marks
    /// the `(2V)^3` window around `viewer_chunk`, queues newly-created
    /// chunks for generation, and disposes everything left out of view.
    pub fn update_viewer(&self, viewer_chunk: ChunkCoord) -> StreamTick {
        let v = self.config.view_distance as i32;
        let mut tick = StreamTick::default();

        for coord in self.store.all_coords() {
            self.store
                .with_chunk_mut(coord, |c| c.set_flag(ChunkFlags::IS_IN_VIEW_DISTANCE, false));
        }

        for dz in -v..v {
            for dy in -v..v {
                for dx in -v..v {
                    let coord = viewer_chunk.offset(dx, dy, dz);
                    let created = self.store.insert_or_get(coord);
                    self.store
                        .with_chunk_mut(coord, |c| c.set_flag(ChunkFlags::IS_IN_VIEW_DISTANCE, true));

                    if created {
                        self.store.with_chunk_mut(coord, |c| {
                            c.set_flag(ChunkFlags::IS_PENDING_UPDATE, true)
                        });
                        tick.load.push(coord);
                    }
                    for face in ALL_FACES {
                        let neighbor = face.neighbor(coord);
                        if self.store.with_chunk(neighbor, |c| c.is_loaded()) == Some(true) {
                            tick.render_refresh.push(neighbor);
                        }
                    }
                }
            }
        }

        // Two-phase collect-then-delete to avoid iterator invalidation (§5).
        let to_unload: Vec<ChunkCoord> = self
            .store
            .all_coords()
            .into_iter()
            .filter(|&c| {
                self.store
                    .with_chunk(c, |c| !c.flags().contains(ChunkFlags::IS_IN_VIEW_DISTANCE))
                    .unwrap_or(false)
            })
            .collect();
        for coord in to_unload {
            self.store.with_chunk_mut(coord, |c| c.dispose());
            self.store.remove(coord);
            if let Some(record) = self.render_map.write().remove(&coord) {
                self.mesh_pool.release(record.mesh);
            }
            tick.unloaded.push(coord);
        }

        tick
    }

    /// §4.9 step 4: fills every pending chunk, on the GPU collaborator if
    /// the variant supports it and GPU is enabled, else on the `rayon`
    /// worker pool. Returns the chunks that finished generating.
    pub fn generate_pending(
        &self,
        pending: &[ChunkCoord],
        dispatcher: Option<&dyn GpuDispatcher>,
    ) -> Result<Vec<ChunkCoord>> {
        if pending.is_empty() {
            return Ok(Vec::new());
        }
        self.outstanding.fetch_add(pending.len(), Ordering::SeqCst);

        let use_gpu = self.config.use_gpu_compute
            && self.config.generator.variant.gpu_supported()
            && dispatcher.is_some();

        if use_gpu {
            let dispatcher = dispatcher.expect("checked above");
            for batch in pending.chunks(crate::config::MAX_CHUNKS_PER_DISPATCH) {
                let mut snapshot: Vec<crate::chunk::Chunk> = batch
                    .iter()
                    .map(|&c| {
                        self.store
                            .with_chunk(c, |chunk| chunk.clone())
                            .unwrap_or_else(|| crate::chunk::Chunk::new(c))
                    })
                    .collect();
                let mut targets: Vec<(ChunkCoord, &mut crate::chunk::Chunk)> =
                    batch.iter().copied().zip(snapshot.iter_mut()).collect();
                fill_chunks_gpu(
                    dispatcher,
                    self.config.generator.variant,
                    &self.config.generator,
                    &mut targets,
                )?;
                for (coord, filled) in batch.iter().zip(snapshot.into_iter()) {
                    self.store.with_chunk_mut(*coord, |c| *c = filled);
                    if self.config.cull_chunks {
                        self.store.with_chunk_mut(*coord, compute_connectivity);
                    }
                    self.store.with_chunk_mut(*coord, |c| {
                        c.set_flag(ChunkFlags::IS_PENDING_UPDATE, false)
                    });
                }
            }
        } else {
            // Workers hand generated chunks back to the main context over
            // a bounded channel rather than a blocking collect, so the
            // main context can start merging the first finished chunks
            // while the rest of the batch is still generating (§5:
            // "hand-off to a worker ... hand-back to the main context for
            // chunk-store mutation").
            let cancel = Arc::clone(&self.cancel);
            let (tx, rx) = crossbeam_channel::bounded::<(ChunkCoord, Result<crate::chunk::Chunk>)>(
                pending.len().max(1),
            );
            let generator_cfg = self.config.generator;
            rayon::scope(|scope| {
                for &coord in pending {
                    let cancel = Arc::clone(&cancel);
                    let tx = tx.clone();
                    scope.spawn(move |_| {
                        if cancel.load(Ordering::SeqCst) {
                            return;
                        }
                        let mut chunk = crate::chunk::Chunk::new(coord);
                        let result = fill_chunk_cpu(&mut chunk, coord, &generator_cfg).map(|_| chunk);
                        let _ = tx.send((coord, result));
                    });
                }
                drop(tx);
            });
            let mut generated = Vec::with_capacity(pending.len());
            for (coord, result) in rx.iter() {
                match result {
                    Ok(filled) => {
                        self.store.with_chunk_mut(coord, |c| *c = filled);
                        if self.config.cull_chunks {
                            self.store.with_chunk_mut(coord, compute_connectivity);
                        }
                        self.store.with_chunk_mut(coord, |c| {
                            c.set_flag(ChunkFlags::IS_PENDING_UPDATE, false)
                        });
                        generated.push(coord);
                    }
                    Err(err) => {
                        // §7: invalid configuration fails the operation
                        // rather than silently producing a broken chunk;
                        // the chunk stays unloaded and pending so the next
                        // pass retries it once the config is fixed.
                        log::error!("generation failed for chunk {coord:?}: {err}");
                    }
                }
            }
            self.outstanding.fetch_sub(pending.len(), Ordering::SeqCst);
            return Ok(generated);
        }

        self.outstanding.fetch_sub(pending.len(), Ordering::SeqCst);
        Ok(pending.to_vec())
    }

    /// §4.9 step 6: re-meshes `coords` in batches of `max(8, N/8)`,
    /// publishing results into the render map on return.
    pub fn remesh(&self, coords: &[ChunkCoord]) {
        if coords.is_empty() {
            return;
        }
        let batch_size = (coords.len() / 8).max(8);
        for batch in coords.chunks(batch_size) {
            let meshes: Vec<(ChunkCoord, MeshBuffer, u16)> = batch
                .par_iter()
                .filter_map(|&coord| self.mesh_one(coord))
                .collect();
            let mut render_map = self.render_map.write();
            for (coord, mesh, connected_faces) in meshes {
                if mesh.is_empty() {
                    if let Some(old) = render_map.remove(&coord) {
                        self.mesh_pool.release(old.mesh);
                    }
                } else if let Some(old) = render_map.insert(coord, RenderRecord { mesh, connected_faces }) {
                    self.mesh_pool.release(old.mesh);
                }
            }
        }
    }

    fn mesh_one(&self, coord: ChunkCoord) -> Option<(ChunkCoord, MeshBuffer, u16)> {
        let chunk = self.store.with_chunk(coord, |c| c.clone())?;
        if !chunk.is_loaded() {
            return None;
        }
        let neighbor_chunks: Vec<Option<crate::chunk::Chunk>> = ALL_FACES
            .iter()
            .map(|f| self.store.with_chunk(f.neighbor(coord), |c| c.clone()))
            .collect();
        let neighbors: Neighbors = std::array::from_fn(|i| neighbor_chunks[i].as_ref());
        let mesh = extract_mesh(&chunk, &neighbors, &self.registry, self.config.add_border_walls);
        Some((coord, mesh, chunk.connected_faces()))
    }

    /// Cancels the current pass, quiesces every outstanding worker task
    /// (spin-wait on the atomic counter per §5), then disposes every
    /// tracked chunk and clears the render map.
    pub fn unload_all(&self) {
        self.cancel.store(true, Ordering::SeqCst);
        while self.outstanding.load(Ordering::SeqCst) != 0 {
            std::hint::spin_loop();
        }
        for coord in self.store.all_coords() {
            self.store.remove(coord);
        }
        for (_, record) in self.render_map.write().drain() {
            self.mesh_pool.release(record.mesh);
        }
        self.cancel.store(false, Ordering::SeqCst);
    }

    /// World-space position of the chunk containing `world_block_pos`.
    pub fn viewer_chunk_for(&self, world_block_pos: IVec3) -> ChunkCoord {
        crate::coord::chunk_pos(world_block_pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{BlockRegistry, AIR};
    use crate::config::{EngineConfig, GeneratorConfig, GeneratorVariant};

    fn flat_config(view_distance: u32) -> EngineConfig {
        EngineConfig {
            view_distance,
            generator: GeneratorConfig {
                variant: GeneratorVariant::Flat,
                ..GeneratorConfig::default()
            },
            use_gpu_compute: false,
            add_border_walls: false,
            cull_chunks: true,
            worker_threads: None,
        }
    }

    // E1: view_distance = 1 around the origin loads 8 chunks; after
    // generation, exactly the 4 below y=0 have solid content.
    #[test]
    fn e1_flat_world_settles_into_eight_chunks_four_solid() {
        let orch = StreamingOrchestrator::new(flat_config(1), BlockRegistry::new()).unwrap();
        let tick = orch.update_viewer(ChunkCoord::new(0, 0, 0));
        assert_eq!(orch.store().len(), 8);
        assert_eq!(tick.load.len(), 8);

        orch.generate_pending(&tick.load, None).unwrap();
        let solid_count = orch
            .store()
            .all_coords()
            .into_iter()
            .filter(|&c| orch.store().with_chunk(c, |chunk| chunk.uniform_block() != Some(AIR)).unwrap())
            .count();
        assert_eq!(solid_count, 4);

        orch.remesh(&orch.store().all_coords());
        assert_eq!(orch.render_map_len(), 4);
    }

    // E6: incrementing the viewer's chunk x by 1 with view_distance = 2
    // loads one new x-slab (4*4=16 chunks) and unloads the opposite one.
    #[test]
    fn e6_viewer_shift_loads_and_unloads_one_slab() {
        let orch = StreamingOrchestrator::new(flat_config(2), BlockRegistry::new()).unwrap();
        orch.update_viewer(ChunkCoord::new(0, 0, 0));
        let tick = orch.update_viewer(ChunkCoord::new(1, 0, 0));
        assert_eq!(tick.load.len(), 16);
        assert_eq!(tick.unloaded.len(), 16);
    }

    // Regression: CustomTerrain has no CPU fallback (generator.rs), and
    // selecting it without a GPU dispatcher must surface as a failed
    // generation rather than silently storing a still-unloaded chunk as
    // if it had succeeded.
    #[test]
    fn custom_terrain_without_gpu_dispatcher_is_not_reported_as_generated() {
        let config = EngineConfig {
            view_distance: 1,
            generator: GeneratorConfig {
                variant: GeneratorVariant::CustomTerrain,
                ..GeneratorConfig::default()
            },
            use_gpu_compute: false,
            add_border_walls: false,
            cull_chunks: true,
            worker_threads: None,
        };
        let orch = StreamingOrchestrator::new(config, BlockRegistry::new()).unwrap();
        let tick = orch.update_viewer(ChunkCoord::new(0, 0, 0));
        let generated = orch.generate_pending(&tick.load, None).unwrap();
        assert!(generated.is_empty());
        for coord in tick.load {
            let still_unloaded = orch.store().with_chunk(coord, |c| !c.is_loaded()).unwrap();
            assert!(still_unloaded, "{coord:?} must not be marked generated");
        }
    }

    #[test]
    fn mesh_pool_recycles_by_capacity_not_identity() {
        let pool = MeshPool::new();
        let buf = pool.acquire(64);
        let capacity = buf.vertices.capacity();
        pool.release(buf);
        assert_eq!(pool.len(), 1);
        let reused = pool.acquire(capacity);
        assert_eq!(pool.len(), 0);
        assert!(reused.vertices.is_empty());
    }
}
