//! Top-level engine facade (C9 entry point, §4.9, §6): the object an
//! embedding application owns and drives once per viewer update. Wires
//! the chunk store, streaming orchestrator, edit engine, raycaster, and
//! visibility traversal behind one API, the way the reference engine's
//! own `engine.rs` aggregates its subsystems behind `VoxelEngine`.

use glam::{IVec3, Vec3};

use crate::block::BlockRegistry;
use crate::config::EngineConfig;
use crate::coord::{chunk_pos, ChunkCoord};
use crate::edit::{self, EditOutcome};
use crate::error::Result;
use crate::generator::GpuDispatcher;
use crate::orchestrator::StreamingOrchestrator;
use crate::raycast::{self, RayHit};
use crate::store::ChunkStore;
use crate::visibility::{self, Frustum, VisibilitySource, VisibleChunk};

/// The voxel world engine: owns the chunk store and drives generation,
/// connectivity, and meshing through the streaming orchestrator as the
/// viewer moves (§4.9). Raycasting and edits are exposed directly since
/// they short-circuit through C4/C5 rather than going through a tick.
pub struct VoxelEngine {
    orchestrator: StreamingOrchestrator,
    viewer_chunk: ChunkCoord,
}

impl VoxelEngine {
    pub fn new(config: EngineConfig, registry: BlockRegistry) -> Result<Self> {
        Ok(Self {
            orchestrator: StreamingOrchestrator::new(config, registry)?,
            viewer_chunk: ChunkCoord::new(0, 0, 0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        self.orchestrator.config()
    }

    pub fn store(&self) -> &ChunkStore {
        self.orchestrator.store()
    }

    /// Drives one full streaming pass for a viewer at `world_position`
    /// (§4.9 steps 1-6): recomputes the `(2V)^3` window, generates newly
    /// loaded chunks (CPU or GPU per configuration), and re-meshes
    /// everything the pass touched. Returns the chunks that now have a
    /// published mesh, for a caller that wants to know what changed.
    pub fn update_viewer(
        &mut self,
        world_position: Vec3,
        dispatcher: Option<&dyn GpuDispatcher>,
    ) -> Result<Vec<ChunkCoord>> {
        let viewer_chunk = chunk_pos(world_position.floor().as_ivec3());
        self.viewer_chunk = viewer_chunk;

        let tick = self.orchestrator.update_viewer(viewer_chunk);
        let generated = self.orchestrator.generate_pending(&tick.load, dispatcher)?;

        let mut to_remesh = generated.clone();
        to_remesh.extend(tick.render_refresh.iter().copied());
        to_remesh.sort_unstable_by_key(|c| (c.x(), c.y(), c.z()));
        to_remesh.dedup();

        self.orchestrator.remesh(&to_remesh);
        Ok(to_remesh)
    }

    /// Edit engine entry point (C8, §4.8): sets every block in
    /// `[box_min, box_min + box_size)` to `block_type`, then re-meshes
    /// every chunk the edit touched plus its affected neighbors.
    pub fn set_block(
        &mut self,
        box_min: IVec3,
        box_size: IVec3,
        block_type: crate::block::BlockType,
    ) -> Result<EditOutcome> {
        let cull_chunks = self.config().cull_chunks;
        let outcome = edit::set_block(self.store(), box_min, box_size, block_type, cull_chunks)?;
        let targets = edit::affected_remesh_targets(box_min, box_min + box_size, &outcome.modified);
        self.orchestrator.remesh(&targets);
        Ok(outcome)
    }

    /// Raycaster entry point (C7, §4.7).
    pub fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit> {
        raycast::raycast(self.store(), origin, direction, max_distance)
    }

    /// Visibility traversal entry point (C6, §4.6). Returns an empty
    /// list outright when `cull_chunks` is disabled (§6: `cull_chunks`
    /// disables C5/C6), since no connectivity data would be trustworthy.
    pub fn visible_chunks(
        &self,
        forward: Vec3,
        horizontal_fov_degrees: f32,
        frustum: &Frustum,
    ) -> Vec<VisibleChunk> {
        if !self.config().cull_chunks {
            return Vec::new();
        }
        let view_distance = self.config().view_distance as i32;
        visibility::traverse(
            &RenderMapSource(&self.orchestrator),
            self.viewer_chunk,
            forward,
            horizontal_fov_degrees,
            view_distance,
            frustum,
        )
    }

    /// Cancels the current pass and tears down every tracked chunk and
    /// published mesh (§5 `Unload()`).
    pub fn unload_all(&self) {
        self.orchestrator.unload_all();
    }
}

/// Adapts the orchestrator's chunk store + render map into the
/// [`VisibilitySource`] the traversal module depends on, keeping
/// `visibility.rs` free of any concrete storage type (§5).
struct RenderMapSource<'a>(&'a StreamingOrchestrator);

impl VisibilitySource for RenderMapSource<'_> {
    fn connected_faces(&self, coord: ChunkCoord) -> Option<u16> {
        self.0.store().with_chunk(coord, |c| c.connected_faces())
    }

    fn has_mesh(&self, coord: ChunkCoord) -> bool {
        self.0.has_render_record(coord)
    }
}
