//! Core voxel world engine: chunk streaming, palette compression,
//! cross-chunk meshing, connected-face culling, visibility traversal,
//! raycasting, and local edits (see `SPEC_FULL.md` for the full design).
//!
//! Out of scope, by design: mesh-buffer GPU upload, materials/texture
//! atlases beyond the read-only [`block::BlockRegistry`], input
//! handling, on-screen debug widgets, the GPU procedural-generation
//! shader itself (only its dispatch contract, [`generator::GpuDispatcher`],
//! lives here), scene graphs, physics, lighting, biomes, networking, and
//! disk persistence.

pub mod block;
pub mod chunk;
pub mod config;
pub mod connectivity;
pub mod coord;
pub mod edit;
pub mod engine;
pub mod error;
pub mod generator;
pub mod logging;
pub mod mesh;
pub mod orchestrator;
pub mod raycast;
pub mod store;
pub mod visibility;

/// Common imports for embedding applications.
pub mod prelude {
    pub use crate::block::{BlockRegistry, BlockType, AtlasRect, BlockTypeInfo, AIR, STONE};
    pub use crate::chunk::{Chunk, ChunkFlags};
    pub use crate::config::{EngineConfig, GeneratorConfig, GeneratorVariant};
    pub use crate::coord::{ChunkCoord, Face, CHUNK_SIZE, CHUNK_VOLUME};
    pub use crate::edit::EditOutcome;
    pub use crate::engine::VoxelEngine;
    pub use crate::error::{EngineError, Result};
    pub use crate::generator::GpuDispatcher;
    pub use crate::mesh::{MeshBuffer, Vertex};
    pub use crate::raycast::RayHit;
    pub use crate::visibility::{Frustum, VisibleChunk, VisibilitySource};

    pub use glam::{IVec3, Mat4, Vec3};
}

/// Current engine version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
