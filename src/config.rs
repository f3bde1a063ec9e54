//! The engine's input configuration record (§6, §10).
//!
//! A single [`EngineConfig`] aggregates every tunable the spec enumerates,
//! the way the reference engine's `config::core::EngineConfig` /
//! `ChunkSysConfig` aggregate rendering and chunk-system settings. This
//! crate never reads or writes configuration from disk itself
//! (persistence is a non-goal); `serde` derives just let an embedding
//! application deserialize one from whatever format it likes.

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Maximum chunks batched into a single GPU kernel dispatch (§4.3).
pub const MAX_CHUNKS_PER_DISPATCH: usize = 4096;

/// Tagged union of the seven generator variants (§4.3, §9): dispatched
/// once per chunk, no inheritance hierarchy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum GeneratorVariant {
    Flat,
    Plane,
    Simplex2D,
    Perlin2D,
    Simplex3D,
    Perlin3D,
    /// Opaque GPU-only variant; has no CPU fallback (§4.3).
    CustomTerrain,
}

impl GeneratorVariant {
    /// Whether the GPU dispatch collaborator can execute this variant.
    pub fn gpu_supported(self) -> bool {
        !matches!(self, GeneratorVariant::Flat | GeneratorVariant::Plane)
    }
}

/// Generator parameters: variant plus the four shared factors (§4.3).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub variant: GeneratorVariant,
    pub seed: u32,
    pub offset: Vec3,
    pub scale: Vec3,
    pub offset2: f32,
    pub scale2: f32,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            variant: GeneratorVariant::Flat,
            seed: 0,
            offset: Vec3::ZERO,
            scale: Vec3::ONE,
            offset2: 0.0,
            scale2: 1.0,
        }
    }
}

/// Aggregate engine configuration (§6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Per-axis radius in chunks kept loaded around the viewer.
    pub view_distance: u32,
    pub generator: GeneratorConfig,
    /// Falls back to CPU if the variant is unsupported by the GPU path.
    pub use_gpu_compute: bool,
    /// Treats absent neighbor chunks as transparent during meshing.
    pub add_border_walls: bool,
    /// Disables the connectivity analyzer and visibility traversal when false.
    pub cull_chunks: bool,
    /// Worker-pool size; `None` uses rayon's global pool sizing.
    pub worker_threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            view_distance: 8,
            generator: GeneratorConfig::default(),
            use_gpu_compute: false,
            add_border_walls: false,
            cull_chunks: true,
            worker_threads: None,
        }
    }
}

impl EngineConfig {
    /// Validates the configuration per the "invalid configuration" error
    /// class (§7): `view_distance < 1` is a programmer error, failed
    /// eagerly with no partial mutation.
    pub fn validate(&self) -> Result<()> {
        if self.view_distance < 1 {
            return Err(EngineError::InvalidConfig(
                "view_distance must be >= 1".into(),
            ));
        }
        Ok(())
    }
}
