//! Procedural filler (C3, §4.3): fills a chunk's blocks from a
//! parameterized generator, either on a worker thread or via the GPU
//! dispatch collaborator.

use std::cell::RefCell;

use glam::{IVec3, Vec3};
use noise::{NoiseFn, Perlin, Simplex};
use once_cell::sync::Lazy;
use thread_local::ThreadLocal;

use crate::block::{BlockType, AIR, STONE};
use crate::chunk::Chunk;
use crate::config::{GeneratorConfig, GeneratorVariant, MAX_CHUNKS_PER_DISPATCH};
use crate::coord::{ChunkCoord, CHUNK_SIZE, CHUNK_VOLUME};
use crate::error::{EngineError, Result};

/// Per-worker scratch buffer for the dense raw fill output (§5: "owned
/// per worker and reused across chunks assigned to that worker"). One
/// slot per `rayon` worker thread, lazily allocated on first use and
/// kept for the lifetime of the process.
static FILL_SCRATCH: Lazy<ThreadLocal<RefCell<Vec<BlockType>>>> = Lazy::new(ThreadLocal::new);

/// Deterministic, position-stable noise sampler (§4.3: "same input =>
/// same output across runs and threads"). Perlin/Simplex from the `noise`
/// crate are pure functions of position given a fixed seed, satisfying
/// this without any extra synchronization.
struct NoiseSampler {
    perlin: Perlin,
    simplex: Simplex,
}

impl NoiseSampler {
    fn new(seed: u32) -> Self {
        Self {
            perlin: Perlin::new(seed),
            simplex: Simplex::new(seed),
        }
    }
}

/// Evaluates the generator's solidity predicate at a single world-space
/// block position (§4.3). Pulled out of the per-chunk loop so both the
/// CPU filler and round-trip tests can share the exact same formula.
fn is_solid_at(cfg: &GeneratorConfig, sampler: &NoiseSampler, world: IVec3) -> bool {
    let (x, y, z) = (world.x as f64, world.y as f64, world.z as f64);
    match cfg.variant {
        GeneratorVariant::Flat => (y as f32 + cfg.offset.y * cfg.scale.y) < 0.0,
        GeneratorVariant::Plane => {
            let lhs = (x as f32 + cfg.offset.x) * cfg.scale.x
                + (z as f32 + cfg.offset.z) * cfg.scale.z;
            let rhs = (y as f32 + cfg.offset.y) * cfg.scale.y;
            lhs > rhs
        }
        GeneratorVariant::Simplex2D => {
            let n = sampler.simplex.get([x * cfg.scale.x as f64, z * cfg.scale.z as f64]);
            (n as f32 + cfg.offset2) * cfg.scale2 > y as f32
        }
        GeneratorVariant::Perlin2D => {
            let n = sampler.perlin.get([x * cfg.scale.x as f64, z * cfg.scale.z as f64]);
            (n as f32 + cfg.offset2) * cfg.scale2 > y as f32
        }
        GeneratorVariant::Simplex3D => {
            let n = sampler.simplex.get([
                x * cfg.scale.x as f64,
                y * cfg.scale.y as f64,
                z * cfg.scale.z as f64,
            ]);
            (n as f32 + cfg.offset2) * cfg.scale2 > y as f32
        }
        GeneratorVariant::Perlin3D => {
            let n = sampler.perlin.get([
                x * cfg.scale.x as f64,
                y * cfg.scale.y as f64,
                z * cfg.scale.z as f64,
            ]);
            (n as f32 + cfg.offset2) * cfg.scale2 > y as f32
        }
        GeneratorVariant::CustomTerrain => unreachable!("CustomTerrain has no CPU path"),
    }
}

/// Fills `chunk` on the CPU per the output contract of §4.3: computes a
/// dense S^3 byte array, then collapses to a single-entry palette if only
/// one block type appears, else emits `[Air, Stone]` with the dense copy.
pub fn fill_chunk_cpu(chunk: &mut Chunk, position: ChunkCoord, cfg: &GeneratorConfig) -> Result<()> {
    if cfg.variant == GeneratorVariant::CustomTerrain {
        return Err(EngineError::InvalidConfig(
            "CustomTerrain has no CPU fallback; dispatch via the GPU collaborator".into(),
        ));
    }
    let sampler = NoiseSampler::new(cfg.seed);
    let origin = position.origin();
    let scratch = FILL_SCRATCH.get_or(|| RefCell::new(vec![AIR; CHUNK_VOLUME]));
    let mut raw = scratch.borrow_mut();
    raw.iter_mut().for_each(|b| *b = AIR);
    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let world = origin + IVec3::new(x, y, z);
                if is_solid_at(cfg, &sampler, world) {
                    raw[crate::coord::linear_index(x, y, z)] = STONE;
                }
            }
        }
    }
    chunk.load_from_dense(position, &raw);
    Ok(())
}

/// The GPU dispatch collaborator's contract (§4.3, §6): an external
/// executor that, given chunk origins and generator parameters, produces
/// `S^3` raw bytes per chunk. The engine treats it as a black box behind
/// this trait; no shader code lives in this crate.
pub trait GpuDispatcher: Send + Sync {
    /// Dispatches one kernel invocation for `origins`, returning `S^3`
    /// bytes per chunk (raw block type ids, post-processed by the caller
    /// into a real palette per §9 open question (b)). Returns `None` on
    /// dispatch failure or cancellation (§7: treated as cancellation, not
    /// an error — pending chunks simply remain pending).
    fn dispatch(
        &self,
        variant: GeneratorVariant,
        cfg: &GeneratorConfig,
        origins: &[IVec3],
    ) -> Option<Vec<Vec<u8>>>;
}

/// Splits `coords` into batches of at most [`MAX_CHUNKS_PER_DISPATCH`]
/// and runs `dispatcher` over each, post-processing every chunk's raw
/// bytes back into a real palette (per §9 open question (b): the GPU
/// side's palette convention is not trusted, the engine recomputes it
/// from actual contents via [`Chunk::load_from_dense`]).
pub fn fill_chunks_gpu(
    dispatcher: &dyn GpuDispatcher,
    variant: GeneratorVariant,
    cfg: &GeneratorConfig,
    targets: &mut [(ChunkCoord, &mut Chunk)],
) -> Result<()> {
    for batch in targets.chunks_mut(MAX_CHUNKS_PER_DISPATCH) {
        let origins: Vec<IVec3> = batch.iter().map(|(c, _)| c.origin()).collect();
        let Some(results) = dispatcher.dispatch(variant, cfg, &origins) else {
            return Err(EngineError::GpuDispatchCancelled);
        };
        for ((coord, chunk), raw_bytes) in batch.iter_mut().zip(results) {
            let raw: Vec<crate::block::BlockType> =
                raw_bytes.iter().map(|&b| b as crate::block::BlockType).collect();
            chunk.load_from_dense(*coord, &raw);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::ChunkCoord;

    fn cfg(variant: GeneratorVariant) -> GeneratorConfig {
        GeneratorConfig {
            variant,
            seed: 42,
            offset: Vec3::ZERO,
            scale: Vec3::ONE,
            offset2: 0.0,
            scale2: 1.0,
        }
    }

    #[test]
    fn flat_below_origin_chunk_is_uniform_stone() {
        let mut c = Chunk::new(ChunkCoord::new(0, -1, 0));
        fill_chunk_cpu(&mut c, ChunkCoord::new(0, -1, 0), &cfg(GeneratorVariant::Flat)).unwrap();
        assert_eq!(c.uniform_block(), Some(STONE));
    }

    #[test]
    fn flat_above_origin_chunk_is_uniform_air() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        fill_chunk_cpu(&mut c, ChunkCoord::new(0, 0, 0), &cfg(GeneratorVariant::Flat)).unwrap();
        assert_eq!(c.uniform_block(), Some(AIR));
    }

    #[test]
    fn flat_every_block_matches_predicate() {
        let position = ChunkCoord::new(0, -1, 0);
        let generator = cfg(GeneratorVariant::Flat);
        let mut c = Chunk::new(position);
        fill_chunk_cpu(&mut c, position, &generator).unwrap();
        let sampler = NoiseSampler::new(generator.seed);
        let origin = position.origin();
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    let world = origin + IVec3::new(x, y, z);
                    let expected = if is_solid_at(&generator, &sampler, world) {
                        STONE
                    } else {
                        AIR
                    };
                    assert_eq!(c.get_block(x, y, z), expected);
                }
            }
        }
    }

    #[test]
    fn custom_terrain_has_no_cpu_path() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        let err = fill_chunk_cpu(&mut c, ChunkCoord::new(0, 0, 0), &cfg(GeneratorVariant::CustomTerrain));
        assert!(matches!(err, Err(EngineError::InvalidConfig(_))));
    }

    #[test]
    fn perlin2d_is_deterministic_across_calls() {
        let generator = cfg(GeneratorVariant::Perlin2D);
        let position = ChunkCoord::new(3, 0, -2);
        let mut c1 = Chunk::new(position);
        let mut c2 = Chunk::new(position);
        fill_chunk_cpu(&mut c1, position, &generator).unwrap();
        fill_chunk_cpu(&mut c2, position, &generator).unwrap();
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    assert_eq!(c1.get_block(x, y, z), c2.get_block(x, y, z));
                }
            }
        }
    }

    struct MockGpu;
    impl GpuDispatcher for MockGpu {
        fn dispatch(
            &self,
            _variant: GeneratorVariant,
            _cfg: &GeneratorConfig,
            origins: &[IVec3],
        ) -> Option<Vec<Vec<u8>>> {
            Some(origins.iter().map(|_| vec![1u8; CHUNK_VOLUME]).collect())
        }
    }

    #[test]
    fn gpu_dispatch_recomputes_palette_from_bytes() {
        let mock = MockGpu;
        let coord = ChunkCoord::new(0, 0, 0);
        let mut c = Chunk::new(coord);
        let mut targets: Vec<(ChunkCoord, &mut Chunk)> = vec![(coord, &mut c)];
        fill_chunks_gpu(&mock, GeneratorVariant::CustomTerrain, &cfg(GeneratorVariant::CustomTerrain), &mut targets)
            .unwrap();
        assert_eq!(c.uniform_block(), Some(1));
    }

    struct FailingGpu;
    impl GpuDispatcher for FailingGpu {
        fn dispatch(&self, _: GeneratorVariant, _: &GeneratorConfig, _: &[IVec3]) -> Option<Vec<Vec<u8>>> {
            None
        }
    }

    #[test]
    fn gpu_dispatch_failure_is_cancellation() {
        let failing = FailingGpu;
        let coord = ChunkCoord::new(0, 0, 0);
        let mut c = Chunk::new(coord);
        let mut targets: Vec<(ChunkCoord, &mut Chunk)> = vec![(coord, &mut c)];
        let err = fill_chunks_gpu(&failing, GeneratorVariant::CustomTerrain, &cfg(GeneratorVariant::CustomTerrain), &mut targets);
        assert!(matches!(err, Err(EngineError::GpuDispatchCancelled)));
    }
}
