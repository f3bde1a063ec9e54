//! DDA raycaster (C7, §4.7): Amanatides-Woo grid traversal across the
//! sparse chunk volume, fast-forwarding through absent or uniform
//! chunks instead of stepping block-by-block through them.

use glam::{IVec3, Vec3};

use crate::block::{is_solid, BlockType, AIR};
use crate::coord::{chunk_pos, CHUNK_SIZE};
use crate::store::ChunkStore;

/// Safety cap on DDA steps (§4.7).
const MAX_ITERATIONS: usize = 1024;

/// Small forward nudge used only to resolve which cell a ray parameter
/// falls in. Without it, a `t` that lands exactly on a cell boundary
/// (which happens after every exact-box exit) floors ambiguously: the
/// nudge biases the lookup toward the cell the ray is about to spend
/// time in, consistent with the direction of travel.
const LOOKUP_EPSILON: f32 = 1e-4;

/// Result of a successful raycast.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub block_type: BlockType,
    pub distance: f32,
    pub position: Vec3,
    pub normal: IVec3,
}

/// One ULP below `x` (toward negative infinity). Manual bit-twiddling
/// since this crate targets a Rust edition predating stable
/// `f32::next_down`.
fn next_down(x: f32) -> f32 {
    if x.is_nan() || x == f32::NEG_INFINITY {
        return x;
    }
    if x == 0.0 {
        return -f32::MIN_POSITIVE;
    }
    let bits = x.to_bits();
    let next = if x > 0.0 { bits - 1 } else { bits + 1 };
    f32::from_bits(next)
}

/// One ULP above `x` (toward positive infinity).
fn next_up(x: f32) -> f32 {
    if x.is_nan() || x == f32::INFINITY {
        return x;
    }
    if x == 0.0 {
        return f32::MIN_POSITIVE;
    }
    let bits = x.to_bits();
    let next = if x > 0.0 { bits + 1 } else { bits - 1 };
    f32::from_bits(next)
}

/// Computes the minimal ray parameter `t` at which `origin + t*dir` exits
/// the axis-aligned box `[cell_min, cell_min + cell_size)`, plus the exit
/// face's outward normal. Assumes the ray currently lies inside the box.
fn exit_time(origin: Vec3, dir: Vec3, cell_min: Vec3, cell_size: f32) -> (f32, IVec3) {
    let mut best_t = f32::INFINITY;
    let mut best_normal = IVec3::ZERO;
    for axis in 0..3 {
        let o = origin[axis];
        let d = dir[axis];
        let min_b = cell_min[axis];
        let max_b = min_b + cell_size;
        if d > 0.0 {
            let t = (max_b - o) / d;
            if t < best_t {
                best_t = t;
                best_normal = axis_unit(axis, 1);
            }
        } else if d < 0.0 {
            let t = (min_b - o) / d;
            if t < best_t {
                best_t = t;
                best_normal = axis_unit(axis, -1);
            }
        }
    }
    (best_t, best_normal)
}

fn axis_unit(axis: usize, sign: i32) -> IVec3 {
    match axis {
        0 => IVec3::new(sign, 0, 0),
        1 => IVec3::new(0, sign, 0),
        _ => IVec3::new(0, 0, sign),
    }
}

/// Nudges `position` by one ULP along `normal`'s nonzero axis, away from
/// the hit cell and back toward the ray origin, per §4.7's
/// floating-point leakage guard.
fn nudge_toward_origin(mut position: Vec3, normal: IVec3) -> Vec3 {
    if normal.x > 0 {
        position.x = next_up(position.x);
    } else if normal.x < 0 {
        position.x = next_down(position.x);
    }
    if normal.y > 0 {
        position.y = next_up(position.y);
    } else if normal.y < 0 {
        position.y = next_down(position.y);
    }
    if normal.z > 0 {
        position.z = next_up(position.z);
    } else if normal.z < 0 {
        position.z = next_down(position.z);
    }
    position
}

/// Casts a ray from `origin` along unit `direction` up to `max_distance`
/// blocks, fast-forwarding through absent or single-palette chunks
/// (§4.7). Returns `None` on a miss (ran past `max_distance`, or hit the
/// iteration safety cap without resolving a solid block).
pub fn raycast(
    store: &ChunkStore,
    origin: Vec3,
    direction: Vec3,
    max_distance: f32,
) -> Option<RayHit> {
    let mut t = 0.0f32;
    let mut entry_normal = IVec3::ZERO;

    for _ in 0..MAX_ITERATIONS {
        if t > max_distance {
            return None;
        }
        let position = origin + direction * t;
        let lookup_position = origin + direction * (t + LOOKUP_EPSILON);
        let block_pos = lookup_position.floor().as_ivec3();
        let coord = chunk_pos(block_pos);

        let chunk_state = store.with_chunk(coord, |c| {
            if !c.is_loaded() {
                None
            } else {
                Some(c.uniform_block())
            }
        });

        let (cell_min, cell_size, block_type) = match chunk_state.flatten() {
            None => {
                // Absent or unloaded chunk: treat as air, skip the whole chunk.
                (coord.origin().as_vec3(), CHUNK_SIZE as f32, AIR)
            }
            Some(Some(uniform)) => {
                // Single-palette chunk: skip the whole chunk at once.
                (coord.origin().as_vec3(), CHUNK_SIZE as f32, uniform)
            }
            Some(None) => {
                // Multi-palette chunk: step one block at a time.
                let local = crate::coord::local_pos(block_pos, coord);
                let block_type = store
                    .with_chunk(coord, |c| c.get_block(local.x, local.y, local.z))
                    .unwrap_or(AIR);
                (block_pos.as_vec3(), 1.0, block_type)
            }
        };

        if is_solid(block_type) {
            let hit_position = nudge_toward_origin(position, entry_normal);
            return Some(RayHit {
                block_type,
                distance: t,
                position: hit_position,
                normal: entry_normal,
            });
        }

        let (exit_t, exit_normal) = exit_time(origin, direction, cell_min, cell_size);
        if !exit_t.is_finite() || exit_t <= t {
            return None; // direction component is zero/degenerate; can't progress
        }
        t = exit_t;
        entry_normal = -exit_normal;
    }
    None
}
