//! Connectivity analyzer (C5, §4.5): flood fill computing which pairs of
//! a chunk's six faces are linked by a path of non-opaque blocks.

use crate::block::is_opaque;
use crate::chunk::Chunk;
use crate::coord::{face_pair_index, Face, ALL_CONNECTED, ALL_FACES, CHUNK_SIZE};

/// Recomputes `connected_faces` for `chunk` and writes it back.
///
/// Uniform chunks take the O(1) shortcut from §3/§4.5: uniform air is
/// fully connected, uniform opaque is fully disconnected. Anything else
/// runs the boundary-seeded flood fill.
pub fn compute_connectivity(chunk: &mut Chunk) {
    let mask = match chunk.uniform_block() {
        Some(t) if !is_opaque(t) => ALL_CONNECTED,
        Some(_) => 0,
        None => flood_fill_mask(chunk),
    };
    chunk.set_connected_faces(mask);
}

/// Standalone flood fill over a general `Fn` block lookup, so both the
/// chunk-backed path above and tests that build a raw grid share one
/// implementation.
fn flood_fill_mask(chunk: &Chunk) -> u16 {
    let get = |x: i32, y: i32, z: i32| chunk.get_block(x, y, z);
    flood_fill_over(get)
}

/// Core kernel (§9: "the core kernel of connectivity combination"): seeds
/// a BFS from every non-opaque boundary cell, tracks which of the six
/// faces each connected component touches, and folds every touched face
/// set into the 15-bit pair mask.
pub fn flood_fill_over(get_block: impl Fn(i32, i32, i32) -> crate::block::BlockType) -> u16 {
    let s = CHUNK_SIZE;
    let mut visited = vec![false; (s * s * s) as usize];
    let idx = |x: i32, y: i32, z: i32| (y * s * s + z * s + x) as usize;

    let mut mask = 0u16;
    let mut queue = std::collections::VecDeque::new();

    // Seed from every non-opaque cell on each of the six boundary slabs.
    for face in ALL_FACES {
        for a in 0..s {
            for b in 0..s {
                let (x, y, z) = boundary_cell(face, a, b);
                let i = idx(x, y, z);
                if !visited[i] && !is_opaque(get_block(x, y, z)) {
                    visited[i] = true;
                    queue.push_back((x, y, z));
                    let component_faces = bfs_component(&get_block, &mut visited, &mut queue, idx);
                    mask |= face_set_to_pair_mask(component_faces);
                }
            }
        }
    }
    mask
}

/// The local coordinate of the `(a, b)`'th cell on `face`'s boundary slab.
fn boundary_cell(face: Face, a: i32, b: i32) -> (i32, i32, i32) {
    let s = CHUNK_SIZE - 1;
    match face {
        Face::NegY => (a, 0, b),
        Face::PosY => (a, s, b),
        Face::NegZ => (a, b, 0),
        Face::PosZ => (a, b, s),
        Face::NegX => (0, a, b),
        Face::PosX => (s, a, b),
    }
}

/// Which face a boundary cell touches, if any (a cell on an edge/corner
/// touches more than one face; this returns only the one `boundary_cell`
/// would have produced it for — the BFS below independently tests every
/// face's membership per visited cell, so corners are still counted for
/// every face they touch).
fn faces_touched_by(x: i32, y: i32, z: i32) -> u8 {
    let s = CHUNK_SIZE - 1;
    let mut bits = 0u8;
    if y == 0 {
        bits |= 1 << Face::NegY.index();
    }
    if y == s {
        bits |= 1 << Face::PosY.index();
    }
    if z == 0 {
        bits |= 1 << Face::NegZ.index();
    }
    if z == s {
        bits |= 1 << Face::PosZ.index();
    }
    if x == 0 {
        bits |= 1 << Face::NegX.index();
    }
    if x == s {
        bits |= 1 << Face::PosX.index();
    }
    bits
}

/// BFS flood fill from an already-queued seed, returning the 6-bit set of
/// faces this connected component touches.
fn bfs_component(
    get_block: &impl Fn(i32, i32, i32) -> crate::block::BlockType,
    visited: &mut [bool],
    queue: &mut std::collections::VecDeque<(i32, i32, i32)>,
    idx: impl Fn(i32, i32, i32) -> usize,
) -> u8 {
    let mut face_set = 0u8;
    while let Some((x, y, z)) = queue.pop_front() {
        face_set |= faces_touched_by(x, y, z);
        for (dx, dy, dz) in [
            (1, 0, 0),
            (-1, 0, 0),
            (0, 1, 0),
            (0, -1, 0),
            (0, 0, 1),
            (0, 0, -1),
        ] {
            let (nx, ny, nz) = (x + dx, y + dy, z + dz);
            if !(0..CHUNK_SIZE).contains(&nx)
                || !(0..CHUNK_SIZE).contains(&ny)
                || !(0..CHUNK_SIZE).contains(&nz)
            {
                continue;
            }
            let ni = idx(nx, ny, nz);
            if visited[ni] {
                continue;
            }
            if is_opaque(get_block(nx, ny, nz)) {
                continue;
            }
            visited[ni] = true;
            queue.push_back((nx, ny, nz));
        }
    }
    face_set
}

/// Expands a 6-bit "touched faces" set into all pairs it reaches (§4.5,
/// §9): every two distinct touched faces are connected through this
/// component.
fn face_set_to_pair_mask(face_set: u8) -> u16 {
    let touched: Vec<Face> = ALL_FACES
        .into_iter()
        .filter(|f| face_set & (1 << f.index()) != 0)
        .collect();
    let mut mask = 0u16;
    for i in 0..touched.len() {
        for j in (i + 1)..touched.len() {
            mask |= 1 << face_pair_index(touched[i], touched[j]);
        }
    }
    mask
}
