//! Mesh extractor (C4, §4.4, §6): emits vertex/index buffers for a
//! chunk's visible faces, culling against opaque neighbors (possibly
//! resolved from other chunks).

use crate::block::{is_opaque, is_solid, BlockRegistry, BlockType, AIR};
use crate::chunk::Chunk;
use crate::coord::{Face, ALL_FACES, CHUNK_SIZE};

/// Fixed-layout vertex (§3, §6): position quantized to 8-bit unorm, a
/// quantized signed-normalized normal, and a float UV.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Vertex {
    pub position: [u8; 4],
    pub normal: [i8; 4],
    pub uv: [f32; 2],
}

/// Output of the mesh extractor: vertex/index buffers plus the chunk's
/// AABB in unit-cube normalized coordinates (§3, §6).
#[derive(Debug, Clone, Default)]
pub struct MeshBuffer {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u16>,
}

impl MeshBuffer {
    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn index_count(&self) -> usize {
        self.indices.len()
    }
}

/// `S` block-edges map to 128 unsigned-normalized units (§4.4).
const UNITS_PER_BLOCK: u8 = 128 / CHUNK_SIZE as u8;

/// Neighbor chunks in canonical face order (index == `Face::index()`),
/// `None` meaning the neighbor is absent (unloaded or out of the store).
pub type Neighbors<'a> = [Option<&'a Chunk>; 6];

/// Resolves the block type just outside `chunk` at local `(x,y,z)` when
/// stepping through `face`, consulting the appropriate neighbor chunk's
/// own palette/blocks when the step leaves this chunk (§4.4).
fn neighbor_block(
    chunk: &Chunk,
    neighbors: &Neighbors,
    x: i32,
    y: i32,
    z: i32,
    face: Face,
    add_border_walls: bool,
) -> Option<BlockType> {
    let n = face.normal();
    let (nx, ny, nz) = (x + n.x, y + n.y, z + n.z);
    if (0..CHUNK_SIZE).contains(&nx) && (0..CHUNK_SIZE).contains(&ny) && (0..CHUNK_SIZE).contains(&nz) {
        return Some(chunk.get_block(nx, ny, nz));
    }
    match neighbors[face.index()] {
        Some(neighbor) => {
            let wrap = |v: i32| ((v % CHUNK_SIZE) + CHUNK_SIZE) % CHUNK_SIZE;
            Some(neighbor.get_block(wrap(nx), wrap(ny), wrap(nz)))
        }
        None => {
            if add_border_walls {
                Some(AIR) // treat as transparent: emit the face
            } else {
                None // treat as opaque: cull the face
            }
        }
    }
}

/// Extracts a mesh for `chunk` against its six neighbors (§4.4).
pub fn extract_mesh(
    chunk: &Chunk,
    neighbors: &Neighbors,
    registry: &BlockRegistry,
    add_border_walls: bool,
) -> MeshBuffer {
    let mut mesh = MeshBuffer::default();

    match chunk.uniform_block() {
        None => {}
        Some(t) if !is_solid(t) => return mesh, // uniform air: no mesh (§4.4)
        Some(_) => {
            // Uniform opaque: only the six boundary slabs can possibly be
            // visible (O(S^2) each) since every internal face is hidden.
            extract_uniform_boundary(chunk, neighbors, registry, add_border_walls, &mut mesh);
            return mesh;
        }
    }
    if chunk.palette().is_empty() {
        return mesh; // unloaded
    }

    for y in 0..CHUNK_SIZE {
        for z in 0..CHUNK_SIZE {
            for x in 0..CHUNK_SIZE {
                let b = chunk.get_block(x, y, z);
                if !is_solid(b) || b == AIR {
                    continue;
                }
                emit_block_faces(chunk, neighbors, registry, add_border_walls, x, y, z, b, &mut mesh);
            }
        }
    }
    mesh
}

fn extract_uniform_boundary(
    chunk: &Chunk,
    neighbors: &Neighbors,
    registry: &BlockRegistry,
    add_border_walls: bool,
    mesh: &mut MeshBuffer,
) {
    let block = chunk.uniform_block().expect("caller checked uniform");
    let s = CHUNK_SIZE - 1;
    for face in ALL_FACES {
        for a in 0..CHUNK_SIZE {
            for b in 0..CHUNK_SIZE {
                let (x, y, z) = match face {
                    Face::NegY => (a, 0, b),
                    Face::PosY => (a, s, b),
                    Face::NegZ => (a, b, 0),
                    Face::PosZ => (a, b, s),
                    Face::NegX => (0, a, b),
                    Face::PosX => (s, a, b),
                };
                emit_face_if_visible(
                    chunk,
                    neighbors,
                    registry,
                    add_border_walls,
                    x,
                    y,
                    z,
                    block,
                    face,
                    mesh,
                );
            }
        }
    }
}

fn emit_block_faces(
    chunk: &Chunk,
    neighbors: &Neighbors,
    registry: &BlockRegistry,
    add_border_walls: bool,
    x: i32,
    y: i32,
    z: i32,
    block: BlockType,
    mesh: &mut MeshBuffer,
) {
    for face in ALL_FACES {
        emit_face_if_visible(chunk, neighbors, registry, add_border_walls, x, y, z, block, face, mesh);
    }
}

fn emit_face_if_visible(
    chunk: &Chunk,
    neighbors: &Neighbors,
    registry: &BlockRegistry,
    add_border_walls: bool,
    x: i32,
    y: i32,
    z: i32,
    block: BlockType,
    face: Face,
    mesh: &mut MeshBuffer,
) {
    let Some(neighbor_type) = neighbor_block(chunk, neighbors, x, y, z, face, add_border_walls) else {
        return; // absent neighbor, border walls disabled: cull
    };
    if is_opaque(neighbor_type) {
        return;
    }
    push_face(mesh, registry, block, x, y, z, face);
}

/// Four corner offsets of `face`, in consistent CCW winding viewed from
/// outside the cube, plus the matching UV corners (§4.4).
fn face_corners(face: Face) -> [[u8; 3]; 4] {
    match face {
        Face::NegY => [[0, 0, 1], [1, 0, 1], [1, 0, 0], [0, 0, 0]],
        Face::PosY => [[0, 1, 0], [1, 1, 0], [1, 1, 1], [0, 1, 1]],
        Face::NegZ => [[1, 0, 0], [0, 0, 0], [0, 1, 0], [1, 1, 0]],
        Face::PosZ => [[0, 0, 1], [1, 0, 1], [1, 1, 1], [0, 1, 1]],
        Face::NegX => [[0, 0, 0], [0, 0, 1], [0, 1, 1], [0, 1, 0]],
        Face::PosX => [[1, 0, 1], [1, 0, 0], [1, 1, 0], [1, 1, 1]],
    }
}

const FACE_UVS: [[f32; 2]; 4] = [[0.0, 1.0], [1.0, 1.0], [1.0, 0.0], [0.0, 0.0]];

fn normal_snorm(face: Face) -> [i8; 4] {
    let n = face.normal();
    let q = |v: i32| (v * 127) as i8;
    [q(n.x), q(n.y), q(n.z), 0]
}

fn push_face(
    mesh: &mut MeshBuffer,
    registry: &BlockRegistry,
    block: BlockType,
    x: i32,
    y: i32,
    z: i32,
    face: Face,
) {
    let base = mesh.vertices.len() as u16;
    let normal = normal_snorm(face);
    let rect = registry.get(block).atlas_rect;
    let corners = face_corners(face);
    for (corner, uv) in corners.iter().zip(FACE_UVS) {
        let px = ((x + corner[0] as i32) as u32 * UNITS_PER_BLOCK as u32) as u8;
        let py = ((y + corner[1] as i32) as u32 * UNITS_PER_BLOCK as u32) as u8;
        let pz = ((z + corner[2] as i32) as u32 * UNITS_PER_BLOCK as u32) as u8;
        let u = rect.u_min + uv[0] * (rect.u_max - rect.u_min);
        let v = rect.v_min + uv[1] * (rect.v_max - rect.v_min);
        mesh.vertices.push(Vertex {
            position: [px, py, pz, 0],
            normal,
            uv: [u, v],
        });
    }
    mesh.indices.extend_from_slice(&[
        base,
        base + 1,
        base + 2,
        base + 2,
        base + 3,
        base,
    ]);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::STONE;
    use crate::coord::ChunkCoord;

    fn no_neighbors<'a>() -> Neighbors<'a> {
        [None, None, None, None, None, None]
    }

    #[test]
    fn uniform_air_chunk_has_no_mesh() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        c.set_single_palette(AIR);
        let registry = BlockRegistry::new();
        let mesh = extract_mesh(&c, &no_neighbors(), &registry, false);
        assert!(mesh.is_empty());
    }

    // E2: a single stone block in the interior of an all-air chunk, no
    // neighbors needed since every one of its six neighbor cells is
    // itself inside the chunk, yields exactly 6 faces (24 vertices, 36
    // indices).
    #[test]
    fn single_isolated_block_emits_six_faces() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        c.set_single_palette(AIR);
        c.set_block(8, 8, 8, STONE);
        let registry = BlockRegistry::new();
        let mesh = extract_mesh(&c, &no_neighbors(), &registry, false);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.index_count(), 36);
    }

    #[test]
    fn solid_interior_block_is_fully_occluded() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        c.set_single_palette(STONE);
        c.set_block(5, 5, 5, STONE); // no-op: already stone, stays uniform
        let registry = BlockRegistry::new();
        // Uniform opaque chunk with no neighbors and border walls off:
        // every boundary face is culled by the "absent = opaque" rule.
        let mesh = extract_mesh(&c, &no_neighbors(), &registry, false);
        assert!(mesh.is_empty());
    }

    // Mesh extractor self-consistency (§8): absent neighbors with
    // AddBorderWalls=true must match explicit all-air neighbors.
    #[test]
    fn border_walls_matches_explicit_air_neighbors() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        c.set_single_palette(STONE);
        let registry = BlockRegistry::new();
        let with_border_walls = extract_mesh(&c, &no_neighbors(), &registry, true);

        let mut air_neighbor = Chunk::new(ChunkCoord::new(0, 0, 0));
        air_neighbor.set_single_palette(AIR);
        let neighbors: Neighbors = [
            Some(&air_neighbor),
            Some(&air_neighbor),
            Some(&air_neighbor),
            Some(&air_neighbor),
            Some(&air_neighbor),
            Some(&air_neighbor),
        ];
        let with_air_neighbors = extract_mesh(&c, &neighbors, &registry, false);

        assert_eq!(with_border_walls.vertex_count(), with_air_neighbors.vertex_count());
        assert_eq!(with_border_walls.index_count(), with_air_neighbors.index_count());
    }

    #[test]
    fn uniform_opaque_boundary_count_is_six_faces_per_boundary_cell() {
        let mut c = Chunk::new(ChunkCoord::new(0, 0, 0));
        c.set_single_palette(STONE);
        let registry = BlockRegistry::new();
        let mesh = extract_mesh(&c, &no_neighbors(), &registry, true);
        // Every boundary cell on every one of the six faces emits exactly
        // one face (its neighbor is air via border walls); S^2 cells per
        // face * 6 faces * 4 vertices.
        let expected_faces = (CHUNK_SIZE * CHUNK_SIZE * 6) as usize;
        assert_eq!(mesh.vertex_count(), expected_faces * 4);
        assert_eq!(mesh.index_count(), expected_faces * 6);
    }
}
