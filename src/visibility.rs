//! Visibility traversal (C6, §4.6): BFS across chunks from the viewer,
//! constrained by frustum, direction, and connectivity, to select which
//! chunks to submit for rendering.

use std::collections::VecDeque;

use glam::{Mat4, Vec3, Vec4};

use crate::coord::{face_pair_index, ChunkCoord, Face, ALL_FACES};

/// Safety iteration cap per §4.6 step 6: `64^3`.
const MAX_ITERATIONS: usize = 64 * 64 * 64;

/// View-projection frustum, extracted the same way the reference engine's
/// `world/chunk.rs::Frustum` does (Gribb-Hartmann plane extraction from a
/// combined view-projection matrix).
#[derive(Debug, Clone)]
pub struct Frustum {
    planes: [Vec4; 6],
}

impl Frustum {
    pub fn from_view_projection(view_proj: &Mat4) -> Self {
        let mut planes = [Vec4::ZERO; 6];
        let m = view_proj.to_cols_array_2d();

        planes[0] = Vec4::new(
            m[0][3] + m[0][0],
            m[1][3] + m[1][0],
            m[2][3] + m[2][0],
            m[3][3] + m[3][0],
        ); // Left
        planes[1] = Vec4::new(
            m[0][3] - m[0][0],
            m[1][3] - m[1][0],
            m[2][3] - m[2][0],
            m[3][3] - m[3][0],
        ); // Right
        planes[2] = Vec4::new(
            m[0][3] + m[0][1],
            m[1][3] + m[1][1],
            m[2][3] + m[2][1],
            m[3][3] + m[3][1],
        ); // Bottom
        planes[3] = Vec4::new(
            m[0][3] - m[0][1],
            m[1][3] - m[1][1],
            m[2][3] - m[2][1],
            m[3][3] - m[3][1],
        ); // Top
        planes[4] = Vec4::new(
            m[0][3] + m[0][2],
            m[1][3] + m[1][2],
            m[2][3] + m[2][2],
            m[3][3] + m[3][2],
        ); // Near
        planes[5] = Vec4::new(
            m[0][3] - m[0][2],
            m[1][3] - m[1][2],
            m[2][3] - m[2][2],
            m[3][3] - m[3][2],
        ); // Far

        for plane in &mut planes {
            let length = Vec3::new(plane.x, plane.y, plane.z).length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    /// An "always passes" frustum, for callers that don't want frustum
    /// culling (e.g. tests exercising only direction/connectivity).
    pub fn unbounded() -> Self {
        // Every plane `0*x+0*y+0*z+1 >= 0`, trivially satisfied by any point.
        Self {
            planes: [Vec4::new(0.0, 0.0, 0.0, 1.0); 6],
        }
    }

    pub fn intersects_aabb(&self, min: Vec3, max: Vec3) -> bool {
        for plane in &self.planes {
            let p = Vec3::new(plane.x, plane.y, plane.z);
            let d = plane.w;
            let mut farthest = min;
            if p.x > 0.0 {
                farthest.x = max.x;
            }
            if p.y > 0.0 {
                farthest.y = max.y;
            }
            if p.z > 0.0 {
                farthest.z = max.z;
            }
            if p.dot(farthest) + d < 0.0 {
                return false;
            }
        }
        true
    }
}

/// Read-only view into the engine's chunk/render state that the
/// traversal needs, so this module stays independent of the concrete
/// chunk store and render-map types (§5: traversal only reads a
/// consistent main-context snapshot).
pub trait VisibilitySource {
    /// The chunk's `connected_faces` mask, or `None` if unloaded/absent.
    fn connected_faces(&self, coord: ChunkCoord) -> Option<u16>;
    /// Whether this chunk currently has a published, renderable mesh.
    fn has_mesh(&self, coord: ChunkCoord) -> bool;
}

/// One emitted result of the traversal: the chunk and the face it was
/// entered through (`None` for the seed chunk).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleChunk {
    pub coord: ChunkCoord,
    pub came_from: Option<Face>,
}

/// Status bits for one cell of the traversal grid (§4.6 step 2).
const BIT_RESULT_EMITTED: u8 = 1 << 0;
const BIT_FRUSTUM_PASSED: u8 = 1 << 1;

fn traversed_via_bit(face: Face) -> u8 {
    1 << (2 + face.index())
}

/// Dense `(2V)^3` status grid centered on the camera chunk.
struct StatusGrid {
    radius: i32,
    side: i32,
    cells: Vec<u8>,
}

impl StatusGrid {
    fn new(radius: i32) -> Self {
        let side = 2 * radius;
        Self {
            radius,
            side,
            cells: vec![0u8; (side * side * side) as usize],
        }
    }

    /// Index of `coord` relative to `center`, or `None` if outside the grid.
    fn index(&self, center: ChunkCoord, coord: ChunkCoord) -> Option<usize> {
        let rel = coord.0 - center.0;
        let lo = -self.radius;
        let hi = self.radius; // exclusive
        if rel.x < lo || rel.x >= hi || rel.y < lo || rel.y >= hi || rel.z < lo || rel.z >= hi {
            return None;
        }
        let x = (rel.x - lo) as i64;
        let y = (rel.y - lo) as i64;
        let z = (rel.z - lo) as i64;
        Some((y * self.side as i64 * self.side as i64 + z * self.side as i64 + x) as usize)
    }
}

/// `valid_dirs` per §4.6 step 3: faces whose outward normal satisfies
/// `n_f . forward >= cos(min(90 + 2/3*fov, 180) degrees)`.
pub fn valid_dirs(forward: Vec3, horizontal_fov_degrees: f32) -> Vec<Face> {
    let limit_degrees = (90.0 + (2.0 / 3.0) * horizontal_fov_degrees).min(180.0);
    let threshold = limit_degrees.to_radians().cos();
    ALL_FACES
        .into_iter()
        .filter(|f| {
            let n = f.normal();
            let n = Vec3::new(n.x as f32, n.y as f32, n.z as f32);
            n.dot(forward) >= threshold
        })
        .collect()
}

/// Runs the visibility BFS (§4.6) from the viewer's chunk, returning
/// visible chunks in BFS order with the face each was entered through.
pub fn traverse(
    source: &impl VisibilitySource,
    camera_chunk: ChunkCoord,
    forward: Vec3,
    horizontal_fov_degrees: f32,
    view_distance: i32,
    frustum: &Frustum,
) -> Vec<VisibleChunk> {
    let dirs = valid_dirs(forward, horizontal_fov_degrees);
    let mut grid = StatusGrid::new(view_distance.max(1));
    let mut results = Vec::new();
    let mut queue = VecDeque::new();

    let Some(seed_idx) = grid.index(camera_chunk, camera_chunk) else {
        return results; // view_distance == 0, degenerate
    };
    grid.cells[seed_idx] |= BIT_FRUSTUM_PASSED;
    queue.push_back((camera_chunk, None::<Face>));

    let mut iterations = 0usize;
    while let Some((coord, came_from)) = queue.pop_front() {
        iterations += 1;
        if iterations > MAX_ITERATIONS {
            break;
        }
        let Some(idx) = grid.index(camera_chunk, coord) else {
            continue;
        };
        if grid.cells[idx] & BIT_RESULT_EMITTED == 0 && source.has_mesh(coord) {
            results.push(VisibleChunk { coord, came_from });
            grid.cells[idx] |= BIT_RESULT_EMITTED;
        }

        let connected = source.connected_faces(coord).unwrap_or(0);
        for &face in &dirs {
            if let Some(from) = came_from {
                if from != face {
                    let pair = face_pair_index(from, face);
                    if connected & (1 << pair) == 0 {
                        continue;
                    }
                }
            }
            let traversed_bit = traversed_via_bit(face);
            if grid.cells[idx] & traversed_bit != 0 {
                continue;
            }
            grid.cells[idx] |= traversed_bit;

            let neighbor = face.neighbor(coord);
            let Some(n_idx) = grid.index(camera_chunk, neighbor) else {
                continue;
            };
            let min = (neighbor.origin()).as_vec3();
            let max = min + Vec3::splat(crate::coord::CHUNK_SIZE as f32);
            if !frustum.intersects_aabb(min, max) {
                continue;
            }
            grid.cells[n_idx] |= BIT_FRUSTUM_PASSED;
            queue.push_back((neighbor, Some(face.opposite())));
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct FakeSource {
        connectivity: HashMap<ChunkCoord, u16>,
        meshed: std::collections::HashSet<ChunkCoord>,
    }

    impl VisibilitySource for FakeSource {
        fn connected_faces(&self, coord: ChunkCoord) -> Option<u16> {
            self.connectivity.get(&coord).copied()
        }
        fn has_mesh(&self, coord: ChunkCoord) -> bool {
            self.meshed.contains(&coord)
        }
    }

    fn open_world(radius: i32) -> FakeSource {
        let mut connectivity = HashMap::new();
        let mut meshed = std::collections::HashSet::new();
        for x in -radius..=radius {
            for y in -radius..=radius {
                for z in -radius..=radius {
                    let c = ChunkCoord::new(x, y, z);
                    connectivity.insert(c, crate::coord::ALL_CONNECTED);
                    meshed.insert(c);
                }
            }
        }
        FakeSource { connectivity, meshed }
    }

    #[test]
    fn uniform_opaque_world_emits_only_camera_chunk() {
        let source = FakeSource {
            connectivity: HashMap::new(), // every lookup -> None -> treated as 0 (disconnected)
            meshed: {
                let mut s = std::collections::HashSet::new();
                s.insert(ChunkCoord::new(0, 0, 0));
                s
            },
        };
        let result = traverse(
            &source,
            ChunkCoord::new(0, 0, 0),
            Vec3::new(0.0, 0.0, -1.0),
            90.0,
            4,
            &Frustum::unbounded(),
        );
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].coord, ChunkCoord::new(0, 0, 0));
        assert_eq!(result[0].came_from, None);
    }

    // E5: traversal proceeds only through faces whose normal satisfies
    // n.forward >= cos(150 deg) when fov = 90; +z is forbidden when
    // looking down -z.
    #[test]
    fn direction_filter_excludes_opposite_face() {
        let forward = Vec3::new(0.0, 0.0, -1.0);
        let dirs = valid_dirs(forward, 90.0);
        assert!(!dirs.contains(&Face::PosZ));
        assert!(dirs.contains(&Face::NegZ));
    }

    #[test]
    fn open_world_traversal_reaches_neighbors_via_connectivity() {
        let source = open_world(2);
        let result = traverse(
            &source,
            ChunkCoord::new(0, 0, 0),
            Vec3::new(0.0, 0.0, -1.0),
            90.0,
            2,
            &Frustum::unbounded(),
        );
        assert!(result.iter().any(|v| v.coord == ChunkCoord::new(0, 0, -1)));
        // +z is behind the viewer and excluded by the direction filter.
        assert!(!result.iter().any(|v| v.coord == ChunkCoord::new(0, 0, 1)));
    }
}
