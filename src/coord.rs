//! Chunk coordinates and the block/chunk-space helper math (§3, §4.1).

use glam::IVec3;
use serde::{Deserialize, Serialize};

/// Edge length of a chunk, in blocks. Fixed per §3.
pub const CHUNK_SIZE: i32 = 16;
/// Total blocks in a chunk (`S^3`).
pub const CHUNK_VOLUME: usize = (CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE) as usize;

/// Signed integer 3-vector identifying a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord(pub IVec3);

impl ChunkCoord {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self(IVec3::new(x, y, z))
    }

    pub fn x(&self) -> i32 {
        self.0.x
    }
    pub fn y(&self) -> i32 {
        self.0.y
    }
    pub fn z(&self) -> i32 {
        self.0.z
    }

    /// The chunk's block-space origin (its minimum corner).
    pub fn origin(&self) -> IVec3 {
        self.0 * CHUNK_SIZE
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self(self.0 + IVec3::new(dx, dy, dz))
    }
}

impl From<IVec3> for ChunkCoord {
    fn from(v: IVec3) -> Self {
        Self(v)
    }
}

/// Integer floor division, correct for negative `a` (unlike `a / b`).
pub fn floor_div(a: i32, b: i32) -> i32 {
    let d = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) != (b < 0)) {
        d - 1
    } else {
        d
    }
}

/// Integer ceiling division, correct for negative `a`.
pub fn ceil_div(a: i32, b: i32) -> i32 {
    let d = a / b;
    let r = a % b;
    if (r != 0) && ((r < 0) == (b < 0)) {
        d + 1
    } else {
        d
    }
}

/// The chunk containing block-space position `b`.
pub fn chunk_pos(b: IVec3) -> ChunkCoord {
    ChunkCoord::new(
        floor_div(b.x, CHUNK_SIZE),
        floor_div(b.y, CHUNK_SIZE),
        floor_div(b.z, CHUNK_SIZE),
    )
}

/// The chunk one-past the last chunk touched by block-space position `b`,
/// i.e. `ceil(b / S)`. Used to bound an exclusive span of spanned chunks.
pub fn ceil_chunk_pos(b: IVec3) -> ChunkCoord {
    ChunkCoord::new(
        ceil_div(b.x, CHUNK_SIZE),
        ceil_div(b.y, CHUNK_SIZE),
        ceil_div(b.z, CHUNK_SIZE),
    )
}

/// Block-space position `b` relative to chunk `cp`'s origin.
pub fn local_pos(b: IVec3, cp: ChunkCoord) -> IVec3 {
    b - cp.origin()
}

/// Linear address of local block `(x, y, z)` within a chunk: `y*S^2 + z*S + x`.
#[inline]
pub fn linear_index(x: i32, y: i32, z: i32) -> usize {
    debug_assert!((0..CHUNK_SIZE).contains(&x));
    debug_assert!((0..CHUNK_SIZE).contains(&y));
    debug_assert!((0..CHUNK_SIZE).contains(&z));
    (y * CHUNK_SIZE * CHUNK_SIZE + z * CHUNK_SIZE + x) as usize
}

/// The canonical face numbering from §4.5: `{0:-y, 1:+y, 2:-z, 3:+z, 4:-x, 5:+x}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum Face {
    NegY = 0,
    PosY = 1,
    NegZ = 2,
    PosZ = 3,
    NegX = 4,
    PosX = 5,
}

pub const ALL_FACES: [Face; 6] = [
    Face::NegY,
    Face::PosY,
    Face::NegZ,
    Face::PosZ,
    Face::NegX,
    Face::PosX,
];

impl Face {
    pub const fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(i: usize) -> Self {
        ALL_FACES[i]
    }

    /// Outward unit normal of this face.
    pub const fn normal(self) -> IVec3 {
        match self {
            Face::NegY => IVec3::new(0, -1, 0),
            Face::PosY => IVec3::new(0, 1, 0),
            Face::NegZ => IVec3::new(0, 0, -1),
            Face::PosZ => IVec3::new(0, 0, 1),
            Face::NegX => IVec3::new(-1, 0, 0),
            Face::PosX => IVec3::new(1, 0, 0),
        }
    }

    /// `{0<->1, 2<->3, 4<->5}` per §4.5.
    pub const fn opposite(self) -> Face {
        match self {
            Face::NegY => Face::PosY,
            Face::PosY => Face::NegY,
            Face::NegZ => Face::PosZ,
            Face::PosZ => Face::NegZ,
            Face::NegX => Face::PosX,
            Face::PosX => Face::NegX,
        }
    }

    /// The neighbor chunk coordinate reached by stepping through this face.
    pub fn neighbor(self, coord: ChunkCoord) -> ChunkCoord {
        let n = self.normal();
        coord.offset(n.x, n.y, n.z)
    }
}

/// Compile-time lexicographic `(face_a, face_b) -> pair index` table, 15
/// entries for the unordered pairs of 6 faces (§4.5, §9).
const fn build_pair_table() -> [[i8; 6]; 6] {
    let mut table = [[-1i8; 6]; 6];
    let mut idx = 0i8;
    let mut a = 0usize;
    while a < 6 {
        let mut b = a + 1;
        while b < 6 {
            table[a][b] = idx;
            table[b][a] = idx;
            idx += 1;
            b += 1;
        }
        a += 1;
    }
    table
}

const PAIR_TABLE: [[i8; 6]; 6] = build_pair_table();

/// Total number of unordered face pairs: `C(6,2) = 15`.
pub const FACE_PAIR_COUNT: usize = 15;

/// Bit index of the unordered pair `(a, b)` within the 15-bit connectivity
/// mask. Panics if `a == b` (a face is never paired with itself).
pub fn face_pair_index(a: Face, b: Face) -> usize {
    let idx = PAIR_TABLE[a.index()][b.index()];
    debug_assert!(idx >= 0, "a face is not paired with itself");
    idx as usize
}

/// All 15-bit set: every face pair connected.
pub const ALL_CONNECTED: u16 = 0x7FFF;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_div_negative() {
        assert_eq!(floor_div(-1, 16), -1);
        assert_eq!(floor_div(-16, 16), -1);
        assert_eq!(floor_div(-17, 16), -2);
        assert_eq!(floor_div(15, 16), 0);
        assert_eq!(floor_div(16, 16), 1);
    }

    #[test]
    fn ceil_div_negative() {
        assert_eq!(ceil_div(0, 16), 0);
        assert_eq!(ceil_div(1, 16), 1);
        assert_eq!(ceil_div(16, 16), 1);
        assert_eq!(ceil_div(17, 16), 2);
        assert_eq!(ceil_div(-16, 16), -1);
        assert_eq!(ceil_div(-15, 16), -0);
    }

    #[test]
    fn chunk_pos_and_local_pos_roundtrip() {
        let b = IVec3::new(-5, 33, 16);
        let cp = chunk_pos(b);
        assert_eq!(cp, ChunkCoord::new(-1, 2, 1));
        let local = local_pos(b, cp);
        assert_eq!(local, IVec3::new(11, 1, 0));
    }

    #[test]
    fn pair_table_covers_all_15_pairs() {
        let mut seen = [false; FACE_PAIR_COUNT];
        for a in ALL_FACES {
            for b in ALL_FACES {
                if a == b {
                    continue;
                }
                seen[face_pair_index(a, b)] = true;
            }
        }
        assert!(seen.iter().all(|&s| s));
    }

    #[test]
    fn opposite_face_pairs() {
        assert_eq!(Face::NegY.opposite(), Face::PosY);
        assert_eq!(Face::PosY.opposite(), Face::NegY);
        assert_eq!(Face::NegZ.opposite(), Face::PosZ);
        assert_eq!(Face::NegX.opposite(), Face::PosX);
    }
}
