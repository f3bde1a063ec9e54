//! Block type ids and the read-only block-type registry collaborator (§6).

/// A nonnegative integer identifying a material. `AIR` is reserved.
pub type BlockType = u16;

pub const AIR: BlockType = 0;
pub const STONE: BlockType = 1;

/// `t != Air` in this core; a richer registry could carry per-type
/// flags, but the spec fixes both predicates to this for the in-core
/// registry (§3).
#[inline]
pub fn is_opaque(t: BlockType) -> bool {
    t != AIR
}

#[inline]
pub fn is_solid(t: BlockType) -> bool {
    t != AIR
}

/// A rectangle into the texture atlas, in normalized `[0,1]` UV space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AtlasRect {
    pub u_min: f32,
    pub v_min: f32,
    pub u_max: f32,
    pub v_max: f32,
}

impl Default for AtlasRect {
    fn default() -> Self {
        Self {
            u_min: 0.0,
            v_min: 0.0,
            u_max: 1.0,
            v_max: 1.0,
        }
    }
}

/// Registered metadata for one block type.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockTypeInfo {
    pub atlas_rect: AtlasRect,
}

/// Read-only collaborator: block type id -> registered metadata (§6).
/// The mesh extractor consults this for the UV rectangle of each face;
/// nothing in this crate mutates it after construction.
#[derive(Debug, Clone, Default)]
pub struct BlockRegistry {
    types: Vec<BlockTypeInfo>,
}

impl BlockRegistry {
    pub fn new() -> Self {
        // Slot 0 is always Air; it carries no visible geometry so its
        // atlas rect is never sampled, but the slot must exist so
        // indexing by BlockType never panics.
        Self {
            types: vec![BlockTypeInfo::default()],
        }
    }

    pub fn register(&mut self, info: BlockTypeInfo) -> BlockType {
        self.types.push(info);
        (self.types.len() - 1) as BlockType
    }

    pub fn get(&self, t: BlockType) -> BlockTypeInfo {
        self.types.get(t as usize).copied().unwrap_or_default()
    }
}
