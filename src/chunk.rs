//! Palette-compressed chunk storage (C2, §3, §4.2).

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::block::{is_opaque, BlockType, AIR};
use crate::coord::{linear_index, ChunkCoord, ALL_CONNECTED, CHUNK_VOLUME};

bitflags! {
    /// Per-chunk lifecycle flags (§3).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct ChunkFlags: u8 {
        /// True iff the palette is allocated (chunk has been filled).
        const IS_LOADED = 1 << 0;
        /// Set while waiting on generation/meshing to complete.
        const IS_PENDING_UPDATE = 1 << 1;
        /// Set while the chunk is within the streaming orchestrator's window.
        const IS_IN_VIEW_DISTANCE = 1 << 2;
    }
}

/// A chunk's block storage: an ordered palette of block types present in
/// the chunk, plus an optional dense per-block index array (§3).
///
/// Invariants upheld by every mutating method on this type:
/// - `is_loaded() <=> !palette.is_empty()`
/// - `palette.len() == 1 => blocks.is_none()`; `palette.len() > 1 => blocks
///   is Some(CHUNK_VOLUME bytes)`.
/// - every byte in `blocks`, if present, is `< palette.len()`.
#[derive(Debug, Clone)]
pub struct Chunk {
    pub position: ChunkCoord,
    palette: Vec<BlockType>,
    blocks: Option<Box<[u8]>>,
    connected_faces: u16,
    flags: ChunkFlags,
}

impl Chunk {
    /// A freshly created, unloaded chunk at `position`.
    pub fn new(position: ChunkCoord) -> Self {
        Self {
            position,
            palette: Vec::new(),
            blocks: None,
            connected_faces: ALL_CONNECTED,
            flags: ChunkFlags::empty(),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.flags.contains(ChunkFlags::IS_LOADED)
    }

    pub fn flags(&self) -> ChunkFlags {
        self.flags
    }

    pub fn set_flag(&mut self, flag: ChunkFlags, value: bool) {
        self.flags.set(flag, value);
    }

    pub fn palette(&self) -> &[BlockType] {
        &self.palette
    }

    pub fn connected_faces(&self) -> u16 {
        self.connected_faces
    }

    pub fn set_connected_faces(&mut self, mask: u16) {
        debug_assert!(mask <= ALL_CONNECTED);
        self.connected_faces = mask;
    }

    /// Marks connectivity as stale; callers recompute via the connectivity
    /// analyzer or explicitly invalidate (§3: "explicitly invalidated to `~0`").
    pub fn invalidate_connected_faces(&mut self) {
        self.connected_faces = ALL_CONNECTED;
    }

    /// Is this chunk a single uniform palette entry?
    pub fn is_uniform(&self) -> bool {
        self.palette.len() <= 1
    }

    /// The single uniform block type, if the chunk has one palette entry.
    pub fn uniform_block(&self) -> Option<BlockType> {
        if self.palette.len() == 1 {
            Some(self.palette[0])
        } else {
            None
        }
    }

    /// `get_block` per §4.2: `palette[0]` if uniform, else the dense
    /// lookup through the byte array.
    pub fn get_block(&self, x: i32, y: i32, z: i32) -> BlockType {
        match self.palette.len() {
            0 => AIR,
            1 => self.palette[0],
            _ => {
                let idx = linear_index(x, y, z);
                let blocks = self
                    .blocks
                    .as_ref()
                    .expect("multi-entry palette must have dense storage");
                self.palette[blocks[idx] as usize]
            }
        }
    }

    /// Replaces the palette with a single entry and frees the dense array.
    pub fn set_single_palette(&mut self, t: BlockType) {
        self.palette.clear();
        self.palette.push(t);
        self.blocks = None;
        self.flags.insert(ChunkFlags::IS_LOADED);
    }

    /// If the chunk currently has a single palette entry, allocate a dense
    /// array zeroed (every byte pointing at the current, still-index-0
    /// uniform entry) so a second distinct type can be introduced.
    /// No-op if already dense or unloaded.
    fn ensure_dense(&mut self) {
        if self.blocks.is_some() || self.palette.len() != 1 {
            return;
        }
        self.blocks = Some(vec![0u8; CHUNK_VOLUME].into_boxed_slice());
    }

    /// Linear search for `t`; append if absent. Palettes only grow within
    /// a chunk's lifetime (§4.2, §9) so existing indices stay valid.
    pub fn add_to_palette(&mut self, t: BlockType) -> u8 {
        if let Some(pos) = self.palette.iter().position(|&p| p == t) {
            return pos as u8;
        }
        self.palette.push(t);
        self.flags.insert(ChunkFlags::IS_LOADED);
        (self.palette.len() - 1) as u8
    }

    /// Sets a single block, growing the palette/dense array as needed, and
    /// collapsing back to a uniform palette if the write makes every block
    /// identical. Used by the edit engine for single-block writes; bulk
    /// box writes use [`Chunk::set_block_raw`] directly for efficiency.
    pub fn set_block(&mut self, x: i32, y: i32, z: i32, t: BlockType) {
        if self.palette.is_empty() {
            self.set_single_palette(AIR);
        }
        if let Some(only) = self.uniform_block() {
            if only == t {
                return;
            }
            self.ensure_dense();
        }
        let idx = self.add_to_palette(t);
        let blocks = self.blocks.as_mut().expect("ensure_dense was called above");
        blocks[linear_index(x, y, z)] = idx;
        self.compact_if_uniform();
    }

    /// Writes `idx` (an already-resolved palette index) at `(x,y,z)`
    /// without touching the palette. Caller must have ensured the chunk
    /// is dense and `idx` is valid.
    pub fn set_block_raw(&mut self, x: i32, y: i32, z: i32, idx: u8) {
        let blocks = self.blocks.as_mut().expect("chunk must be dense");
        blocks[linear_index(x, y, z)] = idx;
    }

    /// Ensures the chunk can store `t` via an index, allocating dense
    /// storage if this is the first second-type write. Returns the index.
    pub fn ensure_palette_index(&mut self, t: BlockType) -> u8 {
        if self.palette.is_empty() {
            self.set_single_palette(t);
            return 0;
        }
        if self.uniform_block() == Some(t) {
            // Caller (e.g. the edit engine) will still write this index via
            // `set_block_raw`, which requires dense storage to exist even
            // though the palette itself doesn't grow.
            self.ensure_dense();
            return 0;
        }
        self.ensure_dense();
        self.add_to_palette(t)
    }

    /// If every byte in a dense array now resolves to the same palette
    /// entry, shrink back to a single-entry palette and free the array
    /// (§4.2 edge case).
    fn compact_if_uniform(&mut self) {
        let Some(blocks) = &self.blocks else {
            return;
        };
        let first = blocks[0];
        if blocks.iter().all(|&b| b == first) {
            let t = self.palette[first as usize];
            self.set_single_palette(t);
        }
    }

    /// Public entry point for the edit engine: after writing a clamped
    /// range, check whether the chunk collapsed to uniform and compact.
    pub fn recompact(&mut self) {
        self.compact_if_uniform();
    }

    pub fn blocks_dense(&self) -> Option<&[u8]> {
        self.blocks.as_deref()
    }

    /// Any non-air block present anywhere in the chunk.
    pub fn has_any_solid(&self) -> bool {
        match self.uniform_block() {
            Some(t) => is_opaque(t),
            None => self
                .blocks
                .as_ref()
                .map(|b| b.iter().any(|&i| is_opaque(self.palette[i as usize])))
                .unwrap_or(false),
        }
    }

    /// Frees both arrays and resets to unloaded (§4.2 `dispose`).
    pub fn dispose(&mut self) {
        self.palette.clear();
        self.blocks = None;
        self.connected_faces = ALL_CONNECTED;
        self.flags = ChunkFlags::empty();
    }

    /// Loads a dense `S^3` byte array of raw block types (0 = air, 1 =
    /// stone, ...) per the filler's output contract (§4.3): collapses to
    /// a single palette entry if every byte matches, else builds the
    /// two-entry `[Air, block]` palette with the remapped index array.
    pub fn load_from_dense(&mut self, position: ChunkCoord, raw: &[BlockType]) {
        debug_assert_eq!(raw.len(), CHUNK_VOLUME);
        self.position = position;
        let first = raw[0];
        if raw.iter().all(|&b| b == first) {
            self.set_single_palette(first);
            return;
        }
        // Build the palette by discovery order, matching add_to_palette's
        // linear-search append semantics so later edits keep appending.
        self.palette.clear();
        let mut indices = vec![0u8; raw.len()].into_boxed_slice();
        for (i, &t) in raw.iter().enumerate() {
            let idx = match self.palette.iter().position(|&p| p == t) {
                Some(p) => p,
                None => {
                    self.palette.push(t);
                    self.palette.len() - 1
                }
            };
            indices[i] = idx as u8;
        }
        self.blocks = Some(indices);
        self.flags.insert(ChunkFlags::IS_LOADED);
    }
}
