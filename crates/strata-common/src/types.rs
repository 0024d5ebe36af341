use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, crate::error::StrataError>;

/// Number of block layers in a chunk column.
pub const WORLD_HEIGHT: i32 = 256;
/// Width of a chunk and height of a section, in blocks.
pub const SECTION_SIZE: i32 = 16;
/// Number of sections stacked in a chunk column.
pub const SECTIONS_PER_CHUNK: usize = 16;
/// Width of a region, in chunks.
pub const REGION_SIZE: i32 = 32;

/// Index of a block inside a 16×16×16 section: `(y&15)<<8 | (z&15)<<4 | (x&15)`.
#[inline]
pub fn section_index(x: i32, y: i32, z: i32) -> usize {
    (((y & 15) << 8) | ((z & 15) << 4) | (x & 15)) as usize
}

/// Index of a column inside a chunk: `(z&15)<<4 | (x&15)`.
#[inline]
pub fn column_index(x: i32, z: i32) -> usize {
    (((z & 15) << 4) | (x & 15)) as usize
}

/// Key of a block inside its chunk column, used by the tile entity and tile
/// tick side tables.
#[inline]
pub fn block_key(x: i32, y: i32, z: i32) -> u16 {
    (((y & 255) << 8) | ((z & 15) << 4) | (x & 15)) as u16
}

/// Absolute block coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn chunk(&self) -> ChunkPos {
        ChunkPos::new(self.x >> 4, self.z >> 4)
    }

    /// Section holding this block; only meaningful when [`Self::in_world`] holds.
    pub fn section(&self) -> usize {
        (self.y >> 4) as usize
    }

    pub fn in_world(&self) -> bool {
        (0..WORLD_HEIGHT).contains(&self.y)
    }

    pub fn offset(&self, dx: i32, dy: i32, dz: i32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Chunk column coordinate (block coordinate `>> 4`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkPos {
    pub x: i32,
    pub z: i32,
}

impl ChunkPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Packed cache key: `z << 32 | x`.
    pub fn key(&self) -> u64 {
        ((self.z as u32 as u64) << 32) | self.x as u32 as u64
    }

    pub fn from_key(key: u64) -> Self {
        Self::new(key as u32 as i32, (key >> 32) as u32 as i32)
    }

    pub fn region(&self) -> RegionPos {
        RegionPos::new(self.x >> 5, self.z >> 5)
    }

    /// Position of this chunk inside its region (0–31 on each axis).
    pub fn local(&self) -> (usize, usize) {
        ((self.x & 31) as usize, (self.z & 31) as usize)
    }
}

impl fmt::Display for ChunkPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.x, self.z)
    }
}

/// Region coordinate (chunk coordinate `>> 5`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegionPos {
    pub x: i32,
    pub z: i32,
}

impl RegionPos {
    pub const fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// File name of the region, e.g. `r.0.-1.mca`.
    pub fn file_name(&self) -> String {
        format!("r.{}.{}.mca", self.x, self.z)
    }

    /// Parses a region file name such as `r.0.-1.mca`.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let parts: Vec<&str> = name.split('.').collect();
        if parts.len() == 4 && parts[0] == "r" && parts[3] == "mca" {
            let x = parts[1].parse().ok()?;
            let z = parts[2].parse().ok()?;
            Some(Self { x, z })
        } else {
            None
        }
    }

    /// World chunk coordinate of a local position inside this region.
    pub fn chunk(&self, local_x: usize, local_z: usize) -> ChunkPos {
        ChunkPos::new(
            self.x * REGION_SIZE + (local_x as i32 & 31),
            self.z * REGION_SIZE + (local_z as i32 & 31),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_section_index_layout() {
        assert_eq!(section_index(0, 0, 0), 0);
        assert_eq!(section_index(1, 0, 0), 1);
        assert_eq!(section_index(0, 0, 1), 16);
        assert_eq!(section_index(0, 1, 0), 256);
        assert_eq!(section_index(15, 31, 15), 4095);
        assert_eq!(section_index(-1, 16, -16), 15);
    }

    #[test]
    fn test_chunk_key_round_trip() {
        for pos in [
            ChunkPos::new(0, 0),
            ChunkPos::new(-1, 7),
            ChunkPos::new(i32::MIN, i32::MAX),
        ] {
            assert_eq!(ChunkPos::from_key(pos.key()), pos);
        }
        assert_eq!(ChunkPos::new(1, 2).key(), (2u64 << 32) | 1);
    }

    #[test]
    fn test_block_to_chunk_and_region() {
        let pos = BlockPos::new(-1, 70, 33);
        assert_eq!(pos.chunk(), ChunkPos::new(-1, 2));
        assert_eq!(pos.section(), 4);
        assert_eq!(pos.chunk().region(), RegionPos::new(-1, 0));
        assert_eq!(pos.chunk().local(), (31, 2));
        assert_eq!(RegionPos::new(-1, 0).chunk(31, 2), pos.chunk());
    }

    #[test]
    fn test_region_file_names() {
        let region = RegionPos::new(0, -1);
        assert_eq!(region.file_name(), "r.0.-1.mca");
        assert_eq!(RegionPos::from_file_name("r.0.-1.mca"), Some(region));
        assert_eq!(RegionPos::from_file_name("r.0.mca"), None);
        assert_eq!(RegionPos::from_file_name("r.a.b.mca"), None);
        assert_eq!(RegionPos::from_file_name("level.dat"), None);
    }

    #[test]
    fn test_block_key_is_unique_per_column_position() {
        assert_eq!(block_key(0, 0, 0), 0);
        assert_eq!(block_key(15, 255, 15), u16::MAX);
        assert_ne!(block_key(1, 2, 3), block_key(3, 2, 1));
    }
}
