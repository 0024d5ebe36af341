pub use strata_common as common;
pub use strata_nbt as nbt;
pub use strata_region as region;
pub use strata_world as world;

// Re-export commonly used items
pub use strata_common::{BlockPos, ChunkPos, RegionPos, Result, StrataError};
pub use strata_nbt::{Compound, NbtFile, Tag};
pub use strata_region::{FileStore, MemoryStore, RegionFile, WorldStore};
pub use strata_world::{Block, BlockProperties, Chunk, Level, LevelData, LightChannel, Tick};
