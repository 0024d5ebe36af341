pub mod error;
pub mod types;

pub use error::{MultiError, StrataError};
pub use types::{
    block_key, column_index, section_index, BlockPos, ChunkPos, RegionPos, Result, REGION_SIZE,
    SECTIONS_PER_CHUNK, SECTION_SIZE, WORLD_HEIGHT,
};
