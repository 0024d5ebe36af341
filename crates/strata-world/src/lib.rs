//! The voxel model: sections, chunks, lighting and the level cache.

pub mod block;
pub mod chunk;
pub mod level;
pub mod level_data;
pub mod light;
pub mod nibble;
pub mod properties;
pub mod section;

pub use block::{Block, Tick};
pub use chunk::Chunk;
pub use level::Level;
pub use level_data::{GameMode, LevelData};
pub use light::{relight, LightChannel, LightVolume, RelightStats};
pub use nibble::NibbleArray;
pub use properties::BlockProperties;
pub use section::Section;
