//! Region files and world directories.

pub mod file_store;
pub mod lock;
pub mod region;
pub mod store;

pub use file_store::FileStore;
pub use lock::SessionLock;
pub use region::{RegionBacking, RegionFile};
pub use store::{MemoryStore, WorldStore};
