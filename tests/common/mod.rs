use std::path::Path;
use std::sync::Arc;
use strata::{BlockPos, BlockProperties, FileStore, Level};

pub const STONE: u16 = 1;
pub const GLASS: u16 = 20;
pub const WATER: u16 = 9;
pub const TORCH: u16 = 50;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn open_level(dir: &Path) -> Level<FileStore> {
    init_logging();
    let store = FileStore::open(dir).expect("open world directory");
    Level::open(store, Arc::new(BlockProperties::default())).expect("open level")
}

/// Sky light of the brightest of the six neighbours of `pos`.
pub fn brightest_neighbour_sky(level: &mut Level<FileStore>, pos: BlockPos) -> u8 {
    [
        (1, 0, 0),
        (-1, 0, 0),
        (0, 1, 0),
        (0, -1, 0),
        (0, 0, 1),
        (0, 0, -1),
    ]
    .iter()
    .map(|&(dx, dy, dz)| level.sky_light(pos.offset(dx, dy, dz)).unwrap())
    .max()
    .unwrap_or(0)
}

/// Height the map should report for a column, found by scanning it.
pub fn scanned_height(level: &mut Level<FileStore>, x: i32, z: i32) -> i32 {
    for y in (0..256).rev() {
        if level.opacity(BlockPos::new(x, y, z)).unwrap() > 1 {
            return y + 1;
        }
    }
    0
}
