//! Incremental light propagation after a single block edit.
//!
//! A relight runs up to three passes over a FIFO work list:
//!
//! 1. reset (only when the edit made things darker): walk outward from the
//!    edited block and zero every cell whose light was derived from it;
//! 2. seed (only for a light-emitting block): write the source intensity at
//!    the edited block and queue its darker neighbours;
//! 3. propagate: recompute each queued cell from its six neighbours, and keep
//!    spreading while values grow.
//!
//! The engine sees the world only through [`LightVolume`], so the same code
//! serves both channels and any storage that can answer the questions.

use std::collections::{HashSet, VecDeque};
use strata_common::{BlockPos, WORLD_HEIGHT};

/// Brightest light level.
pub const MAX_LIGHT: u8 = 15;

/// The six axis-aligned neighbour offsets.
const NEIGHBORS_6: [(i32, i32, i32); 6] = [
    (1, 0, 0),
    (-1, 0, 0),
    (0, 1, 0),
    (0, -1, 0),
    (0, 0, 1),
    (0, 0, -1),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LightChannel {
    /// Light given off by blocks such as torches and lava.
    Block,
    /// Light coming down from the open sky.
    Sky,
}

/// What the lighting engine needs to know about the world around an edit.
pub trait LightVolume {
    /// How much light a block absorbs, 0–15.
    fn opacity(&self, pos: BlockPos) -> u8;

    /// Light a block gives off on its own.
    fn emission(&self, pos: BlockPos) -> u8;

    /// Height map entry of a column, `None` if its chunk is not loaded.
    fn height(&self, x: i32, z: i32) -> Option<i32>;

    /// Stored light, or `None` where there is no storage (unloaded chunk or
    /// missing section). Such cells read as dark and are never updated.
    fn light(&self, channel: LightChannel, pos: BlockPos) -> Option<u8>;

    fn set_light(&mut self, channel: LightChannel, pos: BlockPos, value: u8);
}

/// Work done by one [`relight`] call.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelightStats {
    /// Cells zeroed by the reset pass.
    pub cleared: usize,
    /// Cells recomputed by the propagation pass.
    pub recomputed: usize,
    /// Cells whose final value differs from the value they were queued with.
    pub changed: usize,
}

fn neighbors(pos: BlockPos) -> impl Iterator<Item = BlockPos> {
    NEIGHBORS_6
        .iter()
        .map(move |&(dx, dy, dz)| pos.offset(dx, dy, dz))
        .filter(|n| (0..WORLD_HEIGHT).contains(&n.y))
}

fn attenuation<V: LightVolume + ?Sized>(volume: &V, pos: BlockPos) -> u8 {
    volume.opacity(pos).max(1)
}

fn open_sky<V: LightVolume + ?Sized>(volume: &V, pos: BlockPos) -> bool {
    volume
        .height(pos.x, pos.z)
        .is_some_and(|height| pos.y >= height)
}

/// The value a cell should hold given its neighbours.
fn compute<V: LightVolume + ?Sized>(volume: &V, channel: LightChannel, pos: BlockPos) -> u8 {
    if channel == LightChannel::Sky && open_sky(volume, pos) {
        return MAX_LIGHT;
    }

    let emitted = match channel {
        LightChannel::Block => volume.emission(pos).min(MAX_LIGHT),
        LightChannel::Sky => 0,
    };
    let opacity = volume.opacity(pos);
    if opacity >= MAX_LIGHT {
        return emitted;
    }

    let opacity = opacity.max(1);
    neighbors(pos)
        .map(|n| {
            volume
                .light(channel, n)
                .unwrap_or(0)
                .saturating_sub(opacity)
        })
        .fold(emitted, u8::max)
}

/// Brings one light channel back in line after the block at `origin` changed.
///
/// `darker` says the edit can only have removed light (the block became more
/// opaque or emits less than was stored); `source` is the light the new block
/// emits on this channel, 0 for none.
pub fn relight<V: LightVolume + ?Sized>(
    volume: &mut V,
    channel: LightChannel,
    origin: BlockPos,
    darker: bool,
    source: u8,
) -> RelightStats {
    let mut stats = RelightStats::default();
    let Some(origin_light) = volume.light(channel, origin) else {
        return stats;
    };

    let mut queue: VecDeque<(BlockPos, u8)> = VecDeque::new();

    if darker {
        let mut visited = HashSet::new();
        let mut frontier: VecDeque<(BlockPos, u8)> = VecDeque::new();

        volume.set_light(channel, origin, 0);
        visited.insert(origin);
        frontier.push_back((origin, origin_light));
        queue.push_back((origin, 0));

        while let Some((pos, light)) = frontier.pop_front() {
            for n in neighbors(pos) {
                if visited.contains(&n) {
                    continue;
                }
                let Some(current) = volume.light(channel, n) else {
                    continue;
                };
                let expected = light.saturating_sub(attenuation(volume, n));
                let shaded = channel == LightChannel::Sky
                    && current == MAX_LIGHT
                    && !open_sky(volume, n);
                if (current == expected && expected != 0) || shaded {
                    visited.insert(n);
                    volume.set_light(channel, n, 0);
                    frontier.push_back((n, current));
                    queue.push_back((n, 0));
                    stats.cleared += 1;
                }
            }
        }
    }

    let mut visited = HashSet::new();
    if !darker {
        visited.insert(origin);
        queue.push_back((origin, origin_light));
    }

    if source > 0 {
        let source = source.min(MAX_LIGHT);
        volume.set_light(channel, origin, source);
        visited.insert(origin);
        for n in neighbors(origin) {
            if visited.contains(&n) {
                continue;
            }
            if let Some(current) = volume.light(channel, n) {
                if current < source {
                    visited.insert(n);
                    queue.push_back((n, current));
                }
            }
        }
    }

    while let Some((pos, queued)) = queue.pop_front() {
        if volume.light(channel, pos).is_none() {
            continue;
        }
        let value = compute(volume, channel, pos);
        volume.set_light(channel, pos, value);
        stats.recomputed += 1;
        if value != queued {
            stats.changed += 1;
        }

        if value > queued || (darker && value == queued) {
            for n in neighbors(pos) {
                if visited.contains(&n) {
                    continue;
                }
                if let Some(current) = volume.light(channel, n) {
                    if current < value {
                        visited.insert(n);
                        queue.push_back((n, current));
                    }
                }
            }
        }
    }

    log::trace!(
        "relight {:?} at {}: cleared {}, recomputed {}",
        channel,
        origin,
        stats.cleared,
        stats.recomputed
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// A box of storable cells; everything outside it is unloaded.
    struct TestVolume {
        size: (i32, i32, i32),
        opacity: HashMap<BlockPos, u8>,
        emission: HashMap<BlockPos, u8>,
        heights: HashMap<(i32, i32), i32>,
        block: HashMap<BlockPos, u8>,
        sky: HashMap<BlockPos, u8>,
    }

    impl TestVolume {
        /// Open sky everywhere, no block light.
        fn new(sx: i32, sy: i32, sz: i32) -> Self {
            let mut volume = Self {
                size: (sx, sy, sz),
                opacity: HashMap::new(),
                emission: HashMap::new(),
                heights: HashMap::new(),
                block: HashMap::new(),
                sky: HashMap::new(),
            };
            for x in 0..sx {
                for z in 0..sz {
                    volume.heights.insert((x, z), 0);
                    for y in 0..sy {
                        volume.sky.insert(BlockPos::new(x, y, z), 15);
                    }
                }
            }
            volume
        }

        fn contains(&self, pos: BlockPos) -> bool {
            (0..self.size.0).contains(&pos.x)
                && (0..self.size.1).contains(&pos.y)
                && (0..self.size.2).contains(&pos.z)
        }

        fn block_light(&self, x: i32, y: i32, z: i32) -> u8 {
            self.block.get(&BlockPos::new(x, y, z)).copied().unwrap_or(0)
        }

        fn sky_light(&self, x: i32, y: i32, z: i32) -> u8 {
            self.sky.get(&BlockPos::new(x, y, z)).copied().unwrap_or(0)
        }
    }

    impl LightVolume for TestVolume {
        fn opacity(&self, pos: BlockPos) -> u8 {
            if !self.contains(pos) {
                return 15;
            }
            self.opacity.get(&pos).copied().unwrap_or(1)
        }

        fn emission(&self, pos: BlockPos) -> u8 {
            self.emission.get(&pos).copied().unwrap_or(0)
        }

        fn height(&self, x: i32, z: i32) -> Option<i32> {
            self.heights.get(&(x, z)).copied()
        }

        fn light(&self, channel: LightChannel, pos: BlockPos) -> Option<u8> {
            if !self.contains(pos) {
                return None;
            }
            let map = match channel {
                LightChannel::Block => &self.block,
                LightChannel::Sky => &self.sky,
            };
            Some(map.get(&pos).copied().unwrap_or(0))
        }

        fn set_light(&mut self, channel: LightChannel, pos: BlockPos, value: u8) {
            let map = match channel {
                LightChannel::Block => &mut self.block,
                LightChannel::Sky => &mut self.sky,
            };
            map.insert(pos, value);
        }
    }

    fn place_torch(volume: &mut TestVolume, pos: BlockPos, level: u8) {
        volume.emission.insert(pos, level);
        relight(volume, LightChannel::Block, pos, false, level);
    }

    fn remove_torch(volume: &mut TestVolume, pos: BlockPos) {
        volume.emission.remove(&pos);
        relight(volume, LightChannel::Block, pos, true, 0);
    }

    #[test]
    fn test_torch_spreads_and_fades() {
        let mut volume = TestVolume::new(16, 1, 1);
        place_torch(&mut volume, BlockPos::new(0, 0, 0), 14);

        for x in 0..15 {
            assert_eq!(volume.block_light(x, 0, 0), 14 - x as u8, "x = {}", x);
        }
        assert_eq!(volume.block_light(15, 0, 0), 0);
    }

    #[test]
    fn test_removing_torch_clears_light() {
        let mut volume = TestVolume::new(16, 1, 1);
        let torch = BlockPos::new(4, 0, 0);
        place_torch(&mut volume, torch, 14);
        remove_torch(&mut volume, torch);

        for x in 0..16 {
            assert_eq!(volume.block_light(x, 0, 0), 0, "x = {}", x);
        }
    }

    #[test]
    fn test_removing_one_of_two_torches() {
        let mut volume = TestVolume::new(16, 1, 1);
        let first = BlockPos::new(2, 0, 0);
        place_torch(&mut volume, first, 14);
        place_torch(&mut volume, BlockPos::new(10, 0, 0), 14);
        assert_eq!(volume.block_light(6, 0, 0), 10);

        remove_torch(&mut volume, first);
        for x in 0..16 {
            let expected = 14u8.saturating_sub((x - 10i32).unsigned_abs() as u8);
            assert_eq!(volume.block_light(x, 0, 0), expected, "x = {}", x);
        }
    }

    #[test]
    fn test_wall_blocks_light() {
        let mut volume = TestVolume::new(8, 1, 1);
        volume.opacity.insert(BlockPos::new(3, 0, 0), 15);
        place_torch(&mut volume, BlockPos::new(0, 0, 0), 14);

        assert_eq!(volume.block_light(2, 0, 0), 12);
        assert_eq!(volume.block_light(3, 0, 0), 0);
        assert_eq!(volume.block_light(4, 0, 0), 0);
    }

    #[test]
    fn test_opaque_emitter_keeps_its_light() {
        let mut volume = TestVolume::new(4, 1, 1);
        let glowstone = BlockPos::new(0, 0, 0);
        volume.opacity.insert(glowstone, 15);
        place_torch(&mut volume, glowstone, 15);

        assert_eq!(volume.block_light(0, 0, 0), 15);
        assert_eq!(volume.block_light(1, 0, 0), 14);
    }

    #[test]
    fn test_translucent_block_attenuates() {
        let mut volume = TestVolume::new(8, 1, 1);
        volume.opacity.insert(BlockPos::new(2, 0, 0), 3);
        place_torch(&mut volume, BlockPos::new(0, 0, 0), 14);

        assert_eq!(volume.block_light(1, 0, 0), 13);
        assert_eq!(volume.block_light(2, 0, 0), 10);
        assert_eq!(volume.block_light(3, 0, 0), 9);
    }

    #[test]
    fn test_roof_shades_column() {
        let mut volume = TestVolume::new(3, 8, 1);
        let roof = BlockPos::new(1, 5, 0);
        volume.opacity.insert(roof, 15);
        volume.heights.insert((1, 0), 6);
        relight(&mut volume, LightChannel::Sky, roof, true, 0);

        assert_eq!(volume.sky_light(1, 5, 0), 0);
        assert_eq!(volume.sky_light(1, 6, 0), 15);
        for y in 0..5 {
            // Lit sideways from the open columns next to it.
            assert_eq!(volume.sky_light(1, y, 0), 14, "y = {}", y);
        }
        assert_eq!(volume.sky_light(0, 2, 0), 15);

        volume.opacity.remove(&roof);
        volume.heights.insert((1, 0), 0);
        relight(&mut volume, LightChannel::Sky, roof, false, 0);
        for y in 0..8 {
            assert_eq!(volume.sky_light(1, y, 0), 15, "y = {}", y);
        }
    }

    #[test]
    fn test_enclosed_column_goes_dark() {
        let mut volume = TestVolume::new(1, 8, 1);
        let roof = BlockPos::new(0, 6, 0);
        volume.opacity.insert(roof, 15);
        volume.heights.insert((0, 0), 7);
        let stats = relight(&mut volume, LightChannel::Sky, roof, true, 0);

        assert_eq!(stats.cleared, 6);
        for y in 0..7 {
            assert_eq!(volume.sky_light(0, y, 0), 0, "y = {}", y);
        }
        assert_eq!(volume.sky_light(0, 7, 0), 15);
    }

    #[test]
    fn test_unchanged_block_is_a_no_op() {
        let mut volume = TestVolume::new(8, 1, 1);
        place_torch(&mut volume, BlockPos::new(0, 0, 0), 14);
        let stats = relight(&mut volume, LightChannel::Block, BlockPos::new(0, 0, 0), false, 14);

        assert_eq!(stats.changed, 0);
        assert_eq!(volume.block_light(7, 0, 0), 7);
    }

    #[test]
    fn test_unloaded_origin_is_ignored() {
        let mut volume = TestVolume::new(2, 1, 1);
        let stats = relight(&mut volume, LightChannel::Block, BlockPos::new(5, 0, 0), false, 14);
        assert_eq!(stats, RelightStats::default());
    }
}
