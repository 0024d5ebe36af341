use crate::block::Block;
use crate::chunk::Chunk;
use crate::level_data::LevelData;
use crate::light::{relight, LightChannel, LightVolume};
use crate::properties::BlockProperties;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use strata_common::{BlockPos, ChunkPos, Result, StrataError, SECTIONS_PER_CHUNK};
use strata_nbt::Tag;
use strata_region::WorldStore;

/// The loaded chunks seen as one volume, for the lighting engine.
struct LevelView<'a> {
    chunks: &'a mut HashMap<u64, Chunk>,
    props: &'a BlockProperties,
}

impl LevelView<'_> {
    fn chunk(&self, pos: BlockPos) -> Option<&Chunk> {
        self.chunks.get(&pos.chunk().key())
    }
}

impl LightVolume for LevelView<'_> {
    fn opacity(&self, pos: BlockPos) -> u8 {
        match self.chunk(pos) {
            Some(chunk) => chunk.opacity(pos.x, pos.y, pos.z, self.props),
            None => 15,
        }
    }

    fn emission(&self, pos: BlockPos) -> u8 {
        self.chunk(pos)
            .map_or(0, |chunk| self.props.emission(chunk.block_id(pos.x, pos.y, pos.z)))
    }

    fn height(&self, x: i32, z: i32) -> Option<i32> {
        self.chunks
            .get(&ChunkPos::new(x >> 4, z >> 4).key())
            .map(|chunk| chunk.height(x, z))
    }

    fn light(&self, channel: LightChannel, pos: BlockPos) -> Option<u8> {
        self.chunk(pos)?.light(channel, pos.x, pos.y, pos.z)
    }

    fn set_light(&mut self, channel: LightChannel, pos: BlockPos, value: u8) {
        if let Some(chunk) = self.chunks.get_mut(&pos.chunk().key()) {
            chunk.set_light(channel, pos.x, pos.y, pos.z, value);
        }
    }
}

/// An open world: a lazily filled chunk cache over a [`WorldStore`].
///
/// Chunks are loaded (or created empty) the first time anything touches
/// them and stay in memory until the level is closed.
pub struct Level<S> {
    store: S,
    props: Arc<BlockProperties>,
    data: LevelData,
    chunks: HashMap<u64, Chunk>,
}

impl<S: WorldStore> Level<S> {
    /// Opens the world held by `store`. A store without `level.dat` gets
    /// fresh metadata, written on the first save.
    pub fn open(mut store: S, props: Arc<BlockProperties>) -> Result<Self> {
        let data = match store.read_level_dat()? {
            Some(tag) => LevelData::from_tag(&tag)?,
            None => LevelData::new("world"),
        };
        Ok(Self {
            store,
            props,
            data,
            chunks: HashMap::new(),
        })
    }

    pub fn data(&self) -> &LevelData {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut LevelData {
        &mut self.data
    }

    pub fn properties(&self) -> &BlockProperties {
        &self.props
    }

    pub fn loaded_chunks(&self) -> usize {
        self.chunks.len()
    }

    fn load_chunk(store: &mut S, pos: ChunkPos) -> Result<Chunk> {
        match store.get_chunk(pos)? {
            Some(tag) => Chunk::from_tag(&tag, pos),
            None => Ok(Chunk::new(pos)),
        }
    }

    fn chunk_mut(&mut self, pos: ChunkPos) -> Result<&mut Chunk> {
        match self.chunks.entry(pos.key()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let chunk = Self::load_chunk(&mut self.store, pos)?;
                Ok(entry.insert(chunk))
            }
        }
    }

    /// The chunk at `pos`, loading or creating it.
    pub fn chunk(&mut self, pos: ChunkPos) -> Result<&Chunk> {
        self.chunk_mut(pos).map(|chunk| &*chunk)
    }

    pub fn get_block(&mut self, pos: BlockPos) -> Result<Block> {
        if !pos.in_world() {
            return Ok(Block::default());
        }
        let chunk = self.chunk(pos.chunk())?;
        Ok(chunk.get_block(pos.x, pos.y, pos.z))
    }

    /// Writes a block and brings both light channels up to date around it.
    pub fn set_block(&mut self, pos: BlockPos, block: Block) -> Result<()> {
        if !pos.in_world() {
            return Err(StrataError::unexpected("y", "0..255", pos.y));
        }

        // Light may spill into the neighbouring columns, so they need
        // storage up to one section above the edit.
        let center = pos.chunk();
        let top = ((pos.y >> 4) as usize + 1).min(SECTIONS_PER_CHUNK - 1);
        for dz in -1..=1 {
            for dx in -1..=1 {
                let chunk = self.chunk_mut(ChunkPos::new(center.x + dx, center.z + dz))?;
                for index in 0..=top {
                    chunk.ensure_section(index);
                }
            }
        }

        let props = Arc::clone(&self.props);
        let chunk = self.chunk_mut(center)?;
        let old_id = chunk.block_id(pos.x, pos.y, pos.z);
        let old_light = chunk.block_light(pos.x, pos.y, pos.z);
        chunk.set_block(pos.x, pos.y, pos.z, &block, &props)?;

        let new_id = block.id & 0x0FFF;
        let (old_opacity, new_opacity) = (props.opacity(old_id), props.opacity(new_id));
        let (old_emission, new_emission) = (props.emission(old_id), props.emission(new_id));

        let mut view = LevelView {
            chunks: &mut self.chunks,
            props: &props,
        };
        if new_opacity != old_opacity {
            relight(&mut view, LightChannel::Sky, pos, new_opacity > old_opacity, 0);
        }
        if new_emission != old_emission || new_opacity != old_opacity {
            let darker = new_emission < old_light || new_opacity > old_opacity;
            relight(&mut view, LightChannel::Block, pos, darker, new_emission);
        }
        Ok(())
    }

    pub fn biome(&mut self, x: i32, z: i32) -> Result<i8> {
        Ok(self.chunk(ChunkPos::new(x >> 4, z >> 4))?.biome(x, z))
    }

    pub fn set_biome(&mut self, x: i32, z: i32, biome: i8) -> Result<()> {
        self.chunk_mut(ChunkPos::new(x >> 4, z >> 4))?
            .set_biome(x, z, biome);
        Ok(())
    }

    pub fn height(&mut self, x: i32, z: i32) -> Result<i32> {
        Ok(self.chunk(ChunkPos::new(x >> 4, z >> 4))?.height(x, z))
    }

    pub fn block_light(&mut self, pos: BlockPos) -> Result<u8> {
        if !pos.in_world() {
            return Ok(0);
        }
        Ok(self.chunk(pos.chunk())?.block_light(pos.x, pos.y, pos.z))
    }

    pub fn sky_light(&mut self, pos: BlockPos) -> Result<u8> {
        if !pos.in_world() {
            return Ok(0);
        }
        Ok(self.chunk(pos.chunk())?.sky_light(pos.x, pos.y, pos.z))
    }

    pub fn opacity(&mut self, pos: BlockPos) -> Result<u8> {
        let props = Arc::clone(&self.props);
        Ok(self
            .chunk(pos.chunk())?
            .opacity(pos.x, pos.y, pos.z, &props))
    }

    /// Writes `level.dat` if it changed, then every loaded chunk. Chunks stay
    /// loaded. Not atomic: a failure can leave some chunks written.
    pub fn save(&mut self) -> Result<()> {
        if self.data.is_changed() {
            self.store.write_level_dat(&self.data.to_tag())?;
            self.data.mark_saved();
        }

        let chunks: Vec<(ChunkPos, Tag)> = self
            .chunks
            .values()
            .map(|chunk| (chunk.pos(), chunk.to_tag()))
            .collect();
        let count = chunks.len();
        self.store.set_chunks(chunks)?;
        log::debug!("saved {} chunks", count);
        Ok(())
    }

    /// Drops every loaded chunk without saving and hands back the store.
    pub fn close(self) -> S {
        log::debug!("closing level, discarding {} chunks", self.chunks.len());
        self.store
    }
}
