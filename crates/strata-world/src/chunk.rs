use crate::block::{Block, Tick};
use crate::light::LightChannel;
use crate::properties::BlockProperties;
use crate::section::Section;
use std::collections::HashMap;
use strata_common::{
    block_key, column_index, section_index, BlockPos, ChunkPos, Result, StrataError,
    SECTIONS_PER_CHUNK, WORLD_HEIGHT,
};
use strata_nbt::{Compound, Tag};

const COLUMNS: usize = 256;

/// `Level` children this type reads and writes itself. Anything else is
/// carried through untouched.
const KNOWN_KEYS: &[&str] = &[
    "xPos",
    "zPos",
    "HeightMap",
    "InhabitedTime",
    "LastUpdate",
    "Sections",
    "TerrainPopulated",
    "Biomes",
    "Entities",
    "TileEntities",
    "TileTicks",
];

/// A 16×256×16 column of the world.
#[derive(Debug, Clone)]
pub struct Chunk {
    pos: ChunkPos,
    sections: [Option<Section>; SECTIONS_PER_CHUNK],
    biomes: [i8; COLUMNS],
    height_map: [i32; COLUMNS],
    tile_entities: HashMap<u16, Compound>,
    tile_ticks: HashMap<u16, Vec<Tick>>,
    entities: Vec<Tag>,
    inhabited_time: i64,
    last_update: i64,
    terrain_populated: bool,
    extra: Compound,
}

fn check_height(y: i32) -> Result<()> {
    if (0..WORLD_HEIGHT).contains(&y) {
        Ok(())
    } else {
        Err(StrataError::unexpected("y", "0..255", y))
    }
}

/// Checks that every entry of a list is a compound.
fn compounds<'a>(list: &'a [Tag], name: &str) -> Result<Vec<&'a Compound>> {
    list.iter()
        .map(|tag| {
            tag.as_compound().ok_or_else(|| StrataError::WrongType {
                name: name.to_owned(),
                expected: "TAG_Compound",
                got: tag.type_name(),
            })
        })
        .collect()
}

impl Chunk {
    /// An empty chunk: no sections, unset biomes, zero height.
    pub fn new(pos: ChunkPos) -> Self {
        Chunk {
            pos,
            sections: Default::default(),
            biomes: [-1; COLUMNS],
            height_map: [0; COLUMNS],
            tile_entities: HashMap::new(),
            tile_ticks: HashMap::new(),
            entities: Vec::new(),
            inhabited_time: 0,
            last_update: 0,
            terrain_populated: false,
            extra: Compound::new(),
        }
    }

    pub fn pos(&self) -> ChunkPos {
        self.pos
    }

    pub fn section(&self, index: usize) -> Option<&Section> {
        self.sections.get(index)?.as_ref()
    }

    pub fn has_section(&self, index: usize) -> bool {
        self.section(index).is_some()
    }

    /// Returns the section at `index`, creating it if needed.
    ///
    /// A new section gets its sky light from the height map: 15 at or above
    /// the column height, 0 below.
    pub fn ensure_section(&mut self, index: usize) -> &mut Section {
        let height_map = &self.height_map;
        self.sections[index].get_or_insert_with(|| {
            let mut section = Section::new();
            let base = (index as i32) * 16;
            for z in 0..16 {
                for x in 0..16 {
                    let height = height_map[column_index(x, z)];
                    for y in 0..16 {
                        if base + y >= height {
                            section.set_sky_light(section_index(x, y, z), 15);
                        }
                    }
                }
            }
            section
        })
    }

    /// Block id at a position. Out-of-world positions and missing sections
    /// read as air.
    pub fn block_id(&self, x: i32, y: i32, z: i32) -> u16 {
        if !(0..WORLD_HEIGHT).contains(&y) {
            return 0;
        }
        self.section((y >> 4) as usize)
            .map_or(0, |section| section.block_id(section_index(x, y, z)))
    }

    pub fn get_block(&self, x: i32, y: i32, z: i32) -> Block {
        if !(0..WORLD_HEIGHT).contains(&y) {
            return Block::default();
        }
        let key = block_key(x, y, z);
        let (id, data) = match self.section((y >> 4) as usize) {
            Some(section) => {
                let index = section_index(x, y, z);
                (section.block_id(index), section.block_data(index))
            }
            None => (0, 0),
        };
        Block {
            id,
            data,
            metadata: self.tile_entities.get(&key).cloned(),
            ticks: self.tile_ticks.get(&key).cloned().unwrap_or_default(),
        }
    }

    /// Writes a block and its side data, keeping the height map current.
    pub fn set_block(
        &mut self,
        x: i32,
        y: i32,
        z: i32,
        block: &Block,
        props: &BlockProperties,
    ) -> Result<()> {
        check_height(y)?;
        let index = (y >> 4) as usize;
        let id = block.id & 0x0FFF;
        let data = block.data & 0x0F;

        // Writing air into a missing section changes nothing.
        if id != 0 || data != 0 || self.has_section(index) {
            let section = self.ensure_section(index);
            let i = section_index(x, y, z);
            section.set_block_id(i, id);
            section.set_block_data(i, data);
        }

        let key = block_key(x, y, z);
        match &block.metadata {
            Some(metadata) => {
                self.tile_entities.insert(key, metadata.clone());
            }
            None => {
                self.tile_entities.remove(&key);
            }
        }
        if block.ticks.is_empty() {
            self.tile_ticks.remove(&key);
        } else {
            self.tile_ticks.insert(key, block.ticks.clone());
        }

        self.update_height(x, y, z, props.opacity(id) > 1, props);
        Ok(())
    }

    fn update_height(&mut self, x: i32, y: i32, z: i32, blocks_light: bool, props: &BlockProperties) {
        let column = column_index(x, z);
        let height = self.height_map[column];
        if blocks_light {
            if y + 1 > height {
                self.height_map[column] = y + 1;
            }
        } else if y + 1 == height {
            // The top block was removed: scan down for the next one.
            let top = (0..y)
                .rev()
                .find(|&below| props.opacity(self.block_id(x, below, z)) > 1)
                .map_or(0, |below| below + 1);
            self.height_map[column] = top;
        }
    }

    /// Biome id of a column; -1 means unset.
    pub fn biome(&self, x: i32, z: i32) -> i8 {
        self.biomes[column_index(x, z)]
    }

    pub fn set_biome(&mut self, x: i32, z: i32, biome: i8) {
        self.biomes[column_index(x, z)] = biome;
    }

    /// One above the highest block with opacity above 1, or 0.
    pub fn height(&self, x: i32, z: i32) -> i32 {
        self.height_map[column_index(x, z)]
    }

    pub fn opacity(&self, x: i32, y: i32, z: i32, props: &BlockProperties) -> u8 {
        props.opacity(self.block_id(x, y, z))
    }

    /// Stored light, `None` when the section does not exist.
    pub fn light(&self, channel: LightChannel, x: i32, y: i32, z: i32) -> Option<u8> {
        if !(0..WORLD_HEIGHT).contains(&y) {
            return None;
        }
        let section = self.section((y >> 4) as usize)?;
        let index = section_index(x, y, z);
        Some(match channel {
            LightChannel::Block => section.block_light(index),
            LightChannel::Sky => section.sky_light(index),
        })
    }

    /// Stores light, returning `false` when the section does not exist.
    pub fn set_light(&mut self, channel: LightChannel, x: i32, y: i32, z: i32, value: u8) -> bool {
        if !(0..WORLD_HEIGHT).contains(&y) {
            return false;
        }
        let Some(section) = self.sections[(y >> 4) as usize].as_mut() else {
            return false;
        };
        let index = section_index(x, y, z);
        match channel {
            LightChannel::Block => section.set_block_light(index, value),
            LightChannel::Sky => section.set_sky_light(index, value),
        }
        true
    }

    pub fn block_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.light(LightChannel::Block, x, y, z).unwrap_or(0)
    }

    pub fn set_block_light(&mut self, x: i32, y: i32, z: i32, value: u8) -> bool {
        self.set_light(LightChannel::Block, x, y, z, value)
    }

    pub fn sky_light(&self, x: i32, y: i32, z: i32) -> u8 {
        self.light(LightChannel::Sky, x, y, z).unwrap_or(0)
    }

    pub fn set_sky_light(&mut self, x: i32, y: i32, z: i32, value: u8) -> bool {
        self.set_light(LightChannel::Sky, x, y, z, value)
    }

    pub fn inhabited_time(&self) -> i64 {
        self.inhabited_time
    }

    pub fn set_inhabited_time(&mut self, ticks: i64) {
        self.inhabited_time = ticks;
    }

    pub fn last_update(&self) -> i64 {
        self.last_update
    }

    pub fn set_last_update(&mut self, tick: i64) {
        self.last_update = tick;
    }

    pub fn terrain_populated(&self) -> bool {
        self.terrain_populated
    }

    pub fn set_terrain_populated(&mut self, populated: bool) {
        self.terrain_populated = populated;
    }

    /// Entity compounds, kept as loaded.
    pub fn entities(&self) -> &[Tag] {
        &self.entities
    }

    /// Builds a chunk from its stored tag tree, checking it belongs at `pos`.
    pub fn from_tag(tag: &Tag, pos: ChunkPos) -> Result<Self> {
        let root = tag.as_compound().ok_or_else(|| StrataError::WrongType {
            name: String::new(),
            expected: "TAG_Compound",
            got: tag.type_name(),
        })?;
        let level = root.get_compound("Level")?;

        let x = level.get_int("xPos")?;
        if x != pos.x {
            return Err(StrataError::unexpected("xPos", pos.x, x));
        }
        let z = level.get_int("zPos")?;
        if z != pos.z {
            return Err(StrataError::unexpected("zPos", pos.z, z));
        }

        let mut chunk = Chunk::new(pos);

        let heights = level.get_int_array("HeightMap")?;
        if heights.len() != COLUMNS {
            return Err(StrataError::oob("HeightMap", COLUMNS, heights.len()));
        }
        chunk.height_map.copy_from_slice(heights);

        chunk.inhabited_time = level.get_long("InhabitedTime")?;
        chunk.last_update = level.get_long("LastUpdate")?;
        chunk.terrain_populated = level.get_byte("TerrainPopulated")? != 0;

        for section in compounds(level.get_list("Sections")?, "Sections")? {
            let (y, section) = Section::from_compound(section)?;
            chunk.sections[y] = Some(section);
        }

        if let Some(biomes) = level.get_byte_array_opt("Biomes")? {
            if biomes.len() != COLUMNS {
                return Err(StrataError::oob("Biomes", COLUMNS, biomes.len()));
            }
            chunk.biomes.copy_from_slice(biomes);
        }

        if let Some(entities) = level.get_list_opt("Entities")? {
            chunk.entities = entities.to_vec();
        }

        let tile_entities = level.get_list_opt("TileEntities")?.unwrap_or(&[]);
        for entity in compounds(tile_entities, "TileEntities")? {
            let key = chunk.side_key(
                "TileEntities",
                BlockPos::new(entity.get_int("x")?, entity.get_int("y")?, entity.get_int("z")?),
            )?;
            let metadata: Compound = entity
                .iter()
                .filter(|(name, _)| !matches!(*name, "x" | "y" | "z"))
                .map(|(name, tag)| (name.to_owned(), tag.clone()))
                .collect();
            chunk.tile_entities.insert(key, metadata);
        }

        let tile_ticks = level.get_list_opt("TileTicks")?.unwrap_or(&[]);
        for entry in compounds(tile_ticks, "TileTicks")? {
            let ((x, y, z), tick) = Tick::from_compound(entry)?;
            let key = chunk.side_key("TileTicks", BlockPos::new(x, y, z))?;
            chunk
                .tile_ticks
                .entry(key)
                .or_default()
                .push(tick);
        }

        chunk.extra = level
            .iter()
            .filter(|(name, _)| !KNOWN_KEYS.contains(name))
            .map(|(name, tag)| (name.to_owned(), tag.clone()))
            .collect();

        log::trace!(
            "loaded chunk {}: {} sections, {} tile entities",
            pos,
            chunk.sections.iter().flatten().count(),
            chunk.tile_entities.len()
        );
        Ok(chunk)
    }

    /// Side-table key of a stored absolute position, which must lie inside
    /// this chunk.
    fn side_key(&self, table: &str, pos: BlockPos) -> Result<u16> {
        if pos.chunk() != self.pos || !pos.in_world() {
            return Err(StrataError::unexpected(
                table,
                format!("a block in chunk {}", self.pos),
                pos,
            ));
        }
        Ok(block_key(pos.x, pos.y, pos.z))
    }

    /// Absolute position of a side-table key.
    fn key_pos(&self, key: u16) -> (i32, i32, i32) {
        (
            self.pos.x * 16 + (key & 15) as i32,
            (key >> 8) as i32,
            self.pos.z * 16 + ((key >> 4) & 15) as i32,
        )
    }

    pub fn to_tag(&self) -> Tag {
        let mut level = Compound::new();
        level.set("xPos", Tag::Int(self.pos.x));
        level.set("zPos", Tag::Int(self.pos.z));
        level.set("LastUpdate", Tag::Long(self.last_update));
        level.set("TerrainPopulated", Tag::Byte(self.terrain_populated as i8));
        level.set("InhabitedTime", Tag::Long(self.inhabited_time));
        level.set("HeightMap", Tag::IntArray(self.height_map.to_vec()));
        level.set("Biomes", Tag::ByteArray(self.biomes.to_vec()));

        let sections = self
            .sections
            .iter()
            .enumerate()
            .filter_map(|(y, section)| section.as_ref().map(|s| Tag::Compound(s.to_compound(y))))
            .collect();
        level.set("Sections", Tag::List(sections));
        level.set("Entities", Tag::List(self.entities.clone()));

        let mut keys: Vec<u16> = self.tile_entities.keys().copied().collect();
        keys.sort_unstable();
        let tile_entities = keys
            .iter()
            .map(|key| {
                let (x, y, z) = self.key_pos(*key);
                let mut entity = self.tile_entities[key].clone();
                entity.set("x", Tag::Int(x));
                entity.set("y", Tag::Int(y));
                entity.set("z", Tag::Int(z));
                Tag::Compound(entity)
            })
            .collect();
        level.set("TileEntities", Tag::List(tile_entities));

        if !self.tile_ticks.is_empty() {
            let mut keys: Vec<u16> = self.tile_ticks.keys().copied().collect();
            keys.sort_unstable();
            let mut ticks = Vec::new();
            for key in keys {
                let (x, y, z) = self.key_pos(key);
                for tick in &self.tile_ticks[&key] {
                    ticks.push(Tag::Compound(tick.to_compound(x, y, z)));
                }
            }
            level.set("TileTicks", Tag::List(ticks));
        }

        for (name, tag) in self.extra.iter() {
            level.set(name, tag.clone());
        }

        let mut root = Compound::new();
        root.set("Level", Tag::Compound(level));
        Tag::Compound(root)
    }
}
