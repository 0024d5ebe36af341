use crate::region::RegionFile;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::io::Cursor;
use strata_common::{ChunkPos, MultiError, RegionPos, Result, StrataError};
use strata_nbt::{NbtFile, Tag};

/// Persistent home of a world: chunk tag trees keyed by chunk position, plus
/// the `level.dat` tree.
pub trait WorldStore {
    /// Loads the tag tree of a chunk, or `None` if it was never stored.
    fn get_chunk(&mut self, pos: ChunkPos) -> Result<Option<Tag>>;

    fn get_chunks(&mut self, positions: &[ChunkPos]) -> Result<Vec<Option<Tag>>> {
        positions.iter().map(|&pos| self.get_chunk(pos)).collect()
    }

    /// Stores a batch of chunks.
    ///
    /// Two entries for the same position fail with `Conflict` before anything
    /// is written. Failures in individual regions do not stop the others and
    /// are reported together as `Multi`.
    fn set_chunks(&mut self, chunks: Vec<(ChunkPos, Tag)>) -> Result<()>;

    fn set_chunk(&mut self, pos: ChunkPos, tag: Tag) -> Result<()> {
        self.set_chunks(vec![(pos, tag)])
    }

    fn remove_chunk(&mut self, pos: ChunkPos) -> Result<()>;

    /// Loads the root tag of `level.dat`, or `None` if there is none yet.
    fn read_level_dat(&mut self) -> Result<Option<Tag>>;

    fn write_level_dat(&mut self, root: &Tag) -> Result<()>;
}

/// Groups a batch of chunks by region, rejecting duplicate positions.
pub(crate) fn batch_by_region(
    chunks: Vec<(ChunkPos, Tag)>,
) -> Result<BTreeMap<RegionPos, Vec<(ChunkPos, Tag)>>> {
    let mut seen = HashSet::with_capacity(chunks.len());
    for (pos, _) in &chunks {
        if !seen.insert(*pos) {
            return Err(StrataError::Conflict { x: pos.x, z: pos.z });
        }
    }

    let mut batches: BTreeMap<RegionPos, Vec<(ChunkPos, Tag)>> = BTreeMap::new();
    for (pos, tag) in chunks {
        batches.entry(pos.region()).or_default().push((pos, tag));
    }
    Ok(batches)
}

/// Writes one region's share of a batch, collecting per-chunk failures.
pub(crate) fn write_batch<B: crate::region::RegionBacking>(
    region: &mut RegionFile<B>,
    chunks: Vec<(ChunkPos, Tag)>,
    errors: &mut MultiError,
) {
    for (pos, tag) in chunks {
        let (x, z) = pos.local();
        if let Err(e) = region.write_chunk(x, z, &tag) {
            log::warn!("failed to write chunk {}: {}", pos, e);
            errors.push(e);
        }
    }
}

pub(crate) fn encode_level_dat(root: &Tag) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    root.write(&mut encoder, "")?;
    Ok(encoder.finish()?)
}

pub(crate) fn decode_level_dat(bytes: &[u8]) -> Result<Tag> {
    let file = NbtFile::read(&mut GzDecoder::new(bytes))?;
    Ok(file.root)
}

/// A store kept entirely in memory, using the same region layout as the
/// files on disk. It never loses its lock.
#[derive(Default)]
pub struct MemoryStore {
    regions: HashMap<RegionPos, RegionFile<Cursor<Vec<u8>>>>,
    level_dat: Option<Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Regions holding at least one chunk.
    pub fn regions(&self) -> Vec<RegionPos> {
        let mut regions: Vec<RegionPos> = self
            .regions
            .iter()
            .filter(|(_, region)| !region.is_empty())
            .map(|(pos, _)| *pos)
            .collect();
        regions.sort();
        regions
    }

    pub fn defrag(&mut self, region: RegionPos) -> Result<()> {
        match self.regions.get_mut(&region) {
            Some(file) => file.defrag(),
            None => Ok(()),
        }
    }

    /// Current byte length of a region's backing buffer.
    pub fn region_len(&self, region: RegionPos) -> Option<usize> {
        self.regions
            .get(&region)
            .map(|file| file.backing_ref().get_ref().len())
    }
}

impl WorldStore for MemoryStore {
    fn get_chunk(&mut self, pos: ChunkPos) -> Result<Option<Tag>> {
        match self.regions.get_mut(&pos.region()) {
            Some(region) => {
                let (x, z) = pos.local();
                region.read_chunk(x, z)
            }
            None => Ok(None),
        }
    }

    fn set_chunks(&mut self, chunks: Vec<(ChunkPos, Tag)>) -> Result<()> {
        let mut errors = MultiError::new();
        for (region_pos, batch) in batch_by_region(chunks)? {
            let region = match self.regions.entry(region_pos) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => match RegionFile::in_memory() {
                    Ok(region) => entry.insert(region),
                    Err(e) => {
                        errors.push(e);
                        continue;
                    }
                },
            };
            write_batch(region, batch, &mut errors);
        }
        errors.into_result()
    }

    fn remove_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        if let Some(region) = self.regions.get_mut(&pos.region()) {
            let (x, z) = pos.local();
            region.remove_chunk(x, z)?;
        }
        Ok(())
    }

    fn read_level_dat(&mut self) -> Result<Option<Tag>> {
        self.level_dat
            .as_deref()
            .map(decode_level_dat)
            .transpose()
    }

    fn write_level_dat(&mut self, root: &Tag) -> Result<()> {
        self.level_dat = Some(encode_level_dat(root)?);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strata_nbt::Compound;

    fn chunk(pos: ChunkPos) -> Tag {
        let mut level = Compound::new();
        level.set("xPos", Tag::Int(pos.x));
        level.set("zPos", Tag::Int(pos.z));
        let mut root = Compound::new();
        root.set("Level", Tag::Compound(level));
        Tag::Compound(root)
    }

    #[test]
    fn test_set_and_get_across_regions() {
        let mut store = MemoryStore::new();
        let positions = [
            ChunkPos::new(0, 0),
            ChunkPos::new(31, 31),
            ChunkPos::new(32, 0),
            ChunkPos::new(-1, -33),
        ];
        store
            .set_chunks(positions.iter().map(|&pos| (pos, chunk(pos))).collect())
            .unwrap();

        let loaded = store.get_chunks(&positions).unwrap();
        for (pos, tag) in positions.iter().zip(loaded) {
            assert_eq!(tag, Some(chunk(*pos)));
        }
        assert_eq!(store.get_chunk(ChunkPos::new(5, 5)).unwrap(), None);
        assert_eq!(
            store.regions(),
            vec![
                RegionPos::new(-1, -2),
                RegionPos::new(0, 0),
                RegionPos::new(1, 0)
            ]
        );
    }

    #[test]
    fn test_duplicate_positions_conflict() {
        let mut store = MemoryStore::new();
        let pos = ChunkPos::new(2, 3);
        let other = ChunkPos::new(40, 3);
        let result = store.set_chunks(vec![
            (other, chunk(other)),
            (pos, chunk(pos)),
            (pos, chunk(pos)),
        ]);

        assert_matches!(result, Err(StrataError::Conflict { x: 2, z: 3 }));
        assert_eq!(store.get_chunk(other).unwrap(), None);
        assert!(store.regions().is_empty());
    }

    #[test]
    fn test_remove_chunk() {
        let mut store = MemoryStore::new();
        let pos = ChunkPos::new(1, 1);
        store.set_chunk(pos, chunk(pos)).unwrap();
        store.remove_chunk(pos).unwrap();
        assert_eq!(store.get_chunk(pos).unwrap(), None);
        store.remove_chunk(ChunkPos::new(500, 500)).unwrap();
    }

    #[test]
    fn test_level_dat_round_trip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.read_level_dat().unwrap(), None);

        let mut data = Compound::new();
        data.set("LevelName", Tag::String("test".to_owned()));
        let mut root = Compound::new();
        root.set("Data", Tag::Compound(data));
        let root = Tag::Compound(root);

        store.write_level_dat(&root).unwrap();
        assert_eq!(store.read_level_dat().unwrap(), Some(root));
    }

    #[test]
    fn test_defrag_shrinks_region() {
        let mut store = MemoryStore::new();
        let positions: Vec<ChunkPos> = (0..4).map(|x| ChunkPos::new(x, 0)).collect();
        store
            .set_chunks(positions.iter().map(|&pos| (pos, chunk(pos))).collect())
            .unwrap();
        store.remove_chunk(positions[0]).unwrap();
        store.remove_chunk(positions[2]).unwrap();

        let region = RegionPos::new(0, 0);
        let before = store.region_len(region).unwrap();
        store.defrag(region).unwrap();
        assert!(store.region_len(region).unwrap() < before);
        assert_eq!(store.get_chunk(positions[3]).unwrap(), Some(chunk(positions[3])));
    }
}
