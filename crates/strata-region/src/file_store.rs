use crate::lock::SessionLock;
use crate::region::RegionFile;
use crate::store::{batch_by_region, decode_level_dat, encode_level_dat, write_batch, WorldStore};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use strata_common::{ChunkPos, MultiError, RegionPos, Result};
use strata_nbt::Tag;

pub const LEVEL_DAT: &str = "level.dat";
pub const REGION_DIR: &str = "region";

/// A world directory on disk:
///
/// ```text
/// <dir>/level.dat          gzip-compressed tag tree
/// <dir>/session.lock       big-endian millisecond timestamp
/// <dir>/region/r.X.Z.mca   region files
/// ```
///
/// Every operation first checks that the session lock is still ours.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    lock: SessionLock,
}

impl FileStore {
    /// Opens (creating if needed) a world directory and takes its lock.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join(REGION_DIR))?;
        let lock = SessionLock::acquire(&dir)?;
        log::info!("opened world directory {}", dir.display());
        Ok(Self { dir, lock })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Takes the lock back after another process stole it.
    pub fn lock(&mut self) -> Result<()> {
        self.lock.reacquire()
    }

    pub fn has_lock(&self) -> Result<bool> {
        self.lock.is_held()
    }

    fn region_path(&self, region: RegionPos) -> PathBuf {
        self.dir.join(REGION_DIR).join(region.file_name())
    }

    fn open_region(&self, region: RegionPos, create: bool) -> Result<Option<RegionFile<File>>> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(create)
            .truncate(false)
            .open(self.region_path(region));
        match file {
            Ok(file) => Ok(Some(RegionFile::open(file)?)),
            Err(e) if !create && e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Regions that have a file in the region directory.
    pub fn regions(&self) -> Result<Vec<RegionPos>> {
        self.lock.check()?;
        let mut regions = Vec::new();
        for entry in fs::read_dir(self.dir.join(REGION_DIR))? {
            let entry = entry?;
            if let Some(region) = entry.file_name().to_str().and_then(RegionPos::from_file_name) {
                regions.push(region);
            }
        }
        regions.sort();
        Ok(regions)
    }

    /// Compacts one region file.
    pub fn defrag(&mut self, region: RegionPos) -> Result<()> {
        self.lock.check()?;
        if let Some(mut file) = self.open_region(region, false)? {
            file.defrag()?;
        }
        Ok(())
    }
}

impl WorldStore for FileStore {
    fn get_chunk(&mut self, pos: ChunkPos) -> Result<Option<Tag>> {
        self.lock.check()?;
        match self.open_region(pos.region(), false)? {
            Some(mut region) => {
                let (x, z) = pos.local();
                region.read_chunk(x, z)
            }
            None => Ok(None),
        }
    }

    fn get_chunks(&mut self, positions: &[ChunkPos]) -> Result<Vec<Option<Tag>>> {
        self.lock.check()?;
        let mut open: Option<(RegionPos, Option<RegionFile<File>>)> = None;
        let mut chunks = Vec::with_capacity(positions.len());
        for pos in positions {
            let region_pos = pos.region();
            let reuse = matches!(&open, Some((current, _)) if *current == region_pos);
            if !reuse {
                open = Some((region_pos, self.open_region(region_pos, false)?));
            }
            let chunk = match &mut open {
                Some((_, Some(region))) => {
                    let (x, z) = pos.local();
                    region.read_chunk(x, z)?
                }
                _ => None,
            };
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    fn set_chunks(&mut self, chunks: Vec<(ChunkPos, Tag)>) -> Result<()> {
        self.lock.check()?;
        let batches = batch_by_region(chunks)?;

        let mut errors = MultiError::new();
        for (region_pos, batch) in batches {
            let mut region = match self.open_region(region_pos, true) {
                Ok(Some(region)) => region,
                Ok(None) => continue,
                Err(e) => {
                    log::warn!("failed to open region {}: {}", region_pos.file_name(), e);
                    errors.push(e);
                    continue;
                }
            };
            write_batch(&mut region, batch, &mut errors);
            if let Err(e) = region.flush() {
                errors.push(e);
            }
        }
        errors.into_result()
    }

    fn remove_chunk(&mut self, pos: ChunkPos) -> Result<()> {
        self.lock.check()?;
        if let Some(mut region) = self.open_region(pos.region(), false)? {
            let (x, z) = pos.local();
            region.remove_chunk(x, z)?;
            region.flush()?;
        }
        Ok(())
    }

    fn read_level_dat(&mut self) -> Result<Option<Tag>> {
        self.lock.check()?;
        match fs::read(self.dir.join(LEVEL_DAT)) {
            Ok(bytes) => decode_level_dat(&bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write_level_dat(&mut self, root: &Tag) -> Result<()> {
        self.lock.check()?;
        let bytes = encode_level_dat(root)?;
        // Write next to the old file and swap, so a crash leaves one intact.
        let staging = self.dir.join("level.dat_new");
        fs::write(&staging, bytes)?;
        fs::rename(&staging, self.dir.join(LEVEL_DAT))?;
        Ok(())
    }
}
