//! Sector-table region container.
//!
//! Layout (all integers big-endian):
//! - bytes 0–4095: 1024 location entries, `(sector_offset << 8) | sector_count`, 0 = absent
//! - bytes 4096–8191: 1024 Unix timestamps, one per entry
//! - from byte 8192: payloads, each `length: u32`, `compression: u8`, `length - 1`
//!   compressed bytes, zero-padded to the next sector boundary
//!
//! Entries are indexed by `(z & 31) * 32 + (x & 31)`.

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::time::{SystemTime, UNIX_EPOCH};
use strata_common::{Result, StrataError};
use strata_nbt::Tag;

/// Size of one sector in bytes.
pub const SECTOR_SIZE: u64 = 4096;
/// Location table plus timestamp table.
pub const HEADER_SIZE: u64 = 2 * SECTOR_SIZE;
/// Number of chunks in a region.
pub const REGION_CHUNKS: usize = 1024;
/// Largest sector count a location entry can describe.
pub const MAX_CHUNK_SECTORS: usize = 255;

pub const COMPRESSION_GZIP: u8 = 1;
pub const COMPRESSION_ZLIB: u8 = 2;

/// Byte container a region lives in: a file on disk or a buffer in memory.
pub trait RegionBacking: Read + Write + Seek {
    fn set_len(&mut self, len: u64) -> io::Result<()>;

    fn byte_len(&mut self) -> io::Result<u64> {
        self.seek(SeekFrom::End(0))
    }
}

impl RegionBacking for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(self, len)
    }
}

impl RegionBacking for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        self.get_mut().resize(len as usize, 0);
        Ok(())
    }
}

/// One entry of the location table.
#[derive(Copy, Clone, Default, Debug, Eq, PartialEq)]
struct ChunkLocation {
    /// First sector of the payload.
    sector: u32,
    /// Number of sectors reserved for the payload.
    sectors: u8,
}

impl ChunkLocation {
    fn from_raw(raw: u32) -> Self {
        Self {
            sector: raw >> 8,
            sectors: (raw & 0xFF) as u8,
        }
    }

    fn to_raw(self) -> u32 {
        (self.sector << 8) | self.sectors as u32
    }

    fn is_empty(&self) -> bool {
        self.sector == 0 || self.sectors == 0
    }

    fn end(&self) -> u32 {
        self.sector + self.sectors as u32
    }
}

fn sectors_for(bytes: u64) -> u64 {
    bytes.div_ceil(SECTOR_SIZE)
}

fn unix_time() -> u32 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

/// A region: up to 1024 compressed chunk payloads for a 32×32 chunk area.
pub struct RegionFile<B> {
    backing: B,
    locations: [ChunkLocation; REGION_CHUNKS],
    timestamps: [u32; REGION_CHUNKS],
}

impl RegionFile<Cursor<Vec<u8>>> {
    /// An empty region held in memory.
    pub fn in_memory() -> Result<Self> {
        Self::open(Cursor::new(Vec::new()))
    }
}

impl<B: RegionBacking> RegionFile<B> {
    /// Opens a region, writing an empty header first if the backing is
    /// shorter than one.
    pub fn open(mut backing: B) -> Result<Self> {
        if backing.byte_len()? < HEADER_SIZE {
            backing.set_len(HEADER_SIZE)?;
        }

        let mut header = vec![0u8; HEADER_SIZE as usize];
        backing.seek(SeekFrom::Start(0))?;
        backing.read_exact(&mut header)?;

        let mut reader = Cursor::new(header);
        let mut locations = [ChunkLocation::default(); REGION_CHUNKS];
        let mut timestamps = [0u32; REGION_CHUNKS];
        for location in locations.iter_mut() {
            *location = ChunkLocation::from_raw(reader.read_u32::<BigEndian>()?);
        }
        for timestamp in timestamps.iter_mut() {
            *timestamp = reader.read_u32::<BigEndian>()?;
        }

        Ok(Self {
            backing,
            locations,
            timestamps,
        })
    }

    pub fn into_inner(self) -> B {
        self.backing
    }

    pub fn backing_ref(&self) -> &B {
        &self.backing
    }

    fn index(x: usize, z: usize) -> usize {
        (z & 31) * 32 + (x & 31)
    }

    /// Whether the location table has an entry for the chunk.
    pub fn contains(&self, x: usize, z: usize) -> bool {
        !self.locations[Self::index(x, z)].is_empty()
    }

    /// Last write time recorded for the chunk, in Unix seconds.
    pub fn timestamp(&self, x: usize, z: usize) -> u32 {
        self.timestamps[Self::index(x, z)]
    }

    /// Local positions of every chunk present in the region.
    pub fn chunks(&self) -> Vec<(usize, usize)> {
        self.locations
            .iter()
            .enumerate()
            .filter(|(_, location)| !location.is_empty())
            .map(|(index, _)| (index % 32, index / 32))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.locations.iter().all(ChunkLocation::is_empty)
    }

    /// Reads the framed payload (`length`, `compression`, data) of a chunk,
    /// checking it fits the sectors the table reserves for it.
    fn read_frame(&mut self, location: ChunkLocation) -> Result<Vec<u8>> {
        let reserved = location.sectors as u64 * SECTOR_SIZE;
        self.backing
            .seek(SeekFrom::Start(location.sector as u64 * SECTOR_SIZE))?;

        let length = match self.backing.read_u32::<BigEndian>() {
            Ok(length) => length as u64,
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                return Err(StrataError::Read("payload starts past end of file".to_owned()))
            }
            Err(e) => return Err(e.into()),
        };
        if length == 0 {
            return Err(StrataError::Read("zero length payload".to_owned()));
        }
        if length + 4 > reserved {
            return Err(StrataError::Read(format!(
                "payload of {} bytes exceeds {} reserved bytes",
                length, reserved
            )));
        }

        let mut frame = vec![0u8; 4 + length as usize];
        frame[..4].copy_from_slice(&(length as u32).to_be_bytes());
        match self.backing.read_exact(&mut frame[4..]) {
            Ok(()) => Ok(frame),
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
                Err(StrataError::Read("truncated payload".to_owned()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the decompressed payload bytes of a chunk, or `None` if the
    /// region has no entry for it.
    pub fn read_raw(&mut self, x: usize, z: usize) -> Result<Option<Vec<u8>>> {
        let location = self.locations[Self::index(x, z)];
        if location.is_empty() {
            return Ok(None);
        }

        let frame = self.read_frame(location)?;
        let compression = frame[4];
        let compressed = &frame[5..];

        let mut buffer = Vec::new();
        match compression {
            COMPRESSION_GZIP => {
                GzDecoder::new(compressed).read_to_end(&mut buffer)?;
            }
            COMPRESSION_ZLIB => {
                ZlibDecoder::new(compressed).read_to_end(&mut buffer)?;
            }
            other => return Err(StrataError::UnknownCompression(other)),
        }
        Ok(Some(buffer))
    }

    /// Reads and decodes the tag tree stored for a chunk.
    pub fn read_chunk(&mut self, x: usize, z: usize) -> Result<Option<Tag>> {
        match self.read_raw(x, z)? {
            Some(raw) => {
                let (_, tag) = Tag::read(&mut Cursor::new(raw))?;
                Ok(Some(tag))
            }
            None => Ok(None),
        }
    }

    /// Encodes, zlib-compresses and stores the tag tree of a chunk.
    pub fn write_chunk(&mut self, x: usize, z: usize, tag: &Tag) -> Result<()> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        tag.write(&mut encoder, "")?;
        let compressed = encoder.finish()?;
        self.write_compressed(x, z, COMPRESSION_ZLIB, &compressed)
    }

    /// Stores already-compressed bytes under the given compression code.
    pub fn write_compressed(
        &mut self,
        x: usize,
        z: usize,
        compression: u8,
        compressed: &[u8],
    ) -> Result<()> {
        let index = Self::index(x, z);
        let framed = compressed.len() as u64 + 5;
        let sectors = sectors_for(framed) as usize;
        if sectors > MAX_CHUNK_SECTORS {
            return Err(StrataError::oob("chunk sectors", MAX_CHUNK_SECTORS, sectors));
        }

        let sector = self.allocate(index, sectors)?;
        self.backing
            .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE))?;
        self.backing
            .write_u32::<BigEndian>(compressed.len() as u32 + 1)?;
        self.backing.write_u8(compression)?;
        self.backing.write_all(compressed)?;
        let padding = sectors as u64 * SECTOR_SIZE - framed;
        self.backing.write_all(&vec![0u8; padding as usize])?;

        self.locations[index] = ChunkLocation {
            sector,
            sectors: sectors as u8,
        };
        self.timestamps[index] = unix_time();
        self.write_entry(index)?;

        log::trace!(
            "wrote chunk ({}, {}) at sector {} ({} sectors)",
            x & 31,
            z & 31,
            sector,
            sectors
        );
        Ok(())
    }

    /// Finds the first run of `needed` free sectors, ignoring the space held
    /// by `index` itself; appends at the end of the file when no gap fits.
    fn allocate(&mut self, index: usize, needed: usize) -> Result<u32> {
        let total = sectors_for(self.backing.byte_len()?) as usize;
        let mut used = vec![false; total.max(2)];
        used[0] = true;
        used[1] = true;
        for (i, location) in self.locations.iter().enumerate() {
            if i == index || location.is_empty() {
                continue;
            }
            for sector in location.sector..location.end() {
                if let Some(slot) = used.get_mut(sector as usize) {
                    *slot = true;
                }
            }
        }

        let mut run_start = 2;
        let mut run_len = 0;
        for (sector, &taken) in used.iter().enumerate().skip(2) {
            if taken {
                run_start = sector + 1;
                run_len = 0;
            } else {
                run_len += 1;
                if run_len == needed {
                    return Ok(run_start as u32);
                }
            }
        }
        // Either the trailing free run or the end of the file.
        Ok(run_start as u32)
    }

    fn write_entry(&mut self, index: usize) -> Result<()> {
        self.backing.seek(SeekFrom::Start(index as u64 * 4))?;
        self.backing
            .write_u32::<BigEndian>(self.locations[index].to_raw())?;
        self.backing
            .seek(SeekFrom::Start(SECTOR_SIZE + index as u64 * 4))?;
        self.backing
            .write_u32::<BigEndian>(self.timestamps[index])?;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let mut header = Vec::with_capacity(HEADER_SIZE as usize);
        for location in &self.locations {
            header.write_u32::<BigEndian>(location.to_raw())?;
        }
        for &timestamp in &self.timestamps {
            header.write_u32::<BigEndian>(timestamp)?;
        }
        self.backing.seek(SeekFrom::Start(0))?;
        self.backing.write_all(&header)?;
        Ok(())
    }

    /// Drops the chunk from the location table. Its sectors are reused by
    /// later writes and reclaimed by [`Self::defrag`].
    pub fn remove_chunk(&mut self, x: usize, z: usize) -> Result<()> {
        let index = Self::index(x, z);
        self.locations[index] = ChunkLocation::default();
        self.timestamps[index] = 0;
        self.write_entry(index)
    }

    /// Rewrites every live payload back to back from the first data sector,
    /// then truncates the file after the last one.
    pub fn defrag(&mut self) -> Result<()> {
        let before = sectors_for(self.backing.byte_len()?);

        let mut live: Vec<(usize, ChunkLocation)> = self
            .locations
            .iter()
            .copied()
            .enumerate()
            .filter(|(_, location)| !location.is_empty())
            .collect();
        live.sort_by_key(|(_, location)| location.sector);

        let mut frames = Vec::with_capacity(live.len());
        for &(index, location) in &live {
            frames.push((index, self.read_frame(location)?));
        }

        let mut sector = 2u32;
        for (index, frame) in frames {
            let sectors = sectors_for(frame.len() as u64) as u32;
            self.backing
                .seek(SeekFrom::Start(sector as u64 * SECTOR_SIZE))?;
            self.backing.write_all(&frame)?;
            let padding = sectors as u64 * SECTOR_SIZE - frame.len() as u64;
            self.backing.write_all(&vec![0u8; padding as usize])?;

            self.locations[index] = ChunkLocation {
                sector,
                sectors: sectors as u8,
            };
            sector += sectors;
        }

        self.backing.set_len(sector as u64 * SECTOR_SIZE)?;
        self.write_header()?;
        self.backing.flush()?;

        log::debug!(
            "defragmented region: {} chunks, {} -> {} sectors",
            live.len(),
            before,
            sector
        );
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.backing.flush()?;
        Ok(())
    }
}
