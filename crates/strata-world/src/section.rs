use crate::nibble::NibbleArray;
use strata_common::{Result, StrataError, SECTIONS_PER_CHUNK};
use strata_nbt::{Compound, Tag};

/// Blocks in a 16×16×16 section.
pub const SECTION_VOLUME: usize = 4096;
const NIBBLE_BYTES: usize = SECTION_VOLUME / 2;

/// One 16×16×16 slice of a chunk column.
///
/// All arrays are indexed by [`strata_common::section_index`]. The block id is
/// split between a low byte in `blocks` and a high nibble in `add`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    blocks: Vec<u8>,
    add: NibbleArray,
    data: NibbleArray,
    block_light: NibbleArray,
    sky_light: NibbleArray,
}

impl Default for Section {
    fn default() -> Self {
        Self::new()
    }
}

fn to_unsigned(bytes: &[i8]) -> Vec<u8> {
    bytes.iter().map(|&b| b as u8).collect()
}

fn to_signed(bytes: &[u8]) -> Vec<i8> {
    bytes.iter().map(|&b| b as i8).collect()
}

fn sized_array(compound: &Compound, name: &str, len: usize) -> Result<Vec<u8>> {
    let bytes = compound.get_byte_array(name)?;
    if bytes.len() != len {
        return Err(StrataError::oob(name, len, bytes.len()));
    }
    Ok(to_unsigned(bytes))
}

impl Section {
    /// An all-air section with no light.
    pub fn new() -> Self {
        Self {
            blocks: vec![0; SECTION_VOLUME],
            add: NibbleArray::new(SECTION_VOLUME),
            data: NibbleArray::new(SECTION_VOLUME),
            block_light: NibbleArray::new(SECTION_VOLUME),
            sky_light: NibbleArray::new(SECTION_VOLUME),
        }
    }

    #[inline]
    pub fn block_id(&self, index: usize) -> u16 {
        self.blocks[index] as u16 | ((self.add.get(index) as u16) << 8)
    }

    #[inline]
    pub fn set_block_id(&mut self, index: usize, id: u16) {
        self.blocks[index] = (id & 0xFF) as u8;
        self.add.set(index, ((id >> 8) & 0x0F) as u8);
    }

    #[inline]
    pub fn block_data(&self, index: usize) -> u8 {
        self.data.get(index)
    }

    #[inline]
    pub fn set_block_data(&mut self, index: usize, data: u8) {
        self.data.set(index, data);
    }

    #[inline]
    pub fn block_light(&self, index: usize) -> u8 {
        self.block_light.get(index)
    }

    #[inline]
    pub fn set_block_light(&mut self, index: usize, light: u8) {
        self.block_light.set(index, light);
    }

    #[inline]
    pub fn sky_light(&self, index: usize) -> u8 {
        self.sky_light.get(index)
    }

    #[inline]
    pub fn set_sky_light(&mut self, index: usize, light: u8) {
        self.sky_light.set(index, light);
    }

    /// Reads a `Sections` entry, returning its `Y` index with it.
    pub fn from_compound(compound: &Compound) -> Result<(usize, Section)> {
        let y = compound.get_byte("Y")?;
        if !(0..SECTIONS_PER_CHUNK as i8).contains(&y) {
            return Err(StrataError::unexpected("Y", "0..15", y));
        }

        let blocks = sized_array(compound, "Blocks", SECTION_VOLUME)?;
        let add = match compound.get_byte_array_opt("Add")? {
            Some(bytes) if bytes.len() != NIBBLE_BYTES => {
                return Err(StrataError::oob("Add", NIBBLE_BYTES, bytes.len()))
            }
            Some(bytes) => NibbleArray::from_bytes(to_unsigned(bytes)),
            None => NibbleArray::new(SECTION_VOLUME),
        };

        let section = Section {
            blocks,
            add,
            data: NibbleArray::from_bytes(sized_array(compound, "Data", NIBBLE_BYTES)?),
            block_light: NibbleArray::from_bytes(sized_array(
                compound,
                "BlockLight",
                NIBBLE_BYTES,
            )?),
            sky_light: NibbleArray::from_bytes(sized_array(compound, "SkyLight", NIBBLE_BYTES)?),
        };
        Ok((y as usize, section))
    }

    pub fn to_compound(&self, y: usize) -> Compound {
        let mut compound = Compound::new();
        compound.set("Y", Tag::Byte(y as i8));
        compound.set("Blocks", Tag::ByteArray(to_signed(&self.blocks)));
        // Only worlds with ids above 255 need the high nibbles.
        if !self.add.is_zero() {
            compound.set("Add", Tag::ByteArray(to_signed(self.add.as_bytes())));
        }
        compound.set("Data", Tag::ByteArray(to_signed(self.data.as_bytes())));
        compound.set(
            "BlockLight",
            Tag::ByteArray(to_signed(self.block_light.as_bytes())),
        );
        compound.set(
            "SkyLight",
            Tag::ByteArray(to_signed(self.sky_light.as_bytes())),
        );
        compound
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use strata_common::section_index;

    fn section_compound(y: i8) -> Compound {
        let mut compound = Compound::new();
        compound.set("Y", Tag::Byte(y));
        compound.set("Blocks", Tag::ByteArray(vec![0; 4096]));
        compound.set("Data", Tag::ByteArray(vec![0; 2048]));
        compound.set("BlockLight", Tag::ByteArray(vec![0; 2048]));
        compound.set("SkyLight", Tag::ByteArray(vec![0; 2048]));
        compound
    }

    #[test]
    fn test_twelve_bit_ids() {
        let mut section = Section::new();
        let index = section_index(3, 4, 5);
        section.set_block_id(index, 0xABC);
        assert_eq!(section.block_id(index), 0xABC);
        assert_eq!(section.blocks[index], 0xBC);
        assert_eq!(section.add.get(index), 0xA);
        assert_eq!(section.block_id(index + 1), 0);
    }

    #[test]
    fn test_compound_round_trip() {
        let mut section = Section::new();
        let index = section_index(15, 15, 15);
        section.set_block_id(index, 300);
        section.set_block_data(index, 9);
        section.set_block_light(index, 14);
        section.set_sky_light(0, 15);

        let compound = section.to_compound(7);
        assert!(compound.contains("Add"));
        let (y, loaded) = Section::from_compound(&compound).unwrap();
        assert_eq!(y, 7);
        assert_eq!(loaded, section);
    }

    #[test]
    fn test_add_is_optional() {
        let mut compound = section_compound(0);
        compound.set("Blocks", Tag::ByteArray(vec![-1; 4096]));
        let (_, section) = Section::from_compound(&compound).unwrap();
        assert_eq!(section.block_id(0), 255);
        assert!(!section.to_compound(0).contains("Add"));
    }

    #[test]
    fn test_rejects_bad_lengths() {
        let mut compound = section_compound(0);
        compound.set("Blocks", Tag::ByteArray(vec![0; 4095]));
        assert_matches!(
            Section::from_compound(&compound),
            Err(StrataError::Oob { expected: 4096, got: 4095, .. })
        );

        let mut compound = section_compound(0);
        compound.set("SkyLight", Tag::ByteArray(vec![0; 2049]));
        assert_matches!(
            Section::from_compound(&compound),
            Err(StrataError::Oob { ref name, expected: 2048, got: 2049 }) if name == "SkyLight"
        );

        let mut compound = section_compound(0);
        compound.set("Add", Tag::ByteArray(vec![0; 10]));
        assert_matches!(Section::from_compound(&compound), Err(StrataError::Oob { .. }));
    }

    #[test]
    fn test_rejects_bad_y() {
        assert_matches!(
            Section::from_compound(&section_compound(16)),
            Err(StrataError::UnexpectedValue { .. })
        );
        assert_matches!(
            Section::from_compound(&section_compound(-1)),
            Err(StrataError::UnexpectedValue { .. })
        );
    }

    #[test]
    fn test_missing_and_mistyped_arrays() {
        let mut compound = section_compound(0);
        compound.remove("Data");
        assert_matches!(
            Section::from_compound(&compound),
            Err(StrataError::MissingTag { ref name }) if name == "Data"
        );

        let mut compound = section_compound(0);
        compound.set("BlockLight", Tag::IntArray(vec![0; 512]));
        assert_matches!(
            Section::from_compound(&compound),
            Err(StrataError::WrongType { expected: "TAG_Byte_Array", .. })
        );
    }
}
