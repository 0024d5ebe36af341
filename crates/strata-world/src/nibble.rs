/// Packs two 4-bit values per byte, low nibble at the even index.
///
/// Sections use 4096-entry nibble arrays (2048 bytes) for the high bits of the
/// block id, the block data and both light channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibbleArray {
    bytes: Vec<u8>,
}

impl NibbleArray {
    /// An array of `len` nibbles, all zero. `len` must be even.
    pub fn new(len: usize) -> Self {
        Self {
            bytes: vec![0; len / 2],
        }
    }

    /// An array of `len` nibbles, all set to `value`.
    pub fn filled(len: usize, value: u8) -> Self {
        let value = value & 0x0F;
        Self {
            bytes: vec![value | (value << 4); len / 2],
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Number of nibbles.
    pub fn len(&self) -> usize {
        self.bytes.len() * 2
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn get(&self, index: usize) -> u8 {
        let byte = self.bytes[index >> 1];
        if index & 1 == 0 {
            byte & 0x0F
        } else {
            byte >> 4
        }
    }

    #[inline]
    pub fn set(&mut self, index: usize, value: u8) {
        let value = value & 0x0F;
        let byte = &mut self.bytes[index >> 1];
        if index & 1 == 0 {
            *byte = (*byte & 0xF0) | value;
        } else {
            *byte = (*byte & 0x0F) | (value << 4);
        }
    }

    pub fn is_zero(&self) -> bool {
        self.bytes.iter().all(|&b| b == 0)
    }
}
