use strata_common::Result;
use strata_nbt::{Compound, Tag};

/// A scheduled block update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// Block id the update was scheduled for.
    pub id: i32,
    /// Game ticks until the update fires.
    pub ticks: i32,
    pub priority: i32,
}

impl Tick {
    pub fn new(id: i32, ticks: i32, priority: i32) -> Self {
        Self { id, ticks, priority }
    }

    /// Reads one `TileTicks` entry, returning its absolute position with it.
    pub(crate) fn from_compound(compound: &Compound) -> Result<((i32, i32, i32), Tick)> {
        let pos = (
            compound.get_int("x")?,
            compound.get_int("y")?,
            compound.get_int("z")?,
        );
        // Older files leave out the priority.
        let priority = match compound.get("p") {
            Some(_) => compound.get_int("p")?,
            None => 0,
        };
        let tick = Tick {
            id: compound.get_int("i")?,
            ticks: compound.get_int("t")?,
            priority,
        };
        Ok((pos, tick))
    }

    pub(crate) fn to_compound(self, x: i32, y: i32, z: i32) -> Compound {
        let mut compound = Compound::new();
        compound.set("i", Tag::Int(self.id));
        compound.set("t", Tag::Int(self.ticks));
        compound.set("p", Tag::Int(self.priority));
        compound.set("x", Tag::Int(x));
        compound.set("y", Tag::Int(y));
        compound.set("z", Tag::Int(z));
        compound
    }
}

/// One voxel: a 12-bit id, a 4-bit data value and optional side data.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub id: u16,
    pub data: u8,
    /// Tile entity fields, without the position keys.
    pub metadata: Option<Compound>,
    pub ticks: Vec<Tick>,
}

impl Block {
    pub const AIR: Block = Block {
        id: 0,
        data: 0,
        metadata: None,
        ticks: Vec::new(),
    };

    pub fn new(id: u16, data: u8) -> Self {
        Self {
            id: id & 0x0FFF,
            data: data & 0x0F,
            metadata: None,
            ticks: Vec::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Compound) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_ticks(mut self, ticks: Vec<Tick>) -> Self {
        self.ticks = ticks;
        self
    }

    /// Air with no side data: what an absent section holds.
    pub fn is_default(&self) -> bool {
        self.id == 0 && self.data == 0 && self.metadata.is_none() && self.ticks.is_empty()
    }
}

impl PartialEq for Block {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.data == other.data && self.metadata == other.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_masks_fields() {
        let block = Block::new(0x1234, 0x1F);
        assert_eq!(block.id, 0x234);
        assert_eq!(block.data, 0xF);
    }

    #[test]
    fn test_equality_uses_metadata_not_ticks() {
        let mut chest = Compound::new();
        chest.set("id", Tag::String("Chest".to_owned()));
        chest.set("Lock", Tag::String(String::new()));
        let mut reordered = Compound::new();
        reordered.set("Lock", Tag::String(String::new()));
        reordered.set("id", Tag::String("Chest".to_owned()));

        let a = Block::new(54, 2).with_metadata(chest);
        let b = Block::new(54, 2)
            .with_metadata(reordered)
            .with_ticks(vec![Tick::new(54, 1, 0)]);
        assert_eq!(a, b);
        assert_ne!(a, Block::new(54, 2));
        assert_ne!(Block::new(54, 2), Block::new(54, 3));
    }

    #[test]
    fn test_is_default() {
        assert!(Block::AIR.is_default());
        assert!(!Block::new(0, 1).is_default());
        assert!(!Block::AIR.clone().with_ticks(vec![Tick::new(0, 0, 0)]).is_default());
    }

    #[test]
    fn test_tick_compound_round_trip() {
        let tick = Tick::new(8, 5, -1);
        let compound = tick.to_compound(-3, 64, 17);
        assert_eq!(compound.get_int("x").unwrap(), -3);
        assert_eq!(Tick::from_compound(&compound).unwrap(), ((-3, 64, 17), tick));

        let mut legacy = compound.clone();
        legacy.remove("p");
        assert_eq!(Tick::from_compound(&legacy).unwrap().1.priority, 0);
    }
}
