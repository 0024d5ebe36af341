use strata_common::{BlockPos, Result, StrataError};
use strata_nbt::{Compound, Tag};

/// Game modes stored in `GameType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameMode {
    Survival,
    Creative,
    Adventure,
    Spectator,
}

impl GameMode {
    fn from_id(id: i32) -> Option<Self> {
        match id {
            0 => Some(GameMode::Survival),
            1 => Some(GameMode::Creative),
            2 => Some(GameMode::Adventure),
            3 => Some(GameMode::Spectator),
            _ => None,
        }
    }

    fn id(self) -> i32 {
        match self {
            GameMode::Survival => 0,
            GameMode::Creative => 1,
            GameMode::Adventure => 2,
            GameMode::Spectator => 3,
        }
    }
}

/// The `Data` compound of `level.dat`, with a dirty flag so unchanged
/// metadata is not rewritten on save.
///
/// Getters fall back to the game's defaults for fields a file leaves out;
/// fields with the wrong type are errors.
#[derive(Debug, Clone, Default)]
pub struct LevelData {
    data: Compound,
    changed: bool,
}

impl LevelData {
    /// Metadata for a fresh world.
    pub fn new(name: &str) -> Self {
        let mut level = Self::default();
        level.data.set("version", Tag::Int(19133));
        level.data.set("initialized", Tag::Byte(1));
        level.set_name(name);
        level.set_generator("default");
        level.set_map_features(true);
        level.set_allow_commands(false);
        level
    }

    /// Reads the root tag of `level.dat`.
    pub fn from_tag(tag: &Tag) -> Result<Self> {
        let root = tag.as_compound().ok_or_else(|| StrataError::WrongType {
            name: String::new(),
            expected: "TAG_Compound",
            got: tag.type_name(),
        })?;
        Ok(Self {
            data: root.get_compound("Data")?.clone(),
            changed: false,
        })
    }

    pub fn to_tag(&self) -> Tag {
        let mut root = Compound::new();
        root.set("Data", Tag::Compound(self.data.clone()));
        Tag::Compound(root)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn mark_saved(&mut self) {
        self.changed = false;
    }

    /// The raw compound, for fields without a typed accessor.
    pub fn data(&self) -> &Compound {
        &self.data
    }

    pub fn set(&mut self, name: &str, tag: Tag) {
        self.data.set(name, tag);
        self.changed = true;
    }

    fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        match self.data.get(name) {
            Some(_) => Ok(self.data.get_byte(name)? != 0),
            None => Ok(default),
        }
    }

    fn int_or(&self, name: &str, default: i32) -> Result<i32> {
        match self.data.get(name) {
            Some(_) => self.data.get_int(name),
            None => Ok(default),
        }
    }

    fn long_or(&self, name: &str, default: i64) -> Result<i64> {
        match self.data.get(name) {
            Some(_) => self.data.get_long(name),
            None => Ok(default),
        }
    }

    pub fn name(&self) -> Result<&str> {
        match self.data.get("LevelName") {
            Some(_) => self.data.get_string("LevelName"),
            None => Ok(""),
        }
    }

    pub fn set_name(&mut self, name: &str) {
        self.set("LevelName", Tag::String(name.to_owned()));
    }

    pub fn spawn(&self) -> Result<BlockPos> {
        Ok(BlockPos::new(
            self.int_or("SpawnX", 0)?,
            self.int_or("SpawnY", 64)?,
            self.int_or("SpawnZ", 0)?,
        ))
    }

    pub fn set_spawn(&mut self, pos: BlockPos) {
        self.set("SpawnX", Tag::Int(pos.x));
        self.set("SpawnY", Tag::Int(pos.y));
        self.set("SpawnZ", Tag::Int(pos.z));
    }

    pub fn seed(&self) -> Result<i64> {
        self.long_or("RandomSeed", 0)
    }

    pub fn set_seed(&mut self, seed: i64) {
        self.set("RandomSeed", Tag::Long(seed));
    }

    pub fn game_mode(&self) -> Result<GameMode> {
        let id = self.int_or("GameType", 0)?;
        GameMode::from_id(id).ok_or_else(|| StrataError::unexpected("GameType", "0..3", id))
    }

    pub fn set_game_mode(&mut self, mode: GameMode) {
        self.set("GameType", Tag::Int(mode.id()));
    }

    pub fn generator(&self) -> Result<&str> {
        match self.data.get("generatorName") {
            Some(_) => self.data.get_string("generatorName"),
            None => Ok("default"),
        }
    }

    pub fn set_generator(&mut self, generator: &str) {
        self.set("generatorName", Tag::String(generator.to_owned()));
    }

    pub fn hardcore(&self) -> Result<bool> {
        self.bool_or("hardcore", false)
    }

    pub fn set_hardcore(&mut self, hardcore: bool) {
        self.set("hardcore", Tag::Byte(hardcore as i8));
    }

    pub fn allow_commands(&self) -> Result<bool> {
        self.bool_or("allowCommands", false)
    }

    pub fn set_allow_commands(&mut self, allow: bool) {
        self.set("allowCommands", Tag::Byte(allow as i8));
    }

    pub fn map_features(&self) -> Result<bool> {
        self.bool_or("MapFeatures", true)
    }

    pub fn set_map_features(&mut self, enabled: bool) {
        self.set("MapFeatures", Tag::Byte(enabled as i8));
    }

    pub fn raining(&self) -> Result<bool> {
        self.bool_or("raining", false)
    }

    pub fn set_raining(&mut self, raining: bool) {
        self.set("raining", Tag::Byte(raining as i8));
    }

    pub fn thundering(&self) -> Result<bool> {
        self.bool_or("thundering", false)
    }

    pub fn set_thundering(&mut self, thundering: bool) {
        self.set("thundering", Tag::Byte(thundering as i8));
    }

    /// Total game ticks elapsed.
    pub fn time(&self) -> Result<i64> {
        self.long_or("Time", 0)
    }

    pub fn set_time(&mut self, ticks: i64) {
        self.set("Time", Tag::Long(ticks));
    }

    pub fn day_time(&self) -> Result<i64> {
        self.long_or("DayTime", 0)
    }

    pub fn set_day_time(&mut self, ticks: i64) {
        self.set("DayTime", Tag::Long(ticks));
    }

    /// Unix time of the last save, in milliseconds.
    pub fn last_played(&self) -> Result<i64> {
        self.long_or("LastPlayed", 0)
    }

    pub fn set_last_played(&mut self, millis: i64) {
        self.set("LastPlayed", Tag::Long(millis));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn test_new_world_defaults() {
        let data = LevelData::new("world");
        assert!(data.is_changed());
        assert_eq!(data.name().unwrap(), "world");
        assert_eq!(data.generator().unwrap(), "default");
        assert!(data.map_features().unwrap());
        assert!(!data.allow_commands().unwrap());
        assert_eq!(data.spawn().unwrap(), BlockPos::new(0, 64, 0));
        assert_eq!(data.game_mode().unwrap(), GameMode::Survival);
    }

    #[test]
    fn test_setters_round_trip_through_tag() {
        let mut data = LevelData::new("world");
        data.set_spawn(BlockPos::new(10, 70, -4));
        data.set_seed(-42);
        data.set_game_mode(GameMode::Creative);
        data.set_hardcore(true);
        data.set_raining(true);
        data.set_time(24000);
        data.set_day_time(6000);
        data.set_last_played(1_700_000_000_000);

        let loaded = LevelData::from_tag(&data.to_tag()).unwrap();
        assert!(!loaded.is_changed());
        assert_eq!(loaded.spawn().unwrap(), BlockPos::new(10, 70, -4));
        assert_eq!(loaded.seed().unwrap(), -42);
        assert_eq!(loaded.game_mode().unwrap(), GameMode::Creative);
        assert!(loaded.hardcore().unwrap());
        assert!(loaded.raining().unwrap());
        assert!(!loaded.thundering().unwrap());
        assert_eq!(loaded.time().unwrap(), 24000);
        assert_eq!(loaded.day_time().unwrap(), 6000);
        assert_eq!(loaded.last_played().unwrap(), 1_700_000_000_000);
    }

    #[test]
    fn test_mark_saved() {
        let mut data = LevelData::new("world");
        data.mark_saved();
        assert!(!data.is_changed());
        data.set_thundering(true);
        assert!(data.is_changed());
    }

    #[test]
    fn test_schema_errors() {
        assert_matches!(
            LevelData::from_tag(&Tag::Compound(Compound::new())),
            Err(StrataError::MissingTag { ref name }) if name == "Data"
        );

        let mut data = LevelData::default();
        data.set("RandomSeed", Tag::Int(5));
        assert_matches!(data.seed(), Err(StrataError::WrongType { .. }));

        data.set("GameType", Tag::Int(9));
        assert_matches!(data.game_mode(), Err(StrataError::UnexpectedValue { .. }));
    }
}
