use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Read;
use strata_common::Result;

/// Blocks light passes through with an opacity of 1.
const TRANSPARENT: &[u16] = &[
    0, 6, 18, 20, 27, 28, 30, 31, 32, 37, 38, 39, 40, 50, 51, 55, 59, 63, 64, 65, 66, 68, 69, 70,
    71, 72, 75, 76, 77, 78, 81, 83, 85, 90, 92, 93, 94, 95, 96, 101, 102, 104, 105, 106, 107, 111,
    113, 115, 117, 118, 119, 122, 127, 131, 132, 138, 139, 140, 141, 142, 143, 144, 145, 147, 148,
    149, 150, 151, 154, 157, 160, 171, 175,
];

/// Water, still water and ice.
const TRANSLUCENT: &[u16] = &[8, 9, 79];

const EMITTERS: &[(u16, u8)] = &[
    (10, 15),
    (11, 15),
    (39, 1),
    (50, 14),
    (51, 15),
    (62, 13),
    (74, 9),
    (76, 7),
    (89, 15),
    (90, 11),
    (91, 15),
    (94, 9),
    (117, 1),
    (119, 15),
    (120, 1),
    (122, 1),
    (124, 15),
    (138, 15),
    (150, 9),
];

/// How each block id interacts with light.
///
/// Ids missing from `opacity` use `default_opacity`; ids missing from
/// `emission` give off no light. Loaded once and shared read-only by every
/// level that uses it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlockProperties {
    pub default_opacity: u8,
    pub opacity: BTreeMap<u16, u8>,
    pub emission: BTreeMap<u16, u8>,
}

impl Default for BlockProperties {
    fn default() -> Self {
        let mut opacity = BTreeMap::new();
        for &id in TRANSPARENT {
            opacity.insert(id, 1);
        }
        for &id in TRANSLUCENT {
            opacity.insert(id, 3);
        }
        Self {
            default_opacity: 15,
            opacity,
            emission: EMITTERS.iter().copied().collect(),
        }
    }
}

impl BlockProperties {
    /// Parses a table from JSON. Omitted fields keep their default values.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Ok(serde_json::from_reader(reader)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn opacity(&self, id: u16) -> u8 {
        self.opacity
            .get(&id)
            .copied()
            .unwrap_or(self.default_opacity)
    }

    pub fn emission(&self, id: u16) -> u8 {
        self.emission.get(&id).copied().unwrap_or(0)
    }
}
