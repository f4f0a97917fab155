//! Catalog of named scenarios a host can load.

use serde::{Deserialize, Serialize};

/// A named scenario. Loading one resets the simulation to its baseline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    pub id: String,
    pub name: String,
}

impl Level {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// Ordered level catalog. The first entry is the default level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LevelCatalog {
    levels: Vec<Level>,
}

impl Default for LevelCatalog {
    fn default() -> Self {
        Self::new(vec![
            Level::new("level01-boot", "Level 01: Boot Sequence"),
            Level::new("level02-sensors", "Level 02: Sensor Suite"),
            Level::new("level03-toolchange", "Level 03: Tool Change"),
        ])
    }
}

impl LevelCatalog {
    pub fn new(levels: Vec<Level>) -> Self {
        Self { levels }
    }

    /// The level a fresh engine starts on.
    pub fn default_level(&self) -> Option<&Level> {
        self.levels.first()
    }

    pub fn get(&self, id: &str) -> Option<&Level> {
        self.levels.iter().find(|l| l.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.levels.iter()
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// First id that appears more than once, if any.
    pub fn first_duplicate(&self) -> Option<&str> {
        self.levels.iter().enumerate().find_map(|(i, level)| {
            self.levels[..i]
                .iter()
                .any(|earlier| earlier.id == level.id)
                .then_some(level.id.as_str())
        })
    }
}
