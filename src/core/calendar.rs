//! Season calendar
//!
//! The game year has four seasons. Every tick advances the season by one,
//! wrapping from winter back to spring.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four recurring seasons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Season {
    #[default]
    Spring, // 0
    Summer, // 1
    Autumn, // 2
    Winter, // 3
}

impl Season {
    pub fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Season::Spring,
            1 => Season::Summer,
            2 => Season::Autumn,
            _ => Season::Winter,
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Season::Spring => 0,
            Season::Summer => 1,
            Season::Autumn => 2,
            Season::Winter => 3,
        }
    }

    pub fn next(&self) -> Self {
        Self::from_index(self.index() + 1)
    }
}

impl fmt::Display for Season {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Season::Spring => "spring",
            Season::Summer => "summer",
            Season::Autumn => "autumn",
            Season::Winter => "winter",
        };
        f.write_str(name)
    }
}

/// Calendar tracks the current season and how many ticks have run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Calendar {
    season: Season,
    ticks: u64,
}

impl Calendar {
    pub fn new(season: Season, ticks: u64) -> Self {
        Self { season, ticks }
    }

    pub fn advance(&mut self) {
        self.season = self.season.next();
        self.ticks += 1;
    }

    pub fn season(&self) -> Season {
        self.season
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn is_winter(&self) -> bool {
        self.season == Season::Winter
    }
}
