//! Terrain descriptors and the static terrain dataset
//!
//! Terrain is immutable per tile class. The dataset maps "(q, r)" keys to
//! records holding a terrain tag such as `plains`, `ocean` or
//! `forest_coast`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use thiserror::Error;

use crate::campaign::map::{HexCoord, Tile, TileGrid};

/// Land biomes, ordered by ruggedness
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandBiome {
    Plains,
    Forest,
    Desert,
    Mountains,
    HighMountains,
}

impl LandBiome {
    pub fn difficulty(&self) -> u32 {
        match self {
            LandBiome::Plains => 1,
            LandBiome::Forest => 2,
            LandBiome::Desert => 2,
            LandBiome::Mountains => 2,
            LandBiome::HighMountains => 3,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            LandBiome::Plains => "plains",
            LandBiome::Forest => "forest",
            LandBiome::Desert => "desert",
            LandBiome::Mountains => "mountains",
            LandBiome::HighMountains => "high_mountains",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "plains" => Some(LandBiome::Plains),
            "forest" => Some(LandBiome::Forest),
            "desert" => Some(LandBiome::Desert),
            "mountains" => Some(LandBiome::Mountains),
            "high_mountains" => Some(LandBiome::HighMountains),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaterBiome {
    Ocean,
    Lake,
    /// Shoreline of a land tile
    Coast,
}

/// Terrain descriptor. Coastal tiles carry both a land and a water biome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Terrain {
    pub land_biome: Option<LandBiome>,
    pub water_biome: Option<WaterBiome>,
}

impl Terrain {
    pub fn land(biome: LandBiome) -> Self {
        Self {
            land_biome: Some(biome),
            water_biome: None,
        }
    }

    pub fn coast(biome: LandBiome) -> Self {
        Self {
            land_biome: Some(biome),
            water_biome: Some(WaterBiome::Coast),
        }
    }

    pub fn water(biome: WaterBiome) -> Self {
        Self {
            land_biome: None,
            water_biome: Some(biome),
        }
    }

    pub fn is_land(&self) -> bool {
        self.land_biome.is_some()
    }

    pub fn is_water(&self) -> bool {
        self.water_biome.is_some()
    }

    /// Base movement cost; open water costs 1
    pub fn difficulty(&self) -> u32 {
        self.land_biome.map(|b| b.difficulty()).unwrap_or(1)
    }

    pub fn from_tag(tag: &str) -> Result<Self, TerrainError> {
        let unknown = || TerrainError::UnknownTag(tag.to_string());
        match tag {
            "ocean" => Ok(Self::water(WaterBiome::Ocean)),
            "lake" => Ok(Self::water(WaterBiome::Lake)),
            _ => match tag.strip_suffix("_coast") {
                // high mountains never border the sea
                Some("high_mountains") => Err(unknown()),
                Some(base) => LandBiome::from_tag(base).map(Self::coast).ok_or_else(unknown),
                None => LandBiome::from_tag(tag).map(Self::land).ok_or_else(unknown),
            },
        }
    }

    pub fn tag(&self) -> String {
        match (self.land_biome, self.water_biome) {
            (Some(land), Some(_)) => format!("{}_coast", land.tag()),
            (Some(land), None) => land.tag().to_string(),
            (None, Some(WaterBiome::Lake)) => "lake".to_string(),
            (None, _) => "ocean".to_string(),
        }
    }
}

impl fmt::Display for Terrain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tag())
    }
}

impl TryFrom<String> for Terrain {
    type Error = TerrainError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        Terrain::from_tag(&tag)
    }
}

impl From<Terrain> for String {
    fn from(terrain: Terrain) -> Self {
        terrain.tag()
    }
}

/// Errors that can occur when loading the terrain dataset
#[derive(Debug, Error)]
pub enum TerrainError {
    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Malformed coordinate key: {0}")]
    BadKey(String),

    #[error("Unknown terrain tag: {0}")]
    UnknownTag(String),

    #[error("Coordinate {0} is outside the map bounds")]
    OutOfBounds(HexCoord),
}

#[derive(Debug, Deserialize)]
struct TileRecord {
    terrain: String,
}

/// Terrain for every coordinate of the map, loaded once at startup
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TerrainDataset {
    tiles: BTreeMap<HexCoord, Terrain>,
}

impl TerrainDataset {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, coord: HexCoord, terrain: Terrain) {
        self.tiles.insert(coord, terrain);
    }

    pub fn get(&self, coord: HexCoord) -> Option<Terrain> {
        self.tiles.get(&coord).copied()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn load_from_json(json: &str) -> Result<Self, TerrainError> {
        let raw: BTreeMap<String, TileRecord> = serde_json::from_str(json)?;
        let mut dataset = Self::new();
        for (key, record) in raw {
            let coord: HexCoord = key.parse().map_err(TerrainError::BadKey)?;
            if !coord.in_bounds() {
                return Err(TerrainError::OutOfBounds(coord));
            }
            dataset.insert(coord, Terrain::from_tag(&record.terrain)?);
        }
        Ok(dataset)
    }

    pub fn load_from_file(path: &Path) -> Result<Self, TerrainError> {
        let content = std::fs::read_to_string(path)?;
        Self::load_from_json(&content)
    }

    /// Fresh, unowned grid with one tile per dataset entry
    pub fn seed_grid(&self) -> TileGrid {
        let mut grid = TileGrid::new();
        for (coord, terrain) in &self.tiles {
            // coordinates were bounds checked on load
            let _ = grid.set(Tile::new(*coord, *terrain));
        }
        grid
    }
}
