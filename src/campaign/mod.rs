//! Campaign layer - hex map, terrain, units and battles

pub mod battle;
pub mod map;
pub mod terrain;
pub mod units;

pub use battle::{BattleOutcome, BattleReport};
pub use map::{Direction, HexCoord, Tile, TileGrid};
pub use terrain::{LandBiome, Terrain, TerrainDataset, WaterBiome};
pub use units::{MoveReport, Unit, UnitKind};
