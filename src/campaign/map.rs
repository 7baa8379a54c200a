//! Campaign map - bounded axial hex grid
//!
//! Tiles live in a bounded store keyed by axial coordinate. Area queries
//! skip absent neighbors instead of failing, so tiles on the map edge simply
//! have smaller areas.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::campaign::terrain::Terrain;
use crate::city::building::{Structure, StructureKind};
use crate::city::link::LinkKind;
use crate::core::error::{GameError, Result};
use crate::core::types::NationId;

/// Smallest valid q coordinate
pub const MIN_Q: i32 = -64;
/// Largest valid q coordinate
pub const MAX_Q: i32 = 65;
/// Smallest valid r coordinate
pub const MIN_R: i32 = -72;
/// Largest valid r coordinate
pub const MAX_R: i32 = 72;

/// Axial hex coordinate (q, r system)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct HexCoord {
    pub q: i32, // Column
    pub r: i32, // Row
}

impl HexCoord {
    pub fn new(q: i32, r: i32) -> Self {
        Self { q, r }
    }

    pub fn in_bounds(&self) -> bool {
        (MIN_Q..=MAX_Q).contains(&self.q) && (MIN_R..=MAX_R).contains(&self.r)
    }

    /// Fails with `OutOfBounds` outside the map
    pub fn checked(self) -> Result<Self> {
        if self.in_bounds() {
            Ok(self)
        } else {
            Err(GameError::OutOfBounds(self))
        }
    }

    pub fn step(&self, direction: Direction) -> HexCoord {
        let (dq, dr) = direction.offset();
        HexCoord::new(self.q + dq, self.r + dr)
    }

    /// All 6 adjacent hexes, bounds not checked
    pub fn neighbors(&self) -> [HexCoord; 6] {
        Direction::ALL.map(|direction| self.step(direction))
    }

    /// Distance in hex steps using axial coordinate formula
    pub fn distance(&self, other: &HexCoord) -> i32 {
        let dq = self.q - other.q;
        let dr = self.r - other.r;
        (dq.abs() + (dq + dr).abs() + dr.abs()) / 2
    }
}

impl fmt::Display for HexCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.q, self.r)
    }
}

/// Parses the "(q, r)" form used as dataset keys
impl FromStr for HexCoord {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let inner = s.trim().trim_start_matches('(').trim_end_matches(')');
        let mut parts = inner.split(',');
        let (Some(q), Some(r), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(format!("expected \"(q, r)\", got {s:?}"));
        };
        let q = q.trim().parse::<i32>().map_err(|e| format!("{s:?}: {e}"))?;
        let r = r.trim().parse::<i32>().map_err(|e| format!("{s:?}: {e}"))?;
        Ok(HexCoord::new(q, r))
    }
}

/// The six hex directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    North,
    NorthWest,
    SouthWest,
    South,
    SouthEast,
    NorthEast,
}

impl Direction {
    pub const ALL: [Direction; 6] = [
        Direction::North,
        Direction::NorthWest,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
        Direction::NorthEast,
    ];

    /// Axial offset; every offset is a unit step
    pub fn offset(&self) -> (i32, i32) {
        match self {
            Direction::North => (0, -1),
            Direction::NorthWest => (-1, 0),
            Direction::SouthWest => (-1, 1),
            Direction::South => (0, 1),
            Direction::SouthEast => (1, 0),
            Direction::NorthEast => (1, -1),
        }
    }

    pub fn opposite(&self) -> Direction {
        match self {
            Direction::North => Direction::South,
            Direction::NorthWest => Direction::SouthEast,
            Direction::SouthWest => Direction::NorthEast,
            Direction::South => Direction::North,
            Direction::SouthEast => Direction::NorthWest,
            Direction::NorthEast => Direction::SouthWest,
        }
    }

    pub fn short_name(&self) -> &'static str {
        match self {
            Direction::North => "n",
            Direction::NorthWest => "nw",
            Direction::SouthWest => "sw",
            Direction::South => "s",
            Direction::SouthEast => "se",
            Direction::NorthEast => "ne",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "n" | "north" => Ok(Direction::North),
            "nw" | "northwest" => Ok(Direction::NorthWest),
            "sw" | "southwest" => Ok(Direction::SouthWest),
            "s" | "south" => Ok(Direction::South),
            "se" | "southeast" => Ok(Direction::SouthEast),
            "ne" | "northeast" => Ok(Direction::NorthEast),
            other => Err(format!("unknown direction {other:?}")),
        }
    }
}

/// A single hex tile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tile {
    pub coord: HexCoord,
    pub terrain: Terrain,
    pub owner: Option<NationId>,
    pub owned: bool,
    pub structures: Vec<Structure>,
    /// Name of the city founded on this tile, if any
    pub city: Option<String>,
}

impl Tile {
    pub fn new(coord: HexCoord, terrain: Terrain) -> Self {
        Self {
            coord,
            terrain,
            owner: None,
            owned: false,
            structures: Vec::new(),
            city: None,
        }
    }

    /// Movement cost of entering this tile. Rails override terrain.
    pub fn difficulty(&self) -> f64 {
        if self.has_structure(StructureKind::Link(LinkKind::SimpleRail)) {
            0.5
        } else if self.has_structure(StructureKind::Link(LinkKind::QualityRail)) {
            0.25
        } else {
            self.terrain.difficulty() as f64
        }
    }

    pub fn has_structure(&self, kind: StructureKind) -> bool {
        self.structures.iter().any(|s| s.kind == kind)
    }

    /// Remove one instance of `kind`, returning it
    pub fn take_structure(&mut self, kind: StructureKind) -> Option<Structure> {
        let idx = self.structures.iter().position(|s| s.kind == kind)?;
        Some(self.structures.remove(idx))
    }

    pub fn is_city(&self) -> bool {
        self.city.is_some()
    }

    pub fn claim(&mut self, nation: NationId) {
        self.owner = Some(nation);
        self.owned = true;
    }
}

/// Bounded tile store
#[derive(Debug, Clone, Default)]
pub struct TileGrid {
    tiles: AHashMap<HexCoord, Tile>,
}

impl TileGrid {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    /// Tile at `coord`; `OutOfBounds` off the map, `NotFound` if unset
    pub fn get(&self, coord: HexCoord) -> Result<&Tile> {
        let coord = coord.checked()?;
        self.tiles
            .get(&coord)
            .ok_or_else(|| GameError::not_found("tile", "tile lookup", coord))
    }

    pub fn get_mut(&mut self, coord: HexCoord) -> Result<&mut Tile> {
        let coord = coord.checked()?;
        self.tiles
            .get_mut(&coord)
            .ok_or_else(|| GameError::not_found("tile", "tile lookup", coord))
    }

    /// Non-failing lookup for area scans
    pub fn find(&self, coord: HexCoord) -> Option<&Tile> {
        self.tiles.get(&coord)
    }

    /// Store a tile under its own coordinate, returning the previous one
    pub fn set(&mut self, tile: Tile) -> Result<Option<Tile>> {
        let coord = tile.coord.checked()?;
        Ok(self.tiles.insert(coord, tile))
    }

    pub fn remove(&mut self, coord: HexCoord) -> Result<Option<Tile>> {
        let coord = coord.checked()?;
        Ok(self.tiles.remove(&coord))
    }

    pub fn neighbor(&self, coord: HexCoord, direction: Direction) -> Result<&Tile> {
        self.get(coord.step(direction))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tile> {
        self.tiles.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tile> {
        self.tiles.values_mut()
    }

    /// The tile itself plus its existing neighbors
    pub fn area(&self, coord: HexCoord) -> BTreeSet<HexCoord> {
        let mut area = BTreeSet::new();
        area.insert(coord);
        for neighbor in coord.neighbors() {
            if neighbor.in_bounds() && self.tiles.contains_key(&neighbor) {
                area.insert(neighbor);
            }
        }
        area
    }

    /// Union of the areas of every tile in `area(coord)`
    pub fn metroarea(&self, coord: HexCoord) -> BTreeSet<HexCoord> {
        self.area(coord)
            .into_iter()
            .flat_map(|c| self.area(c))
            .collect()
    }

    pub fn distance(a: HexCoord, b: HexCoord) -> i32 {
        a.distance(&b)
    }
}
