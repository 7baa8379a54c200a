//! Cities - named, owned tiles that hold an inventory and grow in tiers

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::campaign::map::{HexCoord, TileGrid};
use crate::city::building::{Structure, StructureKind};
use crate::city::stockpile::Stockpile;
use crate::core::types::NationId;

pub const DEFAULT_STABILITY: f64 = 80.0;
pub const DEFAULT_POPULARITY: f64 = 65.0;
pub const MAX_TIER: u8 = 4;

/// Tier ladder over raw resource counts
///
/// Each rung requires the previous one. Variants (`food_grain`) count
/// towards their raw resource; luxuries count by distinct item name.
pub fn calculate_tier(inventory: &Stockpile) -> u8 {
    let lumber = inventory.raw_count("lumber");
    let food = inventory.raw_count("food");
    let fuel = inventory.raw_count("fuel");
    let luxuries = inventory.luxury_count();

    let mut tier = 0;
    if lumber >= 1 && food >= 1 {
        tier = 1;
    }
    if tier == 1 && fuel >= 1 && food >= 2 {
        tier = 2;
    }
    if tier == 2 && lumber >= 2 && food >= 3 && fuel >= 2 && luxuries >= 1 {
        tier = 3;
    }
    if tier == 3 && lumber >= 3 && food >= 5 && fuel >= 3 && luxuries >= 2 {
        tier = 4;
    }
    tier
}

/// A city. Its structures live on the tile at `coord`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    pub name: String,
    pub coord: HexCoord,
    pub owner: NationId,
    /// Always `calculate_tier(&inventory)` as of the last refresh
    pub tier: u8,
    pub stability: f64,
    pub popularity: f64,
    pub influence: u32,
    pub inventory: Stockpile,
}

impl City {
    pub fn new(name: impl Into<String>, coord: HexCoord, owner: NationId) -> Self {
        Self {
            name: name.into(),
            coord,
            owner,
            tier: 0,
            stability: DEFAULT_STABILITY,
            popularity: DEFAULT_POPULARITY,
            influence: 0,
            inventory: Stockpile::new(),
        }
    }

    pub fn with_inventory(mut self, inventory: Stockpile) -> Self {
        self.inventory = inventory;
        self.refresh_tier();
        self
    }

    pub fn calculate_tier(&self) -> u8 {
        calculate_tier(&self.inventory)
    }

    /// Recompute the tier from the inventory, returning it
    pub fn refresh_tier(&mut self) -> u8 {
        self.tier = self.calculate_tier();
        self.tier
    }

    pub fn luxury_count(&self) -> u32 {
        self.inventory.luxury_count()
    }

    /// Zone where the city's structures and effects apply
    pub fn developed_area(&self, grid: &TileGrid) -> BTreeSet<HexCoord> {
        if self.tier >= MAX_TIER {
            grid.metroarea(self.coord)
        } else {
            grid.area(self.coord)
        }
    }

    /// Structures on the city's own tile
    pub fn structures<'a>(&self, grid: &'a TileGrid) -> &'a [Structure] {
        grid.find(self.coord)
            .map(|tile| tile.structures.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_structure(&self, grid: &TileGrid, kind: StructureKind) -> bool {
        self.structures(grid).iter().any(|s| s.kind == kind)
    }

    pub fn add_stability(&mut self, amount: f64) {
        self.stability = (self.stability + amount).clamp(0.0, 100.0);
    }

    pub fn add_popularity(&mut self, amount: f64) {
        self.popularity = (self.popularity + amount).clamp(0.0, 100.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::map::Tile;
    use crate::campaign::terrain::{LandBiome, Terrain};

    fn inventory(items: &[&str]) -> Stockpile {
        Stockpile::from_items(items.iter().copied())
    }

    #[test]
    fn test_tier_ladder() {
        assert_eq!(calculate_tier(&inventory(&[])), 0);
        assert_eq!(calculate_tier(&inventory(&["lumber"])), 0);
        assert_eq!(calculate_tier(&inventory(&["lumber", "food"])), 1);
        assert_eq!(calculate_tier(&inventory(&["lumber", "food", "fuel"])), 1);
        assert_eq!(
            calculate_tier(&inventory(&["lumber", "food", "food_grain", "fuel"])),
            2
        );
        assert_eq!(
            calculate_tier(&inventory(&[
                "lumber", "lumber", "food", "food", "food", "fuel", "fuel",
                "luxurygoods_silk",
            ])),
            3
        );
        assert_eq!(
            calculate_tier(&inventory(&[
                "lumber", "lumber", "lumber", "food", "food", "food", "food", "food",
                "fuel", "fuel", "fuel", "luxurygoods_silk", "luxurygoods_wine",
            ])),
            4
        );
    }

    #[test]
    fn test_tier_four_needs_distinct_luxuries() {
        let items = inventory(&[
            "lumber", "lumber", "lumber", "food", "food", "food", "food", "food", "fuel",
            "fuel", "fuel", "luxurygoods_silk", "luxurygoods_silk",
        ]);
        assert_eq!(calculate_tier(&items), 3);
    }

    #[test]
    fn test_stats_clamp() {
        let mut city = City::new("Harbor", HexCoord::default(), NationId(1));
        assert_eq!(city.stability, 80.0);
        assert_eq!(city.popularity, 65.0);
        city.add_stability(50.0);
        city.add_popularity(-90.0);
        assert_eq!(city.stability, 100.0);
        assert_eq!(city.popularity, 0.0);
    }

    #[test]
    fn test_developed_area_grows_at_tier_four() {
        let mut grid = TileGrid::new();
        for q in -2..=2 {
            for r in -2..=2 {
                let coord = HexCoord::new(q, r);
                grid.set(Tile::new(coord, Terrain::land(LandBiome::Plains)))
                    .unwrap();
            }
        }
        let mut city = City::new("Harbor", HexCoord::default(), NationId(1));
        assert_eq!(city.developed_area(&grid).len(), 7);
        city.tier = 4;
        assert_eq!(city.developed_area(&grid), grid.metroarea(HexCoord::default()));
    }
}
