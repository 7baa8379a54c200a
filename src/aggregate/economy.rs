//! Influence economy
//!
//! Influence is an allowance, not a bank: every tick the balance is reset to
//! the nation's recomputed cap.

use serde::{Deserialize, Serialize};

use crate::aggregate::nation::Nation;
use crate::campaign::map::TileGrid;
use crate::city::building::{BuildingKind, StructureKind};
use crate::core::config::CapPolicy;
use crate::core::types::NationId;

/// Per-nation influence balance and cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Econ {
    pub nation: NationId,
    pub influence: u32,
    pub influence_cap: u32,
}

impl Econ {
    pub fn new(nation: NationId, influence: u32, influence_cap: u32) -> Self {
        Self {
            nation,
            influence,
            influence_cap,
        }
    }

    /// Adopt a freshly computed cap and refill the balance to it
    pub fn reset_to_cap(&mut self, cap: u32) {
        self.influence_cap = cap;
        self.influence = cap;
    }

    pub fn can_afford(&self, cost: u32) -> bool {
        self.influence >= cost
    }
}

/// Cap contribution of the nation's cities and links
///
/// Base 1; each city adds tier + 1, 2 for a district and its distinct
/// luxuries (less 1 at tier 3, less 2 at tier 4). Each link adds its flat
/// bonus plus an endpoint synergy when either endpoint holds the matching
/// structure.
pub fn accumulated_cap(nation: &Nation, grid: &TileGrid) -> u32 {
    let mut cap: i64 = 1;

    for city in nation.cities.values() {
        cap += city.tier as i64 + 1;
        if city.has_structure(grid, StructureKind::Building(BuildingKind::District)) {
            cap += 2;
        }
        let luxury_discount = match city.tier {
            3 => 1,
            4 => 2,
            _ => 0,
        };
        cap += (city.luxury_count() as i64 - luxury_discount).max(0);
    }

    for link in &nation.links {
        cap += link.kind.cap_bonus();
        if let Some((kinds, bonus)) = link.kind.endpoint_synergy() {
            let endpoint_has = |name: &str| {
                nation.cities.get(name).is_some_and(|city| {
                    kinds
                        .iter()
                        .any(|kind| city.has_structure(grid, StructureKind::Building(*kind)))
                })
            };
            if endpoint_has(&link.origin) || endpoint_has(&link.destination) {
                cap += bonus;
            }
        }
    }

    cap.max(0) as u32
}

/// Influence cap under the configured policy
pub fn calculate_cap(nation: &Nation, grid: &TileGrid, policy: CapPolicy) -> u32 {
    let cap = accumulated_cap(nation, grid);
    match policy {
        CapPolicy::Accumulated => cap,
        CapPolicy::LegacyConstant => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::map::{HexCoord, Tile};
    use crate::campaign::terrain::{LandBiome, Terrain};
    use crate::city::building::Structure;
    use crate::city::link::{Link, LinkKind};
    use crate::city::settlement::City;
    use crate::city::stockpile::Stockpile;
    use crate::core::types::LinkId;

    const NATION: NationId = NationId(9);

    fn grid() -> TileGrid {
        let mut grid = TileGrid::new();
        for q in -1..=6 {
            for r in -1..=1 {
                let coord = HexCoord::new(q, r);
                grid.set(Tile::new(coord, Terrain::coast(LandBiome::Plains)))
                    .unwrap();
            }
        }
        grid
    }

    fn add_city(nation: &mut Nation, grid: &mut TileGrid, name: &str, coord: HexCoord, items: &[&str]) {
        grid.get_mut(coord).unwrap().city = Some(name.to_string());
        let city = City::new(name, coord, NATION)
            .with_inventory(Stockpile::from_items(items.iter().copied()));
        nation.cities.insert(name.to_string(), city);
    }

    fn place(grid: &mut TileGrid, coord: HexCoord, kind: BuildingKind) {
        grid.get_mut(coord).unwrap().structures.push(Structure::new(
            StructureKind::Building(kind),
            coord,
            "any",
            NATION,
        ));
    }

    #[test]
    fn test_single_tier_zero_city() {
        let mut grid = grid();
        let mut nation = Nation::new(NATION, "Avalon");
        add_city(&mut nation, &mut grid, "Capital", HexCoord::default(), &[]);
        assert_eq!(calculate_cap(&nation, &grid, CapPolicy::Accumulated), 2);
        assert_eq!(calculate_cap(&nation, &grid, CapPolicy::LegacyConstant), 1);
    }

    #[test]
    fn test_district_and_luxuries() {
        let mut grid = grid();
        let mut nation = Nation::new(NATION, "Avalon");
        // tier 3 with two distinct luxuries: 1 + (3 + 1) + 2 + (2 - 1)
        add_city(
            &mut nation,
            &mut grid,
            "Capital",
            HexCoord::default(),
            &[
                "lumber", "lumber", "food", "food", "food", "fuel", "fuel",
                "luxurygoods_silk", "luxurygoods_wine",
            ],
        );
        place(&mut grid, HexCoord::default(), BuildingKind::District);
        assert_eq!(nation.cities["Capital"].tier, 3);
        assert_eq!(accumulated_cap(&nation, &grid), 8);
    }

    #[test]
    fn test_link_bonuses_and_synergy() {
        let mut grid = grid();
        let mut nation = Nation::new(NATION, "Avalon");
        add_city(&mut nation, &mut grid, "West", HexCoord::new(0, 0), &[]);
        add_city(&mut nation, &mut grid, "East", HexCoord::new(5, 0), &[]);
        let base = accumulated_cap(&nation, &grid);
        assert_eq!(base, 3);

        let link = |id, kind| Link {
            id: LinkId(id),
            kind,
            origin: "West".into(),
            destination: "East".into(),
            path: vec![],
            owner: NATION,
        };
        nation.links.push(link(1, LinkKind::SimpleRail));
        nation.links.push(link(2, LinkKind::SeaRoute));
        assert_eq!(accumulated_cap(&nation, &grid), base + 3 + 1);

        place(&mut grid, HexCoord::new(5, 0), BuildingKind::Station);
        place(&mut grid, HexCoord::new(0, 0), BuildingKind::Port);
        assert_eq!(accumulated_cap(&nation, &grid), base + 3 + 1 + 1 + 2);
    }

    #[test]
    fn test_reset_to_cap() {
        let mut econ = Econ::new(NATION, 0, 2);
        econ.reset_to_cap(5);
        assert_eq!(econ, Econ::new(NATION, 5, 5));
        assert!(econ.can_afford(5));
        assert!(!econ.can_afford(6));
    }
}
