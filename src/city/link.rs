//! Links - roads, rails and sea routes between two cities of one nation
//!
//! Building a link places a link structure on every path tile. Costs scale
//! with path length and are shared between the two endpoint cities.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::nation::Nation;
use crate::campaign::map::{HexCoord, TileGrid};
use crate::city::building::{BuildingKind, Structure, StructureKind};
use crate::city::stockpile::Stockpile;
use crate::core::error::{GameError, Result};
use crate::core::types::{LinkId, NationId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkKind {
    StoneRoad,
    SimpleRail,
    QualityRail,
    SeaRoute,
}

impl LinkKind {
    pub const ALL: [LinkKind; 4] = [
        LinkKind::StoneRoad,
        LinkKind::SimpleRail,
        LinkKind::QualityRail,
        LinkKind::SeaRoute,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            LinkKind::StoneRoad => "stone_road",
            LinkKind::SimpleRail => "simple_rail",
            LinkKind::QualityRail => "quality_rail",
            LinkKind::SeaRoute => "sea_route",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            LinkKind::StoneRoad => "stone road",
            LinkKind::SimpleRail => "simple rail",
            LinkKind::QualityRail => "quality rail",
            LinkKind::SeaRoute => "sea route",
        }
    }

    /// Sea routes run over water, everything else over land
    pub fn is_oceanic(&self) -> bool {
        matches!(self, LinkKind::SeaRoute)
    }

    pub fn is_rail(&self) -> bool {
        matches!(self, LinkKind::SimpleRail | LinkKind::QualityRail)
    }

    pub fn influence_per_tile(&self) -> f64 {
        match self {
            LinkKind::StoneRoad => 0.5,
            LinkKind::SimpleRail => 1.0,
            LinkKind::QualityRail => 2.0,
            LinkKind::SeaRoute => 0.2,
        }
    }

    /// (resource, amount per path tile)
    pub fn resources_per_tile(&self) -> &'static [(&'static str, f64)] {
        match self {
            LinkKind::StoneRoad => &[("stone", 0.2)],
            LinkKind::SimpleRail => &[("metal", 1.0 / 3.0)],
            LinkKind::QualityRail => &[("metal", 0.5)],
            LinkKind::SeaRoute => &[],
        }
    }

    pub fn influence_cost(&self, length: usize) -> u32 {
        (self.influence_per_tile() * length as f64).ceil() as u32
    }

    /// Whole resource items needed for a path of `length` tiles
    pub fn resource_cost(&self, length: usize) -> Vec<(&'static str, u32)> {
        self.resources_per_tile()
            .iter()
            .map(|(resource, rate)| (*resource, (rate * length as f64).ceil() as u32))
            .filter(|(_, amount)| *amount > 0)
            .collect()
    }

    /// Flat contribution to the influence cap
    pub fn cap_bonus(&self) -> i64 {
        match self {
            LinkKind::StoneRoad | LinkKind::SeaRoute => 1,
            LinkKind::SimpleRail => 3,
            LinkKind::QualityRail => 5,
        }
    }

    /// Endpoint structure that boosts this link type, and by how much
    pub fn endpoint_synergy(&self) -> Option<(&'static [BuildingKind], i64)> {
        match self {
            LinkKind::SimpleRail | LinkKind::QualityRail => {
                Some((&[BuildingKind::Station, BuildingKind::CentralStation], 1))
            }
            LinkKind::SeaRoute => Some((&[BuildingKind::Port], 2)),
            LinkKind::StoneRoad => None,
        }
    }
}

impl fmt::Display for LinkKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for LinkKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        LinkKind::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| format!("unknown link type {s:?}"))
    }
}

/// A built link between two cities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Link {
    pub id: LinkId,
    pub kind: LinkKind,
    pub origin: String,
    pub destination: String,
    /// Tiles stepped onto after leaving the origin, ending at the destination
    pub path: Vec<HexCoord>,
    pub owner: NationId,
}

impl Link {
    /// Endpoint city nearer to `coord`; ties go to the origin
    pub fn root_city(&self, coord: HexCoord, origin: HexCoord, destination: HexCoord) -> &str {
        if coord.distance(&origin) <= coord.distance(&destination) {
            &self.origin
        } else {
            &self.destination
        }
    }

    /// Place this link's structures on its path tiles
    pub fn place_structures(
        &self,
        grid: &mut TileGrid,
        origin: HexCoord,
        destination: HexCoord,
    ) -> Result<()> {
        for coord in &self.path {
            let root = self.root_city(*coord, origin, destination).to_string();
            let structure = Structure::new(StructureKind::Link(self.kind), *coord, root, self.owner);
            grid.get_mut(*coord)?.structures.push(structure);
        }
        Ok(())
    }
}

/// How many of `amount` items each endpoint gives, alternating tile by tile
/// and falling back to the other city when one runs dry
fn split_round_robin(amount: u32, origin_has: u32, destination_has: u32) -> (u32, u32) {
    let (mut from_origin, mut from_destination) = (0, 0);
    for i in 0..amount {
        let origin_left = origin_has - from_origin;
        let destination_left = destination_has - from_destination;
        let prefer_origin = i % 2 == 0;
        if (prefer_origin && origin_left > 0) || destination_left == 0 {
            from_origin += 1;
        } else {
            from_destination += 1;
        }
    }
    (from_origin, from_destination)
}

fn take(inventory: &mut Stockpile, resource: &str, count: u32) {
    for _ in 0..count {
        inventory.remove(resource);
    }
}

/// Build a link of `kind` from `origin` along `path`
///
/// The last path tile must be the destination city. All validation happens
/// before any mutation.
pub fn new_link(
    grid: &mut TileGrid,
    nation: &mut Nation,
    id: LinkId,
    kind: LinkKind,
    origin: &str,
    destination: &str,
    path: Vec<HexCoord>,
) -> Result<Link> {
    let action = format!("Building a {}", kind.display_name());
    let origin_city = nation
        .cities
        .get(origin)
        .ok_or_else(|| GameError::not_found("city", &action, origin))?;
    let destination_city = nation
        .cities
        .get(destination)
        .ok_or_else(|| GameError::not_found("city", &action, destination))?;
    if origin == destination {
        return Err(GameError::invalid_location(action, "from a city to itself"));
    }
    if path.last() != Some(&destination_city.coord) {
        return Err(GameError::invalid_location(
            action,
            format!("without reaching {destination}"),
        ));
    }

    for coord in &path {
        let tile = grid.get(*coord)?;
        if kind.is_oceanic() && !tile.terrain.is_water() {
            return Err(GameError::invalid_location(
                &action,
                format!("over land at {coord}"),
            ));
        }
        if !kind.is_oceanic() && !tile.terrain.is_land() {
            return Err(GameError::invalid_location(
                &action,
                format!("over water at {coord}"),
            ));
        }
    }

    let length = path.len();
    let resources = kind.resource_cost(length);
    for (resource, amount) in &resources {
        let available = origin_city.inventory.count(resource)
            + destination_city.inventory.count(resource);
        if available < *amount {
            let mut have = origin_city.inventory.items();
            have.extend(destination_city.inventory.items());
            return Err(GameError::NotEnoughResources {
                need: vec![resource.to_string(); *amount as usize],
                have,
            });
        }
    }

    let cost = kind.influence_cost(length);
    if nation.econ.influence < cost {
        return Err(GameError::NotEnoughInfluence {
            need: cost,
            have: nation.econ.influence,
        });
    }

    let origin_coord = origin_city.coord;
    let destination_coord = destination_city.coord;
    let shares: Vec<(&str, u32, u32)> = resources
        .iter()
        .map(|(resource, amount)| {
            let (a, b) = split_round_robin(
                *amount,
                origin_city.inventory.count(resource),
                destination_city.inventory.count(resource),
            );
            (*resource, a, b)
        })
        .collect();

    for (resource, from_origin, from_destination) in shares {
        if let Some(city) = nation.cities.get_mut(origin) {
            take(&mut city.inventory, resource, from_origin);
        }
        if let Some(city) = nation.cities.get_mut(destination) {
            take(&mut city.inventory, resource, from_destination);
        }
    }
    for name in [origin, destination] {
        if let Some(city) = nation.cities.get_mut(name) {
            city.refresh_tier();
        }
    }
    nation.econ.influence -= cost;

    let link = Link {
        id,
        kind,
        origin: origin.to_string(),
        destination: destination.to_string(),
        path,
        owner: nation.id,
    };
    link.place_structures(grid, origin_coord, destination_coord)?;
    nation.links.push(link.clone());

    tracing::info!(
        nation = %nation.name,
        link = kind.key(),
        origin,
        destination,
        length,
        cost,
        "link built"
    );
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::economy::Econ;
    use crate::campaign::map::Tile;
    use crate::campaign::terrain::{LandBiome, Terrain, WaterBiome};
    use crate::city::settlement::City;

    const NATION: NationId = NationId(1);

    /// Land row r = 0 from q = 0..=4 with cities at both ends, ocean at r = 1
    fn setup(origin_items: &[&str], destination_items: &[&str]) -> (TileGrid, Nation) {
        let mut grid = TileGrid::new();
        for q in 0..=4 {
            grid.set(Tile::new(HexCoord::new(q, 0), Terrain::land(LandBiome::Plains)))
                .unwrap();
            grid.set(Tile::new(HexCoord::new(q, 1), Terrain::water(WaterBiome::Ocean)))
                .unwrap();
        }
        let mut nation = Nation::new(NATION, "Avalon");
        nation.econ = Econ::new(NATION, 10, 10);
        for (name, coord, items) in [
            ("West", HexCoord::new(0, 0), origin_items),
            ("East", HexCoord::new(4, 0), destination_items),
        ] {
            grid.get_mut(coord).unwrap().city = Some(name.to_string());
            let city = City::new(name, coord, NATION)
                .with_inventory(Stockpile::from_items(items.iter().copied()));
            nation.cities.insert(name.to_string(), city);
        }
        (grid, nation)
    }

    fn east_path() -> Vec<HexCoord> {
        (1..=4).map(|q| HexCoord::new(q, 0)).collect()
    }

    #[test]
    fn test_costs_scale_with_length() {
        assert_eq!(LinkKind::StoneRoad.influence_cost(4), 2);
        assert_eq!(LinkKind::StoneRoad.influence_cost(5), 3);
        assert_eq!(LinkKind::SeaRoute.influence_cost(6), 2);
        assert_eq!(LinkKind::SimpleRail.resource_cost(4), vec![("metal", 2)]);
        assert_eq!(LinkKind::QualityRail.resource_cost(3), vec![("metal", 2)]);
        assert!(LinkKind::SeaRoute.resource_cost(10).is_empty());
    }

    #[test]
    fn test_round_robin_split() {
        assert_eq!(split_round_robin(4, 5, 5), (2, 2));
        assert_eq!(split_round_robin(3, 5, 5), (2, 1));
        assert_eq!(split_round_robin(3, 0, 5), (0, 3));
        assert_eq!(split_round_robin(3, 1, 5), (1, 2));
        assert_eq!(split_round_robin(4, 4, 1), (3, 1));
    }

    #[test]
    fn test_rail_link_alternates_deduction() {
        let (mut grid, mut nation) = setup(&["metal", "metal"], &["metal", "metal"]);
        let link = new_link(
            &mut grid,
            &mut nation,
            LinkId(1),
            LinkKind::SimpleRail,
            "West",
            "East",
            east_path(),
        )
        .unwrap();

        assert_eq!(nation.cities["West"].inventory.count("metal"), 1);
        assert_eq!(nation.cities["East"].inventory.count("metal"), 1);
        assert_eq!(nation.econ.influence, 6);
        assert_eq!(nation.links, vec![link]);

        // (1, 0) is nearer West, (3, 0) nearer East, (2, 0) ties to West
        let root = |q| grid.get(HexCoord::new(q, 0)).unwrap().structures[0].root_city.clone();
        assert_eq!(root(1), "West");
        assert_eq!(root(2), "West");
        assert_eq!(root(3), "East");
        assert_eq!(grid.get(HexCoord::new(2, 0)).unwrap().difficulty(), 0.5);
    }

    #[test]
    fn test_land_link_rejects_water() {
        let (mut grid, mut nation) = setup(&["stone"], &[]);
        let path = vec![
            HexCoord::new(1, 0),
            HexCoord::new(2, 1),
            HexCoord::new(3, 0),
            HexCoord::new(4, 0),
        ];
        let err = new_link(
            &mut grid,
            &mut nation,
            LinkId(1),
            LinkKind::StoneRoad,
            "West",
            "East",
            path,
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidLocation { .. }));
        assert_eq!(nation.econ.influence, 10);
        assert_eq!(nation.cities["West"].inventory.count("stone"), 1);
    }

    #[test]
    fn test_insufficient_combined_resources() {
        let (mut grid, mut nation) = setup(&["metal"], &[]);
        let err = new_link(
            &mut grid,
            &mut nation,
            LinkId(1),
            LinkKind::QualityRail,
            "West",
            "East",
            east_path(),
        )
        .unwrap_err();
        assert!(matches!(err, GameError::NotEnoughResources { .. }));
        assert!(nation.links.is_empty());
        assert!(grid.get(HexCoord::new(1, 0)).unwrap().structures.is_empty());
    }

    #[test]
    fn test_path_must_end_at_destination() {
        let (mut grid, mut nation) = setup(&["stone"], &[]);
        let err = new_link(
            &mut grid,
            &mut nation,
            LinkId(1),
            LinkKind::StoneRoad,
            "West",
            "East",
            vec![HexCoord::new(1, 0)],
        )
        .unwrap_err();
        assert!(matches!(err, GameError::InvalidLocation { .. }));
    }
}
