//! Structure catalog and construction
//!
//! Buildings are improvements placed by a city on its own tile or inside
//! its developed area. Link segments are structures too; they are placed by
//! `city::link` and never through `build`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::nation::Nation;
use crate::campaign::map::{HexCoord, TileGrid};
use crate::campaign::terrain::LandBiome;
use crate::city::link::LinkKind;
use crate::core::error::{GameError, Result};
use crate::core::types::NationId;

/// Where a building may be placed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// Only on a city tile
    CityOnly,
    /// On any tile whose land biome is listed
    Biomes(&'static [LandBiome]),
}

/// Buildable structure types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildingKind {
    Temple,
    GrandTemple,
    Station,
    CentralStation,
    District,
    CharcoalPit,
    Smeltery,
    Port,
    Foundry,
    Fort,
}

impl BuildingKind {
    pub const ALL: [BuildingKind; 10] = [
        BuildingKind::Temple,
        BuildingKind::GrandTemple,
        BuildingKind::Station,
        BuildingKind::CentralStation,
        BuildingKind::District,
        BuildingKind::CharcoalPit,
        BuildingKind::Smeltery,
        BuildingKind::Port,
        BuildingKind::Foundry,
        BuildingKind::Fort,
    ];

    /// Catalog key, also used in persisted structure lists
    pub fn key(&self) -> &'static str {
        match self {
            BuildingKind::Temple => "temple",
            BuildingKind::GrandTemple => "grand_temple",
            BuildingKind::Station => "station",
            BuildingKind::CentralStation => "central_station",
            BuildingKind::District => "district",
            BuildingKind::CharcoalPit => "charcoal_pit",
            BuildingKind::Smeltery => "smeltery",
            BuildingKind::Port => "port",
            BuildingKind::Foundry => "foundry",
            BuildingKind::Fort => "fort",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            BuildingKind::Temple => "temple",
            BuildingKind::GrandTemple => "grand temple",
            BuildingKind::Station => "station",
            BuildingKind::CentralStation => "central station",
            BuildingKind::District => "district",
            BuildingKind::CharcoalPit => "charcoal pit",
            BuildingKind::Smeltery => "smeltery",
            BuildingKind::Port => "port",
            BuildingKind::Foundry => "foundry",
            BuildingKind::Fort => "fort",
        }
    }

    pub fn influence_cost(&self) -> u32 {
        match self {
            BuildingKind::Temple | BuildingKind::GrandTemple | BuildingKind::District => 1,
            _ => 2,
        }
    }

    /// Resource items consumed on completion
    pub fn required_materials(&self) -> &'static [&'static str] {
        match self {
            BuildingKind::Temple | BuildingKind::GrandTemple => &["stone"],
            BuildingKind::Station | BuildingKind::CentralStation => &["lumber"],
            BuildingKind::District => &["lumber", "stone"],
            BuildingKind::CharcoalPit => &["lumber"],
            BuildingKind::Smeltery => &["stone", "fuel"],
            BuildingKind::Port => &["stone", "lumber"],
            BuildingKind::Foundry => &["metal", "fuel"],
            BuildingKind::Fort => &["stone", "lumber"],
        }
    }

    pub fn placement(&self) -> Placement {
        match self {
            BuildingKind::Fort => Placement::Biomes(&[
                LandBiome::Plains,
                LandBiome::Forest,
                LandBiome::Desert,
                LandBiome::Mountains,
            ]),
            _ => Placement::CityOnly,
        }
    }

    /// Structure consumed when this one is built
    pub fn prerequisite(&self) -> Option<BuildingKind> {
        match self {
            BuildingKind::GrandTemple => Some(BuildingKind::Temple),
            BuildingKind::CentralStation => Some(BuildingKind::Station),
            _ => None,
        }
    }

    /// Minimum tier of the city when built on the city's own tile
    pub fn min_tier(&self) -> Option<u8> {
        match self {
            BuildingKind::Foundry => Some(2),
            _ => None,
        }
    }

    /// Upgraded structures may exist once per nation
    pub fn is_unique(&self) -> bool {
        self.prerequisite().is_some()
    }

    pub fn is_temple(&self) -> bool {
        matches!(self, BuildingKind::Temple | BuildingKind::GrandTemple)
    }

    fn action(&self) -> String {
        format!("Building a {}", self.display_name())
    }

    /// Construct this building for `city_name` at `target`
    ///
    /// Every check runs before anything is mutated; the prerequisite removal
    /// is the last check and the first mutation.
    pub fn build(
        self,
        grid: &mut TileGrid,
        nation: &mut Nation,
        city_name: &str,
        target: HexCoord,
    ) -> Result<Structure> {
        let action = self.action();
        let city = nation
            .cities
            .get(city_name)
            .ok_or_else(|| GameError::not_found("city", &action, city_name))?;
        let tile = grid.get(target)?;

        let built = city
            .structures(grid)
            .iter()
            .filter(|s| s.kind.is_building())
            .count();
        let limit = match city.tier {
            0 | 1 => Some(2),
            2 | 3 => Some(3),
            _ => None,
        };
        if limit.is_some_and(|limit| built >= limit) {
            return Err(GameError::TooManyStructures(city.coord));
        }

        let materials = self.required_materials();
        if !city.inventory.has_materials(materials) {
            return Err(GameError::NotEnoughResources {
                need: materials.iter().map(|m| m.to_string()).collect(),
                have: city.inventory.items(),
            });
        }

        let cost = self.influence_cost();
        if nation.econ.influence < cost {
            return Err(GameError::NotEnoughInfluence {
                need: cost,
                have: nation.econ.influence,
            });
        }

        match self.placement() {
            Placement::CityOnly if !tile.is_city() => {
                return Err(GameError::invalid_location(action, "outside a city"));
            }
            Placement::Biomes(allowed)
                if !tile
                    .terrain
                    .land_biome
                    .is_some_and(|biome| allowed.contains(&biome)) =>
            {
                return Err(GameError::invalid_location(
                    action,
                    format!("on {} terrain", tile.terrain),
                ));
            }
            _ => {}
        }

        if !city.developed_area(grid).contains(&target) {
            return Err(GameError::invalid_location(
                action,
                format!("that far from {}", city.name),
            ));
        }

        if let Some(need) = self.min_tier() {
            if target == city.coord && city.tier < need {
                return Err(GameError::TierTooLow {
                    have: city.tier,
                    need,
                });
            }
        }

        if let Some(prerequisite) = self.prerequisite() {
            if self.is_unique() {
                let kind = StructureKind::Building(self);
                if nation.cities.values().any(|c| c.has_structure(grid, kind)) {
                    return Err(GameError::TooManyUniqueStructures(
                        self.display_name().to_string(),
                    ));
                }
            }
            grid.get_mut(target)?
                .take_structure(StructureKind::Building(prerequisite))
                .ok_or_else(|| GameError::MissingStructure {
                    action: action.clone(),
                    required: prerequisite.display_name().to_string(),
                })?;
        }

        let structure = Structure::new(
            StructureKind::Building(self),
            target,
            city_name,
            nation.id,
        );
        let Some(city) = nation.cities.get_mut(city_name) else {
            return Err(GameError::not_found("city", action, city_name));
        };
        city.inventory.consume_materials(materials);
        city.refresh_tier();
        nation.econ.influence -= cost;
        grid.get_mut(target)?.structures.push(structure.clone());

        if self.is_temple() {
            let popularity = (city.popularity / 10.0 + 5.0).round_ties_even().min(100.0);
            let stability = (city.stability / 20.0 + 5.0).round_ties_even().min(100.0);
            city.add_popularity(popularity);
            city.add_stability(stability);
        }

        tracing::info!(
            nation = %nation.name,
            city = city_name,
            structure = self.key(),
            at = %target,
            "structure built"
        );
        Ok(structure)
    }
}

impl fmt::Display for BuildingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for BuildingKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace([' ', '-'], "_");
        BuildingKind::ALL
            .into_iter()
            .find(|kind| kind.key() == key)
            .ok_or_else(|| format!("unknown structure {s:?}"))
    }
}

/// Anything that occupies a tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum StructureKind {
    Building(BuildingKind),
    Link(LinkKind),
}

impl StructureKind {
    pub fn key(&self) -> &'static str {
        match self {
            StructureKind::Building(kind) => kind.key(),
            StructureKind::Link(kind) => kind.key(),
        }
    }

    pub fn is_building(&self) -> bool {
        matches!(self, StructureKind::Building(_))
    }
}

impl TryFrom<String> for StructureKind {
    type Error = String;

    fn try_from(key: String) -> std::result::Result<Self, Self::Error> {
        if let Ok(link) = key.parse::<LinkKind>() {
            return Ok(StructureKind::Link(link));
        }
        key.parse::<BuildingKind>().map(StructureKind::Building)
    }
}

impl From<StructureKind> for String {
    fn from(kind: StructureKind) -> Self {
        kind.key().to_string()
    }
}

/// A placed structure instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Structure {
    pub kind: StructureKind,
    pub location: HexCoord,
    /// City the structure belongs to; for link segments the nearer endpoint
    pub root_city: String,
    pub builder: NationId,
}

impl Structure {
    pub fn new(
        kind: StructureKind,
        location: HexCoord,
        root_city: impl Into<String>,
        builder: NationId,
    ) -> Self {
        Self {
            kind,
            location,
            root_city: root_city.into(),
            builder,
        }
    }
}
