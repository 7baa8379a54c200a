//! Armies and fleets on the campaign map
//!
//! Units spend free movement to step between adjacent tiles. Entering a tile
//! held by a hostile unit starts a battle.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::aggregate::world::World;
use crate::campaign::battle::{self, BattleReport};
use crate::campaign::map::{Direction, HexCoord, Tile};
use crate::campaign::terrain::LandBiome;
use crate::city::building::{BuildingKind, StructureKind};
use crate::core::config::UnitSettings;
use crate::core::error::{GameError, Result};
use crate::core::types::{NationId, UnitId};
use crate::persist::Changeset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    Army,
    Fleet,
}

impl UnitKind {
    pub fn key(&self) -> &'static str {
        match self {
            UnitKind::Army => "army",
            UnitKind::Fleet => "fleet",
        }
    }

    /// Free movement restored each season
    pub fn movement(&self, settings: &UnitSettings) -> f64 {
        match self {
            UnitKind::Army => settings.army_movement,
            UnitKind::Fleet => settings.fleet_movement,
        }
    }

    pub fn influence_cost(&self, settings: &UnitSettings) -> u32 {
        match self {
            UnitKind::Army => settings.army_cost,
            UnitKind::Fleet => settings.fleet_cost,
        }
    }

    fn raise_action(&self) -> &'static str {
        match self {
            UnitKind::Army => "Training an army",
            UnitKind::Fleet => "Building a fleet",
        }
    }
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for UnitKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "army" => Ok(UnitKind::Army),
            "fleet" => Ok(UnitKind::Fleet),
            other => Err(format!("unknown unit type {other:?}")),
        }
    }
}

/// Why a tile cannot be entered, or `None` if it can
pub fn entry_block(kind: UnitKind, tile: &Tile, winter: bool) -> Option<&'static str> {
    if winter && tile.terrain.land_biome == Some(LandBiome::HighMountains) {
        return Some("high mountains can't be crossed in winter");
    }
    match kind {
        UnitKind::Army if !tile.terrain.is_land() => Some("armies can't march onto water"),
        UnitKind::Fleet if !tile.terrain.is_water() => Some("fleets can't sail onto land"),
        _ => None,
    }
}

/// An army or fleet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub id: UnitId,
    /// Unique within the owner's military
    pub name: String,
    pub kind: UnitKind,
    /// Name of the city that raised the unit
    pub home: String,
    pub owner: NationId,
    pub location: HexCoord,
    pub strength: f64,
    pub morale: f64,
    pub experience: u32,
    /// Movement left this season
    pub movement_free: f64,
}

impl Unit {
    pub fn is_broken(&self) -> bool {
        self.strength <= 0.0 || self.morale <= 0.0
    }

    /// Reduce stats, flooring both at zero
    pub fn suffer(&mut self, strength_loss: f64, morale_loss: f64) {
        self.strength = (self.strength - strength_loss).max(0.0);
        self.morale = (self.morale - morale_loss).max(0.0);
    }
}

/// Result of a successful move
#[derive(Debug, Clone, PartialEq)]
pub struct MoveReport {
    pub unit: UnitId,
    pub from: HexCoord,
    pub to: HexCoord,
    pub movement_left: f64,
    pub battle: Option<BattleReport>,
}

impl World {
    pub fn train_army(
        &mut self,
        nation: NationId,
        name: &str,
        city: &str,
        changes: &mut Changeset,
    ) -> Result<UnitId> {
        self.raise_unit(nation, name, city, UnitKind::Army, changes)
    }

    pub fn build_fleet(
        &mut self,
        nation: NationId,
        name: &str,
        city: &str,
        changes: &mut Changeset,
    ) -> Result<UnitId> {
        self.raise_unit(nation, name, city, UnitKind::Fleet, changes)
    }

    fn raise_unit(
        &mut self,
        nation_id: NationId,
        name: &str,
        city_name: &str,
        kind: UnitKind,
        changes: &mut Changeset,
    ) -> Result<UnitId> {
        let action = kind.raise_action();
        let settings = &self.config.units;
        let nation = self
            .nations
            .get(&nation_id)
            .ok_or(GameError::NationNotFound(nation_id))?;
        let city = nation.city(city_name, action)?;
        if nation.military.contains_key(name) {
            return Err(GameError::NameInUse {
                kind: "unit",
                name: name.to_string(),
            });
        }
        let tile = self.grid.get(city.coord)?;
        if kind == UnitKind::Fleet {
            if !tile.has_structure(StructureKind::Building(BuildingKind::Port)) {
                return Err(GameError::MissingStructure {
                    action: action.to_string(),
                    required: BuildingKind::Port.display_name().to_string(),
                });
            }
            if !tile.terrain.is_water() {
                return Err(GameError::invalid_location(action, "in a landlocked city"));
            }
        }
        let cost = kind.influence_cost(settings);
        if !nation.econ.can_afford(cost) {
            return Err(GameError::NotEnoughInfluence {
                need: cost,
                have: nation.econ.influence,
            });
        }

        let strength = if tile.has_structure(StructureKind::Building(BuildingKind::Foundry)) {
            settings.foundry_strength
        } else {
            settings.base_strength
        };
        let location = city.coord;
        let morale = settings.base_morale;
        let movement_free = kind.movement(settings);

        let id = self.next_unit_id();
        let unit = Unit {
            id,
            name: name.to_string(),
            kind,
            home: city_name.to_string(),
            owner: nation_id,
            location,
            strength,
            morale,
            experience: 0,
            movement_free,
        };
        let nation = self.nation_mut(nation_id)?;
        nation.spend_influence(cost)?;
        nation.military.insert(unit.name.clone(), id);
        changes.economy(&nation.econ);
        changes.unit(&unit);
        tracing::info!(nation = %nation.name, unit = name, kind = kind.key(), at = %location, "unit raised");
        self.units.insert(id, unit);
        Ok(id)
    }

    /// Step a unit one tile, fighting any hostile unit found there
    pub fn move_unit(
        &mut self,
        nation_id: NationId,
        unit_name: &str,
        direction: Direction,
        changes: &mut Changeset,
    ) -> Result<MoveReport> {
        let action = "Moving a unit";
        let nation = self.nation(nation_id)?;
        let unit_id = nation.unit_id(unit_name, action)?;
        let unit = self
            .units
            .get(&unit_id)
            .ok_or_else(|| GameError::not_found("unit", action, unit_name))?;
        let from = unit.location;
        let to = from.step(direction);
        let tile = self.grid.get(to)?;

        let cost = tile.difficulty();
        if cost > unit.movement_free {
            return Err(GameError::OutOfMovement {
                unit: unit.name.clone(),
                needed: cost,
                remaining: unit.movement_free,
            });
        }
        if let Some(reason) = entry_block(unit.kind, tile, self.calendar.is_winter()) {
            return Err(GameError::Impassable(reason.to_string()));
        }

        let target = self
            .units
            .values()
            .find(|other| other.location == to && nation.is_hostile_to(other.owner))
            .map(|other| other.id);

        let Some(unit) = self.units.get_mut(&unit_id) else {
            return Err(GameError::not_found("unit", action, unit_name));
        };
        unit.movement_free -= cost;
        unit.location = to;
        changes.unit(unit);
        tracing::debug!(unit = unit_name, %from, %to, cost, "unit moved");

        let battle = match target {
            Some(target) => Some(self.attack(unit_id, target, from, changes)?),
            None => None,
        };
        let unit = self
            .units
            .get(&unit_id)
            .ok_or_else(|| GameError::not_found("unit", action, unit_name))?;
        Ok(MoveReport {
            unit: unit_id,
            from,
            to: unit.location,
            movement_left: unit.movement_free,
            battle,
        })
    }

    /// Move a beaten unit to the safest reachable tile around it
    ///
    /// Candidates are enterable tiles in the unit's area within its free
    /// movement and holding no hostile unit. The one where the unit would
    /// defend best wins. With no candidate the unit stays put.
    pub fn retreat(&mut self, unit_id: UnitId) -> Option<HexCoord> {
        let unit = self.units.get(&unit_id)?;
        let nation = self.nations.get(&unit.owner)?;
        let winter = self.calendar.is_winter();

        let destination = self
            .grid
            .area(unit.location)
            .into_iter()
            .filter_map(|coord| self.grid.find(coord))
            .filter(|tile| tile.difficulty() <= unit.movement_free)
            .filter(|tile| entry_block(unit.kind, tile, winter).is_none())
            .filter(|tile| {
                !self
                    .units
                    .values()
                    .any(|other| other.location == tile.coord && nation.is_hostile_to(other.owner))
            })
            .max_by_key(|tile| OrderedFloat(battle::effectiveness(self, unit, false, tile.coord)))
            .map(|tile| tile.coord)?;

        let unit = self.units.get_mut(&unit_id)?;
        tracing::debug!(unit = %unit.name, from = %unit.location, to = %destination, "unit retreated");
        unit.location = destination;
        Some(destination)
    }

    /// Restore every unit's free movement for the new season
    pub fn restore_movement(&mut self, changes: &mut Changeset) {
        for unit in self.units.values_mut() {
            unit.movement_free = unit.kind.movement(&self.config.units);
            changes.unit(unit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::campaign::map::TileGrid;
    use crate::campaign::terrain::{Terrain, WaterBiome};
    use crate::city::building::Structure;
    use crate::core::config::GameConfig;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn test_entry_rules() {
        let plains = Tile::new(HexCoord::default(), Terrain::land(LandBiome::Plains));
        let ocean = Tile::new(HexCoord::default(), Terrain::water(WaterBiome::Ocean));
        let coast = Tile::new(HexCoord::default(), Terrain::coast(LandBiome::Forest));
        let peaks = Tile::new(HexCoord::default(), Terrain::land(LandBiome::HighMountains));

        assert!(entry_block(UnitKind::Army, &plains, false).is_none());
        assert!(entry_block(UnitKind::Army, &ocean, false).is_some());
        assert!(entry_block(UnitKind::Fleet, &plains, false).is_some());
        assert!(entry_block(UnitKind::Fleet, &coast, false).is_none());
        assert!(entry_block(UnitKind::Army, &coast, false).is_none());
        assert!(entry_block(UnitKind::Army, &peaks, false).is_none());
        assert!(entry_block(UnitKind::Army, &peaks, true).is_some());
    }

    #[test]
    fn test_suffer_floors_at_zero() {
        let mut unit = Unit {
            id: UnitId(1),
            name: "First".into(),
            kind: UnitKind::Army,
            home: "Capital".into(),
            owner: NationId(1),
            location: HexCoord::default(),
            strength: 1.0,
            morale: 0.5,
            experience: 0,
            movement_free: 3.0,
        };
        unit.suffer(0.4, 0.7);
        assert!((unit.strength - 0.6).abs() < 1e-9);
        assert_eq!(unit.morale, 0.0);
        assert!(unit.is_broken());
    }

    #[test]
    fn test_unit_kind_settings() {
        let settings = UnitSettings::default();
        assert_eq!(UnitKind::Army.movement(&settings), 3.0);
        assert_eq!(UnitKind::Fleet.movement(&settings), 6.0);
        assert_eq!(UnitKind::Fleet.influence_cost(&settings), 2);
        assert_eq!("Fleet".parse(), Ok(UnitKind::Fleet));
    }

    /// Lancers out at (4, 0) with a fort next door at (5, 0); Ravens wait at Dawn
    fn stranded() -> (World, UnitId, UnitId) {
        let mut grid = TileGrid::new();
        for q in -2..=8 {
            for r in -3..=3 {
                grid.set(Tile::new(HexCoord::new(q, r), Terrain::land(LandBiome::Plains)))
                    .unwrap();
            }
        }
        let mut world = World::with_rng(grid, GameConfig::default(), ChaCha8Rng::seed_from_u64(6));
        let mut changes = Changeset::new();
        world
            .found_nation(NationId(1), "Avalon", "Camelot", HexCoord::new(0, 0), &mut changes)
            .unwrap();
        world
            .found_nation(NationId(2), "Bright", "Dawn", HexCoord::new(8, 0), &mut changes)
            .unwrap();
        let lancers = world.train_army(NationId(1), "Lancers", "Camelot", &mut changes).unwrap();
        let ravens = world.train_army(NationId(2), "Ravens", "Dawn", &mut changes).unwrap();
        world.units.get_mut(&lancers).unwrap().location = HexCoord::new(4, 0);
        let fort = HexCoord::new(5, 0);
        world.grid.get_mut(fort).unwrap().structures.push(Structure::new(
            StructureKind::Building(BuildingKind::Fort),
            fort,
            "Camelot",
            NationId(1),
        ));
        (world, lancers, ravens)
    }

    /// Beaten units fall back onto the best defended tile they can reach
    #[test]
    fn test_retreat_prefers_the_fort() {
        let (mut world, lancers, _) = stranded();
        assert_eq!(world.retreat(lancers), Some(HexCoord::new(5, 0)));
        assert_eq!(world.units[&lancers].location, HexCoord::new(5, 0));
    }

    #[test]
    fn test_retreat_avoids_hostile_tiles() {
        let (mut world, lancers, ravens) = stranded();
        world.units.get_mut(&ravens).unwrap().location = HexCoord::new(5, 0);

        let to = world.retreat(lancers).unwrap();
        assert_ne!(to, HexCoord::new(5, 0));
        // next to the fort still beats open plains
        let score = battle::effectiveness(&world, &world.units[&lancers], false, to);
        assert!((score - 1.2).abs() < 1e-9, "{score}");
    }

    #[test]
    fn test_retreat_needs_movement() {
        let (mut world, lancers, _) = stranded();
        world.units.get_mut(&lancers).unwrap().movement_free = 0.5;
        assert_eq!(world.retreat(lancers), None);
        assert_eq!(world.units[&lancers].location, HexCoord::new(4, 0));
    }
}
