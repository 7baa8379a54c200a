//! World - the explicit game state container
//!
//! Holds the tile grid, every nation and unit, the season calendar and the
//! deterministic RNG. Every mutating operation takes a [`Changeset`] and
//! records the rows it touched so the caller can commit them atomically.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::economy::Econ;
use crate::aggregate::nation::Nation;
use crate::campaign::map::{HexCoord, TileGrid};
use crate::campaign::terrain::LandBiome;
use crate::campaign::units::{Unit, UnitKind};
use crate::city::building::{BuildingKind, Structure};
use crate::city::link::{new_link, Link, LinkKind};
use crate::city::settlement::City;
use crate::core::calendar::{Calendar, Season};
use crate::core::config::GameConfig;
use crate::core::error::{GameError, Result};
use crate::core::types::{Color, LinkId, NationId, UnitId};
use crate::persist::Changeset;

/// The whole game state
pub struct World {
    pub grid: TileGrid,
    pub nations: BTreeMap<NationId, Nation>,
    pub units: BTreeMap<UnitId, Unit>,
    pub calendar: Calendar,
    pub config: GameConfig,
    /// Random number generator (deterministic when seeded)
    pub rng: ChaCha8Rng,
    /// Next unit ID to assign
    next_unit_id: u64,
    /// Next link ID to assign
    next_link_id: u64,
}

impl World {
    /// Fresh world over `grid`, seeded from the config when it names a seed
    pub fn new(grid: TileGrid, config: GameConfig) -> Self {
        let rng = match config.world.seed {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        Self::with_rng(grid, config, rng)
    }

    pub fn with_rng(grid: TileGrid, config: GameConfig, rng: ChaCha8Rng) -> Self {
        Self {
            grid,
            nations: BTreeMap::new(),
            units: BTreeMap::new(),
            calendar: Calendar::new(Season::Spring, 0),
            config,
            rng,
            next_unit_id: 1,
            next_link_id: 1,
        }
    }

    /// Generate a new unique UnitId
    pub fn next_unit_id(&mut self) -> UnitId {
        let id = UnitId(self.next_unit_id);
        self.next_unit_id += 1;
        id
    }

    /// Generate a new unique LinkId
    pub fn next_link_id(&mut self) -> LinkId {
        let id = LinkId(self.next_link_id);
        self.next_link_id += 1;
        id
    }

    /// Resume id allocation after the highest ids seen in restored rows
    pub fn set_id_counters(&mut self, max_unit: u64, max_link: u64) {
        self.next_unit_id = self.next_unit_id.max(max_unit + 1);
        self.next_link_id = self.next_link_id.max(max_link + 1);
    }

    pub fn nation(&self, id: NationId) -> Result<&Nation> {
        self.nations.get(&id).ok_or(GameError::NationNotFound(id))
    }

    pub fn nation_mut(&mut self, id: NationId) -> Result<&mut Nation> {
        self.nations.get_mut(&id).ok_or(GameError::NationNotFound(id))
    }

    pub fn find_nation(&self, name: &str) -> Option<&Nation> {
        self.nations.values().find(|n| n.name.eq_ignore_ascii_case(name))
    }

    pub fn unit_by_name(&self, nation: NationId, name: &str) -> Result<&Unit> {
        let id = self.nation(nation)?.unit_id(name, "Finding a unit")?;
        self.units
            .get(&id)
            .ok_or_else(|| GameError::not_found("unit", "Finding a unit", name))
    }

    /// Found a nation for `founder` with its capital at `coord`
    pub fn found_nation(
        &mut self,
        founder: NationId,
        name: &str,
        capital: &str,
        coord: HexCoord,
        changes: &mut Changeset,
    ) -> Result<NationId> {
        if self.find_nation(name).is_some() {
            return Err(GameError::NameInUse {
                kind: "nation",
                name: name.to_string(),
            });
        }
        if self.nations.contains_key(&founder) {
            return Err(GameError::AlreadyHasNation(founder));
        }
        let candidate = Nation::new(founder, name);
        self.validate_city_site(&candidate, capital, coord, "Founding a nation")?;

        let economy = &self.config.economy;
        let mut nation = Nation::new(founder, name);
        nation.econ = Econ::new(founder, economy.starting_influence, economy.starting_cap);
        nation.color = Color::from_rgb(self.rng.gen(), self.rng.gen(), self.rng.gen());
        self.nations.insert(founder, nation);
        self.settle_city(founder, capital, coord, changes)?;

        let nation = self.nation(founder)?;
        changes.nation(nation);
        changes.meta(&self.calendar, &self.rng);
        tracing::info!(nation = %nation.name, id = %founder, capital, at = %coord, "nation founded");
        Ok(founder)
    }

    /// Found a further city for an existing nation
    pub fn found_city(
        &mut self,
        nation_id: NationId,
        name: &str,
        coord: HexCoord,
        changes: &mut Changeset,
    ) -> Result<()> {
        let nation = self.nation(nation_id)?;
        self.validate_city_site(nation, name, coord, "Founding a city")?;
        self.settle_city(nation_id, name, coord, changes)?;

        let nation = self.nation(nation_id)?;
        changes.nation(nation);
        tracing::info!(nation = %nation.name, city = name, at = %coord, "city founded");
        Ok(())
    }

    fn validate_city_site(
        &self,
        nation: &Nation,
        name: &str,
        coord: HexCoord,
        action: &str,
    ) -> Result<()> {
        let tile = self.grid.get(coord)?;
        if !tile.terrain.is_land() {
            return Err(GameError::invalid_location(action, "on water"));
        }
        if tile.terrain.land_biome == Some(LandBiome::HighMountains) {
            return Err(GameError::invalid_location(action, "on high mountains"));
        }
        if tile.is_city() {
            return Err(GameError::invalid_location(action, "on top of another city"));
        }
        if nation.cities.contains_key(name) {
            return Err(GameError::NameInUse {
                kind: "city",
                name: name.to_string(),
            });
        }
        for claimed in self.grid.area(coord) {
            let owner = self.grid.find(claimed).and_then(|t| t.owner);
            if owner.is_some_and(|owner| owner != nation.id) {
                return Err(GameError::NotOwned(claimed));
            }
        }
        Ok(())
    }

    /// Mark the city tile and claim its area; assumes a validated site
    fn settle_city(
        &mut self,
        nation_id: NationId,
        name: &str,
        coord: HexCoord,
        changes: &mut Changeset,
    ) -> Result<()> {
        let area = self.grid.area(coord);
        let nation = self
            .nations
            .get_mut(&nation_id)
            .ok_or(GameError::NationNotFound(nation_id))?;
        for claimed in area {
            let tile = self.grid.get_mut(claimed)?;
            if tile.owner.is_none() {
                tile.claim(nation_id);
                nation.claim(claimed);
            }
            if claimed == coord {
                tile.city = Some(name.to_string());
            }
            changes.tile(tile);
        }

        let city = City::new(name, coord, nation_id);
        changes.city(&city, &self.grid);
        nation.cities.insert(name.to_string(), city);
        Ok(())
    }

    /// Build `kind` for `city`, at the city tile unless `target` is given
    pub fn build_structure(
        &mut self,
        nation_id: NationId,
        city: &str,
        kind: BuildingKind,
        target: Option<HexCoord>,
        changes: &mut Changeset,
    ) -> Result<Structure> {
        let nation = self
            .nations
            .get_mut(&nation_id)
            .ok_or(GameError::NationNotFound(nation_id))?;
        let target = match target {
            Some(target) => target,
            None => nation.city(city, "Building a structure")?.coord,
        };
        let structure = kind.build(&mut self.grid, nation, city, target)?;

        changes.nation(nation);
        changes.city(nation.city(city, "Building a structure")?, &self.grid);
        changes.tile(self.grid.get(target)?);
        Ok(structure)
    }

    /// Build a link from `origin` along `path`, which ends at `destination`
    pub fn build_link(
        &mut self,
        nation_id: NationId,
        kind: LinkKind,
        origin: &str,
        destination: &str,
        path: Vec<HexCoord>,
        changes: &mut Changeset,
    ) -> Result<Link> {
        let id = LinkId(self.next_link_id);
        let nation = self
            .nations
            .get_mut(&nation_id)
            .ok_or(GameError::NationNotFound(nation_id))?;
        let link = new_link(&mut self.grid, nation, id, kind, origin, destination, path)?;

        changes.nation(nation);
        for name in [origin, destination] {
            changes.city(nation.city(name, "Building a link")?, &self.grid);
        }
        for coord in &link.path {
            changes.tile(self.grid.get(*coord)?);
        }
        changes.link(&link);
        self.next_link_id += 1;
        Ok(link)
    }

    /// Make `a` and `b` allies of each other, or break their alliance
    pub fn set_alliance(
        &mut self,
        a: NationId,
        b: NationId,
        allied: bool,
        changes: &mut Changeset,
    ) -> Result<()> {
        if a == b {
            return Err(GameError::invalid_location("Forming an alliance", "with yourself"));
        }
        self.nation(a)?;
        self.nation(b)?;
        for (this, other) in [(a, b), (b, a)] {
            let nation = self.nation_mut(this)?;
            if allied {
                nation.allies.insert(other);
            } else {
                nation.allies.remove(&other);
            }
            changes.nation(nation);
        }
        tracing::info!(%a, %b, allied, "alliance changed");
        Ok(())
    }

    pub fn set_dossier(
        &mut self,
        nation_id: NationId,
        text: &str,
        changes: &mut Changeset,
    ) -> Result<()> {
        let nation = self.nation_mut(nation_id)?;
        nation.dossier = text.to_string();
        changes.nation(nation);
        Ok(())
    }

    /// Read-only summary of a nation for display
    pub fn status(&self, nation_id: NationId) -> Result<NationStatus> {
        let nation = self.nation(nation_id)?;
        let cities = nation
            .cities
            .values()
            .map(|city| CityStatus {
                name: city.name.clone(),
                coord: city.coord,
                tier: city.tier,
                stability: city.stability,
                popularity: city.popularity,
                inventory: city.inventory.items(),
            })
            .collect();
        let units = nation
            .military
            .values()
            .filter_map(|id| self.units.get(id))
            .map(|unit| UnitStatus {
                name: unit.name.clone(),
                kind: unit.kind,
                location: unit.location,
                strength: unit.strength,
                morale: unit.morale,
                movement_free: unit.movement_free,
            })
            .collect();
        Ok(NationStatus {
            name: nation.name.clone(),
            influence: nation.econ.influence,
            influence_cap: nation.econ.influence_cap,
            season: self.calendar.season(),
            links: nation.links.len(),
            allies: nation
                .allies
                .iter()
                .filter_map(|id| self.nations.get(id))
                .map(|ally| ally.name.clone())
                .collect(),
            cities,
            units,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CityStatus {
    pub name: String,
    pub coord: HexCoord,
    pub tier: u8,
    pub stability: f64,
    pub popularity: f64,
    pub inventory: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnitStatus {
    pub name: String,
    pub kind: UnitKind,
    pub location: HexCoord,
    pub strength: f64,
    pub morale: f64,
    pub movement_free: f64,
}

/// Display summary returned by [`World::status`]
#[derive(Debug, Clone, PartialEq)]
pub struct NationStatus {
    pub name: String,
    pub influence: u32,
    pub influence_cap: u32,
    pub season: Season,
    pub links: usize,
    pub allies: Vec<String>,
    pub cities: Vec<CityStatus>,
    pub units: Vec<UnitStatus>,
}

impl fmt::Display for NationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} ({})", self.name, self.season)?;
        writeln!(f, "  influence {}/{}", self.influence, self.influence_cap)?;
        if !self.allies.is_empty() {
            writeln!(f, "  allies: {}", self.allies.join(", "))?;
        }
        writeln!(f, "  links: {}", self.links)?;
        for city in &self.cities {
            writeln!(
                f,
                "  city {} at {} tier {} stability {:.0} popularity {:.0}",
                city.name, city.coord, city.tier, city.stability, city.popularity
            )?;
        }
        for unit in &self.units {
            writeln!(
                f,
                "  {} {} at {} strength {:.2} morale {:.2} movement {:.2}",
                unit.kind, unit.name, unit.location, unit.strength, unit.morale, unit.movement_free
            )?;
        }
        Ok(())
    }
}
