//! Persistence - typed rows, changesets and world restore
//!
//! Mutating operations record every row they touch in a [`Changeset`]; a
//! [`Store`] applies a changeset atomically. Loading returns a [`Snapshot`]
//! of all rows which [`World::restore`] turns back into a live world.

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::aggregate::economy::Econ;
use crate::aggregate::nation::Nation;
use crate::aggregate::world::World;
use crate::campaign::map::{HexCoord, Tile, TileGrid};
use crate::campaign::terrain::{Terrain, TerrainDataset};
use crate::campaign::units::{Unit, UnitKind};
use crate::city::building::Structure;
use crate::city::link::{Link, LinkKind};
use crate::city::settlement::City;
use crate::city::stockpile::Stockpile;
use crate::core::calendar::{Calendar, Season};
use crate::core::config::GameConfig;
use crate::core::error::StoreError;
use crate::core::types::{Color, LinkId, NationId, UnitId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NationRecord {
    pub id: u64,
    pub name: String,
    pub dossier: String,
    pub color: u32,
    pub allies: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EconomyRecord {
    pub nation_id: u64,
    pub influence: u32,
    pub influence_cap: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileRecord {
    pub x: i32,
    pub y: i32,
    pub terrain: Terrain,
    pub owner: Option<u64>,
    pub owned: bool,
    pub structures: Vec<Structure>,
}

/// City row; `structures` holds the buildings rooted at this city
///
/// Buildings are gathered from the whole metroarea, so ones placed while the
/// city was larger survive a later drop in tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityRecord {
    pub x: i32,
    pub y: i32,
    pub name: String,
    pub influence: u32,
    pub tier: u8,
    pub stability: f64,
    pub popularity: f64,
    pub inventory: Vec<String>,
    pub owner: u64,
    pub structures: Vec<Structure>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitRecord {
    pub id: u64,
    pub name: String,
    pub kind: UnitKind,
    pub home: String,
    pub x: i32,
    pub y: i32,
    pub strength: f64,
    pub morale: f64,
    pub experience: u32,
    pub owner: u64,
    pub movement_free: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub id: u64,
    pub kind: LinkKind,
    pub origin: String,
    pub destination: String,
    pub path: Vec<HexCoord>,
    pub owner: u64,
}

/// Position of the world RNG, enough to resume its stream exactly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RngState {
    pub seed: [u8; 32],
    pub stream: u64,
    pub word_pos: u128,
}

impl RngState {
    pub fn capture(rng: &ChaCha8Rng) -> Self {
        Self {
            seed: rng.get_seed(),
            stream: rng.get_stream(),
            word_pos: rng.get_word_pos(),
        }
    }

    pub fn resume(&self) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::from_seed(self.seed);
        rng.set_stream(self.stream);
        rng.set_word_pos(self.word_pos);
        rng
    }
}

/// Calendar and RNG row; `rng` is absent in rows written without one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaRecord {
    pub season: u8,
    pub ticks: u64,
    pub rng: Option<RngState>,
}

impl From<&Nation> for NationRecord {
    fn from(nation: &Nation) -> Self {
        Self {
            id: nation.id.0,
            name: nation.name.clone(),
            dossier: nation.dossier.clone(),
            color: nation.color.0,
            allies: nation.allies.iter().map(|id| id.0).collect(),
        }
    }
}

impl From<&Econ> for EconomyRecord {
    fn from(econ: &Econ) -> Self {
        Self {
            nation_id: econ.nation.0,
            influence: econ.influence,
            influence_cap: econ.influence_cap,
        }
    }
}

impl From<&Tile> for TileRecord {
    fn from(tile: &Tile) -> Self {
        Self {
            x: tile.coord.q,
            y: tile.coord.r,
            terrain: tile.terrain,
            owner: tile.owner.map(|id| id.0),
            owned: tile.owned,
            structures: tile.structures.clone(),
        }
    }
}

impl CityRecord {
    pub fn new(city: &City, grid: &TileGrid) -> Self {
        let structures = grid
            .metroarea(city.coord)
            .into_iter()
            .filter_map(|coord| grid.find(coord))
            .flat_map(|tile| tile.structures.iter())
            .filter(|s| s.kind.is_building() && s.root_city == city.name && s.builder == city.owner)
            .cloned()
            .collect();
        Self {
            x: city.coord.q,
            y: city.coord.r,
            name: city.name.clone(),
            influence: city.influence,
            tier: city.tier,
            stability: city.stability,
            popularity: city.popularity,
            inventory: city.inventory.items(),
            owner: city.owner.0,
            structures,
        }
    }

    pub fn coord(&self) -> HexCoord {
        HexCoord::new(self.x, self.y)
    }
}

impl From<&Unit> for UnitRecord {
    fn from(unit: &Unit) -> Self {
        Self {
            id: unit.id.0,
            name: unit.name.clone(),
            kind: unit.kind,
            home: unit.home.clone(),
            x: unit.location.q,
            y: unit.location.r,
            strength: unit.strength,
            morale: unit.morale,
            experience: unit.experience,
            owner: unit.owner.0,
            movement_free: unit.movement_free,
        }
    }
}

impl From<&Link> for LinkRecord {
    fn from(link: &Link) -> Self {
        Self {
            id: link.id.0,
            kind: link.kind,
            origin: link.origin.clone(),
            destination: link.destination.clone(),
            path: link.path.clone(),
            owner: link.owner.0,
        }
    }
}

impl MetaRecord {
    pub fn new(calendar: &Calendar, rng: &ChaCha8Rng) -> Self {
        Self {
            season: calendar.season().index(),
            ticks: calendar.ticks(),
            rng: Some(RngState::capture(rng)),
        }
    }
}

/// One upsert, keyed per table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Record {
    Nation(NationRecord),
    Economy(EconomyRecord),
    Tile(TileRecord),
    City(CityRecord),
    Unit(UnitRecord),
    Link(LinkRecord),
    Meta(MetaRecord),
}

/// Rows touched by one operation, in the order they were touched
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Changeset {
    records: Vec<Record>,
}

impl Changeset {
    pub fn new() -> Self {
        Self::default()
    }

    /// Nation row plus its economy row
    pub fn nation(&mut self, nation: &Nation) {
        self.records.push(Record::Nation(nation.into()));
        self.economy(&nation.econ);
    }

    pub fn economy(&mut self, econ: &Econ) {
        self.records.push(Record::Economy(econ.into()));
    }

    pub fn tile(&mut self, tile: &Tile) {
        self.records.push(Record::Tile(tile.into()));
    }

    pub fn city(&mut self, city: &City, grid: &TileGrid) {
        self.records.push(Record::City(CityRecord::new(city, grid)));
    }

    pub fn unit(&mut self, unit: &Unit) {
        self.records.push(Record::Unit(unit.into()));
    }

    pub fn link(&mut self, link: &Link) {
        self.records.push(Record::Link(link.into()));
    }

    /// Calendar plus the current RNG position; record after every draw
    pub fn meta(&mut self, calendar: &Calendar, rng: &ChaCha8Rng) {
        self.records.push(Record::Meta(MetaRecord::new(calendar, rng)));
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Every stored row
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub nations: Vec<NationRecord>,
    pub economies: Vec<EconomyRecord>,
    pub tiles: Vec<TileRecord>,
    pub cities: Vec<CityRecord>,
    pub units: Vec<UnitRecord>,
    pub links: Vec<LinkRecord>,
    pub meta: Option<MetaRecord>,
}

/// Durable storage for world rows
pub trait Store: Send {
    /// Apply every record of `changes`, all or nothing
    fn commit(&mut self, changes: &Changeset) -> Result<(), StoreError>;

    fn load(&self) -> Result<Snapshot, StoreError>;
}

fn corrupt(table: &'static str, detail: impl Into<String>) -> StoreError {
    StoreError::Corrupt {
        table,
        detail: detail.into(),
    }
}

impl World {
    /// Rebuild a world from stored rows over the static terrain dataset
    ///
    /// With `prefer_static_terrain` the stored tile rows are ignored:
    /// ownership is re-derived from city areas, buildings come from city
    /// rows and link structures are re-placed along link paths. Otherwise
    /// the tile rows are authoritative for terrain, ownership and structures.
    pub fn restore(
        snapshot: Snapshot,
        dataset: &TerrainDataset,
        config: GameConfig,
    ) -> Result<World, StoreError> {
        let prefer_static = config.world.prefer_static_terrain;
        let mut world = World::new(dataset.seed_grid(), config);

        if !prefer_static {
            for record in &snapshot.tiles {
                let coord = HexCoord::new(record.x, record.y);
                let mut tile = Tile::new(coord, record.terrain);
                tile.owner = record.owner.map(NationId);
                tile.owned = record.owned;
                tile.structures = record.structures.clone();
                world
                    .grid
                    .set(tile)
                    .map_err(|err| corrupt("tiles", err.to_string()))?;
            }
        }

        for record in snapshot.nations {
            let id = NationId(record.id);
            let mut nation = Nation::new(id, record.name);
            nation.dossier = record.dossier;
            nation.color = Color(record.color);
            nation.allies = record.allies.into_iter().map(NationId).collect();
            world.nations.insert(id, nation);
        }

        for record in snapshot.economies {
            let id = NationId(record.nation_id);
            let nation = world
                .nations
                .get_mut(&id)
                .ok_or_else(|| corrupt("economies", format!("no nation {id}")))?;
            nation.econ = Econ::new(id, record.influence, record.influence_cap);
        }

        for record in snapshot.cities {
            let owner = NationId(record.owner);
            let coord = record.coord();
            let nation = world
                .nations
                .get_mut(&owner)
                .ok_or_else(|| corrupt("cities", format!("{} has no nation {owner}", record.name)))?;
            let tile = world
                .grid
                .get_mut(coord)
                .map_err(|err| corrupt("cities", err.to_string()))?;
            tile.city = Some(record.name.clone());

            if prefer_static {
                tile.claim(owner);
                for area_coord in world.grid.area(coord) {
                    if let Ok(tile) = world.grid.get_mut(area_coord) {
                        if tile.owner.is_none() {
                            tile.claim(owner);
                        }
                    }
                }
                for structure in &record.structures {
                    if let Ok(tile) = world.grid.get_mut(structure.location) {
                        tile.structures.push(structure.clone());
                    }
                }
            }

            let mut city = City::new(record.name.clone(), coord, owner)
                .with_inventory(Stockpile::from(record.inventory));
            city.influence = record.influence;
            city.stability = record.stability;
            city.popularity = record.popularity;
            nation.cities.insert(record.name, city);
        }

        let mut max_unit = 0;
        for record in snapshot.units {
            let owner = NationId(record.owner);
            let nation = world
                .nations
                .get_mut(&owner)
                .ok_or_else(|| corrupt("units", format!("{} has no nation {owner}", record.name)))?;
            let id = UnitId(record.id);
            nation.military.insert(record.name.clone(), id);
            max_unit = max_unit.max(record.id);
            world.units.insert(
                id,
                Unit {
                    id,
                    name: record.name,
                    kind: record.kind,
                    home: record.home,
                    owner,
                    location: HexCoord::new(record.x, record.y),
                    strength: record.strength,
                    morale: record.morale,
                    experience: record.experience,
                    movement_free: record.movement_free,
                },
            );
        }

        let mut max_link = 0;
        for record in snapshot.links {
            let owner = NationId(record.owner);
            let nation = world
                .nations
                .get_mut(&owner)
                .ok_or_else(|| corrupt("links", format!("no nation {owner}")))?;
            let link = Link {
                id: LinkId(record.id),
                kind: record.kind,
                origin: record.origin,
                destination: record.destination,
                path: record.path,
                owner,
            };
            max_link = max_link.max(record.id);
            if prefer_static {
                let endpoint = |name: &str| {
                    nation
                        .cities
                        .get(name)
                        .map(|city| city.coord)
                        .ok_or_else(|| corrupt("links", format!("{} has no city {name}", link.id)))
                };
                let origin = endpoint(&link.origin)?;
                let destination = endpoint(&link.destination)?;
                link.place_structures(&mut world.grid, origin, destination)
                    .map_err(|err| corrupt("links", err.to_string()))?;
            }
            nation.links.push(link);
        }

        // nation tile lists follow grid ownership
        let owned: BTreeSet<(NationId, HexCoord)> = world
            .grid
            .iter()
            .filter_map(|tile| tile.owner.map(|owner| (owner, tile.coord)))
            .collect();
        for (owner, coord) in owned {
            if let Some(nation) = world.nations.get_mut(&owner) {
                nation.claim(coord);
            }
        }

        if let Some(meta) = snapshot.meta {
            world.calendar = Calendar::new(Season::from_index(meta.season), meta.ticks);
            if let Some(rng) = meta.rng {
                world.rng = rng.resume();
            }
        }
        world.set_id_counters(max_unit, max_link);

        tracing::info!(
            nations = world.nations.len(),
            units = world.units.len(),
            tiles = world.grid.len(),
            prefer_static,
            "world restored"
        );
        Ok(world)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::run_tick;
    use crate::campaign::map::Direction;
    use crate::campaign::terrain::LandBiome;
    use crate::city::building::{BuildingKind, StructureKind};
    use rand::Rng;

    const AVALON: NationId = NationId(1);

    fn dataset() -> TerrainDataset {
        let mut dataset = TerrainDataset::new();
        for q in -3..=6 {
            for r in -3..=3 {
                dataset.insert(HexCoord::new(q, r), Terrain::land(LandBiome::Plains));
            }
        }
        dataset
    }

    fn seeded() -> GameConfig {
        let mut config = GameConfig::default();
        config.world.seed = Some(5);
        config
    }

    /// Avalon with its capital Camelot at (0, 0)
    fn avalon(config: &GameConfig, changes: &mut Changeset) -> World {
        let mut world = World::new(dataset().seed_grid(), config.clone());
        world
            .found_nation(AVALON, "Avalon", "Camelot", HexCoord::new(0, 0), changes)
            .unwrap();
        world
    }

    fn reload(world_changes: &Changeset, config: GameConfig) -> World {
        let mut store = MemoryStore::new();
        store.commit(world_changes).unwrap();
        World::restore(store.load().unwrap(), &dataset(), config).unwrap()
    }

    fn camelot(world: &mut World) -> &mut City {
        world
            .nation_mut(AVALON)
            .unwrap()
            .cities
            .get_mut("Camelot")
            .unwrap()
    }

    #[test]
    fn test_changeset_records_nation_with_economy() {
        let mut changes = Changeset::new();
        let nation = Nation::new(NationId(3), "Avalon");
        changes.nation(&nation);
        assert_eq!(changes.len(), 2);
        assert!(matches!(changes.records()[1], Record::Economy(_)));
    }

    #[test]
    fn test_restore_rebuilds_world() {
        let mut config = GameConfig::default();
        config.world.seed = Some(5);
        let mut world = World::new(dataset().seed_grid(), config.clone());
        let mut changes = Changeset::new();
        let avalon = NationId(1);
        world
            .found_nation(avalon, "Avalon", "Camelot", HexCoord::new(0, 0), &mut changes)
            .unwrap();
        world
            .found_city(avalon, "Lyonesse", HexCoord::new(4, 0), &mut changes)
            .unwrap();
        world
            .nation_mut(avalon)
            .unwrap()
            .cities
            .get_mut("Camelot")
            .unwrap()
            .inventory
            .add("stone");
        world
            .build_structure(avalon, "Camelot", BuildingKind::Temple, None, &mut changes)
            .unwrap();
        world.train_army(avalon, "Guard", "Camelot", &mut changes).unwrap();

        let mut store = MemoryStore::new();
        store.commit(&changes).unwrap();
        let snapshot = store.load().unwrap();
        let restored = World::restore(snapshot, &dataset(), config).unwrap();

        let nation = restored.nation(avalon).unwrap();
        let original = world.nation(avalon).unwrap();
        assert_eq!(nation.econ, original.econ);
        assert_eq!(nation.cities, original.cities);
        assert_eq!(nation.military, original.military);
        assert_eq!(nation.color, original.color);
        let mut tiles = nation.tiles.clone();
        let mut expected = original.tiles.clone();
        tiles.sort();
        expected.sort();
        assert_eq!(tiles, expected);

        let capital = restored.grid.get(HexCoord::new(0, 0)).unwrap();
        assert_eq!(capital.city.as_deref(), Some("Camelot"));
        assert!(capital.has_structure(StructureKind::Building(BuildingKind::Temple)));
        assert_eq!(restored.units.len(), 1);
    }

    #[test]
    fn test_restore_rejects_orphan_rows() {
        let snapshot = Snapshot {
            economies: vec![EconomyRecord {
                nation_id: 9,
                influence: 1,
                influence_cap: 1,
            }],
            ..Snapshot::default()
        };
        let err = World::restore(snapshot, &dataset(), GameConfig::default())
            .err()
            .unwrap();
        assert!(matches!(err, StoreError::Corrupt { table: "economies", .. }));
    }

    // ========================================================================
    // ROUND TRIPS
    // ========================================================================

    /// Spending materials lowers the tier at once and a reload agrees
    #[test]
    fn test_tier_follows_spent_materials() {
        let config = seeded();
        let mut changes = Changeset::new();
        let mut world = avalon(&config, &mut changes);
        camelot(&mut world).inventory =
            Stockpile::from_items(["lumber", "food", "food", "fuel", "stone"]);
        run_tick(&mut world, &mut changes);
        assert_eq!(camelot(&mut world).tier, 2);

        world
            .build_structure(AVALON, "Camelot", BuildingKind::Smeltery, None, &mut changes)
            .unwrap();
        let live = camelot(&mut world);
        assert_eq!(live.tier, 1);
        assert_eq!(live.tier, live.calculate_tier());

        let mut restored = reload(&changes, config);
        assert_eq!(camelot(&mut restored).tier, 1);
        assert!(restored
            .grid
            .get(HexCoord::new(0, 0))
            .unwrap()
            .has_structure(StructureKind::Building(BuildingKind::Smeltery)));
    }

    /// A fort raised in the metroarea outlives the city shrinking back
    #[test]
    fn test_metro_fort_survives_tier_drop() {
        let config = seeded();
        let mut changes = Changeset::new();
        let mut world = avalon(&config, &mut changes);
        world.nation_mut(AVALON).unwrap().econ.influence = 10;
        let city = camelot(&mut world);
        city.inventory = Stockpile::from_items([
            "lumber", "lumber", "lumber", "lumber", "food", "food", "food", "food", "food",
            "fuel", "fuel", "fuel", "stone", "luxurygoods_silk", "luxurygoods_salt",
        ]);
        assert_eq!(city.refresh_tier(), 4);

        let fort = HexCoord::new(2, 0);
        world
            .build_structure(AVALON, "Camelot", BuildingKind::Fort, Some(fort), &mut changes)
            .unwrap();
        assert_eq!(camelot(&mut world).tier, 4);

        camelot(&mut world).inventory.remove("food");
        run_tick(&mut world, &mut changes);
        assert_eq!(camelot(&mut world).tier, 3);
        let fort_kind = StructureKind::Building(BuildingKind::Fort);
        assert!(world.grid.get(fort).unwrap().has_structure(fort_kind));

        let restored = reload(&changes, config);
        assert!(restored.grid.get(fort).unwrap().has_structure(fort_kind));
    }

    /// Battle rolls pick up where the stream left off instead of replaying it
    #[test]
    fn test_restore_resumes_rng() {
        let config = seeded();
        let mut changes = Changeset::new();
        let mut world = avalon(&config, &mut changes);
        let bright = NationId(2);
        world
            .found_nation(bright, "Bright", "Dawn", HexCoord::new(5, 0), &mut changes)
            .unwrap();
        world.train_army(AVALON, "Lancers", "Camelot", &mut changes).unwrap();
        let ravens = world.train_army(bright, "Ravens", "Dawn", &mut changes).unwrap();
        world.units.get_mut(&ravens).unwrap().location = HexCoord::new(1, 0);
        let report = world
            .move_unit(AVALON, "Lancers", Direction::SouthEast, &mut changes)
            .unwrap();
        assert!(report.battle.is_some());

        let mut restored = reload(&changes, config.clone());
        let fresh = World::new(dataset().seed_grid(), config);
        assert_eq!(RngState::capture(&restored.rng), RngState::capture(&world.rng));
        assert_ne!(RngState::capture(&restored.rng), RngState::capture(&fresh.rng));
        assert_eq!(restored.rng.gen::<f64>(), world.rng.gen::<f64>());
    }
}
