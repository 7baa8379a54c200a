//! City, structure and link integration tests

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use nations::aggregate::economy::calculate_cap;
use nations::aggregate::World;
use nations::campaign::map::{HexCoord, Tile, TileGrid};
use nations::campaign::terrain::{LandBiome, Terrain};
use nations::city::building::{BuildingKind, StructureKind};
use nations::city::link::LinkKind;
use nations::city::settlement::calculate_tier;
use nations::city::stockpile::Stockpile;
use nations::core::config::{CapPolicy, GameConfig};
use nations::core::error::GameError;
use nations::core::types::NationId;
use nations::persist::Changeset;

const AVALON: NationId = NationId(1);

fn plains(min: i32, max: i32) -> TileGrid {
    let mut grid = TileGrid::new();
    for q in min..=max {
        for r in min..=max {
            grid.set(Tile::new(HexCoord::new(q, r), Terrain::land(LandBiome::Plains)))
                .unwrap();
        }
    }
    grid
}

/// Avalon with its capital Camelot at (0, 0)
fn avalon() -> World {
    let mut world = World::with_rng(plains(-2, 5), GameConfig::default(), ChaCha8Rng::seed_from_u64(11));
    world
        .found_nation(AVALON, "Avalon", "Camelot", HexCoord::new(0, 0), &mut Changeset::new())
        .unwrap();
    world
}

fn stock(world: &mut World, city: &str, items: &[&str]) {
    let city = world
        .nation_mut(AVALON)
        .unwrap()
        .cities
        .get_mut(city)
        .unwrap();
    city.inventory = Stockpile::from_items(items.iter().copied());
    city.refresh_tier();
}

// ============================================================================
// STRUCTURES
// ============================================================================

/// A temple spends stone and influence and lifts the city's mood
#[test]
fn test_temple_build() {
    let mut world = avalon();
    stock(&mut world, "Camelot", &["stone"]);
    let mut changes = Changeset::new();

    let built = world
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
        .unwrap();

    assert_eq!(built.location, HexCoord::new(0, 0));
    assert_eq!(built.root_city, "Camelot");
    let nation = world.nation(AVALON).unwrap();
    let camelot = &nation.cities["Camelot"];
    assert_eq!(nation.econ.influence, 1);
    assert!(camelot.inventory.is_empty());
    assert_eq!(camelot.popularity, 77.0);
    assert_eq!(camelot.stability, 89.0);
    assert!(camelot.has_structure(&world.grid, StructureKind::Building(BuildingKind::Temple)));
    assert!(!changes.is_empty());
}

/// Failed validation leaves every part of the world untouched
#[test]
fn test_missing_materials_changes_nothing() {
    let mut world = avalon();
    let mut changes = Changeset::new();

    let err = world
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
        .unwrap_err();

    assert!(matches!(err, GameError::NotEnoughResources { .. }));
    assert_eq!(world.nation(AVALON).unwrap().econ.influence, 2);
    assert!(world.grid.get(HexCoord::new(0, 0)).unwrap().structures.is_empty());
    assert!(changes.is_empty());
}

#[test]
fn test_grand_temple_replaces_temple_once() {
    let mut world = avalon();
    world.nation_mut(AVALON).unwrap().econ.influence = 10;
    // tier 2 leaves room for three buildings
    stock(
        &mut world,
        "Camelot",
        &["stone", "stone", "stone", "stone", "lumber", "food", "food", "fuel"],
    );
    let mut changes = Changeset::new();

    world
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
        .unwrap();
    world
        .build_structure(AVALON, "Camelot", BuildingKind::GrandTemple, None, &mut changes)
        .unwrap();
    let tile = world.grid.get(HexCoord::new(0, 0)).unwrap();
    assert!(!tile.has_structure(StructureKind::Building(BuildingKind::Temple)));
    assert!(tile.has_structure(StructureKind::Building(BuildingKind::GrandTemple)));

    world
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
        .unwrap();
    let err = world
        .build_structure(AVALON, "Camelot", BuildingKind::GrandTemple, None, &mut changes)
        .unwrap_err();
    assert!(matches!(err, GameError::TooManyUniqueStructures(_)));
    // the temple survives the refused upgrade
    let tile = world.grid.get(HexCoord::new(0, 0)).unwrap();
    assert!(tile.has_structure(StructureKind::Building(BuildingKind::Temple)));
}

/// Tier 0 cities hold two buildings
#[test]
fn test_slot_limit() {
    let mut world = avalon();
    world.nation_mut(AVALON).unwrap().econ.influence = 10;
    stock(&mut world, "Camelot", &["stone", "stone", "stone"]);
    let mut changes = Changeset::new();

    for _ in 0..2 {
        world
            .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
            .unwrap();
    }
    let err = world
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None, &mut changes)
        .unwrap_err();
    assert_eq!(err, GameError::TooManyStructures(HexCoord::new(0, 0)));
}

#[test]
fn test_fort_outside_developed_area() {
    let mut world = avalon();
    stock(&mut world, "Camelot", &["stone", "lumber"]);
    let mut changes = Changeset::new();

    let err = world
        .build_structure(
            AVALON,
            "Camelot",
            BuildingKind::Fort,
            Some(HexCoord::new(3, 0)),
            &mut changes,
        )
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidLocation { .. }));

    let fort = world
        .build_structure(
            AVALON,
            "Camelot",
            BuildingKind::Fort,
            Some(HexCoord::new(1, 0)),
            &mut changes,
        )
        .unwrap();
    assert_eq!(fort.location, HexCoord::new(1, 0));
}

// ============================================================================
// LINKS
// ============================================================================

/// Stone comes from whichever endpoint still has it
#[test]
fn test_stone_road_draws_from_destination() {
    let mut world = avalon();
    let mut changes = Changeset::new();
    world
        .found_city(AVALON, "Lyonesse", HexCoord::new(3, 0), &mut changes)
        .unwrap();
    stock(&mut world, "Lyonesse", &["stone"]);

    let path = vec![HexCoord::new(1, 0), HexCoord::new(2, 0), HexCoord::new(3, 0)];
    let link = world
        .build_link(AVALON, LinkKind::StoneRoad, "Camelot", "Lyonesse", path, &mut changes)
        .unwrap();

    assert_eq!(link.origin, "Camelot");
    assert_eq!(link.destination, "Lyonesse");
    let nation = world.nation(AVALON).unwrap();
    assert_eq!(nation.econ.influence, 0);
    assert!(nation.cities["Lyonesse"].inventory.is_empty());
    assert_eq!(nation.links.len(), 1);

    let near_origin = world.grid.get(HexCoord::new(1, 0)).unwrap();
    assert_eq!(near_origin.structures[0].root_city, "Camelot");
    let near_destination = world.grid.get(HexCoord::new(2, 0)).unwrap();
    assert_eq!(near_destination.structures[0].root_city, "Lyonesse");

    // base 1, two tier 0 cities, one road
    assert_eq!(calculate_cap(nation, &world.grid, CapPolicy::Accumulated), 4);
}

#[test]
fn test_link_must_reach_destination() {
    let mut world = avalon();
    let mut changes = Changeset::new();
    world
        .found_city(AVALON, "Lyonesse", HexCoord::new(3, 0), &mut changes)
        .unwrap();
    stock(&mut world, "Lyonesse", &["stone"]);

    let err = world
        .build_link(
            AVALON,
            LinkKind::StoneRoad,
            "Camelot",
            "Lyonesse",
            vec![HexCoord::new(1, 0), HexCoord::new(2, 0)],
            &mut changes,
        )
        .unwrap_err();
    assert!(matches!(err, GameError::InvalidLocation { .. }));
    let nation = world.nation(AVALON).unwrap();
    assert!(nation.links.is_empty());
    assert_eq!(nation.econ.influence, 2);
    assert_eq!(nation.cities["Lyonesse"].inventory.total(), 1);
    assert!(world.grid.get(HexCoord::new(1, 0)).unwrap().structures.is_empty());
}

// ============================================================================
// TIERS
// ============================================================================

proptest! {
    /// Adding an item never lowers a city's tier
    #[test]
    fn prop_tier_monotonic(
        items in prop::collection::vec(
            prop::sample::select(vec!["lumber", "food", "fuel", "food_grain", "luxurygoods_silk", "luxurygoods_salt"]),
            0..20,
        ),
        extra in prop::sample::select(vec!["lumber", "food", "fuel", "luxurygoods_spices", "stone"]),
    ) {
        let mut inventory = Stockpile::from_items(items.iter().copied());
        let before = calculate_tier(&inventory);
        inventory.add(extra);
        prop_assert!(calculate_tier(&inventory) >= before);
        prop_assert!(calculate_tier(&inventory) <= 4);
    }
}
