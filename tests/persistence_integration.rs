//! Persistence integration tests
//!
//! Drives the game service over a SQLite file, then reopens the file and
//! checks the restored world matches what was committed.

use tempfile::TempDir;

use nations::campaign::map::{Direction, HexCoord};
use nations::campaign::terrain::TerrainDataset;
use nations::city::building::{BuildingKind, StructureKind};
use nations::command::GameService;
use nations::core::calendar::Season;
use nations::core::config::GameConfig;
use nations::core::error::{GameError, ServiceError};
use nations::core::types::NationId;
use nations::persist::{SqliteStore, Store};

const AVALON: NationId = NationId(1);
const BRIGHT: NationId = NationId(2);

/// A 9x7 block of plains with a coastline along r = 3
fn dataset() -> TerrainDataset {
    let mut entries = Vec::new();
    for q in -2..=6 {
        for r in -3..=3 {
            let tag = if r == 3 { "plains_coast" } else { "plains" };
            entries.push(format!("\"({q}, {r})\": {{\"terrain\": \"{tag}\"}}"));
        }
    }
    TerrainDataset::load_from_json(&format!("{{{}}}", entries.join(","))).unwrap()
}

fn open(dir: &TempDir) -> GameService<SqliteStore> {
    let store = SqliteStore::open(dir.path().join("nations.db")).unwrap();
    GameService::open(store, dataset(), GameConfig::default()).unwrap()
}

#[tokio::test]
async fn test_world_survives_reopen() {
    let dir = TempDir::new().unwrap();
    {
        let service = open(&dir);
        assert_eq!(service.seed_tiles().await.unwrap(), 63);
        service
            .found_nation(AVALON, "Avalon", "Camelot", HexCoord::new(0, 0))
            .await
            .unwrap();
        service
            .found_nation(BRIGHT, "Bright", "Dawn", HexCoord::new(4, 0))
            .await
            .unwrap();
        service.set_alliance(AVALON, BRIGHT, true).await.unwrap();
        service.set_dossier(AVALON, "Round table").await.unwrap();
        service.train_army(AVALON, "Lancers", "Camelot").await.unwrap();
        service
            .move_unit(AVALON, "Lancers", Direction::South)
            .await
            .unwrap();
        service.force_tick().await.unwrap();
    }

    let service = open(&dir);
    let world = service.world().read().await;
    assert_eq!(world.calendar.season(), Season::Summer);
    assert_eq!(world.calendar.ticks(), 1);

    let avalon = world.nation(AVALON).unwrap();
    assert_eq!(avalon.name, "Avalon");
    assert_eq!(avalon.dossier, "Round table");
    assert!(avalon.allies.contains(&BRIGHT));
    assert_eq!(avalon.tiles.len(), 7);
    assert!(avalon.cities.contains_key("Camelot"));

    let lancers = world.unit_by_name(AVALON, "Lancers").unwrap();
    assert_eq!(lancers.location, HexCoord::new(0, 1));
    assert_eq!(lancers.movement_free, 3.0);

    let camelot = world.grid.get(HexCoord::new(0, 0)).unwrap();
    assert_eq!(camelot.city.as_deref(), Some("Camelot"));
    assert_eq!(camelot.owner, Some(AVALON));
}

#[tokio::test]
async fn test_rejected_command_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let service = open(&dir);
    service.seed_tiles().await.unwrap();
    service
        .found_nation(AVALON, "Avalon", "Camelot", HexCoord::new(0, 0))
        .await
        .unwrap();

    let err = service
        .build_structure(AVALON, "Camelot", BuildingKind::Temple, None)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ServiceError::Game(GameError::NotEnoughResources { .. })
    ));
    assert!(err.is_domain());

    let err = service
        .found_nation(BRIGHT, "avalon", "Dawn", HexCoord::new(4, 0))
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Game(GameError::NameInUse { .. })));
    drop(service);

    let snapshot = SqliteStore::open(dir.path().join("nations.db"))
        .unwrap()
        .load()
        .unwrap();
    assert_eq!(snapshot.nations.len(), 1);
    assert!(snapshot
        .tiles
        .iter()
        .all(|tile| tile.structures.is_empty()));
}

/// Structures come back from the tile rows
#[tokio::test]
async fn test_structures_restored() {
    let dir = TempDir::new().unwrap();
    {
        let service = open(&dir);
        service.seed_tiles().await.unwrap();
        service
            .found_nation(AVALON, "Avalon", "Camelot", HexCoord::new(0, 0))
            .await
            .unwrap();
        let mut world = service.world().write().await;
        let city = world
            .nation_mut(AVALON)
            .unwrap()
            .cities
            .get_mut("Camelot")
            .unwrap();
        city.inventory.add("stone");
        drop(world);
        // the temple commit writes the city row with its inventory spent
        service
            .build_structure(AVALON, "Camelot", BuildingKind::Temple, None)
            .await
            .unwrap();
    }

    let service = open(&dir);
    let world = service.world().read().await;
    let camelot = &world.nation(AVALON).unwrap().cities["Camelot"];
    assert!(camelot.inventory.is_empty());
    assert_eq!(camelot.popularity, 77.0);
    assert!(camelot.has_structure(&world.grid, StructureKind::Building(BuildingKind::Temple)));
    assert_eq!(world.nation(AVALON).unwrap().econ.influence, 1);
}
