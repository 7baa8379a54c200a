//! SQLite-backed store
//!
//! One table per record kind. List-valued columns (structures, inventory,
//! paths, allies) are stored as JSON text. Each changeset commits inside a
//! single transaction.

use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};

use crate::campaign::map::HexCoord;
use crate::campaign::terrain::Terrain;
use crate::campaign::units::UnitKind;
use crate::city::link::LinkKind;
use crate::core::error::StoreError;
use crate::persist::{
    Changeset, CityRecord, EconomyRecord, LinkRecord, MetaRecord, NationRecord, Record, Snapshot,
    Store, TileRecord, UnitRecord,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS nations (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL UNIQUE,
  dossier TEXT NOT NULL,
  color INTEGER NOT NULL,
  allies TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS economies (
  nation_id INTEGER PRIMARY KEY,
  influence INTEGER NOT NULL,
  influence_cap INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS tiles (
  x INTEGER NOT NULL,
  y INTEGER NOT NULL,
  terrain TEXT NOT NULL,
  owner INTEGER,
  owned INTEGER NOT NULL,
  structures TEXT NOT NULL,
  PRIMARY KEY (x, y)
);

CREATE TABLE IF NOT EXISTS cities (
  x INTEGER NOT NULL,
  y INTEGER NOT NULL,
  name TEXT NOT NULL,
  influence INTEGER NOT NULL,
  tier INTEGER NOT NULL,
  stability REAL NOT NULL,
  popularity REAL NOT NULL,
  inventory TEXT NOT NULL,
  owner INTEGER NOT NULL,
  structures TEXT NOT NULL,
  PRIMARY KEY (x, y)
);

CREATE TABLE IF NOT EXISTS units (
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  type TEXT NOT NULL,
  home TEXT NOT NULL,
  x INTEGER NOT NULL,
  y INTEGER NOT NULL,
  strength REAL NOT NULL,
  morale REAL NOT NULL,
  exp INTEGER NOT NULL,
  owner INTEGER NOT NULL,
  movement_free REAL NOT NULL
);

CREATE TABLE IF NOT EXISTS links (
  id INTEGER PRIMARY KEY,
  linktype TEXT NOT NULL,
  origin TEXT NOT NULL,
  destination TEXT NOT NULL,
  path TEXT NOT NULL,
  owner INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS world_meta (
  id INTEGER PRIMARY KEY CHECK (id = 1),
  season INTEGER NOT NULL,
  ticks INTEGER NOT NULL,
  rng TEXT
);
"#;

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    fn load_nations(&self) -> Result<Vec<NationRecord>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT id, name, dossier, color, allies FROM nations ORDER BY id")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, i64>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut nations = Vec::new();
        for row in rows {
            let (id, name, dossier, color, allies) = row?;
            nations.push(NationRecord {
                id: id as u64,
                name,
                dossier,
                color: color as u32,
                allies: serde_json::from_str(&allies)?,
            });
        }
        Ok(nations)
    }

    fn load_economies(&self) -> Result<Vec<EconomyRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT nation_id, influence, influence_cap FROM economies ORDER BY nation_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(EconomyRecord {
                nation_id: row.get::<_, i64>(0)? as u64,
                influence: row.get(1)?,
                influence_cap: row.get(2)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    fn load_tiles(&self) -> Result<Vec<TileRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT x, y, terrain, owner, owned, structures FROM tiles ORDER BY x, y",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i32>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<i64>>(3)?,
                row.get::<_, bool>(4)?,
                row.get::<_, String>(5)?,
            ))
        })?;
        let mut tiles = Vec::new();
        for row in rows {
            let (x, y, terrain, owner, owned, structures) = row?;
            let terrain = Terrain::from_tag(&terrain).map_err(|err| StoreError::Corrupt {
                table: "tiles",
                detail: format!("{}: {err}", HexCoord::new(x, y)),
            })?;
            tiles.push(TileRecord {
                x,
                y,
                terrain,
                owner: owner.map(|id| id as u64),
                owned,
                structures: serde_json::from_str(&structures)?,
            });
        }
        Ok(tiles)
    }

    fn load_cities(&self) -> Result<Vec<CityRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT x, y, name, influence, tier, stability, popularity, inventory, owner, structures
             FROM cities ORDER BY owner, name",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                (row.get::<_, i32>(0)?, row.get::<_, i32>(1)?),
                row.get::<_, String>(2)?,
                row.get::<_, u32>(3)?,
                row.get::<_, u8>(4)?,
                (row.get::<_, f64>(5)?, row.get::<_, f64>(6)?),
                row.get::<_, String>(7)?,
                row.get::<_, i64>(8)?,
                row.get::<_, String>(9)?,
            ))
        })?;
        let mut cities = Vec::new();
        for row in rows {
            let ((x, y), name, influence, tier, (stability, popularity), inventory, owner, structures) =
                row?;
            cities.push(CityRecord {
                x,
                y,
                name,
                influence,
                tier,
                stability,
                popularity,
                inventory: serde_json::from_str(&inventory)?,
                owner: owner as u64,
                structures: serde_json::from_str(&structures)?,
            });
        }
        Ok(cities)
    }

    fn load_units(&self) -> Result<Vec<UnitRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, type, home, x, y, strength, morale, exp, owner, movement_free
             FROM units ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                (row.get::<_, i32>(4)?, row.get::<_, i32>(5)?),
                (row.get::<_, f64>(6)?, row.get::<_, f64>(7)?),
                row.get::<_, u32>(8)?,
                row.get::<_, i64>(9)?,
                row.get::<_, f64>(10)?,
            ))
        })?;
        let mut units = Vec::new();
        for row in rows {
            let (id, name, kind, home, (x, y), (strength, morale), experience, owner, movement_free) =
                row?;
            let kind = kind.parse::<UnitKind>().map_err(|detail| StoreError::Corrupt {
                table: "units",
                detail,
            })?;
            units.push(UnitRecord {
                id: id as u64,
                name,
                kind,
                home,
                x,
                y,
                strength,
                morale,
                experience,
                owner: owner as u64,
                movement_free,
            });
        }
        Ok(units)
    }

    fn load_links(&self) -> Result<Vec<LinkRecord>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, linktype, origin, destination, path, owner FROM links ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
            ))
        })?;
        let mut links = Vec::new();
        for row in rows {
            let (id, kind, origin, destination, path, owner) = row?;
            let kind = kind.parse::<LinkKind>().map_err(|detail| StoreError::Corrupt {
                table: "links",
                detail,
            })?;
            links.push(LinkRecord {
                id: id as u64,
                kind,
                origin,
                destination,
                path: serde_json::from_str(&path)?,
                owner: owner as u64,
            });
        }
        Ok(links)
    }

    fn load_meta(&self) -> Result<Option<MetaRecord>, StoreError> {
        let row = self
            .conn
            .query_row("SELECT season, ticks, rng FROM world_meta WHERE id = 1", [], |row| {
                Ok((
                    row.get::<_, u8>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, Option<String>>(2)?,
                ))
            })
            .optional()?;
        let Some((season, ticks, rng)) = row else {
            return Ok(None);
        };
        Ok(Some(MetaRecord {
            season,
            ticks: ticks as u64,
            rng: rng.map(|json| serde_json::from_str(&json)).transpose()?,
        }))
    }
}

impl Store for SqliteStore {
    fn commit(&mut self, changes: &Changeset) -> Result<(), StoreError> {
        let tx = self.conn.transaction()?;
        for record in changes.records() {
            match record {
                Record::Nation(row) => {
                    tx.execute(
                        "INSERT INTO nations (id, name, dossier, color, allies)
                         VALUES (?1, ?2, ?3, ?4, ?5)
                         ON CONFLICT(id) DO UPDATE SET name = excluded.name,
                           dossier = excluded.dossier, color = excluded.color,
                           allies = excluded.allies",
                        params![
                            row.id as i64,
                            row.name,
                            row.dossier,
                            row.color as i64,
                            serde_json::to_string(&row.allies)?
                        ],
                    )?;
                }
                Record::Economy(row) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO economies (nation_id, influence, influence_cap)
                         VALUES (?1, ?2, ?3)",
                        params![row.nation_id as i64, row.influence, row.influence_cap],
                    )?;
                }
                Record::Tile(row) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO tiles (x, y, terrain, owner, owned, structures)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            row.x,
                            row.y,
                            row.terrain.tag(),
                            row.owner.map(|id| id as i64),
                            row.owned,
                            serde_json::to_string(&row.structures)?
                        ],
                    )?;
                }
                Record::City(row) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO cities
                         (x, y, name, influence, tier, stability, popularity, inventory, owner, structures)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                        params![
                            row.x,
                            row.y,
                            row.name,
                            row.influence,
                            row.tier,
                            row.stability,
                            row.popularity,
                            serde_json::to_string(&row.inventory)?,
                            row.owner as i64,
                            serde_json::to_string(&row.structures)?
                        ],
                    )?;
                }
                Record::Unit(row) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO units
                         (id, name, type, home, x, y, strength, morale, exp, owner, movement_free)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                        params![
                            row.id as i64,
                            row.name,
                            row.kind.key(),
                            row.home,
                            row.x,
                            row.y,
                            row.strength,
                            row.morale,
                            row.experience,
                            row.owner as i64,
                            row.movement_free
                        ],
                    )?;
                }
                Record::Link(row) => {
                    tx.execute(
                        "INSERT OR REPLACE INTO links (id, linktype, origin, destination, path, owner)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                        params![
                            row.id as i64,
                            row.kind.key(),
                            row.origin,
                            row.destination,
                            serde_json::to_string(&row.path)?,
                            row.owner as i64
                        ],
                    )?;
                }
                Record::Meta(row) => {
                    let rng = row.rng.as_ref().map(serde_json::to_string).transpose()?;
                    tx.execute(
                        "INSERT OR REPLACE INTO world_meta (id, season, ticks, rng) VALUES (1, ?1, ?2, ?3)",
                        params![row.season, row.ticks as i64, rng],
                    )?;
                }
            }
        }
        tx.commit()?;
        tracing::debug!(records = changes.len(), "changeset committed");
        Ok(())
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            nations: self.load_nations()?,
            economies: self.load_economies()?,
            tiles: self.load_tiles()?,
            cities: self.load_cities()?,
            units: self.load_units()?,
            links: self.load_links()?,
            meta: self.load_meta()?,
        })
    }
}
