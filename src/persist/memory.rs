//! In-memory store for tests and dry runs

use std::collections::BTreeMap;

use crate::core::error::StoreError;
use crate::persist::{
    Changeset, CityRecord, EconomyRecord, LinkRecord, MetaRecord, NationRecord, Record, Snapshot,
    Store, TileRecord, UnitRecord,
};

/// Rows kept in ordered maps, keyed the same way as the SQLite tables
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    nations: BTreeMap<u64, NationRecord>,
    economies: BTreeMap<u64, EconomyRecord>,
    tiles: BTreeMap<(i32, i32), TileRecord>,
    cities: BTreeMap<(i32, i32), CityRecord>,
    units: BTreeMap<u64, UnitRecord>,
    links: BTreeMap<u64, LinkRecord>,
    meta: Option<MetaRecord>,
    /// Reject every commit, for exercising failure paths
    fail_commits: bool,
    commits: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_failing_commits(mut self) -> Self {
        self.fail_commits = true;
        self
    }

    /// Number of successful commits
    pub fn commits(&self) -> usize {
        self.commits
    }
}

impl Store for MemoryStore {
    fn commit(&mut self, changes: &Changeset) -> Result<(), StoreError> {
        if self.fail_commits {
            return Err(StoreError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "memory store rejects commits",
            )));
        }
        for record in changes.records() {
            match record {
                Record::Nation(row) => {
                    self.nations.insert(row.id, row.clone());
                }
                Record::Economy(row) => {
                    self.economies.insert(row.nation_id, row.clone());
                }
                Record::Tile(row) => {
                    self.tiles.insert((row.x, row.y), row.clone());
                }
                Record::City(row) => {
                    self.cities.insert((row.x, row.y), row.clone());
                }
                Record::Unit(row) => {
                    self.units.insert(row.id, row.clone());
                }
                Record::Link(row) => {
                    self.links.insert(row.id, row.clone());
                }
                Record::Meta(row) => self.meta = Some(*row),
            }
        }
        self.commits += 1;
        Ok(())
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            nations: self.nations.values().cloned().collect(),
            economies: self.economies.values().cloned().collect(),
            tiles: self.tiles.values().cloned().collect(),
            cities: self.cities.values().cloned().collect(),
            units: self.units.values().cloned().collect(),
            links: self.links.values().cloned().collect(),
            meta: self.meta,
        })
    }
}
