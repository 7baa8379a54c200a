//! Nation - aggregate root owning cities, links, military and economy

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::aggregate::economy::Econ;
use crate::campaign::map::HexCoord;
use crate::city::link::Link;
use crate::city::settlement::City;
use crate::core::error::{GameError, Result};
use crate::core::types::{Color, NationId, UnitId};

/// A player nation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nation {
    /// Also the owning player's id
    pub id: NationId,
    /// Globally unique
    pub name: String,
    pub econ: Econ,
    pub cities: BTreeMap<String, City>,
    pub links: Vec<Link>,
    /// Claimed tiles, in claim order
    pub tiles: Vec<HexCoord>,
    /// Unit name -> unit id
    pub military: BTreeMap<String, UnitId>,
    pub allies: BTreeSet<NationId>,
    pub dossier: String,
    pub color: Color,
}

impl Nation {
    pub fn new(id: NationId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            econ: Econ::new(id, 0, 0),
            cities: BTreeMap::new(),
            links: Vec::new(),
            tiles: Vec::new(),
            military: BTreeMap::new(),
            allies: BTreeSet::new(),
            dossier: String::new(),
            color: Color::default(),
        }
    }

    pub fn city(&self, name: &str, action: &str) -> Result<&City> {
        self.cities
            .get(name)
            .ok_or_else(|| GameError::not_found("city", action, name))
    }

    pub fn city_mut(&mut self, name: &str, action: &str) -> Result<&mut City> {
        self.cities
            .get_mut(name)
            .ok_or_else(|| GameError::not_found("city", action, name))
    }

    pub fn unit_id(&self, name: &str, action: &str) -> Result<UnitId> {
        self.military
            .get(name)
            .copied()
            .ok_or_else(|| GameError::not_found("unit", action, name))
    }

    /// Deduct `cost` influence or fail without change
    pub fn spend_influence(&mut self, cost: u32) -> Result<()> {
        if !self.econ.can_afford(cost) {
            return Err(GameError::NotEnoughInfluence {
                need: cost,
                have: self.econ.influence,
            });
        }
        self.econ.influence -= cost;
        Ok(())
    }

    /// Hostile means neither this nation nor one of its allies
    pub fn is_hostile_to(&self, other: NationId) -> bool {
        other != self.id && !self.allies.contains(&other)
    }

    pub fn is_friendly_to(&self, other: NationId) -> bool {
        !self.is_hostile_to(other)
    }

    pub fn claim(&mut self, coord: HexCoord) {
        if !self.tiles.contains(&coord) {
            self.tiles.push(coord);
        }
    }
}
