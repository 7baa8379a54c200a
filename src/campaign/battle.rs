//! Battle resolution for the campaign layer
//!
//! A battle is resolved in one step when a unit moves onto a tile held by a
//! hostile unit. Team effectiveness is normalized into win, loss and
//! stalemate bands that partition [0, 1); a single roll picks the band and
//! its distance from the band's far edge sets how hard the outcome lands.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::aggregate::world::World;
use crate::campaign::map::HexCoord;
use crate::campaign::terrain::LandBiome;
use crate::campaign::units::Unit;
use crate::city::building::{BuildingKind, StructureKind};
use crate::core::config::CombatSettings;
use crate::core::error::{GameError, Result};
use crate::core::types::{NationId, UnitId};
use crate::persist::Changeset;

/// Normalized battle probabilities from the attacker's perspective
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BattleChances {
    pub self_bvc: f64,
    pub target_bvc: f64,
    /// self_bvc - target_bvc, in [-1, 1]
    pub gap: f64,
    pub win: f64,
    pub loss: f64,
    pub stalemate: f64,
}

/// Split [0, 1) into win, loss and stalemate bands
pub fn battle_chances(self_eff: f64, target_eff: f64, settings: &CombatSettings) -> BattleChances {
    let total = self_eff + target_eff;
    let self_bvc = if total > 0.0 { self_eff / total } else { 0.5 };
    let target_bvc = 1.0 - self_bvc;
    let gap = self_bvc - target_bvc;
    let stalemate = (settings.base_stalemate_chance * (1.0 - gap * gap)).max(0.0);
    BattleChances {
        self_bvc,
        target_bvc,
        gap,
        win: self_bvc * (1.0 - stalemate),
        loss: target_bvc * (1.0 - stalemate),
        stalemate,
    }
}

/// Cubic in the gap: slow near even odds, steep when one side dominates
pub fn crushing_chance(gap: f64, settings: &CombatSettings) -> f64 {
    (settings.base_crushing_chance + gap.powi(3) * settings.crushing_chance_modifier)
        .clamp(0.0, 1.0)
}

/// Sine compression of a band distance into [0, 1]
pub fn scaled_impact(impact: f64) -> f64 {
    (PI * impact / 2.0).sin()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BattleOutcome {
    CrushingVictory,
    Victory,
    Stalemate,
    Defeat,
    CrushingDefeat,
}

/// Where a roll landed and how hard
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollOutcome {
    pub outcome: BattleOutcome,
    pub impact: f64,
    pub scaled_impact: f64,
}

pub fn classify_roll(chances: &BattleChances, roll: f64, settings: &CombatSettings) -> RollOutcome {
    if roll < chances.win {
        let impact = chances.win - roll;
        let outcome = if impact <= crushing_chance(chances.gap, settings) {
            BattleOutcome::CrushingVictory
        } else {
            BattleOutcome::Victory
        };
        RollOutcome {
            outcome,
            impact,
            scaled_impact: scaled_impact(impact),
        }
    } else if roll < chances.win + chances.loss {
        let impact = chances.win + chances.loss - roll;
        let outcome = if impact <= crushing_chance(-chances.gap, settings) {
            BattleOutcome::CrushingDefeat
        } else {
            BattleOutcome::Defeat
        };
        RollOutcome {
            outcome,
            impact,
            scaled_impact: scaled_impact(impact),
        }
    } else {
        let impact = 1.0 - roll;
        RollOutcome {
            outcome: BattleOutcome::Stalemate,
            impact,
            scaled_impact: scaled_impact(impact),
        }
    }
}

/// Part a unit played in a battle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombatRole {
    CrushingWinner,
    Winner,
    Loser,
    CrushingLoser,
    Stalemate,
}

impl CombatRole {
    /// (strength, morale) loss per unit of scaled impact
    pub fn losses(&self, settings: &CombatSettings) -> (f64, f64) {
        match self {
            CombatRole::CrushingWinner => (
                settings.crush_winner_strength_loss,
                settings.crush_winner_morale_loss,
            ),
            CombatRole::Winner => (settings.winner_strength_loss, settings.winner_morale_loss),
            CombatRole::Loser => (settings.loser_strength_loss, settings.loser_morale_loss),
            CombatRole::CrushingLoser => (
                settings.crush_loser_strength_loss,
                settings.crush_loser_morale_loss,
            ),
            CombatRole::Stalemate => (
                settings.stalemate_strength_loss,
                settings.stalemate_morale_loss,
            ),
        }
    }

    pub fn stability_modifier(&self, settings: &CombatSettings) -> f64 {
        match self {
            CombatRole::CrushingWinner | CombatRole::CrushingLoser => {
                settings.crush_stability_modifier
            }
            CombatRole::Winner | CombatRole::Loser => settings.decisive_stability_modifier,
            CombatRole::Stalemate => settings.stalemate_stability_modifier,
        }
    }

    pub fn is_loser(&self) -> bool {
        matches!(self, CombatRole::Loser | CombatRole::CrushingLoser)
    }
}

impl BattleOutcome {
    /// (attacker role, defender role)
    pub fn roles(&self) -> (CombatRole, CombatRole) {
        match self {
            BattleOutcome::CrushingVictory => (CombatRole::CrushingWinner, CombatRole::CrushingLoser),
            BattleOutcome::Victory => (CombatRole::Winner, CombatRole::Loser),
            BattleOutcome::Stalemate => (CombatRole::Stalemate, CombatRole::Stalemate),
            BattleOutcome::Defeat => (CombatRole::Loser, CombatRole::Winner),
            BattleOutcome::CrushingDefeat => (CombatRole::CrushingLoser, CombatRole::CrushingWinner),
        }
    }
}

fn terrain_debuff(biome: Option<LandBiome>, settings: &CombatSettings) -> f64 {
    match biome {
        Some(LandBiome::Desert) => settings.desert_debuff,
        Some(LandBiome::Forest) => settings.forest_debuff,
        Some(LandBiome::Mountains) => settings.mountains_debuff,
        Some(LandBiome::HighMountains) => settings.high_mountains_debuff,
        _ => 0.0,
    }
}

/// Combat strength of `unit` fighting at `location`
///
/// Base morale x strength plus additive modifiers: home terrain, home city
/// proximity (or, for attackers away from home, a ruggedness penalty) and
/// forts. Never negative.
pub fn effectiveness(world: &World, unit: &Unit, attacking: bool, location: HexCoord) -> f64 {
    let settings = &world.config.combat;
    let mut effectiveness = unit.morale * unit.strength;
    let Some(tile) = world.grid.find(location) else {
        return effectiveness.max(0.0);
    };

    let home = world
        .nations
        .get(&unit.owner)
        .and_then(|nation| nation.cities.get(&unit.home));
    let home_tile = home.and_then(|city| world.grid.find(city.coord));

    if let Some(home_tile) = home_tile {
        if home_tile.terrain == tile.terrain {
            effectiveness += settings.home_terrain_buff;
        }
    }

    let near_home = home.is_some_and(|city| city.developed_area(&world.grid).contains(&location));
    if near_home {
        let at_home = home.is_some_and(|city| city.coord == location);
        effectiveness += if at_home {
            settings.home_city_buff * 2.0
        } else {
            settings.home_city_buff
        };
    } else if attacking {
        effectiveness -= terrain_debuff(tile.terrain.land_biome, settings);
    }

    let fort = StructureKind::Building(BuildingKind::Fort);
    if tile.has_structure(fort) {
        effectiveness += settings.fort_buff;
    } else if world
        .grid
        .area(location)
        .into_iter()
        .filter_map(|coord| world.grid.find(coord))
        .any(|t| t.has_structure(fort))
    {
        effectiveness += settings.fort_area_buff;
    }

    effectiveness.max(0.0)
}

/// What happened in a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleReport {
    pub attacker: UnitId,
    pub defender: UnitId,
    pub location: HexCoord,
    pub chances: BattleChances,
    pub roll: f64,
    pub outcome: BattleOutcome,
    pub scaled_impact: f64,
    pub attacker_position: HexCoord,
    pub defender_position: HexCoord,
}

impl World {
    /// Team effectiveness for both sides, allies in the battle area included
    fn team_effectiveness(&self, attacker: &Unit, defender: &Unit, location: HexCoord) -> (f64, f64) {
        let settings = &self.config.combat;
        let mut attack = effectiveness(self, attacker, true, location);
        let mut defense = effectiveness(self, defender, false, location);

        let friendly = |side: NationId, other: NationId| {
            self.nations
                .get(&side)
                .is_some_and(|nation| nation.is_friendly_to(other))
        };

        let area = self.grid.area(location);
        for ally in self.units.values() {
            if ally.id == attacker.id || ally.id == defender.id || !area.contains(&ally.location) {
                continue;
            }
            if friendly(attacker.owner, ally.owner) {
                attack += settings.ally_contribution * effectiveness(self, ally, true, location);
            } else if friendly(defender.owner, ally.owner) {
                defense += settings.ally_contribution * effectiveness(self, ally, false, location);
            }
        }
        (attack, defense)
    }

    /// Resolve an attack by `attacker_id` on `defender_id`
    ///
    /// `last_tile` is where the attacker came from; a stalemate pushes it
    /// back there. Losers retreat, and every participant's free movement is
    /// spent.
    pub fn attack(
        &mut self,
        attacker_id: UnitId,
        defender_id: UnitId,
        last_tile: HexCoord,
        changes: &mut Changeset,
    ) -> Result<BattleReport> {
        let action = "Attacking";
        let attacker = self
            .units
            .get(&attacker_id)
            .ok_or_else(|| GameError::not_found("unit", action, attacker_id))?;
        let defender = self
            .units
            .get(&defender_id)
            .ok_or_else(|| GameError::not_found("unit", action, defender_id))?;
        let location = defender.location;
        let settings = self.config.combat.clone();

        let (attack, defense) = self.team_effectiveness(attacker, defender, location);
        let chances = battle_chances(attack, defense, &settings);
        let roll: f64 = self.rng.gen();
        changes.meta(&self.calendar, &self.rng);
        let rolled = classify_roll(&chances, roll, &settings);
        let (attacker_role, defender_role) = rolled.outcome.roles();

        tracing::debug!(
            attacker = %attacker_id,
            defender = %defender_id,
            at = %location,
            win = chances.win,
            loss = chances.loss,
            stalemate = chances.stalemate,
            roll,
            outcome = ?rolled.outcome,
            "battle resolved"
        );

        for (unit_id, role) in [(attacker_id, attacker_role), (defender_id, defender_role)] {
            let (strength_loss, morale_loss) = role.losses(&settings);
            let Some(unit) = self.units.get_mut(&unit_id) else {
                continue;
            };
            unit.suffer(
                strength_loss * rolled.scaled_impact,
                morale_loss * rolled.scaled_impact,
            );
            unit.experience += 1;
            let owner = unit.owner;
            let rally = rolled.scaled_impact * role.stability_modifier(&settings);
            self.rally_cities(owner, location, rally, changes);
        }

        if rolled.outcome == BattleOutcome::Stalemate {
            if let Some(unit) = self.units.get_mut(&attacker_id) {
                unit.location = last_tile;
            }
        }
        for (unit_id, role) in [(attacker_id, attacker_role), (defender_id, defender_role)] {
            if role.is_loser() {
                self.retreat(unit_id);
            }
            if let Some(unit) = self.units.get_mut(&unit_id) {
                unit.movement_free = 0.0;
                changes.unit(unit);
            }
        }

        let position = |id: UnitId| self.units.get(&id).map(|u| u.location).unwrap_or(location);
        Ok(BattleReport {
            attacker: attacker_id,
            defender: defender_id,
            location,
            chances,
            roll,
            outcome: rolled.outcome,
            scaled_impact: rolled.scaled_impact,
            attacker_position: position(attacker_id),
            defender_position: position(defender_id),
        })
    }

    /// Raise stability of `owner`'s cities near a battle at `location`
    fn rally_cities(&mut self, owner: NationId, location: HexCoord, amount: f64, changes: &mut Changeset) {
        let metroarea = self.grid.metroarea(location);
        let Some(nation) = self.nations.get_mut(&owner) else {
            return;
        };
        for city in nation.cities.values_mut() {
            if metroarea.contains(&city.coord) && city.developed_area(&self.grid).contains(&location) {
                city.add_stability(amount);
                changes.city(city, &self.grid);
            }
        }
    }
}
