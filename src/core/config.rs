//! Game configuration with documented constants
//!
//! All tunable numbers are collected here. Defaults reproduce the live
//! game balance; a TOML file can override any subset of fields.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while loading a configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Top level game configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub world: WorldSettings,
    pub economy: EconomySettings,
    pub units: UnitSettings,
    pub combat: CombatSettings,
    pub scheduler: SchedulerSettings,
    pub storage: StorageSettings,
}

// === WORLD ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldSettings {
    /// JSON terrain dataset, keyed by "(q, r)"
    pub terrain_dataset: PathBuf,

    /// Use the static dataset as the canonical map on load
    ///
    /// When set, tile rows in the database are ignored and ownership is
    /// re-derived from city areas. Clearing it makes stored tiles win.
    pub prefer_static_terrain: bool,

    /// Seed for the world RNG. `None` seeds from entropy.
    pub seed: Option<u64>,
}

impl Default for WorldSettings {
    fn default() -> Self {
        Self {
            terrain_dataset: PathBuf::from("data/tiles.json"),
            prefer_static_terrain: true,
            seed: None,
        }
    }
}

// === ECONOMY ===

/// How `Econ::calculate_cap` reports the computed cap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapPolicy {
    /// Return the accumulated cap from cities and links
    #[default]
    Accumulated,
    /// Always return 1, matching the historical live behavior
    LegacyConstant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EconomySettings {
    /// Influence a freshly founded nation starts with
    pub starting_influence: u32,

    /// Influence cap of a freshly founded nation, until the first tick
    pub starting_cap: u32,

    pub cap_policy: CapPolicy,
}

impl Default for EconomySettings {
    fn default() -> Self {
        Self {
            starting_influence: 2,
            starting_cap: 2,
            cap_policy: CapPolicy::Accumulated,
        }
    }
}

// === UNITS ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnitSettings {
    /// Strength of a newly raised unit
    pub base_strength: f64,

    /// Strength of a unit raised in a city with a foundry
    pub foundry_strength: f64,

    /// Morale of a newly raised unit
    pub base_morale: f64,

    /// Free movement per season for armies
    pub army_movement: f64,

    /// Free movement per season for fleets
    pub fleet_movement: f64,

    /// Influence spent to train an army
    pub army_cost: u32,

    /// Influence spent to build a fleet
    pub fleet_cost: u32,
}

impl Default for UnitSettings {
    fn default() -> Self {
        Self {
            base_strength: 1.0,
            foundry_strength: 1.3,
            base_morale: 1.0,
            army_movement: 3.0,
            fleet_movement: 6.0,
            army_cost: 1,
            fleet_cost: 2,
        }
    }
}

// === COMBAT ===

/// Combat constants
///
/// Probabilities are normalized to [0, 1]. Stat losses are multiplied by
/// the scaled impact of the roll (0..1). Stability modifiers are on the
/// 0..100 stability scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CombatSettings {
    /// Share of an allied unit's effectiveness added to its team
    pub ally_contribution: f64,

    /// Stalemate chance at gap 0, shrinking quadratically with the gap
    pub base_stalemate_chance: f64,

    /// Crushing chance at gap 0
    pub base_crushing_chance: f64,

    /// Weight of the cubic gap term in the crushing chance
    pub crushing_chance_modifier: f64,

    pub crush_loser_strength_loss: f64,
    pub crush_loser_morale_loss: f64,
    pub loser_strength_loss: f64,
    pub loser_morale_loss: f64,
    pub crush_winner_strength_loss: f64,
    pub crush_winner_morale_loss: f64,
    pub winner_strength_loss: f64,
    pub winner_morale_loss: f64,
    pub stalemate_strength_loss: f64,
    pub stalemate_morale_loss: f64,

    pub crush_stability_modifier: f64,
    pub decisive_stability_modifier: f64,
    pub stalemate_stability_modifier: f64,

    /// Bonus when fighting on the home city's terrain
    pub home_terrain_buff: f64,

    /// Bonus inside the home city's developed area, doubled on the city tile
    pub home_city_buff: f64,

    /// Attacker penalties by terrain ruggedness
    pub desert_debuff: f64,
    pub forest_debuff: f64,
    pub mountains_debuff: f64,
    pub high_mountains_debuff: f64,

    /// Bonus for a fort on the battle tile
    pub fort_buff: f64,

    /// Bonus for a fort anywhere in the battle tile's area
    pub fort_area_buff: f64,
}

impl Default for CombatSettings {
    fn default() -> Self {
        Self {
            ally_contribution: 0.5,
            base_stalemate_chance: 0.2,
            base_crushing_chance: 0.25,
            crushing_chance_modifier: 0.75,

            crush_loser_strength_loss: 2.0,
            crush_loser_morale_loss: 1.8,
            loser_strength_loss: 1.5,
            loser_morale_loss: 1.3,
            crush_winner_strength_loss: 0.3,
            crush_winner_morale_loss: 0.0,
            winner_strength_loss: 1.0,
            winner_morale_loss: 0.7,
            stalemate_strength_loss: 1.2,
            stalemate_morale_loss: 1.0,

            crush_stability_modifier: 20.0,
            decisive_stability_modifier: 10.0,
            stalemate_stability_modifier: 5.0,

            home_terrain_buff: 0.15,
            home_city_buff: 0.1,
            desert_debuff: 0.1,
            forest_debuff: 0.1,
            mountains_debuff: 0.15,
            high_mountains_debuff: 0.20,
            fort_buff: 0.15,
            fort_area_buff: 0.05,
        }
    }
}

// === SCHEDULER ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    /// Hour of day (UTC) at which the daily tick runs
    pub tick_hour_utc: u32,

    /// How long the link builder waits for each direction choice
    pub link_step_timeout_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            tick_hour_utc: 0,
            link_step_timeout_secs: 60,
        }
    }
}

// === STORAGE ===

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// SQLite database file
    pub database: PathBuf,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            database: PathBuf::from("data/nations.db"),
        }
    }
}

impl GameConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML document; missing fields keep their defaults
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: GameConfig = toml::from_str(content)?;
        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<(), String> {
        let combat = &self.combat;
        let probabilities = [
            ("ally_contribution", combat.ally_contribution),
            ("base_stalemate_chance", combat.base_stalemate_chance),
            ("base_crushing_chance", combat.base_crushing_chance),
            ("crushing_chance_modifier", combat.crushing_chance_modifier),
        ];
        for (name, value) in probabilities {
            if !(0.0..=1.0).contains(&value) {
                return Err(format!("{name} ({value}) must be within [0, 1]"));
            }
        }

        let losses = [
            combat.crush_loser_strength_loss,
            combat.crush_loser_morale_loss,
            combat.loser_strength_loss,
            combat.loser_morale_loss,
            combat.crush_winner_strength_loss,
            combat.crush_winner_morale_loss,
            combat.winner_strength_loss,
            combat.winner_morale_loss,
            combat.stalemate_strength_loss,
            combat.stalemate_morale_loss,
        ];
        if losses.iter().any(|loss| *loss < 0.0) {
            return Err("Combat losses must be non-negative".into());
        }

        if self.units.army_movement <= 0.0 || self.units.fleet_movement <= 0.0 {
            return Err("Unit movement allowances must be positive".into());
        }

        if self.scheduler.tick_hour_utc >= 24 {
            return Err(format!(
                "tick_hour_utc ({}) must be below 24",
                self.scheduler.tick_hour_utc
            ));
        }

        Ok(())
    }
}
