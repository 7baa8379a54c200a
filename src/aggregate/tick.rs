//! The periodic tick sweep
//!
//! Once per game cycle every city's tier is recomputed from its inventory,
//! every nation's influence is reset to its recomputed cap, unit movement is
//! restored and the season advances.

use crate::aggregate::economy::calculate_cap;
use crate::aggregate::world::World;
use crate::core::calendar::Season;
use crate::core::types::NationId;
use crate::persist::Changeset;

/// What one nation looked like after a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NationTick {
    pub nation: NationId,
    /// (city name, tier) in name order
    pub tiers: Vec<(String, u8)>,
    pub influence_cap: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    pub nations: Vec<NationTick>,
    /// Season after the tick
    pub season: Season,
    pub ticks: u64,
}

/// Run one tick over the whole world
pub fn run_tick(world: &mut World, changes: &mut Changeset) -> TickSummary {
    tracing::info!(season = %world.calendar.season(), nations = world.nations.len(), "tick started");
    let policy = world.config.economy.cap_policy;
    let mut nations = Vec::with_capacity(world.nations.len());

    for nation in world.nations.values_mut() {
        let mut tiers = Vec::with_capacity(nation.cities.len());
        for city in nation.cities.values_mut() {
            let tier = city.refresh_tier();
            changes.city(city, &world.grid);
            tiers.push((city.name.clone(), tier));
        }

        let cap = calculate_cap(nation, &world.grid, policy);
        nation.econ.reset_to_cap(cap);
        changes.nation(nation);
        tracing::debug!(nation = %nation.name, cap, cities = tiers.len(), "nation ticked");

        nations.push(NationTick {
            nation: nation.id,
            tiers,
            influence_cap: cap,
        });
    }

    world.restore_movement(changes);
    world.calendar.advance();
    changes.meta(&world.calendar, &world.rng);

    let summary = TickSummary {
        nations,
        season: world.calendar.season(),
        ticks: world.calendar.ticks(),
    };
    tracing::info!(season = %summary.season, ticks = summary.ticks, "tick finished");
    summary
}
