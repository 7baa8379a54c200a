//! Command execution - the service boundary around the world
//!
//! Every mutating command holds the world write lock for its whole
//! validate, mutate and commit span, so commands and ticks never interleave.
//! Domain errors are logged at warn and returned; storage failures are
//! logged at error and the world is reloaded from the store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::future::Future;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, RwLock};

use crate::aggregate::tick::{run_tick, TickSummary};
use crate::aggregate::world::{NationStatus, World};
use crate::campaign::map::{Direction, HexCoord};
use crate::campaign::terrain::TerrainDataset;
use crate::campaign::units::MoveReport;
use crate::city::building::{BuildingKind, Structure};
use crate::city::link::{Link, LinkKind};
use crate::command::link_builder::{collect_path, LinkBuilder, LinkEvent};
use crate::core::config::GameConfig;
use crate::core::error::{GameError, ServiceError};
use crate::core::types::{NationId, UnitId};
use crate::persist::{Changeset, Store};

/// Serialized access to one world and its store
pub struct GameService<S: Store> {
    world: RwLock<World>,
    store: Mutex<S>,
    dataset: TerrainDataset,
}

impl<S: Store> GameService<S> {
    pub fn new(world: World, store: S, dataset: TerrainDataset) -> Self {
        Self {
            world: RwLock::new(world),
            store: Mutex::new(store),
            dataset,
        }
    }

    /// Restore the world from `store` and wrap both
    pub fn open(store: S, dataset: TerrainDataset, config: GameConfig) -> Result<Self, ServiceError> {
        let snapshot = store.load()?;
        let world = World::restore(snapshot, &dataset, config)?;
        Ok(Self::new(world, store, dataset))
    }

    pub fn world(&self) -> &RwLock<World> {
        &self.world
    }

    /// Run `op` under the write lock and commit what it recorded
    async fn execute<T, F>(&self, action: &str, op: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut World, &mut Changeset) -> Result<T, GameError>,
    {
        let mut world = self.world.write().await;
        let mut changes = Changeset::new();

        let value = match op(&mut *world, &mut changes) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(action, error = %err, "command rejected");
                if !changes.is_empty() {
                    // partial mutation before the failure
                    self.reload(&mut *world).await;
                }
                return Err(err.into());
            }
        };

        let mut store = self.store.lock().await;
        if let Err(err) = store.commit(&changes) {
            tracing::error!(action, error = %err, "commit failed, reloading world");
            drop(store);
            self.reload(&mut *world).await;
            return Err(err.into());
        }
        tracing::debug!(action, records = changes.len(), "command committed");
        Ok(value)
    }

    async fn reload(&self, world: &mut World) {
        let store = self.store.lock().await;
        let restored = store
            .load()
            .and_then(|snapshot| World::restore(snapshot, &self.dataset, world.config.clone()));
        match restored {
            Ok(restored) => *world = restored,
            Err(err) => tracing::error!(error = %err, "reload failed, world may diverge from store"),
        }
    }

    /// Write every tile of the current grid, for a fresh database
    pub async fn seed_tiles(&self) -> Result<usize, ServiceError> {
        self.execute("Seeding tiles", |world, changes| {
            for tile in world.grid.iter() {
                changes.tile(tile);
            }
            changes.meta(&world.calendar, &world.rng);
            Ok(world.grid.len())
        })
        .await
    }

    pub async fn found_nation(
        &self,
        founder: NationId,
        name: &str,
        capital: &str,
        coord: HexCoord,
    ) -> Result<NationId, ServiceError> {
        self.execute("Founding a nation", |world, changes| {
            world.found_nation(founder, name, capital, coord, changes)
        })
        .await
    }

    pub async fn found_city(
        &self,
        nation: NationId,
        name: &str,
        coord: HexCoord,
    ) -> Result<(), ServiceError> {
        self.execute("Founding a city", |world, changes| {
            world.found_city(nation, name, coord, changes)
        })
        .await
    }

    pub async fn train_army(
        &self,
        nation: NationId,
        name: &str,
        city: &str,
    ) -> Result<UnitId, ServiceError> {
        self.execute("Training an army", |world, changes| {
            world.train_army(nation, name, city, changes)
        })
        .await
    }

    pub async fn build_fleet(
        &self,
        nation: NationId,
        name: &str,
        city: &str,
    ) -> Result<UnitId, ServiceError> {
        self.execute("Building a fleet", |world, changes| {
            world.build_fleet(nation, name, city, changes)
        })
        .await
    }

    pub async fn build_structure(
        &self,
        nation: NationId,
        city: &str,
        kind: BuildingKind,
        target: Option<HexCoord>,
    ) -> Result<Structure, ServiceError> {
        self.execute("Building a structure", |world, changes| {
            world.build_structure(nation, city, kind, target, changes)
        })
        .await
    }

    pub async fn build_link(
        &self,
        nation: NationId,
        kind: LinkKind,
        origin: &str,
        destination: &str,
        path: Vec<HexCoord>,
    ) -> Result<Link, ServiceError> {
        self.execute("Building a link", |world, changes| {
            world.build_link(nation, kind, origin, destination, path, changes)
        })
        .await
    }

    /// Pick a path from player events, then build it
    ///
    /// Returns `Ok(None)` when the player stops answering.
    pub async fn build_link_interactive(
        &self,
        nation: NationId,
        kind: LinkKind,
        origin: &str,
        events: &mut mpsc::Receiver<LinkEvent>,
    ) -> Result<Option<Link>, ServiceError> {
        let (builder, step_timeout) = {
            let world = self.world.read().await;
            let timeout = Duration::from_secs(world.config.scheduler.link_step_timeout_secs);
            (LinkBuilder::start(&world, nation, kind, origin)?, timeout)
        };
        let builder = collect_path(&self.world, builder, events, step_timeout).await;

        let plan = match builder.finish() {
            Ok(Some(plan)) => plan,
            Ok(None) => {
                tracing::info!(%nation, origin, "link building timed out");
                return Ok(None);
            }
            Err(err) => {
                tracing::info!(%nation, origin, "link building cancelled");
                return Err(err.into());
            }
        };
        let link = self
            .build_link(plan.nation, plan.kind, &plan.origin, &plan.destination, plan.path)
            .await?;
        Ok(Some(link))
    }

    pub async fn move_unit(
        &self,
        nation: NationId,
        unit: &str,
        direction: Direction,
    ) -> Result<MoveReport, ServiceError> {
        self.execute("Moving a unit", |world, changes| {
            world.move_unit(nation, unit, direction, changes)
        })
        .await
    }

    pub async fn set_alliance(
        &self,
        a: NationId,
        b: NationId,
        allied: bool,
    ) -> Result<(), ServiceError> {
        self.execute("Changing an alliance", |world, changes| {
            world.set_alliance(a, b, allied, changes)
        })
        .await
    }

    pub async fn set_dossier(&self, nation: NationId, text: &str) -> Result<(), ServiceError> {
        self.execute("Changing a dossier", |world, changes| {
            world.set_dossier(nation, text, changes)
        })
        .await
    }

    /// Run one tick now
    pub async fn force_tick(&self) -> Result<TickSummary, ServiceError> {
        self.execute("Ticking", |world, changes| Ok(run_tick(world, changes)))
            .await
    }

    pub async fn status(&self, nation: NationId) -> Result<NationStatus, ServiceError> {
        let world = self.world.read().await;
        Ok(world.status(nation)?)
    }

    /// Tick once a day at `tick_hour_utc` until `shutdown` resolves
    pub async fn run_daily<F>(&self, shutdown: F) -> Result<(), ServiceError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        loop {
            let hour = self.world.read().await.config.scheduler.tick_hour_utc;
            let wait = duration_until_next_tick(Utc::now(), hour);
            tracing::info!(wait_secs = wait.as_secs(), hour, "next tick scheduled");
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("scheduler stopped");
                    return Ok(());
                }
                _ = tokio::time::sleep(wait) => {
                    if let Err(err) = self.force_tick().await {
                        tracing::error!(error = %err, "scheduled tick failed");
                    }
                }
            }
        }
    }
}

/// Time from `now` until the next `hour`:00 UTC, strictly in the future
pub fn duration_until_next_tick(now: DateTime<Utc>, hour: u32) -> Duration {
    let today = now
        .date_naive()
        .and_hms_opt(hour.min(23), 0, 0)
        .map(|at| at.and_utc());
    let next = match today {
        Some(at) if at > now => at,
        Some(at) => at + ChronoDuration::days(1),
        None => now + ChronoDuration::days(1),
    };
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
