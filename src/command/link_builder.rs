//! Interactive link path picking
//!
//! The player builds a link path one direction at a time, starting at the
//! origin city. [`LinkBuilder`] is a plain state machine driven by
//! [`LinkEvent`]s; [`collect_path`] feeds it from a channel with a per-step
//! timeout.

use std::time::Duration;
use tokio::sync::{mpsc, RwLock};

use crate::aggregate::world::World;
use crate::campaign::map::{Direction, HexCoord};
use crate::city::link::LinkKind;
use crate::core::error::{GameError, Result};
use crate::core::types::NationId;

/// Input from the player, or the lack of it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkEvent {
    Step(Direction),
    Back,
    Cancel,
    Timeout,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkBuilderState {
    AwaitingDirection,
    Completed { destination: String },
    Cancelled,
    TimedOut,
}

impl LinkBuilderState {
    pub fn is_finished(&self) -> bool {
        !matches!(self, LinkBuilderState::AwaitingDirection)
    }
}

/// A finished path, ready to hand to [`World::build_link`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkPlan {
    pub nation: NationId,
    pub kind: LinkKind,
    pub origin: String,
    pub destination: String,
    pub path: Vec<HexCoord>,
}

#[derive(Debug, Clone)]
pub struct LinkBuilder {
    nation: NationId,
    kind: LinkKind,
    origin: String,
    origin_coord: HexCoord,
    path: Vec<HexCoord>,
    state: LinkBuilderState,
}

impl LinkBuilder {
    pub fn start(world: &World, nation: NationId, kind: LinkKind, origin: &str) -> Result<Self> {
        let action = Self::action_for(kind);
        let city = world.nation(nation)?.city(origin, &action)?;
        Ok(Self {
            nation,
            kind,
            origin: origin.to_string(),
            origin_coord: city.coord,
            path: Vec::new(),
            state: LinkBuilderState::AwaitingDirection,
        })
    }

    fn action_for(kind: LinkKind) -> String {
        format!("Building a {}", kind.display_name())
    }

    pub fn state(&self) -> &LinkBuilderState {
        &self.state
    }

    pub fn path(&self) -> &[HexCoord] {
        &self.path
    }

    /// Tile the path currently ends on
    pub fn position(&self) -> HexCoord {
        self.path.last().copied().unwrap_or(self.origin_coord)
    }

    /// Apply one event. A rejected step leaves the builder unchanged.
    pub fn handle(&mut self, world: &World, event: LinkEvent) -> Result<&LinkBuilderState> {
        if self.state.is_finished() {
            return Ok(&self.state);
        }
        match event {
            LinkEvent::Step(direction) => self.step(world, direction)?,
            LinkEvent::Back => {
                self.path.pop();
            }
            LinkEvent::Cancel => self.state = LinkBuilderState::Cancelled,
            LinkEvent::Timeout => self.state = LinkBuilderState::TimedOut,
        }
        Ok(&self.state)
    }

    fn step(&mut self, world: &World, direction: Direction) -> Result<()> {
        let action = Self::action_for(self.kind);
        let next = self.position().step(direction);
        let tile = world.grid.get(next)?;
        if next == self.origin_coord || self.path.contains(&next) {
            return Err(GameError::invalid_location(action, "over the same tile twice"));
        }

        if let Some(city) = &tile.city {
            let ours = world
                .nation(self.nation)?
                .cities
                .get(city)
                .is_some_and(|c| c.coord == next);
            if !ours {
                return Err(GameError::invalid_location(action, "through a foreign city"));
            }
            self.path.push(next);
            self.state = LinkBuilderState::Completed {
                destination: city.clone(),
            };
            return Ok(());
        }

        self.path.push(next);
        Ok(())
    }

    /// The finished plan; `None` when the player timed out
    pub fn finish(self) -> Result<Option<LinkPlan>> {
        match self.state {
            LinkBuilderState::Completed { destination } => Ok(Some(LinkPlan {
                nation: self.nation,
                kind: self.kind,
                origin: self.origin,
                destination,
                path: self.path,
            })),
            LinkBuilderState::TimedOut => Ok(None),
            LinkBuilderState::Cancelled | LinkBuilderState::AwaitingDirection => {
                Err(GameError::Cancelled(Self::action_for(self.kind)))
            }
        }
    }
}

/// Feed `events` into `builder` until it finishes
///
/// Each step waits at most `step_timeout`; a closed channel counts as a
/// cancel. Rejected steps are logged and the builder keeps waiting.
pub async fn collect_path(
    world: &RwLock<World>,
    mut builder: LinkBuilder,
    events: &mut mpsc::Receiver<LinkEvent>,
    step_timeout: Duration,
) -> LinkBuilder {
    while !builder.state().is_finished() {
        let event = match tokio::time::timeout(step_timeout, events.recv()).await {
            Ok(Some(event)) => event,
            Ok(None) => LinkEvent::Cancel,
            Err(_) => LinkEvent::Timeout,
        };
        let world = world.read().await;
        let handled = builder.handle(&world, event).map(|_| ());
        if let Err(err) = handled {
            tracing::warn!(error = %err, at = %builder.position(), "link step rejected");
        }
    }
    builder
}
