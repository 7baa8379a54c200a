//! Command layer
//!
//! Serializes mutations against the world and commits their changesets:
//! command -> GameService -> World operation -> Changeset -> Store

pub mod executor;
pub mod link_builder;

pub use executor::{duration_until_next_tick, GameService};
pub use link_builder::{LinkBuilder, LinkBuilderState, LinkEvent, LinkPlan};
