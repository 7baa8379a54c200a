//! Aggregate layer - nations, their economy, the world and the tick
//!
//! The world is the single owner of all game state. Nations own their
//! cities and links; units live in the world keyed by id and are referenced
//! from their nation's military by name.

pub mod economy;
pub mod nation;
pub mod tick;
pub mod world;

pub use economy::{calculate_cap, Econ};
pub use nation::Nation;
pub use tick::{run_tick, TickSummary};
pub use world::{NationStatus, World};
