//! Nations - persistent hex-map nation building simulation
//!
//! Players found nations and cities on an axial hex grid, grow cities by
//! stocking resources, spend influence on structures and links, and move
//! armies and fleets whose battles resolve in a single stochastic step.

pub mod aggregate;
pub mod campaign;
pub mod city;
pub mod command;
pub mod core;
pub mod persist;
