//! City layer - settlements, stockpiles, buildings and links

pub mod building;
pub mod link;
pub mod settlement;
pub mod stockpile;

pub use building::{BuildingKind, Structure, StructureKind};
pub use link::{Link, LinkKind};
pub use settlement::City;
pub use stockpile::Stockpile;
