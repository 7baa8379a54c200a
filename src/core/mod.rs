pub mod calendar;
pub mod config;
pub mod error;
pub mod types;

pub use calendar::{Calendar, Season};
pub use config::GameConfig;
pub use error::{GameError, Result, ServiceError, StoreError};
