use thiserror::Error;

use crate::campaign::map::HexCoord;
use crate::core::types::NationId;

/// Domain rule violations. These are expected, recoverable conditions:
/// `Display` gives the diagnostic text for logs and `user_message` the
/// text shown to the player.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GameError {
    #[error("{kind} name {name:?} is already in use")]
    NameInUse { kind: &'static str, name: String },

    #[error("owner {0} already has a nation")]
    AlreadyHasNation(NationId),

    #[error("no nation registered for {0}")]
    NationNotFound(NationId),

    #[error("unit {unit} needs {needed} movement but has {remaining} left")]
    OutOfMovement {
        unit: String,
        needed: f64,
        remaining: f64,
    },

    #[error("invalid location for {action}: {reason}")]
    InvalidLocation { action: String, reason: String },

    #[error("coordinate {0} is outside the map bounds")]
    OutOfBounds(HexCoord),

    #[error("tile impassable: {0}")]
    Impassable(String),

    #[error("tile {0} has no free structure slots")]
    TooManyStructures(HexCoord),

    #[error("nation already holds a {0}")]
    TooManyUniqueStructures(String),

    #[error("{action} requires a {required}")]
    MissingStructure { action: String, required: String },

    #[error("{kind} {id:?} not found during {action}")]
    NotFound {
        kind: &'static str,
        action: String,
        id: String,
    },

    #[error("city tier {have} is below required tier {need}")]
    TierTooLow { have: u8, need: u8 },

    #[error("tile {0} is owned by another nation")]
    NotOwned(HexCoord),

    #[error("needs {need} influence, has {have}")]
    NotEnoughInfluence { need: u32, have: u32 },

    #[error("needs resources {need:?}, has {have:?}")]
    NotEnoughResources { need: Vec<String>, have: Vec<String> },

    #[error("{0} was cancelled")]
    Cancelled(String),
}

impl GameError {
    /// Shorthand for a missing-entity error
    pub fn not_found(kind: &'static str, action: impl Into<String>, id: impl ToString) -> Self {
        GameError::NotFound {
            kind,
            action: action.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_location(action: impl Into<String>, reason: impl Into<String>) -> Self {
        GameError::InvalidLocation {
            action: action.into(),
            reason: reason.into(),
        }
    }

    /// Items of `need` not covered by `have`, respecting multiplicity
    pub fn missing_resources(need: &[String], have: &[String]) -> Vec<String> {
        let mut pool: Vec<&String> = have.iter().collect();
        let mut missing = Vec::new();
        for item in need {
            match pool.iter().position(|h| *h == item) {
                Some(idx) => {
                    pool.swap_remove(idx);
                }
                None => missing.push(item.clone()),
            }
        }
        missing
    }

    /// Text shown to the player. Pure, carries no presentation state.
    pub fn user_message(&self) -> String {
        match self {
            GameError::NameInUse { kind, .. } if *kind == "nation" => {
                "That nation name is already taken!".to_string()
            }
            GameError::NameInUse { kind, .. } => format!("That {kind} name is already taken!"),
            GameError::AlreadyHasNation(_) => "You already have a nation!".to_string(),
            GameError::NationNotFound(_) => "You don't have a nation!".to_string(),
            GameError::OutOfMovement { .. } => {
                "That unit doesn't have enough movement left this season!".to_string()
            }
            GameError::InvalidLocation { reason, .. } => format!("You can't do that {reason}!"),
            GameError::OutOfBounds(_) => "That location is outside the map bounds!".to_string(),
            GameError::Impassable(reason) => format!("{}!", capitalize(reason)),
            GameError::TooManyStructures(_) => {
                "That tile can't hold any more structures!".to_string()
            }
            GameError::TooManyUniqueStructures(_) => {
                "You can't build more than one of those!".to_string()
            }
            GameError::MissingStructure { action, required } => {
                format!("{action} needs a {required} to be built first!")
            }
            GameError::NotFound { kind, id, .. } => format!("Couldn't find a {kind} at {id}!"),
            GameError::TierTooLow { need, .. } => {
                format!("The city needs to be tier {need} to do that!")
            }
            GameError::NotOwned(coord) => format!("You don't own {coord}!"),
            GameError::NotEnoughInfluence { need, have } => {
                format!("You need {need} influence to do that and only have {have}!")
            }
            GameError::NotEnoughResources { need, have } => {
                let missing = Self::missing_resources(need, have);
                format!(
                    "You don't have the resources! {} was missing.",
                    missing.join(", ")
                )
            }
            GameError::Cancelled(_) => "This action was cancelled.".to_string(),
        }
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Storage layer failures. Never expected during normal play.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Corrupt record in {table}: {detail}")]
    Corrupt { table: &'static str, detail: String },
}

/// Everything a command can fail with at the service boundary
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Game(#[from] GameError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn is_domain(&self) -> bool {
        matches!(self, ServiceError::Game(_))
    }

    pub fn user_message(&self) -> String {
        match self {
            ServiceError::Game(err) => err.user_message(),
            ServiceError::Store(_) => {
                "Something went wrong and the action was not saved.".to_string()
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, GameError>;
