//! Nations - Entry Point
//!
//! Command-line front-end over the game service: database setup, forced and
//! scheduled ticks, and the player commands the chat layer would issue.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use nations::campaign::map::{Direction, HexCoord};
use nations::campaign::terrain::{TerrainDataset, TerrainError};
use nations::city::building::BuildingKind;
use nations::city::link::LinkKind;
use nations::command::{GameService, LinkEvent};
use nations::core::config::{ConfigError, GameConfig};
use nations::core::error::{ServiceError, StoreError};
use nations::core::types::NationId;
use nations::persist::SqliteStore;

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Terrain(#[from] TerrainError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("{}", .0.user_message())]
    Service(#[from] ServiceError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Nations - hex-map nation building simulation
#[derive(Parser, Debug)]
#[command(name = "nations")]
#[command(about = "Run and administer a nations game world")]
struct Args {
    /// Game configuration file (TOML)
    #[arg(long, default_value = "nations.toml")]
    config: PathBuf,

    /// Log filter, overriding RUST_LOG
    #[arg(long)]
    log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and seed tiles from the terrain dataset
    Init,
    /// Run one tick now
    Tick,
    /// Tick daily at the configured hour until Ctrl-C
    Run,
    /// Show a nation's summary
    Status {
        #[arg(long)]
        nation: u64,
    },
    /// Found a nation with its capital
    Found {
        #[arg(long)]
        founder: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        capital: String,
        /// Capital location as "(q, r)"
        #[arg(long)]
        at: HexCoord,
    },
    /// Found another city
    City {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        name: String,
        #[arg(long)]
        at: HexCoord,
    },
    /// Build a structure for a city
    Build {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        city: String,
        #[arg(long)]
        structure: BuildingKind,
        /// Target tile, defaults to the city tile
        #[arg(long)]
        at: Option<HexCoord>,
    },
    /// Build a link by walking directions from the origin city
    Link {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        kind: LinkKind,
        #[arg(long)]
        origin: String,
        /// Comma separated directions, e.g. "se,se,ne"
        #[arg(long, value_delimiter = ',')]
        steps: Vec<Direction>,
    },
    /// Train an army in a city
    Train {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        city: String,
        #[arg(long)]
        name: String,
    },
    /// Build a fleet in a port city
    Fleet {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        city: String,
        #[arg(long)]
        name: String,
    },
    /// Move a unit one tile
    Move {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        unit: String,
        #[arg(long)]
        direction: Direction,
    },
    /// Form or break an alliance
    Ally {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        with: u64,
        /// Break the alliance instead
        #[arg(long)]
        dissolve: bool,
    },
    /// Replace a nation's dossier
    Dossier {
        #[arg(long)]
        nation: u64,
        #[arg(long)]
        text: String,
    },
}

fn load_config(path: &Path) -> Result<GameConfig, CliError> {
    let config = if path.exists() {
        GameConfig::load(path)?
    } else {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        GameConfig::default()
    };
    config.validate().map_err(CliError::Invalid)?;
    Ok(config)
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let filter = match &args.log {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nations=info")),
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(err) = run(args).await {
        tracing::error!(error = %err, "command failed");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let config = load_config(&args.config)?;
    let dataset = TerrainDataset::load_from_file(&config.world.terrain_dataset)?;
    tracing::info!(tiles = dataset.len(), "terrain dataset loaded");

    if let Some(parent) = config.storage.database.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(StoreError::from)?;
        }
    }
    let store = SqliteStore::open(&config.storage.database)?;
    let service = GameService::open(store, dataset, config)?;

    match args.command {
        Command::Init => {
            let tiles = service.seed_tiles().await?;
            println!("Seeded {tiles} tiles");
        }
        Command::Tick => {
            let summary = service.force_tick().await?;
            println!(
                "Tick {} done, season is now {} ({} nations)",
                summary.ticks,
                summary.season,
                summary.nations.len()
            );
        }
        Command::Run => {
            service
                .run_daily(async {
                    let _ = tokio::signal::ctrl_c().await;
                })
                .await?;
        }
        Command::Status { nation } => {
            print!("{}", service.status(NationId(nation)).await?);
        }
        Command::Found {
            founder,
            name,
            capital,
            at,
        } => {
            service
                .found_nation(NationId(founder), &name, &capital, at)
                .await?;
            println!("{name} was founded with its capital {capital} at {at}");
        }
        Command::City { nation, name, at } => {
            service.found_city(NationId(nation), &name, at).await?;
            println!("{name} was founded at {at}");
        }
        Command::Build {
            nation,
            city,
            structure,
            at,
        } => {
            let built = service
                .build_structure(NationId(nation), &city, structure, at)
                .await?;
            println!("Your {structure} has been built in {city} at {}", built.location);
        }
        Command::Link {
            nation,
            kind,
            origin,
            steps,
        } => {
            let (tx, mut rx) = mpsc::channel(steps.len().max(1));
            for step in steps {
                let _ = tx.send(LinkEvent::Step(step)).await;
            }
            drop(tx);
            match service
                .build_link_interactive(NationId(nation), kind, &origin, &mut rx)
                .await?
            {
                Some(link) => println!(
                    "Your {kind} has been built from {} to {}",
                    link.origin, link.destination
                ),
                None => println!("Link building timed out"),
            }
        }
        Command::Train { nation, city, name } => {
            service.train_army(NationId(nation), &name, &city).await?;
            println!("{name} has been trained in {city}");
        }
        Command::Fleet { nation, city, name } => {
            service.build_fleet(NationId(nation), &name, &city).await?;
            println!("{name} has been launched from {city}");
        }
        Command::Move {
            nation,
            unit,
            direction,
        } => {
            let report = service.move_unit(NationId(nation), &unit, direction).await?;
            println!(
                "{unit} moved to {} with {:.2} movement left",
                report.to, report.movement_left
            );
            if let Some(battle) = report.battle {
                println!(
                    "Battle at {}: {:?} (impact {:.2})",
                    battle.location, battle.outcome, battle.scaled_impact
                );
            }
        }
        Command::Ally {
            nation,
            with,
            dissolve,
        } => {
            service
                .set_alliance(NationId(nation), NationId(with), !dissolve)
                .await?;
            println!("Alliance updated");
        }
        Command::Dossier { nation, text } => {
            service.set_dossier(NationId(nation), &text).await?;
            println!("Dossier changed");
        }
    }
    Ok(())
}
