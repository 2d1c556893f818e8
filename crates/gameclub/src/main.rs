//! gameclub: incremental analytics for a board-game club
//!
//! Main binary with subcommands:
//! - `load`: Ingest a data directory into a fresh store and print the report

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use gameclub_engine::{
    DEFAULT_LEADERBOARD_CAPACITY, DEFAULT_SCHEDULE_TTL_SECS, DEFAULT_SCHEDULED_GAMES_CAP,
    DuplicatePolicy, EngineConfig, Ingestor,
};
use gameclub_store::{MemoryStore, Store};
use miette::Result;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod loader;
mod report;

use loader::ErrorPolicy;
use report::{AnalyticsReport, PlayerReport, Report};

/// Parse a duplicate-id policy, accepting "skip" or "reject" (case-insensitive).
fn parse_duplicate_policy(s: &str) -> Result<DuplicatePolicy, String> {
    match s.to_lowercase().as_str() {
        "skip" => Ok(DuplicatePolicy::Skip),
        "reject" => Ok(DuplicatePolicy::Reject),
        _ => Err(format!(
            "invalid duplicate policy '{}', expected skip or reject",
            s
        )),
    }
}

#[derive(Parser)]
#[command(name = "gameclub")]
#[command(about = "Incremental analytics for a board-game club", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load players, schedules and game records, then print the report
    Load {
        /// Directory holding players.csv, schedule.csv and game_records.csv
        #[arg(long, env = "GAMECLUB_DATA_DIR")]
        data_dir: PathBuf,

        /// Also print the friend-group report for this player (repeatable)
        #[arg(long = "player", value_name = "PLAYER_ID")]
        players: Vec<String>,

        /// What to do with a game id that was already recorded
        #[arg(long, env = "GAMECLUB_DUPLICATE_GAMES", value_parser = parse_duplicate_policy, default_value = "skip")]
        duplicate_games: DuplicatePolicy,

        /// What to do with a player id that was already registered
        #[arg(long, env = "GAMECLUB_DUPLICATE_PLAYERS", value_parser = parse_duplicate_policy, default_value = "reject")]
        duplicate_players: DuplicatePolicy,

        /// What to do with a schedule id that was already registered
        #[arg(long, env = "GAMECLUB_DUPLICATE_SCHEDULES", value_parser = parse_duplicate_policy, default_value = "reject")]
        duplicate_schedules: DuplicatePolicy,

        /// Entries kept on the top-wins and top-losses leaderboards
        #[arg(long, env = "GAMECLUB_LEADERBOARD_CAPACITY", default_value_t = DEFAULT_LEADERBOARD_CAPACITY)]
        leaderboard_capacity: usize,

        /// Entries kept on each player's scheduled-games list
        #[arg(long, env = "GAMECLUB_SCHEDULED_GAMES_CAP", default_value_t = DEFAULT_SCHEDULED_GAMES_CAP)]
        scheduled_games_cap: usize,

        /// Lifetime of a scheduled-opponent pointer in seconds
        #[arg(long, env = "GAMECLUB_SCHEDULE_TTL_SECS", default_value_t = DEFAULT_SCHEDULE_TTL_SECS)]
        schedule_ttl_secs: u64,

        /// What to do with a row that fails to decode or is rejected
        #[arg(long, value_enum, env = "GAMECLUB_ON_ERROR", default_value_t = ErrorPolicy::Skip)]
        on_error: ErrorPolicy,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gameclub=info".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Load {
            data_dir,
            players,
            duplicate_games,
            duplicate_players,
            duplicate_schedules,
            leaderboard_capacity,
            scheduled_games_cap,
            schedule_ttl_secs,
            on_error,
            json,
        } => {
            let config = EngineConfig::default()
                .with_leaderboard_capacity(leaderboard_capacity)
                .with_scheduled_games_cap(scheduled_games_cap)
                .with_schedule_ttl_secs(schedule_ttl_secs)
                .with_duplicate_games(duplicate_games)
                .with_duplicate_players(duplicate_players)
                .with_duplicate_schedules(duplicate_schedules);
            run_load(data_dir, players, config, on_error, json).await
        }
    }
}

async fn run_load(
    data_dir: PathBuf,
    players: Vec<String>,
    config: EngineConfig,
    on_error: ErrorPolicy,
    json: bool,
) -> Result<()> {
    let ingestor = Ingestor::new(MemoryStore::new(), config);
    debug!(config = ?ingestor.config(), "engine configured");

    let summaries = loader::load_dir(&ingestor, &data_dir, on_error)
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    for summary in &summaries {
        info!(
            file = %summary.file,
            loaded = summary.loaded,
            skipped = summary.skipped,
            failed = summary.failed,
            "file loaded"
        );
    }

    // All reads come from a single snapshot of the store.
    let mut tx = ingestor
        .store()
        .begin()
        .await.map_err(|e| miette::miette!("{}", e))?;
    let analytics = AnalyticsReport::collect(tx.as_mut())
        .await
        .map_err(|e| miette::miette!("{}", e))?;
    let mut player_reports = Vec::with_capacity(players.len());
    for player in &players {
        let player_report = PlayerReport::collect(tx.as_mut(), player)
            .await
            .map_err(|e| miette::miette!("failed to build report for {}: {}", player, e))?;
        player_reports.push(player_report);
    }
    drop(tx);

    let report = Report {
        analytics,
        players: player_reports,
    };
    if json {
        let out = serde_json::to_string_pretty(&report)
            .map_err(|e| miette::miette!("failed to serialize report: {}", e))?;
        println!("{out}");
    } else {
        print!("{report}");
    }
    Ok(())
}
