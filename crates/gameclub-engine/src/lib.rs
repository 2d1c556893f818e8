//! Incremental aggregate engine for the board-game club.
//!
//! This crate provides:
//! - Creation-time id uniqueness ([`identity`])
//! - Capped score leaderboards ([`Leaderboard`])
//! - Least/most common category tracking with a bounded rescan fallback
//!   ([`ExtremalTracker`])
//! - Friend groups merged by size ([`cluster`])
//! - Most frequent category per scope ([`FrequencyTracker`])
//! - The [`Ingestor`], which drives all of the above for each record
//! - Read-side [`queries`]
//!
//! Components hold no state of their own: everything lives in the store and
//! is updated inside the transaction of the record being ingested.

pub mod cluster;
mod config;
mod error;
pub mod extremal;
pub mod frequency;
pub mod identity;
mod ingest;
pub mod leaderboard;
pub mod model;
pub mod queries;

pub use config::{
    DEFAULT_LEADERBOARD_CAPACITY, DEFAULT_SCHEDULE_TTL_SECS, DEFAULT_SCHEDULED_GAMES_CAP,
    DuplicatePolicy, EngineConfig,
};
pub use error::{EngineError, Registry};
pub use extremal::{ExtremalSet, ExtremalTracker, Polarity, Transition};
pub use frequency::{FrequencyLeader, FrequencyTracker};
pub use ingest::{IngestOutcome, Ingestor};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use model::{Color, GameRecord, MoveSet, Player, Schedule, Winner};
