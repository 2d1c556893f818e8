//! Engine configuration.

use chrono::Duration;
use serde::{Deserialize, Serialize};

/// Number of entries kept on each leaderboard.
pub const DEFAULT_LEADERBOARD_CAPACITY: usize = 10;

/// Entries kept on a player's scheduled-games list.
pub const DEFAULT_SCHEDULED_GAMES_CAP: usize = 200;

/// Lifetime of a scheduled-opponent pointer (72 hours).
pub const DEFAULT_SCHEDULE_TTL_SECS: u64 = 259_200;

/// What to do when a record's id is already registered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Surface `DuplicateIdentifier` to the caller.
    #[default]
    Reject,
    /// Report the record as skipped.
    Skip,
}

/// Tunables for the ingestion orchestrator.
///
/// ```rust
/// use gameclub_engine::{DuplicatePolicy, EngineConfig};
///
/// let config = EngineConfig::default()
///     .with_leaderboard_capacity(25)
///     .with_duplicate_games(DuplicatePolicy::Reject);
/// assert_eq!(config.leaderboard_capacity, 25);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum length of the top-wins and top-losses lists.
    pub leaderboard_capacity: usize,
    /// Maximum length of each player's scheduled-games list.
    pub scheduled_games_cap: usize,
    /// Seconds before a scheduled-opponent pointer expires.
    pub schedule_ttl_secs: u64,
    /// Policy for repeated player ids.
    pub duplicate_players: DuplicatePolicy,
    /// Policy for repeated scheduled game ids.
    pub duplicate_schedules: DuplicatePolicy,
    /// Policy for repeated game record ids.
    ///
    /// Defaults to `Skip`: club exports repeat rows for the same game.
    pub duplicate_games: DuplicatePolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            leaderboard_capacity: DEFAULT_LEADERBOARD_CAPACITY,
            scheduled_games_cap: DEFAULT_SCHEDULED_GAMES_CAP,
            schedule_ttl_secs: DEFAULT_SCHEDULE_TTL_SECS,
            duplicate_players: DuplicatePolicy::Reject,
            duplicate_schedules: DuplicatePolicy::Reject,
            duplicate_games: DuplicatePolicy::Skip,
        }
    }
}

impl EngineConfig {
    pub fn with_leaderboard_capacity(mut self, capacity: usize) -> Self {
        self.leaderboard_capacity = capacity;
        self
    }

    pub fn with_scheduled_games_cap(mut self, cap: usize) -> Self {
        self.scheduled_games_cap = cap;
        self
    }

    pub fn with_schedule_ttl_secs(mut self, secs: u64) -> Self {
        self.schedule_ttl_secs = secs;
        self
    }

    pub fn with_duplicate_players(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_players = policy;
        self
    }

    pub fn with_duplicate_schedules(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_schedules = policy;
        self
    }

    pub fn with_duplicate_games(mut self, policy: DuplicatePolicy) -> Self {
        self.duplicate_games = policy;
        self
    }

    /// Scheduled-opponent pointer lifetime.
    pub fn schedule_ttl(&self) -> Duration {
        i64::try_from(self.schedule_ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }
}
