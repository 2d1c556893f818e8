//! Ingestion orchestrator.
//!
//! Each record is applied in one store transaction: the id is reserved
//! first, then every aggregate the record touches is updated, then the
//! transaction commits. Any error before the commit drops the transaction,
//! so a rejected record leaves no trace.

use gameclub_store::{Store, Transaction, keys};
use tracing::{debug, trace};

use crate::extremal::{ExtremalTracker, read_count};
use crate::frequency::FrequencyTracker;
use crate::identity;
use crate::leaderboard::Leaderboard;
use crate::model::{self, Color, GameRecord, Player, Schedule};
use crate::{DuplicatePolicy, EngineConfig, EngineError, Registry, cluster};

/// Result of ingesting one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestOutcome {
    /// The record was new and every aggregate was updated.
    Applied,
    /// The record's id was already taken and the policy is to skip it.
    Skipped,
}

/// Applies players, schedules and game records to a store.
pub struct Ingestor<S> {
    store: S,
    config: EngineConfig,
}

impl<S: Store> Ingestor<S> {
    pub fn new(store: S, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn top_wins(&self) -> Leaderboard {
        Leaderboard::top_wins(self.config.leaderboard_capacity)
    }

    pub fn top_losses(&self) -> Leaderboard {
        Leaderboard::top_losses(self.config.leaderboard_capacity)
    }

    /// Register a new player with zeroed counters.
    #[tracing::instrument(skip(self, player), fields(user_id = %player.user_id))]
    pub async fn add_player(&self, player: &Player) -> Result<IngestOutcome, EngineError> {
        let mut tx = self.store.begin().await?;
        let policy = self.config.duplicate_players;
        if !admit(tx.as_mut(), Registry::Players, &player.user_id, policy).await? {
            return Ok(IngestOutcome::Skipped);
        }

        let pid = player.user_id.as_str();
        tx.set(&keys::player_email(pid), &player.email).await?;
        tx.set(&keys::player_wins(pid), "0").await?;
        tx.set(&keys::player_losses(pid), "0").await?;
        tx.set(&keys::player_draws(pid), "0").await?;
        tx.set(&keys::player_most_freq_opening_count(pid), "0")
            .await?;
        tx.sadd(keys::GLOBAL_PLAYERS_EMAILS, &[player.email.as_str()])
            .await?;

        tx.commit().await?;
        debug!("player added");
        Ok(IngestOutcome::Applied)
    }

    /// Schedule a game between two players.
    ///
    /// Each player gets an expiring pointer to the other and the game id at
    /// the head of a capped scheduled-games list.
    #[tracing::instrument(skip(self, schedule), fields(game_id = %schedule.game_id))]
    pub async fn add_schedule(&self, schedule: &Schedule) -> Result<IngestOutcome, EngineError> {
        let mut tx = self.store.begin().await?;
        let policy = self.config.duplicate_schedules;
        if !admit(tx.as_mut(), Registry::Games, &schedule.game_id, policy).await? {
            return Ok(IngestOutcome::Skipped);
        }

        let gid = schedule.game_id.as_str();
        let ttl = self.config.schedule_ttl();
        for (player, opponent) in [
            (&schedule.player_1, &schedule.player_2),
            (&schedule.player_2, &schedule.player_1),
        ] {
            let pointer = keys::player_scheduled_game_opponent(player, gid);
            tx.set(&pointer, opponent).await?;
            tx.expire(&pointer, ttl).await?;
        }

        let cap = self.config.scheduled_games_cap;
        for player in [&schedule.player_1, &schedule.player_2] {
            let list = keys::player_scheduled_games(player);
            tx.lpush(&list, &[gid]).await?;
            if cap == 0 {
                tx.delete(&list).await?;
            } else {
                tx.ltrim(&list, 0, cap as i64 - 1).await?;
            }
        }

        tx.commit().await?;
        debug!(
            player_1 = %schedule.player_1,
            player_2 = %schedule.player_2,
            "game scheduled"
        );
        Ok(IngestOutcome::Applied)
    }

    /// Record a completed game and update every derived aggregate.
    #[tracing::instrument(skip(self, record), fields(game_id = %record.game_id))]
    pub async fn add_game_record(&self, record: &GameRecord) -> Result<IngestOutcome, EngineError> {
        let mut tx = self.store.begin().await?;
        let policy = self.config.duplicate_games;
        if !admit(tx.as_mut(), Registry::Games, &record.game_id, policy).await? {
            return Ok(IngestOutcome::Skipped);
        }

        let moves = record.moveset.parse()?;

        self.record_sequences(tx.as_mut(), record, &moves).await?;
        for color in [Color::White, Color::Black] {
            self.record_player_side(tx.as_mut(), record, color).await?;
        }
        record_game_attributes(tx.as_mut(), record, &moves).await?;

        let eco = record.opening_eco.as_str();
        let eco_count = tx.incr_by(&keys::global_opening_count(eco), 1).await?;
        FrequencyTracker::global_opening()
            .observe(tx.as_mut(), eco, eco_count)
            .await?;

        record_turns(tx.as_mut(), record).await?;
        cluster::link(tx.as_mut(), &record.white_player_id, &record.black_player_id).await?;

        tx.commit().await?;
        debug!(moves = moves.len(), winner = %record.winner, "game recorded");
        Ok(IngestOutcome::Applied)
    }

    async fn record_sequences(
        &self,
        tx: &mut dyn Transaction,
        record: &GameRecord,
        moves: &[String],
    ) -> Result<(), EngineError> {
        let least = ExtremalTracker::least_common_sequences();
        let most = ExtremalTracker::most_common_sequences();

        for seq in model::three_move_sequences(moves) {
            tx.sadd(&keys::global_seq_games(&seq), &[record.game_id.as_str()])
                .await?;
            let count = tx.incr_by(&keys::global_seq_count(&seq), 1).await?;
            least.observe(tx, &seq, count).await?;
            most.observe(tx, &seq, count).await?;
        }
        Ok(())
    }

    async fn record_player_side(
        &self,
        tx: &mut dyn Transaction,
        record: &GameRecord,
        color: Color,
    ) -> Result<(), EngineError> {
        let pid = record.player(color);
        let opponent = record.player(color.opponent());
        let gid = record.game_id.as_str();

        match record.winner.color() {
            Some(winner) if winner == color => {
                let wins = tx.incr_by(&keys::player_wins(pid), 1).await?;
                self.top_wins().update(tx, pid, wins - 1, wins).await?;
            }
            Some(_) => {
                let losses = tx.incr_by(&keys::player_losses(pid), 1).await?;
                self.top_losses()
                    .update(tx, pid, losses - 1, losses)
                    .await?;
            }
            None => {
                tx.incr_by(&keys::player_draws(pid), 1).await?;
            }
        }

        tx.rpush(&keys::player_games_list(pid), &[gid]).await?;
        tx.sadd(&keys::player_games_set(pid), &[gid]).await?;
        tx.sadd(&keys::player_opponents(pid), &[opponent]).await?;

        // Openings count for both sides of the board.
        let eco = record.opening_eco.as_str();
        let count = tx
            .incr_by(&keys::player_opening_count(pid, eco), 1)
            .await?;
        FrequencyTracker::player_opening(pid)
            .observe(tx, eco, count)
            .await?;

        trace!(player = pid, ?color, "player side recorded");
        Ok(())
    }
}

/// Reserve `id`, applying `policy` when it is taken. Returns false for a
/// duplicate that should be skipped.
async fn admit(
    tx: &mut dyn Transaction,
    registry: Registry,
    id: &str,
    policy: DuplicatePolicy,
) -> Result<bool, EngineError> {
    match identity::ensure_new(tx, registry, id).await {
        Ok(()) => Ok(true),
        Err(EngineError::DuplicateIdentifier { .. }) if policy == DuplicatePolicy::Skip => {
            debug!(%registry, id, "skipping duplicate record");
            Ok(false)
        }
        Err(e) => Err(e),
    }
}

async fn record_game_attributes(
    tx: &mut dyn Transaction,
    record: &GameRecord,
    moves: &[String],
) -> Result<(), EngineError> {
    let gid = record.game_id.as_str();
    tx.set(&keys::game_winner(gid), record.winner.as_str())
        .await?;
    tx.set(&keys::game_victory_status(gid), &record.victory_status)
        .await?;
    tx.set(&keys::game_turns(gid), &record.number_of_turns.to_string())
        .await?;
    tx.set(
        &keys::game_checks(gid),
        &model::count_checks(moves).to_string(),
    )
    .await?;
    tx.set(&keys::game_white_player(gid), &record.white_player_id)
        .await?;
    tx.set(&keys::game_black_player(gid), &record.black_player_id)
        .await?;
    tx.set(&keys::game_opening_eco(gid), &record.opening_eco)
        .await?;

    if !moves.is_empty() {
        let moves: Vec<&str> = moves.iter().map(String::as_str).collect();
        tx.rpush(&keys::game_moves(gid), &moves).await?;
    }
    Ok(())
}

/// Shortest game so far. A tie keeps the game recorded first.
async fn record_turns(tx: &mut dyn Transaction, record: &GameRecord) -> Result<(), EngineError> {
    let turns = i64::from(record.number_of_turns);
    let shorter = match read_count(tx, keys::ANALYTICS_SHORTEST_GAME_TURNS).await? {
        Some(current) => turns < current,
        None => true,
    };
    if shorter {
        tx.set(keys::ANALYTICS_SHORTEST_GAME, &record.game_id)
            .await?;
        tx.set(keys::ANALYTICS_SHORTEST_GAME_TURNS, &turns.to_string())
            .await?;
    }
    Ok(())
}
