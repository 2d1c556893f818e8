//! Read-side queries over the maintained aggregates.
//!
//! All queries read through a transaction, so a caller that runs several of
//! them on one transaction sees a single consistent state.

use std::collections::{BTreeMap, BTreeSet};

use gameclub_store::{Transaction, keys};
use serde::Serialize;

use crate::EngineError;
use crate::extremal::{ExtremalSet, ExtremalTracker, read_count};
use crate::frequency::{FrequencyLeader, FrequencyTracker};
use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::{DEFAULT_LEADERBOARD_CAPACITY, cluster};

/// The game with the fewest turns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ShortestGame {
    pub game_id: String,
    pub number_of_turns: i64,
}

/// A player's outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PlayerRecord {
    pub wins: i64,
    pub losses: i64,
    pub draws: i64,
}

// =========================================================================
// Analytics
// =========================================================================

pub async fn top_wins(tx: &mut dyn Transaction) -> Result<Vec<LeaderboardEntry>, EngineError> {
    Leaderboard::top_wins(DEFAULT_LEADERBOARD_CAPACITY)
        .entries(tx)
        .await
}

pub async fn top_losses(tx: &mut dyn Transaction) -> Result<Vec<LeaderboardEntry>, EngineError> {
    Leaderboard::top_losses(DEFAULT_LEADERBOARD_CAPACITY)
        .entries(tx)
        .await
}

pub async fn shortest_game(tx: &mut dyn Transaction) -> Result<Option<ShortestGame>, EngineError> {
    let Some(game_id) = tx.get(keys::ANALYTICS_SHORTEST_GAME).await? else {
        return Ok(None);
    };
    let number_of_turns = read_count(tx, keys::ANALYTICS_SHORTEST_GAME_TURNS)
        .await?
        .unwrap_or(0);
    Ok(Some(ShortestGame {
        game_id,
        number_of_turns,
    }))
}

/// Number of checks in every recorded game, by game id.
pub async fn check_counts(tx: &mut dyn Transaction) -> Result<BTreeMap<String, i64>, EngineError> {
    let mut counts = BTreeMap::new();
    for key in tx.scan(keys::GAME_CHECKS_PATTERN).await? {
        let Some(game_id) = keys::game_id_from_checks_key(&key) else {
            continue;
        };
        if let Some(count) = read_count(tx, &key).await? {
            counts.insert(game_id.to_string(), count);
        }
    }
    Ok(counts)
}

pub async fn game_check_count(
    tx: &mut dyn Transaction,
    game_id: &str,
) -> Result<Option<i64>, EngineError> {
    read_count(tx, &keys::game_checks(game_id)).await
}

pub async fn most_frequent_opening(
    tx: &mut dyn Transaction,
) -> Result<Option<FrequencyLeader>, EngineError> {
    FrequencyTracker::global_opening().leader(tx).await
}

pub async fn most_common_sequences(tx: &mut dyn Transaction) -> Result<ExtremalSet, EngineError> {
    ExtremalTracker::most_common_sequences().read(tx).await
}

pub async fn least_common_sequences(tx: &mut dyn Transaction) -> Result<ExtremalSet, EngineError> {
    ExtremalTracker::least_common_sequences().read(tx).await
}

/// Games in which `seq` was played.
pub async fn games_with_sequence(
    tx: &mut dyn Transaction,
    seq: &str,
) -> Result<BTreeSet<String>, EngineError> {
    Ok(tx.smembers(&keys::global_seq_games(seq)).await?)
}

// =========================================================================
// Players
// =========================================================================

pub async fn player_record(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<PlayerRecord, EngineError> {
    Ok(PlayerRecord {
        wins: read_count(tx, &keys::player_wins(player)).await?.unwrap_or(0),
        losses: read_count(tx, &keys::player_losses(player))
            .await?
            .unwrap_or(0),
        draws: read_count(tx, &keys::player_draws(player)).await?.unwrap_or(0),
    })
}

pub async fn player_most_frequent_opening(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<Option<FrequencyLeader>, EngineError> {
    FrequencyTracker::player_opening(player).leader(tx).await
}

/// Game ids of `player` in the order they were recorded.
pub async fn match_history(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<Vec<String>, EngineError> {
    Ok(tx.lrange(&keys::player_games_list(player), 0, -1).await?)
}

/// Scheduled game ids of `player`, most recent first.
pub async fn scheduled_games(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<Vec<String>, EngineError> {
    Ok(tx
        .lrange(&keys::player_scheduled_games(player), 0, -1)
        .await?)
}

/// Opponent of `player` in scheduled game `game_id`, until the pointer expires.
pub async fn scheduled_opponent(
    tx: &mut dyn Transaction,
    player: &str,
    game_id: &str,
) -> Result<Option<String>, EngineError> {
    Ok(tx
        .get(&keys::player_scheduled_game_opponent(player, game_id))
        .await?)
}

pub async fn is_email_registered(
    tx: &mut dyn Transaction,
    email: &str,
) -> Result<bool, EngineError> {
    Ok(tx.sismember(keys::GLOBAL_PLAYERS_EMAILS, email).await?)
}

/// Games played between `a` and `b`.
pub async fn games_between(
    tx: &mut dyn Transaction,
    a: &str,
    b: &str,
) -> Result<BTreeSet<String>, EngineError> {
    let set_a = keys::player_games_set(a);
    let set_b = keys::player_games_set(b);
    Ok(tx.sinter(&[&set_a, &set_b]).await?)
}

/// Games of `player` in which `seq` was played.
pub async fn player_games_with_sequence(
    tx: &mut dyn Transaction,
    player: &str,
    seq: &str,
) -> Result<BTreeSet<String>, EngineError> {
    let seq_games = keys::global_seq_games(seq);
    let player_games = keys::player_games_set(player);
    Ok(tx.sinter(&[&seq_games, &player_games]).await?)
}

// =========================================================================
// Friend groups
// =========================================================================

/// Members of `player`'s friend group, `player` included.
pub async fn friend_group(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<BTreeSet<String>, EngineError> {
    cluster::members(tx, player).await
}

/// Players in `player`'s friend group who never played `player` directly.
pub async fn friends_of_friends(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<BTreeSet<String>, EngineError> {
    let opponents = keys::player_opponents(player);
    let mut found = cluster::members_excluding(tx, player, &[&opponents]).await?;
    found.remove(player);
    Ok(found)
}

/// Friends of friends with strictly more wins than `player`.
pub async fn stronger_friends_of_friends(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<BTreeSet<String>, EngineError> {
    let candidates = friends_of_friends(tx, player).await?;
    let bar = player_record(tx, player).await?.wins;

    let mut stronger = BTreeSet::new();
    for candidate in candidates {
        let wins = read_count(tx, &keys::player_wins(&candidate))
            .await?
            .unwrap_or(0);
        if wins > bar {
            stronger.insert(candidate);
        }
    }
    Ok(stronger)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GameRecord, MoveSet, Player, Schedule, Winner};
    use crate::{EngineConfig, Ingestor};
    use gameclub_store::{MemoryStore, Store};
    use pretty_assertions::assert_eq;

    fn record(id: &str, white: &str, black: &str, winner: Winner, moves: &str) -> GameRecord {
        GameRecord {
            game_id: id.to_string(),
            moveset: MoveSet::Encoded(moves.to_string()),
            winner,
            victory_status: "mate".to_string(),
            number_of_turns: moves.split_whitespace().count() as u32,
            white_player_id: white.to_string(),
            black_player_id: black.to_string(),
            opening_eco: "B21".to_string(),
        }
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    /// p0 plays a and b; a plays c; b plays d twice.
    async fn club() -> MemoryStore {
        let store = MemoryStore::new();
        let ingestor = Ingestor::new(store.clone(), EngineConfig::default());
        for id in ["p0", "a", "b", "c", "d"] {
            let player = Player {
                user_id: id.to_string(),
                email: format!("{id}@club.test"),
            };
            ingestor.add_player(&player).await.unwrap();
        }
        let games = [
            record("g1", "p0", "a", Winner::White, "e4 c5 Nf3 d6"),
            record("g2", "b", "p0", Winner::Draw, "d4 d5"),
            record("g3", "a", "c", Winner::Black, "e4 c5 Nf3 Nc6 Bb5+"),
            record("g4", "d", "b", Winner::White, "c4 e5 Nc3"),
            record("g5", "b", "d", Winner::Black, "e4 c5 Nf3"),
        ];
        for game in &games {
            ingestor.add_game_record(game).await.unwrap();
        }
        ingestor
            .add_schedule(&Schedule {
                game_id: "s1".to_string(),
                player_1: "p0".to_string(),
                player_2: "c".to_string(),
            })
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn test_player_queries() {
        let store = club().await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(match_history(tx.as_mut(), "p0").await.unwrap(), vec!["g1", "g2"]);
        assert_eq!(scheduled_games(tx.as_mut(), "c").await.unwrap(), vec!["s1"]);
        assert_eq!(
            scheduled_opponent(tx.as_mut(), "c", "s1").await.unwrap().as_deref(),
            Some("p0")
        );
        assert!(is_email_registered(tx.as_mut(), "d@club.test").await.unwrap());
        assert!(!is_email_registered(tx.as_mut(), "z@club.test").await.unwrap());
        assert_eq!(games_between(tx.as_mut(), "b", "d").await.unwrap(), set(&["g4", "g5"]));
        assert_eq!(
            player_record(tx.as_mut(), "d").await.unwrap(),
            PlayerRecord {
                wins: 2,
                losses: 0,
                draws: 0,
            }
        );
        assert_eq!(
            player_most_frequent_opening(tx.as_mut(), "d")
                .await
                .unwrap()
                .map(|leader| leader.count),
            Some(2)
        );
    }

    #[tokio::test]
    async fn test_sequence_queries() {
        let store = club().await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(
            games_with_sequence(tx.as_mut(), "e4,c5,Nf3").await.unwrap(),
            set(&["g1", "g3", "g5"])
        );
        assert_eq!(
            player_games_with_sequence(tx.as_mut(), "a", "e4,c5,Nf3")
                .await
                .unwrap(),
            set(&["g1", "g3"])
        );
        let most = most_common_sequences(tx.as_mut()).await.unwrap();
        assert_eq!(most.count, Some(3));
        assert_eq!(most.categories, set(&["e4,c5,Nf3"]));
        let least = least_common_sequences(tx.as_mut()).await.unwrap();
        assert_eq!(least.count, Some(1));
        assert_eq!(
            least.categories,
            set(&["c4,e5,Nc3", "c5,Nf3,Nc6", "c5,Nf3,d6", "Nf3,Nc6,Bb5+"])
        );
    }

    #[tokio::test]
    async fn test_analytics_queries() {
        let store = club().await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(
            shortest_game(tx.as_mut()).await.unwrap(),
            Some(ShortestGame {
                game_id: "g2".to_string(),
                number_of_turns: 2,
            })
        );
        let checks = check_counts(tx.as_mut()).await.unwrap();
        assert_eq!(checks.len(), 5);
        assert_eq!(checks["g3"], 1);
        assert_eq!(game_check_count(tx.as_mut(), "g1").await.unwrap(), Some(0));
        assert_eq!(
            most_frequent_opening(tx.as_mut()).await.unwrap(),
            Some(FrequencyLeader {
                category: "B21".to_string(),
                count: 5,
            })
        );
        let wins: Vec<String> = top_wins(tx.as_mut())
            .await
            .unwrap()
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(wins, vec!["d:2", "c:1", "p0:1"]);
    }

    #[tokio::test]
    async fn test_friend_group_queries() {
        let store = club().await;
        let mut tx = store.begin().await.unwrap();

        assert_eq!(
            friend_group(tx.as_mut(), "c").await.unwrap(),
            set(&["a", "b", "c", "d", "p0"])
        );
        assert_eq!(friends_of_friends(tx.as_mut(), "p0").await.unwrap(), set(&["c", "d"]));
        // p0 has one win; d has two, c has one.
        assert_eq!(
            stronger_friends_of_friends(tx.as_mut(), "p0").await.unwrap(),
            set(&["d"])
        );
        assert!(friends_of_friends(tx.as_mut(), "stranger").await.unwrap().is_empty());
    }
}
