//! Capped, score-descending leaderboards.
//!
//! A leaderboard is a store list of `"{id}:{score}"` entries kept in
//! non-increasing score order. An update removes the entity's previous entry,
//! inserts the new one before the first entry whose score is not greater,
//! and trims the list to capacity. Among equal scores the most recently
//! updated entity therefore comes first.

use std::fmt;
use std::str::FromStr;

use gameclub_store::{Transaction, keys};
use serde::Serialize;
use tracing::trace;

use crate::EngineError;

/// One `(entity, score)` pair on a leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub entity_id: String,
    pub score: i64,
}

impl LeaderboardEntry {
    pub fn new(entity_id: impl Into<String>, score: i64) -> Self {
        Self {
            entity_id: entity_id.into(),
            score,
        }
    }
}

impl fmt::Display for LeaderboardEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_id, self.score)
    }
}

impl FromStr for LeaderboardEntry {
    type Err = String;

    /// The score follows the last colon, so entity ids may contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity_id, score) = s
            .rsplit_once(':')
            .ok_or_else(|| format!("entry {s:?} has no score"))?;
        let score = score
            .parse()
            .map_err(|_| format!("entry {s:?} has a non-numeric score"))?;
        Ok(Self::new(entity_id, score))
    }
}

/// A named ranking with a maximum length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Leaderboard {
    key: &'static str,
    capacity: usize,
}

impl Leaderboard {
    pub const fn new(key: &'static str, capacity: usize) -> Self {
        Self { key, capacity }
    }

    /// Players with the most wins.
    pub const fn top_wins(capacity: usize) -> Self {
        Self::new(keys::ANALYTICS_TOP_WINS, capacity)
    }

    /// Players with the most losses.
    pub const fn top_losses(capacity: usize) -> Self {
        Self::new(keys::ANALYTICS_TOP_LOSSES, capacity)
    }

    pub fn key(&self) -> &'static str {
        self.key
    }

    /// Record that `entity_id`'s score moved from `old_score` to `new_score`.
    ///
    /// Call right after incrementing the underlying counter. Returns the
    /// entity's zero-based rank, or `None` if it did not make the cut.
    pub async fn update(
        &self,
        tx: &mut dyn Transaction,
        entity_id: &str,
        old_score: i64,
        new_score: i64,
    ) -> Result<Option<usize>, EngineError> {
        let stale = LeaderboardEntry::new(entity_id, old_score).to_string();
        let fresh = LeaderboardEntry::new(entity_id, new_score).to_string();

        tx.lrem(self.key, 0, &stale).await?;
        let current = tx.lrange(self.key, 0, -1).await?;

        let mut rank = current.len();
        let mut pivot = None;
        for (i, item) in current.iter().enumerate() {
            if self.parse(item)?.score <= new_score {
                rank = i;
                pivot = Some(item);
                break;
            }
        }

        match pivot {
            Some(pivot) => {
                tx.linsert_before(self.key, pivot, &fresh).await?;
            }
            None => {
                tx.rpush(self.key, &[fresh.as_str()]).await?;
            }
        }

        if self.capacity == 0 {
            tx.delete(self.key).await?;
        } else {
            tx.ltrim(self.key, 0, self.capacity as i64 - 1).await?;
        }

        trace!(key = self.key, entity_id, new_score, rank, "leaderboard updated");
        Ok((rank < self.capacity).then_some(rank))
    }

    /// Current entries, best first.
    pub async fn entries(
        &self,
        tx: &mut dyn Transaction,
    ) -> Result<Vec<LeaderboardEntry>, EngineError> {
        tx.lrange(self.key, 0, -1)
            .await?
            .iter()
            .map(|item| self.parse(item))
            .collect()
    }

    fn parse(&self, item: &str) -> Result<LeaderboardEntry, EngineError> {
        item.parse()
            .map_err(|reason| EngineError::CorruptAggregate {
                key: self.key.to_string(),
                reason,
            })
    }
}
