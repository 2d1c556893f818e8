//! Most frequent category per scope.

use gameclub_store::{Transaction, keys};
use serde::Serialize;
use tracing::trace;

use crate::EngineError;
use crate::extremal::read_count;

/// The leading category of a scope and how often it was seen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FrequencyLeader {
    pub category: String,
    pub count: i64,
}

/// Tracks the leading category for one scope.
///
/// The leader changes only when another category's count strictly exceeds
/// it, so the first category to reach a count keeps the lead on ties.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyTracker {
    leader_key: String,
    count_key: String,
}

impl FrequencyTracker {
    /// Most frequent opening across all games.
    pub fn global_opening() -> Self {
        Self {
            leader_key: keys::ANALYTICS_MOST_FREQ_OPENING.to_string(),
            count_key: keys::ANALYTICS_MOST_FREQ_OPENING_COUNT.to_string(),
        }
    }

    /// Most frequent opening in the games of `player`.
    pub fn player_opening(player: &str) -> Self {
        Self {
            leader_key: keys::player_most_freq_opening(player),
            count_key: keys::player_most_freq_opening_count(player),
        }
    }

    /// Feed the new count of `category`. Returns whether it took the lead.
    pub async fn observe(
        &self,
        tx: &mut dyn Transaction,
        category: &str,
        new_count: i64,
    ) -> Result<bool, EngineError> {
        let leads = match self.leader(tx).await? {
            Some(leader) => new_count > leader.count,
            None => true,
        };
        if leads {
            tx.set(&self.leader_key, category).await?;
            tx.set(&self.count_key, &new_count.to_string()).await?;
            trace!(key = %self.leader_key, category, new_count, "frequency leader replaced");
        }
        Ok(leads)
    }

    /// Current leader, if any category has been observed.
    ///
    /// A scope may carry a count without a category (players start at zero);
    /// that reads as no leader.
    pub async fn leader(
        &self,
        tx: &mut dyn Transaction,
    ) -> Result<Option<FrequencyLeader>, EngineError> {
        let Some(category) = tx.get(&self.leader_key).await? else {
            return Ok(None);
        };
        let count = read_count(tx, &self.count_key).await?.unwrap_or(0);
        Ok(Some(FrequencyLeader { category, count }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gameclub_store::{MemoryStore, Store};
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_strictly_greater_count_takes_the_lead() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let tracker = FrequencyTracker::global_opening();

        assert!(tracker.observe(tx.as_mut(), "C20", 1).await.unwrap());
        assert!(!tracker.observe(tx.as_mut(), "B01", 1).await.unwrap());
        assert!(tracker.observe(tx.as_mut(), "B01", 2).await.unwrap());
        assert!(!tracker.observe(tx.as_mut(), "C20", 2).await.unwrap());

        assert_eq!(
            tracker.leader(tx.as_mut()).await.unwrap(),
            Some(FrequencyLeader {
                category: "B01".to_string(),
                count: 2,
            })
        );
    }

    #[tokio::test]
    async fn test_player_scope_starts_without_leader() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();
        let tracker = FrequencyTracker::player_opening("p1");
        tx.set(&keys::player_most_freq_opening_count("p1"), "0")
            .await
            .unwrap();

        assert_eq!(tracker.leader(tx.as_mut()).await.unwrap(), None);
        assert!(tracker.observe(tx.as_mut(), "A00", 1).await.unwrap());
        // Scopes are independent.
        assert_eq!(
            FrequencyTracker::player_opening("p2")
                .leader(tx.as_mut())
                .await
                .unwrap(),
            None
        );
    }
}
