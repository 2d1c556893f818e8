//! Friend groups: players connected by a chain of recorded games.
//!
//! Each group is a member set under `global:friend_group:{fid}`, and every
//! member carries a pointer back to its group id. Linking two players either
//! creates a group, grows one, or merges two by moving the smaller group's
//! members into the larger one.

use std::collections::BTreeSet;

use gameclub_store::{Transaction, keys};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::EngineError;

/// How a link changed the groups.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LinkOutcome {
    /// Neither player had a group; a new one holds both.
    Created { group: String },
    /// One player had a group and the other joined it.
    Joined { group: String, newcomer: String },
    /// Both players were already in the same group.
    AlreadyLinked { group: String },
    /// Two groups became one; `absorbed` no longer exists.
    Merged {
        group: String,
        absorbed: String,
        moved: usize,
    },
}

impl LinkOutcome {
    /// Group both players belong to after the link.
    pub fn group(&self) -> &str {
        match self {
            LinkOutcome::Created { group }
            | LinkOutcome::Joined { group, .. }
            | LinkOutcome::AlreadyLinked { group }
            | LinkOutcome::Merged { group, .. } => group,
        }
    }
}

/// Record that `a` and `b` played each other.
///
/// When two groups of equal size meet, `a`'s group survives.
pub async fn link(tx: &mut dyn Transaction, a: &str, b: &str) -> Result<LinkOutcome, EngineError> {
    let group_a = group_of(tx, a).await?;
    let group_b = group_of(tx, b).await?;

    let outcome = match (group_a, group_b) {
        (None, None) => {
            let group = fresh_group_id(tx).await?;
            tx.sadd(&keys::global_friend_group(&group), &[a, b]).await?;
            tx.set(&keys::player_friend_group(a), &group).await?;
            tx.set(&keys::player_friend_group(b), &group).await?;
            LinkOutcome::Created { group }
        }
        (Some(group), None) => join(tx, group, b).await?,
        (None, Some(group)) => join(tx, group, a).await?,
        (Some(group_a), Some(group_b)) if group_a == group_b => {
            LinkOutcome::AlreadyLinked { group: group_a }
        }
        (Some(group_a), Some(group_b)) => {
            let size_a = tx.scard(&keys::global_friend_group(&group_a)).await?;
            let size_b = tx.scard(&keys::global_friend_group(&group_b)).await?;
            let (survivor, absorbed) = if size_a >= size_b {
                (group_a, group_b)
            } else {
                (group_b, group_a)
            };
            merge(tx, survivor, absorbed).await?
        }
    };

    debug!(a, b, ?outcome, "players linked");
    Ok(outcome)
}

async fn join(
    tx: &mut dyn Transaction,
    group: String,
    newcomer: &str,
) -> Result<LinkOutcome, EngineError> {
    tx.sadd(&keys::global_friend_group(&group), &[newcomer])
        .await?;
    tx.set(&keys::player_friend_group(newcomer), &group).await?;
    Ok(LinkOutcome::Joined {
        group,
        newcomer: newcomer.to_string(),
    })
}

async fn merge(
    tx: &mut dyn Transaction,
    survivor: String,
    absorbed: String,
) -> Result<LinkOutcome, EngineError> {
    let absorbed_key = keys::global_friend_group(&absorbed);
    let members = tx.smembers(&absorbed_key).await?;
    let moving: Vec<&str> = members.iter().map(String::as_str).collect();

    tx.sadd(&keys::global_friend_group(&survivor), &moving)
        .await?;
    for member in &moving {
        tx.set(&keys::player_friend_group(member), &survivor).await?;
    }
    tx.delete(&absorbed_key).await?;

    Ok(LinkOutcome::Merged {
        group: survivor,
        absorbed,
        moved: members.len(),
    })
}

/// Group ids are random; retry until one is unused.
async fn fresh_group_id(tx: &mut dyn Transaction) -> Result<String, EngineError> {
    loop {
        let candidate = Uuid::new_v4().simple().to_string();
        if !tx.exists(&keys::global_friend_group(&candidate)).await? {
            return Ok(candidate);
        }
    }
}

/// Group id of `player`, if it has played any game.
pub async fn group_of(tx: &mut dyn Transaction, player: &str) -> Result<Option<String>, EngineError> {
    Ok(tx.get(&keys::player_friend_group(player)).await?)
}

/// Every member of `player`'s group, including `player`. Empty when the
/// player has no group.
pub async fn members(
    tx: &mut dyn Transaction,
    player: &str,
) -> Result<BTreeSet<String>, EngineError> {
    match group_of(tx, player).await? {
        Some(group) => Ok(tx.smembers(&keys::global_friend_group(&group)).await?),
        None => Ok(BTreeSet::new()),
    }
}

/// Members of `player`'s group that are in none of the sets at `excluded`.
pub async fn members_excluding(
    tx: &mut dyn Transaction,
    player: &str,
    excluded: &[&str],
) -> Result<BTreeSet<String>, EngineError> {
    let Some(group) = group_of(tx, player).await? else {
        return Ok(BTreeSet::new());
    };
    let group_key = keys::global_friend_group(&group);
    let mut operands = vec![group_key.as_str()];
    operands.extend_from_slice(excluded);
    Ok(tx.sdiff(&operands).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gameclub_store::{MemoryStore, Store};
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_create_join_and_noop() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let created = link(tx.as_mut(), "a", "b").await.unwrap();
        assert!(matches!(created, LinkOutcome::Created { .. }));
        assert_eq!(created.group().len(), 32);

        let joined = link(tx.as_mut(), "c", "b").await.unwrap();
        assert_eq!(
            joined,
            LinkOutcome::Joined {
                group: created.group().to_string(),
                newcomer: "c".to_string(),
            }
        );

        let again = link(tx.as_mut(), "a", "c").await.unwrap();
        assert!(matches!(again, LinkOutcome::AlreadyLinked { .. }));
        assert_eq!(members(tx.as_mut(), "a").await.unwrap(), names(&["a", "b", "c"]));
    }

    #[tokio::test]
    async fn test_smaller_group_is_absorbed() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let big = link(tx.as_mut(), "a", "b").await.unwrap();
        link(tx.as_mut(), "a", "c").await.unwrap();
        let small = link(tx.as_mut(), "x", "y").await.unwrap();

        let merged = link(tx.as_mut(), "y", "c").await.unwrap();
        assert_eq!(
            merged,
            LinkOutcome::Merged {
                group: big.group().to_string(),
                absorbed: small.group().to_string(),
                moved: 2,
            }
        );
        assert!(!tx
            .exists(&keys::global_friend_group(small.group()))
            .await
            .unwrap());
        for player in ["a", "b", "c", "x", "y"] {
            assert_eq!(
                group_of(tx.as_mut(), player).await.unwrap().as_deref(),
                Some(big.group())
            );
        }
    }

    #[tokio::test]
    async fn test_equal_sizes_keep_first_group() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        let first = link(tx.as_mut(), "a", "b").await.unwrap();
        let second = link(tx.as_mut(), "c", "d").await.unwrap();

        let merged = link(tx.as_mut(), "d", "a").await.unwrap();
        assert_eq!(merged.group(), second.group());
        assert!(!tx
            .exists(&keys::global_friend_group(first.group()))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_members_excluding_opponents() {
        let store = MemoryStore::new();
        let mut tx = store.begin().await.unwrap();

        link(tx.as_mut(), "p0", "b").await.unwrap();
        link(tx.as_mut(), "b", "c").await.unwrap();
        tx.sadd(&keys::player_opponents("p0"), &["b"]).await.unwrap();

        let opponents = keys::player_opponents("p0");
        let rest = members_excluding(tx.as_mut(), "p0", &[opponents.as_str()])
            .await
            .unwrap();
        assert_eq!(rest, names(&["c", "p0"]));
        assert!(members_excluding(tx.as_mut(), "nobody", &[])
            .await
            .unwrap()
            .is_empty());
    }
}
