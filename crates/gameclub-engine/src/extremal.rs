//! Extremal category tracking.
//!
//! Keeps the current minimum (or maximum) occurrence count across an
//! unbounded category space together with every category tied at it.
//!
//! Each observation is classified into a [`Transition`] by the pure
//! [`classify`] function and then applied. The fast path never looks at other
//! categories. Only when a "least" cohort empties (its last member counted
//! past the minimum) does [`ExtremalTracker::rescan`] read every category
//! counter to find the new minimum.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use gameclub_store::{Transaction, keys};
use serde::Serialize;
use tracing::{debug, trace};

use crate::EngineError;

/// Which extreme is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    Least,
    Most,
}

impl Polarity {
    /// Whether `candidate` is strictly better than `current`.
    pub fn improves(self, candidate: i64, current: i64) -> bool {
        match self {
            Polarity::Least => candidate < current,
            Polarity::Most => candidate > current,
        }
    }
}

/// Membership of the observed category in the current extremal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Standing {
    Outsider,
    /// A member of a set holding `cohort_size` categories, itself included.
    Member { cohort_size: usize },
}

/// What an observation does to the extremal set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    /// Nothing to write.
    Unchanged,
    /// New extreme: the set becomes exactly this category.
    Replaced,
    /// Same count as the extreme: join the set.
    Tied,
    /// The category left the set and others remain.
    Withdrawn,
    /// The category left the set and it is now empty.
    NeedsRescan,
}

/// Classify an observation of a category whose counter reached `new_count`.
///
/// `extreme` is the recorded extreme count, `None` before the first
/// observation. `standing` only matters when the count moved away from the
/// extreme.
pub fn classify(
    polarity: Polarity,
    extreme: Option<i64>,
    new_count: i64,
    standing: Standing,
) -> Transition {
    let Some(extreme) = extreme else {
        return Transition::Replaced;
    };
    if polarity.improves(new_count, extreme) {
        return Transition::Replaced;
    }
    if new_count == extreme {
        return Transition::Tied;
    }
    // Counts only grow, so a "most" member can never fall behind.
    match (polarity, standing) {
        (Polarity::Least, Standing::Member { cohort_size }) if cohort_size > 1 => {
            Transition::Withdrawn
        }
        (Polarity::Least, Standing::Member { .. }) => Transition::NeedsRescan,
        _ => Transition::Unchanged,
    }
}

/// An extreme count and the categories holding it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtremalSet {
    pub count: Option<i64>,
    pub categories: BTreeSet<String>,
}

/// Extremal tracker over one family of category counters.
#[derive(Debug, Clone, Copy)]
pub struct ExtremalTracker {
    polarity: Polarity,
    set_key: &'static str,
    count_key: &'static str,
    counter_pattern: &'static str,
    category_of: fn(&str) -> Option<&str>,
}

impl ExtremalTracker {
    /// Least common three-move sequences.
    pub const fn least_common_sequences() -> Self {
        Self {
            polarity: Polarity::Least,
            set_key: keys::ANALYTICS_LEAST_COMMON_SEQS,
            count_key: keys::ANALYTICS_LEAST_COMMON_SEQ_COUNT,
            counter_pattern: keys::GLOBAL_SEQ_COUNT_PATTERN,
            category_of: keys::seq_from_count_key,
        }
    }

    /// Most common three-move sequences.
    pub const fn most_common_sequences() -> Self {
        Self {
            polarity: Polarity::Most,
            set_key: keys::ANALYTICS_MOST_COMMON_SEQS,
            count_key: keys::ANALYTICS_MOST_COMMON_SEQ_COUNT,
            counter_pattern: keys::GLOBAL_SEQ_COUNT_PATTERN,
            category_of: keys::seq_from_count_key,
        }
    }

    /// Feed the new count of `category` and apply the resulting transition.
    pub async fn observe(
        &self,
        tx: &mut dyn Transaction,
        category: &str,
        new_count: i64,
    ) -> Result<Transition, EngineError> {
        let extreme = self.extreme_count(tx).await?;
        let standing = match extreme {
            Some(extreme) if self.polarity.improves(extreme, new_count) => {
                self.standing(tx, category).await?
            }
            _ => Standing::Outsider,
        };

        let transition = classify(self.polarity, extreme, new_count, standing);
        match transition {
            Transition::Unchanged => {}
            Transition::Replaced => {
                tx.delete(self.set_key).await?;
                tx.sadd(self.set_key, &[category]).await?;
                tx.set(self.count_key, &new_count.to_string()).await?;
            }
            Transition::Tied => {
                tx.sadd(self.set_key, &[category]).await?;
            }
            Transition::Withdrawn => {
                tx.srem(self.set_key, category).await?;
            }
            Transition::NeedsRescan => {
                tx.srem(self.set_key, category).await?;
                self.rescan(tx).await?;
            }
        }

        trace!(
            polarity = ?self.polarity,
            category,
            new_count,
            ?transition,
            "extremal observation"
        );
        Ok(transition)
    }

    /// Recompute the extreme from every category counter and replace the
    /// recorded set with it. Counters at zero or below are ignored.
    pub async fn rescan(&self, tx: &mut dyn Transaction) -> Result<ExtremalSet, EngineError> {
        let mut found = ExtremalSet::default();
        let counters = tx.scan(self.counter_pattern).await?;
        let scanned = counters.len();

        for key in counters {
            let Some(category) = (self.category_of)(&key) else {
                continue;
            };
            let Some(count) = read_count(tx, &key).await? else {
                continue;
            };
            if count <= 0 {
                continue;
            }
            let ordering = match found.count {
                None => Ordering::Greater,
                Some(best) if self.polarity.improves(count, best) => Ordering::Greater,
                Some(best) if count == best => Ordering::Equal,
                Some(_) => Ordering::Less,
            };
            match ordering {
                Ordering::Greater => {
                    found.count = Some(count);
                    found.categories = BTreeSet::from([category.to_string()]);
                }
                Ordering::Equal => {
                    found.categories.insert(category.to_string());
                }
                Ordering::Less => {}
            }
        }

        tx.delete(self.set_key).await?;
        match found.count {
            Some(count) => {
                let members: Vec<&str> = found.categories.iter().map(String::as_str).collect();
                tx.sadd(self.set_key, &members).await?;
                tx.set(self.count_key, &count.to_string()).await?;
            }
            None => {
                tx.delete(self.count_key).await?;
            }
        }

        debug!(
            polarity = ?self.polarity,
            scanned,
            count = ?found.count,
            cohort = found.categories.len(),
            "extremal set rebuilt from counters"
        );
        Ok(found)
    }

    /// The recorded extreme and its categories.
    pub async fn read(&self, tx: &mut dyn Transaction) -> Result<ExtremalSet, EngineError> {
        Ok(ExtremalSet {
            count: self.extreme_count(tx).await?,
            categories: tx.smembers(self.set_key).await?,
        })
    }

    async fn extreme_count(&self, tx: &mut dyn Transaction) -> Result<Option<i64>, EngineError> {
        read_count(tx, self.count_key).await
    }

    async fn standing(
        &self,
        tx: &mut dyn Transaction,
        category: &str,
    ) -> Result<Standing, EngineError> {
        if tx.sismember(self.set_key, category).await? {
            Ok(Standing::Member {
                cohort_size: tx.scard(self.set_key).await?,
            })
        } else {
            Ok(Standing::Outsider)
        }
    }
}

/// Read an integer string key.
pub(crate) async fn read_count(
    tx: &mut dyn Transaction,
    key: &str,
) -> Result<Option<i64>, EngineError> {
    match tx.get(key).await? {
        None => Ok(None),
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| EngineError::CorruptAggregate {
                key: key.to_string(),
                reason: format!("expected an integer, found {raw:?}"),
            }),
    }
}
