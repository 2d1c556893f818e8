//! Store adapter traits.
//!
//! The engine never talks to a backend directly: every read and write goes
//! through a [`Transaction`] obtained from a [`Store`]. Writes staged on a
//! transaction become visible to other transactions only after
//! [`Transaction::commit`]; dropping a transaction discards them.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::Duration;

use crate::StoreError;

/// A key-value store supporting atomic multi-key transactions.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a new transaction.
    ///
    /// Transactions are serialized: a backend must not let two open
    /// transactions interleave their writes.
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError>;
}

/// An open transaction against a [`Store`].
///
/// List indices follow the usual inclusive `start..=stop` convention where
/// negative values count from the tail (`-1` is the last element).
#[async_trait]
pub trait Transaction: Send {
    // =========================================================================
    // Strings and counters
    // =========================================================================

    /// Read a string value.
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError>;

    /// Write a string value, clearing any expiry on the key.
    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Add `delta` to the integer at `key` (missing keys count as 0) and
    /// return the new value.
    async fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64, StoreError>;

    /// Whether `key` holds a value of any type.
    async fn exists(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Remove `key`. Returns whether it existed.
    async fn delete(&mut self, key: &str) -> Result<bool, StoreError>;

    /// Expire `key` after `ttl`. Returns false if the key does not exist.
    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError>;

    /// Remaining time to live, or `None` when the key is missing or persistent.
    async fn ttl(&mut self, key: &str) -> Result<Option<Duration>, StoreError>;

    // =========================================================================
    // Unordered sets
    // =========================================================================

    /// Add members to a set. Returns how many were not already present.
    async fn sadd(&mut self, key: &str, members: &[&str]) -> Result<usize, StoreError>;

    /// Remove a member from a set. Returns whether it was present.
    async fn srem(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Whether `member` belongs to the set at `key`.
    async fn sismember(&mut self, key: &str, member: &str) -> Result<bool, StoreError>;

    /// Number of members in the set at `key`.
    async fn scard(&mut self, key: &str) -> Result<usize, StoreError>;

    /// All members of the set at `key`.
    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>, StoreError>;

    /// Union of the sets at `keys`.
    async fn sunion(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError>;

    /// Members of the first set that are in none of the others.
    async fn sdiff(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError>;

    /// Members common to every set at `keys`.
    async fn sinter(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError>;

    // =========================================================================
    // Ordered lists
    // =========================================================================

    /// Push values onto the head of a list, one at a time, and return the
    /// new length.
    async fn lpush(&mut self, key: &str, values: &[&str]) -> Result<usize, StoreError>;

    /// Append values to the tail of a list and return the new length.
    async fn rpush(&mut self, key: &str, values: &[&str]) -> Result<usize, StoreError>;

    /// Elements in `start..=stop`.
    async fn lrange(&mut self, key: &str, start: i64, stop: i64)
    -> Result<Vec<String>, StoreError>;

    /// Keep only the elements in `start..=stop`.
    async fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<(), StoreError>;

    /// Remove occurrences of `value`: the first `count` from the head when
    /// positive, the last `count` when negative, all of them when zero.
    /// Returns how many were removed.
    async fn lrem(&mut self, key: &str, count: i64, value: &str) -> Result<usize, StoreError>;

    /// Insert `value` before the first occurrence of `pivot`. Returns the new
    /// length, or `None` when `pivot` is not in the list.
    async fn linsert_before(
        &mut self,
        key: &str,
        pivot: &str,
        value: &str,
    ) -> Result<Option<usize>, StoreError>;

    // =========================================================================
    // Keyspace
    // =========================================================================

    /// Keys matching a glob pattern (`*` and `?` wildcards), sorted.
    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, StoreError>;

    /// Make every staged write visible atomically.
    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
}
