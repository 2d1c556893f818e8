//! In-memory single-writer store.
//!
//! `MemoryStore` holds the whole keyspace behind one async mutex. A
//! transaction owns the mutex guard for its whole lifetime, so transactions
//! are strictly serialized. Writes go to a staging overlay keyed by the
//! touched key and are merged into the keyspace on commit.

use std::collections::hash_map::Entry as MapEntry;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, trace, warn};

use crate::{Store, StoreError, Transaction};

/// A stored value.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Value {
    Str(String),
    Set(BTreeSet<String>),
    List(VecDeque<String>),
}

/// A value plus its optional expiry.
#[derive(Debug, Clone)]
struct Slot {
    value: Value,
    expires_at: Option<DateTime<Utc>>,
}

impl Slot {
    fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|at| at > now)
    }
}

#[derive(Debug, Default)]
struct Keyspace {
    slots: HashMap<String, Slot>,
}

/// In-memory implementation of [`Store`].
///
/// Cloning the handle shares the same keyspace.
#[derive(Clone, Default)]
pub struct MemoryStore {
    keyspace: Arc<Mutex<Keyspace>>,
    /// When set, the next commit fails with `Unavailable` and its writes are dropped.
    fail_next_commit: Arc<AtomicBool>,
    commits: Arc<AtomicU64>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail as if the backend went away.
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of successful commits so far.
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::SeqCst)
    }

    /// Number of live keys.
    pub async fn key_count(&self) -> usize {
        let now = Utc::now();
        self.keyspace
            .lock()
            .await
            .slots
            .values()
            .filter(|slot| slot.is_live(now))
            .count()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn Transaction>, StoreError> {
        let guard = Arc::clone(&self.keyspace).lock_owned().await;
        trace!("memory transaction opened");
        Ok(Box::new(MemoryTransaction {
            base: guard,
            staged: HashMap::new(),
            now: Utc::now(),
            fail_commit: Arc::clone(&self.fail_next_commit),
            commits: Arc::clone(&self.commits),
        }))
    }
}

/// A transaction over a [`MemoryStore`].
///
/// `staged` maps every key written in this transaction to its new slot, or
/// `None` if the key was deleted.
struct MemoryTransaction {
    base: OwnedMutexGuard<Keyspace>,
    staged: HashMap<String, Option<Slot>>,
    now: DateTime<Utc>,
    fail_commit: Arc<AtomicBool>,
    commits: Arc<AtomicU64>,
}

impl MemoryTransaction {
    /// Current slot for `key`, looking through staged writes first.
    fn lookup(&self, key: &str) -> Option<&Slot> {
        let slot = match self.staged.get(key) {
            Some(staged) => staged.as_ref(),
            None => self.base.slots.get(key),
        };
        slot.filter(|slot| slot.is_live(self.now))
    }

    /// Staged slot for `key`, copying it from the keyspace on first write.
    fn stage(&mut self, key: &str) -> &mut Option<Slot> {
        match self.staged.entry(key.to_string()) {
            MapEntry::Occupied(entry) => entry.into_mut(),
            MapEntry::Vacant(entry) => {
                let now = self.now;
                let current = self
                    .base
                    .slots
                    .get(key)
                    .filter(|slot| slot.is_live(now))
                    .cloned();
                entry.insert(current)
            }
        }
    }

    fn read_set(&self, key: &str) -> Result<Option<&BTreeSet<String>>, StoreError> {
        match self.lookup(key).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Value::Set(set)) => Ok(Some(set)),
            Some(_) => Err(wrong_type(key, "set")),
        }
    }

    fn read_list(&self, key: &str) -> Result<Option<&VecDeque<String>>, StoreError> {
        match self.lookup(key).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Value::List(list)) => Ok(Some(list)),
            Some(_) => Err(wrong_type(key, "list")),
        }
    }

    /// Mutable set at `key`, created empty if missing.
    fn write_set(&mut self, key: &str) -> Result<&mut BTreeSet<String>, StoreError> {
        let slot = self.stage(key).get_or_insert_with(|| Slot {
            value: Value::Set(BTreeSet::new()),
            expires_at: None,
        });
        match &mut slot.value {
            Value::Set(set) => Ok(set),
            _ => Err(wrong_type(key, "set")),
        }
    }

    /// Mutable list at `key`, created empty if missing.
    fn write_list(&mut self, key: &str) -> Result<&mut VecDeque<String>, StoreError> {
        let slot = self.stage(key).get_or_insert_with(|| Slot {
            value: Value::List(VecDeque::new()),
            expires_at: None,
        });
        match &mut slot.value {
            Value::List(list) => Ok(list),
            _ => Err(wrong_type(key, "list")),
        }
    }

    /// Empty sets and lists do not exist as keys.
    fn drop_if_empty(&mut self, key: &str) {
        if let Some(staged) = self.staged.get_mut(key) {
            let empty = match staged.as_ref().map(|slot| &slot.value) {
                Some(Value::Set(set)) => set.is_empty(),
                Some(Value::List(list)) => list.is_empty(),
                _ => false,
            };
            if empty {
                *staged = None;
            }
        }
    }

    fn live_keys(&self) -> BTreeSet<&str> {
        let mut keys: BTreeSet<&str> = self
            .base
            .slots
            .iter()
            .filter(|(key, slot)| !self.staged.contains_key(*key) && slot.is_live(self.now))
            .map(|(key, _)| key.as_str())
            .collect();
        keys.extend(
            self.staged
                .iter()
                .filter(|(_, slot)| slot.as_ref().is_some_and(|slot| slot.is_live(self.now)))
                .map(|(key, _)| key.as_str()),
        );
        keys
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

/// Resolve an inclusive, possibly negative index pair against `len`.
///
/// Returns `None` when the range selects nothing.
fn resolve_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

/// Compile a glob pattern into an anchored regex.
pub(crate) fn glob_to_regex(pattern: &str) -> Result<Regex, StoreError> {
    let mut source = String::with_capacity(pattern.len() + 8);
    source.push('^');
    let mut literal = String::new();
    for ch in pattern.chars() {
        match ch {
            '*' | '?' => {
                source.push_str(&regex::escape(&literal));
                literal.clear();
                source.push_str(if ch == '*' { ".*" } else { "." });
            }
            _ => literal.push(ch),
        }
    }
    source.push_str(&regex::escape(&literal));
    source.push('$');
    Regex::new(&source).map_err(|e| StoreError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })
}

#[async_trait]
impl Transaction for MemoryTransaction {
    async fn get(&mut self, key: &str) -> Result<Option<String>, StoreError> {
        match self.lookup(key).map(|slot| &slot.value) {
            None => Ok(None),
            Some(Value::Str(s)) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        }
    }

    async fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        *self.stage(key) = Some(Slot {
            value: Value::Str(value.to_string()),
            expires_at: None,
        });
        Ok(())
    }

    async fn incr_by(&mut self, key: &str, delta: i64) -> Result<i64, StoreError> {
        let current = match self.lookup(key) {
            None => 0,
            Some(Slot {
                value: Value::Str(s),
                ..
            }) => s.parse::<i64>().map_err(|_| StoreError::NotAnInteger {
                key: key.to_string(),
                value: s.clone(),
            })?,
            Some(_) => return Err(wrong_type(key, "string")),
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| StoreError::Overflow {
                key: key.to_string(),
                delta,
            })?;
        let slot = self.stage(key);
        let expires_at = slot.as_ref().and_then(|slot| slot.expires_at);
        *slot = Some(Slot {
            value: Value::Str(next.to_string()),
            expires_at,
        });
        Ok(next)
    }

    async fn exists(&mut self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lookup(key).is_some())
    }

    async fn delete(&mut self, key: &str) -> Result<bool, StoreError> {
        let existed = self.lookup(key).is_some();
        if existed {
            *self.stage(key) = None;
        }
        Ok(existed)
    }

    async fn expire(&mut self, key: &str, ttl: Duration) -> Result<bool, StoreError> {
        // A ttl past the representable range never expires.
        let at = self.now.checked_add_signed(ttl);
        match self.stage(key) {
            Some(slot) => {
                slot.expires_at = at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn ttl(&mut self, key: &str) -> Result<Option<Duration>, StoreError> {
        let now = self.now;
        Ok(self
            .lookup(key)
            .and_then(|slot| slot.expires_at)
            .map(|at| at - now))
    }

    async fn sadd(&mut self, key: &str, members: &[&str]) -> Result<usize, StoreError> {
        if members.is_empty() {
            return Ok(0);
        }
        let set = self.write_set(key)?;
        Ok(members
            .iter()
            .filter(|member| set.insert(member.to_string()))
            .count())
    }

    async fn srem(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        if self.read_set(key)?.is_none_or(|set| !set.contains(member)) {
            return Ok(false);
        }
        self.write_set(key)?.remove(member);
        self.drop_if_empty(key);
        Ok(true)
    }

    async fn sismember(&mut self, key: &str, member: &str) -> Result<bool, StoreError> {
        Ok(self.read_set(key)?.is_some_and(|set| set.contains(member)))
    }

    async fn scard(&mut self, key: &str) -> Result<usize, StoreError> {
        Ok(self.read_set(key)?.map_or(0, BTreeSet::len))
    }

    async fn smembers(&mut self, key: &str) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.read_set(key)?.cloned().unwrap_or_default())
    }

    async fn sunion(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError> {
        let mut union = BTreeSet::new();
        for key in keys {
            if let Some(set) = self.read_set(key)? {
                union.extend(set.iter().cloned());
            }
        }
        Ok(union)
    }

    async fn sdiff(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(BTreeSet::new());
        };
        let mut diff = self.read_set(first)?.cloned().unwrap_or_default();
        for key in rest {
            if let Some(set) = self.read_set(key)? {
                diff.retain(|member| !set.contains(member));
            }
        }
        Ok(diff)
    }

    async fn sinter(&mut self, keys: &[&str]) -> Result<BTreeSet<String>, StoreError> {
        let Some((first, rest)) = keys.split_first() else {
            return Ok(BTreeSet::new());
        };
        let mut inter = self.read_set(first)?.cloned().unwrap_or_default();
        for key in rest {
            match self.read_set(key)? {
                Some(set) => inter.retain(|member| set.contains(member)),
                None => inter.clear(),
            }
        }
        Ok(inter)
    }

    async fn lpush(&mut self, key: &str, values: &[&str]) -> Result<usize, StoreError> {
        let list = self.write_list(key)?;
        for value in values {
            list.push_front(value.to_string());
        }
        let len = list.len();
        self.drop_if_empty(key);
        Ok(len)
    }

    async fn rpush(&mut self, key: &str, values: &[&str]) -> Result<usize, StoreError> {
        let list = self.write_list(key)?;
        list.extend(values.iter().map(|value| value.to_string()));
        let len = list.len();
        self.drop_if_empty(key);
        Ok(len)
    }

    async fn lrange(
        &mut self,
        key: &str,
        start: i64,
        stop: i64,
    ) -> Result<Vec<String>, StoreError> {
        let Some(list) = self.read_list(key)? else {
            return Ok(Vec::new());
        };
        Ok(match resolve_range(list.len(), start, stop) {
            Some((from, to)) => list.range(from..=to).cloned().collect(),
            None => Vec::new(),
        })
    }

    async fn ltrim(&mut self, key: &str, start: i64, stop: i64) -> Result<(), StoreError> {
        let Some(len) = self.read_list(key)?.map(VecDeque::len) else {
            return Ok(());
        };
        let list = self.write_list(key)?;
        match resolve_range(len, start, stop) {
            Some((from, to)) => {
                list.truncate(to + 1);
                list.drain(..from);
            }
            None => list.clear(),
        }
        self.drop_if_empty(key);
        Ok(())
    }

    async fn lrem(&mut self, key: &str, count: i64, value: &str) -> Result<usize, StoreError> {
        if self
            .read_list(key)?
            .is_none_or(|list| !list.iter().any(|item| item == value))
        {
            return Ok(0);
        }
        let list = self.write_list(key)?;
        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut removed = 0;
        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }
        self.drop_if_empty(key);
        Ok(removed)
    }

    async fn linsert_before(
        &mut self,
        key: &str,
        pivot: &str,
        value: &str,
    ) -> Result<Option<usize>, StoreError> {
        let Some(position) = self
            .read_list(key)?
            .and_then(|list| list.iter().position(|item| item == pivot))
        else {
            return Ok(None);
        };
        let list = self.write_list(key)?;
        list.insert(position, value.to_string());
        Ok(Some(list.len()))
    }

    async fn scan(&mut self, pattern: &str) -> Result<Vec<String>, StoreError> {
        let matcher = glob_to_regex(pattern)?;
        Ok(self
            .live_keys()
            .into_iter()
            .filter(|key| matcher.is_match(key))
            .map(str::to_string)
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let mut this = self;
        if this.fail_commit.swap(false, Ordering::SeqCst) {
            warn!(
                staged = this.staged.len(),
                "commit rejected, discarding staged writes"
            );
            return Err(StoreError::Unavailable(
                "memory store rejected the commit".to_string(),
            ));
        }

        let staged = std::mem::take(&mut this.staged);
        let written = staged.len();
        let now = this.now;
        for (key, slot) in staged {
            match slot {
                Some(slot) => {
                    this.base.slots.insert(key, slot);
                }
                None => {
                    this.base.slots.remove(&key);
                }
            }
        }
        this.base.slots.retain(|_, slot| slot.is_live(now));
        this.commits.fetch_add(1, Ordering::SeqCst);
        debug!(written, "memory transaction committed");
        Ok(())
    }
}
