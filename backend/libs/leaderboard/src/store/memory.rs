//! In-process score store.
//!
//! Implements the same primitives as [`RedisStore`](super::RedisStore) with
//! Redis ordering rules: members are ordered by `(score, member)` with ties
//! broken by member bytes, reverse queries walk that order backwards, empty
//! collections disappear, and expired keys are evicted lazily. A batch runs
//! under one lock and is rolled back entirely if any command fails.

use super::{Batch, Command, Replies, Reply, ScoreBound, ScoreStore};
use crate::config::{Aggregate, Order};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use chrono::Utc;
use ordered_float::OrderedFloat;
use std::collections::{BTreeSet, HashMap};
use tokio::sync::Mutex;

/// Sorted set keyed by member with an ordered `(score, member)` index.
#[derive(Debug, Clone, Default)]
struct SortedSet {
    ordered: BTreeSet<(OrderedFloat<f64>, String)>,
    scores: HashMap<String, OrderedFloat<f64>>,
}

impl SortedSet {
    /// Returns `true` when the member was newly added.
    fn insert(&mut self, member: &str, score: f64) -> bool {
        let score = OrderedFloat(score);
        match self.scores.insert(member.to_string(), score) {
            Some(old) => {
                self.ordered.remove(&(old, member.to_string()));
                self.ordered.insert((score, member.to_string()));
                false
            }
            None => {
                self.ordered.insert((score, member.to_string()));
                true
            }
        }
    }

    fn remove(&mut self, member: &str) -> bool {
        match self.scores.remove(member) {
            Some(score) => {
                self.ordered.remove(&(score, member.to_string()));
                true
            }
            None => false,
        }
    }

    fn score(&self, member: &str) -> Option<f64> {
        self.scores.get(member).map(|s| s.0)
    }

    fn len(&self) -> usize {
        self.scores.len()
    }

    /// 0-based position in ascending order.
    fn rank(&self, member: &str) -> Option<usize> {
        let score = *self.scores.get(member)?;
        Some(
            self.ordered
                .range(..(score, member.to_string()))
                .count(),
        )
    }

    fn in_order(&self, order: Order) -> Vec<(String, f64)> {
        let iter = self.ordered.iter().map(|(s, m)| (m.clone(), s.0));
        match order {
            Order::Asc => iter.collect(),
            Order::Desc => iter.rev().collect(),
        }
    }

    fn by_score(&self, min: ScoreBound, max: ScoreBound) -> Vec<(String, f64)> {
        self.ordered
            .iter()
            .filter(|(s, _)| min.admits_from_below(s.0) && max.admits_from_above(s.0))
            .map(|(s, m)| (m.clone(), s.0))
            .collect()
    }
}

/// Resolve a Redis-style inclusive index window (negative = from the end).
fn normalize_range(start: isize, stop: isize, len: usize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (start + len).max(0) } else { start };
    let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        None
    } else {
        Some((start as usize, stop as usize))
    }
}

#[derive(Debug, Clone)]
enum Value {
    SortedSet(SortedSet),
    Hash(HashMap<String, String>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at_ms: Option<i64>,
}

#[derive(Debug, Default)]
struct State {
    keys: HashMap<String, Entry>,
}

fn wrong_type(key: &str) -> StoreError {
    StoreError::WrongType(key.to_string())
}

impl State {
    fn evict_expired(&mut self, now_ms: i64) {
        self.keys
            .retain(|_, entry| entry.expires_at_ms.map_or(true, |at| at > now_ms));
    }

    fn zset(&self, key: &str) -> StoreResult<Option<&SortedSet>> {
        match self.keys.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => Ok(Some(set)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn zset_mut(&mut self, key: &str) -> StoreResult<&mut SortedSet> {
        let entry = self.keys.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::SortedSet(SortedSet::default()),
            expires_at_ms: None,
        });
        match &mut entry.value {
            Value::SortedSet(set) => Ok(set),
            Value::Hash(_) => Err(wrong_type(key)),
        }
    }

    fn hash(&self, key: &str) -> StoreResult<Option<&HashMap<String, String>>> {
        match self.keys.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => Ok(Some(hash)),
            Some(_) => Err(wrong_type(key)),
        }
    }

    fn hash_mut(&mut self, key: &str) -> StoreResult<&mut HashMap<String, String>> {
        let entry = self.keys.entry(key.to_string()).or_insert_with(|| Entry {
            value: Value::Hash(HashMap::new()),
            expires_at_ms: None,
        });
        match &mut entry.value {
            Value::Hash(hash) => Ok(hash),
            Value::SortedSet(_) => Err(wrong_type(key)),
        }
    }

    /// Drop the key if its collection became empty
    fn prune(&mut self, key: &str) {
        let empty = match self.keys.get(key) {
            Some(Entry {
                value: Value::SortedSet(set),
                ..
            }) => set.len() == 0,
            Some(Entry {
                value: Value::Hash(hash),
                ..
            }) => hash.is_empty(),
            None => false,
        };
        if empty {
            self.keys.remove(key);
        }
    }

    fn combine(
        &mut self,
        destination: &str,
        keys: &[String],
        aggregate: Aggregate,
        intersect: bool,
    ) -> StoreResult<Reply> {
        let mut sets = Vec::with_capacity(keys.len());
        for key in keys {
            sets.push(self.zset(key)?.cloned().unwrap_or_default());
        }

        let mut combined: HashMap<String, f64> = HashMap::new();
        let mut seen: HashMap<String, usize> = HashMap::new();
        for set in &sets {
            for (member, score) in set.scores.iter() {
                *seen.entry(member.clone()).or_insert(0) += 1;
                combined
                    .entry(member.clone())
                    .and_modify(|current| *current = aggregate.combine(*current, score.0))
                    .or_insert(score.0);
            }
        }
        if intersect {
            combined.retain(|member, _| seen.get(member) == Some(&sets.len()));
        }

        self.keys.remove(destination);
        let mut result = SortedSet::default();
        for (member, score) in &combined {
            result.insert(member, *score);
        }
        let stored = result.len() as i64;
        if stored > 0 {
            self.keys.insert(
                destination.to_string(),
                Entry {
                    value: Value::SortedSet(result),
                    expires_at_ms: None,
                },
            );
        }
        Ok(Reply::Integer(stored))
    }

    fn apply(&mut self, command: &Command, now_ms: i64) -> StoreResult<Reply> {
        let reply = match command {
            Command::ZAdd { key, members } => {
                let set = self.zset_mut(key)?;
                let mut added = 0;
                for (member, score) in members {
                    if set.insert(member, *score) {
                        added += 1;
                    }
                }
                Reply::Integer(added)
            }
            Command::ZIncrBy { key, member, delta } => {
                let set = self.zset_mut(key)?;
                let score = set.score(member).unwrap_or(0.0) + delta;
                set.insert(member, score);
                Reply::Score(Some(score))
            }
            Command::ZRem { key, members } => {
                let removed = match self.zset(key)? {
                    Some(_) => {
                        let set = self.zset_mut(key)?;
                        members.iter().filter(|m| set.remove(m.as_str())).count()
                    }
                    None => 0,
                };
                self.prune(key);
                Reply::Integer(removed as i64)
            }
            Command::ZCard { key } => {
                Reply::Integer(self.zset(key)?.map_or(0, |set| set.len()) as i64)
            }
            Command::ZCount { key, min, max } => Reply::Integer(
                self.zset(key)?
                    .map_or(0, |set| set.by_score(*min, *max).len()) as i64,
            ),
            Command::ZRank { key, member, order } => {
                let rank = self.zset(key)?.and_then(|set| {
                    set.rank(member).map(|rank| match order {
                        Order::Asc => rank,
                        Order::Desc => set.len() - 1 - rank,
                    })
                });
                Reply::Rank(rank.map(|rank| rank as u64))
            }
            Command::ZScore { key, member } => {
                Reply::Score(self.zset(key)?.and_then(|set| set.score(member)))
            }
            Command::ZRange {
                key,
                start,
                stop,
                order,
                with_scores,
            } => {
                let ordered = self
                    .zset(key)?
                    .map(|set| set.in_order(*order))
                    .unwrap_or_default();
                let slice = match normalize_range(*start, *stop, ordered.len()) {
                    Some((s, e)) => ordered[s..=e].to_vec(),
                    None => Vec::new(),
                };
                scored_reply(slice, *with_scores)
            }
            Command::ZRangeByScore {
                key,
                min,
                max,
                order,
                with_scores,
            } => {
                let mut matched = self
                    .zset(key)?
                    .map(|set| set.by_score(*min, *max))
                    .unwrap_or_default();
                if *order == Order::Desc {
                    matched.reverse();
                }
                scored_reply(matched, *with_scores)
            }
            Command::ZRemRangeByScore { key, min, max } => {
                let doomed: Vec<String> = self
                    .zset(key)?
                    .map(|set| set.by_score(*min, *max))
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(member, _)| member)
                    .collect();
                if !doomed.is_empty() {
                    let set = self.zset_mut(key)?;
                    for member in &doomed {
                        set.remove(member);
                    }
                    self.prune(key);
                }
                Reply::Integer(doomed.len() as i64)
            }
            Command::ZRemRangeByRank { key, start, stop } => {
                let ordered = self
                    .zset(key)?
                    .map(|set| set.in_order(Order::Asc))
                    .unwrap_or_default();
                let doomed = match normalize_range(*start, *stop, ordered.len()) {
                    Some((s, e)) => ordered[s..=e].to_vec(),
                    None => Vec::new(),
                };
                if !doomed.is_empty() {
                    let set = self.zset_mut(key)?;
                    for (member, _) in &doomed {
                        set.remove(member);
                    }
                    self.prune(key);
                }
                Reply::Integer(doomed.len() as i64)
            }
            Command::ZUnionStore {
                destination,
                keys,
                aggregate,
            } => self.combine(destination, keys, *aggregate, false)?,
            Command::ZInterStore {
                destination,
                keys,
                aggregate,
            } => self.combine(destination, keys, *aggregate, true)?,
            Command::HSet { key, field, value } => {
                let hash = self.hash_mut(key)?;
                let added = hash.insert(field.clone(), value.clone()).is_none();
                Reply::Integer(added as i64)
            }
            Command::HGet { key, field } => {
                Reply::Data(self.hash(key)?.and_then(|hash| hash.get(field).cloned()))
            }
            Command::HMGet { key, fields } => {
                let hash = self.hash(key)?;
                Reply::DataList(
                    fields
                        .iter()
                        .map(|field| hash.and_then(|h| h.get(field).cloned()))
                        .collect(),
                )
            }
            Command::HDel { key, fields } => {
                let removed = match self.hash(key)? {
                    Some(_) => {
                        let hash = self.hash_mut(key)?;
                        fields.iter().filter(|f| hash.remove(*f).is_some()).count()
                    }
                    None => 0,
                };
                self.prune(key);
                Reply::Integer(removed as i64)
            }
            Command::HLen { key } => {
                Reply::Integer(self.hash(key)?.map_or(0, |hash| hash.len()) as i64)
            }
            Command::Del { keys } => Reply::Integer(
                keys.iter()
                    .filter(|key| self.keys.remove(key.as_str()).is_some())
                    .count() as i64,
            ),
            Command::Exists { key } => Reply::Integer(self.keys.contains_key(key) as i64),
            Command::Expire { key, seconds } => {
                self.expire_at_ms(key, now_ms.saturating_add(seconds.saturating_mul(1000)), now_ms)
            }
            Command::ExpireAt { key, timestamp } => {
                self.expire_at_ms(key, timestamp.saturating_mul(1000), now_ms)
            }
            Command::Ttl { key } => match self.keys.get(key) {
                None => Reply::Integer(-2),
                Some(Entry {
                    expires_at_ms: None,
                    ..
                }) => Reply::Integer(-1),
                Some(Entry {
                    expires_at_ms: Some(at),
                    ..
                }) => Reply::Integer(at.saturating_sub(now_ms).saturating_add(500) / 1000),
            },
        };
        Ok(reply)
    }

    fn expire_at_ms(&mut self, key: &str, at_ms: i64, now_ms: i64) -> Reply {
        if at_ms <= now_ms {
            return Reply::Integer(self.keys.remove(key).is_some() as i64);
        }
        match self.keys.get_mut(key) {
            Some(entry) => {
                entry.expires_at_ms = Some(at_ms);
                Reply::Integer(1)
            }
            None => Reply::Integer(0),
        }
    }
}

/// Keys a command may create, change or delete
fn written_keys(command: &Command) -> Vec<&str> {
    match command {
        Command::ZAdd { key, .. }
        | Command::ZIncrBy { key, .. }
        | Command::ZRem { key, .. }
        | Command::ZRemRangeByScore { key, .. }
        | Command::ZRemRangeByRank { key, .. }
        | Command::HSet { key, .. }
        | Command::HDel { key, .. }
        | Command::Expire { key, .. }
        | Command::ExpireAt { key, .. } => vec![key.as_str()],
        Command::ZUnionStore { destination, .. } | Command::ZInterStore { destination, .. } => {
            vec![destination.as_str()]
        }
        Command::Del { keys } => keys.iter().map(String::as_str).collect(),
        Command::ZCard { .. }
        | Command::ZCount { .. }
        | Command::ZRank { .. }
        | Command::ZScore { .. }
        | Command::ZRange { .. }
        | Command::ZRangeByScore { .. }
        | Command::HGet { .. }
        | Command::HMGet { .. }
        | Command::HLen { .. }
        | Command::Exists { .. }
        | Command::Ttl { .. } => Vec::new(),
    }
}

fn scored_reply(members: Vec<(String, f64)>, with_scores: bool) -> Reply {
    if with_scores {
        Reply::ScoredMembers(members)
    } else {
        Reply::Members(members.into_iter().map(|(member, _)| member).collect())
    }
}

/// Score store held entirely in memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScoreStore for MemoryStore {
    async fn execute(&self, batch: Batch) -> StoreResult<Replies> {
        let now_ms = Utc::now().timestamp_millis();
        let mut state = self.state.lock().await;
        state.evict_expired(now_ms);

        // Prior value of every key the batch writes, absent keys as None
        let mut snapshot: HashMap<String, Option<Entry>> = HashMap::new();
        for key in batch.commands().iter().flat_map(written_keys) {
            if !snapshot.contains_key(key) {
                snapshot.insert(key.to_string(), state.keys.get(key).cloned());
            }
        }

        let mut replies = Vec::with_capacity(batch.len());
        for command in batch.commands() {
            match state.apply(command, now_ms) {
                Ok(reply) => replies.push(reply),
                Err(err) => {
                    for (key, entry) in snapshot {
                        match entry {
                            Some(entry) => state.keys.insert(key, entry),
                            None => state.keys.remove(&key),
                        };
                    }
                    return Err(err);
                }
            }
        }
        Ok(Replies::new(replies))
    }
}
