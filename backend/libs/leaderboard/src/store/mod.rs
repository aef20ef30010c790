//! Score store adapter
//!
//! Leaderboards never talk to Redis directly. Every round trip is expressed as
//! a [`Batch`] of sorted-set and hash [`Command`]s that a [`ScoreStore`]
//! executes in order, all-or-nothing, returning one [`Reply`] per command.

mod memory;
mod redis_store;

pub use self::memory::MemoryStore;
pub use self::redis_store::RedisStore;

use crate::config::{Aggregate, Order};
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Shared store handle, reused by any number of leaderboards
pub type SharedStore = Arc<dyn ScoreStore>;

/// Ordered key-value service the ranking engines are layered on
#[async_trait]
pub trait ScoreStore: Send + Sync {
    /// Execute every command of the batch in order as a single unit.
    ///
    /// Either all replies are returned, in command order, or the call fails.
    async fn execute(&self, batch: Batch) -> StoreResult<Replies>;
}

/// One end of a score interval
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
    NegInfinity,
    PosInfinity,
}

impl ScoreBound {
    /// Wire form understood by ZCOUNT/ZRANGEBYSCORE: `5`, `(5`, `-inf`, `+inf`
    pub fn to_arg(&self) -> String {
        match self {
            ScoreBound::Inclusive(score) => format_score(*score),
            ScoreBound::Exclusive(score) => format!("({}", format_score(*score)),
            ScoreBound::NegInfinity => "-inf".to_string(),
            ScoreBound::PosInfinity => "+inf".to_string(),
        }
    }

    /// Whether `score` lies on the admitted side of this lower bound
    pub fn admits_from_below(&self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(min) => score >= *min,
            ScoreBound::Exclusive(min) => score > *min,
            ScoreBound::NegInfinity => true,
            ScoreBound::PosInfinity => false,
        }
    }

    /// Whether `score` lies on the admitted side of this upper bound
    pub fn admits_from_above(&self, score: f64) -> bool {
        match self {
            ScoreBound::Inclusive(max) => score <= *max,
            ScoreBound::Exclusive(max) => score < *max,
            ScoreBound::NegInfinity => false,
            ScoreBound::PosInfinity => true,
        }
    }
}

fn format_score(score: f64) -> String {
    if score == f64::INFINITY {
        "+inf".to_string()
    } else if score == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        score.to_string()
    }
}

/// A single store primitive
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    ZAdd {
        key: String,
        members: Vec<(String, f64)>,
    },
    ZIncrBy {
        key: String,
        member: String,
        delta: f64,
    },
    ZRem {
        key: String,
        members: Vec<String>,
    },
    ZCard {
        key: String,
    },
    ZCount {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },
    ZRank {
        key: String,
        member: String,
        order: Order,
    },
    ZScore {
        key: String,
        member: String,
    },
    ZRange {
        key: String,
        start: isize,
        stop: isize,
        order: Order,
        with_scores: bool,
    },
    ZRangeByScore {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
        order: Order,
        with_scores: bool,
    },
    ZRemRangeByScore {
        key: String,
        min: ScoreBound,
        max: ScoreBound,
    },
    ZRemRangeByRank {
        key: String,
        start: isize,
        stop: isize,
    },
    ZUnionStore {
        destination: String,
        keys: Vec<String>,
        aggregate: Aggregate,
    },
    ZInterStore {
        destination: String,
        keys: Vec<String>,
        aggregate: Aggregate,
    },
    HSet {
        key: String,
        field: String,
        value: String,
    },
    HGet {
        key: String,
        field: String,
    },
    HMGet {
        key: String,
        fields: Vec<String>,
    },
    HDel {
        key: String,
        fields: Vec<String>,
    },
    HLen {
        key: String,
    },
    Del {
        keys: Vec<String>,
    },
    Exists {
        key: String,
    },
    Expire {
        key: String,
        seconds: i64,
    },
    ExpireAt {
        key: String,
        timestamp: i64,
    },
    Ttl {
        key: String,
    },
}

impl Command {
    /// Redis command name, also used as the metrics label
    pub fn name(&self) -> &'static str {
        match self {
            Command::ZAdd { .. } => "ZADD",
            Command::ZIncrBy { .. } => "ZINCRBY",
            Command::ZRem { .. } => "ZREM",
            Command::ZCard { .. } => "ZCARD",
            Command::ZCount { .. } => "ZCOUNT",
            Command::ZRank {
                order: Order::Asc, ..
            } => "ZRANK",
            Command::ZRank {
                order: Order::Desc, ..
            } => "ZREVRANK",
            Command::ZScore { .. } => "ZSCORE",
            Command::ZRange {
                order: Order::Asc, ..
            } => "ZRANGE",
            Command::ZRange {
                order: Order::Desc, ..
            } => "ZREVRANGE",
            Command::ZRangeByScore {
                order: Order::Asc, ..
            } => "ZRANGEBYSCORE",
            Command::ZRangeByScore {
                order: Order::Desc, ..
            } => "ZREVRANGEBYSCORE",
            Command::ZRemRangeByScore { .. } => "ZREMRANGEBYSCORE",
            Command::ZRemRangeByRank { .. } => "ZREMRANGEBYRANK",
            Command::ZUnionStore { .. } => "ZUNIONSTORE",
            Command::ZInterStore { .. } => "ZINTERSTORE",
            Command::HSet { .. } => "HSET",
            Command::HGet { .. } => "HGET",
            Command::HMGet { .. } => "HMGET",
            Command::HDel { .. } => "HDEL",
            Command::HLen { .. } => "HLEN",
            Command::Del { .. } => "DEL",
            Command::Exists { .. } => "EXISTS",
            Command::Expire { .. } => "EXPIRE",
            Command::ExpireAt { .. } => "EXPIREAT",
            Command::Ttl { .. } => "TTL",
        }
    }
}

/// Ordered list of commands sent in one round trip
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn into_commands(self) -> Vec<Command> {
        self.commands
    }

    pub fn zadd(&mut self, key: &str, member: &str, score: f64) -> &mut Self {
        self.zadd_multiple(key, vec![(member.to_string(), score)])
    }

    pub fn zadd_multiple(&mut self, key: &str, members: Vec<(String, f64)>) -> &mut Self {
        self.push(Command::ZAdd {
            key: key.to_string(),
            members,
        })
    }

    pub fn zincr(&mut self, key: &str, member: &str, delta: f64) -> &mut Self {
        self.push(Command::ZIncrBy {
            key: key.to_string(),
            member: member.to_string(),
            delta,
        })
    }

    pub fn zrem(&mut self, key: &str, member: &str) -> &mut Self {
        self.push(Command::ZRem {
            key: key.to_string(),
            members: vec![member.to_string()],
        })
    }

    pub fn zrem_multiple(&mut self, key: &str, members: Vec<String>) -> &mut Self {
        self.push(Command::ZRem {
            key: key.to_string(),
            members,
        })
    }

    pub fn zcard(&mut self, key: &str) -> &mut Self {
        self.push(Command::ZCard {
            key: key.to_string(),
        })
    }

    pub fn zcount(&mut self, key: &str, min: ScoreBound, max: ScoreBound) -> &mut Self {
        self.push(Command::ZCount {
            key: key.to_string(),
            min,
            max,
        })
    }

    pub fn zrank(&mut self, key: &str, member: &str, order: Order) -> &mut Self {
        self.push(Command::ZRank {
            key: key.to_string(),
            member: member.to_string(),
            order,
        })
    }

    pub fn zscore(&mut self, key: &str, member: &str) -> &mut Self {
        self.push(Command::ZScore {
            key: key.to_string(),
            member: member.to_string(),
        })
    }

    pub fn zrange(&mut self, key: &str, start: isize, stop: isize, order: Order) -> &mut Self {
        self.push(Command::ZRange {
            key: key.to_string(),
            start,
            stop,
            order,
            with_scores: false,
        })
    }

    pub fn zrange_withscores(
        &mut self,
        key: &str,
        start: isize,
        stop: isize,
        order: Order,
    ) -> &mut Self {
        self.push(Command::ZRange {
            key: key.to_string(),
            start,
            stop,
            order,
            with_scores: true,
        })
    }

    pub fn zrangebyscore(
        &mut self,
        key: &str,
        min: ScoreBound,
        max: ScoreBound,
        order: Order,
    ) -> &mut Self {
        self.push(Command::ZRangeByScore {
            key: key.to_string(),
            min,
            max,
            order,
            with_scores: false,
        })
    }

    pub fn zrembyscore(&mut self, key: &str, min: ScoreBound, max: ScoreBound) -> &mut Self {
        self.push(Command::ZRemRangeByScore {
            key: key.to_string(),
            min,
            max,
        })
    }

    pub fn zremrangebyrank(&mut self, key: &str, start: isize, stop: isize) -> &mut Self {
        self.push(Command::ZRemRangeByRank {
            key: key.to_string(),
            start,
            stop,
        })
    }

    pub fn zunionstore(
        &mut self,
        destination: &str,
        keys: Vec<String>,
        aggregate: Aggregate,
    ) -> &mut Self {
        self.push(Command::ZUnionStore {
            destination: destination.to_string(),
            keys,
            aggregate,
        })
    }

    pub fn zinterstore(
        &mut self,
        destination: &str,
        keys: Vec<String>,
        aggregate: Aggregate,
    ) -> &mut Self {
        self.push(Command::ZInterStore {
            destination: destination.to_string(),
            keys,
            aggregate,
        })
    }

    pub fn hset(&mut self, key: &str, field: &str, value: &str) -> &mut Self {
        self.push(Command::HSet {
            key: key.to_string(),
            field: field.to_string(),
            value: value.to_string(),
        })
    }

    pub fn hget(&mut self, key: &str, field: &str) -> &mut Self {
        self.push(Command::HGet {
            key: key.to_string(),
            field: field.to_string(),
        })
    }

    pub fn hmget(&mut self, key: &str, fields: Vec<String>) -> &mut Self {
        self.push(Command::HMGet {
            key: key.to_string(),
            fields,
        })
    }

    pub fn hdel(&mut self, key: &str, field: &str) -> &mut Self {
        self.hdel_multiple(key, vec![field.to_string()])
    }

    pub fn hdel_multiple(&mut self, key: &str, fields: Vec<String>) -> &mut Self {
        self.push(Command::HDel {
            key: key.to_string(),
            fields,
        })
    }

    pub fn hlen(&mut self, key: &str) -> &mut Self {
        self.push(Command::HLen {
            key: key.to_string(),
        })
    }

    pub fn del(&mut self, keys: Vec<String>) -> &mut Self {
        self.push(Command::Del { keys })
    }

    pub fn exists(&mut self, key: &str) -> &mut Self {
        self.push(Command::Exists {
            key: key.to_string(),
        })
    }

    pub fn expire(&mut self, key: &str, seconds: i64) -> &mut Self {
        self.push(Command::Expire {
            key: key.to_string(),
            seconds,
        })
    }

    pub fn expire_at(&mut self, key: &str, timestamp: i64) -> &mut Self {
        self.push(Command::ExpireAt {
            key: key.to_string(),
            timestamp,
        })
    }

    pub fn ttl(&mut self, key: &str) -> &mut Self {
        self.push(Command::Ttl {
            key: key.to_string(),
        })
    }
}

/// Decoded reply to a single [`Command`]
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Integer(i64),
    Score(Option<f64>),
    Rank(Option<u64>),
    Members(Vec<String>),
    ScoredMembers(Vec<(String, f64)>),
    Data(Option<String>),
    DataList(Vec<Option<String>>),
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reply::Integer(_) => f.write_str("integer"),
            Reply::Score(_) => f.write_str("score"),
            Reply::Rank(_) => f.write_str("rank"),
            Reply::Members(_) => f.write_str("member list"),
            Reply::ScoredMembers(_) => f.write_str("scored member list"),
            Reply::Data(_) => f.write_str("data"),
            Reply::DataList(_) => f.write_str("data list"),
        }
    }
}

/// Cursor over the replies of an executed [`Batch`], consumed in command order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Replies {
    replies: VecDeque<Reply>,
}

impl Replies {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: replies.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.replies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.replies.is_empty()
    }

    fn next(&mut self, expected: &'static str) -> StoreResult<Reply> {
        self.replies.pop_front().ok_or(StoreError::UnexpectedReply {
            expected,
            found: "end of replies".to_string(),
        })
    }

    /// Discard the next reply
    pub fn skip(&mut self) -> StoreResult<()> {
        self.next("any reply").map(|_| ())
    }

    pub fn integer(&mut self) -> StoreResult<i64> {
        match self.next("integer")? {
            Reply::Integer(value) => Ok(value),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Integer reply that counts something, clamped at zero
    pub fn count(&mut self) -> StoreResult<u64> {
        self.integer().map(|value| value.max(0) as u64)
    }

    pub fn score(&mut self) -> StoreResult<Option<f64>> {
        match self.next("score")? {
            Reply::Score(score) => Ok(score),
            other => Err(unexpected("score", &other)),
        }
    }

    pub fn rank(&mut self) -> StoreResult<Option<u64>> {
        match self.next("rank")? {
            Reply::Rank(rank) => Ok(rank),
            other => Err(unexpected("rank", &other)),
        }
    }

    pub fn members(&mut self) -> StoreResult<Vec<String>> {
        match self.next("member list")? {
            Reply::Members(members) => Ok(members),
            other => Err(unexpected("member list", &other)),
        }
    }

    pub fn scored_members(&mut self) -> StoreResult<Vec<(String, f64)>> {
        match self.next("scored member list")? {
            Reply::ScoredMembers(members) => Ok(members),
            other => Err(unexpected("scored member list", &other)),
        }
    }

    pub fn data(&mut self) -> StoreResult<Option<String>> {
        match self.next("data")? {
            Reply::Data(data) => Ok(data),
            other => Err(unexpected("data", &other)),
        }
    }

    pub fn data_list(&mut self) -> StoreResult<Vec<Option<String>>> {
        match self.next("data list")? {
            Reply::DataList(data) => Ok(data),
            other => Err(unexpected("data list", &other)),
        }
    }
}

fn unexpected(expected: &'static str, found: &Reply) -> StoreError {
    StoreError::UnexpectedReply {
        expected,
        found: found.to_string(),
    }
}
