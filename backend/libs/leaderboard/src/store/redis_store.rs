//! Redis-backed score store
//!
//! Each [`Batch`] is sent as one MULTI/EXEC pipeline over the shared
//! connection manager, so a batch either applies completely or fails.

use super::{Batch, Command, Replies, Reply, ScoreStore};
use crate::config::Order;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use redis::{from_redis_value, Pipeline, Value};
use redis_utils::SharedConnectionManager;
use tracing::debug;

/// Score store over a shared Redis connection manager
#[derive(Clone)]
pub struct RedisStore {
    redis: SharedConnectionManager,
}

impl RedisStore {
    pub fn new(redis: SharedConnectionManager) -> Self {
        Self { redis }
    }

    pub fn manager(&self) -> SharedConnectionManager {
        self.redis.clone()
    }
}

#[async_trait]
impl ScoreStore for RedisStore {
    async fn execute(&self, batch: Batch) -> StoreResult<Replies> {
        if batch.is_empty() {
            return Ok(Replies::default());
        }

        let commands = batch.into_commands();
        let mut pipe = Pipeline::new();
        pipe.atomic();
        for command in &commands {
            encode(&mut pipe, command);
        }

        let values: Vec<Value> = {
            let mut conn = self.redis.lock().await;
            pipe.query_async(&mut *conn).await?
        };

        if values.len() != commands.len() {
            return Err(StoreError::ReplyCountMismatch {
                expected: commands.len(),
                found: values.len(),
            });
        }

        let replies = commands
            .iter()
            .zip(values.iter())
            .map(|(command, value)| decode(command, value))
            .collect::<StoreResult<Vec<_>>>()?;

        debug!(commands = commands.len(), "Redis pipeline executed");
        Ok(Replies::new(replies))
    }
}

fn encode(pipe: &mut Pipeline, command: &Command) {
    match command {
        Command::ZAdd { key, members } => {
            pipe.cmd("ZADD").arg(key);
            for (member, score) in members {
                pipe.arg(*score).arg(member);
            }
        }
        Command::ZIncrBy { key, member, delta } => {
            pipe.cmd("ZINCRBY").arg(key).arg(*delta).arg(member);
        }
        Command::ZRem { key, members } => {
            pipe.cmd("ZREM").arg(key).arg(members);
        }
        Command::ZCard { key } => {
            pipe.cmd("ZCARD").arg(key);
        }
        Command::ZCount { key, min, max } => {
            pipe.cmd("ZCOUNT")
                .arg(key)
                .arg(min.to_arg())
                .arg(max.to_arg());
        }
        Command::ZRank { key, member, .. } | Command::ZScore { key, member } => {
            pipe.cmd(command.name()).arg(key).arg(member);
        }
        Command::ZRange {
            key,
            start,
            stop,
            with_scores,
            ..
        } => {
            pipe.cmd(command.name()).arg(key).arg(*start).arg(*stop);
            if *with_scores {
                pipe.arg("WITHSCORES");
            }
        }
        Command::ZRangeByScore {
            key,
            min,
            max,
            order,
            with_scores,
        } => {
            // ZREVRANGEBYSCORE takes its bounds as max, min
            let (first, second) = match order {
                Order::Asc => (min, max),
                Order::Desc => (max, min),
            };
            pipe.cmd(command.name())
                .arg(key)
                .arg(first.to_arg())
                .arg(second.to_arg());
            if *with_scores {
                pipe.arg("WITHSCORES");
            }
        }
        Command::ZRemRangeByScore { key, min, max } => {
            pipe.cmd("ZREMRANGEBYSCORE")
                .arg(key)
                .arg(min.to_arg())
                .arg(max.to_arg());
        }
        Command::ZRemRangeByRank { key, start, stop } => {
            pipe.cmd("ZREMRANGEBYRANK").arg(key).arg(*start).arg(*stop);
        }
        Command::ZUnionStore {
            destination,
            keys,
            aggregate,
        }
        | Command::ZInterStore {
            destination,
            keys,
            aggregate,
        } => {
            pipe.cmd(command.name())
                .arg(destination)
                .arg(keys.len())
                .arg(keys)
                .arg("AGGREGATE")
                .arg(aggregate.as_str());
        }
        Command::HSet { key, field, value } => {
            pipe.cmd("HSET").arg(key).arg(field).arg(value);
        }
        Command::HGet { key, field } => {
            pipe.cmd("HGET").arg(key).arg(field);
        }
        Command::HMGet { key, fields } => {
            pipe.cmd("HMGET").arg(key).arg(fields);
        }
        Command::HDel { key, fields } => {
            pipe.cmd("HDEL").arg(key).arg(fields);
        }
        Command::HLen { key } => {
            pipe.cmd("HLEN").arg(key);
        }
        Command::Del { keys } => {
            pipe.cmd("DEL").arg(keys);
        }
        Command::Exists { key } => {
            pipe.cmd("EXISTS").arg(key);
        }
        Command::Expire { key, seconds } => {
            pipe.cmd("EXPIRE").arg(key).arg(*seconds);
        }
        Command::ExpireAt { key, timestamp } => {
            pipe.cmd("EXPIREAT").arg(key).arg(*timestamp);
        }
        Command::Ttl { key } => {
            pipe.cmd("TTL").arg(key);
        }
    }
}

fn decode(command: &Command, value: &Value) -> StoreResult<Reply> {
    let reply = match command {
        Command::ZIncrBy { .. } => Reply::Score(Some(from_redis_value::<f64>(value)?)),
        Command::ZScore { .. } => Reply::Score(from_redis_value::<Option<f64>>(value)?),
        Command::ZRank { .. } => Reply::Rank(from_redis_value::<Option<u64>>(value)?),
        Command::ZRange {
            with_scores: true,
            ..
        }
        | Command::ZRangeByScore {
            with_scores: true,
            ..
        } => Reply::ScoredMembers(from_redis_value::<Vec<(String, f64)>>(value)?),
        Command::ZRange { .. } | Command::ZRangeByScore { .. } => {
            Reply::Members(from_redis_value::<Vec<String>>(value)?)
        }
        Command::HGet { .. } => Reply::Data(from_redis_value::<Option<String>>(value)?),
        Command::HMGet { .. } => {
            Reply::DataList(from_redis_value::<Vec<Option<String>>>(value)?)
        }
        _ => Reply::Integer(from_redis_value::<i64>(value)?),
    };
    Ok(reply)
}
