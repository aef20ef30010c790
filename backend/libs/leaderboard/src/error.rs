//! Leaderboard error types

use thiserror::Error;

/// Failures raised by a [`ScoreStore`](crate::store::ScoreStore) adapter.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Unexpected reply: expected {expected}, found {found}")]
    UnexpectedReply {
        expected: &'static str,
        found: String,
    },

    #[error("Reply count mismatch: expected {expected}, found {found}")]
    ReplyCountMismatch { expected: usize, found: usize },

    #[error("Operation against a key holding the wrong kind of value: {0}")]
    WrongType(String),
}

#[derive(Error, Debug)]
pub enum LeaderboardError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("{0} is not one of [asc,desc]")]
    InvalidOrder(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl From<redis::RedisError> for LeaderboardError {
    fn from(err: redis::RedisError) -> Self {
        LeaderboardError::Store(StoreError::Redis(err))
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
pub type LeaderboardResult<T> = Result<T, LeaderboardError>;
