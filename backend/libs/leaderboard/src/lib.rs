//! Leaderboards on top of Redis sorted sets
//!
//! Provides ranked member storage with three ranking flavours:
//! - Dense ranking, every member gets a distinct rank (1,2,3,4,5)
//! - Competition ranking, ties share a rank and leave gaps (1,1,3,3,5)
//! - Tie-grouped ranking, ties share a rank with no gaps (1,1,2,2,3)
//!
//! plus paging, around-me windows, percentiles, per-member data blobs,
//! merge/intersect and expiry.
//!
//! ```no_run
//! use leaderboard::{Leaderboard, LeaderboardConfig, MemoryStore, QueryOptions};
//! use std::sync::Arc;
//!
//! # async fn demo() -> leaderboard::LeaderboardResult<()> {
//! let store = Arc::new(MemoryStore::new());
//! let highscores = Leaderboard::new("highscores", store, LeaderboardConfig::default());
//!
//! highscores.rank_member("alice", 120.0, Some("{\"level\":3}")).await?;
//! highscores.rank_member("bob", 95.0, None).await?;
//!
//! let page = highscores.leaders(1, &QueryOptions::default().with_member_data()).await?;
//! assert_eq!(page[0].member, "alice");
//! # Ok(())
//! # }
//! ```

mod error;
mod keys;
mod metrics;

pub mod config;
pub mod engine;
pub mod models;
pub mod paging;
pub mod store;

pub use config::{
    Aggregate, LeaderboardConfig, Order, QueryOptions, SortBy, DEFAULT_PAGE_SIZE,
};
pub use engine::{
    CompetitionRanking, CompetitionRankingLeaderboard, DenseRanking, DenseRankingLeaderboard,
    Leaderboard, LeaderboardCore, RankEngine, TieRanking, TieRankingLeaderboard,
};
pub use error::{LeaderboardError, LeaderboardResult, StoreError, StoreResult};
pub use keys::{tie_member, LeaderboardKeys};
pub use metrics::LeaderboardMetrics;
pub use models::{RankedEntry, TieConsistencyReport};
pub use store::{MemoryStore, RedisStore, ScoreStore, SharedStore};
