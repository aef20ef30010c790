//! Shared fixtures for leaderboard integration tests

#![allow(dead_code)]

use leaderboard::{Leaderboard, LeaderboardConfig, MemoryStore, RankEngine, SharedStore};
use std::sync::{Arc, Once};

static TRACING: Once = Once::new();

/// Install a test subscriber honouring `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn memory_store() -> SharedStore {
    init_tracing();
    Arc::new(MemoryStore::new())
}

pub fn config() -> LeaderboardConfig {
    LeaderboardConfig::default()
}

pub fn member_data(index: usize) -> String {
    format!("{{\"member_name\":\"Leaderboard member {index}\"}}")
}

/// Rank `member_1..=member_{count}` with score equal to their index
pub async fn rank_members<E: RankEngine>(leaderboard: &Leaderboard<E>, count: usize) {
    for index in 1..=count {
        leaderboard
            .rank_member(
                &format!("member_{index}"),
                index as f64,
                Some(&member_data(index)),
            )
            .await
            .unwrap();
    }
}

/// Rank `{A:50, B:50, C:30, D:30, E:10}`
pub async fn rank_tied_members<E: RankEngine>(leaderboard: &Leaderboard<E>) {
    for (member, score) in [("A", 50.0), ("B", 50.0), ("C", 30.0), ("D", 30.0), ("E", 10.0)] {
        leaderboard.rank_member(member, score, None).await.unwrap();
    }
}

pub fn names(members: &[&str]) -> Vec<String> {
    members.iter().map(|m| m.to_string()).collect()
}
