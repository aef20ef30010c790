//! Leaderboard key schema
//!
//! A leaderboard named `scores` owns up to three keys:
//! - `scores` - sorted set of member -> score
//! - `scores:member_data` - hash of member -> opaque data (or a single
//!   shared `member_data` hash when member data is global)
//! - `scores:ties` - sorted set of distinct scores, tie-grouped leaderboards only

use crate::config::LeaderboardConfig;
use std::collections::HashSet;

/// Key builder bound to a leaderboard configuration
#[derive(Debug, Clone)]
pub struct LeaderboardKeys {
    member_data_namespace: String,
    global_member_data: bool,
    ties_namespace: String,
}

impl LeaderboardKeys {
    pub fn new(config: &LeaderboardConfig) -> Self {
        Self {
            member_data_namespace: config.member_data_namespace.clone(),
            global_member_data: config.global_member_data,
            ties_namespace: config.ties_namespace.clone(),
        }
    }

    /// Member-data hash for a leaderboard
    /// Format: {leaderboard}:{namespace}, or {namespace} when global
    pub fn member_data(&self, leaderboard: &str) -> String {
        if self.global_member_data {
            self.member_data_namespace.clone()
        } else {
            format!("{}:{}", leaderboard, self.member_data_namespace)
        }
    }

    /// Distinct-score index for a leaderboard
    /// Format: {leaderboard}:{ties_namespace}
    pub fn ties(&self, leaderboard: &str) -> String {
        format!("{}:{}", leaderboard, self.ties_namespace)
    }
}

/// Canonical member name of a score inside the distinct-score index.
///
/// Every score that compares equal maps to the same string, so `-0.0` and
/// `0.0` share an entry.
pub fn tie_member(score: f64) -> String {
    let score = if score == 0.0 { 0.0 } else { score };
    format!("{:?}", score)
}

/// Scores with duplicates dropped, compared through [`tie_member`], in
/// first-seen order
pub(crate) fn distinct_scores(scores: impl IntoIterator<Item = f64>) -> Vec<f64> {
    let mut seen = HashSet::new();
    scores
        .into_iter()
        .filter(|score| seen.insert(tie_member(*score)))
        .collect()
}
