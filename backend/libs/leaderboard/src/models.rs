use serde::{Deserialize, Serialize};

/// A member's standing in a leaderboard, as returned by queries.
///
/// `score` and `rank` are `None` for members absent from the leaderboard and
/// for `members_only` queries. `member_data` is only filled when requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedEntry {
    pub member: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_data: Option<String>,
}

impl RankedEntry {
    pub fn new(member: impl Into<String>, score: Option<f64>, rank: Option<u64>) -> Self {
        Self {
            member: member.into(),
            score,
            rank,
            member_data: None,
        }
    }

    /// Entry carrying only the member name
    pub fn member_only(member: impl Into<String>) -> Self {
        Self::new(member, None, None)
    }

    pub fn is_ranked(&self) -> bool {
        self.rank.is_some()
    }
}

/// Drift between a member set and its distinct-score index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TieConsistencyReport {
    /// Index entries no member holds anymore
    pub orphaned: Vec<f64>,
    /// Member scores with no index entry
    pub missing: Vec<f64>,
}

impl TieConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.orphaned.is_empty() && self.missing.is_empty()
    }
}
