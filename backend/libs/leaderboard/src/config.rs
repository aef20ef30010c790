/// Leaderboard configuration shared by every ranking engine
use crate::error::{LeaderboardError, LeaderboardResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_MEMBER_DATA_NAMESPACE: &str = "member_data";
pub const DEFAULT_GLOBAL_MEMBER_DATA: bool = false;
pub const DEFAULT_TIES_NAMESPACE: &str = "ties";

/// Which end of the score axis ranks first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Order {
    /// Lower score is better.
    Asc,
    /// Higher score is better.
    #[default]
    Desc,
}

impl Order {
    pub fn as_str(&self) -> &'static str {
        match self {
            Order::Asc => "asc",
            Order::Desc => "desc",
        }
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Order {
    type Err = LeaderboardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "asc" => Ok(Order::Asc),
            "desc" => Ok(Order::Desc),
            _ => Err(LeaderboardError::InvalidOrder(raw.to_string())),
        }
    }
}

/// How scores are combined by merge and intersect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Aggregate {
    #[default]
    Sum,
    Min,
    Max,
}

impl Aggregate {
    pub fn as_str(&self) -> &'static str {
        match self {
            Aggregate::Sum => "SUM",
            Aggregate::Min => "MIN",
            Aggregate::Max => "MAX",
        }
    }

    pub fn combine(&self, left: f64, right: f64) -> f64 {
        match self {
            Aggregate::Sum => left + right,
            Aggregate::Min => left.min(right),
            Aggregate::Max => left.max(right),
        }
    }
}

/// Leaderboard-wide settings, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaderboardConfig {
    pub order: Order,
    /// Default number of entries per page
    pub page_size: usize,
    /// Suffix (or whole key when global) of the member-data hash
    pub member_data_namespace: String,
    /// Share a single member-data hash across every leaderboard
    pub global_member_data: bool,
    /// Suffix of the distinct-score index kept by tie-grouped leaderboards
    pub ties_namespace: String,
}

impl Default for LeaderboardConfig {
    fn default() -> Self {
        Self {
            order: Order::Desc,
            page_size: DEFAULT_PAGE_SIZE,
            member_data_namespace: DEFAULT_MEMBER_DATA_NAMESPACE.to_string(),
            global_member_data: DEFAULT_GLOBAL_MEMBER_DATA,
            ties_namespace: DEFAULT_TIES_NAMESPACE.to_string(),
        }
    }
}

impl LeaderboardConfig {
    /// Load configuration from `LEADERBOARD_*` environment variables
    pub fn from_env() -> LeaderboardResult<Self> {
        let order = match std::env::var("LEADERBOARD_ORDER") {
            Ok(raw) => raw.parse()?,
            Err(_) => Order::Desc,
        };

        let page_size = match std::env::var("LEADERBOARD_PAGE_SIZE") {
            Ok(raw) => raw.parse::<usize>().map_err(|_| {
                LeaderboardError::Config(format!("LEADERBOARD_PAGE_SIZE must be an integer: {raw}"))
            })?,
            Err(_) => DEFAULT_PAGE_SIZE,
        };

        let config = Self {
            order,
            page_size,
            member_data_namespace: std::env::var("LEADERBOARD_MEMBER_DATA_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_MEMBER_DATA_NAMESPACE.to_string()),
            global_member_data: std::env::var("LEADERBOARD_GLOBAL_MEMBER_DATA")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_GLOBAL_MEMBER_DATA),
            ties_namespace: std::env::var("LEADERBOARD_TIES_NAMESPACE")
                .unwrap_or_else(|_| DEFAULT_TIES_NAMESPACE.to_string()),
        };

        Ok(config.normalized())
    }

    pub fn with_order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self.normalized()
    }

    pub fn with_member_data_namespace(mut self, namespace: &str) -> Self {
        self.member_data_namespace = namespace.to_string();
        self
    }

    pub fn with_global_member_data(mut self, global: bool) -> Self {
        self.global_member_data = global;
        self
    }

    pub fn with_ties_namespace(mut self, namespace: &str) -> Self {
        self.ties_namespace = namespace.to_string();
        self
    }

    /// Replace a zero page size with [`DEFAULT_PAGE_SIZE`].
    pub fn normalized(mut self) -> Self {
        self.page_size = normalize_page_size(self.page_size);
        self
    }
}

pub(crate) fn normalize_page_size(page_size: usize) -> usize {
    if page_size == 0 {
        warn!(
            default = DEFAULT_PAGE_SIZE,
            "Page size must be positive, falling back to default"
        );
        DEFAULT_PAGE_SIZE
    } else {
        page_size
    }
}

/// Field used to reorder `ranked_in_list` results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    Rank,
    Score,
}

impl FromStr for SortBy {
    type Err = LeaderboardError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw {
            "rank" => Ok(SortBy::Rank),
            "score" => Ok(SortBy::Score),
            other => Err(LeaderboardError::Config(format!(
                "{other} is not one of [rank,score]"
            ))),
        }
    }
}

/// Per-call options for queries returning ranked entries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryOptions {
    /// Overrides the leaderboard page size for this call
    pub page_size: Option<usize>,
    pub with_member_data: bool,
    /// Keep members absent from the leaderboard (with no score or rank)
    pub include_missing: bool,
    pub sort_by: Option<SortBy>,
    /// Return bare member names without score or rank lookups
    pub members_only: bool,
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self {
            page_size: None,
            with_member_data: false,
            include_missing: true,
            sort_by: None,
            members_only: false,
        }
    }
}

impl QueryOptions {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size);
        self
    }

    pub fn with_member_data(mut self) -> Self {
        self.with_member_data = true;
        self
    }

    pub fn exclude_missing(mut self) -> Self {
        self.include_missing = false;
        self
    }

    pub fn sort_by(mut self, sort_by: SortBy) -> Self {
        self.sort_by = Some(sort_by);
        self
    }

    pub fn members_only(mut self) -> Self {
        self.members_only = true;
        self
    }

    /// Page size for this call, falling back to `default` when unset.
    pub fn page_size_or(&self, default: usize) -> usize {
        normalize_page_size(self.page_size.unwrap_or(default))
    }
}
