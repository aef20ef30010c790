//! Ranking engines and the leaderboard façade.
//!
//! [`Leaderboard`] owns everything the three ranking variants share: paging,
//! windows, percentiles, member data and merge/intersect. Rank computation and
//! the writes that must keep auxiliary indexes in step are delegated to a
//! [`RankEngine`]. Every hook has a dense default, so an engine only overrides
//! what it ranks differently.

mod competition;
mod dense;
mod tie;

pub use self::competition::CompetitionRanking;
pub use self::dense::DenseRanking;
pub use self::tie::TieRanking;

use crate::config::{Aggregate, LeaderboardConfig, Order, QueryOptions};
use crate::error::LeaderboardResult;
use crate::keys::LeaderboardKeys;
use crate::metrics::LeaderboardMetrics;
use crate::models::RankedEntry;
use crate::paging;
use crate::store::{Batch, Replies, ScoreBound, SharedStore};
use async_trait::async_trait;
use tracing::{debug, info, warn};

/// Leaderboard with standard (dense) ranking: 1,2,3,4,5
pub type DenseRankingLeaderboard = Leaderboard<DenseRanking>;
/// Leaderboard with standard competition ranking: 1,1,3,3,5
pub type CompetitionRankingLeaderboard = Leaderboard<CompetitionRanking>;
/// Leaderboard with tie-grouped ranking: 1,1,2,2,3
pub type TieRankingLeaderboard = Leaderboard<TieRanking>;

/// State shared by a leaderboard and its engine.
pub struct LeaderboardCore {
    store: SharedStore,
    config: LeaderboardConfig,
    keys: LeaderboardKeys,
    metrics: LeaderboardMetrics,
}

impl LeaderboardCore {
    pub fn new(store: SharedStore, config: LeaderboardConfig) -> Self {
        let config = config.normalized();
        Self {
            keys: LeaderboardKeys::new(&config),
            store,
            config,
            metrics: LeaderboardMetrics::new(),
        }
    }

    pub fn config(&self) -> &LeaderboardConfig {
        &self.config
    }

    pub fn order(&self) -> Order {
        self.config.order
    }

    pub fn keys(&self) -> &LeaderboardKeys {
        &self.keys
    }

    /// Execute one batch against the store
    pub async fn run(&self, batch: Batch) -> LeaderboardResult<Replies> {
        if batch.is_empty() {
            return Ok(Replies::default());
        }

        let commands = batch.len();
        self.metrics.record_batch(&batch);
        let _timer = self.metrics.start_timer();

        match self.store.execute(batch).await {
            Ok(replies) => {
                debug!(commands, "Store batch executed");
                Ok(replies)
            }
            Err(e) => {
                self.metrics.record_error();
                warn!(commands, error = %e, "Store batch failed");
                Err(e.into())
            }
        }
    }

    pub async fn score_for(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<f64>> {
        let mut batch = Batch::new();
        batch.zscore(leaderboard, member);
        Ok(self.run(batch).await?.score()?)
    }

    /// 0-based store rank in the configured order
    pub async fn store_rank(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<u64>> {
        let mut batch = Batch::new();
        batch.zrank(leaderboard, member, self.order());
        Ok(self.run(batch).await?.rank()?)
    }

    pub async fn total_members(&self, leaderboard: &str) -> LeaderboardResult<u64> {
        let mut batch = Batch::new();
        batch.zcard(leaderboard);
        Ok(self.run(batch).await?.count()?)
    }

    /// Number of members holding exactly `score`
    pub async fn members_at_score(&self, leaderboard: &str, score: f64) -> LeaderboardResult<u64> {
        let mut batch = Batch::new();
        batch.zcount(
            leaderboard,
            ScoreBound::Inclusive(score),
            ScoreBound::Inclusive(score),
        );
        Ok(self.run(batch).await?.count()?)
    }

    /// Member names in an index window of the configured order
    pub async fn range(&self, leaderboard: &str, start: isize, stop: isize) -> LeaderboardResult<Vec<String>> {
        let mut batch = Batch::new();
        batch.zrange(leaderboard, start, stop, self.order());
        Ok(self.run(batch).await?.members()?)
    }

    pub async fn members_data(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> LeaderboardResult<Vec<Option<String>>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }
        let mut batch = Batch::new();
        batch.hmget(&self.keys.member_data(leaderboard), members.to_vec());
        Ok(self.run(batch).await?.data_list()?)
    }
}

/// Rank computation and index-maintaining writes of one ranking variant.
///
/// Defaults implement dense ranking over the member set alone.
#[async_trait]
pub trait RankEngine: Send + Sync {
    async fn rank_member_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        dense::rank_member_in(core, leaderboard, member, score, member_data).await
    }

    async fn rank_members_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        members: &[(String, f64)],
    ) -> LeaderboardResult<()> {
        dense::rank_members_in(core, leaderboard, members).await
    }

    async fn rank_member_across(
        &self,
        core: &LeaderboardCore,
        leaderboards: &[String],
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        dense::rank_member_across(core, leaderboards, member, score, member_data).await
    }

    async fn remove_member_from(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<()> {
        dense::remove_member_from(core, leaderboard, member).await
    }

    /// Returns the member's new score
    async fn change_score_for_member_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
        delta: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<f64> {
        dense::change_score_for_member_in(core, leaderboard, member, delta, member_data).await
    }

    async fn remove_members_in_score_range_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        min_score: f64,
        max_score: f64,
    ) -> LeaderboardResult<u64> {
        dense::remove_members_in_score_range_in(core, leaderboard, min_score, max_score).await
    }

    async fn remove_members_outside_rank_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        rank: u64,
    ) -> LeaderboardResult<u64> {
        dense::remove_members_outside_rank_in(core, leaderboard, rank).await
    }

    async fn delete_leaderboard_named(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
    ) -> LeaderboardResult<()> {
        dense::delete_leaderboard_named(core, leaderboard, &[]).await
    }

    async fn expire_leaderboard_for(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        seconds: i64,
    ) -> LeaderboardResult<()> {
        dense::expire_leaderboard_for(core, leaderboard, seconds, &[]).await
    }

    async fn expire_leaderboard_at_for(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        timestamp: i64,
    ) -> LeaderboardResult<()> {
        dense::expire_leaderboard_at_for(core, leaderboard, timestamp, &[]).await
    }

    /// 1-based rank, `None` for absent members
    async fn rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<Option<u64>> {
        dense::rank_for_in(core, leaderboard, member).await
    }

    async fn score_and_rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<RankedEntry> {
        dense::score_and_rank_for_in(core, leaderboard, member).await
    }

    /// Score and rank of each member, in input order.
    ///
    /// Only `include_missing` is honoured here; member data and sorting are
    /// applied by the caller.
    async fn ranked_in_list_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        members: &[String],
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        dense::ranked_in_list_in(core, leaderboard, members, options).await
    }

    /// Runs after merge or intersect has written `destination`
    async fn after_combine(&self, _core: &LeaderboardCore, _destination: &str) -> LeaderboardResult<()> {
        Ok(())
    }
}

/// A named leaderboard over a shared score store.
///
/// Every operation has a form bound to this leaderboard's name and an `_in`
/// form taking an explicit leaderboard name, so one instance can serve any
/// number of leaderboards with the same configuration.
pub struct Leaderboard<E: RankEngine = DenseRanking> {
    name: String,
    core: LeaderboardCore,
    engine: E,
}

impl Leaderboard<DenseRanking> {
    pub fn new(name: &str, store: SharedStore, config: LeaderboardConfig) -> Self {
        Self::with_engine(name, store, config, DenseRanking)
    }
}

impl Leaderboard<CompetitionRanking> {
    pub fn competition(name: &str, store: SharedStore, config: LeaderboardConfig) -> Self {
        Self::with_engine(name, store, config, CompetitionRanking)
    }
}

impl Leaderboard<TieRanking> {
    pub fn tie(name: &str, store: SharedStore, config: LeaderboardConfig) -> Self {
        Self::with_engine(name, store, config, TieRanking)
    }
}

impl<E: RankEngine> Leaderboard<E> {
    pub fn with_engine(name: &str, store: SharedStore, config: LeaderboardConfig, engine: E) -> Self {
        Self {
            name: name.to_string(),
            core: LeaderboardCore::new(store, config),
            engine,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LeaderboardConfig {
        self.core.config()
    }

    pub fn order(&self) -> Order {
        self.core.order()
    }

    pub fn page_size(&self) -> usize {
        self.core.config().page_size
    }

    pub fn member_data_key(&self, leaderboard: &str) -> String {
        self.core.keys().member_data(leaderboard)
    }

    pub fn core(&self) -> &LeaderboardCore {
        &self.core
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    // ---- writes ----

    pub async fn rank_member(&self, member: &str, score: f64, member_data: Option<&str>) -> LeaderboardResult<()> {
        self.rank_member_in(&self.name, member, score, member_data).await
    }

    pub async fn rank_member_in(
        &self,
        leaderboard: &str,
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        self.engine
            .rank_member_in(&self.core, leaderboard, member, score, member_data)
            .await
    }

    /// Rank a member only if `predicate` approves.
    ///
    /// The predicate sees `(leaderboard, member, current_score, new_score,
    /// member_data, order)`. The read and the write are separate round trips,
    /// so a concurrent writer may slip in between them.
    pub async fn rank_member_if<F>(
        &self,
        predicate: F,
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<bool>
    where
        F: FnOnce(&Self, &str, Option<f64>, f64, Option<&str>, Order) -> bool + Send,
    {
        self.rank_member_if_in(&self.name, predicate, member, score, member_data)
            .await
    }

    pub async fn rank_member_if_in<F>(
        &self,
        leaderboard: &str,
        predicate: F,
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<bool>
    where
        F: FnOnce(&Self, &str, Option<f64>, f64, Option<&str>, Order) -> bool + Send,
    {
        let current_score = self.core.score_for(leaderboard, member).await?;
        if !predicate(self, member, current_score, score, member_data, self.order()) {
            debug!(leaderboard = %leaderboard, member = %member, "Conditional rank declined");
            return Ok(false);
        }
        self.rank_member_in(leaderboard, member, score, member_data)
            .await?;
        Ok(true)
    }

    pub async fn rank_members(&self, members: &[(String, f64)]) -> LeaderboardResult<()> {
        self.rank_members_in(&self.name, members).await
    }

    pub async fn rank_members_in(&self, leaderboard: &str, members: &[(String, f64)]) -> LeaderboardResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        self.engine
            .rank_members_in(&self.core, leaderboard, members)
            .await
    }

    /// Rank one member in several leaderboards at once
    pub async fn rank_member_across(
        &self,
        leaderboards: &[String],
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        self.engine
            .rank_member_across(&self.core, leaderboards, member, score, member_data)
            .await
    }

    pub async fn remove_member(&self, member: &str) -> LeaderboardResult<()> {
        self.remove_member_from(&self.name, member).await
    }

    pub async fn remove_member_from(&self, leaderboard: &str, member: &str) -> LeaderboardResult<()> {
        self.engine
            .remove_member_from(&self.core, leaderboard, member)
            .await
    }

    /// Add `delta` to a member's score, creating it at `delta` when absent
    pub async fn change_score_for(
        &self,
        member: &str,
        delta: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<f64> {
        self.change_score_for_member_in(&self.name, member, delta, member_data)
            .await
    }

    pub async fn change_score_for_member_in(
        &self,
        leaderboard: &str,
        member: &str,
        delta: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<f64> {
        self.engine
            .change_score_for_member_in(&self.core, leaderboard, member, delta, member_data)
            .await
    }

    /// Remove members whose score lies in `[min_score, max_score]`
    pub async fn remove_members_in_score_range(&self, min_score: f64, max_score: f64) -> LeaderboardResult<u64> {
        self.remove_members_in_score_range_in(&self.name, min_score, max_score)
            .await
    }

    pub async fn remove_members_in_score_range_in(
        &self,
        leaderboard: &str,
        min_score: f64,
        max_score: f64,
    ) -> LeaderboardResult<u64> {
        let removed = self
            .engine
            .remove_members_in_score_range_in(&self.core, leaderboard, min_score, max_score)
            .await?;
        info!(leaderboard = %leaderboard, min_score, max_score, removed, "Removed members in score range");
        Ok(removed)
    }

    /// Keep the top `rank` members and remove the rest
    pub async fn remove_members_outside_rank(&self, rank: u64) -> LeaderboardResult<u64> {
        self.remove_members_outside_rank_in(&self.name, rank).await
    }

    pub async fn remove_members_outside_rank_in(&self, leaderboard: &str, rank: u64) -> LeaderboardResult<u64> {
        let removed = self
            .engine
            .remove_members_outside_rank_in(&self.core, leaderboard, rank)
            .await?;
        info!(leaderboard = %leaderboard, rank, removed, "Removed members outside rank");
        Ok(removed)
    }

    pub async fn delete_leaderboard(&self) -> LeaderboardResult<()> {
        self.delete_leaderboard_named(&self.name).await
    }

    pub async fn delete_leaderboard_named(&self, leaderboard: &str) -> LeaderboardResult<()> {
        self.engine
            .delete_leaderboard_named(&self.core, leaderboard)
            .await?;
        info!(leaderboard = %leaderboard, "Leaderboard deleted");
        Ok(())
    }

    pub async fn expire_leaderboard(&self, seconds: i64) -> LeaderboardResult<()> {
        self.expire_leaderboard_for(&self.name, seconds).await
    }

    pub async fn expire_leaderboard_for(&self, leaderboard: &str, seconds: i64) -> LeaderboardResult<()> {
        self.engine
            .expire_leaderboard_for(&self.core, leaderboard, seconds)
            .await
    }

    /// Expire at a UNIX timestamp in seconds
    pub async fn expire_leaderboard_at(&self, timestamp: i64) -> LeaderboardResult<()> {
        self.expire_leaderboard_at_for(&self.name, timestamp).await
    }

    pub async fn expire_leaderboard_at_for(&self, leaderboard: &str, timestamp: i64) -> LeaderboardResult<()> {
        self.engine
            .expire_leaderboard_at_for(&self.core, leaderboard, timestamp)
            .await
    }

    // ---- member data ----

    pub async fn member_data_for(&self, member: &str) -> LeaderboardResult<Option<String>> {
        self.member_data_for_in(&self.name, member).await
    }

    pub async fn member_data_for_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<String>> {
        let mut batch = Batch::new();
        batch.hget(&self.core.keys().member_data(leaderboard), member);
        Ok(self.core.run(batch).await?.data()?)
    }

    pub async fn members_data_for(&self, members: &[String]) -> LeaderboardResult<Vec<Option<String>>> {
        self.members_data_for_in(&self.name, members).await
    }

    pub async fn members_data_for_in(
        &self,
        leaderboard: &str,
        members: &[String],
    ) -> LeaderboardResult<Vec<Option<String>>> {
        self.core.members_data(leaderboard, members).await
    }

    pub async fn update_member_data(&self, member: &str, member_data: &str) -> LeaderboardResult<()> {
        self.update_member_data_in(&self.name, member, member_data)
            .await
    }

    pub async fn update_member_data_in(
        &self,
        leaderboard: &str,
        member: &str,
        member_data: &str,
    ) -> LeaderboardResult<()> {
        let mut batch = Batch::new();
        batch.hset(&self.core.keys().member_data(leaderboard), member, member_data);
        self.core.run(batch).await?;
        Ok(())
    }

    pub async fn remove_member_data(&self, member: &str) -> LeaderboardResult<()> {
        self.remove_member_data_in(&self.name, member).await
    }

    pub async fn remove_member_data_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<()> {
        let mut batch = Batch::new();
        batch.hdel(&self.core.keys().member_data(leaderboard), member);
        self.core.run(batch).await?;
        Ok(())
    }

    // ---- point lookups ----

    pub async fn total_members(&self) -> LeaderboardResult<u64> {
        self.total_members_in(&self.name).await
    }

    pub async fn total_members_in(&self, leaderboard: &str) -> LeaderboardResult<u64> {
        self.core.total_members(leaderboard).await
    }

    /// Members whose score lies in `[min_score, max_score]`
    pub async fn total_members_in_score_range(&self, min_score: f64, max_score: f64) -> LeaderboardResult<u64> {
        self.total_members_in_score_range_in(&self.name, min_score, max_score)
            .await
    }

    pub async fn total_members_in_score_range_in(
        &self,
        leaderboard: &str,
        min_score: f64,
        max_score: f64,
    ) -> LeaderboardResult<u64> {
        let mut batch = Batch::new();
        batch.zcount(
            leaderboard,
            ScoreBound::Inclusive(min_score),
            ScoreBound::Inclusive(max_score),
        );
        Ok(self.core.run(batch).await?.count()?)
    }

    pub async fn check_member(&self, member: &str) -> LeaderboardResult<bool> {
        self.check_member_in(&self.name, member).await
    }

    pub async fn check_member_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<bool> {
        Ok(self.core.score_for(leaderboard, member).await?.is_some())
    }

    pub async fn score_for(&self, member: &str) -> LeaderboardResult<Option<f64>> {
        self.score_for_in(&self.name, member).await
    }

    pub async fn score_for_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<f64>> {
        self.core.score_for(leaderboard, member).await
    }

    pub async fn rank_for(&self, member: &str) -> LeaderboardResult<Option<u64>> {
        self.rank_for_in(&self.name, member).await
    }

    pub async fn rank_for_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<u64>> {
        self.engine.rank_for_in(&self.core, leaderboard, member).await
    }

    pub async fn score_and_rank_for(&self, member: &str) -> LeaderboardResult<RankedEntry> {
        self.score_and_rank_for_in(&self.name, member).await
    }

    pub async fn score_and_rank_for_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<RankedEntry> {
        self.engine
            .score_and_rank_for_in(&self.core, leaderboard, member)
            .await
    }

    // ---- paging and percentiles ----

    pub async fn total_pages(&self, page_size: Option<usize>) -> LeaderboardResult<u64> {
        self.total_pages_in(&self.name, page_size).await
    }

    pub async fn total_pages_in(&self, leaderboard: &str, page_size: Option<usize>) -> LeaderboardResult<u64> {
        let page_size = self.resolve_page_size(page_size);
        let total = self.core.total_members(leaderboard).await?;
        Ok(paging::total_pages(total, page_size))
    }

    /// 1-based page holding `member`; 0 when the member is absent
    pub async fn page_for(&self, member: &str, page_size: Option<usize>) -> LeaderboardResult<u64> {
        self.page_for_in(&self.name, member, page_size).await
    }

    pub async fn page_for_in(
        &self,
        leaderboard: &str,
        member: &str,
        page_size: Option<usize>,
    ) -> LeaderboardResult<u64> {
        let page_size = self.resolve_page_size(page_size);
        let rank = self.core.store_rank(leaderboard, member).await?;
        Ok(paging::page_for_rank(rank, page_size))
    }

    /// Percentile of `member` where 100 is the best end, `None` when absent
    pub async fn percentile_for(&self, member: &str) -> LeaderboardResult<Option<u32>> {
        self.percentile_for_in(&self.name, member).await
    }

    pub async fn percentile_for_in(&self, leaderboard: &str, member: &str) -> LeaderboardResult<Option<u32>> {
        let mut batch = Batch::new();
        batch
            .zcard(leaderboard)
            .zrank(leaderboard, member, Order::Desc);
        let mut replies = self.core.run(batch).await?;
        let total = replies.count()?;

        Ok(replies
            .rank()?
            .map(|reverse_rank| paging::percentile(total, reverse_rank, self.order())))
    }

    /// Score at `percentile`, interpolated between neighbouring members
    pub async fn score_for_percentile(&self, percentile: f64) -> LeaderboardResult<Option<f64>> {
        self.score_for_percentile_in(&self.name, percentile).await
    }

    pub async fn score_for_percentile_in(&self, leaderboard: &str, percentile: f64) -> LeaderboardResult<Option<f64>> {
        let total = self.core.total_members(leaderboard).await?;
        let Some(index) = paging::percentile_index(percentile, total, self.order()) else {
            return Ok(None);
        };

        let mut batch = Batch::new();
        batch.zrange_withscores(
            leaderboard,
            index.floor() as isize,
            index.ceil() as isize,
            Order::Asc,
        );
        let scores = self.core.run(batch).await?.scored_members()?;

        let Some((_, lower)) = scores.first() else {
            return Ok(None);
        };
        let upper = scores.get(1).map_or(*lower, |(_, score)| *score);
        Ok(Some(paging::interpolate(index, *lower, upper)))
    }

    // ---- ranked queries ----

    /// One 1-based page of entries; pages below 1 read as page 1
    pub async fn leaders(&self, page: u64, options: &QueryOptions) -> LeaderboardResult<Vec<RankedEntry>> {
        self.leaders_in(&self.name, page, options).await
    }

    pub async fn leaders_in(
        &self,
        leaderboard: &str,
        page: u64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let page_size = options.page_size_or(self.page_size());
        let Some((start, stop)) = paging::page_window(page, page_size) else {
            return Ok(Vec::new());
        };
        let members = self.core.range(leaderboard, start, stop).await?;
        self.entries_for(leaderboard, members, options).await
    }

    pub async fn all_leaders(&self, options: &QueryOptions) -> LeaderboardResult<Vec<RankedEntry>> {
        self.all_leaders_from(&self.name, options).await
    }

    pub async fn all_leaders_from(
        &self,
        leaderboard: &str,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let members = self.core.range(leaderboard, 0, -1).await?;
        self.entries_for(leaderboard, members, options).await
    }

    /// Members whose score lies in `[min_score, max_score]`, best first
    pub async fn members_from_score_range(
        &self,
        min_score: f64,
        max_score: f64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        self.members_from_score_range_in(&self.name, min_score, max_score, options)
            .await
    }

    pub async fn members_from_score_range_in(
        &self,
        leaderboard: &str,
        min_score: f64,
        max_score: f64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let mut batch = Batch::new();
        batch.zrangebyscore(
            leaderboard,
            ScoreBound::Inclusive(min_score),
            ScoreBound::Inclusive(max_score),
            self.order(),
        );
        let members = self.core.run(batch).await?.members()?;
        self.entries_for(leaderboard, members, options).await
    }

    /// Members ranked `start_rank..=end_rank` (1-based)
    pub async fn members_from_rank_range(
        &self,
        start_rank: u64,
        end_rank: u64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        self.members_from_rank_range_in(&self.name, start_rank, end_rank, options)
            .await
    }

    pub async fn members_from_rank_range_in(
        &self,
        leaderboard: &str,
        start_rank: u64,
        end_rank: u64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let total = self.core.total_members(leaderboard).await?;
        let Some((start, stop)) = paging::rank_range_window(start_rank, end_rank, total) else {
            return Ok(Vec::new());
        };
        let members = self.core.range(leaderboard, start, stop).await?;
        self.entries_for(leaderboard, members, options).await
    }

    /// The best `count` members
    pub async fn top(&self, count: u64, options: &QueryOptions) -> LeaderboardResult<Vec<RankedEntry>> {
        self.top_in(&self.name, count, options).await
    }

    pub async fn top_in(
        &self,
        leaderboard: &str,
        count: u64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        self.members_from_rank_range_in(leaderboard, 1, count, options)
            .await
    }

    /// Entry at 1-based `position`, `None` outside `1..=total_members`
    pub async fn member_at(&self, position: u64, options: &QueryOptions) -> LeaderboardResult<Option<RankedEntry>> {
        self.member_at_in(&self.name, position, options).await
    }

    pub async fn member_at_in(
        &self,
        leaderboard: &str,
        position: u64,
        options: &QueryOptions,
    ) -> LeaderboardResult<Option<RankedEntry>> {
        let total = self.core.total_members(leaderboard).await?;
        if position == 0 || position > total {
            return Ok(None);
        }

        let page_size = options.page_size_or(self.page_size());
        let (page, offset) = paging::position_on_page(position, page_size);
        let mut leaders = self.leaders_in(leaderboard, page, options).await?;
        if offset < leaders.len() {
            Ok(Some(leaders.swap_remove(offset)))
        } else {
            Ok(None)
        }
    }

    /// A page of entries centred on `member`; empty when the member is absent
    pub async fn around_me(&self, member: &str, options: &QueryOptions) -> LeaderboardResult<Vec<RankedEntry>> {
        self.around_me_in(&self.name, member, options).await
    }

    pub async fn around_me_in(
        &self,
        leaderboard: &str,
        member: &str,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let Some(rank) = self.core.store_rank(leaderboard, member).await? else {
            return Ok(Vec::new());
        };

        let page_size = options.page_size_or(self.page_size());
        let Some((start, stop)) = paging::around_window(rank, page_size) else {
            return Ok(Vec::new());
        };
        let members = self.core.range(leaderboard, start, stop).await?;
        self.entries_for(leaderboard, members, options).await
    }

    /// Score and rank of each listed member, in input order unless sorted
    pub async fn ranked_in_list(&self, members: &[String], options: &QueryOptions) -> LeaderboardResult<Vec<RankedEntry>> {
        self.ranked_in_list_in(&self.name, members, options).await
    }

    pub async fn ranked_in_list_in(
        &self,
        leaderboard: &str,
        members: &[String],
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        if members.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = self
            .engine
            .ranked_in_list_in(&self.core, leaderboard, members, options)
            .await?;

        if options.with_member_data {
            let names = paging::unique_members(&entries);
            let data = self.core.members_data(leaderboard, &names).await?;
            paging::attach_member_data(&mut entries, &names, data);
        }
        if let Some(sort_by) = options.sort_by {
            paging::sort_entries(&mut entries, sort_by);
        }
        Ok(entries)
    }

    // ---- combining ----

    /// Union this leaderboard with `sources` into `destination`
    pub async fn merge_leaderboards(
        &self,
        destination: &str,
        sources: &[String],
        aggregate: Aggregate,
    ) -> LeaderboardResult<u64> {
        let mut batch = Batch::new();
        batch.zunionstore(destination, self.combined_keys(sources), aggregate);
        let stored = self.core.run(batch).await?.count()?;
        self.engine.after_combine(&self.core, destination).await?;
        info!(destination = %destination, sources = sources.len(), stored, "Leaderboards merged");
        Ok(stored)
    }

    /// Intersect this leaderboard with `sources` into `destination`
    pub async fn intersect_leaderboards(
        &self,
        destination: &str,
        sources: &[String],
        aggregate: Aggregate,
    ) -> LeaderboardResult<u64> {
        let mut batch = Batch::new();
        batch.zinterstore(destination, self.combined_keys(sources), aggregate);
        let stored = self.core.run(batch).await?.count()?;
        self.engine.after_combine(&self.core, destination).await?;
        info!(destination = %destination, sources = sources.len(), stored, "Leaderboards intersected");
        Ok(stored)
    }

    fn combined_keys(&self, sources: &[String]) -> Vec<String> {
        std::iter::once(self.name.clone())
            .chain(sources.iter().cloned())
            .collect()
    }

    fn resolve_page_size(&self, page_size: Option<usize>) -> usize {
        crate::config::normalize_page_size(page_size.unwrap_or(self.page_size()))
    }

    /// Turn raw range results into entries honouring `members_only`
    async fn entries_for(
        &self,
        leaderboard: &str,
        members: Vec<String>,
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        if options.members_only {
            return Ok(members.into_iter().map(RankedEntry::member_only).collect());
        }
        self.ranked_in_list_in(leaderboard, &members, options).await
    }
}
