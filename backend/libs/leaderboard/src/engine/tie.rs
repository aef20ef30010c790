//! Tie-grouped ranking: tied members share a rank and the next distinct score
//! takes the following rank (1,1,2,2,3).
//!
//! Alongside the member set every leaderboard keeps a distinct-score index
//! under its ties key, holding one entry per score currently held by at least
//! one member. A member's rank is its score's rank in that index. Writes read
//! the member's previous score first and drop it from the index once no member
//! holds it anymore.

use super::{dense, Leaderboard, LeaderboardCore, RankEngine};
use crate::config::{Order, QueryOptions};
use crate::error::LeaderboardResult;
use crate::keys::{distinct_scores, tie_member};
use crate::models::{RankedEntry, TieConsistencyReport};
use crate::paging;
use crate::store::{Batch, ScoreBound};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, Default)]
pub struct TieRanking;

/// Whether `previous` loses its last holder once the member moves to `next`
async fn becomes_orphan(
    core: &LeaderboardCore,
    leaderboard: &str,
    previous: Option<f64>,
    next: Option<f64>,
) -> LeaderboardResult<Option<f64>> {
    let Some(previous) = previous else {
        return Ok(None);
    };
    if next == Some(previous) {
        return Ok(None);
    }
    if core.members_at_score(leaderboard, previous).await? == 1 {
        Ok(Some(previous))
    } else {
        Ok(None)
    }
}

/// Write `score` for `member`, keeping the distinct-score index in step
async fn write_score(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
    score: f64,
    member_data: Option<&str>,
) -> LeaderboardResult<()> {
    let ties_key = core.keys().ties(leaderboard);
    let previous = core.score_for(leaderboard, member).await?;
    let orphan = becomes_orphan(core, leaderboard, previous, Some(score)).await?;

    let mut batch = Batch::new();
    batch
        .zadd(leaderboard, member, score)
        .zadd(&ties_key, &tie_member(score), score);
    if let Some(orphan) = orphan {
        batch.zrem(&ties_key, &tie_member(orphan));
    }
    if let Some(data) = member_data {
        batch.hset(&core.keys().member_data(leaderboard), member, data);
    }
    core.run(batch).await?;

    if let Some(orphan) = orphan {
        debug!(leaderboard = %leaderboard, score = orphan, "Dropped orphaned tie score");
    }
    Ok(())
}

/// Distinct scores of the leaderboard with no member behind them anymore
async fn orphaned_among(
    core: &LeaderboardCore,
    leaderboard: &str,
    scores: &[f64],
) -> LeaderboardResult<Vec<f64>> {
    let mut batch = Batch::new();
    for score in scores {
        batch.zcount(
            leaderboard,
            ScoreBound::Inclusive(*score),
            ScoreBound::Inclusive(*score),
        );
    }
    let mut replies = core.run(batch).await?;

    let mut orphaned = Vec::new();
    for score in scores {
        if replies.count()? == 0 {
            orphaned.push(*score);
        }
    }
    Ok(orphaned)
}

#[async_trait]
impl RankEngine for TieRanking {
    async fn rank_member_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        write_score(core, leaderboard, member, score, member_data).await
    }

    async fn rank_members_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        members: &[(String, f64)],
    ) -> LeaderboardResult<()> {
        for (member, score) in members {
            write_score(core, leaderboard, member, *score, None).await?;
        }
        Ok(())
    }

    /// Best-effort: each leaderboard is written in its own round trips
    async fn rank_member_across(
        &self,
        core: &LeaderboardCore,
        leaderboards: &[String],
        member: &str,
        score: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<()> {
        for leaderboard in leaderboards {
            write_score(core, leaderboard, member, score, member_data).await?;
        }
        Ok(())
    }

    async fn remove_member_from(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<()> {
        let previous = core.score_for(leaderboard, member).await?;
        let orphan = becomes_orphan(core, leaderboard, previous, None).await?;

        let mut batch = Batch::new();
        batch.zrem(leaderboard, member);
        if let Some(orphan) = orphan {
            batch.zrem(&core.keys().ties(leaderboard), &tie_member(orphan));
        }
        batch.hdel(&core.keys().member_data(leaderboard), member);
        core.run(batch).await?;
        Ok(())
    }

    async fn change_score_for_member_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
        delta: f64,
        member_data: Option<&str>,
    ) -> LeaderboardResult<f64> {
        let previous = core.score_for(leaderboard, member).await?;
        let score = previous.unwrap_or(0.0) + delta;
        write_score(core, leaderboard, member, score, member_data).await?;
        Ok(score)
    }

    async fn remove_members_in_score_range_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        min_score: f64,
        max_score: f64,
    ) -> LeaderboardResult<u64> {
        let min = ScoreBound::Inclusive(min_score);
        let max = ScoreBound::Inclusive(max_score);
        let mut batch = Batch::new();
        batch
            .zrembyscore(leaderboard, min, max)
            .zrembyscore(&core.keys().ties(leaderboard), min, max);
        let mut replies = core.run(batch).await?;
        let removed = replies.count()?;
        replies.skip()?;
        Ok(removed)
    }

    async fn remove_members_outside_rank_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        rank: u64,
    ) -> LeaderboardResult<u64> {
        let total = core.total_members(leaderboard).await?;
        let Some((start, stop)) = paging::outside_rank_window(rank, total, core.order()) else {
            return Ok(0);
        };
        let mut batch = Batch::new();
        batch
            .zrange_withscores(leaderboard, start, stop, Order::Asc)
            .zremrangebyrank(leaderboard, start, stop);
        let mut replies = core.run(batch).await?;
        let removed_members = replies.scored_members()?;
        let removed = replies.count()?;

        let candidates = distinct_scores(removed_members.into_iter().map(|(_, score)| score));
        let orphaned = orphaned_among(core, leaderboard, &candidates).await?;
        if !orphaned.is_empty() {
            let mut batch = Batch::new();
            batch.zrem_multiple(
                &core.keys().ties(leaderboard),
                orphaned.iter().map(|score| tie_member(*score)).collect(),
            );
            core.run(batch).await?;
        }
        Ok(removed)
    }

    async fn delete_leaderboard_named(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
    ) -> LeaderboardResult<()> {
        dense::delete_leaderboard_named(core, leaderboard, &[core.keys().ties(leaderboard)]).await
    }

    async fn expire_leaderboard_for(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        seconds: i64,
    ) -> LeaderboardResult<()> {
        dense::expire_leaderboard_for(core, leaderboard, seconds, &[core.keys().ties(leaderboard)])
            .await
    }

    async fn expire_leaderboard_at_for(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        timestamp: i64,
    ) -> LeaderboardResult<()> {
        dense::expire_leaderboard_at_for(
            core,
            leaderboard,
            timestamp,
            &[core.keys().ties(leaderboard)],
        )
        .await
    }

    async fn rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<Option<u64>> {
        let Some(score) = core.score_for(leaderboard, member).await? else {
            return Ok(None);
        };
        Ok(core
            .store_rank(&core.keys().ties(leaderboard), &tie_member(score))
            .await?
            .map(|rank| rank + 1))
    }

    async fn score_and_rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<RankedEntry> {
        let score = core.score_for(leaderboard, member).await?;
        let rank = match score {
            Some(score) => core
                .store_rank(&core.keys().ties(leaderboard), &tie_member(score))
                .await?
                .map(|rank| rank + 1),
            None => None,
        };
        Ok(RankedEntry::new(member, score, rank))
    }

    async fn ranked_in_list_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        members: &[String],
        options: &QueryOptions,
    ) -> LeaderboardResult<Vec<RankedEntry>> {
        let mut batch = Batch::new();
        for member in members {
            batch.zscore(leaderboard, member);
        }
        let mut replies = core.run(batch).await?;
        let mut scores = Vec::with_capacity(members.len());
        for _ in members {
            scores.push(replies.score()?);
        }

        let distinct = distinct_scores(scores.iter().flatten().copied());
        let ties_key = core.keys().ties(leaderboard);
        let mut batch = Batch::new();
        for score in &distinct {
            batch.zrank(&ties_key, &tie_member(*score), core.order());
        }
        let mut replies = core.run(batch).await?;
        let mut ranks = HashMap::with_capacity(distinct.len());
        for score in &distinct {
            if let Some(rank) = replies.rank()? {
                ranks.insert(tie_member(*score), rank + 1);
            }
        }

        let entries = members
            .iter()
            .zip(scores)
            .map(|(member, score)| {
                let rank = score.and_then(|s| ranks.get(&tie_member(s)).copied());
                RankedEntry::new(member.as_str(), score, rank)
            })
            .filter(|entry| entry.is_ranked() || options.include_missing)
            .collect();
        Ok(entries)
    }

    /// Rebuild the destination's distinct-score index from its member set
    async fn after_combine(&self, core: &LeaderboardCore, destination: &str) -> LeaderboardResult<()> {
        let mut batch = Batch::new();
        batch.zrange_withscores(destination, 0, -1, Order::Asc);
        let members = core.run(batch).await?.scored_members()?;

        let ties_key = core.keys().ties(destination);
        let ties: Vec<(String, f64)> = distinct_scores(members.into_iter().map(|(_, score)| score))
            .into_iter()
            .map(|score| (tie_member(score), score))
            .collect();

        let mut batch = Batch::new();
        batch.del(vec![ties_key.clone()]);
        if !ties.is_empty() {
            batch.zadd_multiple(&ties_key, ties);
        }
        core.run(batch).await?;
        Ok(())
    }
}

impl Leaderboard<TieRanking> {
    /// Compare the distinct-score index against the member set
    pub async fn check_tie_consistency(&self) -> LeaderboardResult<TieConsistencyReport> {
        self.check_tie_consistency_in(self.name()).await
    }

    pub async fn check_tie_consistency_in(&self, leaderboard: &str) -> LeaderboardResult<TieConsistencyReport> {
        let core = self.core();
        let mut batch = Batch::new();
        batch
            .zrange_withscores(leaderboard, 0, -1, Order::Asc)
            .zrange_withscores(&core.keys().ties(leaderboard), 0, -1, Order::Asc);
        let mut replies = core.run(batch).await?;

        let held: BTreeSet<String> = replies
            .scored_members()?
            .into_iter()
            .map(|(_, score)| tie_member(score))
            .collect();
        let indexed = replies.scored_members()?;
        let indexed_names: BTreeSet<String> = indexed.iter().map(|(name, _)| name.clone()).collect();

        let orphaned = distinct_scores(
            indexed
                .iter()
                .filter(|(name, _)| !held.contains(name))
                .map(|(_, score)| *score),
        );
        let missing = held
            .iter()
            .filter(|name| !indexed_names.contains(*name))
            .filter_map(|name| name.parse::<f64>().ok())
            .collect();

        let report = TieConsistencyReport { orphaned, missing };
        if !report.is_consistent() {
            warn!(
                leaderboard = %leaderboard,
                orphaned = report.orphaned.len(),
                missing = report.missing.len(),
                "Tie index out of step with member set"
            );
        }
        Ok(report)
    }
}
