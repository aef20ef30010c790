//! Dense ranking: every member gets a distinct rank, ties broken by the store.
//!
//! The free functions here are also the defaults of [`RankEngine`].

use super::{LeaderboardCore, RankEngine};
use crate::config::QueryOptions;
use crate::error::LeaderboardResult;
use crate::models::RankedEntry;
use crate::paging;
use crate::store::{Batch, ScoreBound};

#[derive(Debug, Clone, Copy, Default)]
pub struct DenseRanking;

impl RankEngine for DenseRanking {}

pub(crate) async fn rank_member_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
    score: f64,
    member_data: Option<&str>,
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    batch.zadd(leaderboard, member, score);
    if let Some(data) = member_data {
        batch.hset(&core.keys().member_data(leaderboard), member, data);
    }
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn rank_members_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    members: &[(String, f64)],
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    batch.zadd_multiple(leaderboard, members.to_vec());
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn rank_member_across(
    core: &LeaderboardCore,
    leaderboards: &[String],
    member: &str,
    score: f64,
    member_data: Option<&str>,
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    for leaderboard in leaderboards {
        batch.zadd(leaderboard, member, score);
        if let Some(data) = member_data {
            batch.hset(&core.keys().member_data(leaderboard), member, data);
        }
    }
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn remove_member_from(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    batch
        .zrem(leaderboard, member)
        .hdel(&core.keys().member_data(leaderboard), member);
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn change_score_for_member_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
    delta: f64,
    member_data: Option<&str>,
) -> LeaderboardResult<f64> {
    let mut batch = Batch::new();
    batch.zincr(leaderboard, member, delta);
    if let Some(data) = member_data {
        batch.hset(&core.keys().member_data(leaderboard), member, data);
    }
    let mut replies = core.run(batch).await?;
    Ok(replies.score()?.unwrap_or(delta))
}

pub(crate) async fn remove_members_in_score_range_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    min_score: f64,
    max_score: f64,
) -> LeaderboardResult<u64> {
    let mut batch = Batch::new();
    batch.zrembyscore(
        leaderboard,
        ScoreBound::Inclusive(min_score),
        ScoreBound::Inclusive(max_score),
    );
    Ok(core.run(batch).await?.count()?)
}

pub(crate) async fn remove_members_outside_rank_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    rank: u64,
) -> LeaderboardResult<u64> {
    let total = core.total_members(leaderboard).await?;
    let Some((start, stop)) = paging::outside_rank_window(rank, total, core.order()) else {
        return Ok(0);
    };
    let mut batch = Batch::new();
    batch.zremrangebyrank(leaderboard, start, stop);
    Ok(core.run(batch).await?.count()?)
}

/// Delete the member set, its member data and any `extra_keys`.
///
/// A shared member-data hash is never dropped; only this leaderboard's
/// members are removed from it.
pub(crate) async fn delete_leaderboard_named(
    core: &LeaderboardCore,
    leaderboard: &str,
    extra_keys: &[String],
) -> LeaderboardResult<()> {
    let data_key = core.keys().member_data(leaderboard);
    let mut keys = vec![leaderboard.to_string()];
    keys.extend_from_slice(extra_keys);

    let mut batch = Batch::new();
    if core.config().global_member_data {
        let members = core.range(leaderboard, 0, -1).await?;
        if !members.is_empty() {
            batch.hdel_multiple(&data_key, members);
        }
    } else {
        keys.push(data_key);
    }
    batch.del(keys);
    core.run(batch).await?;
    Ok(())
}

/// Keys whose lifetime follows the member set
fn expiring_keys(core: &LeaderboardCore, leaderboard: &str, extra_keys: &[String]) -> Vec<String> {
    let mut keys = vec![leaderboard.to_string()];
    keys.extend_from_slice(extra_keys);
    if !core.config().global_member_data {
        keys.push(core.keys().member_data(leaderboard));
    }
    keys
}

pub(crate) async fn expire_leaderboard_for(
    core: &LeaderboardCore,
    leaderboard: &str,
    seconds: i64,
    extra_keys: &[String],
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    for key in expiring_keys(core, leaderboard, extra_keys) {
        batch.expire(&key, seconds);
    }
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn expire_leaderboard_at_for(
    core: &LeaderboardCore,
    leaderboard: &str,
    timestamp: i64,
    extra_keys: &[String],
) -> LeaderboardResult<()> {
    let mut batch = Batch::new();
    for key in expiring_keys(core, leaderboard, extra_keys) {
        batch.expire_at(&key, timestamp);
    }
    core.run(batch).await?;
    Ok(())
}

pub(crate) async fn rank_for_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
) -> LeaderboardResult<Option<u64>> {
    Ok(core
        .store_rank(leaderboard, member)
        .await?
        .map(|rank| rank + 1))
}

pub(crate) async fn score_and_rank_for_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    member: &str,
) -> LeaderboardResult<RankedEntry> {
    let mut batch = Batch::new();
    batch
        .zscore(leaderboard, member)
        .zrank(leaderboard, member, core.order());
    let mut replies = core.run(batch).await?;
    let score = replies.score()?;
    let rank = replies.rank()?.map(|rank| rank + 1);
    Ok(RankedEntry::new(member, score, rank))
}

pub(crate) async fn ranked_in_list_in(
    core: &LeaderboardCore,
    leaderboard: &str,
    members: &[String],
    options: &QueryOptions,
) -> LeaderboardResult<Vec<RankedEntry>> {
    let order = core.order();
    let mut batch = Batch::new();
    for member in members {
        batch
            .zrank(leaderboard, member, order)
            .zscore(leaderboard, member);
    }
    let mut replies = core.run(batch).await?;

    let mut entries = Vec::with_capacity(members.len());
    for member in members {
        let rank = replies.rank()?.map(|rank| rank + 1);
        let score = replies.score()?;
        if rank.is_none() && !options.include_missing {
            continue;
        }
        entries.push(RankedEntry::new(member.as_str(), score, rank));
    }
    Ok(entries)
}
