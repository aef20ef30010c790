//! Standard competition ranking: tied members share a rank and the next
//! distinct score skips ahead by the size of the tie group (1,1,3,3,5).
//!
//! A member's rank is one more than the number of members holding a strictly
//! better score.

use super::{LeaderboardCore, RankEngine};
use crate::config::{Order, QueryOptions};
use crate::error::LeaderboardResult;
use crate::keys::{distinct_scores, tie_member};
use crate::models::RankedEntry;
use crate::store::{Batch, ScoreBound};
use async_trait::async_trait;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, Default)]
pub struct CompetitionRanking;

/// Score interval strictly better than `score`
fn better_than(score: f64, order: Order) -> (ScoreBound, ScoreBound) {
    match order {
        Order::Desc => (ScoreBound::Exclusive(score), ScoreBound::PosInfinity),
        Order::Asc => (ScoreBound::NegInfinity, ScoreBound::Exclusive(score)),
    }
}

async fn competition_rank(
    core: &LeaderboardCore,
    leaderboard: &str,
    score: f64,
) -> LeaderboardResult<u64> {
    let (min, max) = better_than(score, core.order());
    let mut batch = Batch::new();
    batch.zcount(leaderboard, min, max);
    Ok(core.run(batch).await?.count()? + 1)
}

#[async_trait]
impl RankEngine for CompetitionRanking {
    async fn rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<Option<u64>> {
        match core.score_for(leaderboard, member).await? {
            Some(score) => Ok(Some(competition_rank(core, leaderboard, score).await?)),
            None => Ok(None),
        }
    }

    async fn score_and_rank_for_in(
        &self,
        core: &LeaderboardCore,
        leaderboard: &str,
        member: &str,
    ) -> LeaderboardResult<RankedEntry> {
        let score = core.score_for(leaderboard, member).await?;
        let rank = match score {
            Some(score) => Some(competition_rank(core, leaderboard, score).await?),
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

        // One count per distinct score, shared by every member holding it
        let distinct = distinct_scores(scores.iter().flatten().copied());
        let mut batch = Batch::new();
        for score in &distinct {
            let (min, max) = better_than(*score, core.order());
            batch.zcount(leaderboard, min, max);
        }
        let mut replies = core.run(batch).await?;
        let mut ranks = HashMap::with_capacity(distinct.len());
        for score in &distinct {
            ranks.insert(tie_member(*score), replies.count()? + 1);
        }

        let entries = members
            .iter()
            .zip(scores)
            .filter(|(_, score)| score.is_some() || options.include_missing)
            .map(|(member, score)| {
                let rank = score.and_then(|s| ranks.get(&tie_member(s)).copied());
                RankedEntry::new(member.as_str(), score, rank)
            })
            .collect();
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_better_than_follows_order() {
        assert_eq!(
            better_than(30.0, Order::Desc),
            (ScoreBound::Exclusive(30.0), ScoreBound::PosInfinity)
        );
        assert_eq!(
            better_than(30.0, Order::Asc),
            (ScoreBound::NegInfinity, ScoreBound::Exclusive(30.0))
        );
    }
}
