//! Page, window and percentile arithmetic shared by every ranking engine.
//!
//! Nothing here touches the store. Ranks passed in are 0-based store ranks
//! unless stated otherwise; windows returned are inclusive `(start, stop)`
//! index pairs ready for a range query.

use crate::config::{Order, SortBy};
use crate::models::RankedEntry;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Number of pages needed to hold `total_members`
pub fn total_pages(total_members: u64, page_size: usize) -> u64 {
    total_members.div_ceil(page_size as u64)
}

/// 1-based page holding the member at 0-based `rank`, or 0 when absent
pub fn page_for_rank(rank: Option<u64>, page_size: usize) -> u64 {
    match rank {
        Some(rank) => rank / page_size as u64 + 1,
        None => 0,
    }
}

/// Index window of a 1-based page. Pages below 1 read as page 1.
///
/// Returns `None` when the page starts past any addressable index.
pub fn page_window(page: u64, page_size: usize) -> Option<(isize, isize)> {
    let start = (page.max(1) - 1).checked_mul(page_size as u64)?;
    window_from(start, page_size)
}

/// Index window of `page_size` entries centred on the 0-based `rank`
pub fn around_window(rank: u64, page_size: usize) -> Option<(isize, isize)> {
    window_from(rank.saturating_sub(page_size as u64 / 2), page_size)
}

fn window_from(start: u64, page_size: usize) -> Option<(isize, isize)> {
    let start = isize::try_from(start).ok()?;
    let span = isize::try_from(page_size.max(1)).unwrap_or(isize::MAX);
    Some((start, start.saturating_add(span - 1)))
}

/// Index window for the 1-based inclusive rank range `[start_rank, end_rank]`.
///
/// Returns `None` when the range selects nothing.
pub fn rank_range_window(start_rank: u64, end_rank: u64, total_members: u64) -> Option<(isize, isize)> {
    if total_members == 0 || end_rank == 0 {
        return None;
    }
    let start = start_rank.saturating_sub(1);
    let stop = (end_rank - 1).min(total_members - 1);
    if start > stop {
        None
    } else {
        Some((isize::try_from(start).ok()?, isize::try_from(stop).ok()?))
    }
}

/// Ascending index window of the members ranked below the top `keep`.
///
/// Returns `None` when `keep` covers every member, leaving nothing to remove.
pub fn outside_rank_window(keep: u64, total_members: u64, order: Order) -> Option<(isize, isize)> {
    if keep >= total_members {
        return None;
    }
    let keep = isize::try_from(keep).ok()?;
    match order {
        Order::Desc => Some((0, -keep - 1)),
        Order::Asc => Some((keep, -1)),
    }
}

/// Page and in-page offset of a 1-based absolute position
pub fn position_on_page(position: u64, page_size: usize) -> (u64, usize) {
    let page_size = page_size as u64;
    let page = position.div_ceil(page_size);
    let offset = (position.saturating_sub(1) % page_size) as usize;
    (page, offset)
}

/// Percentile of a member from its 0-based descending rank.
///
/// 100 is always the best end of the leaderboard, whatever its order.
pub fn percentile(total_members: u64, reverse_rank: u64, order: Order) -> u32 {
    let total = total_members as f64;
    let below = total_members.saturating_sub(reverse_rank + 1) as f64;
    let percentile = (below / total * 100.0).ceil() as u32;
    match order {
        Order::Desc => percentile,
        Order::Asc => 100 - percentile,
    }
}

/// Fractional ascending index of the score at `percentile`.
///
/// `None` for percentiles outside `[0, 100]` or an empty leaderboard.
pub fn percentile_index(percentile: f64, total_members: u64, order: Order) -> Option<f64> {
    if !(0.0..=100.0).contains(&percentile) || total_members == 0 {
        return None;
    }
    let percentile = match order {
        Order::Desc => percentile,
        Order::Asc => 100.0 - percentile,
    };
    Some((total_members - 1) as f64 * (percentile / 100.0))
}

/// Score at a fractional index given the scores at its floor and ceiling
pub fn interpolate(index: f64, lower: f64, upper: f64) -> f64 {
    let fraction = index - index.floor();
    if fraction == 0.0 {
        lower
    } else {
        lower + fraction * (upper - lower)
    }
}

/// Stable ascending sort by rank or score; unranked entries go last.
pub fn sort_entries(entries: &mut [RankedEntry], sort_by: SortBy) {
    match sort_by {
        SortBy::Rank => entries.sort_by(|a, b| cmp_missing_last(a.rank, b.rank, |x, y| x.cmp(y))),
        SortBy::Score => entries.sort_by(|a, b| cmp_missing_last(a.score, b.score, f64::total_cmp)),
    }
}

fn cmp_missing_last<T: Copy>(a: Option<T>, b: Option<T>, cmp: impl Fn(&T, &T) -> Ordering) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => cmp(&a, &b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Decorate entries with member data fetched for `members`, matched by name
pub fn attach_member_data(entries: &mut [RankedEntry], members: &[String], data: Vec<Option<String>>) {
    let by_member: HashMap<&str, Option<String>> = members
        .iter()
        .map(String::as_str)
        .zip(data)
        .collect();
    for entry in entries.iter_mut() {
        entry.member_data = by_member.get(entry.member.as_str()).cloned().flatten();
    }
}

/// Distinct member names in first-seen order
pub fn unique_members(entries: &[RankedEntry]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    entries
        .iter()
        .filter(|entry| seen.insert(entry.member.as_str()))
        .map(|entry| entry.member.clone())
        .collect()
}
