//! Integration tests for dense-ranked leaderboards over the in-memory store

mod common;

use common::{config, member_data, memory_store, names, rank_members, rank_tied_members};
use leaderboard::store::Batch;
use leaderboard::{
    Aggregate, Leaderboard, LeaderboardConfig, Order, QueryOptions, ScoreStore, SharedStore, SortBy,
    DEFAULT_PAGE_SIZE,
};

async fn exists(store: &SharedStore, key: &str) -> bool {
    let mut batch = Batch::new();
    batch.exists(key);
    store.execute(batch).await.unwrap().integer().unwrap() == 1
}

async fn ttl(store: &SharedStore, key: &str) -> i64 {
    let mut batch = Batch::new();
    batch.ttl(key);
    store.execute(batch).await.unwrap().integer().unwrap()
}

async fn hash_len(store: &SharedStore, key: &str) -> u64 {
    let mut batch = Batch::new();
    batch.hlen(key);
    store.execute(batch).await.unwrap().count().unwrap()
}

fn leaderboard(store: &SharedStore) -> Leaderboard {
    Leaderboard::new("name", store.clone(), config())
}

// =============================================================================
// Construction & configuration
// =============================================================================

#[tokio::test]
async fn test_zero_page_size_falls_back_to_default() {
    let store = memory_store();
    let lb = Leaderboard::new("name", store, LeaderboardConfig::default().with_page_size(0));
    assert_eq!(lb.page_size(), DEFAULT_PAGE_SIZE);
    assert_eq!(lb.name(), "name");
    assert_eq!(lb.order(), Order::Desc);
}

// =============================================================================
// Writes & member data
// =============================================================================

#[tokio::test]
async fn test_delete_leaderboard_removes_member_set_and_data() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    assert!(exists(&store, "name").await);
    assert!(exists(&store, "name:member_data").await);

    lb.delete_leaderboard().await.unwrap();

    assert!(!exists(&store, "name").await);
    assert!(!exists(&store, "name:member_data").await);
    assert_eq!(lb.total_members().await.unwrap(), 0);
}

#[tokio::test]
async fn test_member_data_lifecycle() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    assert_eq!(
        lb.member_data_for("member_1").await.unwrap(),
        Some(member_data(1))
    );

    lb.update_member_data("member_1", "updated").await.unwrap();
    assert_eq!(
        lb.member_data_for("member_1").await.unwrap().as_deref(),
        Some("updated")
    );

    let data = lb
        .members_data_for(&names(&["member_2", "ghost", "member_1"]))
        .await
        .unwrap();
    assert_eq!(
        data,
        vec![Some(member_data(2)), None, Some("updated".to_string())]
    );

    lb.remove_member_data("member_1").await.unwrap();
    assert_eq!(lb.member_data_for("member_1").await.unwrap(), None);
    assert!(lb.check_member("member_1").await.unwrap());
}

#[tokio::test]
async fn test_remove_member_also_removes_member_data() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;
    assert_eq!(hash_len(&store, "name:member_data").await, 5);

    lb.remove_member("member_1").await.unwrap();
    assert_eq!(lb.total_members().await.unwrap(), 4);
    assert_eq!(hash_len(&store, "name:member_data").await, 4);

    // Removing again is a no-op
    lb.remove_member("member_1").await.unwrap();
    assert_eq!(lb.total_members().await.unwrap(), 4);
}

#[tokio::test]
async fn test_rank_members_in_one_batch() {
    let store = memory_store();
    let lb = leaderboard(&store);
    assert_eq!(lb.total_members().await.unwrap(), 0);

    lb.rank_members(&[("member_1".to_string(), 1000.0), ("member_2".to_string(), 3000.0)])
        .await
        .unwrap();
    assert_eq!(lb.total_members().await.unwrap(), 2);
    assert_eq!(lb.rank_for("member_2").await.unwrap(), Some(1));
}

#[tokio::test]
async fn test_rank_member_if_only_keeps_highscores() {
    let store = memory_store();
    let lb = leaderboard(&store);

    fn highscore_check(
        _lb: &Leaderboard,
        _member: &str,
        current: Option<f64>,
        score: f64,
        _data: Option<&str>,
        _order: Order,
    ) -> bool {
        current.map_or(true, |current| score > current)
    }

    assert!(lb.rank_member_if(highscore_check, "david", 1337.0, None).await.unwrap());
    assert_eq!(lb.total_members().await.unwrap(), 1);
    assert_eq!(lb.score_for("david").await.unwrap(), Some(1337.0));

    assert!(!lb.rank_member_if(highscore_check, "david", 1336.0, None).await.unwrap());
    assert_eq!(lb.score_for("david").await.unwrap(), Some(1337.0));

    assert!(lb.rank_member_if(highscore_check, "david", 1338.0, None).await.unwrap());
    assert_eq!(lb.score_for("david").await.unwrap(), Some(1338.0));
}

#[tokio::test]
async fn test_rank_member_across_writes_every_leaderboard() {
    let store = memory_store();
    let lb = leaderboard(&store);

    lb.rank_member_across(&names(&["highscores", "more_highscores"]), "david", 50000.0, Some("david"))
        .await
        .unwrap();

    let options = QueryOptions::default();
    assert_eq!(lb.leaders_in("highscores", 1, &options).await.unwrap().len(), 1);
    assert_eq!(lb.leaders_in("more_highscores", 1, &options).await.unwrap().len(), 1);
    assert_eq!(
        lb.member_data_for_in("more_highscores", "david").await.unwrap().as_deref(),
        Some("david")
    );
}

#[tokio::test]
async fn test_change_score_for() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    let score = lb.change_score_for("member_1", 99.0, None).await.unwrap();
    assert_eq!(score, 100.0);
    assert_eq!(lb.rank_for("member_1").await.unwrap(), Some(1));
    assert_eq!(lb.score_for("member_1").await.unwrap(), Some(100.0));

    lb.change_score_for("member_1", -100.0, None).await.unwrap();
    assert_eq!(lb.score_for("member_1").await.unwrap(), Some(0.0));
    assert_eq!(lb.rank_for("member_1").await.unwrap(), Some(5));

    let score = lb.change_score_for("newcomer", 7.5, Some("fresh")).await.unwrap();
    assert_eq!(score, 7.5);
    assert_eq!(lb.member_data_for("newcomer").await.unwrap().as_deref(), Some("fresh"));
}

#[tokio::test]
async fn test_remove_members_in_score_range() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    assert_eq!(lb.remove_members_in_score_range(2.0, 4.0).await.unwrap(), 3);
    assert_eq!(lb.total_members().await.unwrap(), 2);
}

#[tokio::test]
async fn test_remove_members_outside_rank() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    assert_eq!(lb.remove_members_outside_rank(10).await.unwrap(), 0);
    assert_eq!(lb.remove_members_outside_rank(3).await.unwrap(), 2);

    let leaders = lb.all_leaders(&QueryOptions::default()).await.unwrap();
    let members: Vec<&str> = leaders.iter().map(|e| e.member.as_str()).collect();
    assert_eq!(members, vec!["member_5", "member_4", "member_3"]);
}

#[tokio::test]
async fn test_remove_members_outside_rank_ascending() {
    let store = memory_store();
    let lb = Leaderboard::new("name", store, config().with_order(Order::Asc));
    rank_members(&lb, 5).await;

    assert_eq!(lb.remove_members_outside_rank(3).await.unwrap(), 2);
    let leaders = lb.all_leaders(&QueryOptions::default()).await.unwrap();
    let members: Vec<&str> = leaders.iter().map(|e| e.member.as_str()).collect();
    assert_eq!(members, vec!["member_1", "member_2", "member_3"]);
}

#[tokio::test]
async fn test_remove_members_outside_rank_keeping_more_than_held() {
    for order in [Order::Desc, Order::Asc] {
        let store = memory_store();
        let lb = Leaderboard::new("name", store, config().with_order(order));
        rank_members(&lb, 5).await;

        assert_eq!(lb.remove_members_outside_rank(5).await.unwrap(), 0);
        assert_eq!(lb.remove_members_outside_rank(u64::MAX).await.unwrap(), 0);
        assert_eq!(lb.remove_members_outside_rank(1 << 63).await.unwrap(), 0);
        assert_eq!(lb.total_members().await.unwrap(), 5);
    }
}

// =============================================================================
// Point lookups
// =============================================================================

#[tokio::test]
async fn test_point_lookups() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    assert_eq!(lb.total_members().await.unwrap(), 5);
    assert_eq!(lb.total_members_in_score_range(2.0, 4.0).await.unwrap(), 3);
    assert_eq!(lb.score_for("member_5").await.unwrap(), Some(5.0));
    assert_eq!(lb.score_for("jones").await.unwrap(), None);
    assert!(lb.check_member("member_3").await.unwrap());
    assert!(!lb.check_member("member_6").await.unwrap());
    assert_eq!(lb.rank_for("member_5").await.unwrap(), Some(1));
    assert_eq!(lb.rank_for("jones").await.unwrap(), None);
}

#[tokio::test]
async fn test_score_and_rank_for() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    let entry = lb.score_and_rank_for("member_3").await.unwrap();
    assert_eq!(entry.member, "member_3");
    assert_eq!(entry.score, Some(3.0));
    assert_eq!(entry.rank, Some(3));

    let entry = lb.score_and_rank_for("jones").await.unwrap();
    assert_eq!(entry.member, "jones");
    assert_eq!(entry.score, None);
    assert_eq!(entry.rank, None);
}

#[tokio::test]
async fn test_ranks_stay_within_bounds() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_tied_members(&lb).await;

    let total = lb.total_members().await.unwrap();
    for member in ["A", "B", "C", "D", "E"] {
        let rank = lb.rank_for(member).await.unwrap().unwrap();
        assert!((1..=total).contains(&rank));
        assert!(lb.score_for(member).await.unwrap().is_some());
    }
}

#[tokio::test]
async fn test_dense_ranks_for_tied_scores_are_distinct() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_tied_members(&lb).await;

    let mut ranks = Vec::new();
    for member in ["A", "B", "C", "D", "E"] {
        ranks.push(lb.rank_for(member).await.unwrap().unwrap());
    }
    ranks.sort_unstable();
    assert_eq!(ranks, vec![1, 2, 3, 4, 5]);
    assert!(lb.rank_for("A").await.unwrap() < lb.rank_for("C").await.unwrap());
    assert_eq!(lb.rank_for("E").await.unwrap(), Some(5));
}

// =============================================================================
// Paging & percentiles
// =============================================================================

#[tokio::test]
async fn test_total_pages() {
    let store = memory_store();
    let lb = leaderboard(&store);
    assert_eq!(lb.total_pages(None).await.unwrap(), 0);

    rank_members(&lb, 25).await;
    assert_eq!(lb.total_pages(None).await.unwrap(), 1);

    lb.rank_member("member_26", 26.0, None).await.unwrap();
    assert_eq!(lb.total_pages(None).await.unwrap(), 2);
    assert_eq!(lb.total_pages(Some(10)).await.unwrap(), 3);
    assert_eq!(lb.total_pages(Some(0)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_page_for() {
    let store = memory_store();
    let lb = leaderboard(&store);
    assert_eq!(lb.page_for("jones", None).await.unwrap(), 0);

    rank_members(&lb, 20).await;

    assert_eq!(lb.page_for("member_17", None).await.unwrap(), 1);
    assert_eq!(lb.page_for("member_11", None).await.unwrap(), 1);
    assert_eq!(lb.page_for("member_10", None).await.unwrap(), 1);
    assert_eq!(lb.page_for("member_1", None).await.unwrap(), 1);

    assert_eq!(lb.page_for("member_17", Some(10)).await.unwrap(), 1);
    assert_eq!(lb.page_for("member_11", Some(10)).await.unwrap(), 1);
    assert_eq!(lb.page_for("member_10", Some(10)).await.unwrap(), 2);
    assert_eq!(lb.page_for("member_1", Some(10)).await.unwrap(), 2);
}

#[tokio::test]
async fn test_percentile_for() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 12).await;

    assert_eq!(lb.percentile_for("member_1").await.unwrap(), Some(0));
    assert_eq!(lb.percentile_for("member_2").await.unwrap(), Some(9));
    assert_eq!(lb.percentile_for("member_3").await.unwrap(), Some(17));
    assert_eq!(lb.percentile_for("member_4").await.unwrap(), Some(25));
    assert_eq!(lb.percentile_for("member_12").await.unwrap(), Some(92));
    assert_eq!(lb.percentile_for("jones").await.unwrap(), None);
}

#[tokio::test]
async fn test_percentile_for_ascending_keeps_best_at_the_top() {
    let store = memory_store();
    let lb = Leaderboard::new("name", store, config().with_order(Order::Asc));
    rank_members(&lb, 12).await;

    assert_eq!(lb.percentile_for("member_1").await.unwrap(), Some(100));
    assert_eq!(lb.percentile_for("member_12").await.unwrap(), Some(8));
}

#[tokio::test]
async fn test_score_for_percentile() {
    let store = memory_store();
    let lb = leaderboard(&store);
    assert_eq!(lb.score_for_percentile(50.0).await.unwrap(), None);

    rank_members(&lb, 12).await;

    assert_eq!(lb.score_for_percentile(0.0).await.unwrap(), Some(1.0));
    assert_eq!(lb.score_for_percentile(100.0).await.unwrap(), Some(12.0));
    assert_eq!(lb.score_for_percentile(50.0).await.unwrap(), Some(6.5));
    assert_eq!(lb.score_for_percentile(101.0).await.unwrap(), None);
    assert_eq!(lb.score_for_percentile(-0.5).await.unwrap(), None);

    // Approximate inverse of percentile_for on evenly spaced scores
    for member in ["member_2", "member_4", "member_9"] {
        let percentile = lb.percentile_for(member).await.unwrap().unwrap();
        let score = lb
            .score_for_percentile(percentile as f64)
            .await
            .unwrap()
            .unwrap();
        let actual = lb.score_for(member).await.unwrap().unwrap();
        assert!((score - actual).abs() <= 1.0, "{member}: {score} vs {actual}");
    }
}

#[tokio::test]
async fn test_score_for_percentile_ascending() {
    let store = memory_store();
    let lb = Leaderboard::new("name", store, config().with_order(Order::Asc));
    rank_members(&lb, 12).await;

    assert_eq!(lb.score_for_percentile(100.0).await.unwrap(), Some(1.0));
    assert_eq!(lb.score_for_percentile(0.0).await.unwrap(), Some(12.0));
}

// =============================================================================
// Ranked queries
// =============================================================================

#[tokio::test]
async fn test_leaders() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 26).await;
    let options = QueryOptions::default();

    let leaders = lb.leaders(1, &options).await.unwrap();
    assert_eq!(leaders.len(), 25);
    assert_eq!(leaders[0].member, "member_26");
    assert_eq!(leaders[0].rank, Some(1));
    assert_eq!(leaders[24].member, "member_2");

    let leaders = lb.leaders(2, &options).await.unwrap();
    assert_eq!(leaders.len(), 1);
    assert_eq!(leaders[0].member, "member_1");
    assert_eq!(leaders[0].rank, Some(26));

    let leaders = lb.leaders(0, &options).await.unwrap();
    assert_eq!(leaders[0].member, "member_26");

    assert!(lb.leaders(3, &options).await.unwrap().is_empty());

    let leaders = lb.leaders(1, &options.clone().with_page_size(5)).await.unwrap();
    assert_eq!(leaders.len(), 5);
}

#[tokio::test]
async fn test_leaders_past_the_last_addressable_page() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 26).await;
    let options = QueryOptions::default();

    assert!(lb.leaders(u64::MAX, &options).await.unwrap().is_empty());
    assert!(lb.leaders(1 << 62, &options).await.unwrap().is_empty());
    assert!(lb.member_at(u64::MAX, &options).await.unwrap().is_none());

    let huge_pages = options.clone().with_page_size(usize::MAX);
    let leaders = lb.leaders(1, &huge_pages).await.unwrap();
    assert_eq!(leaders.len(), 26);
    assert_eq!(leaders[0].member, "member_26");
    assert!(lb.leaders(2, &huge_pages).await.unwrap().is_empty());

    let around = lb.around_me("member_10", &huge_pages).await.unwrap();
    assert_eq!(around.len(), 26);
    assert_eq!(around[0].member, "member_26");
}

#[tokio::test]
async fn test_leaders_on_empty_leaderboard() {
    let store = memory_store();
    let lb = leaderboard(&store);
    assert!(lb.leaders(1, &QueryOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_leaders_with_member_data() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    let leaders = lb
        .leaders(1, &QueryOptions::default().with_member_data())
        .await
        .unwrap();
    assert_eq!(leaders.len(), 5);
    assert_eq!(leaders[0].member, "member_5");
    assert_eq!(leaders[0].member_data, Some(member_data(5)));
    assert_eq!(leaders[4].member_data, Some(member_data(1)));
}

#[tokio::test]
async fn test_leaders_members_only() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    let leaders = lb
        .leaders(1, &QueryOptions::default().members_only())
        .await
        .unwrap();
    assert_eq!(leaders.len(), 5);
    assert_eq!(leaders[0].member, "member_5");
    assert_eq!(leaders[0].score, None);
    assert_eq!(leaders[0].rank, None);
}

#[tokio::test]
async fn test_all_leaders() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;

    let leaders = lb.all_leaders(&QueryOptions::default()).await.unwrap();
    assert_eq!(leaders.len(), 25);
    assert_eq!(leaders[0].member, "member_25");
}

#[tokio::test]
async fn test_members_from_score_range() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;

    let members = lb
        .members_from_score_range(10.0, 15.0, &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(members.len(), 6);
    assert_eq!(members[0].member, "member_15");
    assert_eq!(members[0].score, Some(15.0));
    assert_eq!(members[0].rank, Some(11));
    assert_eq!(members[5].member, "member_10");
    assert_eq!(members[5].rank, Some(16));
}

#[tokio::test]
async fn test_members_from_rank_range() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;
    let options = QueryOptions::default();

    let members = lb.members_from_rank_range(5, 9, &options).await.unwrap();
    assert_eq!(members.len(), 5);
    assert_eq!(members[0].member, "member_21");
    assert_eq!(members[0].score, Some(21.0));
    assert_eq!(members[4].member, "member_17");

    let members = lb.members_from_rank_range(1, 1, &options).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].member, "member_25");

    let members = lb.members_from_rank_range(1, 26, &options).await.unwrap();
    assert_eq!(members.len(), 25);
    assert_eq!(members[24].member, "member_1");

    assert!(lb.members_from_rank_range(6, 5, &options).await.unwrap().is_empty());
    assert!(lb.members_from_rank_range(30, 40, &options).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_top() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;
    let options = QueryOptions::default();

    let members = lb.top(5, &options).await.unwrap();
    assert_eq!(members.len(), 5);
    assert_eq!(members[0].member, "member_25");
    assert_eq!(members[4].member, "member_21");

    assert_eq!(lb.top(26, &options).await.unwrap().len(), 25);
    assert!(lb.top(0, &options).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_member_at() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 50).await;
    let options = QueryOptions::default();

    let first = lb.member_at(1, &options).await.unwrap().unwrap();
    assert_eq!(first.rank, Some(1));
    assert_eq!(first.score, Some(50.0));

    assert_eq!(lb.member_at(26, &options).await.unwrap().unwrap().rank, Some(26));
    assert_eq!(lb.member_at(50, &options).await.unwrap().unwrap().rank, Some(50));
    assert!(lb.member_at(51, &options).await.unwrap().is_none());
    assert!(lb.member_at(0, &options).await.unwrap().is_none());

    let first = lb
        .member_at(1, &QueryOptions::default().with_member_data())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.member_data, Some(member_data(50)));
}

#[tokio::test]
async fn test_around_me() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, DEFAULT_PAGE_SIZE * 3 + 1).await;
    let options = QueryOptions::default();

    assert_eq!(lb.total_members().await.unwrap(), 76);

    let around = lb.around_me("member_30", &options).await.unwrap();
    assert_eq!(around.len(), DEFAULT_PAGE_SIZE);
    assert_eq!(around[DEFAULT_PAGE_SIZE / 2].member, "member_30");

    let around = lb.around_me("member_1", &options).await.unwrap();
    assert_eq!(around.len(), DEFAULT_PAGE_SIZE / 2 + 1);
    assert_eq!(around.last().unwrap().member, "member_1");

    let around = lb.around_me("member_76", &options).await.unwrap();
    assert_eq!(around.len(), DEFAULT_PAGE_SIZE);
    assert_eq!(around[0].member, "member_76");
    assert_eq!(around[0].rank, Some(1));

    assert!(lb.around_me("jones", &options).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_ranked_in_list() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 26).await;

    let leaders = lb
        .ranked_in_list(&names(&["member_1", "member_15", "member_25"]), &QueryOptions::default())
        .await
        .unwrap();
    let members: Vec<&str> = leaders.iter().map(|e| e.member.as_str()).collect();
    assert_eq!(members, vec!["member_1", "member_15", "member_25"]);
    assert_eq!(leaders[0].rank, Some(26));
    assert_eq!(leaders[1].rank, Some(12));
}

#[tokio::test]
async fn test_ranked_in_list_with_missing_members() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;

    let leaders = lb
        .ranked_in_list(&names(&["jones"]), &QueryOptions::default())
        .await
        .unwrap();
    assert_eq!(leaders.len(), 1);
    assert_eq!(leaders[0].member, "jones");
    assert_eq!(leaders[0].score, None);
    assert_eq!(leaders[0].rank, None);

    let leaders = lb
        .ranked_in_list(
            &names(&["member_1", "jones", "member_25"]),
            &QueryOptions::default().exclude_missing().with_member_data(),
        )
        .await
        .unwrap();
    assert_eq!(leaders.len(), 2);
    assert_eq!(leaders[0].member_data, Some(member_data(1)));
    assert_eq!(leaders[1].member_data, Some(member_data(25)));
}

#[tokio::test]
async fn test_ranked_in_list_sort_by() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 25).await;
    let members = names(&["member_25", "member_1", "member_15"]);

    let leaders = lb
        .ranked_in_list(&members, &QueryOptions::default().sort_by(SortBy::Score))
        .await
        .unwrap();
    let order: Vec<&str> = leaders.iter().map(|e| e.member.as_str()).collect();
    assert_eq!(order, vec!["member_1", "member_15", "member_25"]);

    let leaders = lb
        .ranked_in_list(&members, &QueryOptions::default().sort_by(SortBy::Rank))
        .await
        .unwrap();
    let order: Vec<&str> = leaders.iter().map(|e| e.member.as_str()).collect();
    assert_eq!(order, vec!["member_25", "member_15", "member_1"]);
}

// =============================================================================
// Merge, intersect & expiry
// =============================================================================

#[tokio::test]
async fn test_merge_leaderboards() {
    let store = memory_store();
    let foo = Leaderboard::new("foo", store.clone(), config());
    let bar = Leaderboard::new("bar", store.clone(), config());

    foo.rank_member("foo_1", 1.0, None).await.unwrap();
    foo.rank_member("foo_2", 2.0, None).await.unwrap();
    bar.rank_member("bar_1", 1.0, None).await.unwrap();
    bar.rank_member("bar_2", 2.0, None).await.unwrap();
    bar.rank_member("bar_3", 5.0, None).await.unwrap();

    let stored = foo
        .merge_leaderboards("foobar", &names(&["bar"]), Aggregate::Sum)
        .await
        .unwrap();
    assert_eq!(stored, 5);

    let foobar = Leaderboard::new("foobar", store, config());
    assert_eq!(foobar.total_members().await.unwrap(), 5);
    let leaders = foobar.leaders(1, &QueryOptions::default()).await.unwrap();
    assert_eq!(leaders[0].member, "bar_3");
}

#[tokio::test]
async fn test_intersect_leaderboards() {
    let store = memory_store();
    let foo = Leaderboard::new("foo", store.clone(), config());
    let bar = Leaderboard::new("bar", store.clone(), config());

    foo.rank_member("foo_1", 1.0, None).await.unwrap();
    foo.rank_member("foo_2", 2.0, None).await.unwrap();
    foo.rank_member("bar_3", 6.0, None).await.unwrap();
    bar.rank_member("bar_1", 3.0, None).await.unwrap();
    bar.rank_member("foo_1", 4.0, None).await.unwrap();
    bar.rank_member("bar_3", 5.0, None).await.unwrap();

    foo.intersect_leaderboards("foobar", &names(&["bar"]), Aggregate::Sum)
        .await
        .unwrap();

    let foobar = Leaderboard::new("foobar", store.clone(), config());
    assert_eq!(foobar.total_members().await.unwrap(), 2);
    let leaders = foobar.leaders(1, &QueryOptions::default()).await.unwrap();
    assert_eq!(leaders[0].member, "bar_3");
    assert_eq!(leaders[0].score, Some(11.0));

    foo.intersect_leaderboards("foobar_max", &names(&["bar"]), Aggregate::Max)
        .await
        .unwrap();
    assert_eq!(foobar.score_for_in("foobar_max", "foo_1").await.unwrap(), Some(4.0));
}

#[tokio::test]
async fn test_expire_leaderboard() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    lb.expire_leaderboard(3).await.unwrap();
    assert!(ttl(&store, "name").await > 1);
    assert!(ttl(&store, "name:member_data").await > 1);
}

#[tokio::test]
async fn test_expire_leaderboard_at() {
    let store = memory_store();
    let lb = leaderboard(&store);
    rank_members(&lb, 5).await;

    lb.expire_leaderboard_at(chrono::Utc::now().timestamp() + 10)
        .await
        .unwrap();
    let remaining = ttl(&store, "name").await;
    assert!(remaining > 0 && remaining < 11);
    let remaining = ttl(&store, "name:member_data").await;
    assert!(remaining > 0 && remaining < 11);
}

// =============================================================================
// Global member data
// =============================================================================

#[tokio::test]
async fn test_global_member_data_is_shared_and_survives_delete() {
    let store = memory_store();
    let shared = config()
        .with_member_data_namespace("profiles")
        .with_global_member_data(true);
    let weekly = Leaderboard::new("weekly", store.clone(), shared.clone());
    let monthly = Leaderboard::new("monthly", store.clone(), shared);

    weekly.rank_member("alice", 10.0, Some("alice-profile")).await.unwrap();
    monthly.rank_member("bob", 20.0, Some("bob-profile")).await.unwrap();

    assert_eq!(
        monthly.member_data_for("alice").await.unwrap().as_deref(),
        Some("alice-profile")
    );
    assert_eq!(weekly.member_data_key("weekly"), "profiles");

    weekly.delete_leaderboard().await.unwrap();
    assert!(!exists(&store, "weekly").await);
    assert_eq!(weekly.member_data_for("alice").await.unwrap(), None);
    assert_eq!(
        monthly.member_data_for("bob").await.unwrap().as_deref(),
        Some("bob-profile")
    );

    monthly.expire_leaderboard(30).await.unwrap();
    assert_eq!(ttl(&store, "profiles").await, -1);
}
