use pinglun_backend_rust::leaderboard::{Leaderboard, MemoryLeaderboard, Period};

#[tokio::test]
async fn increment_accumulates_and_score_reads_back() {
    let board = Leaderboard::memory();

    board.increment(Period::All, 7, 10).await.unwrap();
    board.increment(Period::All, 7, 13).await.unwrap();

    assert_eq!(board.score(Period::All, 7).await.unwrap(), Some(23));
    assert_eq!(board.score(Period::ThisWeek, 7).await.unwrap(), None);
}

#[tokio::test]
async fn remove_deletes_the_member() {
    let board = Leaderboard::memory();

    board.increment(Period::ThisWeek, 7, 10).await.unwrap();
    board.remove(Period::ThisWeek, 7).await.unwrap();

    assert_eq!(board.score(Period::ThisWeek, 7).await.unwrap(), None);
    assert_eq!(board.rank_info(Period::ThisWeek, 7).await.unwrap().map(|i| i.rank), None);
}

#[tokio::test]
async fn equal_scores_share_the_last_members_rank() {
    let board = Leaderboard::memory();

    // One user above the tie group, one below.
    board.increment(Period::All, 201, 50).await.unwrap();
    for user_id in [101, 102, 103] {
        board.increment(Period::All, user_id, 30).await.unwrap();
    }
    board.increment(Period::All, 104, 10).await.unwrap();

    for user_id in [101, 102, 103] {
        let info = board.rank_info(Period::All, user_id).await.unwrap().unwrap();
        assert_eq!(info.rank, 2, "user {user_id} should share rank 2");
        assert_eq!(info.score, 30);
    }

    let top = board.rank_info(Period::All, 201).await.unwrap().unwrap();
    assert_eq!(top.rank, 1);

    let bottom = board.rank_info(Period::All, 104).await.unwrap().unwrap();
    assert_eq!(bottom.rank, 5);
}

#[tokio::test]
async fn lone_tie_group_reports_rank_one_for_all() {
    let board = Leaderboard::memory();

    // Inserted in order X, Y, Z with the same score.
    for user_id in [101, 102, 103] {
        board.increment(Period::All, user_id, 42).await.unwrap();
    }

    for user_id in [101, 102, 103] {
        let info = board.rank_info(Period::All, user_id).await.unwrap().unwrap();
        assert_eq!(info.rank, 1);
    }
}

#[tokio::test]
async fn ratio_reflects_position_in_the_field() {
    let board = Leaderboard::memory();

    for (user_id, score) in [(1, 100), (2, 90), (3, 80), (4, 70)] {
        board.increment(Period::All, user_id, score).await.unwrap();
    }

    let first = board.rank_info(Period::All, 1).await.unwrap().unwrap();
    assert_eq!(first.ratio, 25);

    let last = board.rank_info(Period::All, 4).await.unwrap().unwrap();
    assert_eq!(last.ratio, 100);
}

#[test]
fn reads_fall_back_to_the_copy_key() {
    let board = MemoryLeaderboard::new();

    board.increment(Period::All, 7, 23);
    board.drop_key("rank:user:all");

    // Member must still resolve through the shadow copy.
    assert_eq!(board.score(Period::All, 7), Some(23));

    let info = board.rank_info(Period::All, 7).unwrap();
    assert_eq!(info.score, 23);
    assert_eq!(info.rank, 1);

    board.drop_key("rank:user:all:copy");
    assert_eq!(board.score(Period::All, 7), None);
}

#[test]
fn mutations_hit_primary_and_copy_together() {
    let board = MemoryLeaderboard::new();

    board.increment(Period::All, 7, 10);
    board.remove(Period::All, 7);

    // Nothing left behind in either key.
    board.drop_key("rank:user:all");
    assert_eq!(board.score(Period::All, 7), None);
}

#[tokio::test]
async fn reverse_range_pages_highest_first() {
    let board = Leaderboard::memory();

    for (user_id, score) in [(1, 10), (2, 30), (3, 20), (4, 40)] {
        board.increment(Period::All, user_id, score).await.unwrap();
    }

    let top_two = board
        .reverse_range_with_scores(Period::All, 0, 1)
        .await
        .unwrap();
    assert_eq!(top_two, vec![(4, 40), (2, 30)]);

    let rest = board
        .reverse_range_with_scores(Period::All, 2, 3)
        .await
        .unwrap();
    assert_eq!(rest, vec![(3, 20), (1, 10)]);

    assert_eq!(board.cardinality(Period::All).await.unwrap(), 4);
}

#[tokio::test]
async fn periods_are_independent() {
    let board = Leaderboard::memory();

    board.increment(Period::All, 7, 33).await.unwrap();
    board.increment(Period::ThisWeek, 7, 13).await.unwrap();

    assert_eq!(board.score(Period::All, 7).await.unwrap(), Some(33));
    assert_eq!(board.score(Period::ThisWeek, 7).await.unwrap(), Some(13));
    assert_eq!(board.score(Period::LastWeek, 7).await.unwrap(), None);
}
