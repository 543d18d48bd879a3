use std::time::Duration;

use pinglun_backend_rust::cache::CacheStore;
use pinglun_backend_rust::core::effects::ReviewWrittenFlag;
use pinglun_backend_rust::leaderboard::{Leaderboard, Period};
use pinglun_backend_rust::services::points::ReviewPoints;
use pinglun_backend_rust::services::rank;

fn points() -> ReviewPoints {
    ReviewPoints {
        review_point: 10,
        multiple_bonus_point: 3,
        first_bonus_point: 3,
    }
}

fn flat_points(review_point: i64) -> ReviewPoints {
    ReviewPoints {
        review_point,
        multiple_bonus_point: 0,
        first_bonus_point: 0,
    }
}

#[tokio::test]
async fn first_appearance_always_reports_a_milestone() {
    let board = Leaderboard::memory();

    let result = rank::update_rank_point(&board, Period::All, 7, false, false, &points())
        .await
        .unwrap()
        .expect("first appearance must notify");

    assert_eq!(result.rank, 1);
    assert_eq!(result.score, 10);
    assert_eq!(result.upgrade_range, 0);
    assert_eq!(result.ratio, 100);
}

#[tokio::test]
async fn third_review_earns_the_multiple_bonus() {
    let board = Leaderboard::memory();

    // Two prior reviews worth 20 points.
    board.increment(Period::All, 7, 20).await.unwrap();

    let result = rank::update_rank_point(&board, Period::All, 7, true, false, &points())
        .await
        .unwrap();

    assert_eq!(board.score(Period::All, 7).await.unwrap(), Some(33));
    // Alone on the board the rank cannot move, so no popup.
    assert!(result.is_none());
}

#[tokio::test]
async fn third_review_that_is_also_first_stacks_both_bonuses() {
    let board = Leaderboard::memory();

    board.increment(Period::All, 7, 20).await.unwrap();

    rank::update_rank_point(&board, Period::All, 7, true, true, &points())
        .await
        .unwrap();

    assert_eq!(board.score(Period::All, 7).await.unwrap(), Some(36));
}

#[tokio::test]
async fn moving_from_12_to_9_is_not_a_milestone() {
    let board = Leaderboard::memory();

    // Eleven users above the target.
    for i in 1..=11 {
        board.increment(Period::All, i, 210 - i * 10).await.unwrap();
    }
    board.increment(Period::All, 99, 95).await.unwrap();

    let before = board.rank_info(Period::All, 99).await.unwrap().unwrap();
    assert_eq!(before.rank, 12);

    // +30 lands at rank 9, which is not one of the single-digit landmarks.
    let result = rank::update_rank_point(&board, Period::All, 99, false, false, &flat_points(30))
        .await
        .unwrap();

    let after = board.rank_info(Period::All, 99).await.unwrap().unwrap();
    assert_eq!(after.rank, 9);
    assert!(result.is_none());
}

#[tokio::test]
async fn moving_from_4_to_2_is_a_milestone() {
    let board = Leaderboard::memory();

    for (user_id, score) in [(1, 100), (2, 90), (3, 80), (4, 70), (5, 60)] {
        board.increment(Period::All, user_id, score).await.unwrap();
    }
    board.increment(Period::All, 99, 75).await.unwrap();

    let before = board.rank_info(Period::All, 99).await.unwrap().unwrap();
    assert_eq!(before.rank, 4);

    let result = rank::update_rank_point(&board, Period::All, 99, false, false, &flat_points(20))
        .await
        .unwrap()
        .expect("landing on rank 2 must notify");

    assert_eq!(result.rank, 2);
    assert_eq!(result.upgrade_range, 2);
}

#[tokio::test]
async fn crossing_a_tens_bucket_deep_in_the_field_is_a_milestone() {
    let board = Leaderboard::memory();

    for i in 1..=160 {
        board.increment(Period::All, i, 2000 - i * 10).await.unwrap();
    }
    board.increment(Period::All, 999, 505).await.unwrap();

    let before = board.rank_info(Period::All, 999).await.unwrap().unwrap();
    assert_eq!(before.rank, 150);

    let result = rank::update_rank_point(&board, Period::All, 999, false, false, &flat_points(550))
        .await
        .unwrap()
        .expect("crossing the tens bucket must notify");

    assert_eq!(result.rank, 95);
    assert_eq!(result.upgrade_range, 55);
}

#[tokio::test]
async fn conservation_under_create_then_delete() {
    let board = Leaderboard::memory();

    // Other users form the field; the target is absent before the create.
    board.increment(Period::All, 1, 50).await.unwrap();
    board.increment(Period::ThisWeek, 1, 20).await.unwrap();
    assert_eq!(board.score(Period::All, 7).await.unwrap(), None);

    // Create: only review for user and product, so it is first.
    rank::update_rank_point(&board, Period::All, 7, false, true, &points())
        .await
        .unwrap();
    rank::update_rank_point(&board, Period::ThisWeek, 7, false, true, &points())
        .await
        .unwrap();
    assert_eq!(board.score(Period::All, 7).await.unwrap(), Some(13));

    // Delete of the last active review removes the member outright.
    board.remove(Period::All, 7).await.unwrap();
    board.remove(Period::ThisWeek, 7).await.unwrap();

    assert_eq!(board.score(Period::All, 7).await.unwrap(), None);
    assert_eq!(board.score(Period::ThisWeek, 7).await.unwrap(), None);
}

#[tokio::test]
async fn pending_flag_pays_out_at_most_once() {
    let cache = CacheStore::memory();
    let key = "review:written:7";

    cache
        .set(
            key,
            &ReviewWrittenFlag {
                is_first: true,
                written: true,
            },
            Duration::ZERO,
        )
        .await;

    // First check consumes the flag and would score the review.
    let first: Option<ReviewWrittenFlag> = cache.take(key).await;
    assert!(first.is_some_and(|flag| flag.written));

    // A retry of the same check, acknowledged or not, finds nothing.
    let second: Option<ReviewWrittenFlag> = cache.take(key).await;
    assert!(second.is_none());
}
