use proptest::prelude::*;

use pinglun_backend_rust::leaderboard::{MemoryLeaderboard, Period};
use pinglun_backend_rust::services::points::ReviewPoints;
use pinglun_backend_rust::services::score_reset::compute_scores;

const WEEK_START: &str = "20260731180000";
const OLD_STAMP: &str = "20260701120000";
const NEW_STAMP: &str = "20260801120000";

fn history(old: usize, new: usize) -> Vec<String> {
    let mut stamps = vec![OLD_STAMP.to_string(); old];
    stamps.extend(std::iter::repeat(NEW_STAMP.to_string()).take(new));
    stamps
}

fn arb_points() -> impl Strategy<Value = ReviewPoints> {
    (1i64..=50, 0i64..=20, 0i64..=20).prop_map(|(review, multiple, first)| ReviewPoints {
        review_point: review,
        multiple_bonus_point: multiple,
        first_bonus_point: first,
    })
}

proptest! {
    #[test]
    fn weekly_score_never_exceeds_all_time_score(
        points in arb_points(),
        old_reviews in 0usize..40,
        new_reviews in 0usize..40,
    ) {
        let created = history(old_reviews, new_reviews);
        let firsts = history(old_reviews.min(3), new_reviews.min(3));

        let (all_score, week_score) = compute_scores(&points, &created, &firsts, WEEK_START);

        prop_assert!(all_score >= 0);
        prop_assert!(week_score >= 0);
        prop_assert!(week_score <= all_score);
    }

    #[test]
    fn applying_a_reset_twice_lands_on_the_same_scores(
        points in arb_points(),
        old_reviews in 0usize..40,
        new_reviews in 0usize..40,
        stale_score in 1i64..5000,
    ) {
        let created = history(old_reviews, new_reviews);
        let firsts = history(old_reviews.min(2), new_reviews.min(2));

        let board = MemoryLeaderboard::new();
        // Arbitrary pre-existing corruption the reset must not preserve.
        board.increment(Period::All, 7, stale_score);
        board.increment(Period::ThisWeek, 7, stale_score / 2 + 1);

        let mut observed = Vec::new();
        for _ in 0..2 {
            board.remove(Period::All, 7);
            board.remove(Period::ThisWeek, 7);

            let (all_score, week_score) = compute_scores(&points, &created, &firsts, WEEK_START);
            if all_score > 0 {
                board.increment(Period::All, 7, all_score);
            }
            if week_score > 0 {
                board.increment(Period::ThisWeek, 7, week_score);
            }

            observed.push((board.score(Period::All, 7), board.score(Period::ThisWeek, 7)));
        }

        prop_assert_eq!(observed[0], observed[1]);
    }

    #[test]
    fn absence_rather_than_zero_represents_no_score(
        points in arb_points(),
    ) {
        let board = MemoryLeaderboard::new();
        board.increment(Period::All, 7, 99);

        board.remove(Period::All, 7);
        board.remove(Period::ThisWeek, 7);

        let (all_score, week_score) = compute_scores(&points, &[], &[], WEEK_START);
        prop_assert_eq!(all_score, 0);
        prop_assert_eq!(week_score, 0);

        // Zero scores never get written back.
        prop_assert_eq!(board.score(Period::All, 7), None);
        prop_assert_eq!(board.score(Period::ThisWeek, 7), None);
    }
}
