use thiserror::Error;

use crate::core::time;
use crate::db::operations::{first_review, reviews};
use crate::db::DatabaseProxy;
use crate::leaderboard::{Leaderboard, LeaderboardError, Period};
use crate::services::points::{self, PointsError, ReviewPoints};

#[derive(Debug, Error)]
pub enum ResetError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Points(#[from] PointsError),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

/// Recomputes a user's `all` and `this_week` scores purely from durable
/// history. This is the authoritative score definition; the incremental
/// arithmetic on the write paths is an optimization over it. Starting from
/// a clean removal makes the operation idempotent and safe to repeat.
pub async fn reset_rank(
    proxy: &DatabaseProxy,
    leaderboard: &Leaderboard,
    user_id: i64,
) -> Result<(), ResetError> {
    leaderboard.remove(Period::All, user_id).await?;
    leaderboard.remove(Period::ThisWeek, user_id).await?;

    let created_ats = reviews::list_scorable_created_at(proxy.pool(), user_id).await?;
    if created_ats.is_empty() {
        return Ok(());
    }

    let resolved = points::resolve(proxy).await?;
    let first_timestamps = first_review::list_timestamps_for_user(proxy.pool(), user_id).await?;
    let week_start = time::week_window_start_sortable();

    let (all_score, week_score) =
        compute_scores(&resolved, &created_ats, &first_timestamps, &week_start);

    if all_score > 0 {
        leaderboard.increment(Period::All, user_id, all_score).await?;
    }
    if week_score > 0 {
        leaderboard
            .increment(Period::ThisWeek, user_id, week_score)
            .await?;
    }

    Ok(())
}

/// Score arithmetic over the user's surviving history. The weekly
/// multiple-of-3 slice is the part of the cumulative bonus the user would
/// not have without this week's reviews.
pub fn compute_scores(
    points: &ReviewPoints,
    created_ats: &[String],
    first_timestamps: &[String],
    week_start: &str,
) -> (i64, i64) {
    let total = created_ats.len() as i64;
    let week_total = created_ats
        .iter()
        .filter(|created| created.as_str() > week_start)
        .count() as i64;

    let first_count = first_timestamps.len() as i64;
    let week_first_count = first_timestamps
        .iter()
        .filter(|timestamp| timestamp.as_str() > week_start)
        .count() as i64;

    let all_score = total * points.review_point
        + (total / 3) * points.multiple_bonus_point
        + first_count * points.first_bonus_point;

    let week_score = week_total * points.review_point
        + (total / 3 - (total - week_total) / 3) * points.multiple_bonus_point
        + week_first_count * points.first_bonus_point;

    (all_score, week_score)
}

#[cfg(test)]
mod tests {
    use super::*;

    const WEEK_START: &str = "20260731180000";

    fn points() -> ReviewPoints {
        ReviewPoints {
            review_point: 10,
            multiple_bonus_point: 3,
            first_bonus_point: 3,
        }
    }

    fn stamps(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn three_reviews_earn_one_multiple_bonus() {
        let created = stamps(&["20260701120000", "20260702120000", "20260801120000"]);
        let (all, week) = compute_scores(&points(), &created, &[], WEEK_START);
        assert_eq!(all, 33);
        // The third review is this week's and completes the multiple of 3.
        assert_eq!(week, 13);
    }

    #[test]
    fn first_bonus_counts_toward_both_periods_when_recent() {
        let created = stamps(&["20260801120000"]);
        let firsts = stamps(&["20260801120000"]);
        let (all, week) = compute_scores(&points(), &created, &firsts, WEEK_START);
        assert_eq!(all, 13);
        assert_eq!(week, 13);
    }

    #[test]
    fn old_first_bonus_stays_out_of_this_week() {
        let created = stamps(&["20260701120000", "20260801120000"]);
        let firsts = stamps(&["20260701120000"]);
        let (all, week) = compute_scores(&points(), &created, &firsts, WEEK_START);
        assert_eq!(all, 23);
        assert_eq!(week, 10);
    }

    #[test]
    fn no_history_scores_zero() {
        let (all, week) = compute_scores(&points(), &[], &[], WEEK_START);
        assert_eq!(all, 0);
        assert_eq!(week, 0);
    }

    #[test]
    fn computation_is_deterministic() {
        let created = stamps(&["20260701120000", "20260801090000", "20260802090000"]);
        let firsts = stamps(&["20260801090000"]);
        let first_run = compute_scores(&points(), &created, &firsts, WEEK_START);
        let second_run = compute_scores(&points(), &created, &firsts, WEEK_START);
        assert_eq!(first_run, second_run);
    }
}
