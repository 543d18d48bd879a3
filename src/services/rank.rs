use serde::Serialize;

use crate::leaderboard::{Leaderboard, LeaderboardError, Period};
use crate::services::points::ReviewPoints;

/// Payload behind a "you moved up" popup. Emitted at most once per scored
/// review event and period.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MilestoneResult {
    pub rank: u64,
    pub score: i64,
    pub upgrade_range: i64,
    pub ratio: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub title: String,
    pub point: i64,
}

pub fn score_delta(points: &ReviewPoints, is_multiple: bool, is_first: bool) -> i64 {
    points.review_point
        + if is_multiple { points.multiple_bonus_point } else { 0 }
        + if is_first { points.first_bonus_point } else { 0 }
}

/// Band-scaled milestone policy. Single digits only notify on landing at
/// 5, 3, 2 or 1; deeper ranks notify when the updated rank crosses into a
/// different bucket of its magnitude band. Users near the top hear about
/// smaller movements than users deep in the tail.
pub fn should_notify(previous_rank: u64, updated_rank: u64) -> bool {
    match updated_rank {
        1..=9 => matches!(updated_rank, 5 | 3 | 2 | 1),
        10..=99 => previous_rank / 10 != updated_rank / 10,
        100..=999 => previous_rank / 100 != updated_rank / 100,
        1000..=9999 => previous_rank / 1000 != updated_rank / 1000,
        _ => previous_rank / 10000 != updated_rank / 10000,
    }
}

/// Applies one review event's score to a period and decides whether the
/// resulting rank movement is milestone-worthy. A user's very first
/// appearance on the board always is.
pub async fn update_rank_point(
    leaderboard: &Leaderboard,
    period: Period,
    user_id: i64,
    is_multiple: bool,
    is_first: bool,
    points: &ReviewPoints,
) -> Result<Option<MilestoneResult>, LeaderboardError> {
    let previous = leaderboard.rank_info(period, user_id).await?;

    let delta = score_delta(points, is_multiple, is_first);
    leaderboard.increment(period, user_id, delta).await?;

    let Some(updated) = leaderboard.rank_info(period, user_id).await? else {
        return Ok(None);
    };

    match previous {
        None => {
            let total = leaderboard.cardinality(period).await?;
            Ok(Some(MilestoneResult {
                rank: updated.rank,
                score: updated.score,
                upgrade_range: total as i64 - updated.rank as i64,
                ratio: updated.ratio,
            }))
        }
        Some(previous) => {
            let upgrade_range = previous.rank as i64 - updated.rank as i64;
            if upgrade_range == 0 {
                return Ok(None);
            }

            if should_notify(previous.rank, updated.rank) {
                Ok(Some(MilestoneResult {
                    rank: updated.rank,
                    score: updated.score,
                    upgrade_range,
                    ratio: updated.ratio,
                }))
            } else {
                Ok(None)
            }
        }
    }
}

/// Reward breakdown shown alongside the milestone check. The base entry is
/// always present; the bonuses collapse into one combined entry.
pub fn get_rewards(points: &ReviewPoints, is_multiple: bool, is_first: bool) -> Vec<Reward> {
    let mut rewards = vec![Reward {
        title: "完成点评".to_string(),
        point: points.review_point,
    }];

    let mut bonus = 0;
    if is_multiple {
        bonus += points.multiple_bonus_point;
    }
    if is_first {
        bonus += points.first_bonus_point;
    }

    if bonus > 0 {
        rewards.push(Reward {
            title: "额外奖励".to_string(),
            point: bonus,
        });
    }

    rewards
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points() -> ReviewPoints {
        ReviewPoints {
            review_point: 10,
            multiple_bonus_point: 3,
            first_bonus_point: 3,
        }
    }

    #[test]
    fn delta_composition() {
        assert_eq!(score_delta(&points(), false, false), 10);
        assert_eq!(score_delta(&points(), true, false), 13);
        assert_eq!(score_delta(&points(), false, true), 13);
        assert_eq!(score_delta(&points(), true, true), 16);
    }

    #[test]
    fn single_digit_ranks_only_notify_on_landmarks() {
        assert!(!should_notify(12, 9));
        assert!(!should_notify(12, 8));
        assert!(should_notify(12, 5));
        assert!(should_notify(4, 2));
        assert!(should_notify(4, 3));
        assert!(should_notify(2, 1));
        assert!(!should_notify(7, 6));
    }

    #[test]
    fn tens_band_notifies_on_bucket_change() {
        assert!(should_notify(150, 95));
        assert!(should_notify(25, 19));
        assert!(!should_notify(19, 15));
        assert!(!should_notify(99, 90));
    }

    #[test]
    fn deeper_bands_use_their_own_bucket_size() {
        assert!(should_notify(1100, 999));
        assert!(!should_notify(980, 920));
        assert!(should_notify(2500, 1999));
        assert!(!should_notify(1999, 1001));
        assert!(should_notify(25000, 19999));
        assert!(!should_notify(19999, 10001));
    }

    #[test]
    fn rewards_always_include_the_base_entry() {
        let rewards = get_rewards(&points(), false, false);
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].point, 10);
    }

    #[test]
    fn bonuses_collapse_into_one_entry() {
        let rewards = get_rewards(&points(), true, true);
        assert_eq!(rewards.len(), 2);
        assert_eq!(rewards[1].point, 6);

        let rewards = get_rewards(&points(), true, false);
        assert_eq!(rewards[1].point, 3);
    }
}
