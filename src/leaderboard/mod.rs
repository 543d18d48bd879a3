pub mod keys;

mod memory;
mod redis_store;

use serde::Serialize;
use thiserror::Error;

pub use memory::MemoryLeaderboard;
pub use redis_store::RedisLeaderboard;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Period {
    All,
    ThisWeek,
    LastWeek,
}

impl Period {
    pub fn as_str(&self) -> &'static str {
        match self {
            Period::All => "all",
            Period::ThisWeek => "this_week",
            Period::LastWeek => "last_week",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "all" => Some(Period::All),
            "this_week" => Some(Period::ThisWeek),
            "last_week" => Some(Period::LastWeek),
            _ => None,
        }
    }
}

/// Tie-aware rank snapshot for one member. Members sharing a score report
/// the same rank: the reverse rank of the last member in the equal-score
/// range. Milestone detection depends on this exact tie-break.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RankInfo {
    pub score: i64,
    pub rank: u64,
    pub ratio: u64,
}

#[derive(Debug, Error)]
pub enum LeaderboardError {
    #[error(transparent)]
    Redis(#[from] redis::RedisError),
    #[error("leaderboard keys diverged: {context}")]
    Inconsistent { context: String },
}

/// The ordered-score store behind user rankings. Injected everywhere it is
/// used; the in-memory variant backs tests and redis-less deployments with
/// identical ordering and fallback semantics.
pub enum Leaderboard {
    Redis(RedisLeaderboard),
    Memory(MemoryLeaderboard),
}

impl Leaderboard {
    pub fn memory() -> Self {
        Leaderboard::Memory(MemoryLeaderboard::new())
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        Ok(Leaderboard::Redis(RedisLeaderboard::connect(redis_url).await?))
    }

    /// Applies `delta` (signed) to the member in both the primary and the
    /// shadow key. A partial application is reported as `Inconsistent`; the
    /// caller repairs it with a later `reset_rank`.
    pub async fn increment(
        &self,
        period: Period,
        user_id: i64,
        delta: i64,
    ) -> Result<(), LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.increment(period, user_id, delta).await,
            Leaderboard::Memory(store) => {
                store.increment(period, user_id, delta);
                Ok(())
            }
        }
    }

    pub async fn remove(&self, period: Period, user_id: i64) -> Result<(), LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.remove(period, user_id).await,
            Leaderboard::Memory(store) => {
                store.remove(period, user_id);
                Ok(())
            }
        }
    }

    pub async fn score(
        &self,
        period: Period,
        user_id: i64,
    ) -> Result<Option<i64>, LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.score(period, user_id).await,
            Leaderboard::Memory(store) => Ok(store.score(period, user_id)),
        }
    }

    pub async fn rank_info(
        &self,
        period: Period,
        user_id: i64,
    ) -> Result<Option<RankInfo>, LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.rank_info(period, user_id).await,
            Leaderboard::Memory(store) => Ok(store.rank_info(period, user_id)),
        }
    }

    pub async fn cardinality(&self, period: Period) -> Result<u64, LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.cardinality(period).await,
            Leaderboard::Memory(store) => Ok(store.cardinality(period)),
        }
    }

    /// Highest-scored members first, inclusive zero-based range. Used by the
    /// consumer-facing scoreboard listing.
    pub async fn reverse_range_with_scores(
        &self,
        period: Period,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(i64, i64)>, LeaderboardError> {
        match self {
            Leaderboard::Redis(store) => store.reverse_range_with_scores(period, start, stop).await,
            Leaderboard::Memory(store) => Ok(store.reverse_range_with_scores(period, start, stop)),
        }
    }
}

/// `ceil(rank / total * 100)`, with the convention that an empty leaderboard
/// reports 100.
pub(crate) fn ratio_of(rank: u64, total: u64) -> u64 {
    if total == 0 {
        100
    } else {
        (rank * 100 + total - 1) / total
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ratio_is_100_on_empty_board() {
        assert_eq!(ratio_of(1, 0), 100);
    }

    #[test]
    fn ratio_rounds_up() {
        assert_eq!(ratio_of(1, 3), 34);
        assert_eq!(ratio_of(3, 3), 100);
        assert_eq!(ratio_of(1, 100), 1);
        assert_eq!(ratio_of(7, 200), 4);
    }

    #[test]
    fn period_round_trips() {
        for period in [Period::All, Period::ThisWeek, Period::LastWeek] {
            assert_eq!(Period::parse(period.as_str()), Some(period));
        }
        assert_eq!(Period::parse("yesterday"), None);
    }
}
