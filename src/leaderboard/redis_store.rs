use redis::aio::MultiplexedConnection;
use redis::AsyncCommands;
use tracing::error;

use crate::leaderboard::keys::period_keys;
use crate::leaderboard::{ratio_of, LeaderboardError, Period, RankInfo};

#[derive(Clone)]
pub struct RedisLeaderboard {
    connection: MultiplexedConnection,
}

impl RedisLeaderboard {
    pub fn new(connection: MultiplexedConnection) -> Self {
        Self { connection }
    }

    pub async fn connect(redis_url: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(redis_url)?;
        let connection = client.get_multiplexed_tokio_connection().await?;
        Ok(Self::new(connection))
    }

    pub async fn increment(
        &self,
        period: Period,
        user_id: i64,
        delta: i64,
    ) -> Result<(), LeaderboardError> {
        let member = user_id.to_string();
        let [primary, copy] = period_keys(period);
        let mut conn = self.connection.clone();

        let _: f64 = conn.zincr(primary, &member, delta).await?;

        // The shadow key must follow the primary. One immediate retry, then
        // the divergence is logged with enough context for reset_rank to
        // repair it later.
        let copy_result: Result<f64, _> = conn.zincr(copy, &member, delta).await;
        if copy_result.is_err() {
            let retry: Result<f64, _> = conn.zincr(copy, &member, delta).await;
            if let Err(err) = retry {
                error!(
                    period = period.as_str(),
                    user_id,
                    delta,
                    error = %err,
                    "leaderboard copy increment failed after primary succeeded"
                );
                return Err(LeaderboardError::Inconsistent {
                    context: format!(
                        "zincrby {} user={} delta={}",
                        period.as_str(),
                        user_id,
                        delta
                    ),
                });
            }
        }

        Ok(())
    }

    pub async fn remove(&self, period: Period, user_id: i64) -> Result<(), LeaderboardError> {
        let member = user_id.to_string();
        let [primary, copy] = period_keys(period);
        let mut conn = self.connection.clone();

        let _: u64 = conn.zrem(primary, &member).await?;

        let copy_result: Result<u64, _> = conn.zrem(copy, &member).await;
        if copy_result.is_err() {
            let retry: Result<u64, _> = conn.zrem(copy, &member).await;
            if let Err(err) = retry {
                error!(
                    period = period.as_str(),
                    user_id,
                    error = %err,
                    "leaderboard copy removal failed after primary succeeded"
                );
                return Err(LeaderboardError::Inconsistent {
                    context: format!("zrem {} user={}", period.as_str(), user_id),
                });
            }
        }

        Ok(())
    }

    /// Member score with primary-then-copy fallback: a member missing from
    /// the primary is looked up in the copy before being declared absent.
    pub async fn score(
        &self,
        period: Period,
        user_id: i64,
    ) -> Result<Option<i64>, LeaderboardError> {
        let member = user_id.to_string();
        let mut conn = self.connection.clone();

        for key in period_keys(period) {
            let score: Option<f64> = conn.zscore(key, &member).await?;
            if let Some(score) = score {
                return Ok(Some(score as i64));
            }
        }

        Ok(None)
    }

    pub async fn rank_info(
        &self,
        period: Period,
        user_id: i64,
    ) -> Result<Option<RankInfo>, LeaderboardError> {
        let Some(score) = self.score(period, user_id).await? else {
            return Ok(None);
        };

        let mut conn = self.connection.clone();
        let keys = period_keys(period);

        let mut peers: Vec<String> = Vec::new();
        for key in keys {
            let members: Vec<String> = conn.zrangebyscore(key, score, score).await?;
            if !members.is_empty() {
                peers = members;
                break;
            }
        }

        // Equal-score members all report the rank of the last member in the
        // range, so insertion order never opens artificial gaps.
        let Some(last_peer) = peers.last() else {
            return Ok(None);
        };

        let mut reverse_rank: Option<i64> = None;
        for key in keys {
            let rank: Option<i64> = conn.zrevrank(key, last_peer).await?;
            if rank.is_some() {
                reverse_rank = rank;
                break;
            }
        }

        let Some(reverse_rank) = reverse_rank else {
            return Ok(None);
        };

        let rank = (reverse_rank + 1) as u64;
        let total = self.cardinality(period).await?;

        Ok(Some(RankInfo {
            score,
            rank,
            ratio: ratio_of(rank, total),
        }))
    }

    pub async fn cardinality(&self, period: Period) -> Result<u64, LeaderboardError> {
        let [primary, _] = period_keys(period);
        let mut conn = self.connection.clone();
        let total: u64 = conn.zcard(primary).await?;
        Ok(total)
    }

    pub async fn reverse_range_with_scores(
        &self,
        period: Period,
        start: i64,
        stop: i64,
    ) -> Result<Vec<(i64, i64)>, LeaderboardError> {
        let mut conn = self.connection.clone();

        for key in period_keys(period) {
            let entries: Vec<(String, f64)> = conn
                .zrevrange_withscores(key, start as isize, stop as isize)
                .await?;
            if !entries.is_empty() {
                return Ok(entries
                    .into_iter()
                    .filter_map(|(member, score)| {
                        member.parse::<i64>().ok().map(|id| (id, score as i64))
                    })
                    .collect());
            }
        }

        Ok(Vec::new())
    }
}
