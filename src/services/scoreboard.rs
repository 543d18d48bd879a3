use std::collections::HashMap;

use serde::Serialize;
use thiserror::Error;

use crate::db::operations::users::{self, UserBrief};
use crate::db::DatabaseProxy;
use crate::leaderboard::{Leaderboard, LeaderboardError, Period};

pub const DEFAULT_LIMIT: u32 = 20;
pub const MAX_LIMIT: u32 = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardUser {
    pub id: i64,
    pub nickname: String,
    pub profile_image: Option<String>,
    pub rank: u64,
    pub score: i64,
    pub ratio: u64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreboardPage {
    pub users: Vec<ScoreboardUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub users_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_offset: Option<u32>,
}

#[derive(Debug, Error)]
pub enum ScoreboardError {
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
}

/// Consumer-facing "users ranked by score" page over the shared store.
/// Ranks come from the tie-aware per-member lookup rather than the page
/// offset, so equal scores display equal ranks across page boundaries.
pub async fn list(
    proxy: &DatabaseProxy,
    leaderboard: &Leaderboard,
    period: Period,
    cursor: Option<u32>,
    limit: u32,
) -> Result<ScoreboardPage, ScoreboardError> {
    let limit = limit.clamp(1, MAX_LIMIT);
    let page_cursor = cursor.unwrap_or(1).max(1);

    let start = i64::from((page_cursor - 1) * limit);
    let stop = i64::from(page_cursor * limit);

    let entries = leaderboard
        .reverse_range_with_scores(period, start, stop)
        .await?;

    let has_more = entries.len() as u32 == limit + 1;
    let page = &entries[..entries.len().min(limit as usize)];

    let ids: Vec<i64> = page.iter().map(|(id, _)| *id).collect();
    let briefs: HashMap<i64, UserBrief> = users::get_users_brief(proxy.pool(), &ids)
        .await?
        .into_iter()
        .map(|brief| (brief.id, brief))
        .collect();

    let mut listed = Vec::with_capacity(page.len());
    for (user_id, _) in page {
        let Some(brief) = briefs.get(user_id) else {
            continue;
        };
        let Some(info) = leaderboard.rank_info(period, *user_id).await? else {
            continue;
        };

        listed.push(ScoreboardUser {
            id: brief.id,
            nickname: brief.nickname.clone(),
            profile_image: brief.profile_image.clone(),
            rank: info.rank,
            score: info.score,
            ratio: info.ratio,
        });
    }

    let users_count = if cursor.is_none() {
        Some(leaderboard.cardinality(period).await?)
    } else {
        None
    };

    Ok(ScoreboardPage {
        users: listed,
        users_count,
        next_offset: has_more.then(|| page_cursor + 1),
    })
}
