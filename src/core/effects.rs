use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, warn};

use crate::cache::{keys as cache_keys, CacheStore};
use crate::db::operations::repair;
use crate::db::DatabaseProxy;
use crate::leaderboard::{Leaderboard, LeaderboardError, Period};
use crate::search::{ReviewDocument, SearchError, SearchIndex};

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_BASE_MS: u64 = 50;

/// Marker consumed exactly once by the next check-rank read.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewWrittenFlag {
    pub is_first: bool,
    pub written: bool,
}

/// Best-effort work that must only run after the relational transaction has
/// committed. The lifecycle coordinator collects these inside the
/// transaction and hands the list to `EffectRunner::process` afterwards, so
/// the store ordering invariant is enforced by construction.
#[derive(Debug, Clone)]
pub enum SideEffect {
    LeaderboardIncrement {
        period: Period,
        user_id: i64,
        delta: i64,
    },
    LeaderboardRemove {
        period: Period,
        user_id: i64,
    },
    SearchUpsert(Box<ReviewDocument>),
    SearchDelete {
        review_id: i64,
    },
    SetReviewWritten {
        user_id: i64,
        is_first: bool,
    },
    ClearReviewWritten {
        user_id: i64,
    },
}

#[derive(Debug, Error)]
enum EffectError {
    #[error(transparent)]
    Leaderboard(#[from] LeaderboardError),
    #[error(transparent)]
    Search(#[from] SearchError),
}

pub struct EffectRunner {
    proxy: Option<Arc<DatabaseProxy>>,
    leaderboard: Arc<Leaderboard>,
    search: Arc<SearchIndex>,
    cache: Arc<CacheStore>,
}

impl EffectRunner {
    pub fn new(
        proxy: Option<Arc<DatabaseProxy>>,
        leaderboard: Arc<Leaderboard>,
        search: Arc<SearchIndex>,
        cache: Arc<CacheStore>,
    ) -> Self {
        Self {
            proxy,
            leaderboard,
            search,
            cache,
        }
    }

    pub async fn process(&self, effects: Vec<SideEffect>) {
        for effect in effects {
            self.apply_with_retry(effect).await;
        }
    }

    async fn apply_with_retry(&self, effect: SideEffect) {
        let mut last_error = None;

        for attempt in 0..MAX_ATTEMPTS {
            match self.apply(&effect).await {
                Ok(()) => return,
                Err(err) => {
                    last_error = Some(err);
                    if attempt + 1 < MAX_ATTEMPTS {
                        tokio::time::sleep(backoff_delay(attempt)).await;
                    }
                }
            }
        }

        if let Some(err) = last_error {
            self.handle_exhausted(effect, err).await;
        }
    }

    async fn apply(&self, effect: &SideEffect) -> Result<(), EffectError> {
        match effect {
            SideEffect::LeaderboardIncrement {
                period,
                user_id,
                delta,
            } => {
                self.leaderboard.increment(*period, *user_id, *delta).await?;
            }
            SideEffect::LeaderboardRemove { period, user_id } => {
                self.leaderboard.remove(*period, *user_id).await?;
            }
            SideEffect::SearchUpsert(document) => {
                self.search.upsert(document).await?;
            }
            SideEffect::SearchDelete { review_id } => {
                self.search.delete(*review_id).await?;
            }
            SideEffect::SetReviewWritten { user_id, is_first } => {
                self.cache
                    .set(
                        &cache_keys::review_written_key(*user_id),
                        &ReviewWrittenFlag {
                            is_first: *is_first,
                            written: true,
                        },
                        cache_keys::REVIEW_WRITTEN_TTL,
                    )
                    .await;
            }
            SideEffect::ClearReviewWritten { user_id } => {
                self.cache
                    .delete(&cache_keys::review_written_key(*user_id))
                    .await;
            }
        }
        Ok(())
    }

    /// A ghost score must not survive: failed leaderboard work lands in the
    /// durable repair queue, where the repair is a full reset_rank. Search
    /// drift is re-synced out of band and only logged.
    async fn handle_exhausted(&self, effect: SideEffect, err: EffectError) {
        match &effect {
            SideEffect::LeaderboardIncrement {
                period, user_id, ..
            }
            | SideEffect::LeaderboardRemove { period, user_id } => {
                error!(
                    period = period.as_str(),
                    user_id,
                    error = %err,
                    "leaderboard effect failed, queueing repair"
                );
                self.enqueue_repair(*user_id, &format!("{:?}", effect)).await;
            }
            SideEffect::SearchUpsert(document) => {
                warn!(
                    review_id = document.review_id,
                    error = %err,
                    "search index upsert dropped"
                );
            }
            SideEffect::SearchDelete { review_id } => {
                warn!(review_id, error = %err, "search index delete dropped");
            }
            SideEffect::SetReviewWritten { user_id, .. }
            | SideEffect::ClearReviewWritten { user_id } => {
                warn!(user_id, error = %err, "pending reward flag write dropped");
            }
        }
    }

    async fn enqueue_repair(&self, user_id: i64, reason: &str) {
        let Some(proxy) = &self.proxy else {
            return;
        };
        if let Err(err) = repair::enqueue(proxy.pool(), user_id, reason).await {
            error!(user_id, error = %err, "failed to enqueue rank repair");
        }
    }
}

fn backoff_delay(attempt: u32) -> Duration {
    let base = BACKOFF_BASE_MS << attempt;
    let jitter = rand::rng().random_range(0..=base / 2);
    Duration::from_millis(base + jitter)
}
