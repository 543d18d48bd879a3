use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{error, warn};

use crate::cache::{keys as cache_keys, CacheStore};
use crate::core::effects::{EffectRunner, ReviewWrittenFlag, SideEffect};
use crate::core::time;
use crate::core::{
    EventBus, ReviewCreatedPayload, ReviewDeletedPayload, ReviewEvent, ReviewUpdatedPayload,
};
use crate::db::operations::products::{GoodsInfo, ProductRow};
use crate::db::operations::reviews::{ReviewRow, STATE_BLINDED, STATE_UNDER_REVIEW};
use crate::db::operations::users::UserRow;
use crate::db::operations::{first_review, products, repair, reviews, tags, users};
use crate::db::DatabaseProxy;
use crate::leaderboard::{Leaderboard, Period};
use crate::search::{GoodsDocumentInfo, ReviewDocument, SearchIndex};
use crate::services::points::{self, PointsError, ReviewPoints};
use crate::services::rank::{self, MilestoneResult, Reward};
use crate::services::score_reset::{self, ResetError};

#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
    #[error(transparent)]
    Points(#[from] PointsError),
}

/// Stores the lifecycle coordinator touches. Bundled so routes can hand the
/// whole set over in one argument and tests can assemble in-memory fakes.
#[derive(Clone)]
pub struct ReviewContext {
    pub proxy: Arc<DatabaseProxy>,
    pub leaderboard: Arc<Leaderboard>,
    pub search: Arc<SearchIndex>,
    pub cache: Arc<CacheStore>,
    pub events: Arc<EventBus>,
}

impl ReviewContext {
    fn effect_runner(&self) -> EffectRunner {
        EffectRunner::new(
            Some(Arc::clone(&self.proxy)),
            Arc::clone(&self.leaderboard),
            Arc::clone(&self.search),
            Arc::clone(&self.cache),
        )
    }
}

#[derive(Debug, Clone)]
pub struct CreateReviewInput {
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i32,
    pub contents: String,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreateReviewOutcome {
    pub review_id: i64,
    pub review_count: i64,
}

#[derive(Debug, Clone)]
pub struct UpdateReviewInput {
    pub user_id: i64,
    pub review_id: i64,
    pub rating: Option<i32>,
    pub contents: Option<String>,
    pub ip_address: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RankCheckOutcome {
    pub all: Option<MilestoneResult>,
    pub this_week: Option<MilestoneResult>,
    pub rewards: Option<Vec<Reward>>,
}

impl RankCheckOutcome {
    fn empty() -> Self {
        Self {
            all: None,
            this_week: None,
            rewards: None,
        }
    }
}

/// Hashtags embedded in the review body, order-preserving and deduplicated.
pub fn extract_tags(contents: &str) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();

    for token in contents.split_whitespace() {
        let Some(rest) = token.strip_prefix('#') else {
            continue;
        };
        let tag: String = rest
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '.' || *c == '_')
            .collect();
        if !tag.is_empty() && !found.contains(&tag) {
            found.push(tag);
        }
    }

    found
}

pub async fn create_review(
    ctx: &ReviewContext,
    input: CreateReviewInput,
) -> Result<CreateReviewOutcome, ReviewError> {
    let pool = ctx.proxy.pool();

    let user = users::get_user(pool, input.user_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("用户不存在".to_string()))?;

    if !(1..=5).contains(&input.rating) {
        return Err(ReviewError::Validation("评分必须在1-5之间".to_string()));
    }
    if input.contents.trim().is_empty() {
        return Err(ReviewError::Validation("点评内容不能为空".to_string()));
    }

    let product = products::get_display_product(pool, input.product_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("商品不存在".to_string()))?;

    if reviews::get_user_review_for_product(pool, input.user_id, input.product_id)
        .await?
        .is_some()
    {
        return Err(ReviewError::Conflict("已经点评过该商品".to_string()));
    }

    // Clean slate before scoring: rebuild this user's leaderboard entries
    // from history so any prior corruption cannot compound. Leaderboard
    // trouble is absorbed here; the relational write must not depend on it.
    match score_reset::reset_rank(&ctx.proxy, &ctx.leaderboard, input.user_id).await {
        Ok(()) => {}
        Err(ResetError::Sql(err)) => return Err(ReviewError::Sql(err)),
        Err(ResetError::Points(err)) => return Err(ReviewError::Points(err)),
        Err(ResetError::Leaderboard(err)) => {
            warn!(user_id = input.user_id, error = %err, "pre-create reset failed");
            enqueue_repair(&ctx.proxy, input.user_id, "pre-create reset").await;
        }
    }

    let now = time::sortable_now();
    let tag_names = extract_tags(&input.contents);
    let tag_joined = tag_names.join(",");

    let mut tx = pool.begin().await?;

    let review_id = match reviews::insert_review(
        &mut tx,
        input.user_id,
        input.product_id,
        input.rating,
        &input.contents,
        input.ip_address.as_deref(),
        &now,
    )
    .await
    {
        Ok(id) => id,
        Err(err) if reviews::is_unique_violation(&err) => {
            // Lost the uniqueness race against a concurrent create.
            return Err(ReviewError::Conflict("已经点评过该商品".to_string()));
        }
        Err(err) => return Err(ReviewError::Sql(err)),
    };

    users::adjust_review_counters(&mut tx, input.user_id, 1).await?;
    tags::attach_tags(&mut tx, review_id, &tag_names, &now).await?;
    reviews::set_review_tag(&mut tx, review_id, &tag_joined).await?;

    // This review is a first-review candidate when it is the only displayed
    // review of the product. The ledger's primary key settles concurrent
    // claims; losing that race just means not-first.
    let product_review_count = reviews::count_reviews_for_product(&mut *tx, input.product_id).await?;
    let is_first = if product_review_count == 1 {
        first_review::record_if_first(&mut *tx, input.product_id, input.user_id, &now).await?
    } else {
        false
    };

    tx.commit().await?;

    let goods = products::get_goods_info(pool, input.product_id).await.ok().flatten();
    let document = build_document(
        review_id,
        input.rating,
        &input.contents,
        "N",
        true,
        0,
        &now,
        &tag_joined,
        &user,
        &product,
        goods,
    );

    ctx.effect_runner()
        .process(vec![
            SideEffect::SearchUpsert(Box::new(document)),
            SideEffect::SetReviewWritten {
                user_id: input.user_id,
                is_first,
            },
        ])
        .await;

    ctx.events.publish(ReviewEvent::ReviewCreated(ReviewCreatedPayload {
        review_id,
        user_id: input.user_id,
        product_id: input.product_id,
        rating: input.rating,
        timestamp: Utc::now(),
    }));

    let review_count = reviews::count_active_reviews(pool, input.user_id).await?;

    Ok(CreateReviewOutcome {
        review_id,
        review_count,
    })
}

pub async fn update_review(ctx: &ReviewContext, input: UpdateReviewInput) -> Result<(), ReviewError> {
    let pool = ctx.proxy.pool();

    let user = users::get_user(pool, input.user_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("用户不存在".to_string()))?;

    let review = reviews::get_review_for_user(pool, input.review_id, input.user_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("点评不存在".to_string()))?;

    if let Some(rating) = input.rating {
        if !(1..=5).contains(&rating) {
            return Err(ReviewError::Validation("评分必须在1-5之间".to_string()));
        }
    }

    let product = products::get_display_product(pool, review.product_id).await?;

    // A blinded review edited by its author goes back under review; it never
    // returns to normal without moderation.
    let next_state = if review.state == STATE_BLINDED {
        STATE_UNDER_REVIEW
    } else {
        review.state.as_str()
    };

    let now = time::sortable_now();
    let new_tags = input.contents.as_deref().map(extract_tags);

    let mut tx = pool.begin().await?;

    reviews::update_review_fields(
        &mut tx,
        input.review_id,
        input.rating,
        input.contents.as_deref(),
        next_state,
        input.ip_address.as_deref(),
    )
    .await?;

    let tag_joined = match &new_tags {
        Some(tag_names) => {
            let joined = tag_names.join(",");
            // Identical tag sets leave the usage counts untouched.
            if Some(joined.as_str()) != review.tag.as_deref() {
                tags::detach_tags(&mut tx, input.review_id, &now).await?;
                tags::attach_tags(&mut tx, input.review_id, tag_names, &now).await?;
                reviews::set_review_tag(&mut tx, input.review_id, &joined).await?;
            }
            joined
        }
        None => review.tag.clone().unwrap_or_default(),
    };

    tx.commit().await?;

    // Score and leaderboard state are untouched by updates; only the search
    // mirror follows the new contents.
    if let Some(product) = product {
        let goods = products::get_goods_info(pool, review.product_id).await.ok().flatten();
        let document = build_document(
            review.id,
            input.rating.unwrap_or(review.rating),
            input.contents.as_deref().unwrap_or(&review.contents),
            next_state,
            review.is_display,
            review.like_count,
            &review.created_at,
            &tag_joined,
            &user,
            &product,
            goods,
        );
        ctx.effect_runner()
            .process(vec![SideEffect::SearchUpsert(Box::new(document))])
            .await;
    }

    ctx.events.publish(ReviewEvent::ReviewUpdated(ReviewUpdatedPayload {
        review_id: input.review_id,
        user_id: input.user_id,
        product_id: review.product_id,
        rating: input.rating,
        timestamp: Utc::now(),
    }));

    Ok(())
}

pub async fn delete_review(
    ctx: &ReviewContext,
    user_id: i64,
    review_id: i64,
) -> Result<(), ReviewError> {
    let pool = ctx.proxy.pool();

    let user = users::get_user(pool, user_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("用户不存在".to_string()))?;

    let review = reviews::get_review_for_user(pool, review_id, user_id)
        .await?
        .ok_or_else(|| ReviewError::NotFound("点评不存在".to_string()))?;

    let resolved = points::resolve(&ctx.proxy).await?;
    let week_start = time::week_window_start_sortable();
    let now = time::sortable_now();

    let mut tx = pool.begin().await?;

    reviews::delete_blind_history(&mut tx, review_id).await?;
    reviews::delete_likes_given(&mut tx, user_id, review.product_id).await?;

    // Captured before the row disappears: the ledger holder and the two
    // oldest reviews of the product, this one included. Index 1 is the
    // reassignment target when the holder's review is the one going away.
    let holder = first_review::get_holder(&mut *tx, review.product_id).await?;
    let was_holder = holder.as_ref().is_some_and(|record| record.user_id == user_id);
    let oldest_two = reviews::two_oldest_for_product(&mut *tx, review.product_id).await?;

    reviews::delete_review_row(&mut tx, review_id).await?;
    users::adjust_review_counters(&mut tx, user_id, -1).await?;
    tags::detach_tags(&mut tx, review_id, &now).await?;

    let remaining = reviews::count_active_reviews(&mut *tx, user_id).await?;
    let remaining_week =
        reviews::count_active_reviews_since(&mut *tx, user_id, &week_start).await?;

    let mut reassigned: Option<&ReviewRow> = None;
    if was_holder {
        first_review::delete_record(&mut tx, review.product_id).await?;

        if let Some(next_oldest) = oldest_two.get(1) {
            first_review::insert_record(
                &mut tx,
                review.product_id,
                next_oldest.user_id,
                &next_oldest.created_at,
            )
            .await?;
            reassigned = Some(next_oldest);
        }
    }

    tx.commit().await?;

    // The ordered-score store is not transactional with the commit above;
    // reversal happens strictly afterwards and is repaired via reset_rank
    // when it cannot be applied.
    let mut effects: Vec<SideEffect> = Vec::new();

    // With no active review left there is nothing a pending flag could
    // legitimately pay out for.
    if remaining == 0 {
        effects.push(SideEffect::ClearReviewWritten { user_id });
    }

    if review.is_active() && user.is_scorable() {
        let removed_score = rank::score_delta(&resolved, remaining % 3 == 0, was_holder);

        if remaining == 0 {
            effects.push(SideEffect::LeaderboardRemove {
                period: Period::All,
                user_id,
            });
        } else {
            effects.push(SideEffect::LeaderboardIncrement {
                period: Period::All,
                user_id,
                delta: -removed_score,
            });
        }

        if review.created_at.as_str() > week_start.as_str() {
            if remaining_week == 0 {
                effects.push(SideEffect::LeaderboardRemove {
                    period: Period::ThisWeek,
                    user_id,
                });
            } else {
                effects.push(SideEffect::LeaderboardIncrement {
                    period: Period::ThisWeek,
                    user_id,
                    delta: -removed_score,
                });
            }
        }
    }

    if let Some(next_oldest) = reassigned {
        effects.push(SideEffect::LeaderboardIncrement {
            period: Period::All,
            user_id: next_oldest.user_id,
            delta: resolved.first_bonus_point,
        });
        if next_oldest.created_at.as_str() > week_start.as_str() {
            effects.push(SideEffect::LeaderboardIncrement {
                period: Period::ThisWeek,
                user_id: next_oldest.user_id,
                delta: resolved.first_bonus_point,
            });
        }
    }

    effects.push(SideEffect::SearchDelete { review_id });

    ctx.effect_runner().process(effects).await;

    ctx.events.publish(ReviewEvent::ReviewDeleted(ReviewDeletedPayload {
        review_id,
        user_id,
        product_id: review.product_id,
        timestamp: Utc::now(),
    }));

    Ok(())
}

/// One-shot milestone check. Consumes the pending-reward flag set by the
/// last create; scoring of that review happens here, once, per period.
pub async fn check_rank_update(
    ctx: &ReviewContext,
    user_id: i64,
) -> Result<RankCheckOutcome, ReviewError> {
    let pool = ctx.proxy.pool();

    let flag: Option<ReviewWrittenFlag> = ctx
        .cache
        .take(&cache_keys::review_written_key(user_id))
        .await;
    let Some(flag) = flag.filter(|flag| flag.written) else {
        return Ok(RankCheckOutcome::empty());
    };

    let review_count = reviews::count_active_reviews(pool, user_id).await?;
    if review_count == 0 {
        // The review behind the flag is already gone; absence, not a zero
        // entry, represents no score.
        return Ok(RankCheckOutcome::empty());
    }
    let is_multiple = review_count % 3 == 0;

    let resolved = points::resolve(&ctx.proxy).await?;

    let mut all = apply_rank_update(ctx, Period::All, user_id, is_multiple, flag.is_first, &resolved).await;
    let mut this_week =
        apply_rank_update(ctx, Period::ThisWeek, user_id, is_multiple, flag.is_first, &resolved).await;

    let rewards = Some(rank::get_rewards(&resolved, is_multiple, flag.is_first));

    // Only the better (numerically lower) rank is shown; ties go to the
    // weekly board.
    if let (Some(week_rank), Some(all_rank)) = (&this_week, &all) {
        if week_rank.rank <= all_rank.rank {
            all = None;
        } else {
            this_week = None;
        }
    }

    Ok(RankCheckOutcome {
        all,
        this_week,
        rewards,
    })
}

async fn apply_rank_update(
    ctx: &ReviewContext,
    period: Period,
    user_id: i64,
    is_multiple: bool,
    is_first: bool,
    resolved: &ReviewPoints,
) -> Option<MilestoneResult> {
    match rank::update_rank_point(&ctx.leaderboard, period, user_id, is_multiple, is_first, resolved)
        .await
    {
        Ok(result) => result,
        Err(err) => {
            error!(
                period = period.as_str(),
                user_id,
                error = %err,
                "rank update failed, queueing repair"
            );
            enqueue_repair(&ctx.proxy, user_id, "check-rank scoring").await;
            None
        }
    }
}

async fn enqueue_repair(proxy: &DatabaseProxy, user_id: i64, reason: &str) {
    if let Err(err) = repair::enqueue(proxy.pool(), user_id, reason).await {
        error!(user_id, error = %err, "failed to enqueue rank repair");
    }
}

#[allow(clippy::too_many_arguments)]
fn build_document(
    review_id: i64,
    rating: i32,
    contents: &str,
    state: &str,
    is_display: bool,
    like_count: i32,
    created_at: &str,
    tag: &str,
    user: &UserRow,
    product: &ProductRow,
    goods: Option<GoodsInfo>,
) -> ReviewDocument {
    ReviewDocument {
        review_id,
        contents: contents.to_string(),
        rating,
        like_count,
        is_display,
        state: state.to_string(),
        created_at: created_at.to_string(),
        tag: tag.to_string(),
        user_id: user.id,
        nickname: user.nickname.clone(),
        user_is_blinded: user.is_blinded,
        product_id: product.id,
        product_name: product.name.clone(),
        brand_name: product.brand_name.clone(),
        product_is_display: product.is_display,
        goods_info: goods.map(|info| GoodsDocumentInfo {
            goods_count: info.goods_count,
            min_price: info.min_price,
            max_price: info.max_price,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_hash_tags_in_order() {
        let tags = extract_tags("很好用 #保湿 平价 #保湿 #学生党 推荐");
        assert_eq!(tags, vec!["保湿".to_string(), "学生党".to_string()]);
    }

    #[test]
    fn strips_punctuation_from_tags() {
        let tags = extract_tags("#v1.5真不错! #好物");
        assert_eq!(tags, vec!["v1.5真不错".to_string(), "好物".to_string()]);
    }

    #[test]
    fn ignores_bare_hash_and_plain_words() {
        let tags = extract_tags("# 没有标签 nothing here");
        assert!(tags.is_empty());
    }
}
