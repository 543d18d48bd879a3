use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::auth;
use crate::db::operations::{reviews as review_ops, users as user_ops};
use crate::response::json_error;
use crate::routes::{get_query_param, path_tail_id, split_body};
use crate::services::rank::{MilestoneResult, Reward};
use crate::services::reviews::{
    self, CreateReviewInput, ReviewError, UpdateReviewInput,
};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest {
    product_id: i64,
    rating: i32,
    contents: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    rating: Option<i32>,
    contents: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    review_id: i64,
    review_count: i64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReviewSummary {
    id: i64,
    rating: i32,
    contents: String,
    state: String,
    created_at: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckWrittenData {
    is_comment: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    review: Option<ReviewSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRankUser {
    id: i64,
    nickname: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckRankData {
    user: CheckRankUser,
    all: Option<MilestoneResult>,
    this_week: Option<MilestoneResult>,
    rewards: Option<Vec<Reward>>,
}

pub async fn create(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let Some(user_id) = auth::extract_user_id(&parts.headers) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "请先登录").into_response();
    };

    let payload: CreateRequest = match serde_json::from_slice(&body_bytes) {
        Ok(value) => value,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "请求参数不合法",
            )
            .into_response()
        }
    };

    let Some(ctx) = state.review_context() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    let input = CreateReviewInput {
        user_id,
        product_id: payload.product_id,
        rating: payload.rating,
        contents: payload.contents,
        ip_address: auth::client_ip(&parts.headers),
    };

    match reviews::create_review(&ctx, input).await {
        Ok(outcome) => (
            StatusCode::CREATED,
            Json(SuccessResponse {
                success: true,
                data: CreateData {
                    review_id: outcome.review_id,
                    review_count: outcome.review_count,
                },
            }),
        )
            .into_response(),
        Err(err) => handle_service_error(err),
    }
}

pub async fn update(State(state): State<AppState>, req: Request<Body>) -> Response {
    let (parts, body_bytes) = match split_body(req).await {
        Ok(value) => value,
        Err(res) => return res,
    };

    let Some(user_id) = auth::extract_user_id(&parts.headers) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "请先登录").into_response();
    };

    let Some(review_id) = path_tail_id(parts.uri.path()) else {
        return json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "点评ID不合法").into_response();
    };

    let payload: UpdateRequest = match serde_json::from_slice(&body_bytes) {
        Ok(value) => value,
        Err(_) => {
            return json_error(
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "请求参数不合法",
            )
            .into_response()
        }
    };

    let Some(ctx) = state.review_context() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    let input = UpdateReviewInput {
        user_id,
        review_id,
        rating: payload.rating,
        contents: payload.contents,
        ip_address: auth::client_ip(&parts.headers),
    };

    match reviews::update_review(&ctx, input).await {
        Ok(()) => Json(SuccessResponse {
            success: true,
            data: serde_json::json!({}),
        })
        .into_response(),
        Err(err) => handle_service_error(err),
    }
}

pub async fn destroy(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(user_id) = auth::extract_user_id(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "请先登录").into_response();
    };

    let Some(review_id) = path_tail_id(req.uri().path()) else {
        return json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "点评ID不合法").into_response();
    };

    let Some(ctx) = state.review_context() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    match reviews::delete_review(&ctx, user_id, review_id).await {
        Ok(()) => Json(SuccessResponse {
            success: true,
            data: serde_json::json!({}),
        })
        .into_response(),
        Err(err) => handle_service_error(err),
    }
}

/// Pre-write UX check: has this user already reviewed the product?
pub async fn check_written(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(user_id) = auth::extract_user_id(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "请先登录").into_response();
    };

    let query = req.uri().query().unwrap_or("");
    let Some(product_id) = get_query_param(query, "productId").and_then(|v| v.parse::<i64>().ok())
    else {
        return json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "productId不合法")
            .into_response();
    };

    let Some(proxy) = state.db_proxy() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    match review_ops::get_user_review_for_product(proxy.pool(), user_id, product_id).await {
        Ok(review) => Json(SuccessResponse {
            success: true,
            data: CheckWrittenData {
                is_comment: review.is_some(),
                review: review.map(|r| ReviewSummary {
                    id: r.id,
                    rating: r.rating,
                    contents: r.contents,
                    state: r.state,
                    created_at: r.created_at,
                }),
            },
        })
        .into_response(),
        Err(err) => {
            tracing::warn!(error = %err, "review check failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}

/// One-shot milestone read. Consumes the flag set by the last create and
/// reports at most one of the two period milestones, plus the rewards.
pub async fn check_rank(State(state): State<AppState>, req: Request<Body>) -> Response {
    let Some(user_id) = auth::extract_user_id(req.headers()) else {
        return json_error(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "请先登录").into_response();
    };

    let Some(ctx) = state.review_context() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    let user = match user_ops::get_user(ctx.proxy.pool(), user_id).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            return json_error(StatusCode::NOT_FOUND, "NOT_FOUND", "用户不存在").into_response()
        }
        Err(err) => {
            tracing::warn!(error = %err, "check rank user lookup failed");
            return json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response();
        }
    };

    match reviews::check_rank_update(&ctx, user_id).await {
        Ok(outcome) => Json(SuccessResponse {
            success: true,
            data: CheckRankData {
                user: CheckRankUser {
                    id: user.id,
                    nickname: user.nickname,
                },
                all: outcome.all,
                this_week: outcome.this_week,
                rewards: outcome.rewards,
            },
        })
        .into_response(),
        Err(err) => handle_service_error(err),
    }
}

fn handle_service_error(err: ReviewError) -> Response {
    match err {
        ReviewError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", msg).into_response()
        }
        ReviewError::NotFound(msg) => {
            json_error(StatusCode::NOT_FOUND, "NOT_FOUND", msg).into_response()
        }
        ReviewError::Conflict(msg) => {
            json_error(StatusCode::CONFLICT, "CONFLICT", msg).into_response()
        }
        ReviewError::Sql(sql_err) => {
            tracing::warn!(error = %sql_err, "review sql failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
        ReviewError::Points(points_err) => {
            tracing::error!(error = %points_err, "review points resolution failed");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}
