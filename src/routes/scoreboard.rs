use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::leaderboard::Period;
use crate::response::json_error;
use crate::routes::get_query_param;
use crate::services::scoreboard::{self, ScoreboardError, ScoreboardUser, DEFAULT_LIMIT};
use crate::state::AppState;

#[derive(Serialize)]
struct SuccessResponse<T> {
    success: bool,
    data: T,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Paging {
    #[serde(skip_serializing_if = "Option::is_none")]
    next: Option<u32>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ScoreboardData {
    users: Vec<ScoreboardUser>,
    #[serde(skip_serializing_if = "Option::is_none")]
    users_count: Option<u64>,
    paging: Paging,
}

pub async fn list(State(state): State<AppState>, req: Request<Body>) -> Response {
    let query = req.uri().query().unwrap_or("");

    let period = match get_query_param(query, "period") {
        None => Period::All,
        Some(raw) => match Period::parse(&raw) {
            Some(period) => period,
            None => {
                return json_error(StatusCode::BAD_REQUEST, "BAD_REQUEST", "period不合法")
                    .into_response()
            }
        },
    };

    let cursor = get_query_param(query, "cursor").and_then(|v| v.parse::<u32>().ok());
    let limit = get_query_param(query, "limit")
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(DEFAULT_LIMIT);

    let Some(proxy) = state.db_proxy() else {
        return json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "SERVICE_UNAVAILABLE",
            "服务不可用",
        )
        .into_response();
    };

    match scoreboard::list(&proxy, &state.leaderboard(), period, cursor, limit).await {
        Ok(page) => Json(SuccessResponse {
            success: true,
            data: ScoreboardData {
                users: page.users,
                users_count: page.users_count,
                paging: Paging {
                    next: page.next_offset,
                },
            },
        })
        .into_response(),
        Err(err) => {
            match &err {
                ScoreboardError::Sql(sql_err) => {
                    tracing::warn!(error = %sql_err, "scoreboard sql failed")
                }
                ScoreboardError::Leaderboard(lb_err) => {
                    tracing::warn!(error = %lb_err, "scoreboard leaderboard read failed")
                }
            }
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "服务器内部错误",
            )
            .into_response()
        }
    }
}
