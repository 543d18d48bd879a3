use serde::Serialize;
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction};

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: i64,
    pub nickname: String,
    pub profile_image: Option<String>,
    pub review_count: i32,
    pub score: i32,
    pub like_count: i32,
    pub is_blinded: i32,
    pub is_black: i32,
    pub is_active: i32,
}

impl UserRow {
    /// Whether this user's reviews contribute to the leaderboards.
    pub fn is_scorable(&self) -> bool {
        self.is_active == 1 && self.is_blinded == 0 && self.is_black == 0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserBrief {
    pub id: i64,
    pub nickname: String,
    pub profile_image: Option<String>,
}

pub async fn get_user(pool: &PgPool, user_id: i64) -> Result<Option<UserRow>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "id","nickname","profileImage","reviewCount","score","likeCount",
           "isBlinded","isBlack","isActive"
           FROM "users" WHERE "id" = $1 LIMIT 1"#,
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| map_user_row(&r)))
}

pub async fn get_users_brief(
    pool: &PgPool,
    user_ids: &[i64],
) -> Result<Vec<UserBrief>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(Vec::new());
    }

    let mut qb = QueryBuilder::<Postgres>::new(
        r#"SELECT "id","nickname","profileImage" FROM "users" WHERE "id" IN ("#,
    );
    let mut sep = qb.separated(", ");
    for id in user_ids {
        sep.push_bind(id);
    }
    sep.push_unseparated(")");

    let rows = qb.build().fetch_all(pool).await?;

    Ok(rows
        .iter()
        .map(|row| UserBrief {
            id: row.try_get("id").unwrap_or_default(),
            nickname: row.try_get("nickname").unwrap_or_default(),
            profile_image: row.try_get("profileImage").ok(),
        })
        .collect())
}

/// Adjusts the per-user review/activity counters inside the lifecycle
/// transaction. `delta` is +1 on create and -1 on delete.
pub async fn adjust_review_counters(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    delta: i32,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "users"
           SET "reviewCount" = "reviewCount" + $1, "score" = "score" + $1
           WHERE "id" = $2"#,
    )
    .bind(delta)
    .bind(user_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

fn map_user_row(row: &sqlx::postgres::PgRow) -> UserRow {
    UserRow {
        id: row.try_get("id").unwrap_or_default(),
        nickname: row.try_get("nickname").unwrap_or_default(),
        profile_image: row.try_get("profileImage").ok(),
        review_count: row.try_get("reviewCount").unwrap_or(0),
        score: row.try_get("score").unwrap_or(0),
        like_count: row.try_get("likeCount").unwrap_or(0),
        is_blinded: row.try_get("isBlinded").unwrap_or(0),
        is_black: row.try_get("isBlack").unwrap_or(0),
        is_active: row.try_get("isActive").unwrap_or(1),
    }
}
