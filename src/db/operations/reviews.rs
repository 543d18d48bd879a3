use sqlx::postgres::PgRow;
use sqlx::{PgExecutor, Postgres, Row, Transaction};

pub const STATE_NORMAL: &str = "N";
pub const STATE_BLINDED: &str = "B";
pub const STATE_UNDER_REVIEW: &str = "C";

#[derive(Debug, Clone)]
pub struct ReviewRow {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i32,
    pub contents: String,
    pub state: String,
    pub is_display: bool,
    pub when_seceded: i32,
    pub like_count: i32,
    pub tag: Option<String>,
    pub created_at: String,
}

impl ReviewRow {
    /// Active reviews are the only ones that ever contributed a score.
    pub fn is_active(&self) -> bool {
        self.state == STATE_NORMAL && self.when_seceded == 0 && self.is_display
    }
}

const REVIEW_COLUMNS: &str = r#""id","userId","productId","rating","contents","state",
    "isDisplay","whenSeceded","likeCount","tag","createdAt""#;

pub async fn get_review_for_user(
    executor: impl PgExecutor<'_>,
    review_id: i64,
    user_id: i64,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {REVIEW_COLUMNS} FROM "reviews"
           WHERE "id" = $1 AND "userId" = $2 AND "isDisplay" = TRUE LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(review_id)
        .bind(user_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|r| map_review_row(&r)))
}

pub async fn get_user_review_for_product(
    executor: impl PgExecutor<'_>,
    user_id: i64,
    product_id: i64,
) -> Result<Option<ReviewRow>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {REVIEW_COLUMNS} FROM "reviews"
           WHERE "userId" = $1 AND "productId" = $2 AND "isDisplay" = TRUE LIMIT 1"#
    );
    let row = sqlx::query(&sql)
        .bind(user_id)
        .bind(product_id)
        .fetch_optional(executor)
        .await?;
    Ok(row.map(|r| map_review_row(&r)))
}

pub async fn insert_review(
    tx: &mut Transaction<'_, Postgres>,
    user_id: i64,
    product_id: i64,
    rating: i32,
    contents: &str,
    ip_address: Option<&str>,
    created_at: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO "reviews"
           ("userId","productId","rating","contents","state","isDisplay",
            "whenSeceded","likeCount","ipAddress","createdAt")
           VALUES ($1, $2, $3, $4, 'N', TRUE, 0, 0, $5, $6)
           RETURNING "id""#,
    )
    .bind(user_id)
    .bind(product_id)
    .bind(rating)
    .bind(contents)
    .bind(ip_address)
    .bind(created_at)
    .fetch_one(&mut **tx)
    .await?;

    row.try_get("id")
}

pub async fn update_review_fields(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
    rating: Option<i32>,
    contents: Option<&str>,
    state: &str,
    ip_address: Option<&str>,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "reviews"
           SET "rating" = COALESCE($1, "rating"),
               "contents" = COALESCE($2, "contents"),
               "state" = $3,
               "ipAddress" = COALESCE($4, "ipAddress")
           WHERE "id" = $5"#,
    )
    .bind(rating)
    .bind(contents)
    .bind(state)
    .bind(ip_address)
    .bind(review_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn set_review_tag(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
    tag: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"UPDATE "reviews" SET "tag" = $1 WHERE "id" = $2"#)
        .bind(tag)
        .bind(review_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn delete_review_row(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "reviews" WHERE "id" = $1"#)
        .bind(review_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn delete_blind_history(
    tx: &mut Transaction<'_, Postgres>,
    review_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "review_blind_log" WHERE "reviewId" = $1"#)
        .bind(review_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

/// Removes the likes this user received on the product's review. These rows
/// reference the (writer, product) pair rather than the review id.
pub async fn delete_likes_given(
    tx: &mut Transaction<'_, Postgres>,
    writer_id: i64,
    product_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "review_likes" WHERE "writerId" = $1 AND "productId" = $2"#)
        .bind(writer_id)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn count_active_reviews(
    executor: impl PgExecutor<'_>,
    user_id: i64,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS "count" FROM "reviews"
           WHERE "userId" = $1 AND "state" = 'N' AND "whenSeceded" = 0 AND "isDisplay" = TRUE"#,
    )
    .bind(user_id)
    .fetch_one(executor)
    .await?;
    row.try_get("count")
}

pub async fn count_active_reviews_since(
    executor: impl PgExecutor<'_>,
    user_id: i64,
    since: &str,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS "count" FROM "reviews"
           WHERE "userId" = $1 AND "state" = 'N' AND "whenSeceded" = 0 AND "isDisplay" = TRUE
             AND "createdAt" > $2"#,
    )
    .bind(user_id)
    .bind(since)
    .fetch_one(executor)
    .await?;
    row.try_get("count")
}

pub async fn count_reviews_for_product(
    executor: impl PgExecutor<'_>,
    product_id: i64,
) -> Result<i64, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT COUNT(*) AS "count" FROM "reviews"
           WHERE "productId" = $1 AND "isDisplay" = TRUE"#,
    )
    .bind(product_id)
    .fetch_one(executor)
    .await?;
    row.try_get("count")
}

/// Creation timestamps of every review that still counts toward the user's
/// score, joined against the user visibility conditions. This is the durable
/// history `reset_rank` rebuilds from.
pub async fn list_scorable_created_at(
    executor: impl PgExecutor<'_>,
    user_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT r."createdAt" FROM "reviews" r
           JOIN "users" u ON u."id" = r."userId"
           WHERE r."userId" = $1 AND r."state" = 'N' AND r."whenSeceded" = 0
             AND r."isDisplay" = TRUE
             AND u."isBlinded" = 0 AND u."isBlack" = 0 AND u."isActive" = 1"#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| row.try_get("createdAt").ok())
        .collect())
}

/// The two chronologically-oldest displayed reviews of a product, the
/// holder's own review included. Index 1, when present, is the reassignment
/// target for the first-review ledger.
pub async fn two_oldest_for_product(
    executor: impl PgExecutor<'_>,
    product_id: i64,
) -> Result<Vec<ReviewRow>, sqlx::Error> {
    let sql = format!(
        r#"SELECT {REVIEW_COLUMNS} FROM "reviews"
           WHERE "productId" = $1 AND "isDisplay" = TRUE
           ORDER BY "createdAt" ASC LIMIT 2"#
    );
    let rows = sqlx::query(&sql)
        .bind(product_id)
        .fetch_all(executor)
        .await?;
    Ok(rows.iter().map(map_review_row).collect())
}

pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

fn map_review_row(row: &PgRow) -> ReviewRow {
    ReviewRow {
        id: row.try_get("id").unwrap_or_default(),
        user_id: row.try_get("userId").unwrap_or_default(),
        product_id: row.try_get("productId").unwrap_or_default(),
        rating: row.try_get("rating").unwrap_or(0),
        contents: row.try_get("contents").unwrap_or_default(),
        state: row.try_get("state").unwrap_or_else(|_| STATE_NORMAL.to_string()),
        is_display: row.try_get("isDisplay").unwrap_or(false),
        when_seceded: row.try_get("whenSeceded").unwrap_or(0),
        like_count: row.try_get("likeCount").unwrap_or(0),
        tag: row.try_get("tag").ok(),
        created_at: row.try_get("createdAt").unwrap_or_default(),
    }
}
