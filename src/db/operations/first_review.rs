use sqlx::{PgExecutor, Postgres, Row, Transaction};

/// Ledger of which user wrote the chronologically-first review of a product.
/// The primary key on "productId" guarantees at most one active record.
#[derive(Debug, Clone)]
pub struct FirstReviewRecord {
    pub product_id: i64,
    pub user_id: i64,
    pub timestamp: String,
}

/// Attempts to claim the first-review slot for a product. A concurrent
/// writer who already claimed it makes this a no-op and the caller is
/// simply not first; that race is expected and not an error.
pub async fn record_if_first(
    executor: impl PgExecutor<'_>,
    product_id: i64,
    user_id: i64,
    timestamp: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r#"INSERT INTO "review_first_log" ("productId","userId","timestamp")
           VALUES ($1, $2, $3)
           ON CONFLICT ("productId") DO NOTHING"#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(timestamp)
    .execute(executor)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn get_holder(
    executor: impl PgExecutor<'_>,
    product_id: i64,
) -> Result<Option<FirstReviewRecord>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT "productId","userId","timestamp"
           FROM "review_first_log" WHERE "productId" = $1 LIMIT 1"#,
    )
    .bind(product_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(|r| FirstReviewRecord {
        product_id: r.try_get("productId").unwrap_or_default(),
        user_id: r.try_get("userId").unwrap_or_default(),
        timestamp: r.try_get("timestamp").unwrap_or_default(),
    }))
}

pub async fn delete_record(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(r#"DELETE FROM "review_first_log" WHERE "productId" = $1"#)
        .bind(product_id)
        .execute(&mut **tx)
        .await?;
    Ok(())
}

pub async fn insert_record(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
    user_id: i64,
    timestamp: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"INSERT INTO "review_first_log" ("productId","userId","timestamp")
           VALUES ($1, $2, $3)"#,
    )
    .bind(product_id)
    .bind(user_id)
    .bind(timestamp)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

pub async fn list_timestamps_for_user(
    executor: impl PgExecutor<'_>,
    user_id: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "timestamp" FROM "review_first_log" WHERE "userId" = $1"#,
    )
    .bind(user_id)
    .fetch_all(executor)
    .await?;

    Ok(rows
        .iter()
        .filter_map(|row| row.try_get("timestamp").ok())
        .collect())
}
