use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

pub const REVIEW_POINT: &str = "review_point";
pub const MULTIPLE_BONUS_POINT: &str = "multiple_bonus_point";
pub const FIRST_BONUS_POINT: &str = "first_bonus_point";

/// One named point value with an optional time-boxed promotional override.
/// Externally administered; read-only here.
#[derive(Debug, Clone)]
pub struct PointRow {
    pub name: String,
    pub point: i64,
    pub event_point: Option<i64>,
    pub event_start: Option<DateTime<Utc>>,
    pub event_end: Option<DateTime<Utc>>,
}

pub async fn get_point_rows(pool: &PgPool) -> Result<Vec<PointRow>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT "name","point","eventPoint","eventStartDate","eventEndDate"
           FROM "points" WHERE "name" IN ($1, $2, $3)"#,
    )
    .bind(REVIEW_POINT)
    .bind(MULTIPLE_BONUS_POINT)
    .bind(FIRST_BONUS_POINT)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|row| PointRow {
            name: row.try_get("name").unwrap_or_default(),
            point: row.try_get::<i32, _>("point").unwrap_or(0) as i64,
            event_point: row.try_get::<Option<i32>, _>("eventPoint").ok().flatten().map(i64::from),
            event_start: row.try_get("eventStartDate").ok(),
            event_end: row.try_get("eventEndDate").ok(),
        })
        .collect())
}
