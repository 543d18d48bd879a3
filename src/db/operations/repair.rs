use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use tracing::warn;

const PROCESSING_TIMEOUT_SECS: i64 = 300;
pub const MAX_RETRY: i32 = 5;

/// A queued leaderboard repair. The repair action is always a full
/// `reset_rank` of the user, so duplicate rows for the same user are
/// harmless and the queue never needs a uniqueness constraint.
#[derive(Debug)]
pub struct RepairTask {
    pub id: String,
    pub user_id: i64,
    pub reason: String,
    pub due_at: DateTime<Utc>,
    pub last_error: Option<String>,
}

pub async fn enqueue(pool: &PgPool, user_id: i64, reason: &str) -> Result<(), sqlx::Error> {
    let id = uuid::Uuid::new_v4().to_string();
    sqlx::query(
        r#"INSERT INTO "rank_repair_queue"
           ("id","userId","reason","status","dueAt","createdAt","updatedAt")
           VALUES ($1, $2, $3, 'PENDING', NOW(), NOW(), NOW())"#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(reason)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn recover_stuck(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let timeout_threshold = Utc::now() - chrono::Duration::seconds(PROCESSING_TIMEOUT_SECS);

    let result = sqlx::query(
        r#"UPDATE "rank_repair_queue"
           SET "status" = 'PENDING', "updatedAt" = NOW()
           WHERE "status" = 'PROCESSING' AND "updatedAt" < $1"#,
    )
    .bind(timeout_threshold)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub async fn claim_pending(pool: &PgPool, limit: i64) -> Result<Vec<RepairTask>, sqlx::Error> {
    let now = Utc::now();

    let rows = sqlx::query(
        r#"WITH claimed AS (
               SELECT "id" FROM "rank_repair_queue"
               WHERE "status" = 'PENDING' AND "dueAt" <= $1
               ORDER BY "dueAt" ASC
               LIMIT $2
               FOR UPDATE SKIP LOCKED
           )
           UPDATE "rank_repair_queue" q
           SET "status" = 'PROCESSING', "updatedAt" = $1
           FROM claimed
           WHERE q."id" = claimed."id"
           RETURNING q."id", q."userId", q."reason", q."dueAt", q."lastError""#,
    )
    .bind(now)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let tasks = rows
        .into_iter()
        .filter_map(|row| {
            let id: Result<String, _> = row.try_get("id");
            let user_id: Result<i64, _> = row.try_get("userId");
            let due_at: Result<DateTime<Utc>, _> = row.try_get("dueAt");

            match (id, user_id, due_at) {
                (Ok(id), Ok(user_id), Ok(due_at)) => Some(RepairTask {
                    id,
                    user_id,
                    reason: row.try_get("reason").unwrap_or_default(),
                    due_at,
                    last_error: row.try_get("lastError").ok(),
                }),
                _ => {
                    warn!("failed to parse rank repair row, skipping");
                    None
                }
            }
        })
        .collect();

    Ok(tasks)
}

pub async fn mark_done(pool: &PgPool, task_id: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE "rank_repair_queue"
           SET "status" = 'DONE', "lastError" = NULL, "updatedAt" = NOW()
           WHERE "id" = $1"#,
    )
    .bind(task_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_failed(
    pool: &PgPool,
    task: &RepairTask,
    retry_count: i32,
    error_msg: &str,
) -> Result<bool, sqlx::Error> {
    let next_retry = retry_count + 1;
    let is_final = next_retry >= MAX_RETRY;
    let next_status = if is_final { "FAILED" } else { "PENDING" };
    let backoff_minutes = std::cmp::min(5, next_retry as i64);
    let next_due = if is_final {
        task.due_at
    } else {
        Utc::now() + chrono::Duration::minutes(backoff_minutes)
    };
    let full_error = format!("Retry {}/{}: {}", next_retry, MAX_RETRY, error_msg);

    sqlx::query(
        r#"UPDATE "rank_repair_queue"
           SET "status" = $1, "dueAt" = $2, "lastError" = $3, "updatedAt" = NOW()
           WHERE "id" = $4"#,
    )
    .bind(next_status)
    .bind(next_due)
    .bind(&full_error)
    .bind(&task.id)
    .execute(pool)
    .await?;

    Ok(is_final)
}

pub fn parse_retry_count(last_error: &Option<String>) -> i32 {
    last_error
        .as_ref()
        .and_then(|e| {
            e.strip_prefix("Retry ")
                .and_then(|s| s.split('/').next())
                .and_then(|n| n.parse().ok())
        })
        .unwrap_or(0)
}
