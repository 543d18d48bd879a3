use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::db::operations::repair;
use crate::db::DatabaseProxy;
use crate::leaderboard::Leaderboard;
use crate::services::score_reset;

const BATCH_SIZE: i64 = 50;

/// Drains the rank repair queue. Every task resolves to a full reset_rank,
/// which is idempotent, so reprocessing a task after a crash is harmless.
pub async fn process_pending_repairs(
    db: Arc<DatabaseProxy>,
    leaderboard: Arc<Leaderboard>,
) -> Result<(), super::WorkerError> {
    let start = Instant::now();
    debug!("Starting rank repair cycle");

    let pool = db.pool();

    let recovered = repair::recover_stuck(pool).await?;
    if recovered > 0 {
        warn!(recovered, "Recovered stuck rank repair tasks");
    }

    let tasks = repair::claim_pending(pool, BATCH_SIZE).await?;
    if tasks.is_empty() {
        debug!("No pending rank repairs");
        return Ok(());
    }

    info!(count = tasks.len(), "Processing rank repair tasks");

    let mut success_count = 0;
    let mut failure_count = 0;

    for task in tasks {
        match score_reset::reset_rank(&db, &leaderboard, task.user_id).await {
            Ok(()) => {
                repair::mark_done(pool, &task.id).await?;
                success_count += 1;
            }
            Err(err) => {
                let retry_count = repair::parse_retry_count(&task.last_error);
                let is_final = repair::mark_failed(pool, &task, retry_count, &err.to_string()).await?;
                if is_final {
                    error!(
                        task_id = %task.id,
                        user_id = task.user_id,
                        error = %err,
                        "Rank repair failed permanently"
                    );
                } else {
                    warn!(
                        task_id = %task.id,
                        user_id = task.user_id,
                        retry = retry_count + 1,
                        "Rank repair scheduled for retry"
                    );
                }
                failure_count += 1;
            }
        }
    }

    let duration = start.elapsed();
    info!(
        success = success_count,
        failure = failure_count,
        duration_ms = duration.as_millis() as u64,
        "Rank repair cycle completed"
    );

    Ok(())
}
