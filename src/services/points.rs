use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::operations::points::{
    self, PointRow, FIRST_BONUS_POINT, MULTIPLE_BONUS_POINT, REVIEW_POINT,
};
use crate::db::DatabaseProxy;

/// Resolved point values for scoring one review event. Promotional
/// overrides are applied per value when the current instant falls inside
/// the configured [start, end) window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReviewPoints {
    pub review_point: i64,
    pub multiple_bonus_point: i64,
    pub first_bonus_point: i64,
}

#[derive(Debug, Error)]
pub enum PointsError {
    #[error("point value not configured: {0}")]
    Missing(&'static str),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

pub async fn resolve(proxy: &DatabaseProxy) -> Result<ReviewPoints, PointsError> {
    let rows = points::get_point_rows(proxy.pool()).await?;
    resolve_at(&rows, Utc::now())
}

pub fn resolve_at(rows: &[PointRow], now: DateTime<Utc>) -> Result<ReviewPoints, PointsError> {
    Ok(ReviewPoints {
        review_point: pick(rows, REVIEW_POINT, now).ok_or(PointsError::Missing(REVIEW_POINT))?,
        multiple_bonus_point: pick(rows, MULTIPLE_BONUS_POINT, now)
            .ok_or(PointsError::Missing(MULTIPLE_BONUS_POINT))?,
        first_bonus_point: pick(rows, FIRST_BONUS_POINT, now)
            .ok_or(PointsError::Missing(FIRST_BONUS_POINT))?,
    })
}

fn pick(rows: &[PointRow], name: &str, now: DateTime<Utc>) -> Option<i64> {
    let row = rows.iter().find(|row| row.name == name)?;

    if let (Some(event_point), Some(start), Some(end)) =
        (row.event_point, row.event_start, row.event_end)
    {
        if start <= now && now < end {
            return Some(event_point);
        }
    }

    Some(row.point)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn row(name: &str, point: i64) -> PointRow {
        PointRow {
            name: name.to_string(),
            point,
            event_point: None,
            event_start: None,
            event_end: None,
        }
    }

    fn all_rows() -> Vec<PointRow> {
        vec![
            row(REVIEW_POINT, 10),
            row(MULTIPLE_BONUS_POINT, 3),
            row(FIRST_BONUS_POINT, 3),
        ]
    }

    #[test]
    fn base_values_without_promotion() {
        let resolved = resolve_at(&all_rows(), Utc::now()).unwrap();
        assert_eq!(
            resolved,
            ReviewPoints {
                review_point: 10,
                multiple_bonus_point: 3,
                first_bonus_point: 3,
            }
        );
    }

    #[test]
    fn promotion_overrides_inside_window() {
        let now = Utc::now();
        let mut rows = all_rows();
        rows[0].event_point = Some(20);
        rows[0].event_start = Some(now - Duration::hours(1));
        rows[0].event_end = Some(now + Duration::hours(1));

        let resolved = resolve_at(&rows, now).unwrap();
        assert_eq!(resolved.review_point, 20);
        assert_eq!(resolved.multiple_bonus_point, 3);
    }

    #[test]
    fn promotion_window_is_inclusive_start_exclusive_end() {
        let now = Utc::now();
        let mut rows = all_rows();
        rows[0].event_point = Some(20);
        rows[0].event_start = Some(now);
        rows[0].event_end = Some(now + Duration::hours(1));

        assert_eq!(resolve_at(&rows, now).unwrap().review_point, 20);

        rows[0].event_end = Some(now);
        assert_eq!(resolve_at(&rows, now).unwrap().review_point, 10);
    }

    #[test]
    fn missing_value_is_fatal() {
        let rows = vec![row(REVIEW_POINT, 10), row(MULTIPLE_BONUS_POINT, 3)];
        assert!(matches!(
            resolve_at(&rows, Utc::now()),
            Err(PointsError::Missing(FIRST_BONUS_POINT))
        ));
    }
}
