use chrono::{DateTime, Datelike, Duration, FixedOffset, NaiveTime, TimeZone, Utc};

/// Sortable local civil timestamp format used by review rows and the
/// first-review ledger. Lexicographic order equals chronological order.
pub const SORTABLE_FORMAT: &str = "%Y%m%d%H%M%S";

const LOCAL_OFFSET_SECS: i32 = 8 * 3600;

pub fn local_offset() -> FixedOffset {
    // UTC+8 is a constant valid offset.
    FixedOffset::east_opt(LOCAL_OFFSET_SECS).expect("fixed UTC+8 offset")
}

pub fn local_now() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&local_offset())
}

pub fn sortable_now() -> String {
    local_now().format(SORTABLE_FORMAT).to_string()
}

pub fn to_sortable(dt: DateTime<FixedOffset>) -> String {
    dt.format(SORTABLE_FORMAT).to_string()
}

/// Start of the current weekly ranking window: the most recent Friday
/// 18:00 local time. The rollover itself (this_week -> last_week) is
/// performed by an external scheduler at that instant.
pub fn week_window_start() -> DateTime<FixedOffset> {
    week_window_start_at(local_now())
}

pub fn week_window_start_at(now: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    // Weekday::Fri.num_days_from_monday() == 4
    let days_back = (i64::from(now.weekday().num_days_from_monday()) + 7 - 4) % 7;
    let date = now.date_naive() - Duration::days(days_back);
    let time = NaiveTime::from_hms_opt(18, 0, 0).expect("valid 18:00");
    let candidate = match local_offset().from_local_datetime(&date.and_time(time)).single() {
        Some(dt) => dt,
        None => return now,
    };

    if candidate > now {
        candidate - Duration::days(7)
    } else {
        candidate
    }
}

pub fn week_window_start_sortable() -> String {
    to_sortable(week_window_start())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
        local_offset()
            .with_ymd_and_hms(y, mo, d, h, mi, 0)
            .single()
            .unwrap()
    }

    #[test]
    fn window_starts_previous_friday_evening() {
        // 2026-08-05 is a Wednesday.
        let now = local(2026, 8, 5, 12, 0);
        let start = week_window_start_at(now);
        assert_eq!(to_sortable(start), "20260731180000");
    }

    #[test]
    fn friday_before_six_pm_belongs_to_previous_window() {
        let now = local(2026, 8, 7, 17, 59);
        let start = week_window_start_at(now);
        assert_eq!(to_sortable(start), "20260731180000");
    }

    #[test]
    fn friday_after_six_pm_opens_a_new_window() {
        let now = local(2026, 8, 7, 18, 0);
        let start = week_window_start_at(now);
        assert_eq!(to_sortable(start), "20260807180000");
    }

    #[test]
    fn sortable_strings_order_chronologically() {
        let earlier = to_sortable(local(2026, 8, 1, 9, 30));
        let later = to_sortable(local(2026, 8, 1, 10, 0));
        assert!(earlier < later);
    }
}
