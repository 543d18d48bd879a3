use crate::leaderboard::Period;

/// Every period is materialized as a primary sorted set plus a shadow copy.
/// Writers mutate both; readers consult the primary first and fall back to
/// the copy before treating a member as absent.
pub fn period_keys(period: Period) -> [&'static str; 2] {
    match period {
        Period::All => ["rank:user:all", "rank:user:all:copy"],
        Period::ThisWeek => ["rank:user:this_week", "rank:user:this_week:copy"],
        Period::LastWeek => ["rank:user:last_week", "rank:user:last_week:copy"],
    }
}
