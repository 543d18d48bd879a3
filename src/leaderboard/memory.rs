use std::collections::HashMap;

use parking_lot::RwLock;

use crate::leaderboard::keys::period_keys;
use crate::leaderboard::{ratio_of, Period, RankInfo};

/// In-memory stand-in for the redis sorted sets. Reproduces the member
/// ordering redis uses (score ascending, then member string lexicographic),
/// the dual primary/copy keys and the value-based read fallback, so rank
/// and tie-break behavior match the real store bit for bit.
#[derive(Default)]
pub struct MemoryLeaderboard {
    tables: RwLock<HashMap<String, HashMap<String, i64>>>,
}

impl MemoryLeaderboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, period: Period, user_id: i64, delta: i64) {
        let member = user_id.to_string();
        let mut tables = self.tables.write();
        for key in period_keys(period) {
            let table = tables.entry(key.to_string()).or_default();
            *table.entry(member.clone()).or_insert(0) += delta;
        }
    }

    pub fn remove(&self, period: Period, user_id: i64) {
        let member = user_id.to_string();
        let mut tables = self.tables.write();
        for key in period_keys(period) {
            if let Some(table) = tables.get_mut(key) {
                table.remove(&member);
            }
        }
    }

    pub fn score(&self, period: Period, user_id: i64) -> Option<i64> {
        let member = user_id.to_string();
        let tables = self.tables.read();
        for key in period_keys(period) {
            if let Some(score) = tables.get(key).and_then(|table| table.get(&member)) {
                return Some(*score);
            }
        }
        None
    }

    pub fn rank_info(&self, period: Period, user_id: i64) -> Option<RankInfo> {
        let score = self.score(period, user_id)?;
        let tables = self.tables.read();
        let keys = period_keys(period);

        let mut peers: Vec<String> = Vec::new();
        for key in keys {
            if let Some(table) = tables.get(key) {
                let mut members: Vec<String> = table
                    .iter()
                    .filter(|(_, s)| **s == score)
                    .map(|(member, _)| member.clone())
                    .collect();
                if !members.is_empty() {
                    members.sort();
                    peers = members;
                    break;
                }
            }
        }

        let last_peer = peers.last()?.clone();

        let mut reverse_rank: Option<usize> = None;
        for key in keys {
            if let Some(table) = tables.get(key) {
                if table.contains_key(&last_peer) {
                    let mut entries: Vec<(&String, &i64)> = table.iter().collect();
                    entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));
                    reverse_rank = entries.iter().position(|(member, _)| **member == last_peer);
                    break;
                }
            }
        }

        let rank = (reverse_rank? + 1) as u64;
        let total = tables.get(keys[0]).map(|table| table.len() as u64).unwrap_or(0);

        Some(RankInfo {
            score,
            rank,
            ratio: ratio_of(rank, total),
        })
    }

    pub fn cardinality(&self, period: Period) -> u64 {
        let tables = self.tables.read();
        tables
            .get(period_keys(period)[0])
            .map(|table| table.len() as u64)
            .unwrap_or(0)
    }

    pub fn reverse_range_with_scores(&self, period: Period, start: i64, stop: i64) -> Vec<(i64, i64)> {
        if start < 0 || stop < start {
            return Vec::new();
        }

        let tables = self.tables.read();
        for key in period_keys(period) {
            if let Some(table) = tables.get(key) {
                if table.is_empty() {
                    continue;
                }
                let mut entries: Vec<(&String, &i64)> = table.iter().collect();
                entries.sort_by(|a, b| b.1.cmp(a.1).then_with(|| b.0.cmp(a.0)));

                let start = start as usize;
                if start >= entries.len() {
                    continue;
                }
                let stop = (stop as usize).min(entries.len() - 1);

                let page: Vec<(i64, i64)> = entries[start..=stop]
                    .iter()
                    .filter_map(|(member, score)| {
                        member.parse::<i64>().ok().map(|id| (id, **score))
                    })
                    .collect();
                if !page.is_empty() {
                    return page;
                }
            }
        }

        Vec::new()
    }

    /// Drops one backing key outright. Only exists so tests can exercise the
    /// primary-to-copy read fallback.
    pub fn drop_key(&self, key: &str) {
        self.tables.write().remove(key);
    }
}
