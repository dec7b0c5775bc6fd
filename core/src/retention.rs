use crate::event::Snapshot;
use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};

/// Declarative retention rules. A zero field means "no constraint of this
/// kind"; a policy with no constraints set keeps every snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetentionPolicy {
    pub keep_last_n: u32,
    pub keep_hourly: u32,
    pub keep_daily: u32,
    pub keep_weekly: u32,
    pub keep_monthly: u32,
    pub keep_yearly: u32,
}

impl RetentionPolicy {
    pub fn keep_last(n: u32) -> Self {
        Self {
            keep_last_n: n,
            ..Default::default()
        }
    }

    fn is_unconstrained(&self) -> bool {
        self.keep_last_n == 0
            && self.keep_hourly == 0
            && self.keep_daily == 0
            && self.keep_weekly == 0
            && self.keep_monthly == 0
            && self.keep_yearly == 0
    }

    /// Partitions `snapshots` into keep and remove sets, both ordered
    /// most-recent-first.
    ///
    /// Keep is the union of the `keep_last_n` most recent snapshots and,
    /// per calendar rule, the newest snapshot in each of the rule's most
    /// recent distinct periods (hour, day, ISO week, month, year). A policy
    /// with no constraints keeps everything and removes nothing.
    ///
    /// The sort is keyed on creation time descending with the original
    /// listing order breaking ties, so identical inputs always produce the
    /// identical partition. Every input snapshot lands in exactly one of
    /// the two sequences. Pure and reentrant; performs no I/O.
    pub fn apply(&self, snapshots: &[Snapshot]) -> RetentionResult {
        let mut ordered: Vec<(usize, &Snapshot)> = snapshots.iter().enumerate().collect();
        ordered.sort_by(|(a_idx, a), (b_idx, b)| {
            b.unix_time_ms()
                .cmp(&a.unix_time_ms())
                .then(a_idx.cmp(b_idx))
        });

        let mut kept = vec![self.is_unconstrained(); ordered.len()];
        for slot in kept.iter_mut().take(self.keep_last_n as usize) {
            *slot = true;
        }

        let rules: [(u32, fn(&DateTime<Utc>) -> String); 5] = [
            (self.keep_hourly, period_hour),
            (self.keep_daily, period_day),
            (self.keep_weekly, period_week),
            (self.keep_monthly, period_month),
            (self.keep_yearly, period_year),
        ];
        for (count, period) in rules {
            if count == 0 {
                continue;
            }
            let mut periods: Vec<String> = Vec::new();
            for (slot, (_, snapshot)) in kept.iter_mut().zip(&ordered) {
                let key = period(&snapshot.time);
                if periods.iter().any(|seen| *seen == key) {
                    continue;
                }
                if periods.len() == count as usize {
                    break;
                }
                periods.push(key);
                *slot = true;
            }
        }

        let mut keep = Vec::new();
        let mut remove = Vec::new();
        for (kept, (_, snapshot)) in kept.iter().zip(&ordered) {
            if *kept {
                keep.push((*snapshot).clone());
            } else {
                remove.push((*snapshot).clone());
            }
        }
        RetentionResult { keep, remove }
    }
}

fn period_hour(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d %H").to_string()
}

fn period_day(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m-%d").to_string()
}

fn period_week(time: &DateTime<Utc>) -> String {
    let week = time.iso_week();
    format!("{}-w{:02}", week.year(), week.week())
}

fn period_month(time: &DateTime<Utc>) -> String {
    time.format("%Y-%m").to_string()
}

fn period_year(time: &DateTime<Utc>) -> String {
    time.format("%Y").to_string()
}

/// The keep/remove partition computed by [`RetentionPolicy::apply`].
#[derive(Debug, Clone)]
pub struct RetentionResult {
    pub keep: Vec<Snapshot>,
    pub remove: Vec<Snapshot>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn snapshot_at(id: &str, month: u32, day: u32, hour: u32, minute: u32) -> Snapshot {
        Snapshot {
            id: id.to_string(),
            short_id: id.chars().take(8).collect(),
            time: Utc.with_ymd_and_hms(2024, month, day, hour, minute, 0).unwrap(),
            tree: String::new(),
            paths: vec!["/data".to_string()],
            hostname: "testhost".to_string(),
            username: "tester".to_string(),
            tags: Vec::new(),
        }
    }

    fn snapshot(id: &str, minute: u32) -> Snapshot {
        snapshot_at(id, 6, 1, 12, minute)
    }

    fn ids(snapshots: &[Snapshot]) -> Vec<&str> {
        snapshots.iter().map(|s| s.id.as_str()).collect()
    }

    #[test]
    fn keep_last_partitions_most_recent_first() {
        let snapshots: Vec<Snapshot> = (0..10)
            .map(|i| snapshot(&format!("snap{}", i), i))
            .collect();

        let result = RetentionPolicy::keep_last(3).apply(&snapshots);

        assert_eq!(ids(&result.keep), vec!["snap9", "snap8", "snap7"]);
        assert_eq!(
            ids(&result.remove),
            vec!["snap6", "snap5", "snap4", "snap3", "snap2", "snap1", "snap0"]
        );
    }

    #[test]
    fn partition_is_exact() {
        let snapshots: Vec<Snapshot> = (0..7)
            .map(|i| snapshot(&format!("snap{}", i), i))
            .collect();
        let result = RetentionPolicy::keep_last(4).apply(&snapshots);

        assert_eq!(result.keep.len() + result.remove.len(), snapshots.len());
        for kept in &result.keep {
            assert!(!result.remove.iter().any(|r| r.id == kept.id));
        }
    }

    #[test]
    fn keep_at_least_total_removes_nothing() {
        let snapshots: Vec<Snapshot> = (0..3)
            .map(|i| snapshot(&format!("snap{}", i), i))
            .collect();

        let result = RetentionPolicy::keep_last(3).apply(&snapshots);
        assert_eq!(result.keep.len(), 3);
        assert!(result.remove.is_empty());

        let result = RetentionPolicy::keep_last(100).apply(&snapshots);
        assert_eq!(result.keep.len(), 3);
        assert!(result.remove.is_empty());
    }

    #[test]
    fn unconstrained_policy_removes_nothing() {
        let snapshots: Vec<Snapshot> = (0..5)
            .map(|i| snapshot(&format!("snap{}", i), i))
            .collect();

        let result = RetentionPolicy::default().apply(&snapshots);

        assert!(result.remove.is_empty());
        assert_eq!(
            ids(&result.keep),
            vec!["snap4", "snap3", "snap2", "snap1", "snap0"]
        );
    }

    #[test]
    fn keep_daily_keeps_newest_per_recent_day() {
        let snapshots = vec![
            snapshot_at("a", 6, 1, 8, 0),
            snapshot_at("b", 6, 1, 20, 0),
            snapshot_at("c", 6, 2, 9, 0),
            snapshot_at("d", 6, 2, 21, 0),
            snapshot_at("e", 6, 3, 10, 0),
            snapshot_at("f", 6, 3, 22, 0),
        ];

        let policy = RetentionPolicy {
            keep_daily: 2,
            ..Default::default()
        };
        let result = policy.apply(&snapshots);

        assert_eq!(ids(&result.keep), vec!["f", "d"]);
        assert_eq!(ids(&result.remove), vec!["e", "c", "b", "a"]);
        assert_eq!(result.keep.len() + result.remove.len(), snapshots.len());
    }

    #[test]
    fn keep_last_unions_with_calendar_rules() {
        let snapshots = vec![
            snapshot_at("a", 6, 1, 8, 0),
            snapshot_at("b", 6, 1, 20, 0),
            snapshot_at("c", 6, 2, 9, 0),
            snapshot_at("d", 6, 2, 21, 0),
            snapshot_at("e", 6, 3, 10, 0),
            snapshot_at("f", 6, 3, 22, 0),
        ];

        let policy = RetentionPolicy {
            keep_last_n: 3,
            keep_daily: 2,
            ..Default::default()
        };
        let result = policy.apply(&snapshots);

        // keep-last marks f, e, d; daily marks f and d again.
        assert_eq!(ids(&result.keep), vec!["f", "e", "d"]);
        assert_eq!(ids(&result.remove), vec!["c", "b", "a"]);
    }

    #[test]
    fn keep_monthly_buckets_by_month() {
        let snapshots = vec![
            snapshot_at("april", 4, 15, 12, 0),
            snapshot_at("may", 5, 15, 12, 0),
            snapshot_at("june-early", 6, 1, 12, 0),
            snapshot_at("june-late", 6, 20, 12, 0),
        ];

        let policy = RetentionPolicy {
            keep_monthly: 2,
            ..Default::default()
        };
        let result = policy.apply(&snapshots);

        assert_eq!(ids(&result.keep), vec!["june-late", "may"]);
        assert_eq!(ids(&result.remove), vec!["june-early", "april"]);
    }

    #[test]
    fn identical_timestamps_tie_break_on_listing_order() {
        let snapshots = vec![
            snapshot("first", 5),
            snapshot("second", 5),
            snapshot("third", 5),
        ];

        let a = RetentionPolicy::keep_last(1).apply(&snapshots);
        let b = RetentionPolicy::keep_last(1).apply(&snapshots);

        assert_eq!(ids(&a.keep), vec!["first"]);
        assert_eq!(ids(&a.remove), vec!["second", "third"]);
        assert_eq!(ids(&a.keep), ids(&b.keep));
        assert_eq!(ids(&a.remove), ids(&b.remove));
    }

    #[test]
    fn empty_input_yields_empty_partition() {
        let result = RetentionPolicy::keep_last(3).apply(&[]);
        assert!(result.keep.is_empty());
        assert!(result.remove.is_empty());
    }
}
