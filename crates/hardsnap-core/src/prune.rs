//! Retention policy evaluation.
//!
//! `apply_policy` is a pure function from (snapshot list, rule set, now)
//! to a keep/delete decision per snapshot. It is deterministic and
//! idempotent: the same inputs always produce the same decision, so
//! re-running a purge with nothing left to condemn is a no-op.
//!
//! Rules thin by calendar buckets: for each rule, snapshots are scanned
//! newest-first and the newest snapshot in each new bucket (hour, day,
//! ISO week, month, year) is kept, up to the rule's count. `keep_within`
//! keeps everything younger than a duration, `keep_last` the N newest.
//! Regardless of rules, the globally most recent snapshot is always kept,
//! so the keep-set is never empty.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Datelike, Timelike, Utc};

use crate::catalog::Snapshot;
use crate::config::RetentionConfig;
use crate::error::{HardsnapError, Result};

#[derive(Debug, Clone)]
pub enum PruneDecision {
    Keep { reasons: Vec<String> },
    Prune,
}

#[derive(Debug, Clone)]
pub struct PruneEntry {
    pub snapshot_name: String,
    pub snapshot_time: DateTime<Utc>,
    pub decision: PruneDecision,
}

/// Parse a duration string like "2d", "48h", "1w", "6m", "1y".
/// A bare number is treated as days.
pub fn parse_duration(s: &str) -> Result<chrono::Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(HardsnapError::Config("empty duration string".into()));
    }

    let out_of_range = || HardsnapError::Config(format!("duration out of range: '{s}'"));

    if let Ok(n) = s.parse::<i64>() {
        return chrono::Duration::try_days(n).ok_or_else(out_of_range);
    }

    // Split into numeric part and suffix.
    let (num_str, suffix) = s.split_at(
        s.find(|c: char| !c.is_ascii_digit())
            .ok_or_else(|| HardsnapError::Config(format!("invalid duration: '{s}'")))?,
    );
    let n: i64 = num_str
        .parse()
        .map_err(|_| HardsnapError::Config(format!("invalid duration number: '{num_str}'")))?;

    let days = |n: i64| chrono::Duration::try_days(n).ok_or_else(out_of_range);
    match suffix {
        "h" | "H" => chrono::Duration::try_hours(n).ok_or_else(out_of_range),
        "d" | "D" => days(n),
        "w" | "W" => chrono::Duration::try_weeks(n).ok_or_else(out_of_range),
        "m" | "M" => days(n.checked_mul(30).ok_or_else(out_of_range)?),
        "y" | "Y" => days(n.checked_mul(365).ok_or_else(out_of_range)?),
        _ => Err(HardsnapError::Config(format!(
            "unknown duration suffix: '{suffix}'"
        ))),
    }
}

fn hourly_key(t: &DateTime<Utc>) -> (i32, u32, u32) {
    (t.year(), t.ordinal(), t.hour())
}

fn daily_key(t: &DateTime<Utc>) -> (i32, u32, u32) {
    (t.year(), t.ordinal(), 0)
}

fn weekly_key(t: &DateTime<Utc>) -> (i32, u32, u32) {
    let iw = t.iso_week();
    (iw.year(), iw.week(), 0)
}

fn monthly_key(t: &DateTime<Utc>) -> (i32, u32, u32) {
    (t.year(), t.month(), 0)
}

fn yearly_key(t: &DateTime<Utc>) -> (i32, u32, u32) {
    (t.year(), 0, 0)
}

/// Working state shared by the individual rules.
struct Evaluation<'a> {
    /// Indices into the snapshot slice, newest first.
    order: Vec<usize>,
    times: Vec<DateTime<Utc>>,
    kept: HashSet<usize>,
    reasons: HashMap<usize, Vec<String>>,
    snapshots: &'a [Snapshot],
}

impl<'a> Evaluation<'a> {
    fn new(snapshots: &'a [Snapshot]) -> Self {
        let mut order: Vec<usize> = (0..snapshots.len()).collect();
        order.sort_by(|&a, &b| snapshots[b].time.cmp(&snapshots[a].time));
        let times = snapshots.iter().map(|s| s.time).collect();
        Self {
            order,
            times,
            kept: HashSet::new(),
            reasons: HashMap::new(),
            snapshots,
        }
    }

    fn keep(&mut self, idx: usize, reason: String) {
        self.kept.insert(idx);
        self.reasons.entry(idx).or_default().push(reason);
    }

    /// Keep the newest snapshot in each of the first `max_buckets` calendar
    /// buckets encountered scanning newest-first. A snapshot another rule
    /// already kept still claims its bucket.
    fn thin_by_bucket(
        &mut self,
        max_buckets: usize,
        key_fn: fn(&DateTime<Utc>) -> (i32, u32, u32),
        rule_name: &str,
    ) {
        let mut seen: HashSet<(i32, u32, u32)> = HashSet::new();
        for &idx in &self.order {
            if seen.len() >= max_buckets {
                break;
            }
            let bucket = key_fn(&self.times[idx]);
            if !seen.insert(bucket) {
                continue;
            }
            self.kept.insert(idx);
            self.reasons
                .entry(idx)
                .or_default()
                .push(format!("{rule_name} #{}", seen.len()));
        }
    }

    fn into_entries(mut self) -> Vec<PruneEntry> {
        self.order
            .iter()
            .map(|&idx| {
                let decision = match self.reasons.remove(&idx) {
                    Some(reasons) => PruneDecision::Keep { reasons },
                    None => PruneDecision::Prune,
                };
                PruneEntry {
                    snapshot_name: self.snapshots[idx].name.clone(),
                    snapshot_time: self.snapshots[idx].time,
                    decision,
                }
            })
            .collect()
    }
}

/// Apply the retention policy to a list of snapshots.
/// Returns a `PruneEntry` per snapshot, newest first.
pub fn apply_policy(
    snapshots: &[Snapshot],
    policy: &RetentionConfig,
    now: DateTime<Utc>,
) -> Result<Vec<PruneEntry>> {
    if snapshots.is_empty() {
        return Ok(Vec::new());
    }

    let mut eval = Evaluation::new(snapshots);

    // Safety floor: the newest snapshot survives no matter what the rules
    // say. The keep-set is never empty for non-empty input.
    let newest = eval.order[0];
    eval.keep(newest, "latest".into());

    if let Some(ref within) = policy.keep_within {
        let cutoff = now - parse_duration(within)?;
        let recent: Vec<usize> = eval
            .order
            .iter()
            .copied()
            .filter(|&idx| eval.times[idx] >= cutoff)
            .collect();
        for idx in recent {
            eval.keep(idx, "within".into());
        }
    }

    if let Some(n) = policy.keep_last {
        let last: Vec<usize> = eval.order.iter().copied().take(n).collect();
        for (i, idx) in last.into_iter().enumerate() {
            eval.keep(idx, format!("last #{}", i + 1));
        }
    }

    if let Some(n) = policy.keep_hourly {
        eval.thin_by_bucket(n, hourly_key, "hourly");
    }
    if let Some(n) = policy.keep_daily {
        eval.thin_by_bucket(n, daily_key, "daily");
    }
    if let Some(n) = policy.keep_weekly {
        eval.thin_by_bucket(n, weekly_key, "weekly");
    }
    if let Some(n) = policy.keep_monthly {
        eval.thin_by_bucket(n, monthly_key, "monthly");
    }
    if let Some(n) = policy.keep_yearly {
        eval.thin_by_bucket(n, yearly_key, "yearly");
    }

    Ok(eval.into_entries())
}
