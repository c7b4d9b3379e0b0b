//! Partition pending tasks into presentation buckets.

use chrono::{DateTime, Duration, FixedOffset};
use serde::Serialize;

use crate::task::{Registry, TaskRecord};
use crate::urgency::{classify, Urgency, WEEK_WINDOW_SECS};

const DAY_SECS: i64 = 24 * 60 * 60;

/// A pending task with its parsed due instant and urgency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingTask {
    #[serde(flatten)]
    pub record: TaskRecord,
    #[serde(skip)]
    pub due_at: DateTime<FixedOffset>,
    pub urgency: Urgency,
}

/// Pending tasks split at the 7-day window, each bucket sorted by due.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Digest {
    pub soon: Vec<PendingTask>,
    pub later: Vec<PendingTask>,
    pub due_within_24h: usize,
}

impl Digest {
    pub fn pending(&self) -> usize {
        self.soon.len() + self.later.len()
    }

    /// Nothing to report; callers skip notification.
    pub fn is_empty(&self) -> bool {
        self.pending() == 0
    }
}

/// Build the digest for `now` from every uncompleted task still in the future.
///
/// Tasks whose stored due cannot be parsed are left out.
pub fn partition(registry: &Registry, now: DateTime<FixedOffset>) -> Digest {
    let week_end = now + Duration::seconds(WEEK_WINDOW_SECS);
    let day_end = now + Duration::seconds(DAY_SECS);

    let mut pending: Vec<PendingTask> = registry
        .records()
        .filter(|record| !record.completed)
        .filter_map(|record| {
            let due_at = record.due_at()?;
            (due_at > now).then(|| PendingTask {
                record: record.clone(),
                due_at,
                urgency: classify(due_at, now),
            })
        })
        .collect();

    pending.sort_by(|left, right| {
        left.due_at
            .cmp(&right.due_at)
            .then_with(|| left.record.id.cmp(&right.record.id))
    });

    let due_within_24h = pending.iter().filter(|task| task.due_at < day_end).count();
    let (soon, later): (Vec<_>, Vec<_>) = pending
        .into_iter()
        .partition(|task| task.due_at <= week_end);

    Digest {
        soon,
        later,
        due_within_24h,
    }
}
