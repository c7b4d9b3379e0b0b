//! Merge freshly observed deadlines into the registry.
//!
//! The merge owns every field except `completed`: new ids are inserted
//! uncompleted, known ids get their metadata refreshed, and records that are
//! both past due and absent from the batch are dropped. Records whose stored
//! due cannot be parsed are never pruned.

use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use tracing::{debug, warn};

use crate::task::{format_due, ObservedAssignment, Registry, TaskRecord};

/// Merge behaviour that varies between deployments.
#[derive(Debug, Clone, Copy)]
pub struct Reconciler {
    /// Overwrite the stored source tag when an id reappears.
    pub refresh_source: bool,
}

impl Default for Reconciler {
    fn default() -> Self {
        Self {
            refresh_source: true,
        }
    }
}

/// What a merge did, in id order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub inserted: Vec<String>,
    pub updated: Vec<String>,
    pub pruned: Vec<String>,
    /// Unobserved records kept only because their due could not be parsed.
    pub unparseable: Vec<String>,
}

impl Reconciler {
    /// Merge `fresh` into a copy of `existing` as of `now`.
    pub fn reconcile(
        &self,
        existing: &Registry,
        fresh: &[ObservedAssignment],
        now: DateTime<FixedOffset>,
    ) -> (Registry, ReconcileReport) {
        let mut working = existing.clone();
        let mut report = ReconcileReport::default();
        let mut observed_ids = HashSet::with_capacity(fresh.len());

        for observation in fresh {
            let id = observation.id();
            match working.get_mut(&id) {
                Some(record) => {
                    self.refresh(record, observation);
                    if !report.updated.contains(&id) && !report.inserted.contains(&id) {
                        report.updated.push(id.clone());
                    }
                }
                None => {
                    debug!(id = %id, "new task");
                    working.insert(TaskRecord::from_observation(id.clone(), observation));
                    report.inserted.push(id.clone());
                }
            }
            observed_ids.insert(id);
        }

        let unobserved: Vec<String> = working
            .ids()
            .filter(|id| !observed_ids.contains(*id))
            .cloned()
            .collect();

        for id in unobserved {
            let Some(record) = working.get(&id) else {
                continue;
            };
            match record.due_at() {
                Some(due) if due < now => {
                    debug!(id = %id, due = %record.due, "pruning stale task");
                    working.remove(&id);
                    report.pruned.push(id);
                }
                Some(_) => {}
                None => {
                    warn!(id = %id, due = %record.due, "stored due is malformed; keeping task");
                    report.unparseable.push(id);
                }
            }
        }

        report.inserted.sort();
        report.updated.sort();
        (working, report)
    }

    fn refresh(&self, record: &mut TaskRecord, observation: &ObservedAssignment) {
        record.title = observation.title.clone();
        record.course = observation.course.clone();
        record.due = format_due(&observation.due);
        record.url = observation.url.clone();
        if self.refresh_source {
            record.source = observation.source.clone();
        }
    }
}

/// Merge with the default [`Reconciler`], discarding the report.
pub fn reconcile(
    existing: &Registry,
    fresh: &[ObservedAssignment],
    now: DateTime<FixedOffset>,
) -> Registry {
    Reconciler::default().reconcile(existing, fresh, now).0
}
