use chrono::{DateTime, FixedOffset};

use ddl_digest::digest::partition;
use ddl_digest::identity;
use ddl_digest::reconcile::{reconcile, Reconciler};
use ddl_digest::task::{format_due, parse_due, ObservedAssignment, Registry, TaskRecord};
use ddl_digest::urgency::{classify, Tier};

fn at(raw: &str) -> DateTime<FixedOffset> {
    parse_due(raw).expect("timestamp")
}

fn now() -> DateTime<FixedOffset> {
    at("2025-02-20T00:00:00-06:00")
}

fn observed(title: &str, due: &str) -> ObservedAssignment {
    ObservedAssignment::new(title, "BioE 210", at(due), "PrairieLearn")
}

fn stored(id: &str, title: &str, due: &str, completed: bool) -> TaskRecord {
    TaskRecord {
        id: id.to_string(),
        title: title.to_string(),
        course: "BioE 210".to_string(),
        due: due.to_string(),
        source: "Canvas".to_string(),
        url: None,
        completed,
    }
}

#[test]
fn reconcile_is_idempotent() {
    let existing: Registry = [
        stored("hw_1__20250210", "HW 1", "2025-02-10T23:59:00-06:00", false),
        stored("hw_2__20250224", "HW 2", "2025-02-24T23:59:00-06:00", true),
        stored("broken", "Broken", "sometime", false),
    ]
    .into_iter()
    .collect();
    let fresh = vec![
        observed("HW 2", "2025-02-24T23:59:00-06:00"),
        observed("HW 3", "2025-03-03T23:59:00-06:00"),
    ];

    let once = reconcile(&existing, &fresh, now());
    let twice = reconcile(&once, &fresh, now());
    assert_eq!(once, twice);
}

#[test]
fn completed_flags_survive_any_batch() {
    let existing: Registry = [
        stored("hw_2__20250224", "HW 2", "2025-02-24T23:59:00-06:00", true),
        stored("hw_4__20250310", "HW 4", "2025-03-10T23:59:00-06:00", true),
    ]
    .into_iter()
    .collect();

    let batches = [
        vec![],
        vec![observed("HW 2", "2025-02-24T08:00:00-06:00")],
        vec![
            observed("HW 2", "2025-02-24T23:59:00-06:00"),
            observed("HW 4", "2025-03-10T12:00:00-06:00"),
            observed("HW 5", "2025-03-17T23:59:00-06:00"),
        ],
    ];

    for batch in &batches {
        let merged = reconcile(&existing, batch, now());
        for id in ["hw_2__20250224", "hw_4__20250310"] {
            assert!(merged.get(id).expect("kept").completed, "{id} lost its flag");
        }
        if let Some(new) = merged.get("hw_5__20250317") {
            assert!(!new.completed);
        }
    }
}

#[test]
fn prunes_only_past_due_unobserved_records() {
    let existing: Registry = [
        stored("past__20250210", "Past", "2025-02-10T23:59:00-06:00", true),
        stored("exact__20250220", "Exact", "2025-02-20T00:00:00-06:00", false),
        stored("future__20250301", "Future", "2025-03-01T23:59:00-06:00", false),
    ]
    .into_iter()
    .collect();

    let (merged, report) = Reconciler::default().reconcile(&existing, &[], now());
    assert!(!merged.contains("past__20250210"));
    assert!(merged.contains("exact__20250220"));
    assert!(merged.contains("future__20250301"));
    assert_eq!(report.pruned, vec!["past__20250210".to_string()]);
}

#[test]
fn identity_ignores_time_of_day() {
    assert_eq!(
        identity::derive("BioE 210 HW 5", &at("2025-03-03T23:59:00-06:00")),
        identity::derive("BioE 210 HW 5", &at("2025-03-03T08:00:00-06:00"))
    );
    assert_ne!(
        identity::derive("BioE 210 HW 5", &at("2025-03-03T23:59:00-06:00")),
        identity::derive("BioE 210 HW 6", &at("2025-03-03T23:59:00-06:00"))
    );
}

#[test]
fn end_to_end_refresh_keeps_completion() {
    // A is stored under the identity its source reports; only its due moved.
    let a_key = identity::derive("Lab Report", &at("2025-03-02T23:59:00-06:00"));
    let existing: Registry = [stored(&a_key, "Lab Report", "2025-03-01T23:59:00-06:00", true)]
        .into_iter()
        .collect();

    let a = observed("Lab Report", "2025-03-02T23:59:00-06:00");
    let b = observed("Problem Set 4", "2025-03-05T23:59:00-06:00");
    assert_eq!(a.id(), a_key);

    let (merged, report) =
        Reconciler::default().reconcile(&existing, &[a.clone(), b.clone()], now());

    let kept = merged.get(&a_key).expect("A kept");
    assert!(kept.completed);
    assert_eq!(kept.due, format_due(&a.due));
    assert_eq!(kept.source, "PrairieLearn");

    let inserted = merged.get(&b.id()).expect("B inserted");
    assert!(!inserted.completed);
    assert!(report.pruned.is_empty());
    assert_eq!(merged.len(), 2);

    for record in merged.records() {
        let due = record.due_at().expect("parseable");
        assert_eq!(classify(due, now()).tier, Tier::Later);
    }

    // Only B is still pending; it lands in the later bucket.
    let digest = partition(&merged, now());
    assert!(digest.soon.is_empty());
    assert_eq!(digest.later.len(), 1);
    assert_eq!(digest.later[0].record.id, b.id());
    assert_eq!(digest.due_within_24h, 0);
}
