//! PrairieLearn assessments fetcher.
//!
//! One source per course instance so a failing course never hides the
//! others. Uses `ureq` for synchronous requests with a per-request timeout.

use std::time::Duration;

use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tracing::{debug, warn};

use super::{ObservationSource, SourceError, SourceResult};
use crate::task::{parse_due, ObservedAssignment};
use crate::zone::Zone;

pub const SOURCE_TAG: &str = "PrairieLearn";

/// Field names that carry an assessment's close date, in preference order.
const DUE_FIELDS: [&str; 3] = ["close_date", "closeDate", "close_at"];

const UNTITLED: &str = "Untitled";

pub struct PrairieLearnSource {
    base_url: String,
    course_instance: u64,
    token: String,
    zone: Zone,
    agent: ureq::Agent,
}

impl PrairieLearnSource {
    pub fn new(
        base_url: impl Into<String>,
        course_instance: u64,
        token: impl Into<String>,
        timeout_secs: u64,
        zone: Zone,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(timeout_secs))
            .build();
        Self {
            base_url: base_url.into(),
            course_instance,
            token: token.into(),
            zone,
            agent,
        }
    }

    pub fn course_label(&self) -> String {
        format!("PL-{}", self.course_instance)
    }

    pub fn assessments_url(&self) -> String {
        format!(
            "{}/pl/api/v1/course_instances/{}/assessments",
            self.base_url, self.course_instance
        )
    }

    fn fetch(&self) -> std::result::Result<Value, SourceError> {
        let url = self.assessments_url();
        debug!(url = %url, "fetching assessments");

        match self.agent.get(&url).set("Private-Token", &self.token).call() {
            Ok(response) => response
                .into_json::<Value>()
                .map_err(|err| SourceError::Malformed(format!("invalid JSON body: {err}"))),
            Err(ureq::Error::Status(401, _)) => Err(SourceError::Unauthorized),
            Err(ureq::Error::Status(code, _)) => {
                Err(SourceError::Unavailable(format!("HTTP {code}")))
            }
            Err(ureq::Error::Transport(transport)) => {
                Err(SourceError::Unavailable(transport.to_string()))
            }
        }
    }
}

impl ObservationSource for PrairieLearnSource {
    fn name(&self) -> String {
        format!("{SOURCE_TAG} {}", self.course_label())
    }

    fn observe(&self, now: DateTime<FixedOffset>) -> SourceResult {
        let body = self.fetch()?;
        let items = body
            .as_array()
            .ok_or_else(|| SourceError::Malformed("expected a JSON array".to_string()))?;
        Ok(map_assessments(
            items,
            &self.base_url,
            self.course_instance,
            self.zone,
            now,
        ))
    }
}

/// Turn raw assessment objects into observations due after `now`.
///
/// Items without a usable close date are skipped.
pub fn map_assessments(
    items: &[Value],
    base_url: &str,
    course_instance: u64,
    zone: Zone,
    now: DateTime<FixedOffset>,
) -> Vec<ObservedAssignment> {
    let course = format!("PL-{course_instance}");
    let mut observed = Vec::new();

    for item in items {
        let title = string_field(item, "title")
            .or_else(|| string_field(item, "label"))
            .unwrap_or_else(|| UNTITLED.to_string());

        let Some(raw_due) = DUE_FIELDS.iter().find_map(|field| string_field(item, field)) else {
            debug!(title = %title, "assessment has no close date; skipping");
            continue;
        };
        let due = match parse_due(&raw_due) {
            Ok(due) => zone.localize(&due),
            Err(err) => {
                warn!(title = %title, error = %err, "skipping assessment with malformed close date");
                continue;
            }
        };
        if due <= now {
            continue;
        }

        let assessment_id = item
            .get("assessment_id")
            .map(scalar_to_string)
            .unwrap_or_default();
        let url = format!(
            "{base_url}/pl/course_instance/{course_instance}/assessment/{assessment_id}"
        );

        observed.push(ObservedAssignment::new(title, course.clone(), due, SOURCE_TAG).with_url(url));
    }

    observed
}

fn string_field(item: &Value, field: &str) -> Option<String> {
    item.get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}
