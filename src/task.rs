//! Task records and the in-memory registry.
//!
//! The registry is persisted as a JSON object keyed by task id (see
//! [`crate::storage`]). Stored `due` values stay as strings so a record with a
//! malformed timestamp survives a load/save cycle untouched.

use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::identity;

/// Accepted when a stored or configured timestamp lacks seconds.
const MINUTE_PRECISION_FORMAT: &str = "%Y-%m-%dT%H:%M%:z";

/// A deadline freshly reported by a source during one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObservedAssignment {
    pub title: String,
    pub course: String,
    pub due: DateTime<FixedOffset>,
    pub source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Identity seed used instead of `title` when deriving the id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

impl ObservedAssignment {
    pub fn new(
        title: impl Into<String>,
        course: impl Into<String>,
        due: DateTime<FixedOffset>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            course: course.into(),
            due,
            source: source.into(),
            url: None,
            key: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Registry id for this observation.
    pub fn id(&self) -> String {
        identity::derive(self.key.as_deref().unwrap_or(&self.title), &self.due)
    }
}

/// Persisted, identity-keyed deadline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub title: String,
    pub course: String,
    pub due: String,
    pub source: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

impl TaskRecord {
    /// Build a fresh, uncompleted record from an observation.
    pub fn from_observation(id: String, observed: &ObservedAssignment) -> Self {
        Self {
            id,
            title: observed.title.clone(),
            course: observed.course.clone(),
            due: format_due(&observed.due),
            source: observed.source.clone(),
            url: observed.url.clone(),
            completed: false,
        }
    }

    /// Parsed due instant, or `None` when the stored string is malformed.
    pub fn due_at(&self) -> Option<DateTime<FixedOffset>> {
        parse_due(&self.due).ok()
    }
}

/// Mapping of id to record, ordered by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Registry {
    tasks: BTreeMap<String, TaskRecord>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn get(&self, id: &str) -> Option<&TaskRecord> {
        self.tasks.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut TaskRecord> {
        self.tasks.get_mut(id)
    }

    /// Insert a record under its own id, replacing any previous one.
    pub fn insert(&mut self, record: TaskRecord) -> Option<TaskRecord> {
        self.tasks.insert(record.id.clone(), record)
    }

    pub fn remove(&mut self, id: &str) -> Option<TaskRecord> {
        self.tasks.remove(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &String> {
        self.tasks.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &TaskRecord> {
        self.tasks.values()
    }

    /// External-actor operation: mark a task completed or pending again.
    ///
    /// The reconciler never calls this; it only preserves the flag.
    pub fn set_completed(&mut self, id: &str, completed: bool) -> Result<&TaskRecord> {
        let record = self
            .tasks
            .get_mut(id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))?;
        record.completed = completed;
        Ok(record)
    }
}

impl FromIterator<TaskRecord> for Registry {
    fn from_iter<I: IntoIterator<Item = TaskRecord>>(iter: I) -> Self {
        let mut registry = Registry::new();
        for record in iter {
            registry.insert(record);
        }
        registry
    }
}

/// Parse an ISO-8601 timestamp that carries an explicit offset.
///
/// Naive timestamps are rejected: without an offset the instant is ambiguous.
pub fn parse_due(raw: &str) -> Result<DateTime<FixedOffset>> {
    let trimmed = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed);
    }
    if let Ok(parsed) = DateTime::parse_from_str(trimmed, MINUTE_PRECISION_FORMAT) {
        return Ok(parsed);
    }
    if NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S").is_ok() {
        return Err(Error::MalformedTimestamp(format!(
            "'{trimmed}' has no timezone offset"
        )));
    }
    Err(Error::MalformedTimestamp(format!(
        "'{trimmed}' is not an ISO-8601 timestamp"
    )))
}

/// Canonical persisted form, e.g. `2025-03-03T23:59:00-06:00`.
pub fn format_due(due: &DateTime<FixedOffset>) -> String {
    due.to_rfc3339_opts(SecondsFormat::Secs, false)
}
