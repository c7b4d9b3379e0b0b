//! Observation sources
//!
//! Every collaborator that knows about deadlines (a REST fetcher, a generated
//! schedule, a fixed list) implements [`ObservationSource`]. A failing source
//! contributes nothing for the run; it never stops the others.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{Config, Secrets};
use crate::error::Result;
use crate::task::ObservedAssignment;

pub mod prairielearn;
pub mod schedule;

pub use prairielearn::PrairieLearnSource;
pub use schedule::{FixedDeadlines, WeeklySchedule};

/// Why a source produced no observations this run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    pub fn kind(&self) -> &'static str {
        match self {
            SourceError::Unauthorized => "unauthorized",
            SourceError::Unavailable(_) => "unavailable",
            SourceError::Malformed(_) => "malformed",
        }
    }
}

pub type SourceResult = std::result::Result<Vec<ObservedAssignment>, SourceError>;

/// Something that can report the deadlines it currently knows about.
pub trait ObservationSource {
    /// Short label used in logs and run reports.
    fn name(&self) -> String;

    /// Observations as of `now`, already in the configured zone.
    fn observe(&self, now: DateTime<FixedOffset>) -> SourceResult;
}

/// Outcome of one source in a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub source: String,
    pub observed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SourceReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

/// Observations gathered from every source.
#[derive(Debug, Clone, Default)]
pub struct Gathered {
    pub observations: Vec<ObservedAssignment>,
    pub reports: Vec<SourceReport>,
}

/// Query each source in turn, keeping whatever succeeded.
pub fn gather(sources: &[Box<dyn ObservationSource>], now: DateTime<FixedOffset>) -> Gathered {
    let mut gathered = Gathered::default();
    for source in sources {
        let name = source.name();
        match source.observe(now) {
            Ok(items) => {
                info!(source = %name, observed = items.len(), "source ok");
                gathered.reports.push(SourceReport {
                    source: name,
                    observed: items.len(),
                    error: None,
                });
                gathered.observations.extend(items);
            }
            Err(err) => {
                warn!(source = %name, kind = err.kind(), error = %err, "source failed; continuing without it");
                gathered.reports.push(SourceReport {
                    source: name,
                    observed: 0,
                    error: Some(err.to_string()),
                });
            }
        }
    }
    gathered
}

/// Build every source described by `config`.
///
/// Call [`Secrets::require_sources`] first; a missing token here is an error.
pub fn from_config(config: &Config, secrets: &Secrets) -> Result<Vec<Box<dyn ObservationSource>>> {
    secrets.require_sources(config)?;
    let zone = config.zone()?;
    let mut sources: Vec<Box<dyn ObservationSource>> = Vec::new();

    if let Some(pl) = &config.prairielearn {
        let token = secrets.pl_token.clone().unwrap_or_default();
        for course_instance in &pl.course_instances {
            sources.push(Box::new(PrairieLearnSource::new(
                pl.base_url.trim_end_matches('/'),
                *course_instance,
                token.trim(),
                pl.timeout_secs,
                zone,
            )));
        }
    }

    for weekly in &config.weekly {
        sources.push(Box::new(WeeklySchedule::from_config(weekly, zone)?));
    }

    if !config.deadlines.is_empty() {
        sources.push(Box::new(FixedDeadlines::new(config.deadlines.clone(), zone)));
    }

    Ok(sources)
}
