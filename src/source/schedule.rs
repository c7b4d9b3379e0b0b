//! Deadlines that come from configuration rather than a remote service.

use chrono::{DateTime, Duration, FixedOffset};
use tracing::warn;

use super::{ObservationSource, SourceResult};
use crate::config::{DeadlineConfig, WeeklyConfig, WeeklyRule};
use crate::error::Result;
use crate::task::{parse_due, ObservedAssignment};
use crate::zone::Zone;

const WEEK_PLACEHOLDER: &str = "{week}";

/// A deadline repeating weekly between two dates.
///
/// Week numbers count from `first_due`, so an occurrence keeps the same
/// identity seed (`{key_prefix}{week}`) on every run.
#[derive(Debug, Clone)]
pub struct WeeklySchedule {
    course: String,
    title: String,
    key_prefix: String,
    source: String,
    url: Option<String>,
    rule: WeeklyRule,
    zone: Zone,
}

impl WeeklySchedule {
    pub fn from_config(config: &WeeklyConfig, zone: Zone) -> Result<Self> {
        Ok(Self {
            course: config.course.clone(),
            title: config.title.clone(),
            key_prefix: config.key_prefix.trim().to_string(),
            source: config.source.clone(),
            url: config.url.clone(),
            rule: config.rule()?,
            zone,
        })
    }

    /// Every occurrence of the rule, past ones included.
    pub fn occurrences(&self) -> Vec<ObservedAssignment> {
        let mut occurrences = Vec::new();
        let mut date = self.rule.first_due;
        let mut week = 1u32;

        while date <= self.rule.last_date {
            if let Some(due) = self.zone.from_local(date.and_time(self.rule.time)) {
                let mut observed = ObservedAssignment::new(
                    self.title.replace(WEEK_PLACEHOLDER, &week.to_string()),
                    self.course.clone(),
                    due,
                    self.source.clone(),
                )
                .with_key(format!("{}{week}", self.key_prefix));
                observed.url = self.url.clone();
                occurrences.push(observed);
            }
            date += Duration::weeks(1);
            week += 1;
        }

        occurrences
    }
}

impl ObservationSource for WeeklySchedule {
    fn name(&self) -> String {
        format!("weekly {}", self.course)
    }

    fn observe(&self, now: DateTime<FixedOffset>) -> SourceResult {
        Ok(self
            .occurrences()
            .into_iter()
            .filter(|occurrence| occurrence.due > now)
            .collect())
    }
}

/// A fixed list of deadlines from configuration.
#[derive(Debug, Clone)]
pub struct FixedDeadlines {
    entries: Vec<DeadlineConfig>,
    zone: Zone,
}

impl FixedDeadlines {
    pub fn new(entries: Vec<DeadlineConfig>, zone: Zone) -> Self {
        Self { entries, zone }
    }
}

impl ObservationSource for FixedDeadlines {
    fn name(&self) -> String {
        "fixed deadlines".to_string()
    }

    fn observe(&self, now: DateTime<FixedOffset>) -> SourceResult {
        let mut observed = Vec::new();
        for entry in &self.entries {
            let due = match parse_due(&entry.due) {
                Ok(due) => self.zone.localize(&due),
                Err(err) => {
                    warn!(title = %entry.title, error = %err, "skipping fixed deadline");
                    continue;
                }
            };
            if due <= now {
                continue;
            }
            let mut assignment =
                ObservedAssignment::new(&entry.title, &entry.course, due, &entry.source);
            assignment.url = entry.url.clone();
            observed.push(assignment);
        }
        Ok(observed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn central() -> Zone {
        Zone::parse("America/Chicago").unwrap()
    }

    fn weekly() -> WeeklyConfig {
        WeeklyConfig {
            course: "BioE 210".to_string(),
            title: "BioE 210 Weekly Assignment (Week {week})".to_string(),
            key_prefix: "bioe210_hw".to_string(),
            weekday: "mon".to_string(),
            time: "23:59".to_string(),
            first_due: "2025-01-27".to_string(),
            last_date: "2025-05-10".to_string(),
            source: "Canvas".to_string(),
            url: Some("https://canvas.illinois.edu".to_string()),
        }
    }

    #[test]
    fn occurrences_run_weekly_through_last_date() {
        let schedule = WeeklySchedule::from_config(&weekly(), central()).unwrap();
        let all = schedule.occurrences();

        // Jan 27 .. May 5 inclusive, every Monday.
        assert_eq!(all.len(), 15);
        assert_eq!(all[0].due.to_rfc3339(), "2025-01-27T23:59:00-06:00");
        assert_eq!(all[14].due.to_rfc3339(), "2025-05-05T23:59:00-05:00");
        assert_eq!(all[0].title, "BioE 210 Weekly Assignment (Week 1)");
        assert_eq!(all[0].id(), "bioe210_hw1__20250127");
        assert_eq!(all[0].source, "Canvas");
    }

    #[test]
    fn observe_keeps_future_occurrences_with_stable_numbers() {
        let schedule = WeeklySchedule::from_config(&weekly(), central()).unwrap();
        let now = parse_due("2025-02-20T00:00:00-06:00").unwrap();

        let upcoming = schedule.observe(now).unwrap();
        assert_eq!(upcoming[0].title, "BioE 210 Weekly Assignment (Week 5)");
        assert_eq!(upcoming[0].id(), "bioe210_hw5__20250224");

        let a_week_later = schedule.observe(now + Duration::weeks(1)).unwrap();
        assert_eq!(a_week_later[0].id(), "bioe210_hw6__20250303");
        assert_eq!(upcoming[1].id(), a_week_later[0].id());
    }

    #[test]
    fn occurrences_keep_local_time_across_the_spring_change() {
        let schedule = WeeklySchedule::from_config(&weekly(), central()).unwrap();
        let now = parse_due("2025-04-01T00:00:00-05:00").unwrap();

        let upcoming = schedule.observe(now).unwrap();
        assert_eq!(upcoming[0].due.to_rfc3339(), "2025-04-07T23:59:00-05:00");
        assert_eq!(upcoming[0].id(), "bioe210_hw11__20250407");

        let all = schedule.occurrences();
        assert_eq!(all[5].due.to_rfc3339(), "2025-03-03T23:59:00-06:00");
        assert_eq!(all[6].due.to_rfc3339(), "2025-03-10T23:59:00-05:00");
        // 23:59 on Mar 31 is already past at midnight Apr 1.
        assert!(upcoming.iter().all(|o| o.due > now));
    }

    #[test]
    fn fixed_deadlines_skip_malformed_and_past() {
        let entries = vec![
            DeadlineConfig {
                title: "Proposal".to_string(),
                course: "CS 101".to_string(),
                due: "2025-03-14T23:00:00Z".to_string(),
                source: "Manual".to_string(),
                url: None,
            },
            DeadlineConfig {
                title: "Broken".to_string(),
                course: "CS 101".to_string(),
                due: "March 14".to_string(),
                source: "Manual".to_string(),
                url: None,
            },
            DeadlineConfig {
                title: "Old".to_string(),
                course: "CS 101".to_string(),
                due: "2025-01-01T00:00:00Z".to_string(),
                source: "Manual".to_string(),
                url: None,
            },
        ];
        let source = FixedDeadlines::new(entries, central());
        let now = parse_due("2025-02-20T00:00:00-06:00").unwrap();

        let observed = source.observe(now).unwrap();
        assert_eq!(observed.len(), 1);
        assert_eq!(observed[0].due.to_rfc3339(), "2025-03-14T18:00:00-05:00");
        assert_eq!(observed[0].id(), "proposal__20250314");
    }
}
