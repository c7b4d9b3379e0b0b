//! Urgency tiers for pending deadlines.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

const SECONDS_PER_HOUR: i64 = 60 * 60;
const SECONDS_PER_DAY: i64 = 24 * SECONDS_PER_HOUR;

/// Length of the "due this week" window, shared with [`crate::digest`].
pub const WEEK_WINDOW_SECS: i64 = 7 * SECONDS_PER_DAY;

/// Discrete urgency tier, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Urgent,
    Tomorrow,
    Near,
    Week,
    Later,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Tier::Urgent => "urgent",
            Tier::Tomorrow => "tomorrow",
            Tier::Near => "near",
            Tier::Week => "week",
            Tier::Later => "later",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Urgency {
    pub tier: Tier,
    pub label: String,
}

/// Classify the time left until `due` as seen from `now`.
///
/// Hours and days are whole units by floor division of the remaining
/// seconds. Anything past the 7-day window is `later`, so 7d exactly is
/// still `week` but 7d1h is not.
pub fn classify(due: DateTime<FixedOffset>, now: DateTime<FixedOffset>) -> Urgency {
    let remaining = (due - now).num_seconds();
    let hours = remaining.div_euclid(SECONDS_PER_HOUR);
    let days = remaining.div_euclid(SECONDS_PER_DAY);

    if remaining < 0 {
        return Urgency {
            tier: Tier::Urgent,
            label: "overdue".to_string(),
        };
    }
    if hours < 24 {
        return Urgency {
            tier: Tier::Urgent,
            label: format!("{hours}h left"),
        };
    }

    let tier = match days {
        1 => Tier::Tomorrow,
        2..=3 => Tier::Near,
        _ if remaining <= WEEK_WINDOW_SECS => Tier::Week,
        _ => Tier::Later,
    };
    let label = match tier {
        Tier::Tomorrow => "Tomorrow".to_string(),
        _ => format!("{days} days"),
    };
    Urgency { tier, label }
}
