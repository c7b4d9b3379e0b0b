//! Stable identities for observed deadlines.
//!
//! An id is the normalized title followed by the due *date*. Time of day,
//! source and url never take part, so a deadline that moves within the same
//! day keeps its record (and its completion flag).
//!
//! Two different assignments that share an exact title and due date collapse
//! into one id; the one processed last in a batch wins the metadata refresh.
//! A retitled assignment gets a fresh id and the old record ages out once it
//! is past due.

use chrono::{DateTime, FixedOffset};

const TITLE_SEPARATOR: char = '_';
const DATE_DELIMITER: &str = "__";
const DATE_FORMAT: &str = "%Y%m%d";

/// Derive the registry id for a deadline.
///
/// The date is taken in the offset carried by `due`; sources normalize their
/// timestamps to the configured zone before building observations.
pub fn derive(title: &str, due: &DateTime<FixedOffset>) -> String {
    format!(
        "{}{}{}",
        normalize_title(title),
        DATE_DELIMITER,
        due.format(DATE_FORMAT)
    )
}

/// Lowercase the title and replace every character outside `[a-z0-9]`.
pub fn normalize_title(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|ch| {
            if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
                ch
            } else {
                TITLE_SEPARATOR
            }
        })
        .collect()
}
