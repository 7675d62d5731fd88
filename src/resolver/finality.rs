//! Has the event finished?
//!
//! Final means both scores are present and either the status is in the
//! finished vocabulary or there is no status at all. The second branch
//! covers historical records that carry final scores but no status.

use super::types::ProviderEvent;

/// Regular time, overtime, shootout and penalty finish codes.
const FINISHED_STATUSES: &[&str] = &[
    "FT",
    "AET",
    "AOT",
    "AP",
    "PEN",
    "FT_PEN",
    "FT-PEN",
    "F/OT",
    "F/SO",
    "FT/OT",
    "FT/SO",
    "MATCH FINISHED",
    "FINISHED",
    "ENDED",
    "AFTER EXTRA TIME",
    "AFTER OVER TIME",
    "AFTER OVERTIME",
    "AFTER PENALTIES",
    "AFTER PEN.",
];

pub fn is_finished_status(status: &str) -> bool {
    let upper = status.trim().to_uppercase();
    FINISHED_STATUSES.contains(&upper.as_str()) || upper.contains("FINAL")
}

pub fn is_final(status: Option<&str>, home_score: Option<i64>, away_score: Option<i64>) -> bool {
    let scores_present = home_score.is_some() && away_score.is_some();
    match status.map(str::trim).filter(|s| !s.is_empty()) {
        Some(s) => scores_present && is_finished_status(s),
        None => scores_present,
    }
}

pub fn event_is_final(event: &ProviderEvent) -> bool {
    is_final(event.status(), event.home_score(), event.away_score())
}
