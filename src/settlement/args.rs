//! Request argument tuple and the game-day window it carries.
//!
//! Game days are US Eastern calendar days: a 10pm ET first pitch is still
//! "today" for the schedule even though it is tomorrow in UTC. The window
//! end is the next calendar day, computed on the date itself so DST
//! transitions can't shift it.

use crate::pool::PoolSnapshot;
use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Utc, Weekday};

const FULL_FIELDS: [&str; 8] = [
    "league",
    "dateFrom",
    "dateTo",
    "teamACode",
    "teamBCode",
    "teamAName",
    "teamBName",
    "lockTime",
];

const COMPAT_FIELDS: [&str; 6] = [
    "league",
    "dateFrom",
    "teamACode",
    "teamBCode",
    "teamAName",
    "teamBName",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArgsError {
    /// A field was empty after trimming.
    BlankField { index: usize, name: &'static str },
    /// Lock time is unset or outside the calendar range.
    NoWindow { lock_time: u64 },
    Empty,
}

impl std::fmt::Display for ArgsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BlankField { index, name } => {
                write!(f, "invalid args: field {} ({}) is blank", index, name)
            }
            Self::NoWindow { lock_time } => {
                write!(f, "invalid args: no game-day window for lock time {}", lock_time)
            }
            Self::Empty => write!(f, "invalid args: empty argument list"),
        }
    }
}

impl std::error::Error for ArgsError {}

/// Validated, ordered request arguments. Only constructible through
/// [`build`], so a value of this type is never partial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestArgs(Vec<String>);

impl RequestArgs {
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Build the argument tuple for `snapshot`.
///
/// full: `[league, dateFrom, dateTo, codeA, codeB, nameA, nameB, lockTime]`
/// compat: `[league, dateFrom, codeA, codeB, nameA, nameB]`
pub fn build(snapshot: &PoolSnapshot, compat: bool) -> Result<RequestArgs, ArgsError> {
    if snapshot.lock_time == 0 {
        return Err(ArgsError::NoWindow { lock_time: 0 });
    }
    let date_from = eastern_date(snapshot.lock_time).ok_or(ArgsError::NoWindow {
        lock_time: snapshot.lock_time,
    })?;
    let date_to = date_from
        .checked_add_days(Days::new(1))
        .ok_or(ArgsError::NoWindow {
            lock_time: snapshot.lock_time,
        })?;

    let code_a = snapshot.team_a_code.to_uppercase();
    let code_b = snapshot.team_b_code.to_uppercase();
    let date_from = date_from.format("%Y-%m-%d").to_string();

    let (raw, names): (Vec<String>, &[&'static str]) = if compat {
        (
            vec![
                snapshot.league.clone(),
                date_from,
                code_a,
                code_b,
                snapshot.team_a_name.clone(),
                snapshot.team_b_name.clone(),
            ],
            &COMPAT_FIELDS[..],
        )
    } else {
        (
            vec![
                snapshot.league.clone(),
                date_from,
                date_to.format("%Y-%m-%d").to_string(),
                code_a,
                code_b,
                snapshot.team_a_name.clone(),
                snapshot.team_b_name.clone(),
                snapshot.lock_time.to_string(),
            ],
            &FULL_FIELDS[..],
        )
    };

    validate(raw, names)
}

fn validate(raw: Vec<String>, names: &[&'static str]) -> Result<RequestArgs, ArgsError> {
    if raw.is_empty() {
        return Err(ArgsError::Empty);
    }
    let mut out = Vec::with_capacity(raw.len());
    for (index, field) in raw.into_iter().enumerate() {
        let trimmed = field.trim();
        if trimmed.is_empty() {
            return Err(ArgsError::BlankField {
                index,
                name: names.get(index).copied().unwrap_or("?"),
            });
        }
        out.push(trimmed.to_string());
    }
    Ok(RequestArgs(out))
}

/// Calendar date in US Eastern time for an epoch second.
pub fn eastern_date(epoch_secs: u64) -> Option<NaiveDate> {
    let secs = i64::try_from(epoch_secs).ok()?;
    let utc = Utc.timestamp_opt(secs, 0).single()?;
    let offset_hours = if is_us_eastern_dst(&utc) { -4 } else { -5 };
    let local = utc.checked_add_signed(chrono::Duration::hours(offset_hours))?;
    Some(local.date_naive())
}

/// US daylight saving for the Eastern zone.
/// 2007+: second Sunday of March 07:00 UTC until first Sunday of November 06:00 UTC.
/// 1987-2006: first Sunday of April until last Sunday of October.
fn is_us_eastern_dst(utc: &DateTime<Utc>) -> bool {
    let year = utc.year();
    let (start, end) = if year >= 2007 {
        (
            NaiveDate::from_weekday_of_month_opt(year, 3, Weekday::Sun, 2),
            NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Sun, 1),
        )
    } else {
        (
            NaiveDate::from_weekday_of_month_opt(year, 4, Weekday::Sun, 1),
            last_sunday(year, 10),
        )
    };
    let (Some(start), Some(end)) = (start, end) else {
        return false;
    };
    // 02:00 EST == 07:00 UTC, 02:00 EDT == 06:00 UTC
    let (Some(start), Some(end)) = (start.and_hms_opt(7, 0, 0), end.and_hms_opt(6, 0, 0)) else {
        return false;
    };
    let naive = utc.naive_utc();
    naive >= start && naive < end
}

fn last_sunday(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, 5)
        .or_else(|| NaiveDate::from_weekday_of_month_opt(year, month, Weekday::Sun, 4))
}
