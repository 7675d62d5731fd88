//! Provider records and resolver verdicts.
//!
//! Provider events are partially populated and loosely typed: numbers come
//! back as strings, strings as numbers, and missing values as `null`, `""`
//! or an absent key. Every field is therefore an `Option<String>` and the
//! accessors below are the only way the resolver reads them.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProviderEvent {
    #[serde(rename = "idEvent", default, deserialize_with = "de_loose_string")]
    pub id_event: Option<String>,
    #[serde(rename = "idHomeTeam", default, deserialize_with = "de_loose_string")]
    pub id_home_team: Option<String>,
    #[serde(rename = "idAwayTeam", default, deserialize_with = "de_loose_string")]
    pub id_away_team: Option<String>,
    #[serde(rename = "strHomeTeam", default, deserialize_with = "de_loose_string")]
    pub str_home_team: Option<String>,
    #[serde(rename = "strAwayTeam", default, deserialize_with = "de_loose_string")]
    pub str_away_team: Option<String>,
    #[serde(rename = "intHomeScore", default, deserialize_with = "de_loose_string")]
    pub int_home_score: Option<String>,
    #[serde(rename = "intAwayScore", default, deserialize_with = "de_loose_string")]
    pub int_away_score: Option<String>,
    #[serde(rename = "strStatus", default, deserialize_with = "de_loose_string")]
    pub str_status: Option<String>,
    #[serde(rename = "dateEvent", default, deserialize_with = "de_loose_string")]
    pub date_event: Option<String>,
    #[serde(rename = "dateEventLocal", default, deserialize_with = "de_loose_string")]
    pub date_event_local: Option<String>,
    #[serde(rename = "strTime", default, deserialize_with = "de_loose_string")]
    pub str_time: Option<String>,
    #[serde(rename = "strTimestamp", default, deserialize_with = "de_loose_string")]
    pub str_timestamp: Option<String>,
}

/// String, number or bool become `Some(text)`; null, blank and anything
/// structured become `None`.
fn de_loose_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    Ok(match v {
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

fn parse_score(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    raw.parse::<i64>().ok().or_else(|| {
        raw.parse::<f64>()
            .ok()
            .filter(|f| f.is_finite() && f.fract() == 0.0)
            .map(|f| f as i64)
    })
}

impl ProviderEvent {
    pub fn id(&self) -> Option<&str> {
        self.id_event.as_deref()
    }

    pub fn home_name(&self) -> Option<&str> {
        self.str_home_team.as_deref()
    }

    pub fn away_name(&self) -> Option<&str> {
        self.str_away_team.as_deref()
    }

    pub fn home_score(&self) -> Option<i64> {
        parse_score(self.int_home_score.as_deref())
    }

    pub fn away_score(&self) -> Option<i64> {
        parse_score(self.int_away_score.as_deref())
    }

    pub fn status(&self) -> Option<&str> {
        self.str_status.as_deref()
    }

    /// `true` when the event is scheduled on `date` (YYYY-MM-DD), by either
    /// the UTC or the local event date.
    pub fn is_on_date(&self, date: &str) -> bool {
        self.date_event.as_deref() == Some(date) || self.date_event_local.as_deref() == Some(date)
    }

    /// Kickoff in epoch seconds. Uses `strTimestamp`, falling back to
    /// `dateEvent` + `strTime`. Naive times are taken as UTC.
    pub fn kickoff_epoch(&self) -> Option<i64> {
        if let Some(ts) = self.str_timestamp.as_deref() {
            if let Some(epoch) = parse_timestamp(ts) {
                return Some(epoch);
            }
        }
        let date = NaiveDate::parse_from_str(self.date_event.as_deref()?, "%Y-%m-%d").ok()?;
        let time = self
            .str_time
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_default();
        Some(date.and_time(time).and_utc().timestamp())
    }

    /// Timestamp string for the verdict payload.
    pub fn timestamp_label(&self) -> Option<String> {
        if let Some(ts) = &self.str_timestamp {
            return Some(ts.clone());
        }
        match (&self.date_event, &self.str_time) {
            (Some(d), Some(t)) => Some(format!("{}T{}", d, t)),
            _ => None,
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<i64> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.timestamp());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc().timestamp());
        }
    }
    None
}

fn parse_time(raw: &str) -> Option<NaiveTime> {
    // "19:05:00", "19:05", "19:05:00+00:00"
    let head = raw.get(..8).unwrap_or(raw);
    NaiveTime::parse_from_str(head, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(raw.get(..5).unwrap_or(raw), "%H:%M"))
        .ok()
}

/// Which search strategy produced the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchTier {
    IdLookup,
    PrevLeagueMatch,
    SeasonDayMatch,
    SeasonClosest,
}

impl MatchTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IdLookup => "id_lookup",
            Self::PrevLeagueMatch => "prev_league_match",
            Self::SeasonDayMatch => "season_day_match",
            Self::SeasonClosest => "season_closest",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Side {
    pub id: Option<String>,
    pub name: Option<String>,
    pub score: Option<i64>,
}

/// Normalized verdict for a finished event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedEvent {
    pub match_tier: MatchTier,
    pub id_event: Option<String>,
    pub home: Side,
    pub away: Side,
    pub status: Option<String>,
    pub date_event: Option<String>,
    pub timestamp: Option<String>,
}

impl ResolvedEvent {
    pub fn from_event(event: &ProviderEvent, match_tier: MatchTier) -> Self {
        Self {
            match_tier,
            id_event: event.id_event.clone(),
            home: Side {
                id: event.id_home_team.clone(),
                name: event.str_home_team.clone(),
                score: event.home_score(),
            },
            away: Side {
                id: event.id_away_team.clone(),
                name: event.str_away_team.clone(),
                score: event.away_score(),
            },
            status: event.str_status.clone(),
            date_event: event.date_event.clone(),
            timestamp: event.timestamp_label(),
        }
    }
}

/// Why no candidate was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundReason {
    /// No tier matched.
    None,
    /// An explicit event id was given, resolved to nothing, and no other
    /// tier matched either.
    IdMissing,
}

/// Recoverable outcome of one resolution.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedEvent),
    /// A candidate exists but isn't finished yet; the caller should retry
    /// later.
    NotFinal {
        match_tier: MatchTier,
        event: ProviderEvent,
    },
    NotFound(NotFoundReason),
}

impl Resolution {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    /// The single JSON document returned to the contract.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Resolved(ev) => {
                let mut v = serde_json::to_value(ev).unwrap_or_else(|_| json!({}));
                v["ok"] = json!(true);
                v
            }
            Self::NotFinal { match_tier, event } => json!({
                "ok": false,
                "reason": "not_final",
                "matchTier": match_tier.as_str(),
                "idEvent": event.id_event,
                "status": event.str_status,
            }),
            Self::NotFound(NotFoundReason::None) => json!({ "ok": false, "reason": "none" }),
            Self::NotFound(NotFoundReason::IdMissing) => {
                json!({ "ok": false, "reason": "id_missing" })
            }
        }
    }
}
