//! Sports-results provider client (TheSportsDB v1 JSON API).
//!
//! Every request goes through the injected [`Fetcher`] and is tried against a
//! short list of credential placements; the first that answers wins.

use super::fetcher::Fetcher;
use super::types::ProviderEvent;
use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://www.thesportsdb.com";

/// League label -> provider league id.
const LEAGUES: &[(&str, &str)] = &[
    ("mlb", "4424"),
    ("nba", "4387"),
    ("nfl", "4391"),
    ("nhl", "4380"),
    ("mls", "4346"),
    ("epl", "4328"),
    ("laliga", "4335"),
    ("seriea", "4332"),
    ("bundesliga", "4331"),
    ("ligue1", "4334"),
    ("ucl", "4480"),
];

/// Provider id for a pool's league label. Numeric labels are taken as ids.
pub fn league_id(label: &str) -> Option<&'static str> {
    let key: String = label
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    LEAGUES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, id)| *id)
}

/// Resolve a label to an owned id, accepting raw numeric ids as well.
pub fn league_id_or_numeric(label: &str) -> Option<String> {
    if let Some(id) = league_id(label) {
        return Some(id.to_string());
    }
    let t = label.trim();
    if !t.is_empty() && t.chars().all(|c| c.is_ascii_digit()) {
        return Some(t.to_string());
    }
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KeyPlacement {
    Path,
    Header,
}

const KEY_PLACEMENTS: [KeyPlacement; 2] = [KeyPlacement::Path, KeyPlacement::Header];

pub struct SportsDataClient {
    fetcher: Arc<dyn Fetcher>,
    api_key: String,
    base_url: String,
}

impl SportsDataClient {
    pub fn new(fetcher: Arc<dyn Fetcher>, api_key: impl Into<String>) -> Self {
        Self {
            fetcher,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Url> {
        let raw = format!("{}/api/v1/json/{}/{}", self.base_url, self.api_key, endpoint);
        Url::parse_with_params(&raw, params).with_context(|| format!("bad provider url for {}", endpoint))
    }

    async fn get(&self, endpoint: &str, params: &[(&str, &str)]) -> Result<Option<Value>> {
        let url = self.url(endpoint, params)?;
        let mut last_err = None;

        for placement in KEY_PLACEMENTS {
            let headers: Vec<(String, String)> = match placement {
                KeyPlacement::Path => Vec::new(),
                KeyPlacement::Header => vec![("X-API-KEY".to_string(), self.api_key.clone())],
            };
            match self.fetcher.get_json(url.as_str(), &headers).await {
                Ok(body) => {
                    debug!(endpoint, ?placement, found = body.is_some(), "provider response");
                    return Ok(body);
                }
                Err(e) => {
                    warn!(endpoint, ?placement, error = %e, "provider request failed");
                    last_err = Some(e);
                }
            }
        }

        Err(last_err
            .unwrap_or_else(|| anyhow!("no credential placement tried"))
            .context(format!("{} failed for every credential placement", endpoint)))
    }

    /// Recently completed events of a league.
    pub async fn past_league_events(&self, league_id: &str) -> Result<Vec<ProviderEvent>> {
        let body = self.get("eventspastleague.php", &[("id", league_id)]).await?;
        Ok(events_under(body.as_ref(), "events"))
    }

    pub async fn lookup_event(&self, event_id: &str) -> Result<Option<ProviderEvent>> {
        let body = self.get("lookupevent.php", &[("id", event_id)]).await?;
        Ok(events_under(body.as_ref(), "events").into_iter().next())
    }

    /// Results record of an event, when the provider has published one.
    pub async fn event_results(&self, event_id: &str) -> Result<Option<ProviderEvent>> {
        let body = self.get("eventresults.php", &[("id", event_id)]).await?;
        let mut records = events_under(body.as_ref(), "results");
        if records.is_empty() {
            records = events_under(body.as_ref(), "events");
        }
        Ok(records
            .iter()
            .position(|ev| ev.id() == Some(event_id))
            .map(|idx| records.swap_remove(idx))
            .or_else(|| records.into_iter().next()))
    }

    /// Seasons of a league, most recent first, at most `limit`.
    pub async fn recent_seasons(&self, league_id: &str, limit: usize) -> Result<Vec<String>> {
        let body = self.get("search_all_seasons.php", &[("id", league_id)]).await?;
        let mut seasons: Vec<String> = list_under(body.as_ref(), "seasons")
            .iter()
            .filter_map(|s| s.get("strSeason"))
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect();
        seasons.sort_by(|a, b| b.cmp(a));
        seasons.dedup();
        seasons.truncate(limit);
        Ok(seasons)
    }

    pub async fn season_events(&self, league_id: &str, season: &str) -> Result<Vec<ProviderEvent>> {
        let body = self
            .get("eventsseason.php", &[("id", league_id), ("s", season)])
            .await?;
        Ok(events_under(body.as_ref(), "events"))
    }
}

fn list_under<'a>(body: Option<&'a Value>, key: &str) -> &'a [Value] {
    match body.and_then(|b| b.get(key)) {
        Some(Value::Array(items)) => items.as_slice(),
        _ => &[],
    }
}

/// Records under `key`; `null`, a missing key or malformed entries yield
/// nothing rather than an error.
fn events_under(body: Option<&Value>, key: &str) -> Vec<ProviderEvent> {
    list_under(body, key)
        .iter()
        .filter(|v| v.is_object())
        .filter_map(|v| serde_json::from_value::<ProviderEvent>(v.clone()).ok())
        .collect()
}
