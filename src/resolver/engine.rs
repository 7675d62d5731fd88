//! EventResolver: argument parsing and the tiered search.
//!
//! Tiers run in a fixed order and the first one that produces a candidate
//! wins; its name travels with the verdict. Fatal problems (argument count,
//! missing credential, provider unreachable) come back as `ResolverError`,
//! everything else as a [`Resolution`].

use super::fetcher::Fetcher;
use super::finality::event_is_final;
use super::matching::{closest_kickoff, event_matches_pair};
use super::provider::{league_id_or_numeric, SportsDataClient};
use super::types::{MatchTier, NotFoundReason, ProviderEvent, Resolution, ResolvedEvent};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How many seasons the schedule tier walks back.
const SEASONS_TO_SCAN: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverError {
    /// Anything other than 8 or 9 positional arguments.
    ArgumentCount(usize),
    MissingCredential,
    InvalidArgument { name: &'static str, value: String },
    /// The provider could not be reached under any credential placement.
    Provider(String),
}

impl fmt::Display for ResolverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ArgumentCount(n) => write!(f, "expected 8 or 9 arguments, got {}", n),
            Self::MissingCredential => write!(f, "sports provider API key is not set"),
            Self::InvalidArgument { name, value } => {
                write!(f, "invalid {} argument: {:?}", name, value)
            }
            Self::Provider(msg) => write!(f, "provider error: {}", msg),
        }
    }
}

impl std::error::Error for ResolverError {}

/// Credentials handed to one resolution.
#[derive(Clone, Default)]
pub struct Secrets {
    pub api_key: Option<String>,
}

impl Secrets {
    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self {
            api_key: Some(key.into()),
        }
    }

    fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .finish()
    }
}

/// Positional arguments, in the order the settlement request sends them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub league: String,
    pub date_from: String,
    pub date_to: String,
    pub team_a_code: String,
    pub team_b_code: String,
    pub team_a_name: String,
    pub team_b_name: String,
    pub lock_time: i64,
    pub id_event: Option<String>,
}

impl ResolveRequest {
    pub fn from_args(args: &[String]) -> Result<Self, ResolverError> {
        if !(8..=9).contains(&args.len()) {
            return Err(ResolverError::ArgumentCount(args.len()));
        }
        let field = |i: usize| args[i].trim().to_string();

        let raw_lock = field(7);
        let lock_time = raw_lock
            .parse::<i64>()
            .map_err(|_| ResolverError::InvalidArgument {
                name: "lockTime",
                value: raw_lock.clone(),
            })?;

        Ok(Self {
            league: field(0).to_lowercase(),
            date_from: field(1),
            date_to: field(2),
            team_a_code: field(3).to_uppercase(),
            team_b_code: field(4).to_uppercase(),
            team_a_name: field(5),
            team_b_name: field(6),
            lock_time,
            id_event: args.get(8).map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
    IdLookup,
    PrevLeague,
    Season,
}

const STRATEGIES: [Strategy; 3] = [Strategy::IdLookup, Strategy::PrevLeague, Strategy::Season];

type Candidate = (MatchTier, ProviderEvent);

struct Search<'a> {
    req: &'a ResolveRequest,
    client: SportsDataClient,
    league_id: Option<String>,
}

impl Search<'_> {
    async fn run(&self, strategy: Strategy) -> anyhow::Result<Option<Candidate>> {
        match strategy {
            Strategy::IdLookup => self.by_id().await,
            Strategy::PrevLeague => self.previous_league().await,
            Strategy::Season => self.season_schedule().await,
        }
    }

    async fn by_id(&self) -> anyhow::Result<Option<Candidate>> {
        let Some(id) = self.req.id_event.as_deref() else {
            return Ok(None);
        };
        if let Some(ev) = self.client.event_results(id).await? {
            return Ok(Some((MatchTier::IdLookup, ev)));
        }
        let base = self.client.lookup_event(id).await?;
        if base.is_none() {
            warn!(id_event = id, "event id resolved to nothing");
        }
        Ok(base.map(|ev| (MatchTier::IdLookup, ev)))
    }

    fn pick<'e, I>(&self, events: I) -> Option<&'e ProviderEvent>
    where
        I: IntoIterator<Item = &'e ProviderEvent>,
    {
        let (a, b) = (&self.req.team_a_name, &self.req.team_b_name);
        closest_kickoff(
            events.into_iter().filter(|ev| event_matches_pair(ev, a, b)),
            self.req.lock_time,
        )
    }

    async fn previous_league(&self) -> anyhow::Result<Option<Candidate>> {
        let Some(league) = self.league_id.as_deref() else {
            return Ok(None);
        };
        let events = self.client.past_league_events(league).await?;
        debug!(count = events.len(), "previous league events");
        Ok(self
            .pick(&events)
            .map(|ev| (MatchTier::PrevLeagueMatch, ev.clone())))
    }

    async fn season_schedule(&self) -> anyhow::Result<Option<Candidate>> {
        let Some(league) = self.league_id.as_deref() else {
            return Ok(None);
        };
        for season in self.client.recent_seasons(league, SEASONS_TO_SCAN).await? {
            let events = self.client.season_events(league, &season).await?;
            debug!(season = %season, count = events.len(), "season schedule");

            let same_day = events.iter().filter(|ev| ev.is_on_date(&self.req.date_from));
            if let Some(ev) = self.pick(same_day) {
                return Ok(Some((MatchTier::SeasonDayMatch, ev.clone())));
            }
            if let Some(ev) = self.pick(&events) {
                return Ok(Some((MatchTier::SeasonClosest, ev.clone())));
            }
        }
        Ok(None)
    }
}

/// Run one resolution from raw positional arguments.
pub async fn resolve(
    args: &[String],
    secrets: &Secrets,
    fetcher: Arc<dyn Fetcher>,
) -> Result<Resolution, ResolverError> {
    let req = ResolveRequest::from_args(args)?;
    let api_key = secrets.api_key().ok_or(ResolverError::MissingCredential)?;
    resolve_request(&req, SportsDataClient::new(fetcher, api_key)).await
}

pub async fn resolve_request(
    req: &ResolveRequest,
    client: SportsDataClient,
) -> Result<Resolution, ResolverError> {
    let league_id = league_id_or_numeric(&req.league);
    if league_id.is_none() {
        warn!(league = %req.league, "unknown league label, schedule searches skipped");
    }
    let search = Search {
        req,
        client,
        league_id,
    };

    let mut found = None;
    for strategy in STRATEGIES {
        let hit = search
            .run(strategy)
            .await
            .map_err(|e| ResolverError::Provider(format!("{:#}", e)))?;
        if hit.is_some() {
            found = hit;
            break;
        }
    }

    let Some((match_tier, event)) = found else {
        let reason = if req.id_event.is_some() {
            NotFoundReason::IdMissing
        } else {
            NotFoundReason::None
        };
        info!(?reason, "no candidate event");
        return Ok(Resolution::NotFound(reason));
    };

    if event_is_final(&event) {
        info!(
            tier = match_tier.as_str(),
            id_event = event.id().unwrap_or("-"),
            "event resolved"
        );
        Ok(Resolution::Resolved(ResolvedEvent::from_event(&event, match_tier)))
    } else {
        info!(
            tier = match_tier.as_str(),
            id_event = event.id().unwrap_or("-"),
            status = event.status().unwrap_or("-"),
            "candidate not final"
        );
        Ok(Resolution::NotFinal { match_tier, event })
    }
}
