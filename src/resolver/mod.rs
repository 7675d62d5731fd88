//! EventResolver: finds the provider record for a scheduled match and turns
//! it into a normalized verdict.

pub mod engine;
pub mod fetcher;
pub mod finality;
pub mod matching;
pub mod provider;
pub mod types;

pub use engine::{resolve, resolve_request, ResolveRequest, ResolverError, Secrets};
pub use fetcher::{Fetcher, HttpFetcher};
pub use provider::SportsDataClient;
pub use types::{MatchTier, NotFoundReason, ProviderEvent, Resolution, ResolvedEvent};
