//! Event Resolver
//!
//! Runs one resolution as an isolated unit: positional arguments in, one
//! JSON line on stdout. Logs go to stderr.
//!
//! Usage:
//!   resolve_event mlb 2023-11-14 2023-11-15 NYY BOS "New York Yankees" "Boston Red Sox" 1700000000 [idEvent]
//!
//! Environment Variables:
//!   SPORTS_API_KEY - provider API key (required)
//!   RESOLVER_TIMEOUT_SECS - per-request timeout (default: 10)
//!
//! Exit status is 1 on a fatal error (bad argument count, missing key,
//! provider unreachable); "not found" and "not final" are normal answers.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use settlebot_backend::resolver::{resolve, HttpFetcher, Secrets};

#[derive(Parser, Debug)]
#[command(name = "resolve_event")]
#[command(about = "Resolve a scheduled match against the sports-results provider")]
struct Args {
    /// Provider API key
    #[arg(long, env = "SPORTS_API_KEY", hide_env_values = true)]
    sports_api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "RESOLVER_TIMEOUT_SECS", default_value_t = 10)]
    timeout_secs: u64,

    /// league dateFrom dateTo teamACode teamBCode teamAName teamBName lockTime [idEvent]
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

#[tokio::main]
async fn main() {
    let _ = dotenv::dotenv();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settlebot_backend=info,resolve_event=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let secrets = Secrets {
        api_key: args.sports_api_key,
    };

    let fetcher = match HttpFetcher::new(Duration::from_secs(args.timeout_secs.max(1))) {
        Ok(f) => Arc::new(f),
        Err(e) => {
            error!(error = %format!("{:#}", e), "could not build HTTP client");
            std::process::exit(1);
        }
    };

    match resolve(&args.args, &secrets, fetcher).await {
        Ok(resolution) => println!("{}", resolution.to_json()),
        Err(e) => {
            error!(error = %e, "resolution aborted");
            std::process::exit(1);
        }
    }
}
