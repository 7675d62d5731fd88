//! SettleBot - settlement request dispatcher
//!
//! Walks every known pool, finds the ones whose lock time has passed and
//! that have not asked for a result yet, and sends their settlement request
//! to the compute network. One pass by default, or repeated with
//! `--watch-interval-secs`.

use anyhow::{Context, Result};
use clap::Parser;
use dotenv::dotenv;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use alloy::primitives::Address;
use settlebot_backend::{
    chain::{parse_signer, RequestMethod, RpcClient, TxSender},
    config::{
        DispatchConfig, DEFAULT_CALLBACK_GAS_LIMIT, DEFAULT_DISCOVERY_FILE,
        DEFAULT_MAX_REQUESTS_PER_RUN, DEFAULT_MIN_GAP_SECONDS, DEFAULT_POINTER_FILE,
    },
    pool::RpcPoolReader,
    resolver::HttpFetcher,
    settlement::{
        discovery, secrets, DispatchReport, Dispatcher, RequestSubmitter, RpcSimulator,
        RpcSubmitter,
    },
};

#[derive(Parser, Debug)]
#[command(name = "settlebot")]
#[command(about = "Dispatch settlement requests for locked prediction pools")]
struct Args {
    /// Chain JSON-RPC endpoint
    #[arg(long, env = "RPC_URL", default_value = "")]
    rpc_url: String,

    /// Hex private key of the account that sends requests
    #[arg(long, env = "PRIVATE_KEY", hide_env_values = true)]
    private_key: Option<String>,

    /// Compute network subscription id
    #[arg(long, env = "SUBSCRIPTION_ID", default_value_t = 0)]
    subscription_id: u64,

    /// Gas limit for the fulfillment callback
    #[arg(long, env = "CALLBACK_GAS_LIMIT", default_value_t = DEFAULT_CALLBACK_GAS_LIMIT)]
    callback_gas_limit: u32,

    /// DON-hosted secrets slot
    #[arg(long, env = "SECRETS_SLOT_ID", default_value_t = 0)]
    secrets_slot_id: u8,

    /// DON-hosted secrets version (skips pointer lookup together with --don-id)
    #[arg(long, env = "SECRETS_VERSION")]
    secrets_version: Option<u64>,

    #[arg(long, env = "DON_ID")]
    don_id: Option<String>,

    /// URL of a JSON secrets pointer document
    #[arg(long, env = "SECRETS_POINTER_URL")]
    secrets_pointer_url: Option<String>,

    /// Local secrets pointer file used when nothing else resolves
    #[arg(long, env = "SECRETS_POINTER_FILE", default_value = DEFAULT_POINTER_FILE)]
    secrets_pointer_file: PathBuf,

    /// Simulate only; eligible pools still count against the cap
    #[arg(long, env = "DRY_RUN")]
    dry_run: bool,

    #[arg(long, env = "MAX_REQUESTS_PER_RUN", default_value_t = DEFAULT_MAX_REQUESTS_PER_RUN)]
    max_requests_per_run: usize,

    /// Seconds to wait after lock time before requesting
    #[arg(long, env = "MIN_GAP_SECONDS", default_value_t = DEFAULT_MIN_GAP_SECONDS)]
    min_gap_seconds: u64,

    /// Comma separated pool addresses (overrides the discovery file)
    #[arg(long = "contracts", env = "CONTRACT_ADDRESSES", value_delimiter = ',')]
    contracts: Vec<String>,

    #[arg(long, env = "POOLS_DISCOVERY_FILE", default_value = DEFAULT_DISCOVERY_FILE)]
    discovery_file: PathBuf,

    /// Send the 6-field argument tuple understood by older pools
    #[arg(long, env = "COMPAT_ARGS")]
    compat_args: bool,

    /// send | retry
    #[arg(long, env = "REQUEST_METHOD", default_value = "send")]
    request_method: RequestMethod,

    #[arg(long, env = "RPC_TIMEOUT_SECS", default_value_t = 15)]
    rpc_timeout_secs: u64,

    /// 0 = broadcast without waiting for a receipt
    #[arg(long, env = "CONFIRM_TIMEOUT_SECS", default_value_t = 90)]
    confirm_timeout_secs: u64,

    #[arg(long, env = "GAS_MULTIPLIER_PCT", default_value_t = 120)]
    gas_multiplier_pct: u64,

    /// Repeat the pass on this interval until Ctrl-C
    #[arg(long, env = "WATCH_INTERVAL_SECS")]
    watch_interval_secs: Option<u64>,

    /// Account to simulate from (default: the signer's address)
    #[arg(long, env = "SIMULATE_FROM")]
    simulate_from: Option<Address>,
}

impl Args {
    fn into_config(self) -> DispatchConfig {
        DispatchConfig {
            rpc_url: self.rpc_url,
            private_key: self.private_key,
            subscription_id: self.subscription_id,
            callback_gas_limit: self.callback_gas_limit,
            secrets_slot_id: self.secrets_slot_id,
            secrets_version: self.secrets_version,
            don_id: self.don_id,
            secrets_pointer_url: self.secrets_pointer_url,
            secrets_pointer_file: self.secrets_pointer_file,
            dry_run: self.dry_run,
            max_requests_per_run: self.max_requests_per_run,
            min_gap_seconds: self.min_gap_seconds,
            contracts: self
                .contracts
                .into_iter()
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            discovery_file: self.discovery_file,
            compat_args: self.compat_args,
            request_method: self.request_method,
            rpc_timeout: Duration::from_secs(self.rpc_timeout_secs.max(1)),
            confirm_timeout: Duration::from_secs(self.confirm_timeout_secs),
            gas_multiplier_pct: self.gas_multiplier_pct,
            watch_interval: self
                .watch_interval_secs
                .filter(|s| *s > 0)
                .map(Duration::from_secs),
            simulate_from: self.simulate_from,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    load_env();
    init_tracing();

    let config = Args::parse().into_config();
    info!(?config, "settlebot starting");
    config.ensure_valid()?;

    let fetcher = HttpFetcher::new(config.rpc_timeout)?;
    let pointer = secrets::resolve(&config.secrets_settings(), &fetcher).await?;
    info!(
        version = pointer.secrets_version,
        don_id = %pointer.don_id,
        source = pointer.source.as_str(),
        "using secrets pointer"
    );
    let params = config.request_params(&pointer)?;

    let pools = discovery::pool_addresses(&config.contracts, &config.discovery_file)?;
    if pools.is_empty() {
        warn!("no pool addresses configured, nothing to do");
        return Ok(());
    }
    info!(pools = pools.len(), "pool list loaded");

    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone(), config.rpc_timeout)?);

    let signer = config
        .private_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(parse_signer)
        .transpose()?;
    let from = match config.simulation_from(signer.as_ref().map(|s| s.address())) {
        Some(from) => from,
        None => {
            warn!("no signer or --simulate-from given, simulating from the zero address");
            Address::ZERO
        }
    };

    let submitter: Option<Arc<dyn RequestSubmitter>> = match signer {
        Some(signer) if !config.dry_run => {
            let sender = TxSender::connect(rpc.clone(), signer, config.gas_multiplier_pct)
                .await
                .context("connecting transaction sender")?;
            info!(from = %sender.address(), chain_id = sender.chain_id(), "signer ready");
            Some(Arc::new(RpcSubmitter::new(sender, config.confirm_timeout)))
        }
        _ => None,
    };

    let dispatcher = Dispatcher::new(
        Arc::new(RpcPoolReader::new(rpc.clone())),
        Arc::new(RpcSimulator::new(rpc, from)),
        submitter,
        config.dispatch_settings(params),
    );

    let stop = dispatcher.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Ctrl-C received, finishing current pool");
            stop.stop();
        }
    });

    let Some(interval) = config.watch_interval else {
        let report = dispatcher.run(&pools, config.max_requests_per_run).await;
        log_report(&report);
        return Ok(());
    };

    // re-read the discovery file each pass so new deployments get picked up
    dispatcher
        .watch(
            interval,
            config.max_requests_per_run,
            pools,
            || discovery::pool_addresses(&config.contracts, &config.discovery_file),
            log_report,
        )
        .await;

    info!("settlebot stopped");
    Ok(())
}

fn log_report(report: &DispatchReport) {
    for outcome in &report.outcomes {
        info!(
            pool = %outcome.pool,
            state = ?outcome.state,
            reason = outcome.reason.as_deref().unwrap_or("-"),
            "pool outcome"
        );
    }
    info!(
        submitted = report.submitted,
        attempted = report.attempted,
        skipped = report.skipped,
        errors = report.errors,
        "pass summary"
    );
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "settlebot_backend=info,settlebot=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn load_env() {
    // 1) Standard dotenv search (cwd + parents)
    let _ = dotenv();

    // 2) Also try the crate's own .env when started from elsewhere
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let candidate = manifest_dir.join(".env");
    if candidate.exists() {
        let _ = dotenv::from_path(&candidate);
    }
}
