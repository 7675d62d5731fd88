//! Throttled dispatch pass over all pools.
//!
//! Pools are processed strictly one after another. Each pool ends in one of
//! `Dispatched`, `Skipped` or `Error`; nothing is retried inside a pass, a
//! pool that failed simply stays eligible for the next one.

use super::args::{self, RequestArgs};
use super::gate;
use super::simulator::RequestSimulator;
use super::submit::RequestSubmitter;
use crate::chain::RequestParams;
use crate::pool::PoolStateReader;
use alloy::primitives::{Address, B256};
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Dispatched,
    Skipped,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOutcome {
    pub pool: Address,
    pub state: PoolState,
    pub reason: Option<String>,
    pub tx_hash: Option<B256>,
}

impl PoolOutcome {
    fn dispatched(pool: Address, tx_hash: Option<B256>) -> Self {
        Self {
            pool,
            state: PoolState::Dispatched,
            reason: None,
            tx_hash,
        }
    }

    fn skipped(pool: Address, reason: String) -> Self {
        Self {
            pool,
            state: PoolState::Skipped,
            reason: Some(reason),
            tx_hash: None,
        }
    }

    /// `tx_hash` is set when the transaction was broadcast before failing.
    fn error(pool: Address, reason: String, tx_hash: Option<B256>) -> Self {
        Self {
            pool,
            state: PoolState::Error,
            reason: Some(reason),
            tx_hash,
        }
    }

    /// A write reached the chain (or would have, under dry-run).
    fn is_attempt(&self) -> bool {
        match self.state {
            PoolState::Dispatched => true,
            PoolState::Error => self.tx_hash.is_some(),
            PoolState::Skipped => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub submitted: usize,
    pub skipped: usize,
    pub errors: usize,
    /// Writes that reached `eth_sendRawTransaction`, successful or not.
    /// This is what the per-run cap limits.
    pub attempted: usize,
    pub outcomes: Vec<PoolOutcome>,
}

impl DispatchReport {
    fn record(&mut self, outcome: PoolOutcome) {
        if outcome.is_attempt() {
            self.attempted += 1;
        }
        match outcome.state {
            PoolState::Dispatched => self.submitted += 1,
            PoolState::Skipped => self.skipped += 1,
            PoolState::Error => self.errors += 1,
        }
        self.outcomes.push(outcome);
    }
}

#[derive(Debug, Clone)]
pub struct DispatchSettings {
    pub gap_seconds: u64,
    pub compat_args: bool,
    /// Skip the real submission but still count it against the cap.
    pub dry_run: bool,
    pub params: RequestParams,
}

type Clock = Arc<dyn Fn() -> u64 + Send + Sync>;

/// Ends a pass after the pool in flight and wakes a waiting watch loop.
#[derive(Clone, Default)]
pub struct StopHandle {
    flag: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.flag.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    async fn notified(&self) {
        self.notify.notified().await
    }
}

pub struct Dispatcher {
    reader: Arc<dyn PoolStateReader>,
    simulator: Arc<dyn RequestSimulator>,
    submitter: Option<Arc<dyn RequestSubmitter>>,
    settings: DispatchSettings,
    clock: Clock,
    stop: StopHandle,
}

impl Dispatcher {
    pub fn new(
        reader: Arc<dyn PoolStateReader>,
        simulator: Arc<dyn RequestSimulator>,
        submitter: Option<Arc<dyn RequestSubmitter>>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            reader,
            simulator,
            submitter,
            settings,
            clock: Arc::new(|| Utc::now().timestamp().max(0) as u64),
            stop: StopHandle::default(),
        }
    }

    pub fn with_clock(mut self, clock: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Checked between pools and between watch passes.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn run(&self, pools: &[Address], max_per_run: usize) -> DispatchReport {
        let mut report = DispatchReport::default();
        info!(
            pools = pools.len(),
            max_per_run,
            dry_run = self.settings.dry_run,
            "dispatch pass starting"
        );

        for &pool in pools {
            if report.attempted >= max_per_run {
                info!(
                    attempted = report.attempted,
                    submitted = report.submitted,
                    "per-run cap reached, stopping pass"
                );
                break;
            }
            if self.stop.is_stopped() {
                warn!("stop requested, ending pass early");
                break;
            }
            let outcome = self.process(pool).await;
            report.record(outcome);
        }

        info!(
            submitted = report.submitted,
            attempted = report.attempted,
            skipped = report.skipped,
            errors = report.errors,
            "dispatch pass finished"
        );
        report
    }

    /// Repeated passes every `interval` until stopped. The pool list is
    /// reloaded before every pass after the first; a failed reload keeps the
    /// previous list. A stop request wakes the loop immediately.
    pub async fn watch<P, R>(
        &self,
        interval: Duration,
        max_per_run: usize,
        mut pools: Vec<Address>,
        mut reload: P,
        mut on_report: R,
    ) where
        P: FnMut() -> anyhow::Result<Vec<Address>> + Send,
        R: FnMut(&DispatchReport) + Send,
    {
        let mut ticker = tokio::time::interval(interval);
        let mut first = true;
        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.stop.notified() => break,
            }
            if self.stop.is_stopped() {
                break;
            }
            if !first {
                match reload() {
                    Ok(p) => pools = p,
                    Err(e) => {
                        let msg = format!("{:#}", e);
                        error!(error = %msg, "reloading pool list failed, keeping previous");
                    }
                }
            }
            first = false;

            let report = self.run(&pools, max_per_run).await;
            on_report(&report);
            if self.stop.is_stopped() {
                break;
            }
        }
        info!("watch loop stopped");
    }

    async fn process(&self, pool: Address) -> PoolOutcome {
        let snapshot = match self.reader.read(pool).await {
            Ok(s) => s,
            Err(e) => {
                let msg = format!("{:#}", e);
                warn!(pool = %pool, error = %msg, "pool state read failed");
                return PoolOutcome::error(pool, format!("read failed: {}", msg), None);
            }
        };

        let now = (self.clock)();
        if let Err(rejection) = gate::check(&snapshot, now, self.settings.gap_seconds) {
            debug!(pool = %pool, reason = %rejection, "pool not eligible");
            return PoolOutcome::skipped(pool, rejection.to_string());
        }

        let request_args: RequestArgs = match args::build(&snapshot, self.settings.compat_args) {
            Ok(a) => a,
            Err(e) => {
                warn!(pool = %pool, error = %e, "skipping pool with invalid request args");
                return PoolOutcome::skipped(pool, e.to_string());
            }
        };
        debug!(pool = %pool, args = ?request_args.as_slice(), "request args built");

        if let Err(sim) = self
            .simulator
            .simulate(pool, &request_args, &self.settings.params)
            .await
        {
            warn!(
                pool = %pool,
                selector = sim.selector.as_deref().unwrap_or("-"),
                decoded = %sim.decoded_name,
                error = %sim.message,
                "simulation rejected, skipping pool"
            );
            return PoolOutcome::skipped(pool, sim.to_string());
        }

        if self.settings.dry_run {
            info!(
                pool = %pool,
                league = %snapshot.league,
                args = ?request_args.as_slice(),
                "dry run: would submit settlement request"
            );
            return PoolOutcome::dispatched(pool, None);
        }

        let Some(submitter) = &self.submitter else {
            error!(pool = %pool, "no submitter configured outside dry-run");
            return PoolOutcome::error(pool, "no submitter configured".to_string(), None);
        };

        match submitter
            .submit(pool, &request_args, &self.settings.params)
            .await
        {
            Ok(sub) => {
                info!(
                    pool = %pool,
                    tx_hash = %sub.tx_hash,
                    block = ?sub.block_number,
                    confirmed = sub.confirmed,
                    "settlement request dispatched"
                );
                PoolOutcome::dispatched(pool, Some(sub.tx_hash))
            }
            Err(e) => {
                let broadcast = e.broadcast_hash();
                error!(
                    pool = %pool,
                    error = %e,
                    broadcast = broadcast.is_some(),
                    "settlement request submission failed"
                );
                PoolOutcome::error(pool, e.to_string(), broadcast)
            }
        }
    }
}
