//! Dispatch pass behavior against mocked pool reads, simulation and
//! submission.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, B256};
use anyhow::Result;
use async_trait::async_trait;
use parking_lot::Mutex;

use settlebot_backend::chain::{RequestMethod, RequestParams};
use settlebot_backend::pool::{PoolSnapshot, PoolStateReader, WinningTeam};
use settlebot_backend::settlement::{
    DispatchSettings, Dispatcher, PoolState, RequestArgs, RequestSimulator, RequestSubmitter,
    SimError, SubmitError, Submission,
};

const LOCK_TIME: u64 = 1_700_000_000;
const GAP: u64 = 120;

fn pool(n: u8) -> Address {
    Address::with_last_byte(n)
}

fn eligible(address: Address) -> PoolSnapshot {
    PoolSnapshot {
        address,
        league: "mlb".to_string(),
        team_a_name: "New York Yankees".to_string(),
        team_b_name: "Boston Red Sox".to_string(),
        team_a_code: "nyy".to_string(),
        team_b_code: "bos".to_string(),
        is_locked: true,
        request_sent: false,
        winning_team: WinningTeam::None,
        lock_time: LOCK_TIME,
    }
}

#[derive(Default)]
struct MockReader {
    snapshots: HashMap<Address, PoolSnapshot>,
    reads: Mutex<Vec<Address>>,
}

impl MockReader {
    fn with(snapshots: impl IntoIterator<Item = PoolSnapshot>) -> Self {
        Self {
            snapshots: snapshots.into_iter().map(|s| (s.address, s)).collect(),
            reads: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PoolStateReader for MockReader {
    async fn read(&self, pool: Address) -> Result<PoolSnapshot> {
        self.reads.lock().push(pool);
        self.snapshots
            .get(&pool)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("eth_call timed out for {}", pool))
    }
}

#[derive(Default)]
struct MockSimulator {
    reject: Vec<Address>,
    calls: Mutex<Vec<(Address, Vec<String>)>>,
}

#[async_trait]
impl RequestSimulator for MockSimulator {
    async fn simulate(
        &self,
        pool: Address,
        args: &RequestArgs,
        _params: &RequestParams,
    ) -> Result<(), SimError> {
        self.calls.lock().push((pool, args.as_slice().to_vec()));
        if self.reject.contains(&pool) {
            return Err(SimError {
                selector: Some("0x1d70f87a".to_string()),
                decoded_name: "RequestAlreadySent()".to_string(),
                message: "execution reverted".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
struct MockSubmitter {
    fail: Vec<Address>,
    /// Broadcast every transaction but never see a receipt.
    unconfirmed: bool,
    submitted: Mutex<Vec<Address>>,
}

#[async_trait]
impl RequestSubmitter for MockSubmitter {
    async fn submit(
        &self,
        pool: Address,
        _args: &RequestArgs,
        _params: &RequestParams,
    ) -> Result<Submission, SubmitError> {
        self.submitted.lock().push(pool);
        if self.unconfirmed {
            return Err(SubmitError::Unconfirmed {
                tx_hash: B256::with_last_byte(pool.0[19]),
            });
        }
        if self.fail.contains(&pool) {
            return Err(SubmitError::Rejected {
                selector: None,
                decoded_name: "unknown".to_string(),
                message: "nonce too low".to_string(),
            });
        }
        Ok(Submission {
            tx_hash: B256::with_last_byte(pool.0[19]),
            block_number: Some(1),
            confirmed: true,
        })
    }
}

fn settings(dry_run: bool, compat_args: bool) -> DispatchSettings {
    DispatchSettings {
        gap_seconds: GAP,
        compat_args,
        dry_run,
        params: RequestParams {
            method: RequestMethod::Send,
            subscription_id: 42,
            callback_gas_limit: 300_000,
            secrets_slot_id: 0,
            secrets_version: 1,
            don_id: B256::ZERO,
        },
    }
}

fn dispatcher(
    reader: Arc<MockReader>,
    simulator: Arc<MockSimulator>,
    submitter: Option<Arc<MockSubmitter>>,
    settings: DispatchSettings,
) -> Dispatcher {
    Dispatcher::new(
        reader,
        simulator,
        submitter.map(|s| s as Arc<dyn RequestSubmitter>),
        settings,
    )
    .with_clock(|| LOCK_TIME + GAP + 1)
}

#[tokio::test]
async fn test_cap_is_never_exceeded() {
    let pools: Vec<Address> = (1..=6).map(pool).collect();
    let reader = Arc::new(MockReader::with(pools.iter().copied().map(eligible)));
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(
        reader.clone(),
        Arc::new(MockSimulator::default()),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&pools, 2).await;

    assert_eq!(report.submitted, 2);
    assert_eq!(submitter.submitted.lock().len(), 2);
    // the pass stops reading once the cap is hit
    assert_eq!(reader.reads.lock().len(), 2);
}

#[tokio::test]
async fn test_dry_run_counts_toward_cap_without_submitting() {
    let pools: Vec<Address> = (1..=4).map(pool).collect();
    let reader = Arc::new(MockReader::with(pools.iter().copied().map(eligible)));
    let simulator = Arc::new(MockSimulator::default());
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(
        reader,
        simulator.clone(),
        Some(submitter.clone()),
        settings(true, false),
    );

    let report = d.run(&pools, 3).await;

    assert_eq!(report.submitted, 3);
    assert!(submitter.submitted.lock().is_empty());
    assert_eq!(simulator.calls.lock().len(), 3);
    assert!(report.outcomes.iter().all(|o| o.tx_hash.is_none()));
}

#[tokio::test]
async fn test_ineligible_pools_are_skipped_without_simulation() {
    let sent = PoolSnapshot {
        request_sent: true,
        ..eligible(pool(1))
    };
    let unlocked = PoolSnapshot {
        is_locked: false,
        ..eligible(pool(2))
    };
    let decided = PoolSnapshot {
        winning_team: WinningTeam::Draw,
        ..eligible(pool(3))
    };
    let early = PoolSnapshot {
        lock_time: LOCK_TIME + 10,
        ..eligible(pool(4))
    };
    let reader = Arc::new(MockReader::with([sent, unlocked, decided, early]));
    let simulator = Arc::new(MockSimulator::default());
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(
        reader,
        simulator.clone(),
        Some(submitter.clone()),
        settings(false, false),
    );

    let pools: Vec<Address> = (1..=4).map(pool).collect();
    let report = d.run(&pools, 5).await;

    assert_eq!(report.submitted, 0);
    assert_eq!(report.skipped, 4);
    assert!(simulator.calls.lock().is_empty());
    assert!(submitter.submitted.lock().is_empty());
}

#[tokio::test]
async fn test_read_failure_is_error_and_pass_continues() {
    // pool 1 is unknown to the reader
    let reader = Arc::new(MockReader::with([eligible(pool(2))]));
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(
        reader,
        Arc::new(MockSimulator::default()),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&[pool(1), pool(2)], 5).await;

    assert_eq!(report.errors, 1);
    assert_eq!(report.submitted, 1);
    assert_eq!(report.outcomes[0].state, PoolState::Error);
    assert_eq!(report.outcomes[1].state, PoolState::Dispatched);
    assert_eq!(*submitter.submitted.lock(), vec![pool(2)]);
}

#[tokio::test]
async fn test_simulation_reject_skips_and_spends_nothing() {
    let reader = Arc::new(MockReader::with([eligible(pool(1)), eligible(pool(2))]));
    let simulator = Arc::new(MockSimulator {
        reject: vec![pool(1)],
        ..Default::default()
    });
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(reader, simulator, Some(submitter.clone()), settings(false, false));

    let report = d.run(&[pool(1), pool(2)], 5).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.submitted, 1);
    let reason = report.outcomes[0].reason.as_deref().unwrap_or_default();
    assert!(reason.contains("RequestAlreadySent"));
    assert_eq!(*submitter.submitted.lock(), vec![pool(2)]);
}

#[tokio::test]
async fn test_submission_failure_is_error_and_not_retried() {
    let reader = Arc::new(MockReader::with([eligible(pool(1)), eligible(pool(2))]));
    let submitter = Arc::new(MockSubmitter {
        fail: vec![pool(1)],
        ..Default::default()
    });
    let d = dispatcher(
        reader,
        Arc::new(MockSimulator::default()),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&[pool(1), pool(2)], 5).await;

    assert_eq!(report.errors, 1);
    assert_eq!(report.submitted, 1);
    assert_eq!(*submitter.submitted.lock(), vec![pool(1), pool(2)]);
    assert_eq!(report.outcomes[1].tx_hash, Some(B256::with_last_byte(2)));
}

#[tokio::test]
async fn test_invalid_args_skip_pool() {
    let blank_name = PoolSnapshot {
        team_b_name: "   ".to_string(),
        ..eligible(pool(1))
    };
    let simulator = Arc::new(MockSimulator::default());
    let d = dispatcher(
        Arc::new(MockReader::with([blank_name])),
        simulator.clone(),
        Some(Arc::new(MockSubmitter::default())),
        settings(false, false),
    );

    let report = d.run(&[pool(1)], 5).await;

    assert_eq!(report.skipped, 1);
    assert!(simulator.calls.lock().is_empty());
}

#[tokio::test]
async fn test_eligible_pool_simulates_full_args() {
    let simulator = Arc::new(MockSimulator::default());
    let d = dispatcher(
        Arc::new(MockReader::with([eligible(pool(1))])),
        simulator.clone(),
        None,
        settings(true, false),
    );

    let report = d.run(&[pool(1)], 5).await;
    assert_eq!(report.submitted, 1);

    let calls = simulator.calls.lock();
    assert_eq!(
        calls[0].1,
        vec![
            "mlb",
            "2023-11-14",
            "2023-11-15",
            "NYY",
            "BOS",
            "New York Yankees",
            "Boston Red Sox",
            "1700000000"
        ]
    );
}

#[tokio::test]
async fn test_compat_mode_sends_six_fields() {
    let simulator = Arc::new(MockSimulator::default());
    let d = dispatcher(
        Arc::new(MockReader::with([eligible(pool(1))])),
        simulator.clone(),
        None,
        settings(true, true),
    );

    d.run(&[pool(1)], 5).await;

    let calls = simulator.calls.lock();
    assert_eq!(
        calls[0].1,
        vec!["mlb", "2023-11-14", "NYY", "BOS", "New York Yankees", "Boston Red Sox"]
    );
}

#[tokio::test]
async fn test_missing_submitter_outside_dry_run_is_error() {
    let d = dispatcher(
        Arc::new(MockReader::with([eligible(pool(1))])),
        Arc::new(MockSimulator::default()),
        None,
        settings(false, false),
    );

    let report = d.run(&[pool(1)], 5).await;
    assert_eq!(report.errors, 1);
    assert_eq!(report.submitted, 0);
}

#[tokio::test]
async fn test_stop_flag_ends_pass_between_pools() {
    let pools: Vec<Address> = (1..=3).map(pool).collect();
    let reader = Arc::new(MockReader::with(pools.iter().copied().map(eligible)));
    let d = dispatcher(
        reader.clone(),
        Arc::new(MockSimulator::default()),
        Some(Arc::new(MockSubmitter::default())),
        settings(false, false),
    );
    d.stop_handle().stop();

    let report = d.run(&pools, 5).await;
    assert!(report.outcomes.is_empty());
    assert!(reader.reads.lock().is_empty());
}

#[tokio::test]
async fn test_unconfirmed_broadcasts_count_toward_cap() {
    let pools: Vec<Address> = (1..=6).map(pool).collect();
    let reader = Arc::new(MockReader::with(pools.iter().copied().map(eligible)));
    let submitter = Arc::new(MockSubmitter {
        unconfirmed: true,
        ..Default::default()
    });
    let d = dispatcher(
        reader,
        Arc::new(MockSimulator::default()),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&pools, 2).await;

    assert_eq!(submitter.submitted.lock().len(), 2);
    assert_eq!(report.attempted, 2);
    assert_eq!(report.submitted, 0);
    assert_eq!(report.errors, 2);
    assert_eq!(report.outcomes[0].tx_hash, Some(B256::with_last_byte(1)));
}

#[tokio::test]
async fn test_rejected_submission_does_not_count_toward_cap() {
    let pools: Vec<Address> = (1..=3).map(pool).collect();
    let reader = Arc::new(MockReader::with(pools.iter().copied().map(eligible)));
    let submitter = Arc::new(MockSubmitter {
        fail: vec![pool(1)],
        ..Default::default()
    });
    let d = dispatcher(
        reader,
        Arc::new(MockSimulator::default()),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&pools, 2).await;

    // pool 1 never reached the chain, so pools 2 and 3 both go out
    assert_eq!(report.attempted, 2);
    assert_eq!(report.submitted, 2);
    assert_eq!(report.outcomes[0].tx_hash, None);
    assert_eq!(*submitter.submitted.lock(), vec![pool(1), pool(2), pool(3)]);
}

#[tokio::test]
async fn test_zero_lock_time_is_skipped_before_simulation() {
    // passes the lock-time gate (0 + gap <= now) but has no match window
    let never_locked = PoolSnapshot {
        lock_time: 0,
        ..eligible(pool(1))
    };
    let simulator = Arc::new(MockSimulator::default());
    let submitter = Arc::new(MockSubmitter::default());
    let d = dispatcher(
        Arc::new(MockReader::with([never_locked])),
        simulator.clone(),
        Some(submitter.clone()),
        settings(false, false),
    );

    let report = d.run(&[pool(1)], 5).await;

    assert_eq!(report.skipped, 1);
    assert_eq!(report.outcomes[0].state, PoolState::Skipped);
    assert!(simulator.calls.lock().is_empty());
    assert!(submitter.submitted.lock().is_empty());
}

#[tokio::test]
async fn test_stop_wakes_idle_watch_loop() {
    let pools: Vec<Address> = (1..=2).map(pool).collect();
    let d = Arc::new(dispatcher(
        Arc::new(MockReader::with(pools.iter().copied().map(eligible))),
        Arc::new(MockSimulator::default()),
        None,
        settings(true, false),
    ));
    let stop = d.stop_handle();
    let passes = Arc::new(AtomicUsize::new(0));

    let handle = {
        let d = d.clone();
        let passes = passes.clone();
        tokio::spawn(async move {
            d.watch(
                Duration::from_secs(3600),
                5,
                pools,
                || Ok(Vec::new()),
                move |_| {
                    passes.fetch_add(1, Ordering::SeqCst);
                },
            )
            .await
        })
    };

    for _ in 0..200 {
        if passes.load(Ordering::SeqCst) > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(passes.load(Ordering::SeqCst), 1);

    // the next tick is an hour away; stop must not wait for it
    stop.stop();
    let joined = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(joined.is_ok());
    assert_eq!(passes.load(Ordering::SeqCst), 1);
}
