//! Local transaction signing and broadcast.

use super::rpc::{RpcClient, RpcError, TxReceipt};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, B256};
use alloy::rpc::types::eth::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);
/// Tip used when the node doesn't implement `eth_maxPriorityFeePerGas`.
const FALLBACK_PRIORITY_FEE_WEI: u128 = 1_500_000_000;

#[derive(Debug, Clone)]
pub enum TxError {
    Rpc(RpcError),
    Signing(String),
}

impl std::fmt::Display for TxError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rpc(e) => write!(f, "{}", e),
            Self::Signing(msg) => write!(f, "signing failed: {}", msg),
        }
    }
}

impl std::error::Error for TxError {}

impl From<RpcError> for TxError {
    fn from(e: RpcError) -> Self {
        Self::Rpc(e)
    }
}

/// Parse a hex private key, with or without `0x`.
pub fn parse_signer(private_key: &str) -> Result<PrivateKeySigner> {
    let clean = private_key.trim().trim_start_matches("0x");
    if clean.len() != 64 {
        anyhow::bail!("private key must be 32 bytes of hex, got {} chars", clean.len());
    }
    PrivateKeySigner::from_str(clean).context("invalid private key")
}

/// `(max_fee_per_gas, max_priority_fee_per_gas)` from the node's gas price
/// and suggested tip. The cap is twice the gas price; the tip never exceeds it.
pub fn fee_caps(gas_price: u128, priority_fee: Option<u128>) -> (u128, u128) {
    let max_fee = gas_price.saturating_mul(2);
    let tip = priority_fee
        .unwrap_or(FALLBACK_PRIORITY_FEE_WEI)
        .min(max_fee);
    (max_fee, tip)
}

pub fn scale_gas(estimate: u64, multiplier_pct: u64) -> u64 {
    estimate.saturating_mul(multiplier_pct.max(100)) / 100
}

pub struct TxSender {
    rpc: Arc<RpcClient>,
    signer: PrivateKeySigner,
    wallet: EthereumWallet,
    chain_id: u64,
    gas_multiplier_pct: u64,
}

impl TxSender {
    pub async fn connect(
        rpc: Arc<RpcClient>,
        signer: PrivateKeySigner,
        gas_multiplier_pct: u64,
    ) -> Result<Self> {
        let chain_id = rpc.chain_id().await.context("eth_chainId failed")?;
        let wallet = EthereumWallet::from(signer.clone());
        Ok(Self {
            rpc,
            signer,
            wallet,
            chain_id,
            gas_multiplier_pct,
        })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    /// Sign and broadcast a call to `to`. Returns the transaction hash.
    pub async fn send(&self, to: Address, calldata: Vec<u8>) -> Result<B256, TxError> {
        let from = self.address();

        let (nonce, gas_estimate, gas_price) = tokio::try_join!(
            self.rpc.pending_nonce(from),
            self.rpc.estimate_gas(from, to, &calldata),
            self.rpc.gas_price(),
        )?;

        let priority_fee = match self.rpc.max_priority_fee().await {
            Ok(tip) => Some(tip),
            Err(e) => {
                debug!(error = %e, "eth_maxPriorityFeePerGas unavailable, using fallback tip");
                None
            }
        };
        let (max_fee, tip) = fee_caps(gas_price, priority_fee);
        let gas_limit = scale_gas(gas_estimate, self.gas_multiplier_pct);

        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_chain_id(self.chain_id)
            .with_nonce(nonce)
            .with_gas_limit(gas_limit)
            .with_max_fee_per_gas(max_fee)
            .with_max_priority_fee_per_gas(tip);
        tx.from = Some(from);

        let envelope = tx
            .build(&self.wallet)
            .await
            .map_err(|e| TxError::Signing(e.to_string()))?;

        let tx_hash = self
            .rpc
            .send_raw_transaction(&envelope.encoded_2718())
            .await?;
        debug!(%tx_hash, nonce, gas_limit, max_fee, tip, "transaction broadcast");
        Ok(tx_hash)
    }

    /// Poll for a receipt until `timeout`. `Ok(None)` means still pending.
    pub async fn wait_for_receipt(
        &self,
        tx_hash: B256,
        timeout: Duration,
    ) -> Result<Option<TxReceipt>, RpcError> {
        let deadline = Instant::now() + timeout;
        loop {
            match self.rpc.transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok(Some(receipt)),
                Ok(None) => {}
                Err(RpcError::Transport(msg)) => {
                    warn!(%tx_hash, error = %msg, "receipt poll failed, retrying");
                }
                Err(e) => return Err(e),
            }
            if Instant::now() + RECEIPT_POLL_INTERVAL > deadline {
                return Ok(None);
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }
}
