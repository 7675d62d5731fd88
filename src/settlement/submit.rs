//! Real submission of a settlement request.

use super::args::RequestArgs;
use super::simulator::SimError;
use crate::chain::{encode_request, RequestParams, TxError, TxSender};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    /// False when the run doesn't wait for receipts.
    pub confirmed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitError {
    /// The node refused the transaction (gas estimation revert, bad nonce,
    /// signing failure).
    Rejected {
        selector: Option<String>,
        decoded_name: String,
        message: String,
    },
    /// Mined but reverted.
    Reverted { tx_hash: B256 },
    /// Broadcast but no receipt within the confirmation timeout.
    Unconfirmed { tx_hash: B256 },
}

impl std::fmt::Display for SubmitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rejected {
                selector,
                decoded_name,
                message,
            } => write!(
                f,
                "submission rejected: {} [{}]: {}",
                decoded_name,
                selector.as_deref().unwrap_or("no selector"),
                message
            ),
            Self::Reverted { tx_hash } => write!(f, "transaction {:#x} reverted", tx_hash),
            Self::Unconfirmed { tx_hash } => {
                write!(f, "transaction {:#x} not confirmed in time", tx_hash)
            }
        }
    }
}

impl std::error::Error for SubmitError {}

impl SubmitError {
    /// Hash of a transaction that reached the chain before the failure.
    pub fn broadcast_hash(&self) -> Option<B256> {
        match self {
            Self::Rejected { .. } => None,
            Self::Reverted { tx_hash } | Self::Unconfirmed { tx_hash } => Some(*tx_hash),
        }
    }
}

impl From<TxError> for SubmitError {
    fn from(e: TxError) -> Self {
        match e {
            TxError::Rpc(rpc) => {
                let sim = SimError::from_rpc(&rpc);
                Self::Rejected {
                    selector: sim.selector,
                    decoded_name: sim.decoded_name,
                    message: sim.message,
                }
            }
            TxError::Signing(msg) => Self::Rejected {
                selector: None,
                decoded_name: "unknown".to_string(),
                message: msg,
            },
        }
    }
}

#[async_trait]
pub trait RequestSubmitter: Send + Sync {
    async fn submit(
        &self,
        pool: Address,
        args: &RequestArgs,
        params: &RequestParams,
    ) -> Result<Submission, SubmitError>;
}

pub struct RpcSubmitter {
    sender: TxSender,
    /// Zero means broadcast only.
    confirm_timeout: Duration,
}

impl RpcSubmitter {
    pub fn new(sender: TxSender, confirm_timeout: Duration) -> Self {
        Self {
            sender,
            confirm_timeout,
        }
    }
}

#[async_trait]
impl RequestSubmitter for RpcSubmitter {
    async fn submit(
        &self,
        pool: Address,
        args: &RequestArgs,
        params: &RequestParams,
    ) -> Result<Submission, SubmitError> {
        let calldata = encode_request(args.as_slice(), params);
        let tx_hash = self.sender.send(pool, calldata).await?;
        info!(pool = %pool, %tx_hash, method = params.method.as_str(), "settlement request broadcast");

        if self.confirm_timeout.is_zero() {
            return Ok(Submission {
                tx_hash,
                block_number: None,
                confirmed: false,
            });
        }

        match self
            .sender
            .wait_for_receipt(tx_hash, self.confirm_timeout)
            .await
            .map_err(TxError::Rpc)?
        {
            Some(receipt) if receipt.success => Ok(Submission {
                tx_hash,
                block_number: receipt.block_number,
                confirmed: true,
            }),
            Some(_) => Err(SubmitError::Reverted { tx_hash }),
            None => Err(SubmitError::Unconfirmed { tx_hash }),
        }
    }
}
