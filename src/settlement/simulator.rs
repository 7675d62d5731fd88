//! Dry-run of the settlement request before any fee is spent.

use super::args::RequestArgs;
use crate::chain::{decode_revert, encode_request, RequestParams, RpcClient, RpcError};
use alloy::primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;

/// A simulated request reverted (or the node refused it).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimError {
    /// `0x`-prefixed selector of the revert payload, if any.
    pub selector: Option<String>,
    /// Decoded error name, or `unknown`.
    pub decoded_name: String,
    pub message: String,
}

impl SimError {
    pub fn from_rpc(err: &RpcError) -> Self {
        let decoded = err
            .revert_data()
            .map(|data| decode_revert(&data))
            .unwrap_or_else(crate::chain::DecodedRevert::unknown);
        let message = match decoded.detail {
            Some(detail) => format!("{} ({})", err, detail),
            None => err.to_string(),
        };
        Self {
            selector: decoded.selector,
            decoded_name: decoded.name,
            message,
        }
    }
}

impl std::fmt::Display for SimError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "simulation rejected: {} [{}]: {}",
            self.decoded_name,
            self.selector.as_deref().unwrap_or("no selector"),
            self.message
        )
    }
}

impl std::error::Error for SimError {}

#[async_trait]
pub trait RequestSimulator: Send + Sync {
    /// Trial-execute the exact call that would be submitted.
    async fn simulate(
        &self,
        pool: Address,
        args: &RequestArgs,
        params: &RequestParams,
    ) -> Result<(), SimError>;
}

/// `eth_call` from the signing address against `latest`.
pub struct RpcSimulator {
    rpc: Arc<RpcClient>,
    from: Address,
}

impl RpcSimulator {
    pub fn new(rpc: Arc<RpcClient>, from: Address) -> Self {
        Self { rpc, from }
    }
}

#[async_trait]
impl RequestSimulator for RpcSimulator {
    async fn simulate(
        &self,
        pool: Address,
        args: &RequestArgs,
        params: &RequestParams,
    ) -> Result<(), SimError> {
        let calldata = encode_request(args.as_slice(), params);
        self.rpc
            .eth_call(Some(self.from), pool, &calldata)
            .await
            .map(|_| ())
            .map_err(|e| SimError::from_rpc(&e))
    }
}
