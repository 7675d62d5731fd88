//! Minimal Ethereum JSON-RPC transport.
//!
//! Every call goes through one `reqwest::Client` with a hard timeout, so an
//! unresponsive node surfaces as `RpcError::Transport` instead of a hang.

use alloy::primitives::{Address, B256};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

/// Raw JSON-RPC envelope.
#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Failure of a single RPC round trip.
#[derive(Debug, Clone)]
pub enum RpcError {
    /// Connection failure, timeout or non-2xx HTTP status.
    Transport(String),
    /// The node answered with a JSON-RPC error object. `data` carries the
    /// revert payload as hex when the node exposes one.
    Node {
        code: i64,
        message: String,
        data: Option<String>,
    },
    /// The node answered but the result had an unexpected shape.
    Decode(String),
}

impl RpcError {
    /// Revert payload bytes, if the node returned any.
    pub fn revert_data(&self) -> Option<Vec<u8>> {
        match self {
            Self::Node { data: Some(hex_data), .. } => {
                hex::decode(hex_data.trim_start_matches("0x")).ok()
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(msg) => write!(f, "rpc transport error: {}", msg),
            Self::Node { code, message, .. } => write!(f, "rpc error {}: {}", code, message),
            Self::Decode(msg) => write!(f, "rpc decode error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

/// Receipt fields the dispatcher cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub success: bool,
    pub block_number: Option<u64>,
}

pub struct RpcClient {
    client: Client,
    rpc_url: String,
    next_id: AtomicU64,
}

impl RpcClient {
    pub fn new(rpc_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .pool_max_idle_per_host(4)
            .build()
            .context("Failed to build RPC HTTP client")?;

        Ok(Self {
            client,
            rpc_url: rpc_url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": id,
        });

        let resp = self
            .client
            .post(&self.rpc_url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{} failed: {}", method, e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RpcError::Transport(format!("{} HTTP {}: {}", method, status, text)));
        }

        let body: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| RpcError::Decode(format!("{} response: {}", method, e)))?;

        if let Some(err) = body.error {
            debug!(method, code = err.code, message = %err.message, "rpc error object");
            return Err(RpcError::Node {
                code: err.code,
                message: err.message,
                data: err.data.as_ref().and_then(extract_revert_hex),
            });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }

    /// `eth_call` against `latest`. Returns the raw return data.
    pub async fn eth_call(
        &self,
        from: Option<Address>,
        to: Address,
        data: &[u8],
    ) -> Result<Vec<u8>, RpcError> {
        let mut call = json!({
            "to": format!("{:#x}", to),
            "data": format!("0x{}", hex::encode(data)),
        });
        if let Some(from) = from {
            call["from"] = json!(format!("{:#x}", from));
        }

        let result = self.request("eth_call", json!([call, "latest"])).await?;
        let hex_str = result
            .as_str()
            .ok_or_else(|| RpcError::Decode("eth_call result is not a string".to_string()))?;
        hex::decode(hex_str.trim_start_matches("0x"))
            .map_err(|e| RpcError::Decode(format!("eth_call result hex: {}", e)))
    }

    pub async fn chain_id(&self) -> Result<u64, RpcError> {
        let v = self.request("eth_chainId", json!([])).await?;
        parse_quantity_u64(&v)
    }

    pub async fn pending_nonce(&self, address: Address) -> Result<u64, RpcError> {
        let v = self
            .request(
                "eth_getTransactionCount",
                json!([format!("{:#x}", address), "pending"]),
            )
            .await?;
        parse_quantity_u64(&v)
    }

    pub async fn estimate_gas(
        &self,
        from: Address,
        to: Address,
        data: &[u8],
    ) -> Result<u64, RpcError> {
        let call = json!({
            "from": format!("{:#x}", from),
            "to": format!("{:#x}", to),
            "data": format!("0x{}", hex::encode(data)),
        });
        let v = self.request("eth_estimateGas", json!([call])).await?;
        parse_quantity_u64(&v)
    }

    pub async fn gas_price(&self) -> Result<u128, RpcError> {
        let v = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity_u128(&v)
    }

    /// Not every node implements this; callers fall back on error.
    pub async fn max_priority_fee(&self) -> Result<u128, RpcError> {
        let v = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        parse_quantity_u128(&v)
    }

    pub async fn send_raw_transaction(&self, raw: &[u8]) -> Result<B256, RpcError> {
        let v = self
            .request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(raw))]),
            )
            .await?;
        let s = v
            .as_str()
            .ok_or_else(|| RpcError::Decode("tx hash is not a string".to_string()))?;
        s.parse::<B256>()
            .map_err(|e| RpcError::Decode(format!("tx hash {}: {}", s, e)))
    }

    pub async fn transaction_receipt(&self, tx_hash: B256) -> Result<Option<TxReceipt>, RpcError> {
        let v = self
            .request("eth_getTransactionReceipt", json!([format!("{:#x}", tx_hash)]))
            .await?;
        if v.is_null() {
            return Ok(None);
        }

        let status = v
            .get("status")
            .map(parse_quantity_u64)
            .transpose()?
            .unwrap_or(0);
        let block_number = v
            .get("blockNumber")
            .filter(|b| !b.is_null())
            .map(parse_quantity_u64)
            .transpose()?;

        Ok(Some(TxReceipt {
            success: status == 1,
            block_number,
        }))
    }
}

/// Pull a hex revert payload out of a JSON-RPC `error.data` value.
/// Nodes disagree on the shape: a bare string, `{ "data": "0x.." }`, or a
/// nested `{ "originalError": { "data": "0x.." } }`.
fn extract_revert_hex(data: &Value) -> Option<String> {
    match data {
        Value::String(s) if s.starts_with("0x") => Some(s.clone()),
        Value::Object(map) => map
            .get("data")
            .and_then(extract_revert_hex)
            .or_else(|| map.get("originalError").and_then(extract_revert_hex)),
        _ => None,
    }
}

fn parse_quantity_u64(v: &Value) -> Result<u64, RpcError> {
    let s = v
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("quantity is not a string: {}", v)))?;
    u64::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Decode(format!("quantity {}: {}", s, e)))
}

fn parse_quantity_u128(v: &Value) -> Result<u128, RpcError> {
    let s = v
        .as_str()
        .ok_or_else(|| RpcError::Decode(format!("quantity is not a string: {}", v)))?;
    u128::from_str_radix(s.trim_start_matches("0x"), 16)
        .map_err(|e| RpcError::Decode(format!("quantity {}: {}", s, e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_revert_hex_shapes() {
        assert_eq!(
            extract_revert_hex(&json!("0x08c379a0")),
            Some("0x08c379a0".to_string())
        );
        assert_eq!(
            extract_revert_hex(&json!({ "data": "0xdeadbeef" })),
            Some("0xdeadbeef".to_string())
        );
        assert_eq!(
            extract_revert_hex(&json!({ "originalError": { "data": "0x01" } })),
            Some("0x01".to_string())
        );
        assert_eq!(extract_revert_hex(&json!("execution reverted")), None);
        assert_eq!(extract_revert_hex(&json!(42)), None);
    }

    #[test]
    fn test_parse_quantities() {
        assert_eq!(parse_quantity_u64(&json!("0x1a")).unwrap(), 26);
        assert_eq!(parse_quantity_u64(&json!("0x0")).unwrap(), 0);
        assert_eq!(
            parse_quantity_u128(&json!("0x3b9aca00")).unwrap(),
            1_000_000_000
        );
        assert!(parse_quantity_u64(&json!(26)).is_err());
        assert!(parse_quantity_u64(&json!("0xzz")).is_err());
    }

    #[test]
    fn test_revert_data_only_for_node_errors() {
        let node = RpcError::Node {
            code: 3,
            message: "execution reverted".to_string(),
            data: Some("0xabcd".to_string()),
        };
        assert_eq!(node.revert_data(), Some(vec![0xab, 0xcd]));

        let transport = RpcError::Transport("timeout".to_string());
        assert_eq!(transport.revert_data(), None);
    }
}
