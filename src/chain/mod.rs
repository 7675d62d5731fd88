//! On-chain plumbing: JSON-RPC transport, pool ABI, transaction signing.

pub mod abi;
pub mod rpc;
pub mod tx;

pub use abi::{decode_revert, encode_request, DecodedRevert, RequestMethod, RequestParams};
pub use rpc::{RpcClient, RpcError, TxReceipt};
pub use tx::{parse_signer, TxError, TxSender};
