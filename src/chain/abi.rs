//! Pool contract ABI and revert payload decoding.

use alloy::primitives::{keccak256, B256};
use alloy::sol_types::{decode_revert_reason, SolCall};

alloy::sol! {
    interface IPredictionPool {
        function league() external view returns (string memory);
        function teamAName() external view returns (string memory);
        function teamBName() external view returns (string memory);
        function teamACode() external view returns (string memory);
        function teamBCode() external view returns (string memory);
        function isLocked() external view returns (bool);
        function requestSent() external view returns (bool);
        function winningTeam() external view returns (uint8);
        function lockTime() external view returns (uint256);

        function sendRequest(
            string[] calldata args,
            uint64 subscriptionId,
            uint32 gasLimit,
            uint8 donHostedSecretsSlotID,
            uint64 donHostedSecretsVersion,
            bytes32 donID
        ) external;

        function retryRequest(
            string[] calldata args,
            uint64 subscriptionId,
            uint32 gasLimit,
            uint8 donHostedSecretsSlotID,
            uint64 donHostedSecretsVersion,
            bytes32 donID
        ) external;
    }
}

const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Custom errors the pool contract and the compute-network router are known
/// to revert with.
const KNOWN_ERRORS: &[&str] = &[
    // pool
    "RequestAlreadySent()",
    "PoolNotLocked()",
    "WinnerAlreadyDeclared()",
    "LockTimeNotReached()",
    "OnlyOwner()",
    "OwnableUnauthorizedAccount(address)",
    "UnexpectedRequestID(bytes32)",
    // functions client / router
    "EmptySource()",
    "EmptySecrets()",
    "EmptyArgs()",
    "NoInlineSecrets()",
    "OnlyRouterCanFulfill()",
    "OnlyCallableFromLink()",
    "InsufficientBalance()",
    "InvalidSubscription()",
    "InvalidConsumer()",
    "InvalidCalldata()",
    "MustBeSubscriptionOwner()",
    "ConsumerRequestsInFlight()",
    "CannotRemoveWithPendingRequests()",
    "TimeoutNotExceeded()",
    "EnforcedPause()",
    "RouteNotFound(bytes32)",
    "GasLimitTooBig(uint32)",
    "DuplicateRequestId(bytes32)",
    "IdentifierIsReserved(bytes32)",
    "InvalidGasFlagValue(uint8)",
];

/// Which state-changing entry point to hit. Both share the same arguments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMethod {
    #[default]
    Send,
    Retry,
}

impl RequestMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Send => "sendRequest",
            Self::Retry => "retryRequest",
        }
    }
}

impl std::str::FromStr for RequestMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "send" | "sendrequest" => Ok(Self::Send),
            "retry" | "retryrequest" => Ok(Self::Retry),
            other => Err(format!("unknown request method '{}' (expected send or retry)", other)),
        }
    }
}

/// Everything besides the argument tuple that goes into a settlement
/// request. Identical for simulation and submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestParams {
    pub method: RequestMethod,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub secrets_slot_id: u8,
    pub secrets_version: u64,
    pub don_id: B256,
}

/// ABI-encode the settlement request calldata.
pub fn encode_request(args: &[String], params: &RequestParams) -> Vec<u8> {
    match params.method {
        RequestMethod::Send => IPredictionPool::sendRequestCall {
            args: args.to_vec(),
            subscriptionId: params.subscription_id,
            gasLimit: params.callback_gas_limit,
            donHostedSecretsSlotID: params.secrets_slot_id,
            donHostedSecretsVersion: params.secrets_version,
            donID: params.don_id,
        }
        .abi_encode(),
        RequestMethod::Retry => IPredictionPool::retryRequestCall {
            args: args.to_vec(),
            subscriptionId: params.subscription_id,
            gasLimit: params.callback_gas_limit,
            donHostedSecretsSlotID: params.secrets_slot_id,
            donHostedSecretsVersion: params.secrets_version,
            donID: params.don_id,
        }
        .abi_encode(),
    }
}

/// Best-effort decoding of a revert payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedRevert {
    /// `0x`-prefixed 4-byte selector, when the payload had one.
    pub selector: Option<String>,
    /// Error name, or `unknown`.
    pub name: String,
    /// Human-readable reason for `Error(string)` / `Panic(uint256)`.
    pub detail: Option<String>,
}

impl DecodedRevert {
    pub fn unknown() -> Self {
        Self {
            selector: None,
            name: "unknown".to_string(),
            detail: None,
        }
    }
}

pub fn error_selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

pub fn decode_revert(data: &[u8]) -> DecodedRevert {
    if data.len() < 4 {
        return DecodedRevert::unknown();
    }
    let selector: [u8; 4] = [data[0], data[1], data[2], data[3]];
    let selector_hex = format!("0x{}", hex::encode(selector));

    if selector == ERROR_STRING_SELECTOR || selector == PANIC_SELECTOR {
        let name = if selector == ERROR_STRING_SELECTOR {
            "Error"
        } else {
            "Panic"
        };
        return DecodedRevert {
            selector: Some(selector_hex),
            name: name.to_string(),
            detail: decode_revert_reason(data),
        };
    }

    let name = KNOWN_ERRORS
        .iter()
        .find(|sig| error_selector(sig) == selector)
        .map(|sig| sig.split('(').next().unwrap_or(sig).to_string())
        .unwrap_or_else(|| "unknown".to_string());

    DecodedRevert {
        selector: Some(selector_hex),
        name,
        detail: None,
    }
}
