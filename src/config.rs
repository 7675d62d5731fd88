//! Run-level configuration for the dispatcher.
//!
//! `validate()` collects every problem instead of stopping at the first one;
//! any violation is fatal and the run ends before a single pool is touched.

use crate::chain::{parse_signer, RequestMethod, RequestParams};
use crate::settlement::{DispatchSettings, SecretsPointer, SecretsSettings};
use alloy::primitives::Address;
use anyhow::Result;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_CALLBACK_GAS_LIMIT: u32 = 300_000;
pub const DEFAULT_MAX_REQUESTS_PER_RUN: usize = 5;
pub const DEFAULT_MIN_GAP_SECONDS: u64 = 120;
pub const DEFAULT_POINTER_FILE: &str = "secrets-pointer.json";
pub const DEFAULT_DISCOVERY_FILE: &str = "deployments/pools.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigViolation {
    pub field: &'static str,
    pub description: String,
    pub suggestion: &'static str,
}

impl fmt::Display for ConfigViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.field, self.description, self.suggestion)
    }
}

#[derive(Clone)]
pub struct DispatchConfig {
    pub rpc_url: String,
    pub private_key: Option<String>,
    pub subscription_id: u64,
    pub callback_gas_limit: u32,
    pub secrets_slot_id: u8,
    pub secrets_version: Option<u64>,
    pub don_id: Option<String>,
    pub secrets_pointer_url: Option<String>,
    pub secrets_pointer_file: PathBuf,
    pub dry_run: bool,
    pub max_requests_per_run: usize,
    pub min_gap_seconds: u64,
    pub contracts: Vec<String>,
    pub discovery_file: PathBuf,
    pub compat_args: bool,
    pub request_method: RequestMethod,
    pub rpc_timeout: Duration,
    /// Zero means broadcast without waiting for a receipt.
    pub confirm_timeout: Duration,
    pub gas_multiplier_pct: u64,
    pub watch_interval: Option<Duration>,
    /// `from` for simulation calls; defaults to the signer's address.
    pub simulate_from: Option<Address>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            rpc_url: String::new(),
            private_key: None,
            subscription_id: 0,
            callback_gas_limit: DEFAULT_CALLBACK_GAS_LIMIT,
            secrets_slot_id: 0,
            secrets_version: None,
            don_id: None,
            secrets_pointer_url: None,
            secrets_pointer_file: PathBuf::from(DEFAULT_POINTER_FILE),
            dry_run: false,
            max_requests_per_run: DEFAULT_MAX_REQUESTS_PER_RUN,
            min_gap_seconds: DEFAULT_MIN_GAP_SECONDS,
            contracts: Vec::new(),
            discovery_file: PathBuf::from(DEFAULT_DISCOVERY_FILE),
            compat_args: false,
            request_method: RequestMethod::Send,
            rpc_timeout: Duration::from_secs(15),
            confirm_timeout: Duration::from_secs(90),
            gas_multiplier_pct: 120,
            watch_interval: None,
            simulate_from: None,
        }
    }
}

impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("rpc_url", &self.rpc_url)
            .field("private_key", &self.private_key.as_ref().map(|_| "***"))
            .field("subscription_id", &self.subscription_id)
            .field("callback_gas_limit", &self.callback_gas_limit)
            .field("secrets_slot_id", &self.secrets_slot_id)
            .field("dry_run", &self.dry_run)
            .field("max_requests_per_run", &self.max_requests_per_run)
            .field("min_gap_seconds", &self.min_gap_seconds)
            .field("contracts", &self.contracts.len())
            .field("compat_args", &self.compat_args)
            .field("request_method", &self.request_method)
            .field("simulate_from", &self.simulate_from)
            .finish_non_exhaustive()
    }
}

impl DispatchConfig {
    fn signing_key(&self) -> Option<&str> {
        self.private_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    pub fn validate(&self) -> Vec<ConfigViolation> {
        let mut violations = Vec::new();

        if self.rpc_url.trim().is_empty() {
            violations.push(ConfigViolation {
                field: "rpc_url",
                description: "RPC endpoint is empty".to_string(),
                suggestion: "Set RPC_URL to the chain's JSON-RPC endpoint",
            });
        }

        if self.subscription_id == 0 {
            violations.push(ConfigViolation {
                field: "subscription_id",
                description: "Subscription id is 0".to_string(),
                suggestion: "Set SUBSCRIPTION_ID to the funded compute subscription",
            });
        }

        if self.callback_gas_limit == 0 {
            violations.push(ConfigViolation {
                field: "callback_gas_limit",
                description: "Callback gas limit is 0".to_string(),
                suggestion: "Set CALLBACK_GAS_LIMIT (e.g. 300000)",
            });
        }

        if self.max_requests_per_run == 0 {
            violations.push(ConfigViolation {
                field: "max_requests_per_run",
                description: "Per-run cap is 0, nothing could ever be dispatched".to_string(),
                suggestion: "Set MAX_REQUESTS_PER_RUN to at least 1",
            });
        }

        match self.signing_key() {
            None if !self.dry_run => violations.push(ConfigViolation {
                field: "private_key",
                description: "Signing key is missing".to_string(),
                suggestion: "Set PRIVATE_KEY, or run with --dry-run",
            }),
            Some(key) => {
                if let Err(e) = parse_signer(key) {
                    violations.push(ConfigViolation {
                        field: "private_key",
                        description: format!("Signing key is unusable: {:#}", e),
                        suggestion: "PRIVATE_KEY must be 32 bytes of hex",
                    });
                }
            }
            None => {}
        }

        violations
    }

    /// Fails with every violation joined into one message.
    pub fn ensure_valid(&self) -> Result<()> {
        let violations = self.validate();
        if violations.is_empty() {
            return Ok(());
        }
        let joined = violations
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        anyhow::bail!("invalid configuration ({} problems): {}", violations.len(), joined)
    }

    pub fn secrets_settings(&self) -> SecretsSettings {
        SecretsSettings {
            secrets_version: self.secrets_version,
            don_id: self.don_id.clone(),
            remote_url: self.secrets_pointer_url.clone(),
            local_file: Some(self.secrets_pointer_file.clone()),
        }
    }

    pub fn request_params(&self, pointer: &SecretsPointer) -> Result<RequestParams> {
        Ok(RequestParams {
            method: self.request_method,
            subscription_id: self.subscription_id,
            callback_gas_limit: self.callback_gas_limit,
            secrets_slot_id: self.secrets_slot_id,
            secrets_version: pointer.secrets_version,
            don_id: pointer.don_id_bytes32()?,
        })
    }

    /// Account simulations run as. An explicit override beats the signer;
    /// `None` means neither is known.
    pub fn simulation_from(&self, signer: Option<Address>) -> Option<Address> {
        self.simulate_from.or(signer)
    }

    pub fn dispatch_settings(&self, params: RequestParams) -> DispatchSettings {
        DispatchSettings {
            gap_seconds: self.min_gap_seconds,
            compat_args: self.compat_args,
            dry_run: self.dry_run,
            params,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settlement::SecretsSource;

    const KEY: &str = "0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    fn valid() -> DispatchConfig {
        DispatchConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            private_key: Some(KEY.to_string()),
            subscription_id: 42,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_config() {
        assert!(valid().validate().is_empty());
        assert!(valid().ensure_valid().is_ok());
    }

    #[test]
    fn test_collects_every_violation() {
        let cfg = DispatchConfig {
            max_requests_per_run: 0,
            callback_gas_limit: 0,
            ..Default::default()
        };
        let fields: Vec<_> = cfg.validate().iter().map(|v| v.field).collect();
        assert_eq!(
            fields,
            vec![
                "rpc_url",
                "subscription_id",
                "callback_gas_limit",
                "max_requests_per_run",
                "private_key"
            ]
        );
        let err = cfg.ensure_valid().unwrap_err().to_string();
        assert!(err.contains("5 problems"));
    }

    #[test]
    fn test_dry_run_needs_no_key_but_checks_a_given_one() {
        let cfg = DispatchConfig {
            private_key: None,
            dry_run: true,
            ..valid()
        };
        assert!(cfg.validate().is_empty());

        let cfg = DispatchConfig {
            private_key: Some("0xabc".to_string()),
            dry_run: true,
            ..valid()
        };
        let violations = cfg.validate();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].field, "private_key");
    }

    #[test]
    fn test_request_params_from_pointer() {
        let cfg = DispatchConfig {
            request_method: RequestMethod::Retry,
            secrets_slot_id: 1,
            ..valid()
        };
        let pointer = SecretsPointer {
            secrets_version: 1_712_000_000,
            don_id: "fun-ethereum-sepolia-1".to_string(),
            source: SecretsSource::LocalFallback,
        };
        let params = cfg.request_params(&pointer).unwrap();
        assert_eq!(params.method, RequestMethod::Retry);
        assert_eq!(params.subscription_id, 42);
        assert_eq!(params.callback_gas_limit, DEFAULT_CALLBACK_GAS_LIMIT);
        assert_eq!(params.secrets_version, 1_712_000_000);
        assert_eq!(&params.don_id[..4], b"fun-");

        let settings = cfg.dispatch_settings(params);
        assert_eq!(settings.gap_seconds, DEFAULT_MIN_GAP_SECONDS);
        assert!(!settings.dry_run);
    }

    #[test]
    fn test_simulation_from_prefers_override() {
        let signer = Address::with_last_byte(1);
        let operator = Address::with_last_byte(2);

        let cfg = valid();
        assert_eq!(cfg.simulation_from(Some(signer)), Some(signer));
        assert_eq!(cfg.simulation_from(None), None);

        let cfg = DispatchConfig {
            simulate_from: Some(operator),
            private_key: None,
            dry_run: true,
            ..valid()
        };
        assert_eq!(cfg.simulation_from(Some(signer)), Some(operator));
        assert_eq!(cfg.simulation_from(None), Some(operator));
    }

    #[test]
    fn test_debug_hides_key() {
        assert!(!format!("{:?}", valid()).contains("4c0883"));
    }
}
