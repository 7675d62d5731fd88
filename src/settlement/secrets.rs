//! Secrets pointer resolution.
//!
//! The pointer names the DON-hosted secret bundle (slot version) and the DON
//! itself. Sources in priority order: explicit config, a remote JSON
//! document, a local JSON file. Failing all three is fatal for the run.

use crate::resolver::fetcher::Fetcher;
use alloy::primitives::B256;
use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretsSource {
    ExplicitConfig,
    RemoteConfig,
    LocalFallback,
}

impl SecretsSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExplicitConfig => "explicit-config",
            Self::RemoteConfig => "remote-config",
            Self::LocalFallback => "local-fallback",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretsPointer {
    pub secrets_version: u64,
    pub don_id: String,
    pub source: SecretsSource,
}

impl SecretsPointer {
    pub fn don_id_bytes32(&self) -> Result<B256> {
        don_id_bytes32(&self.don_id)
    }
}

/// Where to look for the pointer.
#[derive(Debug, Clone, Default)]
pub struct SecretsSettings {
    pub secrets_version: Option<u64>,
    pub don_id: Option<String>,
    pub remote_url: Option<String>,
    pub local_file: Option<PathBuf>,
}

/// `{ secretsVersion | version: number, donId?: string }`
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PointerDocument {
    #[serde(rename = "secretsVersion", alias = "version", deserialize_with = "de_u64_loose")]
    pub secrets_version: u64,
    #[serde(rename = "donId", default)]
    pub don_id: Option<String>,
}

fn de_u64_loose<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Value::deserialize(deserializer)?;
    match v {
        Value::Number(n) => n
            .as_u64()
            .ok_or_else(|| serde::de::Error::custom(format!("version {} is not a u64", n))),
        Value::String(s) => s.trim().parse::<u64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("unexpected version {}", other))),
    }
}

pub fn parse_pointer_document(raw: &str) -> Result<PointerDocument> {
    serde_json::from_str(raw).context("secrets pointer document is not valid JSON of the expected shape")
}

/// Encode a DON id as `bytes32`. A `0x`-prefixed 64-char hex value is taken
/// verbatim, anything else is right-padded UTF-8 (at most 31 bytes).
pub fn don_id_bytes32(don_id: &str) -> Result<B256> {
    let trimmed = don_id.trim();
    if trimmed.is_empty() {
        anyhow::bail!("DON id is empty");
    }
    if let Some(hex_part) = trimmed.strip_prefix("0x") {
        if hex_part.len() == 64 {
            let bytes = hex::decode(hex_part).context("DON id hex")?;
            return Ok(B256::from_slice(&bytes));
        }
    }
    let bytes = trimmed.as_bytes();
    if bytes.len() > 31 {
        anyhow::bail!("DON id '{}' is longer than 31 bytes", trimmed);
    }
    let mut out = [0u8; 32];
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(B256::from(out))
}

fn non_blank(s: &Option<String>) -> Option<String> {
    s.as_ref()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn from_document(
    doc: PointerDocument,
    fallback_don_id: &Option<String>,
    source: SecretsSource,
) -> Option<SecretsPointer> {
    let don_id = non_blank(&doc.don_id).or_else(|| non_blank(fallback_don_id))?;
    Some(SecretsPointer {
        secrets_version: doc.secrets_version,
        don_id,
        source,
    })
}

/// Resolve once per run.
pub async fn resolve(settings: &SecretsSettings, fetcher: &dyn Fetcher) -> Result<SecretsPointer> {
    if let (Some(version), Some(don_id)) = (settings.secrets_version, non_blank(&settings.don_id)) {
        info!(version, source = "explicit-config", "secrets pointer resolved");
        return Ok(SecretsPointer {
            secrets_version: version,
            don_id,
            source: SecretsSource::ExplicitConfig,
        });
    }

    if let Some(url) = settings.remote_url.as_deref().filter(|u| !u.trim().is_empty()) {
        match fetch_remote(url, fetcher).await {
            Ok(doc) => match from_document(doc, &settings.don_id, SecretsSource::RemoteConfig) {
                Some(pointer) => {
                    info!(version = pointer.secrets_version, source = "remote-config", "secrets pointer resolved");
                    return Ok(pointer);
                }
                None => warn!(url, "remote secrets pointer has no donId and none is configured"),
            },
            Err(e) => warn!(url, error = %e, "remote secrets pointer unavailable"),
        }
    }

    if let Some(path) = &settings.local_file {
        match read_local(path) {
            Ok(doc) => match from_document(doc, &settings.don_id, SecretsSource::LocalFallback) {
                Some(pointer) => {
                    info!(version = pointer.secrets_version, source = "local-fallback", "secrets pointer resolved");
                    return Ok(pointer);
                }
                None => warn!(path = %path.display(), "local secrets pointer has no donId and none is configured"),
            },
            Err(e) => warn!(path = %path.display(), error = %e, "local secrets pointer unavailable"),
        }
    }

    anyhow::bail!(
        "secrets pointer could not be resolved from explicit config, remote document or local file"
    )
}

async fn fetch_remote(url: &str, fetcher: &dyn Fetcher) -> Result<PointerDocument> {
    let value = fetcher
        .get_json(url, &[])
        .await?
        .ok_or_else(|| anyhow::anyhow!("empty secrets pointer document at {}", url))?;
    serde_json::from_value(value).context("remote secrets pointer has unexpected shape")
}

fn read_local(path: &PathBuf) -> Result<PointerDocument> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    parse_pointer_document(&raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::io::Write;

    struct StaticFetcher(Option<Value>);

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn get_json(&self, _url: &str, _headers: &[(String, String)]) -> Result<Option<Value>> {
            Ok(self.0.clone())
        }
    }

    struct FailingFetcher;

    #[async_trait]
    impl Fetcher for FailingFetcher {
        async fn get_json(&self, url: &str, _headers: &[(String, String)]) -> Result<Option<Value>> {
            anyhow::bail!("timeout fetching {}", url)
        }
    }

    fn local_file(contents: &str) -> tempfile::NamedTempFile {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        f
    }

    #[test]
    fn test_document_shapes() {
        let doc = parse_pointer_document(r#"{"secretsVersion": 1712, "donId": "fun-x"}"#).unwrap();
        assert_eq!(doc.secrets_version, 1712);
        assert_eq!(doc.don_id.as_deref(), Some("fun-x"));

        let doc = parse_pointer_document(r#"{"version": "99"}"#).unwrap();
        assert_eq!(doc.secrets_version, 99);
        assert_eq!(doc.don_id, None);

        assert!(parse_pointer_document(r#"{"donId": "fun-x"}"#).is_err());
        assert!(parse_pointer_document(r#"{"version": -1}"#).is_err());
    }

    #[test]
    fn test_don_id_encoding() {
        let b = don_id_bytes32("fun-ethereum-sepolia-1").unwrap();
        assert_eq!(&b[..22], b"fun-ethereum-sepolia-1");
        assert!(b[22..].iter().all(|x| *x == 0));

        let hex_id = format!("0x{}", "ab".repeat(32));
        assert_eq!(don_id_bytes32(&hex_id).unwrap(), B256::from([0xab; 32]));

        assert!(don_id_bytes32("").is_err());
        assert!(don_id_bytes32(&"x".repeat(32)).is_err());
    }

    #[tokio::test]
    async fn test_explicit_config_wins() {
        let settings = SecretsSettings {
            secrets_version: Some(7),
            don_id: Some("fun-x".to_string()),
            remote_url: Some("https://example.invalid/pointer.json".to_string()),
            local_file: None,
        };
        let pointer = resolve(&settings, &FailingFetcher).await.unwrap();
        assert_eq!(pointer.source, SecretsSource::ExplicitConfig);
        assert_eq!(pointer.secrets_version, 7);
    }

    #[tokio::test]
    async fn test_remote_then_local_fallback() {
        let file = local_file(r#"{"secretsVersion": 5, "donId": "fun-local"}"#);
        let settings = SecretsSettings {
            secrets_version: None,
            don_id: Some("fun-configured".to_string()),
            remote_url: Some("https://example.invalid/pointer.json".to_string()),
            local_file: Some(file.path().to_path_buf()),
        };

        let remote = StaticFetcher(Some(json!({ "version": 11 })));
        let pointer = resolve(&settings, &remote).await.unwrap();
        assert_eq!(pointer.source, SecretsSource::RemoteConfig);
        assert_eq!(pointer.secrets_version, 11);
        // document without donId borrows the configured one
        assert_eq!(pointer.don_id, "fun-configured");

        let pointer = resolve(&settings, &FailingFetcher).await.unwrap();
        assert_eq!(pointer.source, SecretsSource::LocalFallback);
        assert_eq!(pointer.secrets_version, 5);
        assert_eq!(pointer.don_id, "fun-local");
    }

    #[tokio::test]
    async fn test_all_sources_failing_is_fatal() {
        let settings = SecretsSettings {
            secrets_version: Some(3),
            don_id: None,
            remote_url: Some("https://example.invalid/pointer.json".to_string()),
            local_file: Some(PathBuf::from("/nonexistent/secrets-pointer.json")),
        };
        assert!(resolve(&settings, &StaticFetcher(None)).await.is_err());
    }
}
