//! Which pools a pass visits: an explicit list, or a discovery file written
//! by the deployment tooling.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde_json::Value;
use std::collections::HashSet;
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Parse addresses, dropping duplicates (first wins) and logging junk.
pub fn parse_addresses<'a, I>(raw: I) -> Vec<Address>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for entry in raw {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match Address::from_str(entry) {
            Ok(addr) => {
                if seen.insert(addr) {
                    out.push(addr);
                }
            }
            Err(e) => warn!(entry, error = %e, "skipping unparseable pool address"),
        }
    }
    out
}

/// Accepts `["0x..", ..]`, `[{"address": "0x.."}, ..]` or `{"pools": [...]}`.
pub fn addresses_from_document(doc: &Value) -> Vec<Address> {
    let list: &[Value] = match doc {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match map.get("pools") {
            Some(Value::Array(items)) => items.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    parse_addresses(list.iter().filter_map(|item| match item {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("address").and_then(Value::as_str),
        _ => None,
    }))
}

pub fn load_discovery_file(path: &Path) -> Result<Vec<Address>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading discovery file {}", path.display()))?;
    let doc: Value = serde_json::from_str(&raw)
        .with_context(|| format!("parsing discovery file {}", path.display()))?;
    Ok(addresses_from_document(&doc))
}

/// Explicit addresses win; the discovery file is only read without them.
pub fn pool_addresses(explicit: &[String], discovery_file: &Path) -> Result<Vec<Address>> {
    if !explicit.is_empty() {
        return Ok(parse_addresses(explicit.iter().map(String::as_str)));
    }
    load_discovery_file(discovery_file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;

    const A: &str = "0x00000000000000000000000000000000000000aa";
    const B: &str = "0x00000000000000000000000000000000000000bb";

    #[test]
    fn test_parse_addresses_dedupes_and_skips_junk() {
        let parsed = parse_addresses([A, " ", "not-an-address", B, A]);
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0], Address::from_str(A).unwrap());
        assert_eq!(parsed[1], Address::from_str(B).unwrap());
    }

    #[test]
    fn test_document_shapes() {
        assert_eq!(addresses_from_document(&json!([A, B])).len(), 2);
        assert_eq!(
            addresses_from_document(&json!([{ "address": A, "league": "nba" }, { "name": "x" }])).len(),
            1
        );
        assert_eq!(addresses_from_document(&json!({ "pools": [B] })).len(), 1);
        assert!(addresses_from_document(&json!({ "other": [A] })).is_empty());
        assert!(addresses_from_document(&json!("0xaa")).is_empty());
    }

    #[test]
    fn test_explicit_list_wins_over_file() {
        let explicit = vec![B.to_string()];
        let addrs = pool_addresses(&explicit, Path::new("/nonexistent/pools.json")).unwrap();
        assert_eq!(addrs, vec![Address::from_str(B).unwrap()]);

        assert!(pool_addresses(&[], Path::new("/nonexistent/pools.json")).is_err());

        let mut f = tempfile::NamedTempFile::new().unwrap();
        write!(f, "{}", json!({ "pools": [{ "address": A }] })).unwrap();
        let addrs = pool_addresses(&[], f.path()).unwrap();
        assert_eq!(addrs, vec![Address::from_str(A).unwrap()]);
    }
}
