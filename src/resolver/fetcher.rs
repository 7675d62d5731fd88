//! HTTP capability handed to the resolver.
//!
//! The resolver never builds its own client; whoever runs it passes a
//! `Fetcher`, which keeps the search logic testable against canned payloads.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET `url` and parse the body as JSON.
    ///
    /// `Ok(None)` for an empty or `null` body. Transport failures, timeouts
    /// and non-2xx statuses are errors.
    async fn get_json(&self, url: &str, headers: &[(String, String)]) -> Result<Option<Value>>;
}

#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .user_agent(concat!("settlebot/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP fetcher")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get_json(&self, url: &str, headers: &[(String, String)]) -> Result<Option<Value>> {
        let mut req = self.client.get(url);
        for (name, value) in headers {
            req = req.header(name.as_str(), value.as_str());
        }

        let resp = req.send().await.with_context(|| format!("GET {} failed", redact(url)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            anyhow::bail!("GET {} {}", redact(url), status);
        }

        let text = resp
            .text()
            .await
            .with_context(|| format!("reading body of {}", redact(url)))?;
        parse_body(&text).with_context(|| format!("parsing body of {}", redact(url)))
    }
}

fn parse_body(text: &str) -> Result<Option<Value>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(trimmed)?;
    Ok(if value.is_null() { None } else { Some(value) })
}

/// Drop the path segment after `/json/`, where providers put API keys.
fn redact(url: &str) -> String {
    match url.find("/json/") {
        Some(idx) => {
            let head = &url[..idx + "/json/".len()];
            let tail = &url[idx + "/json/".len()..];
            match tail.find('/') {
                Some(slash) => format!("{}***{}", head, &tail[slash..]),
                None => url.to_string(),
            }
        }
        None => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_body() {
        assert_eq!(parse_body("").unwrap(), None);
        assert_eq!(parse_body("  null ").unwrap(), None);
        assert_eq!(
            parse_body(r#"{"events": null}"#).unwrap(),
            Some(json!({ "events": null }))
        );
        assert!(parse_body("<html>rate limited</html>").is_err());
    }

    #[test]
    fn test_redact_key_in_path() {
        assert_eq!(
            redact("https://www.thesportsdb.com/api/v1/json/SECRET/eventspastleague.php?id=4424"),
            "https://www.thesportsdb.com/api/v1/json/***/eventspastleague.php?id=4424"
        );
        assert_eq!(redact("https://example.com/a"), "https://example.com/a");
    }
}
