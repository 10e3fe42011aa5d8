//! Direct-HTTP transport.
//!
//! Experimental path that talks to the portal without a browser. Every
//! search/detail call must carry a `sign` header the site normally
//! computes client-side; producing it is delegated to a [`Signer`]
//! supplied from outside — this crate deliberately does not implement
//! the signing algorithm.

use std::path::PathBuf;
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Transport, DETAIL_PATH, MANIFEST_PATH, NMPA_BASE, SEARCH_PATH};
use crate::error::CrawlError;

const REFERER: &str = "https://www.nmpa.gov.cn/datasearch/search-result.html";
const USER_AGENT: &str = "Mozilla/5.0";
const ACCEPT: &str = "application/json, text/plain, */*";

const MAX_ATTEMPTS: u32 = 3;
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_CAP: Duration = Duration::from_secs(5);

/// Signature material for one request.
#[derive(Debug, Clone, Deserialize)]
pub struct Signature {
    pub sign: String,
    pub timestamp: i64,
}

/// Externally supplied request-signing capability.
pub trait Signer: Send + Sync {
    fn sign(&self, url: &str, params: &Value) -> Result<Signature, CrawlError>;
}

/// Signer backed by an external command (typically a Node script that
/// embeds the site's own signing code). The command receives one
/// argument, `{"url": ..., "params": ...}`, and must print
/// `{"sign": ..., "timestamp": ...}` on stdout.
pub struct CommandSigner {
    program: String,
    script: PathBuf,
}

impl CommandSigner {
    pub fn new(program: impl Into<String>, script: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            script: script.into(),
        }
    }
}

impl Signer for CommandSigner {
    fn sign(&self, url: &str, params: &Value) -> Result<Signature, CrawlError> {
        if !self.script.exists() {
            return Err(CrawlError::Signer(format!(
                "sign script not found: {}",
                self.script.display()
            )));
        }

        let payload = json!({"url": url, "params": params}).to_string();
        let output = Command::new(&self.program)
            .arg(&self.script)
            .arg(&payload)
            .output()
            .map_err(|e| CrawlError::Signer(format!("{}: {}", self.program, e)))?;

        if !output.status.success() {
            return Err(CrawlError::Signer(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        serde_json::from_str(stdout.trim())
            .map_err(|e| CrawlError::Signer(format!("unparseable sign output: {}", e)))
    }
}

/// Transport that issues signed requests directly.
pub struct HttpTransport {
    client: Client,
    signer: Arc<dyn Signer>,
}

impl HttpTransport {
    /// Build the transport. `proxy` is an optional proxy URL applied to
    /// all requests (http and https).
    pub fn new(
        signer: Arc<dyn Signer>,
        timeout: Duration,
        proxy: Option<&str>,
    ) -> Result<Self, CrawlError> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .gzip(true)
            .brotli(true);

        if let Some(proxy) = proxy {
            builder = builder.proxy(reqwest::Proxy::all(proxy)?);
        }

        Ok(Self {
            client: builder.build()?,
            signer,
        })
    }

    /// One signed GET, no retries.
    async fn signed_get_once(&self, url: &str, params: &Value) -> Result<Value, CrawlError> {
        let signature = self.signer.sign(url, params)?;

        let response = self
            .client
            .get(url)
            .query(&query_pairs(params))
            .header("Referer", REFERER)
            .header("Accept", ACCEPT)
            .header("timestamp", signature.timestamp.to_string())
            .header("sign", signature.sign)
            .header("token", "false")
            .send()
            .await?
            .error_for_status()?;

        Ok(response.json().await?)
    }

    /// Signed GET with bounded, jittered exponential backoff. Any
    /// failure counts: signer faults, network errors, non-success
    /// status.
    async fn signed_get(&self, url: &str, params: Value) -> Result<Value, CrawlError> {
        let mut attempt = 0;
        loop {
            match self.signed_get_once(url, &params).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < MAX_ATTEMPTS => {
                    let delay = backoff_delay(attempt);
                    warn!(
                        "Request to {} failed (attempt {}/{}), retrying in {:?}: {}",
                        url,
                        attempt + 1,
                        MAX_ATTEMPTS,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn manifest(&self) -> Result<Value, CrawlError> {
        // The manifest is public and unsigned.
        let response = self
            .client
            .get(format!("{}{}", NMPA_BASE, MANIFEST_PATH))
            .query(&[("date", now_ms().to_string())])
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    async fn search(
        &self,
        item_id: &str,
        search_value: &str,
        page_num: u32,
        page_size: u32,
    ) -> Result<Option<Value>, CrawlError> {
        let url = format!("{}{}", NMPA_BASE, SEARCH_PATH);
        let params = json!({
            "itemId": item_id,
            "isSenior": "N",
            "searchValue": search_value,
            "pageNum": page_num,
            "pageSize": page_size,
            "timestamp": now_ms(),
        });
        debug!("Searching {} page {}", item_id, page_num);
        self.signed_get(&url, params).await.map(Some)
    }

    async fn detail(&self, item_id: &str, doc_id: &str) -> Result<Value, CrawlError> {
        let url = format!("{}{}", NMPA_BASE, DETAIL_PATH);
        let params = json!({
            "itemId": item_id,
            "id": doc_id,
            "timestamp": now_ms(),
        });
        self.signed_get(&url, params).await
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Flatten a params object into query pairs, keeping numbers unquoted.
fn query_pairs(params: &Value) -> Vec<(String, String)> {
    params
        .as_object()
        .map(|map| {
            map.iter()
                .map(|(k, v)| {
                    let s = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), s)
                })
                .collect()
        })
        .unwrap_or_default()
}

fn backoff_delay(attempt: u32) -> Duration {
    let exp = BACKOFF_INITIAL
        .checked_mul(1 << attempt)
        .unwrap_or(BACKOFF_CAP)
        .min(BACKOFF_CAP);
    let jitter = {
        let mut rng = rand::thread_rng();
        Duration::from_millis(rng.gen_range(0..500))
    };
    exp + jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_pairs_keep_number_formatting() {
        let params = json!({"itemId": "abc", "pageNum": 3, "timestamp": 1710000000000i64});
        let pairs = query_pairs(&params);
        assert!(pairs.contains(&("itemId".to_string(), "abc".to_string())));
        assert!(pairs.contains(&("pageNum".to_string(), "3".to_string())));
        assert!(pairs.contains(&("timestamp".to_string(), "1710000000000".to_string())));
    }

    #[test]
    fn test_backoff_is_bounded() {
        for attempt in 0..10 {
            let delay = backoff_delay(attempt);
            assert!(delay >= BACKOFF_INITIAL);
            assert!(delay <= BACKOFF_CAP + Duration::from_millis(500));
        }
    }

    #[test]
    fn test_command_signer_missing_script() {
        let signer = CommandSigner::new("node", "/nonexistent/sign.js");
        let err = signer.sign("https://example.com", &json!({})).unwrap_err();
        assert!(matches!(err, CrawlError::Signer(_)));
    }

    #[test]
    fn test_signature_parses() {
        let sig: Signature =
            serde_json::from_str(r#"{"sign": "deadbeef", "timestamp": 1710000000000}"#).unwrap();
        assert_eq!(sig.sign, "deadbeef");
        assert_eq!(sig.timestamp, 1710000000000);
    }
}
