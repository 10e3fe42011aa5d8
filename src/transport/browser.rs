//! Browser-delegated transport.
//!
//! Drives a real Chromium session on the portal's search page and
//! issues API calls through the page's own `axios` instance, so the
//! site's client-side signing runs unmodified. The in-page execution
//! context cannot throw across the CDP boundary; failed calls resolve
//! to an `{error: message}` sentinel object which is checked
//! explicitly on the Rust side.

use serde::{Deserialize, Serialize};

#[cfg(feature = "browser")]
use std::time::{Duration, Instant};

#[cfg(feature = "browser")]
use async_trait::async_trait;
#[cfg(feature = "browser")]
use chromiumoxide::{Browser, BrowserConfig, Page};
#[cfg(feature = "browser")]
use futures::StreamExt;
#[cfg(feature = "browser")]
use serde_json::Value;
#[cfg(feature = "browser")]
use tracing::{debug, info, warn};

#[cfg(feature = "browser")]
use super::{Transport, DETAIL_PATH, MANIFEST_PATH, SEARCH_PATH};
use crate::error::CrawlError;
#[cfg(feature = "browser")]
use crate::transport::NMPA_BASE;

/// Browser session configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSessionConfig {
    /// Run in headless mode (default: true).
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Proxy server URL (e.g., "socks5://127.0.0.1:1080").
    #[serde(default)]
    pub proxy: Option<String>,

    /// Per-call timeout in seconds for in-page requests.
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,

    /// Inter-page delay bounds in milliseconds.
    #[serde(default = "default_delay_min")]
    pub delay_min_ms: u64,
    #[serde(default = "default_delay_max")]
    pub delay_max_ms: u64,

    /// Additional Chrome arguments.
    #[serde(default)]
    pub chrome_args: Vec<String>,
}

impl Default for BrowserSessionConfig {
    fn default() -> Self {
        Self {
            headless: default_headless(),
            proxy: None,
            call_timeout_secs: default_call_timeout(),
            delay_min_ms: default_delay_min(),
            delay_max_ms: default_delay_max(),
            chrome_args: Vec::new(),
        }
    }
}

fn default_headless() -> bool {
    true
}

fn default_call_timeout() -> u64 {
    60
}

fn default_delay_min() -> u64 {
    600
}

fn default_delay_max() -> u64 {
    1500
}

/// Exclusively owned browser session, acquired once per job batch.
#[cfg(feature = "browser")]
pub struct BrowserSession {
    config: BrowserSessionConfig,
    browser: Option<Browser>,
    page: Option<Page>,
}

#[cfg(feature = "browser")]
impl BrowserSession {
    /// Common Chrome executable paths to check.
    const CHROME_PATHS: &'static [&'static str] = &[
        // Linux
        "/usr/bin/google-chrome",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
        "/snap/bin/chromium",
        // macOS
        "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
        "/Applications/Chromium.app/Contents/MacOS/Chromium",
        // Common install locations
        "/opt/google/chrome/google-chrome",
    ];

    pub fn new(config: BrowserSessionConfig) -> Self {
        Self {
            config,
            browser: None,
            page: None,
        }
    }

    fn find_chrome() -> Result<std::path::PathBuf, CrawlError> {
        for path in Self::CHROME_PATHS {
            let p = std::path::Path::new(path);
            if p.exists() {
                info!("Found Chrome at: {}", path);
                return Ok(p.to_path_buf());
            }
        }

        for cmd in &[
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
        ] {
            if let Ok(output) = std::process::Command::new("which").arg(cmd).output() {
                if output.status.success() {
                    let path = String::from_utf8_lossy(&output.stdout).trim().to_string();
                    if !path.is_empty() {
                        info!("Found Chrome in PATH: {}", path);
                        return Ok(std::path::PathBuf::from(path));
                    }
                }
            }
        }

        Err(CrawlError::Browser(
            "Chrome/Chromium not found; install chromium or google-chrome".to_string(),
        ))
    }

    /// Launch the browser and open the portal's search page, waiting
    /// until the page's `axios` instance is available.
    pub async fn start(&mut self) -> Result<(), CrawlError> {
        if self.browser.is_some() {
            return Ok(());
        }

        info!("Launching browser (headless={})", self.config.headless);
        let chrome_path = Self::find_chrome()?;

        let mut builder = BrowserConfig::builder().chrome_executable(chrome_path);
        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(ref proxy) = self.config.proxy {
            builder = builder.arg(format!("--proxy-server={}", proxy));
        }

        builder = builder
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--no-sandbox");

        for arg in &self.config.chrome_args {
            builder = builder.arg(arg.as_str());
        }

        let config = builder
            .build()
            .map_err(|e| CrawlError::Browser(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| CrawlError::Browser(format!("Failed to launch browser: {}", e)))?;

        // Spawn handler task
        tokio::spawn(async move {
            while let Some(h) = handler.next().await {
                if h.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page(format!("{}/datasearch/home-index.html", NMPA_BASE))
            .await
            .map_err(|e| CrawlError::Browser(format!("Failed to open portal page: {}", e)))?;

        self.browser = Some(browser);
        self.page = Some(page);
        self.wait_for_axios(Duration::from_secs(20)).await?;

        Ok(())
    }

    /// Close the session. Dropping the handles tears down the Chrome
    /// process.
    pub async fn close(&mut self) {
        self.page = None;
        self.browser = None;
    }

    fn page(&self) -> Result<&Page, CrawlError> {
        self.page
            .as_ref()
            .ok_or_else(|| CrawlError::Browser("browser session not started".to_string()))
    }

    /// Poll until the page's axios global exists; the site builds it
    /// during page load and every API call goes through it.
    async fn wait_for_axios(&self, timeout: Duration) -> Result<(), CrawlError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            if let Ok(result) = page.evaluate("!!window.axios".to_string()).await {
                if result.into_value::<bool>().unwrap_or(false) {
                    debug!("Page axios instance is ready");
                    return Ok(());
                }
            }
            if Instant::now() >= deadline {
                return Err(CrawlError::Browser(
                    "timed out waiting for the page's axios instance".to_string(),
                ));
            }
            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }

    /// Evaluate an async JS body in the page. The body must call
    /// `resolve(...)` with its result; thrown errors resolve to the
    /// `{error}` sentinel instead of propagating. `Ok(None)` means the
    /// call timed out.
    async fn exec_async(&self, body: &str) -> Result<Option<Value>, CrawlError> {
        let page = self.page()?;
        let script = format!(
            r#"
            new Promise((resolve) => {{
                (async () => {{
                    try {{
                        {body}
                    }} catch (err) {{
                        resolve({{ error: String(err) }});
                    }}
                }})();
            }})
            "#
        );

        let timeout = Duration::from_secs(self.config.call_timeout_secs);
        match tokio::time::timeout(timeout, page.evaluate(script)).await {
            Ok(Ok(result)) => {
                let value = result
                    .into_value()
                    .map_err(|e| CrawlError::Browser(format!("unreadable page result: {}", e)))?;
                Ok(Some(value))
            }
            Ok(Err(e)) => Err(CrawlError::Browser(e.to_string())),
            Err(_) => {
                warn!("In-page call timed out after {:?}", timeout);
                Ok(None)
            }
        }
    }
}

/// Extract the in-page error sentinel, if present.
#[cfg(feature = "browser")]
fn sentinel(value: &Value) -> Option<String> {
    value
        .get("error")
        .and_then(Value::as_str)
        .map(|s| s.to_string())
}

#[cfg(feature = "browser")]
#[async_trait]
impl Transport for BrowserSession {
    async fn manifest(&self) -> Result<Value, CrawlError> {
        let body = format!(
            r#"
            const url = '{MANIFEST_PATH}?date=' + Date.now();
            const resp = await axios.get(url);
            resolve(resp.data);
            "#
        );

        match self.exec_async(&body).await? {
            None => Err(CrawlError::Browser(
                "manifest request timed out".to_string(),
            )),
            Some(value) => match sentinel(&value) {
                Some(message) => Err(CrawlError::BrowserCall(message)),
                None => Ok(value),
            },
        }
    }

    async fn search(
        &self,
        item_id: &str,
        search_value: &str,
        page_num: u32,
        page_size: u32,
    ) -> Result<Option<Value>, CrawlError> {
        let body = format!(
            r#"
            const url = '{SEARCH_PATH}';
            const params = {{
                itemId: {item_id},
                isSenior: 'N',
                searchValue: {search_value},
                pageNum: {page_num},
                pageSize: {page_size},
                timestamp: Date.now()
            }};
            const resp = await axios.get(url, {{ params }});
            resolve(resp.data);
            "#,
            item_id = js_string(item_id),
            search_value = js_string(search_value),
        );

        match self.exec_async(&body).await? {
            None => Ok(None),
            Some(value) => match sentinel(&value) {
                // Inside pagination a failed call means "no more data",
                // not a fault.
                Some(message) => {
                    warn!("Search page {} reported an error: {}", page_num, message);
                    Ok(None)
                }
                None => Ok(Some(value)),
            },
        }
    }

    async fn detail(&self, item_id: &str, doc_id: &str) -> Result<Value, CrawlError> {
        let body = format!(
            r#"
            const url = '{DETAIL_PATH}';
            const params = {{
                itemId: {item_id},
                id: {doc_id},
                timestamp: Date.now()
            }};
            const resp = await axios.get(url, {{ params }});
            resolve(resp.data);
            "#,
            item_id = js_string(item_id),
            doc_id = js_string(doc_id),
        );

        match self.exec_async(&body).await? {
            None => Err(CrawlError::BrowserCall("detail request timed out".to_string())),
            Some(value) => match sentinel(&value) {
                Some(message) => Err(CrawlError::BrowserCall(message)),
                None => Ok(value),
            },
        }
    }

    fn page_delay_range(&self) -> Option<(u64, u64)> {
        Some((self.config.delay_min_ms, self.config.delay_max_ms))
    }
}

/// Quote a Rust string as a JS string literal.
#[cfg(feature = "browser")]
fn js_string(s: &str) -> String {
    serde_json::to_string(s).unwrap_or_else(|_| "\"\"".to_string())
}

// Stub for when browser feature is disabled
#[cfg(not(feature = "browser"))]
pub struct BrowserSession {
    #[allow(dead_code)]
    config: BrowserSessionConfig,
}

#[cfg(not(feature = "browser"))]
impl BrowserSession {
    pub fn new(config: BrowserSessionConfig) -> Self {
        Self { config }
    }

    pub async fn start(&mut self) -> Result<(), CrawlError> {
        Err(CrawlError::Browser(
            "Browser support not compiled. Rebuild with: cargo build --features browser".to_string(),
        ))
    }

    pub async fn close(&mut self) {}
}

#[cfg(all(test, feature = "browser"))]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sentinel_detection() {
        assert_eq!(
            sentinel(&json!({"error": "Error: Network Error"})),
            Some("Error: Network Error".to_string())
        );
        assert_eq!(sentinel(&json!({"data": {"list": []}})), None);
        assert_eq!(sentinel(&json!([1, 2])), None);
    }

    #[test]
    fn test_js_string_escapes() {
        assert_eq!(js_string("abc"), "\"abc\"");
        assert_eq!(js_string("a'b\"c"), "\"a'b\\\"c\"");
    }

    #[test]
    fn test_default_config() {
        let config: BrowserSessionConfig = serde_json::from_str("{}").unwrap();
        assert!(config.headless);
        assert_eq!(config.call_timeout_secs, 60);
        assert_eq!((config.delay_min_ms, config.delay_max_ms), (600, 1500));
    }
}
