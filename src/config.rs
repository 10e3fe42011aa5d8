//! Configuration loading.
//!
//! One file describes a whole batch: engine mode, pagination bounds,
//! transport settings and the list of jobs to run. YAML or JSON,
//! dispatched on the file extension.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::export::ExportFormat;
use crate::models::DatasetKind;
use crate::transport::BrowserSessionConfig;

/// Which transport engine drives the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Delegate requests to a live browser session (default; no signing
    /// knowledge needed).
    #[default]
    Browser,
    /// Sign and issue requests directly. Requires an external signing
    /// command.
    Http,
}

/// Direct-HTTP engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpEngineConfig {
    /// Read timeout in seconds.
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,

    /// Proxy URL applied to all requests.
    #[serde(default)]
    pub proxy: Option<String>,

    /// Interpreter for the signing script.
    #[serde(default = "default_node_path")]
    pub node_path: String,

    /// Path to the external signing script.
    #[serde(default = "default_sign_js")]
    pub sign_js: PathBuf,
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_http_timeout(),
            proxy: None,
            node_path: default_node_path(),
            sign_js: default_sign_js(),
        }
    }
}

fn default_http_timeout() -> u64 {
    30
}

fn default_node_path() -> String {
    "node".to_string()
}

fn default_sign_js() -> PathBuf {
    PathBuf::from("sign/main.js")
}

/// One crawl job: a dataset and a search value (typically an approval
/// number prefix).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub dataset: DatasetKind,
    #[serde(alias = "code_prefix")]
    pub search_value: String,
}

/// Batch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub mode: EngineMode,

    /// Rows requested per page.
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Upper bound on pages per job.
    #[serde(default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(default)]
    pub browser: BrowserSessionConfig,

    #[serde(default)]
    pub http: HttpEngineConfig,

    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    #[serde(default)]
    pub export_format: ExportFormat,

    /// JSON file mapping dataset kind to a pre-captured identifier,
    /// used when live manifest resolution fails.
    #[serde(default = "default_static_ids_file")]
    pub static_ids_file: PathBuf,

    #[serde(default)]
    pub jobs: Vec<JobConfig>,
}

fn default_page_size() -> u32 {
    30
}

fn default_max_pages() -> u32 {
    50
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("outputs")
}

fn default_static_ids_file() -> PathBuf {
    PathBuf::from("static_item_ids.json")
}

impl Config {
    /// Load configuration from a file, dispatching the parser on the
    /// extension (`.yaml`/`.yml` or JSON otherwise).
    pub async fn load(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("yaml");
        match ext {
            "yaml" | "yml" => serde_yaml::from_str(&contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(&contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_mapping() {
        let config: Config = serde_yaml::from_str("{}").unwrap();
        assert_eq!(config.mode, EngineMode::Browser);
        assert_eq!(config.page_size, 30);
        assert_eq!(config.max_pages, 50);
        assert_eq!(config.output_dir, PathBuf::from("outputs"));
        assert_eq!(config.export_format, ExportFormat::Csv);
        assert!(config.jobs.is_empty());
    }

    #[test]
    fn test_full_yaml_round_trip() {
        let yaml = r#"
mode: http
page_size: 20
max_pages: 5
browser:
  headless: false
  delay_min_ms: 200
  delay_max_ms: 400
http:
  timeout_secs: 10
  proxy: socks5://127.0.0.1:1080
  sign_js: tools/sign.js
export_format: raw_only
jobs:
  - dataset: domestic
    search_value: 国药准字H2023
  - dataset: imported
    code_prefix: 国药准字J
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.mode, EngineMode::Http);
        assert!(!config.browser.headless);
        assert_eq!(config.http.timeout_secs, 10);
        assert_eq!(config.export_format, ExportFormat::RawOnly);
        assert_eq!(config.jobs.len(), 2);
        assert_eq!(config.jobs[0].dataset, DatasetKind::Domestic);
        // The original tool called this field code_prefix; both spellings
        // are accepted.
        assert_eq!(config.jobs[1].search_value, "国药准字J");
    }
}
