//! Request transports for the portal's data-search API.
//!
//! Two interchangeable engines implement the same two-call contract.
//! The browser-delegated engine runs requests inside a live page so the
//! site's own client-side signing executes unmodified; the direct-HTTP
//! engine signs requests itself through an injected [`http::Signer`].
//! The pagination engine depends only on the [`Transport`] trait.

pub mod browser;
pub mod http;

pub use browser::{BrowserSession, BrowserSessionConfig};
pub use http::{CommandSigner, HttpTransport, Signature, Signer};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::CrawlError;

/// Portal origin.
pub const NMPA_BASE: &str = "https://www.nmpa.gov.cn";

/// Paged search endpoint.
pub const SEARCH_PATH: &str = "/datasearch/data/nmpadata/search";

/// Single-record detail endpoint.
pub const DETAIL_PATH: &str = "/datasearch/data/nmpadata/queryDetail";

/// Dataset configuration manifest.
pub const MANIFEST_PATH: &str = "/datasearch/config/NMPA_DATA.json";

/// Request-issuing strategy for search and detail calls.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch the dataset configuration manifest, cache-busted with the
    /// current timestamp.
    async fn manifest(&self) -> Result<Value, CrawlError>;

    /// Issue one paged search. `Ok(None)` means the call produced no
    /// response (timeout, or an in-page sentinel) and pagination should
    /// stop without error.
    async fn search(
        &self,
        item_id: &str,
        search_value: &str,
        page_num: u32,
        page_size: u32,
    ) -> Result<Option<Value>, CrawlError>;

    /// Fetch one record's detail document.
    async fn detail(&self, item_id: &str, doc_id: &str) -> Result<Value, CrawlError>;

    /// Inter-page delay bounds in milliseconds, for transports that need
    /// pacing between pages.
    fn page_delay_range(&self) -> Option<(u64, u64)> {
        None
    }
}
