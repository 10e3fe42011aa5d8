//! Error taxonomy for acquisition jobs.
//!
//! Row-level anomalies (missing identifiers, sentinel detail responses)
//! are absorbed inside the pagination engine and never reach this type;
//! everything here is fatal for the operation that returned it.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    /// Dataset identifier absent from both the live manifest and the
    /// static fallback table.
    #[error("no item id found for dataset '{0}'; update the static id file or check the portal manifest")]
    Resolution(String),

    /// The in-page call reported an `{error}` sentinel. The browser
    /// execution context cannot throw across the boundary, so failures
    /// come back as a payload and are re-raised here.
    #[error("in-page request failed: {0}")]
    BrowserCall(String),

    /// Browser session problem (launch, navigation, script evaluation).
    #[error("browser session error: {0}")]
    Browser(String),

    /// HTTP failure that survived the retry policy.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The external signing command failed or produced garbage.
    #[error("signing command failed: {0}")]
    Signer(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
