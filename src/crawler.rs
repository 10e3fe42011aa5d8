//! Pagination engine.
//!
//! Drives repeated paged search calls and per-row detail fetches
//! through a [`Transport`], bounded by `max_pages`. Termination is
//! always graceful: whatever records were accumulated are returned,
//! and only a hard transport fault aborts a job.

use rand::Rng;
use tracing::{debug, info, warn};

use crate::error::CrawlError;
use crate::extract::extract;
use crate::flatten::flatten;
use crate::models::{row_doc_id, DatasetDescriptor, PageResult, Record};
use crate::transport::Transport;

/// Bounds for one crawl job.
#[derive(Debug, Clone)]
pub struct CrawlOptions {
    pub max_pages: u32,
    pub page_size: u32,
}

impl Default for CrawlOptions {
    fn default() -> Self {
        Self {
            max_pages: 50,
            page_size: 30,
        }
    }
}

/// Crawl one job (one dataset × one search value) and return its
/// records in page order.
///
/// Ends without error when a page produces no response, no recognized
/// row list, or when the reported page count is reached. Rows without
/// a resolvable identifier are skipped; a record is only appended once
/// its detail fetch succeeds.
pub async fn crawl_job<T: Transport + ?Sized>(
    transport: &T,
    descriptor: &DatasetDescriptor,
    search_value: &str,
    opts: &CrawlOptions,
) -> Result<Vec<Record>, CrawlError> {
    let mut records = Vec::new();

    for page_num in 1..=opts.max_pages {
        let response = match transport
            .search(&descriptor.item_id, search_value, page_num, opts.page_size)
            .await?
        {
            Some(value) if !value.is_null() => value,
            _ => {
                debug!("No response for page {}, stopping", page_num);
                break;
            }
        };

        let page = PageResult::parse(&response);
        if page.rows.is_empty() {
            debug!("Page {} has no rows, stopping", page_num);
            break;
        }

        info!(
            "Page {}: {} rows (total reported: {:?})",
            page_num,
            page.rows.len(),
            page.total_count
        );

        for row in &page.rows {
            let Some(doc_id) = row_doc_id(row) else {
                debug!("Skipping row without a recognizable id");
                continue;
            };

            let raw = match transport.detail(&descriptor.item_id, &doc_id).await {
                Ok(value) => value,
                // Row-level anomaly: skip the row, keep the job alive.
                Err(CrawlError::BrowserCall(message)) => {
                    warn!("Skipping row {}: {}", doc_id, message);
                    continue;
                }
                Err(e) => return Err(e),
            };

            let fields = extract(&flatten(&raw), descriptor.kind);
            records.push(Record { fields, raw });
        }

        if let Some(count) = page.page_count {
            if count > 0 && u64::from(page_num) >= count {
                debug!("Reached reported page count {}", count);
                break;
            }
        }

        if page_num < opts.max_pages {
            if let Some((min_ms, max_ms)) = transport.page_delay_range() {
                tokio::time::sleep(jitter(min_ms, max_ms)).await;
            }
        }
    }

    Ok(records)
}

/// Uniform random delay within the configured bounds.
fn jitter(min_ms: u64, max_ms: u64) -> std::time::Duration {
    let ms = if max_ms > min_ms {
        rand::thread_rng().gen_range(min_ms..=max_ms)
    } else {
        min_ms
    };
    std::time::Duration::from_millis(ms)
}
