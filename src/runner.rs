//! Job batch execution.
//!
//! Owns the transport for the lifetime of a batch: the browser session
//! is acquired once before the first job and released after the last,
//! whatever happens in between. Individual job failures are logged and
//! the batch moves on; the batch itself only fails when setup fails or
//! every job does.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info, warn};

use crate::config::{Config, EngineMode};
use crate::crawler::{crawl_job, CrawlOptions};
use crate::error::CrawlError;
use crate::export::{export_records, ExportPaths};
use crate::models::{DatasetDescriptor, DatasetKind};
use crate::resolver::{resolve_descriptors, StaticItemIds};
use crate::transport::{BrowserSession, CommandSigner, HttpTransport, Transport};

/// Outcome of one job.
#[derive(Debug)]
pub struct JobReport {
    pub dataset: DatasetKind,
    pub search_value: String,
    pub count: usize,
    pub export: Option<ExportPaths>,
    pub error: Option<String>,
}

impl JobReport {
    fn failed(dataset: DatasetKind, search_value: &str, error: String) -> Self {
        Self {
            dataset,
            search_value: search_value.to_string(),
            count: 0,
            export: None,
            error: Some(error),
        }
    }
}

/// Run every configured job and return per-job reports.
pub async fn run_jobs(config: &Config) -> anyhow::Result<Vec<JobReport>> {
    match config.mode {
        EngineMode::Browser => run_browser_batch(config).await,
        EngineMode::Http => {
            let signer = Arc::new(CommandSigner::new(
                config.http.node_path.clone(),
                config.http.sign_js.clone(),
            ));
            let transport = HttpTransport::new(
                signer,
                Duration::from_secs(config.http.timeout_secs),
                config.http.proxy.as_deref(),
            )
            .context("Failed to build HTTP transport")?;
            run_batch(&transport, config).await
        }
    }
}

#[cfg(feature = "browser")]
async fn run_browser_batch(config: &Config) -> anyhow::Result<Vec<JobReport>> {
    let mut session = BrowserSession::new(config.browser.clone());
    session
        .start()
        .await
        .context("Failed to start browser session")?;

    // Hold the result so the session is released on every exit path.
    let result = run_batch(&session, config).await;
    session.close().await;
    result
}

#[cfg(not(feature = "browser"))]
async fn run_browser_batch(config: &Config) -> anyhow::Result<Vec<JobReport>> {
    let mut session = BrowserSession::new(config.browser.clone());
    // The stub always fails with a rebuild hint.
    session.start().await?;
    Ok(Vec::new())
}

async fn run_batch(transport: &dyn Transport, config: &Config) -> anyhow::Result<Vec<JobReport>> {
    let descriptors = resolve_batch_descriptors(transport, config).await?;

    let opts = CrawlOptions {
        max_pages: config.max_pages,
        page_size: config.page_size,
    };

    let bar = ProgressBar::new(config.jobs.len() as u64);
    bar.set_style(
        ProgressStyle::with_template("{bar:30} {pos}/{len} {msg}")
            .expect("valid progress template"),
    );

    let mut reports = Vec::with_capacity(config.jobs.len());
    for job in &config.jobs {
        bar.set_message(format!("{} {}", job.dataset, job.search_value));

        let report = match descriptors.get(&job.dataset) {
            None => {
                error!(
                    "No item id for dataset {}, skipping job '{}'",
                    job.dataset, job.search_value
                );
                JobReport::failed(
                    job.dataset,
                    &job.search_value,
                    format!("no item id resolved for dataset {}", job.dataset),
                )
            }
            Some(descriptor) => run_one(transport, descriptor, job, &opts, config).await,
        };

        reports.push(report);
        bar.inc(1);
    }
    bar.finish_and_clear();

    if !reports.is_empty() && reports.iter().all(|r| r.error.is_some()) {
        anyhow::bail!("all {} jobs failed", reports.len());
    }
    Ok(reports)
}

async fn run_one(
    transport: &dyn Transport,
    descriptor: &DatasetDescriptor,
    job: &crate::config::JobConfig,
    opts: &CrawlOptions,
    config: &Config,
) -> JobReport {
    info!(
        "Starting job: dataset={} search_value={}",
        job.dataset, job.search_value
    );

    let records = match crawl_job(transport, descriptor, &job.search_value, opts).await {
        Ok(records) => records,
        Err(e) => {
            warn!("Job '{}' failed: {}", job.search_value, e);
            return JobReport::failed(job.dataset, &job.search_value, e.to_string());
        }
    };

    let basename = format!("{}_{}", job.dataset, job.search_value);
    match export_records(
        &records,
        &config.output_dir,
        &basename,
        config.export_format,
        job.dataset,
    ) {
        Ok(paths) => JobReport {
            dataset: job.dataset,
            search_value: job.search_value.clone(),
            count: records.len(),
            export: Some(paths),
            error: None,
        },
        Err(e) => {
            warn!("Export for '{}' failed: {:#}", basename, e);
            JobReport::failed(job.dataset, &job.search_value, format!("export failed: {}", e))
        }
    }
}

/// Resolve item ids for every dataset kind the batch needs.
///
/// Manifest failures have two tolerances, matching the two transports:
/// an in-page sentinel or a broken browser session is fatal (the rest
/// of the batch would fail the same way), while an HTTP manifest fetch
/// failure just falls back to the static table.
async fn resolve_batch_descriptors(
    transport: &dyn Transport,
    config: &Config,
) -> anyhow::Result<HashMap<DatasetKind, DatasetDescriptor>> {
    let manifest = match transport.manifest().await {
        Ok(tree) => Some(tree),
        Err(e @ (CrawlError::BrowserCall(_) | CrawlError::Browser(_))) => {
            return Err(e).context("Failed to read the dataset manifest");
        }
        Err(e) => {
            warn!("Manifest fetch failed, using static ids: {}", e);
            None
        }
    };

    let fallback = StaticItemIds::load(&config.static_ids_file);

    let mut kinds: Vec<DatasetKind> = config.jobs.iter().map(|j| j.dataset).collect();
    kinds.sort_by_key(|k| k.as_str());
    kinds.dedup();

    // Resolution failures are per-kind: jobs for an unresolvable kind
    // fail with a descriptive error while the rest of the batch runs.
    let mut descriptors = HashMap::new();
    for kind in kinds {
        match resolve_descriptors(manifest.as_ref(), &[kind], &fallback) {
            Ok(resolved) => descriptors.extend(resolved),
            Err(e) => error!("{}", e),
        }
    }
    Ok(descriptors)
}
