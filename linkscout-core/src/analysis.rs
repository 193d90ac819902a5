//! Lifecycle of one analysis run: start it, watch it, cancel it and query
//! its results once it has finished.

use crate::error::{AnalysisError, Result};
use crate::report::{AnalysisSummary, AnchorTextRow, RedirectRow, anchor_text_rows, redirect_rows, summarize_job};
use chrono::{DateTime, Utc};
use linkscout_scanner::{
    AggregateReport, CrawlConfig, CrawlJob, CrawlProgress, Crawler, HeadlessRenderer, PageOutcome,
    ProgressCallback,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{RwLock, watch};
use tracing::{info, warn};
use uuid::Uuid;

/// Options for starting an analysis
#[derive(Clone, Default)]
pub struct AnalysisOptions {
    pub seed_url: String,
    pub config: CrawlConfig,
    /// Enables the headless Chrome fallback. Without it every page is parsed
    /// as served.
    pub render_js: bool,
    /// Chrome/Chromium binary to launch. Searched for when unset.
    pub chrome_executable: Option<PathBuf>,
    pub progress_callback: Option<ProgressCallback>,
}

impl AnalysisOptions {
    pub fn new(seed_url: &str, max_pages: usize, max_depth: usize, selenium_threshold: usize) -> Self {
        Self {
            seed_url: seed_url.to_string(),
            config: CrawlConfig::default()
                .with_max_pages(max_pages)
                .with_max_depth(max_depth)
                .with_selenium_threshold(selenium_threshold),
            ..Self::default()
        }
    }

    pub fn with_config(mut self, config: CrawlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_rendering(mut self) -> Self {
        self.render_js = true;
        self
    }

    /// Enables rendering with a specific browser binary.
    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.render_js = true;
        self.chrome_executable = Some(path.into());
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Point-in-time view of an analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub id: Uuid,
    pub seed_url: String,
    pub domain: String,
    pub complete: bool,
    pub cancelled: bool,
    pub pages_visited: usize,
    pub total_anchors: usize,
    pub redirect_count: usize,
    pub distinct_target_urls: usize,
    /// A rendering endpoint was configured for this run.
    pub selenium_available: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub elapsed_seconds: f64,
}

impl AnalysisStatus {
    pub fn label(&self) -> &'static str {
        match (self.complete, self.cancelled) {
            (true, true) => "Cancelled",
            (true, false) => "Complete",
            (false, _) => "In Progress",
        }
    }
}

/// Validates the seed and starts crawling in the background.
///
/// Seed problems are reported here, before any request is made. Everything
/// that goes wrong afterwards ends up in the job's results. Must be called
/// from within a tokio runtime.
pub fn start_analysis(options: AnalysisOptions) -> Result<AnalysisHandle> {
    let AnalysisOptions {
        seed_url,
        config,
        render_js,
        chrome_executable,
        progress_callback,
    } = options;

    if seed_url.trim().is_empty() {
        return Err(AnalysisError::EmptySeed);
    }
    let job = CrawlJob::new(&seed_url, config)
        .map_err(|e| AnalysisError::InvalidSeed(e.to_string()))?;

    let mut crawler = Crawler::new(&job.config)?;
    if render_js {
        let mut renderer = HeadlessRenderer::new(&job.config);
        if let Some(path) = chrome_executable {
            renderer = renderer.with_chrome_executable(path);
        }
        crawler = crawler.with_renderer(Arc::new(renderer));
    }

    Ok(start_job(job, crawler, progress_callback))
}

/// Runs `job` with a caller-assembled crawler. Any progress callback already
/// set on the crawler is replaced; pass it as `progress_callback` instead.
pub fn start_job(
    mut job: CrawlJob,
    crawler: Crawler,
    progress_callback: Option<ProgressCallback>,
) -> AnalysisHandle {
    let id = Uuid::new_v4();
    let started_at = Utc::now();
    job.started_at = Some(started_at);

    let (progress_tx, progress_rx) = watch::channel(job.progress());
    let progress_tx = Arc::new(progress_tx);
    let slot: Arc<RwLock<Option<CrawlJob>>> = Arc::new(RwLock::new(None));
    let cancelled = crawler.cancel_flag();
    let selenium_available = crawler.has_renderer();
    let seed_url = job.seed_url.clone();
    let domain = job.domain.clone();

    let tx = progress_tx.clone();
    let forward: ProgressCallback =
        Arc::new(move |progress: &CrawlProgress, url: &str, outcome: &PageOutcome| {
            tx.send_replace(progress.clone());
            if let Some(ref callback) = progress_callback {
                callback(progress, url, outcome);
            }
        });
    let crawler = crawler.with_progress_callback(forward);

    info!("Analysis {} started for {}", id, seed_url);
    let task_slot = slot.clone();
    tokio::spawn(async move {
        let progress = crawler.run(&mut job).await;
        // Results become readable before anyone is told the job is complete.
        *task_slot.write().await = Some(job);
        progress_tx.send_replace(progress);
    });

    AnalysisHandle {
        id,
        seed_url,
        domain,
        selenium_available,
        started_at,
        progress: progress_rx,
        job: slot,
        cancelled,
    }
}

/// Handle to a running or finished analysis.
///
/// Queries other than [`AnalysisHandle::status`] fail with
/// [`AnalysisError::NoData`] until the crawl has completed.
pub struct AnalysisHandle {
    id: Uuid,
    seed_url: String,
    domain: String,
    selenium_available: bool,
    started_at: DateTime<Utc>,
    progress: watch::Receiver<CrawlProgress>,
    job: Arc<RwLock<Option<CrawlJob>>>,
    cancelled: Arc<AtomicBool>,
}

impl AnalysisHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn seed_url(&self) -> &str {
        &self.seed_url
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn progress(&self) -> CrawlProgress {
        self.progress.borrow().clone()
    }

    pub fn is_complete(&self) -> bool {
        self.progress.borrow().complete
    }

    /// Asks the crawler to stop before its next page. The job still
    /// completes normally with whatever it collected so far.
    pub fn cancel(&self) {
        warn!("Cancelling analysis {}", self.id);
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub async fn status(&self) -> AnalysisStatus {
        let progress = self.progress();
        let finished_at = self
            .job
            .read()
            .await
            .as_ref()
            .and_then(|job| job.finished_at);
        let elapsed = finished_at.unwrap_or_else(Utc::now) - self.started_at;

        AnalysisStatus {
            id: self.id,
            seed_url: self.seed_url.clone(),
            domain: self.domain.clone(),
            complete: progress.complete,
            cancelled: self.cancelled.load(Ordering::Relaxed),
            pages_visited: progress.pages_visited,
            total_anchors: progress.total_anchors,
            redirect_count: progress.redirect_count,
            distinct_target_urls: progress.distinct_target_urls,
            selenium_available: self.selenium_available,
            started_at: self.started_at,
            finished_at,
            elapsed_seconds: elapsed.num_milliseconds() as f64 / 1000.0,
        }
    }

    /// Resolves once the crawl has completed.
    pub async fn wait(&self) -> Result<AnalysisStatus> {
        let mut progress = self.progress.clone();
        progress
            .wait_for(|p| p.complete)
            .await
            .map_err(|_| AnalysisError::NoData)?;
        Ok(self.status().await)
    }

    async fn with_job<R>(&self, f: impl FnOnce(&CrawlJob) -> R) -> Result<R> {
        let guard = self.job.read().await;
        guard.as_ref().map(f).ok_or(AnalysisError::NoData)
    }

    pub async fn redirect_report(&self) -> Result<Vec<RedirectRow>> {
        self.with_job(|job| redirect_rows(&job.redirects)).await
    }

    pub async fn anchor_text_report(&self) -> Result<Vec<AnchorTextRow>> {
        self.with_job(|job| anchor_text_rows(&job.index)).await
    }

    /// `Ok(None)` when the finished job has nothing pointing at `url`.
    pub async fn report_for_url(&self, url: &str) -> Result<Option<AggregateReport>> {
        self.with_job(|job| job.report_for_url(url)).await
    }

    pub async fn all_target_urls(&self) -> Result<Vec<String>> {
        self.with_job(CrawlJob::all_target_urls).await
    }

    /// Status plus aggregate statistics, listing the `top` most linked URLs.
    pub async fn summary(&self, top: usize) -> Result<AnalysisSummary> {
        let status = self.status().await;
        self.with_job(|job| summarize_job(job, status, top)).await
    }
}
