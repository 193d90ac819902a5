use crate::config::CrawlConfig;
use crate::error::Result;
use crate::fetch::{Fetcher, HttpFetcher};
use crate::job::{CrawlJob, CrawlProgress, FrontierEntry};
use crate::redirect::RedirectResolver;
use crate::render::PageRenderer;
use crate::result::PageOutcome;
use crate::strategy::PageContext;
use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Called after every dispatched page with the job counters, the page URL
/// and what happened to it.
pub type ProgressCallback = Arc<dyn Fn(&CrawlProgress, &str, &PageOutcome) + Send + Sync>;

/// Breadth-first, strictly sequential traversal of one site.
///
/// One page is fetched, extracted and committed before the next frontier
/// entry is taken, so the job state is never touched concurrently.
pub struct Crawler {
    fetcher: Arc<dyn Fetcher>,
    renderer: Option<Arc<dyn PageRenderer>>,
    progress_callback: Option<ProgressCallback>,
    cancelled: Arc<AtomicBool>,
}

impl Crawler {
    /// A crawler backed by the reqwest client, without rendering.
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        Ok(Self::with_fetcher(Arc::new(HttpFetcher::new(config)?)))
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            fetcher,
            renderer: None,
            progress_callback: None,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Shares a cancellation flag with the owner of the job.
    pub fn with_cancel_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        self.cancelled.clone()
    }

    pub fn has_renderer(&self) -> bool {
        self.renderer.is_some()
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Drives `job` until its frontier is exhausted, the page cap is reached
    /// or the crawl is cancelled. Page failures are recorded as outcomes and
    /// never end the run early.
    pub async fn run(&self, job: &mut CrawlJob) -> CrawlProgress {
        let max_pages = job.config.max_pages;
        let max_depth = job.config.max_depth;
        info!(
            "Starting analysis of {} (max {} pages, max depth {}, rendering {})",
            job.seed_url,
            max_pages,
            max_depth,
            if self.has_renderer() { "enabled" } else { "disabled" }
        );

        job.started_at.get_or_insert_with(Utc::now);
        let mut resolver = RedirectResolver::new(job.config.redirect_timeout());
        let renderer = self.renderer.as_deref();

        while job.pages_crawled < max_pages {
            if self.is_cancelled() {
                warn!("Analysis of {} cancelled", job.seed_url);
                break;
            }

            let Some(FrontierEntry { url, depth }) = job.frontier.pop_front() else {
                break;
            };
            if job.visited.contains(&url) || depth > max_depth {
                debug!("Discarding {} (depth {})", url, depth);
                continue;
            }
            job.visited.insert(url.clone());

            info!(
                "Crawling [{}/{}] depth {}: {}",
                job.pages_crawled + 1,
                max_pages,
                depth,
                url
            );

            let outcome = PageContext {
                fetcher: &*self.fetcher,
                renderer,
                resolver: &mut resolver,
            }
            .process_page(job, &url, depth)
            .await;
            job.pages_crawled += 1;

            match &outcome {
                PageOutcome::Failed { .. } => warn!("{}: {}", url, outcome),
                _ => info!("{}: {}", url, outcome),
            }

            if let Some(ref callback) = self.progress_callback {
                callback(&job.progress(), &url, &outcome);
            }

            let delay = job.config.page_delay();
            if !delay.is_zero() && !job.frontier.is_empty() && job.pages_crawled < max_pages {
                tokio::time::sleep(delay).await;
            }
        }

        if let Some(renderer) = renderer
            && let Err(e) = renderer.close().await
        {
            warn!("Failed to release renderer: {}", e);
        }

        job.finished_at = Some(Utc::now());
        job.complete = true;

        let progress = job.progress();
        info!(
            "Analysis complete. Pages: {}, anchors: {}, redirects: {}, distinct targets: {}, redirect lookups: {}",
            progress.pages_visited,
            progress.total_anchors,
            progress.redirect_count,
            progress.distinct_target_urls,
            resolver.cached()
        );
        progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::TextType;
    use crate::error::ScanError;
    use crate::redirect::HopStatus;
    use crate::result::ExtractionMethod;
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::Mutex;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> CrawlConfig {
        CrawlConfig::default().without_delays()
    }

    fn html_page(body: &str) -> ResponseTemplate {
        ResponseTemplate::new(200)
            .insert_header("content-type", "text/html; charset=utf-8")
            .set_body_bytes(format!("<html><body>{}</body></html>", body).into_bytes())
    }

    async fn mount_get(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    async fn mount_head(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("HEAD"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn crawler() -> Crawler {
        Crawler::new(&config()).unwrap()
    }

    /// Returns a fixed snapshot for every page.
    struct FakeRenderer {
        html: String,
        closed: AtomicBool,
    }

    #[async_trait]
    impl PageRenderer for FakeRenderer {
        async fn render(&self, _url: &str) -> Result<String> {
            Ok(self.html.clone())
        }

        async fn close(&self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct BrokenRenderer;

    #[async_trait]
    impl PageRenderer for BrokenRenderer {
        async fn render(&self, url: &str) -> Result<String> {
            Err(ScanError::Render(format!("cannot load {}", url)))
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_single_page_crawl() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(html_page(r#"<a href="/a">Pricing plans</a><a href="/b">Docs</a>"#))
            .expect(1)
            .mount(&server)
            .await;

        let mut job = CrawlJob::new(
            &server.uri(),
            config().with_max_pages(1).with_max_depth(0),
        )
        .unwrap();
        let progress = crawler().run(&mut job).await;

        assert!(job.complete);
        assert!(job.frontier.is_empty());
        assert_eq!(job.pages_crawled, 1);
        assert_eq!(progress.pages_visited, 1);
        assert_eq!(progress.total_anchors, 2);
        assert!(job.started_at.is_some());
        assert!(job.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_generic_anchor_is_classified() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/pricing">Click here</a>"#)).await;
        mount_head(&server, "/pricing", ResponseTemplate::new(200)).await;

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(0)).unwrap();
        crawler().run(&mut job).await;

        let target = format!("{}/pricing", server.uri());
        let report = job.report_for_url(&target).unwrap();
        assert_eq!(report.total_links_found, 1);
        assert_eq!(report.anchor_text_breakdown[0].anchor_text, "Click here");
        assert_eq!(report.anchor_text_breakdown[0].text_type, TextType::Generic);
        assert!(!report.anchor_text_breakdown[0].has_redirects);
    }

    #[tokio::test]
    async fn test_redirecting_link_is_recorded() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/old">Old pricing page</a>"#)).await;
        mount_get(&server, "/new", html_page("moved here")).await;
        mount_head(
            &server,
            "/old",
            ResponseTemplate::new(301).insert_header("location", "/new"),
        )
        .await;
        mount_head(&server, "/new", ResponseTemplate::new(200)).await;

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(1)).unwrap();
        crawler().run(&mut job).await;

        assert_eq!(job.redirects.len(), 1);
        let record = &job.redirects[0];
        assert_eq!(record.original_url, format!("{}/old", server.uri()));
        assert_eq!(record.final_url, format!("{}/new", server.uri()));
        assert_eq!(record.redirect_count, 1);
        assert_eq!(
            record.status_codes,
            vec![HopStatus::Code(301), HopStatus::Code(200)]
        );
        assert_eq!(record.redirect_chain.len(), 2);

        let report = job.report_for_url(&record.final_url).unwrap();
        assert!(report.anchor_text_breakdown[0].has_redirects);

        // The crawler follows the link to where it lands.
        assert!(job.visited.contains(&record.final_url));
        assert!(!job.visited.contains(&record.original_url));
    }

    #[tokio::test]
    async fn test_offsite_redirect_is_not_crawled() {
        let server = MockServer::start().await;
        let partner = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/out">Our partner</a>"#)).await;
        mount_head(
            &server,
            "/out",
            ResponseTemplate::new(301).insert_header("location", format!("{}/landing", partner.uri())),
        )
        .await;
        mount_head(&partner, "/landing", ResponseTemplate::new(200)).await;
        mount_get(&partner, "/landing", html_page("partner landing")).await;

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(2)).unwrap();
        let progress = crawler().run(&mut job).await;

        assert_eq!(progress.pages_visited, 1);
        assert_eq!(job.redirects.len(), 1);
        assert_eq!(job.redirects[0].final_url, format!("{}/landing", partner.uri()));

        let requests = partner.received_requests().await.unwrap();
        let partner_gets = requests
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .count();
        assert_eq!(partner_gets, 0);
    }

    #[tokio::test]
    async fn test_redirect_failure_becomes_error_sentinel() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/loop">Loop</a>"#)).await;
        mount_head(
            &server,
            "/loop",
            ResponseTemplate::new(302).insert_header("location", "/loop"),
        )
        .await;

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(0)).unwrap();
        crawler().run(&mut job).await;

        let anchor = &job.anchors[0];
        let info = anchor.redirect_info.as_ref().unwrap();
        assert_eq!(info.hop_count, 0);
        assert_eq!(info.status_codes, vec![HopStatus::ERROR]);
        assert_eq!(info.final_url, info.original_url);
        assert!(job.redirects.is_empty());
        assert_eq!(job.all_target_urls(), vec![format!("{}/loop", server.uri())]);
    }

    #[tokio::test]
    async fn test_low_anchor_count_uses_renderer() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/a">A</a><a href="/b">B</a>"#)).await;

        let links: String = (1..=6)
            .map(|i| format!(r#"<a href="/r{}">Rendered {}</a>"#, i, i))
            .collect();
        let renderer = Arc::new(FakeRenderer {
            html: format!("<html><body>{}</body></html>", links),
            closed: AtomicBool::new(false),
        });

        let mut job = CrawlJob::new(
            &server.uri(),
            config().with_max_depth(0).with_selenium_threshold(5),
        )
        .unwrap();
        crawler()
            .with_renderer(renderer.clone())
            .run(&mut job)
            .await;

        assert_eq!(job.anchors.len(), 6);
        assert!(
            job.anchors
                .iter()
                .all(|a| a.extraction_method == ExtractionMethod::Rendered)
        );
        assert!(job.report_for_url(&format!("{}/a", server.uri())).is_none());
        assert!(renderer.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_failed_render_keeps_plain_capture() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/a">Only link</a>"#)).await;

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(0)).unwrap();
        crawler()
            .with_renderer(Arc::new(BrokenRenderer))
            .run(&mut job)
            .await;

        assert_eq!(job.anchors.len(), 1);
        assert_eq!(job.anchors[0].extraction_method, ExtractionMethod::Plain);
    }

    #[tokio::test]
    async fn test_non_html_page_is_skipped() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/",
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/json")
                .set_body_bytes(br#"{"links": []}"#.to_vec()),
        )
        .await;

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let callback: ProgressCallback = Arc::new(move |_progress: &CrawlProgress, url: &str, outcome: &PageOutcome| {
            sink.lock().unwrap().push((url.to_string(), outcome.clone()));
        });

        let mut job = CrawlJob::new(&server.uri(), config()).unwrap();
        crawler()
            .with_progress_callback(callback)
            .run(&mut job)
            .await;

        let outcomes = outcomes.lock().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(outcomes[0].1, PageOutcome::Skipped { .. }));
        assert_eq!(job.pages_crawled, 1);
        assert!(job.anchors.is_empty());
        assert!(job.complete);
    }

    #[tokio::test]
    async fn test_server_error_does_not_abort_job() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            "/",
            html_page(r#"<a href="/broken">Broken</a><a href="/ok">Working page</a>"#),
        )
        .await;
        mount_get(&server, "/broken", ResponseTemplate::new(500)).await;
        mount_get(&server, "/ok", html_page(r#"<a href="/">Home</a>"#)).await;

        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = outcomes.clone();
        let callback: ProgressCallback = Arc::new(move |_progress: &CrawlProgress, url: &str, outcome: &PageOutcome| {
            sink.lock().unwrap().push((url.to_string(), outcome.clone()));
        });

        let mut job = CrawlJob::new(&server.uri(), config().with_max_depth(1)).unwrap();
        crawler()
            .with_progress_callback(callback)
            .run(&mut job)
            .await;

        assert!(job.complete);
        assert_eq!(job.pages_crawled, 3);

        let outcomes = outcomes.lock().unwrap();
        let broken = outcomes
            .iter()
            .find(|(url, _)| url.ends_with("/broken"))
            .unwrap();
        assert!(matches!(broken.1, PageOutcome::Failed { .. }));
        assert!(job.anchors.iter().any(|a| a.anchor_text == "Home"));
    }

    #[tokio::test]
    async fn test_frontier_bound_and_no_revisits() {
        let server = MockServer::start().await;
        let links: String = (0..10)
            .map(|i| format!(r#"<a href="/p{}">Page {}</a>"#, i, i))
            .chain(std::iter::once(r#"<a href="/">Home</a>"#.to_string()))
            .collect();
        Mock::given(method("GET"))
            .respond_with(html_page(&links))
            .mount(&server)
            .await;

        let mut job = CrawlJob::new(
            &server.uri(),
            config().with_max_pages(3).with_max_depth(2),
        )
        .unwrap();
        crawler().run(&mut job).await;

        assert_eq!(job.pages_crawled, 3);
        assert!(job.enqueued.len() <= 3);

        let requests = server.received_requests().await.unwrap();
        let gets: Vec<String> = requests
            .iter()
            .filter(|r| r.method.as_str() == "GET")
            .map(|r| r.url.to_string())
            .collect();
        let distinct: HashSet<&String> = gets.iter().collect();
        assert_eq!(gets.len(), distinct.len(), "a page was fetched twice");
        assert_eq!(gets.len(), 3);
    }

    #[tokio::test]
    async fn test_cancelled_job_still_completes() {
        let server = MockServer::start().await;
        mount_get(&server, "/", html_page(r#"<a href="/a">A</a>"#)).await;

        let crawler = crawler();
        crawler.cancel_flag().store(true, Ordering::Relaxed);

        let mut job = CrawlJob::new(&server.uri(), config()).unwrap();
        crawler.run(&mut job).await;

        assert!(job.complete);
        assert_eq!(job.pages_crawled, 0);
        assert!(job.finished_at.is_some());
    }
}
