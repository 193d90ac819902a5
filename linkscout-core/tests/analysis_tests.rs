// Tests for the analysis lifecycle

use linkscout_core::analysis::{AnalysisOptions, start_analysis};
use linkscout_core::error::AnalysisError;
use linkscout_scanner::{CrawlConfig, CrawlProgress, PageOutcome, ProgressCallback, TextType};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn html_page(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html")
        .set_body_bytes(format!("<html><body>{}</body></html>", body).into_bytes())
}

fn options(seed: &str, max_pages: usize, max_depth: usize) -> AnalysisOptions {
    AnalysisOptions {
        seed_url: seed.to_string(),
        config: CrawlConfig::default()
            .without_delays()
            .with_max_pages(max_pages)
            .with_max_depth(max_depth),
        ..AnalysisOptions::default()
    }
}

/// Home links to /pricing directly, via a generic text and via /old which
/// redirects there. /pricing links back home.
async fn pricing_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(html_page(
            r#"<a href="/pricing">Pricing plans</a>
               <a href="/old">Click here</a>
               <a href="/pricing#top">See our pricing</a>"#,
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/pricing"))
        .respond_with(html_page(r#"<a href="/">Home</a>"#))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .and(path("/old"))
        .respond_with(ResponseTemplate::new(301).insert_header("location", "/pricing"))
        .mount(&server)
        .await;
    Mock::given(method("HEAD"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    server
}

// ============================================================================
// Start Validation Tests
// ============================================================================

#[test]
fn test_empty_seed_is_rejected() {
    let result = start_analysis(options("   ", 10, 1));
    assert!(matches!(result, Err(AnalysisError::EmptySeed)));
}

#[test]
fn test_invalid_seed_is_rejected() {
    let result = start_analysis(options("http://", 10, 1));
    assert!(matches!(result, Err(AnalysisError::InvalidSeed(_))));
}

#[test]
fn test_options_new_sets_limits() {
    let options = AnalysisOptions::new("example.com", 25, 2, 7);
    assert_eq!(options.config.max_pages, 25);
    assert_eq!(options.config.max_depth, 2);
    assert_eq!(options.config.selenium_threshold, 7);
    assert!(!options.render_js);
    assert!(options.chrome_executable.is_none());

    let options = options.with_chrome_executable("/usr/bin/chromium");
    assert!(options.render_js);
}

// ============================================================================
// Lifecycle Tests
// ============================================================================

#[tokio::test]
async fn test_full_analysis() {
    let server = pricing_site().await;
    let handle = start_analysis(options(&server.uri(), 10, 1)).unwrap();

    let status = handle.wait().await.unwrap();
    assert!(status.complete);
    assert!(!status.cancelled);
    assert_eq!(status.label(), "Complete");
    assert_eq!(status.pages_visited, 2);
    assert_eq!(status.total_anchors, 4);
    assert_eq!(status.redirect_count, 1);
    assert_eq!(status.distinct_target_urls, 2);
    assert!(!status.selenium_available);
    assert!(status.finished_at.is_some());

    let home = format!("{}/", server.uri());
    let pricing = format!("{}/pricing", server.uri());
    assert_eq!(
        handle.all_target_urls().await.unwrap(),
        vec![home.clone(), pricing.clone()]
    );

    let redirects = handle.redirect_report().await.unwrap();
    assert_eq!(redirects.len(), 1);
    assert_eq!(redirects[0].link_text, "Click here");
    assert_eq!(redirects[0].status_codes, "301 -> 200");
    assert_eq!(redirects[0].final_url, pricing);

    let rows = handle.anchor_text_report().await.unwrap();
    let generic = rows.iter().find(|r| r.anchor_text == "Click here").unwrap();
    assert_eq!(generic.url, pricing);
    assert_eq!(generic.text_type, TextType::Generic);
    assert!(generic.has_redirects);

    // Three anchors from the home page plus the redirect record for /old.
    let report = handle.report_for_url(&pricing).await.unwrap().unwrap();
    assert_eq!(report.total_links_found, 4);
    assert_eq!(report.unique_anchor_texts, 3);
    assert_eq!(report.anchor_text_breakdown[0].anchor_text, "Click here");
    assert_eq!(report.anchor_text_breakdown[0].count, 2);

    assert!(
        handle
            .report_for_url(&format!("{}/nowhere", server.uri()))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_queries_before_completion_report_no_data() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(html_page("slow").set_delay(Duration::from_millis(300)))
        .mount(&server)
        .await;

    let handle = start_analysis(options(&server.uri(), 1, 0)).unwrap();

    let status = handle.status().await;
    assert!(!status.complete);
    assert_eq!(status.label(), "In Progress");
    assert!(matches!(
        handle.redirect_report().await,
        Err(AnalysisError::NoData)
    ));
    assert!(matches!(
        handle.all_target_urls().await,
        Err(AnalysisError::NoData)
    ));

    handle.wait().await.unwrap();
    assert!(handle.redirect_report().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_cancel_before_first_page() {
    let server = pricing_site().await;
    let handle = start_analysis(options(&server.uri(), 10, 3)).unwrap();
    handle.cancel();

    let status = handle.wait().await.unwrap();
    assert!(status.complete);
    assert!(status.cancelled);
    assert_eq!(status.label(), "Cancelled");
    assert_eq!(status.pages_visited, 0);
    assert!(handle.anchor_text_report().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_progress_callback_sees_every_page() {
    let server = pricing_site().await;
    let pages = Arc::new(AtomicUsize::new(0));
    let counter = pages.clone();
    let callback: ProgressCallback =
        Arc::new(move |_progress: &CrawlProgress, _url: &str, outcome: &PageOutcome| {
            assert!(outcome.is_success());
            counter.fetch_add(1, Ordering::SeqCst);
        });

    let handle =
        start_analysis(options(&server.uri(), 10, 1).with_progress_callback(callback)).unwrap();
    handle.wait().await.unwrap();

    assert_eq!(pages.load(Ordering::SeqCst), 2);
    assert_eq!(handle.progress().pages_visited, 2);
}

#[tokio::test]
async fn test_summary_lists_most_linked_urls() {
    let server = pricing_site().await;
    let handle = start_analysis(options(&server.uri(), 10, 1)).unwrap();
    handle.wait().await.unwrap();

    let summary = handle.summary(1).await.unwrap();
    assert_eq!(summary.top_targets.len(), 1);
    assert_eq!(summary.top_targets[0].url, format!("{}/pricing", server.uri()));
    assert_eq!(summary.top_targets[0].occurrences, 3);
    assert!(summary.top_targets[0].has_redirects);
    assert_eq!(summary.plain_anchors, 4);
    assert_eq!(summary.rendered_anchors, 0);
}

#[tokio::test]
async fn test_missing_browser_falls_back_to_plain_html() {
    let server = pricing_site().await;
    let handle = start_analysis(
        options(&server.uri(), 10, 1).with_chrome_executable("/nonexistent/linkscout-chrome"),
    )
    .unwrap();

    let status = handle.wait().await.unwrap();
    assert!(status.selenium_available);
    assert_eq!(status.pages_visited, 2);
    assert_eq!(status.total_anchors, 4);

    let summary = handle.summary(5).await.unwrap();
    assert_eq!(summary.plain_anchors, 4);
    assert_eq!(summary.rendered_anchors, 0);
}
