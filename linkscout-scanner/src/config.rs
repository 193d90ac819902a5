use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Path suffixes that never point at an HTML page.
pub const DEFAULT_SKIP_EXTENSIONS: &[&str] = &[
    ".jpg", ".jpeg", ".png", ".gif", ".pdf", ".zip", ".css", ".js", ".ico", ".svg", ".woff",
    ".woff2",
];

/// Body substrings that suggest a client-side rendered application.
pub const DEFAULT_SPA_MARKERS: &[&str] = &["react", "angular", "vue.js", "data-reactroot", "ng-app"];

/// Statuses the plain fetch retries before giving up on a page.
pub const RETRY_STATUSES: &[u16] = &[429, 500, 502, 503, 504];

/// Settings for one analysis run.
///
/// Every field has a default, so a JSON config file only needs to name the
/// values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    pub max_pages: usize,
    pub max_depth: usize,
    /// Plain extractions yielding fewer anchors than this trigger the
    /// rendering fallback.
    pub selenium_threshold: usize,
    pub page_timeout_ms: u64,
    pub redirect_timeout_ms: u64,
    pub render_timeout_ms: u64,
    /// How long the renderer waits for a `<body>` element to appear.
    pub render_ready_timeout_ms: u64,
    /// Extra wait after the body is present, for client-side rendering.
    pub settle_delay_ms: u64,
    /// Pause between two page dispatches.
    pub page_delay_ms: u64,
    pub max_redirects: usize,
    pub retries: u32,
    pub retry_backoff_ms: u64,
    pub user_agent: String,
    pub skip_extensions: Vec<String>,
    pub spa_markers: Vec<String>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_pages: 100,
            max_depth: 3,
            selenium_threshold: 5,
            page_timeout_ms: 15_000,
            redirect_timeout_ms: 10_000,
            render_timeout_ms: 30_000,
            render_ready_timeout_ms: 10_000,
            settle_delay_ms: 3_000,
            page_delay_ms: 1_000,
            max_redirects: 10,
            retries: 3,
            retry_backoff_ms: 1_000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            skip_extensions: DEFAULT_SKIP_EXTENSIONS.iter().map(|s| s.to_string()).collect(),
            spa_markers: DEFAULT_SPA_MARKERS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl CrawlConfig {
    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_selenium_threshold(mut self, threshold: usize) -> Self {
        self.selenium_threshold = threshold;
        self
    }

    /// Zeroes every pacing delay. Used by tests and by callers that do
    /// their own rate limiting.
    pub fn without_delays(mut self) -> Self {
        self.page_delay_ms = 0;
        self.settle_delay_ms = 0;
        self.retry_backoff_ms = 0;
        self
    }

    pub fn page_timeout(&self) -> Duration {
        Duration::from_millis(self.page_timeout_ms)
    }

    pub fn redirect_timeout(&self) -> Duration {
        Duration::from_millis(self.redirect_timeout_ms)
    }

    pub fn render_timeout(&self) -> Duration {
        Duration::from_millis(self.render_timeout_ms)
    }

    pub fn render_ready_timeout(&self) -> Duration {
        Duration::from_millis(self.render_ready_timeout_ms)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_fixed_policy() {
        let config = CrawlConfig::default();
        assert_eq!(config.max_pages, 100);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.selenium_threshold, 5);
        assert_eq!(config.page_timeout(), Duration::from_secs(15));
        assert_eq!(config.redirect_timeout(), Duration::from_secs(10));
        assert_eq!(config.render_timeout(), Duration::from_secs(30));
        assert_eq!(config.skip_extensions.len(), 12);
        assert!(config.spa_markers.contains(&"ng-app".to_string()));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config: CrawlConfig =
            serde_json::from_str(r#"{"max_pages": 7, "spa_markers": ["svelte"]}"#).unwrap();
        assert_eq!(config.max_pages, 7);
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.spa_markers, vec!["svelte".to_string()]);
        assert_eq!(config.skip_extensions.len(), 12);
    }

    #[test]
    fn test_without_delays() {
        let config = CrawlConfig::default().without_delays();
        assert_eq!(config.page_delay(), Duration::ZERO);
        assert_eq!(config.settle_delay(), Duration::ZERO);
        assert_eq!(config.retry_backoff(), Duration::ZERO);
        assert_eq!(config.page_timeout(), Duration::from_secs(15));
    }
}
