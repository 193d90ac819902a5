//! Per-page choice between a plain HTTP fetch and the rendering fallback.
//!
//! Every page starts in plain mode. After the plain extraction the page may
//! move to rendered mode, which is final for that page.

use crate::error::{Result, ScanError};
use crate::extract::{AnchorExtractor, PageCapture};
use crate::fetch::Fetcher;
use crate::job::CrawlJob;
use crate::redirect::RedirectResolver;
use crate::render::PageRenderer;
use crate::result::{ExtractionMethod, PageOutcome};
use tracing::{debug, info, warn};

/// Why a page should be re-fetched through the renderer, if it should.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackDecision {
    StayPlain(&'static str),
    Render(String),
}

impl FallbackDecision {
    pub fn should_render(&self) -> bool {
        matches!(self, FallbackDecision::Render(_))
    }
}

/// Rendering is worth it when a renderer is available and the plain pass
/// found too few anchors or the body looks like a client-side app.
pub fn decide_fallback(
    renderer_available: bool,
    plain_anchor_count: usize,
    threshold: usize,
    body: &str,
    spa_markers: &[String],
) -> FallbackDecision {
    if !renderer_available {
        return FallbackDecision::StayPlain("renderer not available");
    }
    if plain_anchor_count < threshold {
        return FallbackDecision::Render(format!("low link count ({})", plain_anchor_count));
    }
    let lowered = body.to_lowercase();
    if let Some(marker) = spa_markers
        .iter()
        .find(|m| lowered.contains(&m.to_lowercase()))
    {
        return FallbackDecision::Render(format!("SPA indicator found ({})", marker));
    }
    FallbackDecision::StayPlain("standard parsing sufficient")
}

/// The collaborators a page dispatch needs.
pub struct PageContext<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub renderer: Option<&'a dyn PageRenderer>,
    pub resolver: &'a mut RedirectResolver,
}

impl PageContext<'_> {
    fn renderer_available(&self) -> bool {
        self.renderer.is_some_and(|r| r.is_available())
    }

    async fn extract(
        &mut self,
        job: &CrawlJob,
        html: &str,
        url: &str,
        depth: usize,
        method: ExtractionMethod,
    ) -> Result<PageCapture> {
        AnchorExtractor {
            fetcher: self.fetcher,
            resolver: &mut *self.resolver,
            domain: &job.domain,
            skip_extensions: &job.config.skip_extensions,
        }
        .extract(html, url, depth, method)
        .await
    }

    /// Fetches, extracts and commits one page. Failures are folded into the
    /// returned outcome and never abort the job.
    pub async fn process_page(&mut self, job: &mut CrawlJob, url: &str, depth: usize) -> PageOutcome {
        let response = match self.fetcher.get(url, job.config.page_timeout()).await {
            Ok(response) => response,
            Err(e) => {
                return PageOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        if !(200..300).contains(&response.status) {
            return PageOutcome::Failed {
                error: ScanError::HttpStatus {
                    url: url.to_string(),
                    status: response.status,
                }
                .to_string(),
            };
        }

        let content_type = response.content_type().unwrap_or_default().to_lowercase();
        if !content_type.contains("text/html") {
            return PageOutcome::Skipped {
                reason: format!("Non-HTML content: {}", content_type),
            };
        }

        let plain = match self
            .extract(job, &response.body, url, depth, ExtractionMethod::Plain)
            .await
        {
            Ok(capture) => capture,
            Err(e) => {
                return PageOutcome::Failed {
                    error: e.to_string(),
                };
            }
        };

        let decision = decide_fallback(
            self.renderer_available(),
            plain.len(),
            job.config.selenium_threshold,
            &response.body,
            &job.config.spa_markers,
        );

        let reason = match decision {
            FallbackDecision::Render(reason) => reason,
            FallbackDecision::StayPlain(why) => {
                debug!("Staying plain for {}: {}", url, why);
                let anchors = job.supersede_page(plain);
                return PageOutcome::Plain { anchors };
            }
        };

        info!("Using renderer for {}: {}", url, reason);
        match self.render_capture(job, url, depth).await {
            Ok(rendered) => {
                let anchors = job.supersede_page(rendered);
                PageOutcome::Rendered { anchors, reason }
            }
            Err(e) => {
                warn!("Rendering failed for {}, keeping plain capture: {}", url, e);
                let anchors = job.supersede_page(plain);
                PageOutcome::Plain { anchors }
            }
        }
    }

    async fn render_capture(
        &mut self,
        job: &CrawlJob,
        url: &str,
        depth: usize,
    ) -> Result<PageCapture> {
        let renderer = self
            .renderer
            .ok_or_else(|| ScanError::Render("no renderer configured".to_string()))?;
        let html = tokio::time::timeout(
            job.config.render_timeout() + job.config.render_ready_timeout() + job.config.settle_delay(),
            renderer.render(url),
        )
        .await
        .map_err(|_| ScanError::Render(format!("render timed out for {}", url)))??;

        self.extract(job, &html, url, depth, ExtractionMethod::Rendered)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CrawlConfig;

    fn markers() -> Vec<String> {
        CrawlConfig::default().spa_markers
    }

    #[test]
    fn test_no_renderer_never_falls_back() {
        let decision = decide_fallback(false, 0, 5, "<div ng-app>", &markers());
        assert!(!decision.should_render());
    }

    #[test]
    fn test_low_anchor_count_triggers_render() {
        let decision = decide_fallback(true, 2, 5, "<html></html>", &markers());
        assert_eq!(decision, FallbackDecision::Render("low link count (2)".to_string()));
    }

    #[test]
    fn test_spa_marker_triggers_render() {
        let decision = decide_fallback(true, 20, 5, r#"<div id="root" data-reactroot>"#, &markers());
        assert!(decision.should_render());
    }

    #[test]
    fn test_plain_is_enough() {
        let decision = decide_fallback(true, 5, 5, "<html><body>static</body></html>", &markers());
        assert_eq!(
            decision,
            FallbackDecision::StayPlain("standard parsing sufficient")
        );
    }
}
