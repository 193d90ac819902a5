//! Optional JavaScript rendering in headless Chrome, driven over the
//! DevTools protocol by chromiumoxide.

use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Loads `url`, waits for the page to be ready and returns the rendered
    /// markup.
    async fn render(&self, url: &str) -> Result<String>;

    /// False once the renderer knows it cannot work, e.g. no browser could
    /// be started. The crawler then stays in plain mode.
    fn is_available(&self) -> bool {
        true
    }

    /// Releases any browser resources. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

fn browser_error(context: &str, e: impl std::fmt::Display) -> ScanError {
    ScanError::Render(format!("{}: {}", context, e))
}

/// Headless Chrome, launched on the first render and reused until
/// [`PageRenderer::close`].
pub struct HeadlessRenderer {
    chrome_executable: Option<PathBuf>,
    browser: Mutex<Option<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
    unavailable: AtomicBool,
    page_load_timeout: Duration,
    ready_timeout: Duration,
    settle_delay: Duration,
}

impl HeadlessRenderer {
    pub fn new(config: &CrawlConfig) -> Self {
        Self {
            chrome_executable: None,
            browser: Mutex::new(None),
            handler: Mutex::new(None),
            unavailable: AtomicBool::new(false),
            page_load_timeout: config.render_timeout(),
            ready_timeout: config.render_ready_timeout(),
            settle_delay: config.settle_delay(),
        }
    }

    /// Uses this Chrome/Chromium binary instead of searching the usual
    /// install locations.
    pub fn with_chrome_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.chrome_executable = Some(path.into());
        self
    }

    fn browser_config(&self) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .request_timeout(self.page_load_timeout)
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--no-first-run")
            .arg("--disable-extensions")
            .arg("--blink-settings=imagesEnabled=false");
        if let Some(ref path) = self.chrome_executable {
            builder = builder.chrome_executable(path);
        }
        builder
            .build()
            .map_err(|e| browser_error("invalid browser config", e))
    }

    async fn launch(&self) -> Result<Browser> {
        info!("Launching headless Chrome");
        let (browser, mut handler) = Browser::launch(self.browser_config()?)
            .await
            .map_err(|e| browser_error("failed to launch browser", e))?;

        // The CDP connection only makes progress while its handler is polled.
        let handle = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        *self.handler.lock().await = Some(handle);
        Ok(browser)
    }

    async fn snapshot(&self, page: &Page, url: &str) -> Result<String> {
        timeout(self.ready_timeout, page.find_element("body"))
            .await
            .map_err(|_| ScanError::Render(format!("timed out waiting for <body> on {}", url)))?
            .map_err(|e| browser_error("no <body> element", e))?;

        if !self.settle_delay.is_zero() {
            sleep(self.settle_delay).await;
        }

        let html = page
            .content()
            .await
            .map_err(|e| browser_error("failed to read page content", e))?;
        if html.is_empty() {
            return Err(ScanError::Render(format!("empty rendered snapshot for {}", url)));
        }
        Ok(html)
    }
}

#[async_trait]
impl PageRenderer for HeadlessRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        let mut guard = self.browser.lock().await;
        if guard.is_none() {
            match self.launch().await {
                Ok(browser) => *guard = Some(browser),
                Err(e) => {
                    warn!("Headless browser unavailable, continuing without rendering: {}", e);
                    self.unavailable.store(true, Ordering::Relaxed);
                    return Err(e);
                }
            }
        }
        let browser = guard
            .as_ref()
            .ok_or_else(|| ScanError::Render("browser not running".to_string()))?;

        debug!("Rendering {} in headless Chrome", url);
        let page = timeout(self.page_load_timeout, async {
            let page = browser.new_page(url).await?;
            page.wait_for_navigation().await?;
            Ok::<_, chromiumoxide::error::CdpError>(page)
        })
        .await
        .map_err(|_| ScanError::Render(format!("page load timed out for {}", url)))?
        .map_err(|e| browser_error("navigation failed", e))?;

        let snapshot = self.snapshot(&page, url).await;
        if let Err(e) = page.close().await {
            warn!("Failed to close tab for {}: {}", url, e);
        }
        snapshot
    }

    fn is_available(&self) -> bool {
        !self.unavailable.load(Ordering::Relaxed)
    }

    async fn close(&self) -> Result<()> {
        let closed = match self.browser.lock().await.take() {
            Some(mut browser) => {
                debug!("Closing headless browser");
                browser
                    .close()
                    .await
                    .map(|_| ())
                    .map_err(|e| browser_error("failed to close browser", e))
            }
            None => Ok(()),
        };

        if let Some(handle) = self.handler.lock().await.take() {
            handle.abort();
        }
        closed
    }
}
