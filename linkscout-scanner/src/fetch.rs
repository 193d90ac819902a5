//! The HTTP collaborator: a pluggable fetch client plus the reqwest-backed
//! implementation used by the crawler.

use crate::config::{CrawlConfig, RETRY_STATUSES};
use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, redirect::Policy};
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// Upper bound for a single wait between GET retries.
pub const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// `base` doubled per attempt, capped at [`MAX_RETRY_BACKOFF`].
pub fn retry_delay(base: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    2u32.checked_pow(attempt)
        .and_then(|factor| base.checked_mul(factor))
        .map_or(MAX_RETRY_BACKOFF, |delay| delay.min(MAX_RETRY_BACKOFF))
}

/// Response of a full GET.
#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    /// URL after the client followed any redirects.
    pub final_url: String,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// One response observed while following a redirect chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedirectHop {
    pub url: String,
    pub status: u16,
}

/// Response of a metadata-only request.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    /// Every redirecting response before the terminal one.
    pub history: Vec<RedirectHop>,
    pub final_url: String,
    pub status: u16,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// GET with redirects followed and transient failures retried.
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse>;

    /// HEAD, optionally following redirects while recording every hop.
    async fn head(&self, url: &str, timeout: Duration, follow_redirects: bool)
    -> Result<HeadResponse>;
}

pub struct HttpFetcher {
    /// Follows redirects on its own, used for page fetches.
    client: Client,
    /// Never follows redirects, so each hop can be observed.
    probe_client: Client,
    max_redirects: usize,
    retries: u32,
    retry_backoff: Duration,
}

impl HttpFetcher {
    pub fn new(config: &CrawlConfig) -> Result<Self> {
        let mut default_headers = HeaderMap::new();
        default_headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
        );
        default_headers.insert(
            header::ACCEPT_LANGUAGE,
            HeaderValue::from_static("en-US,en;q=0.5"),
        );

        let client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers.clone())
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(Policy::limited(config.max_redirects))
            .build()?;

        let probe_client = Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(default_headers)
            .redirect(Policy::none())
            .build()?;

        Ok(Self {
            client,
            probe_client,
            max_redirects: config.max_redirects,
            retries: config.retries,
            retry_backoff: config.retry_backoff(),
        })
    }

    async fn get_once(&self, url: &str, timeout: Duration) -> Result<reqwest::Response> {
        Ok(self.client.get(url).timeout(timeout).send().await?)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, url: &str, timeout: Duration) -> Result<FetchResponse> {
        let mut attempt = 0;
        let response = loop {
            let response = self.get_once(url, timeout).await?;
            let status = response.status().as_u16();
            if !RETRY_STATUSES.contains(&status) || attempt >= self.retries {
                break response;
            }

            let backoff = retry_delay(self.retry_backoff, attempt);
            warn!(
                "Transient status {} from {}, retrying in {:?} ({}/{})",
                status,
                url,
                backoff,
                attempt + 1,
                self.retries
            );
            tokio::time::sleep(backoff).await;
            attempt += 1;
        };

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(FetchResponse {
            status,
            headers,
            body,
            final_url,
        })
    }

    async fn head(
        &self,
        url: &str,
        timeout: Duration,
        follow_redirects: bool,
    ) -> Result<HeadResponse> {
        let mut history = Vec::new();
        let mut seen = HashSet::new();
        let mut current =
            Url::parse(url).map_err(|e| ScanError::InvalidUrl(format!("{}: {}", url, e)))?;

        loop {
            if !seen.insert(current.to_string()) {
                return Err(ScanError::RedirectLoop(current.to_string()));
            }

            debug!("HEAD {}", current);
            let response = self
                .probe_client
                .head(current.as_str())
                .timeout(timeout)
                .send()
                .await?;
            let status = response.status().as_u16();

            let location = response
                .headers()
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty());

            let next = match location {
                Some(location) if follow_redirects && response.status().is_redirection() => {
                    current.join(&location).map_err(|e| {
                        ScanError::InvalidUrl(format!("bad Location {}: {}", location, e))
                    })?
                }
                _ => {
                    return Ok(HeadResponse {
                        history,
                        final_url: current.to_string(),
                        status,
                    });
                }
            };

            if history.len() >= self.max_redirects {
                return Err(ScanError::TooManyRedirects {
                    url: url.to_string(),
                    limit: self.max_redirects,
                });
            }

            history.push(RedirectHop {
                url: current.to_string(),
                status,
            });
            current = next;
        }
    }
}
