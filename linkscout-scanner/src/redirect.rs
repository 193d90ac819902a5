//! Redirect-chain resolution for internal links.

use crate::fetch::Fetcher;
use crate::normalize::normalize_str;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::Duration;
use tracing::debug;

/// Status of one hop. `Error` stands in when the request itself failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HopStatus {
    Code(u16),
    Error(ErrorSentinel),
}

/// Serializes as the literal string `"ERROR"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSentinel {
    #[serde(rename = "ERROR")]
    Error,
}

impl HopStatus {
    pub const ERROR: HopStatus = HopStatus::Error(ErrorSentinel::Error);

    pub fn is_error(&self) -> bool {
        matches!(self, HopStatus::Error(_))
    }
}

impl fmt::Display for HopStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HopStatus::Code(code) => write!(f, "{}", code),
            HopStatus::Error(_) => f.write_str("ERROR"),
        }
    }
}

/// Where a URL ends up.
///
/// `status_codes` and `redirect_chain` always hold `hop_count + 1`
/// entries, and a zero-hop result points back at the original URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RedirectInfo {
    pub original_url: String,
    pub final_url: String,
    pub hop_count: usize,
    pub status_codes: Vec<HopStatus>,
    pub redirect_chain: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RedirectInfo {
    pub fn is_redirect(&self) -> bool {
        self.hop_count > 0
    }

    /// The recovered result for a URL that could not be resolved.
    pub fn failed(url: &str, error: impl Into<String>) -> Self {
        Self {
            original_url: url.to_string(),
            final_url: url.to_string(),
            hop_count: 0,
            status_codes: vec![HopStatus::ERROR],
            redirect_chain: vec![url.to_string()],
            error: Some(error.into()),
        }
    }
}

/// Resolves redirect chains with a metadata-only request and remembers the
/// answer for the rest of the job.
pub struct RedirectResolver {
    timeout: Duration,
    cache: HashMap<String, RedirectInfo>,
}

impl RedirectResolver {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cache: HashMap::new(),
        }
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }

    /// Never fails: network errors, timeouts and loops come back as a
    /// zero-hop result carrying the error sentinel.
    pub async fn resolve(&mut self, fetcher: &dyn Fetcher, url: &str) -> RedirectInfo {
        if let Some(info) = self.cache.get(url) {
            return info.clone();
        }

        let info = match fetcher.head(url, self.timeout, true).await {
            Ok(response) if response.history.is_empty() => RedirectInfo {
                original_url: url.to_string(),
                final_url: url.to_string(),
                hop_count: 0,
                status_codes: vec![HopStatus::Code(response.status)],
                redirect_chain: vec![url.to_string()],
                error: None,
            },
            Ok(response) => {
                let final_url =
                    normalize_str(&response.final_url).unwrap_or(response.final_url.clone());
                let mut status_codes: Vec<HopStatus> = response
                    .history
                    .iter()
                    .map(|hop| HopStatus::Code(hop.status))
                    .collect();
                status_codes.push(HopStatus::Code(response.status));
                let mut redirect_chain: Vec<String> =
                    response.history.iter().map(|hop| hop.url.clone()).collect();
                redirect_chain.push(final_url.clone());

                debug!(
                    "{} redirects to {} in {} hop(s)",
                    url,
                    final_url,
                    response.history.len()
                );
                RedirectInfo {
                    original_url: url.to_string(),
                    final_url,
                    hop_count: response.history.len(),
                    status_codes,
                    redirect_chain,
                    error: None,
                }
            }
            Err(e) => {
                debug!("Redirect check failed for {}: {}", url, e);
                RedirectInfo::failed(url, e.to_string())
            }
        };

        self.cache.insert(url.to_string(), info.clone());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_info_is_consistent() {
        let info = RedirectInfo::failed("https://example.com/x", "timeout");
        assert_eq!(info.hop_count, 0);
        assert_eq!(info.original_url, info.final_url);
        assert_eq!(info.status_codes, vec![HopStatus::ERROR]);
        assert_eq!(info.redirect_chain.len(), info.hop_count + 1);
        assert!(!info.is_redirect());
    }

    #[test]
    fn test_hop_status_display_and_json() {
        assert_eq!(HopStatus::Code(301).to_string(), "301");
        assert_eq!(HopStatus::ERROR.to_string(), "ERROR");

        let json = serde_json::to_string(&vec![HopStatus::Code(301), HopStatus::ERROR]).unwrap();
        assert_eq!(json, r#"[301,"ERROR"]"#);

        let back: Vec<HopStatus> = serde_json::from_str(&json).unwrap();
        assert!(back[1].is_error());
    }
}
