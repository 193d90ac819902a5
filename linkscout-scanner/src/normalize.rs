//! URL canonicalization and the internal-link test.

use crate::error::{Result, ScanError};
use url::Url;

/// Canonicalizes a seed or link URL.
///
/// A missing scheme becomes `https://` and the fragment is dropped. The
/// result always re-normalizes to itself.
pub fn normalize(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ScanError::InvalidUrl("empty URL".to_string()));
    }

    let lowered = trimmed.to_ascii_lowercase();
    let with_scheme = if lowered.starts_with("http://") || lowered.starts_with("https://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let mut url = Url::parse(&with_scheme)
        .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", trimmed, e)))?;
    if url.host_str().is_none() {
        return Err(ScanError::InvalidUrl(format!("{}: missing host", trimmed)));
    }
    url.set_fragment(None);
    Ok(url)
}

/// Same as [`normalize`], returned in string form.
pub fn normalize_str(raw: &str) -> Result<String> {
    normalize(raw).map(String::from)
}

/// Host plus explicit port, the way a browser's address bar shows it.
pub fn domain_of(url: &Url) -> String {
    match (url.host_str(), url.port()) {
        (Some(host), Some(port)) => format!("{}:{}", host, port),
        (Some(host), None) => host.to_string(),
        _ => String::new(),
    }
}

/// True for hrefs the extractor should look at.
pub fn is_followable_href(href: &str) -> bool {
    let href = href.trim();
    !href.is_empty() && !href.starts_with("javascript:") && !href.starts_with("tel:")
}

/// Resolves an href against the page it was found on.
pub fn resolve_href(base: &Url, href: &str) -> Option<Url> {
    base.join(href.trim()).ok()
}

pub fn without_fragment(url: &Url) -> Url {
    let mut url = url.clone();
    url.set_fragment(None);
    url
}

/// A URL is internal when it lives on `domain` and does not end with one of
/// the non-HTML extensions. No request is made.
pub fn is_internal(url: &Url, domain: &str, skip_extensions: &[String]) -> bool {
    if domain_of(url) != domain {
        return false;
    }
    let path = url.path().to_ascii_lowercase();
    !skip_extensions
        .iter()
        .any(|ext| path.ends_with(&ext.to_ascii_lowercase()))
}
