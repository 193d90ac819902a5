//! Anchor discovery and anchor text extraction.

use crate::classify::classify;
use crate::error::{Result, ScanError};
use crate::fetch::Fetcher;
use crate::normalize::{is_followable_href, is_internal, resolve_href, without_fragment};
use crate::redirect::RedirectResolver;
use crate::result::{AnchorRecord, ExtractionMethod};
use chrono::Utc;
use scraper::{ElementRef, Html, Selector};
use std::collections::BTreeMap;
use tracing::debug;
use url::Url;

/// A hyperlink as it appears in the markup, before any URL work.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLink {
    pub href: String,
    pub text: String,
    /// 1-based position among all `a[href]` elements of the page.
    pub position: usize,
    pub full_tag: String,
    pub attributes: BTreeMap<String, String>,
}

/// Everything one extraction pass produced for one page. Nothing is visible
/// to the job until the capture is committed.
#[derive(Debug, Clone)]
pub struct PageCapture {
    pub page_url: String,
    pub depth: usize,
    pub method: ExtractionMethod,
    pub anchors: Vec<AnchorRecord>,
}

impl PageCapture {
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

fn selector(css: &'static str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScanError::ParseError(format!("{}: {}", css, e)))
}

/// Parses a document and lists its hyperlinks in document order.
///
/// `script` and `style` subtrees are removed first. Links with an empty
/// href or a `javascript:`/`tel:` pseudo-URL are dropped but still count
/// towards the position of later links.
pub fn parse_links(html: &str) -> Result<Vec<ParsedLink>> {
    let mut document = Html::parse_document(html);

    let strip = selector("script, style")?;
    let stripped: Vec<_> = document.select(&strip).map(|el| el.id()).collect();
    for id in stripped {
        if let Some(mut node) = document.tree.get_mut(id) {
            node.detach();
        }
    }

    let link_selector = selector("a[href]")?;
    let img_selector = selector("img")?;
    let mut links = Vec::new();

    for (index, element) in document.select(&link_selector).enumerate() {
        let href = element.value().attr("href").unwrap_or_default().trim();
        if !is_followable_href(href) {
            continue;
        }

        links.push(ParsedLink {
            href: href.to_string(),
            text: anchor_text(&element, href, &img_selector),
            position: index + 1,
            full_tag: element.html(),
            attributes: element
                .value()
                .attrs()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        });
    }

    Ok(links)
}

/// Visible text first, then a contained image's alt text, then the href
/// itself as a readable label.
fn anchor_text(element: &ElementRef<'_>, href: &str, img_selector: &Selector) -> String {
    let text = collapse_whitespace(&element.text().collect::<String>());
    if !text.is_empty() {
        return text;
    }

    if let Some(img) = element.select(img_selector).next() {
        let alt = img.value().attr("alt").unwrap_or_default().trim();
        return if alt.is_empty() {
            "[Image with missing alt text]".to_string()
        } else {
            format!("[Image: {}]", alt)
        };
    }

    if !href.is_empty() {
        return format!("[Naked URL: {}]", naked_url_label(href));
    }

    "[Empty link]".to_string()
}

/// Strips scheme, `www.` and one trailing slash.
pub fn naked_url_label(href: &str) -> String {
    let cleaned = href
        .replace("http://", "")
        .replace("https://", "")
        .replace("www.", "");
    cleaned.strip_suffix('/').unwrap_or(&cleaned).to_string()
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turns a page's markup into anchor records, resolving redirects for
/// internal links.
pub struct AnchorExtractor<'a> {
    pub fetcher: &'a dyn Fetcher,
    pub resolver: &'a mut RedirectResolver,
    pub domain: &'a str,
    pub skip_extensions: &'a [String],
}

impl AnchorExtractor<'_> {
    pub async fn extract(
        &mut self,
        html: &str,
        page_url: &str,
        depth: usize,
        method: ExtractionMethod,
    ) -> Result<PageCapture> {
        let base = Url::parse(page_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page_url, e)))?;
        let links = parse_links(html)?;
        debug!("{} links on {} ({})", links.len(), page_url, method);

        let mut anchors = Vec::with_capacity(links.len());
        for link in links {
            let resolved = resolve_href(&base, &link.href);
            let absolute_url = resolved
                .as_ref()
                .map(|u| u.to_string())
                .unwrap_or_else(|| link.href.clone());

            let target = resolved.as_ref().map(without_fragment);
            let internal = target
                .as_ref()
                .is_some_and(|u| is_internal(u, self.domain, self.skip_extensions));

            let redirect_info = match target {
                Some(target) if internal => {
                    Some(self.resolver.resolve(self.fetcher, target.as_str()).await)
                }
                _ => None,
            };

            anchors.push(AnchorRecord {
                id: 0,
                page_url: page_url.to_string(),
                page_depth: depth,
                original_href: link.href,
                absolute_url,
                text_type: classify(&link.text),
                anchor_text: link.text,
                is_internal: internal,
                redirect_info,
                extraction_method: method,
                anchor_index_on_page: link.position,
                full_tag: link.full_tag,
                attributes: link.attributes,
                timestamp: Utc::now(),
            });
        }

        Ok(PageCapture {
            page_url: page_url.to_string(),
            depth,
            method,
            anchors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_text_is_trimmed_and_collapsed() {
        let links = parse_links(r#"<a href="/x">  Click
            <b>here</b> </a>"#)
        .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].text, "Click here");
        assert_eq!(links[0].href, "/x");
    }

    #[test]
    fn test_image_alt_fallbacks() {
        let links = parse_links(
            r#"<a href="/a"><img src="logo.png" alt=" Logo "></a>
               <a href="/b"><img src="x.png"></a>"#,
        )
        .unwrap();
        assert_eq!(links[0].text, "[Image: Logo]");
        assert_eq!(links[1].text, "[Image with missing alt text]");
    }

    #[test]
    fn test_naked_url_label() {
        let links = parse_links(r#"<a href="https://www.example.com/about/"></a>"#).unwrap();
        assert_eq!(links[0].text, "[Naked URL: example.com/about]");
        assert_eq!(naked_url_label("http://example.com"), "example.com");
    }

    #[test]
    fn test_pseudo_urls_are_skipped_but_keep_positions() {
        let links = parse_links(
            r#"<a href="javascript:void(0)">JS</a>
               <a href="tel:123">Call</a>
               <a href="">Nothing</a>
               <a href="/real">Real</a>"#,
        )
        .unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].position, 4);
    }

    #[test]
    fn test_script_and_style_are_removed() {
        let links = parse_links(
            r#"<html><head><style>a { color: red }</style></head><body>
               <a href="/x">Pricing<script>var x = "noise";</script></a>
               </body></html>"#,
        )
        .unwrap();
        assert_eq!(links[0].text, "Pricing");
    }

    #[test]
    fn test_raw_tag_and_attributes() {
        let links =
            parse_links(r#"<a href="/x" class="nav" rel="nofollow">Docs</a>"#).unwrap();
        assert!(links[0].full_tag.starts_with("<a"));
        assert!(links[0].full_tag.contains("Docs"));
        assert_eq!(links[0].attributes.get("class").map(String::as_str), Some("nav"));
        assert_eq!(links[0].attributes.get("rel").map(String::as_str), Some("nofollow"));
        assert_eq!(links[0].attributes.len(), 3);
    }
}
