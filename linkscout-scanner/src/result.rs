use crate::classify::TextType;
use crate::redirect::{HopStatus, RedirectInfo};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    Plain,
    Rendered,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Plain => "plain",
            ExtractionMethod::Rendered => "rendered",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One hyperlink found on one page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub id: usize,
    pub page_url: String,
    pub page_depth: usize,
    pub original_href: String,
    pub absolute_url: String,
    pub anchor_text: String,
    pub text_type: TextType,
    pub is_internal: bool,
    pub redirect_info: Option<RedirectInfo>,
    pub extraction_method: ExtractionMethod,
    /// 1-based position among the page's `a[href]` elements.
    pub anchor_index_on_page: usize,
    pub full_tag: String,
    pub attributes: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl AnchorRecord {
    /// Key used by the aggregation index: the redirect target when one was
    /// resolved, the link itself otherwise.
    pub fn target_url(&self) -> &str {
        self.redirect_info
            .as_ref()
            .map(|info| info.final_url.as_str())
            .unwrap_or(&self.absolute_url)
    }
}

/// A link whose target answered with at least one redirect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectLinkRecord {
    pub page_containing_link: String,
    pub link_text: String,
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub redirect_chain: Vec<String>,
    pub status_codes: Vec<HopStatus>,
    pub full_tag: String,
    pub page_depth: usize,
    pub timestamp: DateTime<Utc>,
}

impl RedirectLinkRecord {
    pub fn from_anchor(anchor: &AnchorRecord, info: &RedirectInfo) -> Self {
        Self {
            page_containing_link: anchor.page_url.clone(),
            link_text: anchor.anchor_text.clone(),
            original_url: info.original_url.clone(),
            final_url: info.final_url.clone(),
            redirect_count: info.hop_count,
            redirect_chain: info.redirect_chain.clone(),
            status_codes: info.status_codes.clone(),
            full_tag: anchor.full_tag.clone(),
            page_depth: anchor.page_depth,
            timestamp: anchor.timestamp,
        }
    }
}

/// What happened to one dispatched page. Every variant counts as processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PageOutcome {
    Plain { anchors: usize },
    Rendered { anchors: usize, reason: String },
    Skipped { reason: String },
    Failed { error: String },
}

impl PageOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PageOutcome::Plain { .. } | PageOutcome::Rendered { .. })
    }
}

impl fmt::Display for PageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageOutcome::Plain { anchors } => write!(f, "Plain: found {} anchors", anchors),
            PageOutcome::Rendered { anchors, reason } => {
                write!(f, "Rendered ({}): found {} anchors", reason, anchors)
            }
            PageOutcome::Skipped { reason } => write!(f, "Skipped: {}", reason),
            PageOutcome::Failed { error } => write!(f, "Error: {}", error),
        }
    }
}
