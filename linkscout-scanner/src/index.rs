//! Per-destination aggregation of anchor texts.

use crate::classify::{TextType, classify};
use crate::result::{AnchorRecord, RedirectLinkRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Most source pages listed per anchor text in a single-URL report.
pub const REPORT_SOURCE_PAGE_LIMIT: usize = 5;

/// One anchor text seen pointing at a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorOccurrence {
    pub text: String,
    pub text_type: TextType,
    pub source_page: String,
    pub is_redirect: bool,
}

impl AnchorOccurrence {
    pub fn from_anchor(anchor: &AnchorRecord) -> Self {
        Self {
            text: anchor.anchor_text.clone(),
            text_type: anchor.text_type,
            source_page: anchor.page_url.clone(),
            is_redirect: anchor
                .redirect_info
                .as_ref()
                .is_some_and(|info| info.is_redirect()),
        }
    }

    pub fn from_redirect(record: &RedirectLinkRecord) -> Self {
        Self {
            text: record.link_text.clone(),
            text_type: classify(&record.link_text),
            source_page: record.page_containing_link.clone(),
            is_redirect: true,
        }
    }
}

/// Destination URL to the anchor texts used for it, in discovery order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AnchorIndex {
    by_target: BTreeMap<String, Vec<AnchorOccurrence>>,
}

impl AnchorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, target_url: &str, occurrence: AnchorOccurrence) {
        self.by_target
            .entry(target_url.to_string())
            .or_default()
            .push(occurrence);
    }

    /// Drops every occurrence whose source is `page_url`. Buckets left empty
    /// are removed.
    pub fn purge_source(&mut self, page_url: &str) -> usize {
        let mut removed = 0;
        self.by_target.retain(|_, occurrences| {
            let before = occurrences.len();
            occurrences.retain(|o| o.source_page != page_url);
            removed += before - occurrences.len();
            !occurrences.is_empty()
        });
        removed
    }

    pub fn get(&self, target_url: &str) -> Option<&[AnchorOccurrence]> {
        self.by_target.get(target_url).map(Vec::as_slice)
    }

    /// Destinations in sorted order.
    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.by_target.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[AnchorOccurrence])> {
        self.by_target
            .iter()
            .map(|(url, occurrences)| (url.as_str(), occurrences.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.by_target.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    pub fn occurrence_count(&self) -> usize {
        self.by_target.values().map(Vec::len).sum()
    }
}

/// Statistics for one distinct anchor text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextBreakdown {
    pub anchor_text: String,
    pub count: usize,
    pub text_type: TextType,
    pub source_pages_count: usize,
    /// Distinct source pages in first-seen order, possibly truncated.
    pub source_pages: Vec<String>,
    pub has_redirects: bool,
}

/// Answer to "which texts link to this URL".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateReport {
    pub target_url: String,
    pub total_links_found: usize,
    pub unique_anchor_texts: usize,
    pub anchor_text_breakdown: Vec<TextBreakdown>,
}

/// Folds occurrences into per-text statistics, most frequent first. Ties
/// keep the order in which the texts were first seen. At most
/// `page_limit` source pages are kept per text.
pub fn summarize<'a>(
    occurrences: impl IntoIterator<Item = &'a AnchorOccurrence>,
    page_limit: usize,
) -> Vec<TextBreakdown> {
    let mut order: Vec<TextBreakdown> = Vec::new();
    let mut slots: HashMap<&str, usize> = HashMap::new();
    let mut pages: Vec<HashSet<&str>> = Vec::new();

    for occurrence in occurrences {
        let slot = *slots.entry(occurrence.text.as_str()).or_insert_with(|| {
            order.push(TextBreakdown {
                anchor_text: occurrence.text.clone(),
                count: 0,
                text_type: occurrence.text_type,
                source_pages_count: 0,
                source_pages: Vec::new(),
                has_redirects: false,
            });
            pages.push(HashSet::new());
            order.len() - 1
        });

        let entry = &mut order[slot];
        entry.count += 1;
        entry.text_type = occurrence.text_type;
        entry.has_redirects |= occurrence.is_redirect;
        if pages[slot].insert(occurrence.source_page.as_str()) {
            entry.source_pages_count += 1;
            if entry.source_pages.len() < page_limit {
                entry.source_pages.push(occurrence.source_page.clone());
            }
        }
    }

    // sort_by is stable, so ties stay in first-seen order.
    order.sort_by(|a, b| b.count.cmp(&a.count));
    order
}

/// Builds the report for `target_url` (already normalized).
///
/// Besides the index bucket, every redirect record landing on the target is
/// counted as an extra occurrence attributed via redirect.
pub fn report_for_url(
    index: &AnchorIndex,
    redirects: &[RedirectLinkRecord],
    target_url: &str,
) -> Option<AggregateReport> {
    let mut matching: Vec<AnchorOccurrence> =
        index.get(target_url).map(<[_]>::to_vec).unwrap_or_default();
    matching.extend(
        redirects
            .iter()
            .filter(|r| r.final_url == target_url)
            .map(AnchorOccurrence::from_redirect),
    );

    if matching.is_empty() {
        return None;
    }

    let breakdown = summarize(&matching, REPORT_SOURCE_PAGE_LIMIT);
    Some(AggregateReport {
        target_url: target_url.to_string(),
        total_links_found: matching.len(),
        unique_anchor_texts: breakdown.len(),
        anchor_text_breakdown: breakdown,
    })
}
