use crate::config::CrawlConfig;
use crate::error::Result;
use crate::extract::PageCapture;
use crate::index::{AggregateReport, AnchorIndex, AnchorOccurrence, report_for_url};
use crate::normalize::{domain_of, is_internal, normalize, normalize_str};
use crate::result::{AnchorRecord, RedirectLinkRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use url::Url;

/// A URL waiting to be fetched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontierEntry {
    pub url: String,
    pub depth: usize,
}

/// Counters exposed while a job runs and after it finishes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlProgress {
    pub complete: bool,
    pub pages_visited: usize,
    pub total_anchors: usize,
    pub redirect_count: usize,
    pub distinct_target_urls: usize,
}

/// All state of one analysis run.
///
/// Owned by the scheduler while the crawl is running. No part of it is
/// shared with other tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlJob {
    pub seed_url: String,
    pub domain: String,
    pub config: CrawlConfig,
    pub visited: HashSet<String>,
    pub frontier: VecDeque<FrontierEntry>,
    /// Every URL ever placed in the frontier, the seed included.
    pub enqueued: HashSet<String>,
    pub pages_crawled: usize,
    pub complete: bool,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub anchors: Vec<AnchorRecord>,
    pub redirects: Vec<RedirectLinkRecord>,
    pub index: AnchorIndex,
    next_anchor_id: usize,
}

impl CrawlJob {
    /// Fails on an empty or unparseable seed, before any crawl work.
    pub fn new(seed_url: &str, config: CrawlConfig) -> Result<Self> {
        let seed = normalize(seed_url)?;
        let seed_url = seed.to_string();
        let domain = domain_of(&seed);

        let mut job = Self {
            seed_url: seed_url.clone(),
            domain,
            config,
            visited: HashSet::new(),
            frontier: VecDeque::new(),
            enqueued: HashSet::new(),
            pages_crawled: 0,
            complete: false,
            started_at: None,
            finished_at: None,
            anchors: Vec::new(),
            redirects: Vec::new(),
            index: AnchorIndex::new(),
            next_anchor_id: 1,
        };
        job.enqueued.insert(seed_url.clone());
        job.frontier.push_back(FrontierEntry {
            url: seed_url,
            depth: 0,
        });
        Ok(job)
    }

    /// Queues `url` unless it was visited or queued before, lies beyond the
    /// depth limit, or the job already queued `max_pages` distinct URLs.
    pub fn enqueue(&mut self, url: &str, depth: usize) -> bool {
        if depth > self.config.max_depth
            || self.visited.contains(url)
            || self.enqueued.contains(url)
            || self.enqueued.len() >= self.config.max_pages
            || self.frontier.len() >= self.config.max_pages
        {
            return false;
        }
        self.enqueued.insert(url.to_string());
        self.frontier.push_back(FrontierEntry {
            url: url.to_string(),
            depth,
        });
        true
    }

    /// Removes every artifact that came from `page_url`.
    pub fn purge_page(&mut self, page_url: &str) {
        self.anchors.retain(|a| a.page_url != page_url);
        self.redirects.retain(|r| r.page_containing_link != page_url);
        self.index.purge_source(page_url);
    }

    /// Replaces whatever is recorded for the capture's page with the
    /// capture. Purge and insert happen together, so readers only ever see
    /// one capture per page.
    ///
    /// Internal targets found on the page are queued one level deeper.
    pub fn supersede_page(&mut self, capture: PageCapture) -> usize {
        let PageCapture {
            page_url,
            depth,
            anchors,
            ..
        } = capture;

        self.purge_page(&page_url);

        let count = anchors.len();
        for mut anchor in anchors {
            anchor.id = self.next_anchor_id;
            self.next_anchor_id += 1;

            if let Some(info) = anchor.redirect_info.as_ref().filter(|i| i.is_redirect()) {
                self.redirects
                    .push(RedirectLinkRecord::from_anchor(&anchor, info));
            }

            if anchor.is_internal {
                let target = anchor.target_url().to_string();
                self.index
                    .insert(&target, AnchorOccurrence::from_anchor(&anchor));
                if depth < self.config.max_depth && self.stays_on_site(&target) {
                    self.enqueue(&target, depth + 1);
                }
            }

            self.anchors.push(anchor);
        }
        count
    }

    /// A redirect may end on another host. Only on-site targets are queued.
    fn stays_on_site(&self, url: &str) -> bool {
        Url::parse(url).is_ok_and(|u| is_internal(&u, &self.domain, &self.config.skip_extensions))
    }

    pub fn progress(&self) -> CrawlProgress {
        CrawlProgress {
            complete: self.complete,
            pages_visited: self.visited.len(),
            total_anchors: self.anchors.len(),
            redirect_count: self.redirects.len(),
            distinct_target_urls: self.index.len(),
        }
    }

    /// Report for one destination. `None` when nothing links to it or the
    /// URL cannot be normalized.
    pub fn report_for_url(&self, target_url: &str) -> Option<AggregateReport> {
        let target = normalize_str(target_url).ok()?;
        report_for_url(&self.index, &self.redirects, &target)
    }

    /// Every destination with at least one anchor, sorted.
    pub fn all_target_urls(&self) -> Vec<String> {
        self.index.targets().map(str::to_string).collect()
    }
}
