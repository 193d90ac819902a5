// Report generation from a finished analysis

use crate::analysis::AnalysisStatus;
use crate::error::Result;
use chrono::{DateTime, Local};
use linkscout_scanner::index::{AnchorIndex, summarize};
use linkscout_scanner::{AggregateReport, CrawlJob, ExtractionMethod, RedirectLinkRecord, TextType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Longest link text written to the redirect CSV.
pub const LINK_TEXT_LIMIT: usize = 200;
/// Longest raw tag written to the redirect CSV.
pub const FULL_TAG_LIMIT: usize = 300;
/// Source pages listed per row of the anchor text CSV.
pub const CSV_SOURCE_PAGE_LIMIT: usize = 3;

pub const REDIRECT_CSV_HEADERS: [&str; 10] = [
    "Page_URL",
    "Link_Text",
    "Original_URL",
    "Final_URL",
    "Redirect_Count",
    "Status_Codes",
    "Full_Redirect_Chain",
    "Page_Depth",
    "Full_Tag",
    "Timestamp",
];

pub const ANCHOR_TEXT_CSV_HEADERS: [&str; 6] = [
    "URL",
    "Anchor_Text",
    "Count",
    "Text_Type",
    "Source_Pages",
    "Has_Redirects",
];

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// The two downloadable tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsvReport {
    Redirects,
    AnchorText,
}

impl CsvReport {
    fn prefix(&self) -> &'static str {
        match self {
            CsvReport::Redirects => "redirect_links",
            CsvReport::AnchorText => "anchor_text_analysis",
        }
    }
}

/// `redirect_links_example_com_20240131_120000.csv` and friends.
pub fn report_file_name(kind: CsvReport, domain: &str, at: DateTime<Local>) -> String {
    let domain_safe = domain.replace(['.', ':'], "_");
    format!(
        "{}_{}_{}.csv",
        kind.prefix(),
        domain_safe,
        at.format("%Y%m%d_%H%M%S")
    )
}

fn truncate(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectRow {
    pub page_url: String,
    pub link_text: String,
    pub original_url: String,
    pub final_url: String,
    pub redirect_count: usize,
    pub status_codes: String,
    pub full_redirect_chain: String,
    pub page_depth: usize,
    pub full_tag: String,
    pub timestamp: String,
}

impl From<&RedirectLinkRecord> for RedirectRow {
    fn from(record: &RedirectLinkRecord) -> Self {
        Self {
            page_url: record.page_containing_link.clone(),
            link_text: truncate(&record.link_text, LINK_TEXT_LIMIT),
            original_url: record.original_url.clone(),
            final_url: record.final_url.clone(),
            redirect_count: record.redirect_count,
            status_codes: record
                .status_codes
                .iter()
                .map(|s| s.to_string())
                .collect::<Vec<_>>()
                .join(" -> "),
            full_redirect_chain: record.redirect_chain.join(" -> "),
            page_depth: record.page_depth,
            full_tag: truncate(&record.full_tag, FULL_TAG_LIMIT),
            timestamp: record.timestamp.to_rfc3339(),
        }
    }
}

impl RedirectRow {
    fn to_record(&self) -> [String; 10] {
        [
            self.page_url.clone(),
            self.link_text.clone(),
            self.original_url.clone(),
            self.final_url.clone(),
            self.redirect_count.to_string(),
            self.status_codes.clone(),
            self.full_redirect_chain.clone(),
            self.page_depth.to_string(),
            self.full_tag.clone(),
            self.timestamp.clone(),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnchorTextRow {
    pub url: String,
    pub anchor_text: String,
    pub count: usize,
    pub text_type: TextType,
    pub source_pages: String,
    pub has_redirects: bool,
}

impl AnchorTextRow {
    fn to_record(&self) -> [String; 6] {
        [
            self.url.clone(),
            self.anchor_text.clone(),
            self.count.to_string(),
            self.text_type.to_string(),
            self.source_pages.clone(),
            if self.has_redirects { "Yes" } else { "No" }.to_string(),
        ]
    }
}

pub fn redirect_rows(records: &[RedirectLinkRecord]) -> Vec<RedirectRow> {
    records.iter().map(RedirectRow::from).collect()
}

/// One row per (destination, distinct text), most frequent text first within
/// each destination. Destinations come in sorted order.
pub fn anchor_text_rows(index: &AnchorIndex) -> Vec<AnchorTextRow> {
    index
        .iter()
        .flat_map(|(url, occurrences)| {
            summarize(occurrences, CSV_SOURCE_PAGE_LIMIT)
                .into_iter()
                .map(move |text| {
                    let mut source_pages = text.source_pages.join("; ");
                    if text.source_pages_count > CSV_SOURCE_PAGE_LIMIT {
                        source_pages.push_str("...");
                    }
                    AnchorTextRow {
                        url: url.to_string(),
                        anchor_text: text.anchor_text,
                        count: text.count,
                        text_type: text.text_type,
                        source_pages,
                        has_redirects: text.has_redirects,
                    }
                })
        })
        .collect()
}

/// The header row is always written, even for an empty table.
pub fn write_redirect_csv<W: Write>(rows: &[RedirectRow], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(REDIRECT_CSV_HEADERS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_anchor_text_csv<W: Write>(rows: &[AnchorTextRow], writer: W) -> Result<()> {
    let mut writer = csv::Writer::from_writer(writer);
    writer.write_record(ANCHOR_TEXT_CSV_HEADERS)?;
    for row in rows {
        writer.write_record(row.to_record())?;
    }
    writer.flush()?;
    Ok(())
}

pub fn save_redirect_csv(rows: &[RedirectRow], path: &Path) -> Result<()> {
    write_redirect_csv(rows, File::create(path)?)
}

pub fn save_anchor_text_csv(rows: &[AnchorTextRow], path: &Path) -> Result<()> {
    write_anchor_text_csv(rows, File::create(path)?)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeCount {
    pub text_type: TextType,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSummary {
    pub url: String,
    pub occurrences: usize,
    pub unique_texts: usize,
    pub has_redirects: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisSummary {
    pub status: AnalysisStatus,
    pub plain_anchors: usize,
    pub rendered_anchors: usize,
    pub internal_anchors: usize,
    pub text_types: Vec<TypeCount>,
    pub top_targets: Vec<TargetSummary>,
}

pub fn summarize_job(job: &CrawlJob, status: AnalysisStatus, top: usize) -> AnalysisSummary {
    let rendered_anchors = job
        .anchors
        .iter()
        .filter(|a| a.extraction_method == ExtractionMethod::Rendered)
        .count();

    let mut by_type: HashMap<TextType, usize> = HashMap::new();
    for anchor in &job.anchors {
        *by_type.entry(anchor.text_type).or_default() += 1;
    }
    let mut text_types: Vec<TypeCount> = by_type
        .into_iter()
        .map(|(text_type, count)| TypeCount { text_type, count })
        .collect();
    text_types.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| a.text_type.as_str().cmp(b.text_type.as_str()))
    });

    let mut top_targets: Vec<TargetSummary> = job
        .index
        .iter()
        .map(|(url, occurrences)| {
            let breakdown = summarize(occurrences, 0);
            TargetSummary {
                url: url.to_string(),
                occurrences: occurrences.len(),
                unique_texts: breakdown.len(),
                has_redirects: occurrences.iter().any(|o| o.is_redirect),
            }
        })
        .collect();
    // Index iteration is sorted by URL and sort_by is stable, so ties stay alphabetical.
    top_targets.sort_by(|a, b| b.occurrences.cmp(&a.occurrences));
    top_targets.truncate(top);

    AnalysisSummary {
        status,
        plain_anchors: job.anchors.len() - rendered_anchors,
        rendered_anchors,
        internal_anchors: job.anchors.iter().filter(|a| a.is_internal).count(),
        text_types,
        top_targets,
    }
}

pub fn generate_text_report(summary: &AnalysisSummary) -> String {
    let status = &summary.status;
    let mut report = String::new();

    report.push_str(RULE);
    report.push_str("                      LINKSCOUT ANCHOR TEXT ANALYSIS\n");
    report.push_str(RULE);
    report.push('\n');

    report.push_str(&format!("Analysis ID:  {}\n", status.id));
    report.push_str(&format!("Status:       {}\n", status.label()));
    report.push_str(&format!("Target:       {}\n", status.seed_url));
    report.push_str(&format!("Domain:       {}\n", status.domain));
    report.push_str(&format!(
        "Started:      {}\n",
        status.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if status.finished_at.is_some() {
        report.push_str(&format!("Duration:     {:.1} seconds\n", status.elapsed_seconds));
    }
    report.push_str(&format!(
        "Rendering:    {}\n",
        if status.selenium_available { "available" } else { "not configured" }
    ));
    report.push('\n');

    report.push_str(RULE);
    report.push_str("SUMMARY\n");
    report.push_str(RULE);
    report.push('\n');
    report.push_str(&format!("Pages analyzed:         {}\n", status.pages_visited));
    report.push_str(&format!(
        "Anchors found:          {}  ({} plain, {} rendered)\n",
        status.total_anchors, summary.plain_anchors, summary.rendered_anchors
    ));
    report.push_str(&format!("Internal anchors:       {}\n", summary.internal_anchors));
    report.push_str(&format!("Redirecting links:      {}\n", status.redirect_count));
    report.push_str(&format!("URLs with anchor text:  {}\n", status.distinct_target_urls));
    report.push('\n');

    if !summary.text_types.is_empty() {
        report.push_str(RULE);
        report.push_str("ANCHOR TEXT TYPES\n");
        report.push_str(RULE);
        report.push('\n');
        for entry in &summary.text_types {
            report.push_str(&format!("  {:<18} {}\n", entry.text_type.as_str(), entry.count));
        }
        report.push('\n');
    }

    if !summary.top_targets.is_empty() {
        report.push_str(RULE);
        report.push_str("MOST LINKED URLS\n");
        report.push_str(RULE);
        report.push('\n');
        for (idx, target) in summary.top_targets.iter().enumerate() {
            report.push_str(&format!("[{}] {}\n", idx + 1, target.url));
            report.push_str(&format!(
                "    {} links, {} distinct anchor texts{}\n",
                target.occurrences,
                target.unique_texts,
                if target.has_redirects { ", reached via redirect" } else { "" }
            ));
        }
        report.push('\n');
    }

    report.push_str(RULE);
    report.push_str("                          End of Report\n");
    report.push_str(RULE);
    report.push_str("\nGenerated by Linkscout - anchor text and redirect auditing\n\n");

    report
}

pub fn generate_json_report(summary: &AnalysisSummary) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "Linkscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "analysis": {
                "id": summary.status.id,
                "status": summary.status.label(),
                "seed_url": summary.status.seed_url,
                "domain": summary.status.domain,
                "start_time": summary.status.started_at.to_rfc3339(),
                "end_time": summary.status.finished_at.map(|t| t.to_rfc3339()),
                "duration_seconds": summary.status.elapsed_seconds,
                "selenium_available": summary.status.selenium_available
            },
            "summary": {
                "pages_analyzed": summary.status.pages_visited,
                "total_anchors": summary.status.total_anchors,
                "plain_anchors": summary.plain_anchors,
                "rendered_anchors": summary.rendered_anchors,
                "internal_anchors": summary.internal_anchors,
                "redirect_links": summary.status.redirect_count,
                "unique_urls_with_anchors": summary.status.distinct_target_urls,
                "text_types": summary.text_types
            },
            "top_targets": summary.top_targets
        }
    });

    serde_json::to_string_pretty(&json_report)
}

/// Pretty JSON for a single destination report.
pub fn generate_url_report_json(report: &AggregateReport) -> std::result::Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
