use chrono::Local;
use clap::ArgMatches;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use linkscout_core::analysis::{AnalysisHandle, AnalysisOptions, start_analysis};
use linkscout_core::report::{
    CsvReport, ReportFormat, generate_json_report, generate_text_report, generate_url_report_json,
    report_file_name, save_anchor_text_csv, save_redirect_csv, save_report,
};
use linkscout_scanner::{CrawlConfig, CrawlProgress, PageOutcome, ProgressCallback};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Number of most-linked destinations listed in the summary.
pub const TOP_TARGETS: usize = 10;

pub fn print_banner() {
    println!(
        "{}",
        r#"
  _ _       _                       _
 | (_)_ __ | | _____  ___ ___  _   _| |_
 | | | '_ \| |/ / __|/ __/ _ \| | | | __|
 | | | | | |   <\__ \ (_| (_) | |_| | |_
 |_|_|_| |_|_|\_\___/\___\___/ \__,_|\__|
"#
        .bright_cyan()
    );
    println!(
        "  {} {}\n",
        "anchor text & redirect auditor".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_black()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue());
}

/// Installs the log subscriber. `RUST_LOG` wins over the verbosity count.
pub fn init_tracing(verbosity: u8) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_directive(verbosity)));
    // Ignored when a subscriber is already installed.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

pub fn default_log_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Expands a leading `~` in a user-supplied path.
pub fn expand_path(path: &Path) -> PathBuf {
    let raw = path.to_string_lossy();
    PathBuf::from(shellexpand::tilde(raw.as_ref()).as_ref())
}

/// Reads crawl settings from a JSON file. Missing keys keep their defaults.
pub fn load_config(path: &Path) -> Result<CrawlConfig, String> {
    let path = expand_path(path);
    let content = fs::read_to_string(&path)
        .map_err(|e| format!("Failed to read config {}: {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid config {}: {}", path.display(), e))
}

/// Crawl settings given on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub max_pages: Option<usize>,
    pub max_depth: Option<usize>,
    pub selenium_threshold: Option<usize>,
    pub page_delay_ms: Option<u64>,
}

impl ConfigOverrides {
    pub fn from_args(args: &ArgMatches) -> Self {
        Self {
            max_pages: args.get_one::<usize>("max-pages").copied(),
            max_depth: args.get_one::<usize>("max-depth").copied(),
            selenium_threshold: args.get_one::<usize>("threshold").copied(),
            page_delay_ms: args.get_one::<u64>("delay").copied(),
        }
    }

    pub fn apply(&self, mut config: CrawlConfig) -> CrawlConfig {
        if let Some(max_pages) = self.max_pages {
            config.max_pages = max_pages;
        }
        if let Some(max_depth) = self.max_depth {
            config.max_depth = max_depth;
        }
        if let Some(threshold) = self.selenium_threshold {
            config.selenium_threshold = threshold;
        }
        if let Some(delay) = self.page_delay_ms {
            config.page_delay_ms = delay;
        }
        config
    }
}

pub fn build_config(args: &ArgMatches) -> Result<CrawlConfig, String> {
    let base = match args.get_one::<PathBuf>("config") {
        Some(path) => load_config(path)?,
        None => CrawlConfig::default(),
    };
    Ok(ConfigOverrides::from_args(args).apply(base))
}

/// Path portion of a URL for compact progress lines.
pub fn short_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let mut path = parsed.path().to_string();
            if let Some(query) = parsed.query() {
                path.push('?');
                path.push_str(query);
            }
            path
        }
        Err(_) => url.to_string(),
    }
}

pub fn progress_message(progress: &CrawlProgress, url: &str, outcome: &PageOutcome) -> String {
    let mode = match outcome {
        PageOutcome::Plain { .. } => "plain",
        PageOutcome::Rendered { .. } => "rendered",
        PageOutcome::Skipped { .. } => "skipped",
        PageOutcome::Failed { .. } => "failed",
    };
    format!(
        "[{} pages | {} links | {} redirects] {} ({})",
        progress.pages_visited,
        progress.total_anchors,
        progress.redirect_count,
        short_path(url),
        mode
    )
}

/// Where the two CSV tables for `domain` go inside `dir`.
pub fn csv_paths(dir: &Path, domain: &str) -> (PathBuf, PathBuf) {
    let now = Local::now();
    (
        dir.join(report_file_name(CsvReport::Redirects, domain, now)),
        dir.join(report_file_name(CsvReport::AnchorText, domain, now)),
    )
}

async fn write_csv_reports(handle: &AnalysisHandle, dir: &Path) -> Result<(PathBuf, PathBuf), String> {
    let dir = expand_path(dir);
    fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create output directory {}: {}", dir.display(), e))?;

    let (redirect_path, anchor_path) = csv_paths(&dir, handle.domain());
    debug!("Writing CSV reports to {}", dir.display());
    let redirects = handle.redirect_report().await.map_err(|e| e.to_string())?;
    let anchors = handle.anchor_text_report().await.map_err(|e| e.to_string())?;
    save_redirect_csv(&redirects, &redirect_path).map_err(|e| e.to_string())?;
    save_anchor_text_csv(&anchors, &anchor_path).map_err(|e| e.to_string())?;
    Ok((redirect_path, anchor_path))
}

pub async fn handle_analyze(args: &ArgMatches) {
    if let Err(e) = run_analyze(args).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run_analyze(args: &ArgMatches) -> Result<(), String> {
    init_tracing(args.get_count("verbose"));

    let seed = args
        .get_one::<String>("URL")
        .ok_or_else(|| "Website URL is required".to_string())?;
    let config = build_config(args)?;
    let chrome = args.get_one::<PathBuf>("chrome").map(|p| expand_path(p));
    let render = args.get_flag("render") || chrome.is_some();
    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    print_divider();
    println!("{} {}", "Target:".bright_white().bold(), seed.bright_cyan());
    println!(
        "{} {} pages, depth {}, render below {} links",
        "Limits:".bright_white().bold(),
        config.max_pages,
        config.max_depth,
        config.selenium_threshold
    );
    match (render, &chrome) {
        (true, Some(path)) => println!(
            "{} {}",
            "Renderer:".bright_white().bold(),
            path.display().to_string().green()
        ),
        (true, None) => println!("{} {}", "Renderer:".bright_white().bold(), "headless Chrome".green()),
        (false, _) => println!(
            "{} {}",
            "Renderer:".bright_white().bold(),
            "none (plain HTML only)".yellow()
        ),
    }
    print_divider();

    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}") {
        spinner.set_style(style);
    }
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner.set_message("Starting crawl...");

    let pb = spinner.clone();
    let callback: ProgressCallback =
        Arc::new(move |progress: &CrawlProgress, url: &str, outcome: &PageOutcome| {
            pb.set_message(progress_message(progress, url, outcome));
        });

    let mut options = AnalysisOptions {
        seed_url: seed.clone(),
        config,
        ..AnalysisOptions::default()
    }
    .with_progress_callback(callback);
    if let Some(path) = chrome {
        options = options.with_chrome_executable(path);
    } else if render {
        options = options.with_rendering();
    }

    let handle = start_analysis(options).map_err(|e| {
        spinner.finish_and_clear();
        e.to_string()
    })?;

    let status = tokio::select! {
        status = handle.wait() => status,
        _ = tokio::signal::ctrl_c() => {
            spinner.set_message("Interrupted, finishing current page...");
            handle.cancel();
            handle.wait().await
        }
    };
    let status = status.map_err(|e| e.to_string())?;
    spinner.finish_and_clear();

    println!(
        "{} {} in {:.1}s ({} pages, {} links, {} redirects)",
        "✓".green().bold(),
        status.label().bright_white().bold(),
        status.elapsed_seconds,
        status.pages_visited,
        status.total_anchors,
        status.redirect_count
    );

    if let Some(dir) = args.get_one::<PathBuf>("output-dir") {
        let (redirect_path, anchor_path) = write_csv_reports(&handle, dir).await?;
        println!("{} {}", "Redirects CSV:".bright_white(), redirect_path.display());
        println!("{} {}", "Anchor text CSV:".bright_white(), anchor_path.display());
    }

    if let Some(target) = args.get_one::<String>("report-url") {
        match handle.report_for_url(target).await.map_err(|e| e.to_string())? {
            Some(report) => {
                let json = generate_url_report_json(&report).map_err(|e| e.to_string())?;
                println!("{}", json);
            }
            None => println!("{} {}", "No anchor text data found for".yellow(), target),
        }
        return Ok(());
    }

    if args.get_flag("list-urls") {
        let urls = handle.all_target_urls().await.map_err(|e| e.to_string())?;
        for url in &urls {
            println!("{}", url);
        }
        println!("{} {}", "Destination URLs:".bright_white(), urls.len());
        return Ok(());
    }

    let summary = handle.summary(TOP_TARGETS).await.map_err(|e| e.to_string())?;
    let content = match format {
        ReportFormat::Text => generate_text_report(&summary),
        ReportFormat::Json => generate_json_report(&summary).map_err(|e| e.to_string())?,
    };

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            let path = expand_path(path);
            save_report(&content, &path)
                .map_err(|e| format!("Failed to save report {}: {}", path.display(), e))?;
            println!("{} {}", "Report saved to".green(), path.display());
        }
        None => println!("{}", content),
    }

    Ok(())
}
