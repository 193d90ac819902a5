pub mod classify;
pub mod config;
pub mod crawler;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod index;
pub mod job;
pub mod normalize;
pub mod redirect;
pub mod render;
pub mod result;
pub mod strategy;

pub use classify::{TextType, classify};
pub use config::CrawlConfig;
pub use crawler::{Crawler, ProgressCallback};
pub use error::ScanError;
pub use fetch::{Fetcher, HttpFetcher};
pub use index::{AggregateReport, TextBreakdown};
pub use job::{CrawlJob, CrawlProgress};
pub use redirect::{HopStatus, RedirectInfo};
pub use render::{HeadlessRenderer, PageRenderer};
pub use result::{AnchorRecord, ExtractionMethod, PageOutcome, RedirectLinkRecord};
