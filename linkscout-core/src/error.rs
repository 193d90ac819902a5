use linkscout_scanner::ScanError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Website URL is required")]
    EmptySeed,

    #[error("Invalid seed URL: {0}")]
    InvalidSeed(String),

    #[error("No completed analysis data available")]
    NoData,

    #[error("Scan error: {0}")]
    Scan(#[from] ScanError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AnalysisError>;
