use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Unexpected HTTP status {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Redirect loop detected at {0}")]
    RedirectLoop(String),

    #[error("Too many redirects (limit {limit}) starting from {url}")]
    TooManyRedirects { url: String, limit: usize },

    #[error("Render error: {0}")]
    Render(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;
