use thiserror::Error;

/// Failures that abort a single fetch (and, after retries, skip its page).
/// Extraction problems are softer: they are logged and counted in the run
/// stats rather than surfaced here, since they never stop the run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request for {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("invalid base URL `{0}`")]
    InvalidBaseUrl(String),

    #[error("invalid page range {first}..={last}")]
    InvalidPageRange { first: u32, last: u32 },
}

impl ScrapeError {
    /// Transient failures worth retrying: connection errors, timeouts,
    /// rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ScrapeError::Request { source, .. } | ScrapeError::Body { source, .. } => {
                source.is_timeout() || source.is_connect()
            }
            ScrapeError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}
