use std::time::Duration;

use tracing::warn;

use crate::error::ScrapeError;

const BASE_BACKOFF_MS: u64 = 2000;

/// HTTP client for the two URL families the catalog exposes:
/// `<base>/game-list/<n>` index pages and `<base>/info<fragment>` detail pages.
#[derive(Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    base: String,
    retries: u32,
}

impl Fetcher {
    pub fn new(base_url: &str, timeout: Duration, retries: u32) -> Result<Self, ScrapeError> {
        let base = base_url.trim_end_matches('/').to_string();
        if !base.starts_with("http://") && !base.starts_with("https://") {
            return Err(ScrapeError::InvalidBaseUrl(base_url.to_string()));
        }

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("sfc_cartdb/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| ScrapeError::Request {
                url: base.clone(),
                source,
            })?;

        Ok(Self {
            http,
            base,
            retries,
        })
    }

    /// Fetch one catalog index page.
    pub async fn index_page(&self, number: u32) -> Result<String, ScrapeError> {
        self.get_text(index_url(&self.base, number)).await
    }

    /// Fetch one detail page. Fragments come straight out of the listing
    /// extractor and already carry their leading slash.
    pub async fn detail_page(&self, fragment: &str) -> Result<String, ScrapeError> {
        self.get_text(detail_url(&self.base, fragment)).await
    }

    async fn get_text(&self, url: String) -> Result<String, ScrapeError> {
        let mut attempt = 0;
        loop {
            match self.get_once(&url).await {
                Ok(body) => return Ok(body),
                Err(e) if e.is_transient() && attempt < self.retries => {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    warn!(
                        "{} (attempt {}/{}), backing off {:.1}s",
                        e,
                        attempt + 1,
                        self.retries,
                        backoff.as_secs_f64()
                    );
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn get_once(&self, url: &str) -> Result<String, ScrapeError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        response.text().await.map_err(|source| ScrapeError::Body {
            url: url.to_string(),
            source,
        })
    }
}

fn index_url(base: &str, number: u32) -> String {
    format!("{}/game-list/{}", base, number)
}

fn detail_url(base: &str, fragment: &str) -> String {
    format!("{}/info{}", base, fragment)
}
