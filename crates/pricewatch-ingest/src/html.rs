//! Storefront HTML fetching with bounded retries.
//!
//! This is the fallback path for stores without an API or feed. It is the
//! only transport that retries: 429s and network errors back off
//! exponentially, everything else fails on the first attempt.

use reqwest::Client;

use crate::client::{extract_origin, response, HttpSettings};
use crate::error::IngestError;
use crate::rate_limit::retry_with_backoff;

pub(crate) const BROWSER_UA: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

pub struct HtmlFetcher {
    client: Client,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl HtmlFetcher {
    /// Builds a fetcher with a browser-like `User-Agent`; the configured
    /// timeout and retry policy come from `http`.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the `reqwest::Client` cannot be built.
    pub fn new(http: &HttpSettings) -> Result<Self, IngestError> {
        let settings = HttpSettings {
            user_agent: BROWSER_UA.to_string(),
            ..http.clone()
        };
        Ok(Self {
            client: settings.build_client()?,
            max_retries: http.html_max_retries,
            backoff_base_secs: http.html_backoff_base_secs,
        })
    }

    /// Fetches a page body, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`IngestError::RateLimited`] or [`IngestError::Http`] once retries
    ///   are exhausted.
    /// - [`IngestError::NotFound`] / [`IngestError::UnexpectedStatus`]
    ///   immediately.
    pub async fn fetch_html(&self, url: &str) -> Result<String, IngestError> {
        let referer = extract_origin(url);

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let referer = referer.clone();
            async move {
                let response = self
                    .client
                    .get(url)
                    .header(
                        reqwest::header::ACCEPT,
                        "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
                    )
                    .header(reqwest::header::ACCEPT_LANGUAGE, "es-MX,es;q=0.9,en;q=0.8")
                    .header(reqwest::header::REFERER, referer)
                    .header(reqwest::header::CACHE_CONTROL, "no-cache")
                    .send()
                    .await?;
                response::read_body(response, url).await
            }
        })
        .await
    }

    /// Checks that a storefront answers with a non-empty page.
    ///
    /// Returns the body size in bytes.
    ///
    /// # Errors
    ///
    /// Same as [`Self::fetch_html`].
    pub async fn probe(&self, url: &str) -> Result<usize, IngestError> {
        let body = self.fetch_html(url).await?;
        Ok(body.len())
    }
}
