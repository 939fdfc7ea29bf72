//! Shared HTTP status handling for API, feed and storefront requests.

use reqwest::{Response, StatusCode};

use crate::error::IngestError;

use super::origin::extract_domain;

/// Maps a response to its body text, turning non-2xx statuses into typed errors.
///
/// - 429 becomes [`IngestError::RateLimited`] with the `Retry-After` value
///   (seconds, default 60).
/// - 404 becomes [`IngestError::NotFound`].
/// - Any other non-2xx becomes [`IngestError::UnexpectedStatus`].
pub(crate) async fn read_body(response: Response, url: &str) -> Result<String, IngestError> {
    let status = response.status();

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after_secs = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .unwrap_or(60);
        return Err(IngestError::RateLimited {
            domain: extract_domain(url),
            retry_after_secs,
        });
    }

    if status == StatusCode::NOT_FOUND {
        return Err(IngestError::NotFound {
            url: url.to_owned(),
        });
    }

    if !status.is_success() {
        return Err(IngestError::UnexpectedStatus {
            status: status.as_u16(),
            url: url.to_owned(),
        });
    }

    Ok(response.text().await?)
}
