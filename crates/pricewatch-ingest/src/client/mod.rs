//! Authenticated, rate-limited HTTP client for provider APIs and feeds.

mod origin;
pub(crate) mod response;

use std::time::Duration;

use pricewatch_core::{AdapterSettings, AppConfig};
use reqwest::Client;
use serde_json::Value;

use crate::error::IngestError;
use crate::rate_limit::RateLimiter;

pub use origin::extract_origin;
#[cfg(test)]
use origin::extract_domain;

/// Header used for API-key auth when a store does not name one.
pub const DEFAULT_API_KEY_HEADER: &str = "X-API-Key";

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_ANY: &str = "*/*";

/// Transport settings shared by every adapter, taken from `AppConfig`.
#[derive(Debug, Clone)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Retries on the HTML fetch path only.
    pub html_max_retries: u32,
    pub html_backoff_base_secs: u64,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "pricewatch/0.1 (price-aggregation)".to_string(),
            html_max_retries: 3,
            html_backoff_base_secs: 1,
        }
    }
}

impl HttpSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            timeout_secs: config.http_timeout_secs,
            user_agent: config.http_user_agent.clone(),
            html_max_retries: config.html_max_retries,
            html_backoff_base_secs: config.html_backoff_base_secs,
        }
    }

    pub(crate) fn build_client(&self) -> Result<Client, IngestError> {
        Ok(Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(&self.user_agent)
            .build()?)
    }
}

/// How requests authenticate against a provider.
#[derive(Clone, PartialEq, Eq)]
pub enum Auth {
    None,
    ApiKey { header: String, key: String },
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => write!(f, "None"),
            Auth::ApiKey { header, .. } => write!(f, "ApiKey({header}: [redacted])"),
            Auth::Bearer(_) => write!(f, "Bearer([redacted])"),
        }
    }
}

impl Auth {
    /// Picks the auth mode from store settings: an `api_key` wins, then a
    /// `token`/`access_token` bearer, otherwise no auth.
    #[must_use]
    pub fn from_settings(settings: &AdapterSettings) -> Self {
        if let Some(key) = settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            let header = settings
                .api_key_header
                .clone()
                .unwrap_or_else(|| DEFAULT_API_KEY_HEADER.to_string());
            return Auth::ApiKey {
                header,
                key: key.to_string(),
            };
        }
        match settings.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => Auth::Bearer(token.to_string()),
            None => Auth::None,
        }
    }

    fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            Auth::None => request,
            Auth::ApiKey { header, key } => request.header(header.as_str(), key),
            Auth::Bearer(token) => request.bearer_auth(token),
        }
    }
}

/// JSON API client bound to one provider.
///
/// Every request passes through the client's [`RateLimiter`] first. Non-2xx
/// statuses map to typed errors; no retries happen here.
pub struct ApiClient {
    client: Client,
    base_url: String,
    auth: Auth,
    limiter: RateLimiter,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    pub fn new(
        http: &HttpSettings,
        base_url: &str,
        auth: Auth,
        requests_per_second: u32,
    ) -> Result<Self, IngestError> {
        Ok(Self {
            client: http.build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
            limiter: RateLimiter::per_second(requests_per_second),
        })
    }

    /// Points the client at a different base URL (mock servers in tests,
    /// regional endpoints in config).
    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Resolves `endpoint` against the base URL and appends `params`.
    /// Absolute endpoints are used as-is.
    pub(crate) fn url_for(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<reqwest::Url, IngestError> {
        let raw = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("{}{}", self.base_url, endpoint)
        };
        let mut url = reqwest::Url::parse(&raw).map_err(|e| IngestError::InvalidUrl {
            url: raw.clone(),
            reason: e.to_string(),
        })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    /// Rate-limited GET returning the raw body text. Accepts any media type,
    /// since feeds may be JSON, XML or CSV.
    ///
    /// # Errors
    ///
    /// - [`IngestError::InvalidUrl`] if the endpoint does not form a URL.
    /// - [`IngestError::RateLimited`], [`IngestError::NotFound`] or
    ///   [`IngestError::UnexpectedStatus`] for non-2xx responses.
    /// - [`IngestError::Http`] for network failures.
    pub async fn get_text(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<String, IngestError> {
        self.get(endpoint, params, ACCEPT_ANY).await
    }

    async fn get(
        &self,
        endpoint: &str,
        params: &[(String, String)],
        accept: &str,
    ) -> Result<String, IngestError> {
        let url = self.url_for(endpoint, params)?;
        self.limiter.acquire().await;
        tracing::debug!(url = %url, accept, "GET");

        let request = self
            .client
            .get(url.clone())
            .header(reqwest::header::ACCEPT, accept);
        let response = self.auth.apply(request).send().await?;
        response::read_body(response, url.as_str()).await
    }

    /// Rate-limited GET decoding a JSON body.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_text`], plus [`IngestError::Deserialize`] when the
    /// body is not JSON.
    pub async fn get_json(
        &self,
        endpoint: &str,
        params: &[(String, String)],
    ) -> Result<Value, IngestError> {
        let body = self.get(endpoint, params, ACCEPT_JSON).await?;
        serde_json::from_str(&body).map_err(|e| IngestError::Deserialize {
            context: format!("GET {endpoint}"),
            source: e,
        })
    }

    /// Rate-limited POST of a pre-serialized JSON body with extra headers
    /// (used by signed requests, where the signature covers the exact bytes).
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_json`].
    pub async fn post_json(
        &self,
        endpoint: &str,
        body: String,
        headers: &[(String, String)],
    ) -> Result<Value, IngestError> {
        let url = self.url_for(endpoint, &[])?;
        self.limiter.acquire().await;
        tracing::debug!(url = %url, "POST");

        let mut request = self
            .client
            .post(url.clone())
            .header(reqwest::header::ACCEPT, ACCEPT_JSON)
            .body(body);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }
        let response = self.auth.apply(request).send().await?;
        let text = response::read_body(response, url.as_str()).await?;
        serde_json::from_str(&text).map_err(|e| IngestError::Deserialize {
            context: format!("POST {endpoint}"),
            source: e,
        })
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
