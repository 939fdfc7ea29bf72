//! Mercado Libre public search API (no auth).

use async_trait::async_trait;
use pricewatch_core::{clean_name, Product, StoreConfig, DEFAULT_CURRENCY};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{FetchOutcome, FetchStatus, StoreAdapter};
use crate::client::{ApiClient, Auth, HttpSettings};
use crate::error::IngestError;
use crate::pagination::{fetch_all_pages, has_more_pages, PageParam, PageRequest, PageStop};

pub const DEFAULT_BASE_URL: &str = "https://api.mercadolibre.com";
pub const DEFAULT_SITE_ID: &str = "MLM";
const DEFAULT_RATE_LIMIT: u32 = 5;
/// Provider-side maximum for `limit` on one search page.
const PAGE_SIZE: usize = 50;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MlCategory {
    pub id: String,
    pub name: String,
}

pub struct MercadoLibreAdapter {
    store_name: String,
    store_url: String,
    site_id: String,
    client: ApiClient,
}

impl MercadoLibreAdapter {
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn from_config(store: &StoreConfig, http: &HttpSettings) -> Result<Self, IngestError> {
        let client = ApiClient::new(
            http,
            DEFAULT_BASE_URL,
            Auth::None,
            store.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
        )?;
        Ok(Self {
            store_name: store.name.clone(),
            store_url: store.url.clone(),
            site_id: store
                .settings
                .site_id
                .clone()
                .unwrap_or_else(|| DEFAULT_SITE_ID.to_string()),
            client,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    /// Lists the site's top-level categories.
    ///
    /// # Errors
    ///
    /// Propagates transport errors, and [`IngestError::Deserialize`] when the
    /// body is not a list of `{id, name}` objects.
    pub async fn list_categories(&self) -> Result<Vec<MlCategory>, IngestError> {
        let endpoint = format!("/sites/{}/categories", self.site_id);
        let value = self.client.get_json(&endpoint, &[]).await?;
        serde_json::from_value(value).map_err(|e| IngestError::Deserialize {
            context: endpoint,
            source: e,
        })
    }

    fn parse_search(&self, response: &Value) -> Vec<Product> {
        let Some(results) = response.get("results").and_then(Value::as_array) else {
            return Vec::new();
        };
        results
            .iter()
            .filter_map(|item| {
                let product = self.parse_item(item);
                if product.is_none() {
                    let id = item.get("id").and_then(Value::as_str).unwrap_or("?");
                    tracing::debug!(
                        store = %self.store_name,
                        id,
                        "skipping item missing required fields"
                    );
                }
                product
            })
            .collect()
    }

    /// Maps one search result. `id`, `title`, `price` and `permalink` are
    /// required; anything missing skips the item.
    fn parse_item(&self, item: &Value) -> Option<Product> {
        let id = item.get("id")?.as_str()?;
        let title = item.get("title")?.as_str()?;
        let price = item.get("price")?.as_f64()?;
        let permalink = item.get("permalink")?.as_str()?;
        if id.is_empty() || title.is_empty() || permalink.is_empty() {
            return None;
        }

        let image_url = item
            .get("thumbnail")
            .and_then(Value::as_str)
            .map(|t| t.replace("-I.jpg", "-O.jpg"))
            .unwrap_or_default();
        let available = item
            .get("available_quantity")
            .and_then(Value::as_i64)
            .is_none_or(|q| q > 0);

        Some(Product {
            name: clean_name(title),
            price,
            store_name: self.store_name.clone(),
            store_url: permalink.to_string(),
            image_url,
            category: item
                .get("category_id")
                .and_then(Value::as_str)
                .map(str::to_string),
            sku: Some(id.to_string()),
            currency: item
                .get("currency_id")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CURRENCY)
                .to_string(),
            available,
        })
    }
}

/// Search responses report `paging: {total, offset, limit}`. Fall back to the
/// generic checks when those are absent.
fn ml_has_more(response: &Value, page: usize) -> bool {
    let paging = response.get("paging");
    let field = |name: &str| paging.and_then(|p| p.get(name)).and_then(Value::as_u64);
    match (field("total"), field("offset"), field("limit")) {
        (Some(total), Some(offset), Some(limit)) if limit > 0 => offset + limit < total,
        _ => has_more_pages(response, page),
    }
}

#[async_trait]
impl StoreAdapter for MercadoLibreAdapter {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    fn store_url(&self) -> &str {
        &self.store_url
    }

    async fn fetch_products(
        &self,
        query: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> FetchOutcome {
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            tracing::warn!(store = %self.store_name, "search requires a query, skipping");
            return FetchOutcome::not_configured("search requires a query");
        };
        if limit == 0 {
            return FetchOutcome::empty(FetchStatus::Complete);
        }

        let endpoint = format!("/sites/{}/search", self.site_id);
        let mut params = vec![
            ("q".to_string(), query.to_string()),
            ("limit".to_string(), limit.min(PAGE_SIZE).to_string()),
        ];
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            params.push(("category".to_string(), category.to_string()));
        }

        if limit > PAGE_SIZE {
            let request = PageRequest::new(
                &endpoint,
                params,
                PageParam::Offset {
                    name: "offset".to_string(),
                    page_size: PAGE_SIZE,
                },
            )
            .max_pages(limit.div_ceil(PAGE_SIZE))
            .has_more(ml_has_more);

            let paged = fetch_all_pages(&self.client, request, |v| self.parse_search(v)).await;
            let status = match paged.stop {
                PageStop::RequestFailed(reason) if paged.pages_fetched == 0 => {
                    return FetchOutcome::failed(reason);
                }
                PageStop::RequestFailed(reason) => FetchStatus::Partial(reason),
                _ => FetchStatus::Complete,
            };
            return FetchOutcome::validated(paged.products, limit, status);
        }

        match self.client.get_json(&endpoint, &params).await {
            Ok(response) => {
                FetchOutcome::validated(self.parse_search(&response), limit, FetchStatus::Complete)
            }
            Err(e) => {
                tracing::warn!(store = %self.store_name, query, error = %e, "search request failed");
                FetchOutcome::failed(e.to_string())
            }
        }
    }

    async fn test_connection(&self) -> bool {
        let endpoint = format!("/sites/{}", self.site_id);
        match self.client.get_json(&endpoint, &[]).await {
            Ok(site) => site.get("id").and_then(Value::as_str) == Some(self.site_id.as_str()),
            Err(e) => {
                tracing::warn!(store = %self.store_name, error = %e, "connection test failed");
                false
            }
        }
    }
}
