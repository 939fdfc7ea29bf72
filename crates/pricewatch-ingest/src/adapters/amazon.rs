//! Amazon Product Advertising API 5.0 `SearchItems`, signed with SigV4.

use async_trait::async_trait;
use chrono::Utc;
use pricewatch_core::{clean_name, Product, StoreConfig, DEFAULT_CURRENCY};
use serde_json::{json, Value};

use super::sigv4::SigV4Signer;
use super::{FetchOutcome, FetchStatus, StoreAdapter};
use crate::client::{ApiClient, Auth, HttpSettings};
use crate::error::IngestError;

pub const DEFAULT_BASE_URL: &str = "https://webservices.amazon.com.mx/paapi5";
const SEARCH_ENDPOINT: &str = "/searchitems";
const MARKETPLACE: &str = "www.amazon.com.mx";
const REGION: &str = "us-east-1";
const SERVICE: &str = "ProductAdvertisingAPI";
const TARGET: &str = "com.amazon.paapi5.v1.ProductAdvertisingAPIv1.SearchItems";
const DEFAULT_RATE_LIMIT: u32 = 1;
/// `SearchItems` returns at most ten items per call.
const MAX_ITEM_COUNT: usize = 10;

const RESOURCES: [&str; 3] = [
    "Images.Primary.Large",
    "ItemInfo.Title",
    "Offers.Listings.Price",
];

#[derive(Clone)]
struct Credentials {
    access_key: String,
    secret_key: String,
    partner_tag: String,
}

pub struct AmazonPaapiAdapter {
    store_name: String,
    store_url: String,
    credentials: Option<Credentials>,
    client: ApiClient,
}

impl AmazonPaapiAdapter {
    /// Missing credentials are not an error here; fetches report
    /// [`FetchStatus::NotConfigured`] instead.
    ///
    /// # Errors
    ///
    /// Returns [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn from_config(store: &StoreConfig, http: &HttpSettings) -> Result<Self, IngestError> {
        let settings = &store.settings;
        let present = |v: &Option<String>| v.as_deref().filter(|s| !s.is_empty()).map(str::to_string);
        let credentials = match (
            present(&settings.access_key),
            present(&settings.secret_key),
            present(&settings.partner_tag),
        ) {
            (Some(access_key), Some(secret_key), Some(partner_tag)) => Some(Credentials {
                access_key,
                secret_key,
                partner_tag,
            }),
            _ => None,
        };

        Ok(Self {
            store_name: store.name.clone(),
            store_url: store.url.clone(),
            credentials,
            client: ApiClient::new(
                http,
                DEFAULT_BASE_URL,
                Auth::None,
                store.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
            )?,
        })
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.client = self.client.with_base_url(base_url);
        self
    }

    #[must_use]
    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    async fn search(
        &self,
        credentials: &Credentials,
        query: &str,
        category: Option<&str>,
        limit: usize,
    ) -> Result<Value, IngestError> {
        let mut payload = json!({
            "Keywords": query,
            "Resources": RESOURCES,
            "ItemCount": limit.min(MAX_ITEM_COUNT),
            "PartnerTag": credentials.partner_tag,
            "PartnerType": "Associates",
            "Marketplace": MARKETPLACE,
        });
        if let Some(category) = category.filter(|c| !c.is_empty()) {
            payload["SearchIndex"] = Value::String(category.to_string());
        }
        let body = payload.to_string();

        let url = self.client.url_for(SEARCH_ENDPOINT, &[])?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(IngestError::InvalidUrl {
                    url: url.to_string(),
                    reason: "missing host".to_string(),
                })
            }
        };

        let signer = SigV4Signer {
            access_key: &credentials.access_key,
            secret_key: &credentials.secret_key,
            region: REGION,
            service: SERVICE,
        };
        let headers = signer.sign(
            "POST",
            url.path(),
            &[
                ("content-encoding", "amz-1.0".to_string()),
                ("content-type", "application/json; charset=utf-8".to_string()),
                ("host", host),
                ("x-amz-target", TARGET.to_string()),
            ],
            &body,
            Utc::now(),
        )?;

        self.client.post_json(SEARCH_ENDPOINT, body, &headers).await
    }

    fn parse_items(&self, response: &Value) -> Vec<Product> {
        let Some(items) = response
            .pointer("/SearchResult/Items")
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };
        items
            .iter()
            .filter_map(|item| {
                let product = self.parse_item(item);
                if product.is_none() {
                    let asin = item.get("ASIN").and_then(Value::as_str).unwrap_or("?");
                    tracing::debug!(
                        store = %self.store_name,
                        asin,
                        "skipping item without title or price"
                    );
                }
                product
            })
            .collect()
    }

    /// Title and first listing price are required.
    fn parse_item(&self, item: &Value) -> Option<Product> {
        let title = item
            .pointer("/ItemInfo/Title/DisplayValue")
            .and_then(Value::as_str)?;
        let listing = item.pointer("/Offers/Listings/0/Price")?;
        let price = listing.get("Amount").and_then(Value::as_f64)?;

        Some(Product {
            name: clean_name(title),
            price,
            store_name: self.store_name.clone(),
            store_url: item
                .get("DetailPageURL")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            image_url: item
                .pointer("/Images/Primary/Large/URL")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            category: None,
            sku: item.get("ASIN").and_then(Value::as_str).map(str::to_string),
            currency: listing
                .get("Currency")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_CURRENCY)
                .to_string(),
            available: true,
        })
    }
}

#[async_trait]
impl StoreAdapter for AmazonPaapiAdapter {
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
        let Some(credentials) = &self.credentials else {
            tracing::warn!(store = %self.store_name, "PA-API credentials not configured, skipping");
            return FetchOutcome::not_configured(
                "access_key, secret_key and partner_tag are required",
            );
        };
        let Some(query) = query.map(str::trim).filter(|q| !q.is_empty()) else {
            return FetchOutcome::not_configured("search requires a query");
        };
        if limit == 0 {
            return FetchOutcome::empty(FetchStatus::Complete);
        }

        match self.search(credentials, query, category, limit).await {
            Ok(response) => {
                FetchOutcome::validated(self.parse_items(&response), limit, FetchStatus::Complete)
            }
            Err(e) => {
                tracing::warn!(store = %self.store_name, query, error = %e, "SearchItems failed");
                FetchOutcome::failed(e.to_string())
            }
        }
    }

    async fn test_connection(&self) -> bool {
        let Some(credentials) = &self.credentials else {
            return false;
        };
        match self.search(credentials, "test", None, 1).await {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(store = %self.store_name, error = %e, "connection test failed");
                false
            }
        }
    }
}
