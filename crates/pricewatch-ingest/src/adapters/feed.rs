//! Bulk catalog feeds (JSON, XML, CSV) fetched whole and filtered locally.

use async_trait::async_trait;
use pricewatch_core::{AdapterKind, Product, StoreConfig};

use super::{FetchOutcome, FetchStatus, StoreAdapter};
use crate::client::{ApiClient, Auth, HttpSettings};
use crate::error::IngestError;
use crate::parsers::{CsvFeedParser, FeedParser, FieldMapping, JsonFeedParser, XmlFeedParser};

const DEFAULT_RATE_LIMIT: u32 = 10;

pub struct FeedAdapter {
    store_name: String,
    store_url: String,
    feed_url: Option<String>,
    parser: FeedParser,
    client: ApiClient,
}

impl FeedAdapter {
    /// Builds the parser for the store's feed format. `product_path` applies
    /// to JSON feeds and `column_mapping` to JSON and CSV feeds.
    ///
    /// # Errors
    ///
    /// - [`IngestError::WrongAdapter`] if the store is not a feed store.
    /// - [`IngestError::Http`] if the HTTP client cannot be built.
    pub fn from_config(store: &StoreConfig, http: &HttpSettings) -> Result<Self, IngestError> {
        let settings = &store.settings;
        let mapping = FieldMapping::new(settings.column_mapping.clone());
        let parser = match store.adapter {
            AdapterKind::JsonFeed => FeedParser::Json(
                JsonFeedParser::new(&store.name)
                    .with_product_path(settings.product_path.clone())
                    .with_mapping(mapping),
            ),
            AdapterKind::XmlFeed => FeedParser::Xml(XmlFeedParser::new(&store.name)),
            AdapterKind::CsvFeed => {
                FeedParser::Csv(CsvFeedParser::new(&store.name).with_mapping(mapping))
            }
            other => {
                return Err(IngestError::WrongAdapter {
                    store: store.key.clone(),
                    expected: format!("a feed adapter (got {other})"),
                })
            }
        };

        Ok(Self {
            store_name: store.name.clone(),
            store_url: store.url.clone(),
            feed_url: settings
                .feed_url
                .clone()
                .filter(|url| !url.trim().is_empty()),
            parser,
            client: ApiClient::new(
                http,
                &store.url,
                Auth::from_settings(settings),
                store.rate_limit.unwrap_or(DEFAULT_RATE_LIMIT),
            )?,
        })
    }

    #[must_use]
    pub fn feed_url(&self) -> Option<&str> {
        self.feed_url.as_deref()
    }

    #[must_use]
    pub fn parser(&self) -> &FeedParser {
        &self.parser
    }

    /// Parses feed content obtained out of band (a local export file, say)
    /// and applies the same filtering and validation as a live fetch.
    #[must_use]
    pub fn products_from_content(
        &self,
        content: &str,
        query: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> FetchOutcome {
        self.outcome(self.parser.parse_str(content), query, category, limit)
    }

    fn outcome(
        &self,
        parsed: Result<Vec<Product>, IngestError>,
        query: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> FetchOutcome {
        match parsed {
            Ok(products) => FetchOutcome::validated(
                filter_products(products, query, category),
                limit,
                FetchStatus::Complete,
            ),
            Err(e) => {
                tracing::warn!(
                    store = %self.store_name,
                    format = %self.parser.format(),
                    error = %e,
                    "feed could not be read"
                );
                FetchOutcome::failed(e.to_string())
            }
        }
    }
}

/// Case-insensitive substring filters. A category filter excludes records
/// that carry no category.
fn filter_products(
    products: Vec<Product>,
    query: Option<&str>,
    category: Option<&str>,
) -> Vec<Product> {
    let query = query
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(str::to_lowercase);
    let category = category
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_lowercase);

    products
        .into_iter()
        .filter(|p| {
            query
                .as_deref()
                .is_none_or(|q| p.name.to_lowercase().contains(q))
        })
        .filter(|p| {
            category.as_deref().is_none_or(|c| {
                p.category
                    .as_deref()
                    .is_some_and(|pc| pc.to_lowercase().contains(c))
            })
        })
        .collect()
}

#[async_trait]
impl StoreAdapter for FeedAdapter {
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
        let Some(feed_url) = self.feed_url.as_deref() else {
            tracing::warn!(store = %self.store_name, "feed_url not configured, skipping");
            return FetchOutcome::not_configured("feed_url not configured");
        };

        let parsed = self.parser.parse_from_url(&self.client, feed_url).await;
        let outcome = self.outcome(parsed, query, category, limit);
        tracing::debug!(
            store = %self.store_name,
            kept = outcome.products.len(),
            dropped = outcome.dropped,
            "feed parsed"
        );
        outcome
    }

    async fn test_connection(&self) -> bool {
        let outcome = self.fetch_products(None, None, 1).await;
        outcome.is_success() && !outcome.products.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use pricewatch_core::parse_stores;

    use super::*;

    fn store(adapter: &str, settings: &str) -> StoreConfig {
        let yaml = format!(
            "stores:\n  - key: s\n    name: Tienda\n    url: https://tienda.example.mx\n    adapter: {adapter}\n    settings: {settings}\n"
        );
        parse_stores(&yaml).unwrap().stores.remove(0)
    }

    const FEED: &str = r#"{"data": {"products": [
        {"name": "Pantalla Samsung 55", "price": 8999, "url": "https://t/1", "category": "Electrónica"},
        {"name": "Pantalla LG 43", "price": "$6,499", "url": "https://t/2"},
        {"name": "Licuadora Oster", "price": 899, "url": "https://t/3", "category": "Hogar"},
        {"name": "", "price": 10, "url": "https://t/4"}
    ]}}"#;

    #[test]
    fn wrong_kind_is_rejected() {
        let err = FeedAdapter::from_config(&store("mercadolibre", "{}"), &HttpSettings::default())
            .err()
            .unwrap();
        assert!(matches!(err, IngestError::WrongAdapter { .. }));
    }

    #[test]
    fn blank_feed_url_counts_as_missing() {
        let adapter = FeedAdapter::from_config(
            &store("json_feed", "{feed_url: '  '}"),
            &HttpSettings::default(),
        )
        .unwrap();
        assert!(adapter.feed_url().is_none());
    }

    #[test]
    fn content_is_filtered_by_query_case_insensitively() {
        let adapter = nested_feed_adapter();
        let outcome = adapter.products_from_content(FEED, Some("PANTALLA"), None, 10);
        let names: Vec<_> = outcome.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Pantalla Samsung 55", "Pantalla LG 43"]);
    }

    fn nested_feed_adapter() -> FeedAdapter {
        FeedAdapter::from_config(
            &store("json_feed", "{product_path: data.products}"),
            &HttpSettings::default(),
        )
        .unwrap()
    }

    #[test]
    fn category_filter_requires_a_category() {
        let adapter = nested_feed_adapter();
        let outcome = adapter.products_from_content(FEED, None, Some("electr"), 10);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(outcome.products[0].name, "Pantalla Samsung 55");
    }

    #[test]
    fn unfiltered_content_is_validated_and_truncated() {
        let adapter = nested_feed_adapter();
        let outcome = adapter.products_from_content(FEED, None, None, 2);
        assert_eq!(outcome.products.len(), 2);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.status, FetchStatus::Complete);
    }

    #[test]
    fn nested_array_without_product_path_is_not_found() {
        let adapter =
            FeedAdapter::from_config(&store("json_feed", "{}"), &HttpSettings::default()).unwrap();
        let outcome = adapter.products_from_content(FEED, None, None, 10);
        assert!(outcome.products.is_empty());
        assert_eq!(outcome.status, FetchStatus::Complete);
    }

    #[test]
    fn unparseable_content_fails() {
        let adapter =
            FeedAdapter::from_config(&store("json_feed", "{}"), &HttpSettings::default()).unwrap();
        let outcome = adapter.products_from_content("not json", None, None, 10);
        assert!(matches!(outcome.status, FetchStatus::Failed(_)));
    }

    #[test]
    fn csv_feed_honors_column_mapping() {
        let adapter = FeedAdapter::from_config(
            &store(
                "csv_feed",
                "{column_mapping: {name: descripcion, price: precio, url: liga}}",
            ),
            &HttpSettings::default(),
        )
        .unwrap();
        let content = "descripcion,precio,liga\nHorno de microondas,1899,https://t/m\n";
        let outcome = adapter.products_from_content(content, Some("horno"), None, 5);
        assert_eq!(outcome.products.len(), 1);
        assert_eq!(adapter.parser().format().to_string(), "csv");
    }
}
