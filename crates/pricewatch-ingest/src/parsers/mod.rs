//! Format parsers turning JSON, XML and CSV feed content into [`Product`]s.
//!
//! Field lookup is table-driven: each logical [`Field`] has an ordered alias
//! list, and a store may supply an explicit mapping that takes precedence.
//! Parsers do not validate; adapters run the records through
//! [`pricewatch_core::validate_products`] afterwards.

pub mod csv;
pub mod json;
pub mod xml;

use std::collections::BTreeMap;

use pricewatch_core::{clean_name, Product, DEFAULT_CURRENCY};

use crate::client::ApiClient;
use crate::error::IngestError;

pub use self::csv::CsvFeedParser;
pub use self::json::{to_feed_json, JsonFeedParser};
pub use self::xml::XmlFeedParser;

/// A logical product field resolvable from a raw record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Name,
    Price,
    Url,
    Image,
    Category,
    Sku,
    Currency,
    Available,
}

impl Field {
    /// Key used in explicit column mappings and as the exact-match fallback.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Field::Name => "name",
            Field::Price => "price",
            Field::Url => "url",
            Field::Image => "image",
            Field::Category => "category",
            Field::Sku => "sku",
            Field::Currency => "currency",
            Field::Available => "available",
        }
    }

    /// Common source names, tried in order.
    #[must_use]
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Name => &["name", "title", "product_name", "productName", "product_title"],
            Field::Price => &["price", "cost", "amount", "precio", "product_price"],
            Field::Url => &["url", "link", "product_url", "productUrl", "product_link"],
            Field::Image => &[
                "image",
                "image_url",
                "imageUrl",
                "image_link",
                "thumbnail",
                "product_image",
            ],
            Field::Category => &["category", "product_category", "product_type", "productType"],
            Field::Sku => &["sku", "id", "product_id", "productId", "product_sku"],
            Field::Currency => &["currency", "currency_id", "currencyCode"],
            Field::Available => &["available", "availability", "in_stock", "inStock"],
        }
    }
}

/// Explicit field-to-source-key overrides, e.g. `price -> precio_venta`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMapping(BTreeMap<String, String>);

impl FieldMapping {
    #[must_use]
    pub fn new(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }

    /// Resolves `field` using `get`: explicit mapping, then aliases, then the
    /// exact field key. `get` returns `None` for absent or blank values.
    pub fn resolve<T>(&self, field: Field, get: impl Fn(&str) -> Option<T>) -> Option<T> {
        if let Some(found) = self.0.get(field.key()).and_then(|key| get(key)) {
            return Some(found);
        }
        field
            .aliases()
            .iter()
            .find_map(|alias| get(alias))
            .or_else(|| get(field.key()))
    }
}

/// Parses a price string, stripping `$`, `MXN` and thousands commas.
///
/// Returns `None` unless the result is a finite number greater than zero.
#[must_use]
pub fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .replace("MXN", "")
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Interprets common stock flags. Unknown values are `None`.
#[must_use]
pub fn parse_available(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "si" | "sí" | "in stock" | "in_stock" | "instock" => Some(true),
        "false" | "0" | "no" | "out of stock" | "out_of_stock" | "outofstock" => Some(false),
        other => other.parse::<f64>().ok().map(|n| n > 0.0),
    }
}

/// Raw per-record values after field resolution, before validation.
#[derive(Debug, Default)]
pub(crate) struct RawFields {
    pub name: Option<String>,
    pub price: Option<String>,
    pub price_value: Option<f64>,
    pub url: Option<String>,
    pub image: Option<String>,
    pub category: Option<String>,
    pub sku: Option<String>,
    pub currency: Option<String>,
    pub available: Option<bool>,
}

impl RawFields {
    /// Builds a record, or explains why the item was skipped.
    ///
    /// Only an unusable price skips the item here; a missing name or URL
    /// becomes an empty string and is dropped later by validation.
    pub(crate) fn into_product(self, store_name: &str) -> Result<Product, String> {
        let price = match (self.price_value, self.price.as_deref()) {
            (Some(value), _) if value.is_finite() && value > 0.0 => value,
            (None, Some(raw)) => parse_price(raw).ok_or_else(|| format!("unparseable price '{raw}'"))?,
            (Some(value), _) => return Err(format!("non-positive price {value}")),
            (None, None) => return Err("missing price".to_string()),
        };

        Ok(Product {
            name: clean_name(self.name.as_deref().unwrap_or_default()),
            price,
            store_name: store_name.to_string(),
            store_url: self.url.unwrap_or_default(),
            image_url: self.image.unwrap_or_default(),
            category: self.category,
            sku: self.sku,
            currency: self
                .currency
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            available: self.available.unwrap_or(true),
        })
    }
}

/// Trims and discards blank strings.
pub(crate) fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Feed content format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedFormat {
    Json,
    Xml,
    Csv,
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FeedFormat::Json => write!(f, "json"),
            FeedFormat::Xml => write!(f, "xml"),
            FeedFormat::Csv => write!(f, "csv"),
        }
    }
}

/// One parser per feed format, configured for a single store.
#[derive(Debug, Clone)]
pub enum FeedParser {
    Json(JsonFeedParser),
    Xml(XmlFeedParser),
    Csv(CsvFeedParser),
}

impl FeedParser {
    #[must_use]
    pub fn format(&self) -> FeedFormat {
        match self {
            FeedParser::Json(_) => FeedFormat::Json,
            FeedParser::Xml(_) => FeedFormat::Xml,
            FeedParser::Csv(_) => FeedFormat::Csv,
        }
    }

    /// Parses local content.
    ///
    /// # Errors
    ///
    /// Returns an error only when the document as a whole is unreadable
    /// (malformed JSON, broken XML, unreadable CSV header). Bad items are
    /// logged and skipped.
    pub fn parse_str(&self, content: &str) -> Result<Vec<Product>, IngestError> {
        match self {
            FeedParser::Json(p) => p.parse_str(content),
            FeedParser::Xml(p) => p.parse_str(content),
            FeedParser::Csv(p) => p.parse_str(content),
        }
    }

    /// Downloads `url` through `client` (so the store's auth and rate limit
    /// apply) and parses the body.
    ///
    /// # Errors
    ///
    /// Transport errors and non-2xx statuses, plus everything
    /// [`Self::parse_str`] can return.
    pub async fn parse_from_url(
        &self,
        client: &ApiClient,
        url: &str,
    ) -> Result<Vec<Product>, IngestError> {
        let body = client.get_text(url, &[]).await?;
        self.parse_str(&body)
    }
}
