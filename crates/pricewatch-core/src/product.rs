use serde::{Deserialize, Serialize};

/// Currency assumed when a source does not state one.
pub const DEFAULT_CURRENCY: &str = "MXN";

/// A product listing normalized from any upstream source.
///
/// Every store adapter emits this shape regardless of whether the data came
/// from a search API, a JSON/XML/CSV feed, or a signed partner API. Records
/// are checked with [`Product::is_valid`] before they reach persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Display name with internal whitespace collapsed.
    pub name: String,
    /// Listing price in [`Product::currency`].
    pub price: f64,
    /// Name of the store the listing came from; matches a persisted store.
    pub store_name: String,
    /// Absolute URL of the listing page.
    pub store_url: String,
    /// Absolute image URL, or empty when the source has none.
    pub image_url: String,
    /// Free-text category label from the source.
    pub category: Option<String>,
    /// Provider-assigned identifier; `(store, sku)` is the dedup key.
    pub sku: Option<String>,
    /// Three-letter currency code.
    pub currency: String,
    /// Defaults to `true` when the source does not report stock.
    pub available: bool,
}

impl Product {
    /// Builds a record with the required fields and defaults for the rest
    /// (no image, no category, no SKU, `MXN`, available).
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        price: f64,
        store_name: impl Into<String>,
        store_url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            price,
            store_name: store_name.into(),
            store_url: store_url.into(),
            image_url: String::new(),
            category: None,
            sku: None,
            currency: DEFAULT_CURRENCY.to_string(),
            available: true,
        }
    }

    /// Returns `true` when the record may be persisted.
    ///
    /// A record is valid iff the name is non-blank, the price is a finite
    /// positive number, `store_url` is an absolute http(s) URL, and
    /// `image_url` is either empty or an absolute http(s) URL. Never panics.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        if self.name.trim().is_empty() {
            return false;
        }
        if !self.price.is_finite() || self.price <= 0.0 {
            return false;
        }
        if !is_http_url(&self.store_url) {
            return false;
        }
        self.image_url.is_empty() || is_http_url(&self.image_url)
    }
}

/// Keeps only valid records, preserving input order.
///
/// Invalid records are dropped silently; callers that need a count compare
/// lengths before and after.
#[must_use]
pub fn validate_products(products: Vec<Product>) -> Vec<Product> {
    products.into_iter().filter(Product::is_valid).collect()
}

/// Collapses runs of whitespace into single spaces and trims the ends.
#[must_use]
pub fn clean_name(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn is_http_url(value: &str) -> bool {
    let lower = value.trim().to_ascii_lowercase();
    ["http://", "https://"]
        .iter()
        .any(|scheme| lower.strip_prefix(scheme).is_some_and(|rest| !rest.is_empty()))
}
