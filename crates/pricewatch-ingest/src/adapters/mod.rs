//! Store adapters: one implementation of [`StoreAdapter`] per provider kind.
//!
//! Adapters never return errors from [`StoreAdapter::fetch_products`]. Every
//! failure path ends in a [`FetchOutcome`] whose [`FetchStatus`] says what
//! happened, carrying whatever valid records were obtained.

pub mod amazon;
pub mod feed;
pub mod mercadolibre;
mod sigv4;
pub mod unsupported;

use async_trait::async_trait;
use pricewatch_core::{validate_products, AdapterKind, Product, StoreConfig};

use crate::client::HttpSettings;
use crate::error::IngestError;

pub use amazon::AmazonPaapiAdapter;
pub use feed::FeedAdapter;
pub use mercadolibre::{MercadoLibreAdapter, MlCategory};
pub use unsupported::UnsupportedAdapter;

/// How a fetch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchStatus {
    /// Every request succeeded.
    Complete,
    /// Some requests succeeded before one failed; records are kept.
    Partial(String),
    /// Required settings or credentials are absent.
    NotConfigured(String),
    /// No integration exists for this provider.
    Unsupported(String),
    /// Nothing could be fetched.
    Failed(String),
}

impl std::fmt::Display for FetchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchStatus::Complete => write!(f, "complete"),
            FetchStatus::Partial(reason) => write!(f, "partial: {reason}"),
            FetchStatus::NotConfigured(reason) => write!(f, "not configured: {reason}"),
            FetchStatus::Unsupported(reason) => write!(f, "unsupported: {reason}"),
            FetchStatus::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

/// Result of [`StoreAdapter::fetch_products`]: validated records plus status.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub products: Vec<Product>,
    pub status: FetchStatus,
    /// Records removed by validation.
    pub dropped: usize,
}

impl FetchOutcome {
    /// Validates `candidates`, truncates to `limit`, and records the drop count.
    #[must_use]
    pub fn validated(candidates: Vec<Product>, limit: usize, status: FetchStatus) -> Self {
        let total = candidates.len();
        let mut products = validate_products(candidates);
        let dropped = total - products.len();
        products.truncate(limit);
        Self {
            products,
            status,
            dropped,
        }
    }

    #[must_use]
    pub fn empty(status: FetchStatus) -> Self {
        Self {
            products: Vec::new(),
            status,
            dropped: 0,
        }
    }

    #[must_use]
    pub fn not_configured(reason: impl Into<String>) -> Self {
        Self::empty(FetchStatus::NotConfigured(reason.into()))
    }

    #[must_use]
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::empty(FetchStatus::Failed(reason.into()))
    }

    /// `true` for `Complete` and `Partial`.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.status, FetchStatus::Complete | FetchStatus::Partial(_))
    }
}

/// A provider that can be searched for products.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    /// Display name, matching the persisted store.
    fn store_name(&self) -> &str;

    /// Public storefront URL.
    fn store_url(&self) -> &str;

    /// Fetches up to `limit` validated records matching `query`/`category`.
    async fn fetch_products(
        &self,
        query: Option<&str>,
        category: Option<&str>,
        limit: usize,
    ) -> FetchOutcome;

    /// Cheap reachability check; `false` on any failure.
    async fn test_connection(&self) -> bool;
}

/// Builds the adapter for a configured store.
///
/// # Errors
///
/// Returns [`IngestError::Http`] if an HTTP client cannot be constructed.
pub fn build_adapter(
    store: &StoreConfig,
    http: &HttpSettings,
) -> Result<Box<dyn StoreAdapter>, IngestError> {
    Ok(match store.adapter {
        AdapterKind::Mercadolibre => Box::new(MercadoLibreAdapter::from_config(store, http)?),
        AdapterKind::JsonFeed | AdapterKind::XmlFeed | AdapterKind::CsvFeed => {
            Box::new(FeedAdapter::from_config(store, http)?)
        }
        AdapterKind::AmazonPaapi => Box::new(AmazonPaapiAdapter::from_config(store, http)?),
        AdapterKind::Unsupported => Box::new(UnsupportedAdapter::from_config(store)),
    })
}
