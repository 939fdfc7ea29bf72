use async_trait::async_trait;
use pricewatch_core::StoreConfig;

use super::{FetchOutcome, FetchStatus, StoreAdapter};

const DEFAULT_REASON: &str = "no integration available for this store";

/// Placeholder for stores with no usable integration. Always empty; never
/// touches the network.
pub struct UnsupportedAdapter {
    store_name: String,
    store_url: String,
    reason: String,
}

impl UnsupportedAdapter {
    #[must_use]
    pub fn from_config(store: &StoreConfig) -> Self {
        Self {
            store_name: store.name.clone(),
            store_url: store.url.clone(),
            reason: store
                .settings
                .reason
                .clone()
                .filter(|r| !r.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_REASON.to_string()),
        }
    }

    #[must_use]
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

#[async_trait]
impl StoreAdapter for UnsupportedAdapter {
    fn store_name(&self) -> &str {
        &self.store_name
    }

    fn store_url(&self) -> &str {
        &self.store_url
    }

    async fn fetch_products(
        &self,
        query: Option<&str>,
        _category: Option<&str>,
        _limit: usize,
    ) -> FetchOutcome {
        tracing::info!(
            store = %self.store_name,
            query = query.unwrap_or_default(),
            reason = %self.reason,
            "store has no integration, returning no products"
        );
        FetchOutcome::empty(FetchStatus::Unsupported(self.reason.clone()))
    }

    async fn test_connection(&self) -> bool {
        false
    }
}
