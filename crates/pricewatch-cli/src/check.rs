//! The `check` and `categories` commands: live provider probes that never
//! touch the database.

use pricewatch_core::{AdapterKind, StoreConfig};
use pricewatch_ingest::{build_adapter, HtmlFetcher, HttpSettings, MercadoLibreAdapter};

/// Result of probing one store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum CheckResult {
    Connected,
    Unreachable,
    /// No integration, but the storefront answered with `bytes` of HTML.
    StorefrontOnly { bytes: usize },
    /// No integration and the storefront probe failed too.
    StorefrontDown(String),
}

impl std::fmt::Display for CheckResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CheckResult::Connected => write!(f, "ok"),
            CheckResult::Unreachable => write!(f, "FAILED"),
            CheckResult::StorefrontOnly { bytes } => {
                write!(f, "no integration; storefront reachable ({bytes} bytes)")
            }
            CheckResult::StorefrontDown(reason) => {
                write!(f, "no integration; storefront unreachable: {reason}")
            }
        }
    }
}

/// Probes one store. `unsupported` stores are probed through the HTML
/// fetch path with its bounded retries; every other kind runs the
/// adapter's connection test.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built.
pub(crate) async fn check_store(
    store: &StoreConfig,
    http: &HttpSettings,
) -> anyhow::Result<CheckResult> {
    if store.adapter == AdapterKind::Unsupported {
        let fetcher = HtmlFetcher::new(http)?;
        return Ok(match fetcher.probe(&store.url).await {
            Ok(bytes) => CheckResult::StorefrontOnly { bytes },
            Err(e) => {
                tracing::warn!(store = %store.name, error = %e, "storefront probe failed");
                CheckResult::StorefrontDown(e.to_string())
            }
        });
    }

    let adapter = build_adapter(store, http)?;
    Ok(if adapter.test_connection().await {
        CheckResult::Connected
    } else {
        CheckResult::Unreachable
    })
}

/// Runs [`check_store`] for each store and prints one line per store.
///
/// # Errors
///
/// Returns an error if an HTTP client cannot be built or any store with an
/// integration failed its connection test.
pub(crate) async fn run_check(stores: &[StoreConfig], http: &HttpSettings) -> anyhow::Result<()> {
    let mut failed = Vec::new();

    for store in stores {
        let result = check_store(store, http).await?;
        println!("{:<16} {:<14} {result}", store.key, store.adapter.to_string());
        if result == CheckResult::Unreachable {
            failed.push(store.key.as_str());
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("connection check failed for: {}", failed.join(", "));
    }
    Ok(())
}

/// Prints the provider's category tree for a Mercado Libre store.
///
/// # Errors
///
/// Returns an error if the store is not a Mercado Libre store or the
/// request fails.
pub(crate) async fn run_categories(store: &StoreConfig, http: &HttpSettings) -> anyhow::Result<()> {
    if store.adapter != AdapterKind::Mercadolibre {
        anyhow::bail!(
            "store '{}' uses the {} adapter; categories are only available for mercadolibre",
            store.key,
            store.adapter
        );
    }

    let adapter = MercadoLibreAdapter::from_config(store, http)?;
    let categories = adapter.list_categories().await?;
    for category in &categories {
        println!("{:<12} {}", category.id, category.name);
    }
    tracing::info!(store = %store.name, count = categories.len(), "listed categories");
    Ok(())
}
