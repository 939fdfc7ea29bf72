//! The `search` command: a local view of what the query API serves.

use pricewatch_db::{ProductPage, ProductSearch};
use sqlx::SqlitePool;

/// Runs `search` and prints the page as JSON.
///
/// # Errors
///
/// Returns an error if the price range is inverted or the query fails.
pub(crate) async fn run_search(pool: &SqlitePool, search: &ProductSearch) -> anyhow::Result<()> {
    if let (Some(min), Some(max)) = (search.min_price, search.max_price) {
        if min > max {
            anyhow::bail!("--min-price ({min}) is greater than --max-price ({max})");
        }
    }

    let page: ProductPage = pricewatch_db::search_products(pool, search).await?;
    tracing::debug!(
        total = page.pagination.total,
        page = page.pagination.page,
        "search complete"
    );
    println!("{}", serde_json::to_string_pretty(&page)?);
    Ok(())
}
