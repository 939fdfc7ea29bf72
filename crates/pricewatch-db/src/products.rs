//! Database operations for `products`: batch upsert reconciliation and the
//! read queries behind product search and store/category listings.

use chrono::{DateTime, Utc};
use pricewatch_core::{Product, DEFAULT_CURRENCY};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};

use crate::categories::{ensure_category, get_category};
use crate::stores::{ensure_store, get_store};
use crate::DbError;

const DEFAULT_PER_PAGE: u32 = 20;
const MAX_PER_PAGE: u32 = 100;

const PRODUCT_SELECT: &str = "SELECT p.id, p.store_id, s.name AS store_name, p.category_id, \
            p.name, p.price, p.currency, p.store_url, p.image_url, p.sku, p.available, \
            p.last_updated, p.created_at \
     FROM products p \
     JOIN stores s ON s.id = p.store_id";

// ---------------------------------------------------------------------------
// Row and parameter types
// ---------------------------------------------------------------------------

/// A row from the `products` table, with its store name joined in.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub store_id: i64,
    pub store_name: String,
    pub category_id: Option<i64>,
    pub name: String,
    pub price: f64,
    pub currency: String,
    pub store_url: String,
    pub image_url: String,
    pub sku: Option<String>,
    pub available: bool,
    pub last_updated: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Counts from one [`upsert_products`] batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpsertReport {
    pub inserted: usize,
    pub updated: usize,
}

/// Filters and paging for [`search_products`]. `page` is 1-based.
#[derive(Debug, Clone)]
pub struct ProductSearch {
    /// Case-insensitive substring of the product name.
    pub query: Option<String>,
    pub store_id: Option<i64>,
    pub category_id: Option<i64>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ProductSearch {
    fn default() -> Self {
        Self {
            query: None,
            store_id: None,
            category_id: None,
            min_price: None,
            max_price: None,
            page: 1,
            per_page: DEFAULT_PER_PAGE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageMeta {
    pub page: u32,
    pub per_page: u32,
    pub total: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductPage {
    pub products: Vec<ProductRow>,
    pub pagination: PageMeta,
}

/// Input record for [`bulk_create_products`].
#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub store_id: i64,
    #[serde(default)]
    pub category_id: Option<i64>,
    pub name: String,
    pub store_url: String,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_available")]
    pub available: bool,
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_available() -> bool {
    true
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkCreateReport {
    pub created: usize,
    pub failed: usize,
    pub errors: Vec<String>,
}

// ---------------------------------------------------------------------------
// Upsert reconciliation
// ---------------------------------------------------------------------------

/// Merges a batch of validated records into `products` for one store.
///
/// Records with a `sku` are matched on `(store_id, sku)`: a match is updated
/// in place (name, price, currency, URLs, availability, `last_updated`, and
/// the category when one is given), otherwise a row is inserted. Records
/// without a `sku` are always inserted.
///
/// The batch runs in a single transaction. Any failure rolls back every row
/// of the batch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails; nothing
/// from the batch is persisted in that case.
pub async fn upsert_products(
    pool: &SqlitePool,
    store_id: i64,
    category_id: Option<i64>,
    products: &[Product],
) -> Result<UpsertReport, DbError> {
    if products.is_empty() {
        return Ok(UpsertReport::default());
    }

    let mut tx = pool.begin().await?;
    let report = upsert_rows(&mut tx, store_id, category_id, products).await?;
    tx.commit().await?;
    Ok(report)
}

/// One store x query batch as an ingestion run persists it.
#[derive(Debug, Clone, Copy)]
pub struct StoreBatch<'a> {
    pub store_name: &'a str,
    pub store_url: &'a str,
    /// Category name mapped from the query, created if absent.
    pub category: Option<&'a str>,
    pub products: &'a [Product],
}

/// Persists a batch together with the store and category rows it needs.
///
/// The store and category are created inside the same transaction as the
/// product rows, so a rolled-back batch leaves neither behind. An empty batch
/// touches nothing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails; nothing
/// from the batch is persisted in that case.
pub async fn ingest_batch(
    pool: &SqlitePool,
    batch: &StoreBatch<'_>,
) -> Result<UpsertReport, DbError> {
    if batch.products.is_empty() {
        return Ok(UpsertReport::default());
    }

    let mut tx = pool.begin().await?;
    let store = ensure_store(&mut tx, batch.store_name, batch.store_url).await?;
    let category_id = match batch.category {
        Some(name) => Some(ensure_category(&mut tx, name).await?.id),
        None => None,
    };
    let report = upsert_rows(&mut tx, store.id, category_id, batch.products).await?;
    tx.commit().await?;
    Ok(report)
}

async fn upsert_rows(
    conn: &mut SqliteConnection,
    store_id: i64,
    category_id: Option<i64>,
    products: &[Product],
) -> Result<UpsertReport, DbError> {
    let mut report = UpsertReport::default();
    let now = Utc::now();

    for product in products {
        let existing: Option<i64> = match product.sku.as_deref() {
            Some(sku) => {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM products WHERE store_id = ?1 AND sku = ?2 ORDER BY id LIMIT 1",
                )
                .bind(store_id)
                .bind(sku)
                .fetch_optional(&mut *conn)
                .await?
            }
            None => None,
        };

        match existing {
            Some(id) => {
                sqlx::query(
                    "UPDATE products SET \
                         name         = ?1, \
                         price        = ?2, \
                         currency     = ?3, \
                         store_url    = ?4, \
                         image_url    = ?5, \
                         available    = ?6, \
                         category_id  = COALESCE(?7, category_id), \
                         last_updated = ?8 \
                     WHERE id = ?9",
                )
                .bind(&product.name)
                .bind(product.price)
                .bind(&product.currency)
                .bind(&product.store_url)
                .bind(&product.image_url)
                .bind(product.available)
                .bind(category_id)
                .bind(now)
                .bind(id)
                .execute(&mut *conn)
                .await?;
                report.updated += 1;
            }
            None => {
                sqlx::query(
                    "INSERT INTO products \
                         (store_id, category_id, name, price, currency, store_url, image_url, \
                          sku, available, last_updated, created_at) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
                )
                .bind(store_id)
                .bind(category_id)
                .bind(&product.name)
                .bind(product.price)
                .bind(&product.currency)
                .bind(&product.store_url)
                .bind(&product.image_url)
                .bind(&product.sku)
                .bind(product.available)
                .bind(now)
                .execute(&mut *conn)
                .await?;
                report.inserted += 1;
            }
        }
    }

    Ok(report)
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

/// Escapes LIKE wildcards and wraps the term for substring matching.
fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

fn page_meta(page: u32, per_page: u32, total: i64) -> PageMeta {
    let per = i64::from(per_page);
    PageMeta {
        page,
        per_page,
        total,
        total_pages: (total + per - 1) / per,
    }
}

/// Searches products, cheapest first.
///
/// `page` below 1 is treated as 1; `per_page` is clamped to `1..=100`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if a query fails.
pub async fn search_products(
    pool: &SqlitePool,
    search: &ProductSearch,
) -> Result<ProductPage, DbError> {
    const FILTERS: &str = " WHERE (?1 IS NULL OR p.name LIKE ?1 ESCAPE '\\') \
           AND (?2 IS NULL OR p.store_id = ?2) \
           AND (?3 IS NULL OR p.category_id = ?3) \
           AND (?4 IS NULL OR p.price >= ?4) \
           AND (?5 IS NULL OR p.price <= ?5)";

    let page = search.page.max(1);
    let per_page = search.per_page.clamp(1, MAX_PER_PAGE);
    let pattern = search
        .query
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .map(like_pattern);

    let count_sql = format!("SELECT COUNT(*) FROM products p{FILTERS}");
    let total: i64 = sqlx::query_scalar::<_, i64>(&count_sql)
        .bind(&pattern)
        .bind(search.store_id)
        .bind(search.category_id)
        .bind(search.min_price)
        .bind(search.max_price)
        .fetch_one(pool)
        .await?;

    let select_sql = format!("{PRODUCT_SELECT}{FILTERS} ORDER BY p.price ASC, p.id ASC LIMIT ?6 OFFSET ?7");
    let products = sqlx::query_as::<_, ProductRow>(&select_sql)
        .bind(&pattern)
        .bind(search.store_id)
        .bind(search.category_id)
        .bind(search.min_price)
        .bind(search.max_price)
        .bind(i64::from(per_page))
        .bind(i64::from(page - 1) * i64::from(per_page))
        .fetch_all(pool)
        .await?;

    Ok(ProductPage {
        products,
        pagination: page_meta(page, per_page, total),
    })
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no product has the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &SqlitePool, id: i64) -> Result<ProductRow, DbError> {
    let sql = format!("{PRODUCT_SELECT} WHERE p.id = ?1");
    sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Products of one store, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the store does not exist, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn list_store_products(
    pool: &SqlitePool,
    store_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, DbError> {
    get_store(pool, store_id).await?;

    let sql = format!("{PRODUCT_SELECT} WHERE p.store_id = ?1 ORDER BY p.id LIMIT ?2 OFFSET ?3");
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(store_id)
        .bind(limit.clamp(1, i64::from(MAX_PER_PAGE)))
        .bind(offset.max(0))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Products assigned to one category, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the category does not exist, or
/// [`DbError::Sqlx`] if a query fails.
pub async fn list_category_products(
    pool: &SqlitePool,
    category_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Vec<ProductRow>, DbError> {
    get_category(pool, category_id).await?;

    let sql =
        format!("{PRODUCT_SELECT} WHERE p.category_id = ?1 ORDER BY p.id LIMIT ?2 OFFSET ?3");
    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(category_id)
        .bind(limit.clamp(1, i64::from(MAX_PER_PAGE)))
        .bind(offset.max(0))
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

// ---------------------------------------------------------------------------
// Bulk create
// ---------------------------------------------------------------------------

/// Inserts each record independently; one failure does not affect the
/// others. Errors are reported per record as `"<index> (<name>): <reason>"`.
pub async fn bulk_create_products(pool: &SqlitePool, products: &[NewProduct]) -> BulkCreateReport {
    let mut report = BulkCreateReport::default();
    let now = Utc::now();

    for (index, product) in products.iter().enumerate() {
        let result = sqlx::query(
            "INSERT INTO products \
                 (store_id, category_id, name, price, currency, store_url, image_url, \
                  sku, available, last_updated, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)",
        )
        .bind(product.store_id)
        .bind(product.category_id)
        .bind(&product.name)
        .bind(product.price)
        .bind(&product.currency)
        .bind(&product.store_url)
        .bind(product.image_url.as_deref().unwrap_or_default())
        .bind(&product.sku)
        .bind(product.available)
        .bind(now)
        .execute(pool)
        .await;

        match result {
            Ok(_) => report.created += 1,
            Err(e) => {
                report.failed += 1;
                report.errors.push(format!("{index} ({}): {e}", product.name));
            }
        }
    }

    report
}
