//! Database operations for the `stores` table.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `stores` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Returns the store named `name`, creating it with `url` if absent.
///
/// An existing store keeps its stored URL.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails.
pub async fn get_or_create_store(
    pool: &SqlitePool,
    name: &str,
    url: &str,
) -> Result<StoreRow, DbError> {
    let mut conn = pool.acquire().await?;
    ensure_store(&mut conn, name, url).await
}

/// [`get_or_create_store`] on a caller-owned connection or transaction.
pub(crate) async fn ensure_store(
    conn: &mut SqliteConnection,
    name: &str,
    url: &str,
) -> Result<StoreRow, DbError> {
    let inserted = sqlx::query("INSERT INTO stores (name, url) VALUES (?1, ?2) ON CONFLICT (name) DO NOTHING")
        .bind(name)
        .bind(url)
        .execute(&mut *conn)
        .await?;
    if inserted.rows_affected() > 0 {
        tracing::debug!(store = name, "inserted store");
    }

    let row = sqlx::query_as::<_, StoreRow>(
        "SELECT id, name, url, created_at FROM stores WHERE name = ?1",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Returns all stores, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stores(pool: &SqlitePool) -> Result<Vec<StoreRow>, DbError> {
    let rows = sqlx::query_as::<_, StoreRow>(
        "SELECT id, name, url, created_at FROM stores ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no store has the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_store(pool: &SqlitePool, id: i64) -> Result<StoreRow, DbError> {
    sqlx::query_as::<_, StoreRow>("SELECT id, name, url, created_at FROM stores WHERE id = ?1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}
