//! Database operations for the `categories` table.

use chrono::{DateTime, Utc};
use pricewatch_core::slugify;
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};

use crate::DbError;

/// A row from the `categories` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Returns the category named `name`, creating it with a slug derived from
/// the name if absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert or fetch fails, including when a
/// different category already owns the derived slug.
pub async fn get_or_create_category(pool: &SqlitePool, name: &str) -> Result<CategoryRow, DbError> {
    let mut conn = pool.acquire().await?;
    ensure_category(&mut conn, name).await
}

/// [`get_or_create_category`] on a caller-owned connection or transaction.
pub(crate) async fn ensure_category(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<CategoryRow, DbError> {
    let inserted = sqlx::query(
        "INSERT INTO categories (name, slug) VALUES (?1, ?2) ON CONFLICT (name) DO NOTHING",
    )
    .bind(name)
    .bind(slugify(name))
    .execute(&mut *conn)
    .await?;
    if inserted.rows_affected() > 0 {
        tracing::debug!(category = name, "inserted category");
    }

    let row = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, slug, description, created_at FROM categories WHERE name = ?1",
    )
    .bind(name)
    .fetch_one(&mut *conn)
    .await?;

    Ok(row)
}

/// Returns all categories, ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_categories(pool: &SqlitePool) -> Result<Vec<CategoryRow>, DbError> {
    let rows = sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, slug, description, created_at FROM categories ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no category has the given `id`, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn get_category(pool: &SqlitePool, id: i64) -> Result<CategoryRow, DbError> {
    sqlx::query_as::<_, CategoryRow>(
        "SELECT id, name, slug, description, created_at FROM categories WHERE id = ?1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}
