//! Database operations for `comparisons` and the `comparison_products` join
//! table (the many-to-many between comparisons and products).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use thiserror::Error;

use crate::{products::ProductRow, DbError};

/// A row from the `comparisons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ComparisonRow {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// A comparison with its member products.
#[derive(Debug, Clone)]
pub struct ComparisonDetails {
    pub comparison: ComparisonRow,
    pub products: Vec<ProductRow>,
}

/// Why a comparison mutation was refused.
#[derive(Debug, Error)]
pub enum ComparisonError {
    #[error("Comparison not found")]
    ComparisonNotFound,
    #[error("Product not found")]
    ProductNotFound,
    #[error("Product is already in the comparison")]
    AlreadyAdded,
    #[error("Product is not in the comparison")]
    NotInComparison,
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for ComparisonError {
    fn from(e: sqlx::Error) -> Self {
        ComparisonError::Db(DbError::Sqlx(e))
    }
}

/// Creates a comparison for a user.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn create_comparison(
    pool: &PgPool,
    user_id: i64,
    name: &str,
) -> Result<ComparisonRow, DbError> {
    let row = sqlx::query_as::<_, ComparisonRow>(
        "INSERT INTO comparisons (user_id, name) VALUES ($1, $2) \
         RETURNING id, user_id, name, created_at",
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns a user's comparisons, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_comparisons(pool: &PgPool, user_id: i64) -> Result<Vec<ComparisonRow>, DbError> {
    let rows = sqlx::query_as::<_, ComparisonRow>(
        "SELECT id, user_id, name, created_at \
         FROM comparisons \
         WHERE user_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns a comparison with its products, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn get_comparison(
    pool: &PgPool,
    comparison_id: i64,
) -> Result<Option<ComparisonDetails>, DbError> {
    let comparison = sqlx::query_as::<_, ComparisonRow>(
        "SELECT id, user_id, name, created_at FROM comparisons WHERE id = $1",
    )
    .bind(comparison_id)
    .fetch_optional(pool)
    .await?;

    let Some(comparison) = comparison else {
        return Ok(None);
    };

    let products = sqlx::query_as::<_, ProductRow>(
        "SELECT p.id, p.name, p.slug, p.sku, p.description, p.price, p.original_price, \
                p.stock, p.sold_count, p.average_rating, p.review_count, p.brand_id, \
                p.category_id, p.is_active, p.is_featured, p.created_at, p.updated_at \
         FROM comparison_products cp \
         JOIN products p ON p.id = cp.product_id \
         WHERE cp.comparison_id = $1 \
         ORDER BY cp.added_at",
    )
    .bind(comparison_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(ComparisonDetails {
        comparison,
        products,
    }))
}

/// Adds a product to a comparison.
///
/// # Errors
///
/// Returns [`ComparisonError::ComparisonNotFound`],
/// [`ComparisonError::ProductNotFound`], or [`ComparisonError::AlreadyAdded`]
/// as appropriate.
pub async fn add_comparison_product(
    pool: &PgPool,
    comparison_id: i64,
    product_id: i64,
) -> Result<(), ComparisonError> {
    let comparison: Option<i64> = sqlx::query_scalar("SELECT id FROM comparisons WHERE id = $1")
        .bind(comparison_id)
        .fetch_optional(pool)
        .await?;
    if comparison.is_none() {
        return Err(ComparisonError::ComparisonNotFound);
    }

    let product: Option<i64> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND is_active = true")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    if product.is_none() {
        return Err(ComparisonError::ProductNotFound);
    }

    sqlx::query("INSERT INTO comparison_products (comparison_id, product_id) VALUES ($1, $2)")
        .bind(comparison_id)
        .bind(product_id)
        .execute(pool)
        .await
        .map_err(|e| {
            let e = DbError::from(e);
            if e.is_unique_violation() {
                ComparisonError::AlreadyAdded
            } else {
                ComparisonError::Db(e)
            }
        })?;
    Ok(())
}

/// Removes a product from a comparison.
///
/// # Errors
///
/// Returns [`ComparisonError::NotInComparison`] if the pair does not exist.
pub async fn remove_comparison_product(
    pool: &PgPool,
    comparison_id: i64,
    product_id: i64,
) -> Result<(), ComparisonError> {
    let result =
        sqlx::query("DELETE FROM comparison_products WHERE comparison_id = $1 AND product_id = $2")
            .bind(comparison_id)
            .bind(product_id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(ComparisonError::NotInComparison);
    }
    Ok(())
}

/// Deletes a comparison and, through the cascade, its join rows.
///
/// # Errors
///
/// Returns [`ComparisonError::ComparisonNotFound`] if it does not exist.
pub async fn delete_comparison(pool: &PgPool, comparison_id: i64) -> Result<(), ComparisonError> {
    let result = sqlx::query("DELETE FROM comparisons WHERE id = $1")
        .bind(comparison_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ComparisonError::ComparisonNotFound);
    }
    Ok(())
}
