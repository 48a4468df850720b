//! Database operations for `wishlist_items`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use crate::DbError;

/// A wishlist line joined with its product's display fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct WishlistLine {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_slug: String,
    pub price: Decimal,
    pub average_rating: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Why a wishlist mutation was refused.
#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("Product not found")]
    ProductNotFound,
    #[error("Product is already in the wishlist")]
    AlreadyInWishlist,
    #[error("Product is not in the wishlist")]
    NotInWishlist,
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for WishlistError {
    fn from(e: sqlx::Error) -> Self {
        WishlistError::Db(DbError::Sqlx(e))
    }
}

/// Returns the user's wishlist, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_wishlist(pool: &PgPool, user_id: i64) -> Result<Vec<WishlistLine>, DbError> {
    let rows = sqlx::query_as::<_, WishlistLine>(
        "SELECT w.id, w.product_id, p.name AS product_name, p.slug AS product_slug, \
                p.price, p.average_rating, w.created_at \
         FROM wishlist_items w \
         JOIN products p ON p.id = w.product_id \
         WHERE w.user_id = $1 \
         ORDER BY w.created_at DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Adds a product to the user's wishlist.
///
/// # Errors
///
/// Returns [`WishlistError::ProductNotFound`] for an unknown product, or
/// [`WishlistError::AlreadyInWishlist`] when the pair already exists.
pub async fn add_to_wishlist(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
) -> Result<(), WishlistError> {
    let exists: Option<i64> =
        sqlx::query_scalar("SELECT id FROM products WHERE id = $1 AND is_active = true")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    if exists.is_none() {
        return Err(WishlistError::ProductNotFound);
    }

    sqlx::query("INSERT INTO wishlist_items (user_id, product_id) VALUES ($1, $2)")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await
        .map_err(|e| {
            let e = DbError::from(e);
            if e.is_unique_violation() {
                WishlistError::AlreadyInWishlist
            } else {
                WishlistError::Db(e)
            }
        })?;
    Ok(())
}

/// Removes a product from the user's wishlist.
///
/// # Errors
///
/// Returns [`WishlistError::NotInWishlist`] if the pair does not exist.
pub async fn remove_from_wishlist(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
) -> Result<(), WishlistError> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(WishlistError::NotInWishlist);
    }
    Ok(())
}
