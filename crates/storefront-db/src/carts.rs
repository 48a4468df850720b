//! Database operations for `cart_items`.
//!
//! Cart stock checks are advisory (the checkout transaction re-validates
//! under lock); they exist to fail fast on obviously unfillable carts.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use crate::DbError;

/// A cart line joined with its product's display fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CartLine {
    pub id: i64,
    pub product_id: i64,
    pub product_name: String,
    pub product_slug: String,
    pub unit_price: Decimal,
    pub stock: i32,
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
}

/// Why a cart mutation was refused.
#[derive(Debug, Error)]
pub enum CartError {
    #[error("Product not found")]
    ProductNotFound,
    #[error("Insufficient stock for {product}")]
    InsufficientStock { product: String },
    #[error("Product is not in the cart")]
    NotInCart,
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for CartError {
    fn from(e: sqlx::Error) -> Self {
        CartError::Db(DbError::Sqlx(e))
    }
}

const CART_LINE_SQL: &str = "SELECT c.id, c.product_id, p.name AS product_name, p.slug AS product_slug, \
            p.price AS unit_price, p.stock, c.quantity, c.created_at \
     FROM cart_items c \
     JOIN products p ON p.id = c.product_id";

/// Returns the user's cart lines, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cart(pool: &PgPool, user_id: i64) -> Result<Vec<CartLine>, DbError> {
    let sql = format!("{CART_LINE_SQL} WHERE c.user_id = $1 ORDER BY c.created_at DESC");
    let rows = sqlx::query_as::<_, CartLine>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Adds a quantity of a product to the cart, merging with any existing line.
///
/// # Errors
///
/// Returns [`CartError::ProductNotFound`] or [`CartError::InsufficientStock`]
/// when the combined quantity cannot be fulfilled, or a storage error.
pub async fn add_to_cart(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<CartLine, CartError> {
    let product: Option<(String, i32)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = $1 AND is_active = true")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    let (name, stock) = product.ok_or(CartError::ProductNotFound)?;

    let existing: Option<i32> =
        sqlx::query_scalar("SELECT quantity FROM cart_items WHERE user_id = $1 AND product_id = $2")
            .bind(user_id)
            .bind(product_id)
            .fetch_optional(pool)
            .await?;

    if stock < existing.unwrap_or(0) + quantity {
        return Err(CartError::InsufficientStock { product: name });
    }

    let line_id: i64 = sqlx::query_scalar(
        "INSERT INTO cart_items (user_id, product_id, quantity) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (user_id, product_id) DO UPDATE SET \
             quantity = cart_items.quantity + EXCLUDED.quantity, \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(pool)
    .await?;

    let sql = format!("{CART_LINE_SQL} WHERE c.id = $1");
    let line = sqlx::query_as::<_, CartLine>(&sql)
        .bind(line_id)
        .fetch_one(pool)
        .await?;
    Ok(line)
}

/// Replaces the quantity of an existing cart line.
///
/// # Errors
///
/// Returns [`CartError::NotInCart`] if the product has no line, or
/// [`CartError::InsufficientStock`] when the quantity cannot be fulfilled.
pub async fn set_cart_quantity(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<CartLine, CartError> {
    let product: Option<(String, i32)> =
        sqlx::query_as("SELECT name, stock FROM products WHERE id = $1 AND is_active = true")
            .bind(product_id)
            .fetch_optional(pool)
            .await?;
    let (name, stock) = product.ok_or(CartError::ProductNotFound)?;

    if stock < quantity {
        return Err(CartError::InsufficientStock { product: name });
    }

    let line_id: Option<i64> = sqlx::query_scalar(
        "UPDATE cart_items SET quantity = $3, updated_at = NOW() \
         WHERE user_id = $1 AND product_id = $2 \
         RETURNING id",
    )
    .bind(user_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_optional(pool)
    .await?;
    let line_id = line_id.ok_or(CartError::NotInCart)?;

    let sql = format!("{CART_LINE_SQL} WHERE c.id = $1");
    let line = sqlx::query_as::<_, CartLine>(&sql)
        .bind(line_id)
        .fetch_one(pool)
        .await?;
    Ok(line)
}

/// Removes a product from the cart.
///
/// # Errors
///
/// Returns [`CartError::NotInCart`] if the product has no line.
pub async fn remove_from_cart(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
) -> Result<(), CartError> {
    let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CartError::NotInCart);
    }
    Ok(())
}

/// Empties the user's cart.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn clear_cart(pool: &PgPool, user_id: i64) -> Result<(), DbError> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(())
}
