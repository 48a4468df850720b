//! Database operations for `orders` and `order_items`.
//!
//! Orders are created only by [`crate::checkout`]; after creation the only
//! mutable fields are `status` and `payment_status`. Items are exclusively
//! owned by their order (`ON DELETE CASCADE`).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use storefront_core::{domain::DomainError, OrderStatus};

use crate::{coupons::CouponRow, DbError};

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub order_number: String,
    pub user_id: i64,
    pub status: String,
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub tax_amount: Decimal,
    pub final_amount: Decimal,
    pub payment_method: String,
    pub payment_status: String,
    pub shipping_address: serde_json::Value,
    pub billing_address: serde_json::Value,
    pub coupon_id: Option<i64>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `order_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub discount: Decimal,
    pub total_price: Decimal,
    pub created_at: DateTime<Utc>,
}

/// An order together with its items and the coupon it redeemed, if any.
#[derive(Debug, Clone)]
pub struct OrderDetails {
    pub order: OrderRow,
    pub items: Vec<OrderItemRow>,
    pub coupon: Option<CouponRow>,
}

pub(crate) const ORDER_COLUMNS: &str = "id, order_number, user_id, status, total_amount, discount_amount, \
     shipping_amount, tax_amount, final_amount, payment_method, payment_status, \
     shipping_address, billing_address, coupon_id, notes, created_at, updated_at";

pub(crate) const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, unit_price, discount, total_price, created_at";

/// Returns the items of an order, in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_order_items(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItemRow>, DbError> {
    let sql =
        format!("SELECT {ORDER_ITEM_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY id");
    let rows = sqlx::query_as::<_, OrderItemRow>(&sql)
        .bind(order_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns an order with its items and coupon, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn get_order_with_items(
    pool: &PgPool,
    order_id: i64,
) -> Result<Option<OrderDetails>, DbError> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    let Some(order) = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .fetch_optional(pool)
        .await?
    else {
        return Ok(None);
    };

    let items = get_order_items(pool, order.id).await?;
    let coupon = match order.coupon_id {
        Some(coupon_id) => crate::coupons::get_coupon_by_id(pool, coupon_id).await?,
        None => None,
    };

    Ok(Some(OrderDetails {
        order,
        items,
        coupon,
    }))
}

/// Returns a user's orders, newest first, each with its items and coupon.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any query fails.
pub async fn list_user_orders(pool: &PgPool, user_id: i64) -> Result<Vec<OrderDetails>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC"
    );
    let orders = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(user_id)
        .fetch_all(pool)
        .await?;

    let mut details = Vec::with_capacity(orders.len());
    for order in orders {
        let items = get_order_items(pool, order.id).await?;
        let coupon = match order.coupon_id {
            Some(coupon_id) => crate::coupons::get_coupon_by_id(pool, coupon_id).await?,
            None => None,
        };
        details.push(OrderDetails {
            order,
            items,
            coupon,
        });
    }

    Ok(details)
}

/// Returns a page of all orders, newest first. Admin dashboard listing; rows
/// only, item hydration stays with the per-order fetch.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(
    pool: &PgPool,
    limit: i64,
    offset: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Why a status update was refused.
#[derive(Debug, Error)]
pub enum StatusUpdateError {
    #[error("order not found")]
    NotFound,
    #[error("cannot move order from {from} to {to}")]
    IllegalTransition {
        from: OrderStatus,
        to: OrderStatus,
    },
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for StatusUpdateError {
    fn from(e: sqlx::Error) -> Self {
        StatusUpdateError::Db(DbError::Sqlx(e))
    }
}

/// Moves an order to a new status, enforcing the legal transition chain.
///
/// The current status is read `FOR UPDATE` in the same transaction as the
/// write, so two concurrent transitions serialize and the second sees the
/// first's result.
///
/// # Errors
///
/// Returns [`StatusUpdateError::NotFound`] for an unknown order,
/// [`StatusUpdateError::IllegalTransition`] when the move is not allowed, or
/// a storage error.
pub async fn update_order_status(
    pool: &PgPool,
    order_id: i64,
    new_status: OrderStatus,
) -> Result<OrderRow, StatusUpdateError> {
    let mut tx = pool.begin().await?;

    let current: Option<String> =
        sqlx::query_scalar("SELECT status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?;

    let Some(current) = current else {
        return Err(StatusUpdateError::NotFound);
    };
    let current: OrderStatus = current.parse()?;

    if !current.can_transition_to(new_status) {
        return Err(StatusUpdateError::IllegalTransition {
            from: current,
            to: new_status,
        });
    }

    let sql = format!(
        "UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderRow>(&sql)
        .bind(order_id)
        .bind(new_status.as_str())
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}
