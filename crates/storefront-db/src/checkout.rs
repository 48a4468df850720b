//! The checkout pipeline: price a cart, apply a coupon, and persist the order
//! with its stock and coupon-usage effects as one atomic unit.
//!
//! All reads and writes happen inside a single Postgres transaction. Product
//! rows are locked `FOR UPDATE` in ascending id order (no deadlocks between
//! concurrent checkouts) and the coupon row is locked before any product, so
//! the stock check and decrement — and the usage check and increment — are
//! serialized per row. A failure at any step rolls the whole transaction back.

use std::collections::BTreeMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::PgPool;
use thiserror::Error;

use storefront_core::{
    domain::{Address, DomainError, PaymentMethod},
    evaluate_coupon, generate_order_number, line_total, order_totals, CouponRejection,
};

use crate::{
    coupons::{CouponRow, COUPON_COLUMNS},
    orders::{OrderDetails, OrderItemRow, OrderRow, ORDER_COLUMNS, ORDER_ITEM_COLUMNS},
    DbError,
};

/// One requested order line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderItemRequest {
    pub product_id: i64,
    pub quantity: i32,
}

/// Everything needed to place an order for a user.
#[derive(Debug, Clone)]
pub struct NewOrder<'a> {
    pub user_id: i64,
    pub items: &'a [OrderItemRequest],
    pub shipping_address: &'a Address,
    pub billing_address: &'a Address,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Why checkout was refused. No variant leaves partial writes behind.
#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("order must contain at least one item")]
    EmptyOrder,
    #[error("quantity for product {product_id} must be at least 1")]
    InvalidQuantity { product_id: i64 },
    #[error("Product {0} not found")]
    ProductNotFound(i64),
    #[error("Insufficient stock for {product}")]
    InsufficientStock { product: String },
    #[error(transparent)]
    Coupon(#[from] CouponRejection),
    #[error("failed to encode address snapshot: {0}")]
    AddressEncoding(#[from] serde_json::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for CheckoutError {
    fn from(e: sqlx::Error) -> Self {
        CheckoutError::Db(DbError::Sqlx(e))
    }
}

/// Product fields snapshotted under the row lock.
#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    name: String,
    price: Decimal,
    stock: i32,
}

/// Places an order: validates stock and coupon, prices the cart, and persists
/// the order, its items, the stock decrements, and the coupon usage increment
/// in one transaction.
///
/// Returns the persisted order with its items and the coupon row as updated
/// by this order.
///
/// # Errors
///
/// Returns a [`CheckoutError`] naming the violated constraint; the store is
/// untouched on any error.
pub async fn place_order(
    pool: &PgPool,
    new_order: &NewOrder<'_>,
) -> Result<OrderDetails, CheckoutError> {
    if new_order.items.is_empty() {
        return Err(CheckoutError::EmptyOrder);
    }
    for item in new_order.items {
        if item.quantity < 1 {
            return Err(CheckoutError::InvalidQuantity {
                product_id: item.product_id,
            });
        }
    }

    // Combined quantity per product: two lines for the same product must be
    // checked against stock together, not independently.
    let mut required: BTreeMap<i64, i32> = BTreeMap::new();
    for item in new_order.items {
        *required.entry(item.product_id).or_insert(0) += item.quantity;
    }

    let mut tx = pool.begin().await?;

    // Coupon lock comes before any product lock; every checkout acquires
    // locks in the same global order.
    let coupon = match new_order.coupon_code {
        Some(code) => {
            let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1 FOR UPDATE");
            let row = sqlx::query_as::<_, CouponRow>(&sql)
                .bind(code)
                .fetch_optional(&mut *tx)
                .await?;
            Some(row.ok_or(CheckoutError::Coupon(CouponRejection::NotFound))?)
        }
        None => None,
    };

    let mut snapshots: BTreeMap<i64, LockedProduct> = BTreeMap::new();
    for (&product_id, &quantity) in &required {
        let product = sqlx::query_as::<_, LockedProduct>(
            "SELECT name, price, stock FROM products \
             WHERE id = $1 AND is_active = true \
             FOR UPDATE",
        )
        .bind(product_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(CheckoutError::ProductNotFound(product_id))?;

        if product.stock < quantity {
            return Err(CheckoutError::InsufficientStock {
                product: product.name,
            });
        }
        snapshots.insert(product_id, product);
    }

    let mut total_amount = Decimal::ZERO;
    for item in new_order.items {
        total_amount += line_total(snapshots[&item.product_id].price, item.quantity);
    }

    let discount = match &coupon {
        Some(row) => evaluate_coupon(&row.terms()?, total_amount, Utc::now())?,
        None => Decimal::ZERO,
    };
    let totals = order_totals(total_amount, discount);

    let order_sql = format!(
        "INSERT INTO orders \
           (order_number, user_id, status, total_amount, discount_amount, \
            shipping_amount, tax_amount, final_amount, payment_method, \
            payment_status, shipping_address, billing_address, coupon_id, notes) \
         VALUES ($1, $2, 'pending', $3, $4, $5, $6, $7, $8, 'pending', $9, $10, $11, $12) \
         RETURNING {ORDER_COLUMNS}"
    );
    let order = sqlx::query_as::<_, OrderRow>(&order_sql)
        .bind(generate_order_number())
        .bind(new_order.user_id)
        .bind(totals.total_amount)
        .bind(totals.discount_amount)
        .bind(totals.shipping_amount)
        .bind(totals.tax_amount)
        .bind(totals.final_amount)
        .bind(new_order.payment_method.as_str())
        .bind(serde_json::to_value(new_order.shipping_address)?)
        .bind(serde_json::to_value(new_order.billing_address)?)
        .bind(coupon.as_ref().map(|c| c.id))
        .bind(new_order.notes)
        .fetch_one(&mut *tx)
        .await?;

    let item_sql = format!(
        "INSERT INTO order_items \
           (order_id, product_id, quantity, unit_price, discount, total_price) \
         VALUES ($1, $2, $3, $4, 0, $5) \
         RETURNING {ORDER_ITEM_COLUMNS}"
    );
    let mut items = Vec::with_capacity(new_order.items.len());
    for item in new_order.items {
        let unit_price = snapshots[&item.product_id].price;
        let row = sqlx::query_as::<_, OrderItemRow>(&item_sql)
            .bind(order.id)
            .bind(item.product_id)
            .bind(item.quantity)
            .bind(unit_price)
            .bind(line_total(unit_price, item.quantity))
            .fetch_one(&mut *tx)
            .await?;
        items.push(row);
    }

    for (&product_id, &quantity) in &required {
        sqlx::query(
            "UPDATE products \
             SET stock = stock - $2, sold_count = sold_count + $2, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(product_id)
        .bind(quantity)
        .execute(&mut *tx)
        .await?;
    }

    let coupon = match coupon {
        Some(row) => {
            let sql = format!(
                "UPDATE coupons \
                 SET used_count = used_count + 1, updated_at = NOW() \
                 WHERE id = $1 \
                 RETURNING {COUPON_COLUMNS}"
            );
            Some(
                sqlx::query_as::<_, CouponRow>(&sql)
                    .bind(row.id)
                    .fetch_one(&mut *tx)
                    .await?,
            )
        }
        None => None,
    };

    tx.commit().await?;

    tracing::info!(
        order_id = order.id,
        order_number = %order.order_number,
        final_amount = %order.final_amount,
        "order placed"
    );

    Ok(OrderDetails {
        order,
        items,
        coupon,
    })
}
