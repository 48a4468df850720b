//! Database operations for the `coupons` table.
//!
//! `used_count` is written only by [`crate::checkout`] as part of the order
//! transaction; the admin update path cannot touch it.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use storefront_core::{domain::DomainError, CouponTerms};

use crate::DbError;

/// A row from the `coupons` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CouponRow {
    pub id: i64,
    pub code: String,
    pub discount_type: String,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub(crate) const COUPON_COLUMNS: &str = "id, code, discount_type, discount_value, min_order_amount, \
     max_discount, usage_limit, used_count, valid_from, valid_until, \
     is_active, created_at, updated_at";

impl CouponRow {
    /// The row's redemption terms in the form the pricing logic consumes.
    ///
    /// # Errors
    ///
    /// Returns [`DomainError`] if the stored `discount_type` is not a known
    /// value (which the schema CHECK constraint should prevent).
    pub fn terms(&self) -> Result<CouponTerms, DomainError> {
        Ok(CouponTerms {
            discount_type: self.discount_type.parse()?,
            discount_value: self.discount_value,
            min_order_amount: self.min_order_amount,
            max_discount: self.max_discount,
            usage_limit: self.usage_limit,
            used_count: self.used_count,
            valid_from: self.valid_from,
            valid_until: self.valid_until,
            is_active: self.is_active,
        })
    }
}

/// Returns all coupons, newest first. Admin listing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_coupons(pool: &PgPool) -> Result<Vec<CouponRow>, DbError> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons ORDER BY created_at DESC");
    let rows = sqlx::query_as::<_, CouponRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Returns coupons currently redeemable: active, inside their window, and
/// with usage remaining.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_coupons(pool: &PgPool) -> Result<Vec<CouponRow>, DbError> {
    let sql = format!(
        "SELECT {COUPON_COLUMNS} \
         FROM coupons \
         WHERE is_active = true \
           AND valid_from <= NOW() \
           AND valid_until >= NOW() \
           AND (usage_limit IS NULL OR used_count < usage_limit) \
         ORDER BY created_at DESC"
    );
    let rows = sqlx::query_as::<_, CouponRow>(&sql).fetch_all(pool).await?;
    Ok(rows)
}

/// Returns a coupon by code regardless of state, or `None`.
///
/// State checks (window, activity, usage) belong to the pricing logic so the
/// caller can distinguish rejection reasons.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_coupon_by_code(pool: &PgPool, code: &str) -> Result<Option<CouponRow>, DbError> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE code = $1");
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(code)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns a coupon by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_coupon_by_id(pool: &PgPool, id: i64) -> Result<Option<CouponRow>, DbError> {
    let sql = format!("SELECT {COUPON_COLUMNS} FROM coupons WHERE id = $1");
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Fields for creating a coupon.
#[derive(Debug, Clone)]
pub struct NewCoupon<'a> {
    pub code: &'a str,
    pub discount_type: &'a str,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

/// Creates a coupon and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including the unique
/// constraint on `code`).
pub async fn create_coupon(pool: &PgPool, coupon: &NewCoupon<'_>) -> Result<CouponRow, DbError> {
    let sql = format!(
        "INSERT INTO coupons \
           (code, discount_type, discount_value, min_order_amount, max_discount, \
            usage_limit, valid_from, valid_until) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
         RETURNING {COUPON_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(coupon.code)
        .bind(coupon.discount_type)
        .bind(coupon.discount_value)
        .bind(coupon.min_order_amount)
        .bind(coupon.max_discount)
        .bind(coupon.usage_limit)
        .bind(coupon.valid_from)
        .bind(coupon.valid_until)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Sparse update for a coupon's redemption terms. `None` preserves the
/// current value. `used_count` is not updatable here.
#[derive(Debug, Clone, Default)]
pub struct CouponUpdate {
    pub discount_value: Option<Decimal>,
    pub min_order_amount: Option<Decimal>,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub valid_from: Option<DateTime<Utc>>,
    pub valid_until: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Applies a sparse update and returns the updated row.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the coupon does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn update_coupon(
    pool: &PgPool,
    coupon_id: i64,
    update: &CouponUpdate,
) -> Result<CouponRow, DbError> {
    let sql = format!(
        "UPDATE coupons \
         SET discount_value   = COALESCE($2, discount_value), \
             min_order_amount = COALESCE($3, min_order_amount), \
             max_discount     = COALESCE($4, max_discount), \
             usage_limit      = COALESCE($5, usage_limit), \
             valid_from       = COALESCE($6, valid_from), \
             valid_until      = COALESCE($7, valid_until), \
             is_active        = COALESCE($8, is_active), \
             updated_at       = NOW() \
         WHERE id = $1 \
         RETURNING {COUPON_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CouponRow>(&sql)
        .bind(coupon_id)
        .bind(update.discount_value)
        .bind(update.min_order_amount)
        .bind(update.max_discount)
        .bind(update.usage_limit)
        .bind(update.valid_from)
        .bind(update.valid_until)
        .bind(update.is_active)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Deletes a coupon.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the coupon does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn delete_coupon(pool: &PgPool, coupon_id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM coupons WHERE id = $1")
        .bind(coupon_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}
