//! Pure money math for checkout: line totals, coupon evaluation, order totals.
//!
//! All amounts are [`Decimal`] and rounded to 2 places where derived, so the
//! invariant `final = total - discount + shipping + tax` holds exactly on the
//! stored values.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::DiscountType;

/// Flat tax policy applied to every order (10%).
pub const TAX_RATE: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Why a coupon cannot be applied to an order.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CouponRejection {
    /// Unknown code, inactive, or outside the [valid_from, valid_until] window.
    #[error("Invalid or expired coupon")]
    NotFound,
    #[error("Coupon usage limit exceeded")]
    LimitExceeded,
    #[error("Minimum order amount of {minimum} required")]
    MinimumNotMet { minimum: Decimal },
}

/// The redemption terms of a coupon, independent of where the row came from.
#[derive(Debug, Clone)]
pub struct CouponTerms {
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_order_amount: Decimal,
    pub max_discount: Option<Decimal>,
    pub usage_limit: Option<i32>,
    pub used_count: i32,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub is_active: bool,
}

/// Validates coupon terms against an order amount at `now` and computes the
/// discount.
///
/// Percentage discounts are `amount × value / 100`, rounded to 2 places and
/// capped at `max_discount` when set. Fixed discounts are the raw value; the
/// caller clamps against the order total (see [`order_totals`]).
///
/// # Errors
///
/// Returns a [`CouponRejection`] naming the violated constraint.
pub fn evaluate_coupon(
    terms: &CouponTerms,
    order_amount: Decimal,
    now: DateTime<Utc>,
) -> Result<Decimal, CouponRejection> {
    if !terms.is_active || now < terms.valid_from || now > terms.valid_until {
        return Err(CouponRejection::NotFound);
    }

    if let Some(limit) = terms.usage_limit {
        if terms.used_count >= limit {
            return Err(CouponRejection::LimitExceeded);
        }
    }

    if order_amount < terms.min_order_amount {
        return Err(CouponRejection::MinimumNotMet {
            minimum: terms.min_order_amount,
        });
    }

    let discount = match terms.discount_type {
        DiscountType::Percentage => {
            let raw = (order_amount * terms.discount_value / Decimal::ONE_HUNDRED).round_dp(2);
            match terms.max_discount {
                Some(cap) if raw > cap => cap,
                _ => raw,
            }
        }
        DiscountType::Fixed => terms.discount_value,
    };

    Ok(discount)
}

/// The priced components of an order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub total_amount: Decimal,
    pub discount_amount: Decimal,
    pub shipping_amount: Decimal,
    pub tax_amount: Decimal,
    pub final_amount: Decimal,
}

/// Price of one order line: unit price × quantity.
#[must_use]
pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Computes shipping, tax, and the final amount for an order.
///
/// Shipping is a flat zero (policy stub). Tax is [`TAX_RATE`] of the total,
/// rounded to 2 places. A discount larger than `total + shipping + tax` is
/// clamped down so `final_amount` never goes negative while the component
/// identity still holds on the stored values.
#[must_use]
pub fn order_totals(total_amount: Decimal, discount_amount: Decimal) -> OrderTotals {
    let shipping_amount = Decimal::ZERO;
    let tax_amount = (total_amount * TAX_RATE).round_dp(2);

    let gross = total_amount + shipping_amount + tax_amount;
    let discount_amount = discount_amount.min(gross).max(Decimal::ZERO);
    let final_amount = gross - discount_amount;

    OrderTotals {
        total_amount,
        discount_amount,
        shipping_amount,
        tax_amount,
        final_amount,
    }
}
