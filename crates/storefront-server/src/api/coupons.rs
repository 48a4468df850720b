use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{evaluate_coupon, order_totals, CouponRejection, DiscountType};

use crate::middleware::{CurrentUser, RequestId};

use super::{forbidden, map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CouponItem {
    id: i64,
    code: String,
    discount_type: String,
    discount_value: Decimal,
    min_order_amount: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    used_count: i32,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
    is_active: bool,
}

impl From<storefront_db::CouponRow> for CouponItem {
    fn from(row: storefront_db::CouponRow) -> Self {
        Self {
            id: row.id,
            code: row.code,
            discount_type: row.discount_type,
            discount_value: row.discount_value,
            min_order_amount: row.min_order_amount,
            max_discount: row.max_discount,
            usage_limit: row.usage_limit,
            used_count: row.used_count,
            valid_from: row.valid_from,
            valid_until: row.valid_until,
            is_active: row.is_active,
        }
    }
}

// Every rejection, unknown codes included, answers 400: a bad coupon is a
// rejected input at the pricing boundary, not a missing resource.
pub(super) fn map_coupon_rejection(request_id: String, rejection: &CouponRejection) -> ApiError {
    ApiError::new(request_id, "validation_error", rejection.to_string())
}

pub(super) async fn list_coupons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<CouponItem>>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let rows = storefront_db::list_coupons(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CouponItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn list_active_coupons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<CouponItem>>>, ApiError> {
    let rows = storefront_db::list_active_coupons(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(CouponItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct ValidateCouponBody {
    code: String,
    order_amount: Decimal,
}

/// Dry-run pricing preview. Nothing is committed; `used_count` is untouched.
#[derive(Debug, Serialize)]
pub(super) struct CouponPreview {
    code: String,
    discount_amount: Decimal,
    total_amount: Decimal,
    shipping_amount: Decimal,
    tax_amount: Decimal,
    final_amount: Decimal,
}

pub(super) async fn validate_coupon(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ValidateCouponBody>,
) -> Result<Json<ApiResponse<CouponPreview>>, ApiError> {
    if body.order_amount < Decimal::ZERO {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "order_amount must be non-negative",
        ));
    }

    let row = storefront_db::get_coupon_by_code(&state.pool, &body.code)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| map_coupon_rejection(req_id.0.clone(), &CouponRejection::NotFound))?;

    let terms = row.terms().map_err(|e| {
        tracing::error!(coupon_id = row.id, error = %e, "stored coupon has invalid terms");
        ApiError::new(req_id.0.clone(), "internal_error", "coupon is misconfigured")
    })?;
    let discount = evaluate_coupon(&terms, body.order_amount, Utc::now())
        .map_err(|rej| map_coupon_rejection(req_id.0.clone(), &rej))?;
    let totals = order_totals(body.order_amount, discount);

    Ok(Json(ApiResponse {
        data: CouponPreview {
            code: row.code,
            discount_amount: totals.discount_amount,
            total_amount: totals.total_amount,
            shipping_amount: totals.shipping_amount,
            tax_amount: totals.tax_amount,
            final_amount: totals.final_amount,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateCouponBody {
    code: String,
    discount_type: String,
    discount_value: Decimal,
    #[serde(default)]
    min_order_amount: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    valid_from: DateTime<Utc>,
    valid_until: DateTime<Utc>,
}

pub(super) async fn create_coupon(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateCouponBody>,
) -> Result<Json<ApiResponse<CouponItem>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }
    if body.discount_type.parse::<DiscountType>().is_err() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "discount_type must be 'percentage' or 'fixed'",
        ));
    }
    if body.discount_value <= Decimal::ZERO {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "discount_value must be positive",
        ));
    }
    if body.valid_until < body.valid_from {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "valid_until must not precede valid_from",
        ));
    }

    let row = storefront_db::create_coupon(
        &state.pool,
        &storefront_db::NewCoupon {
            code: &body.code,
            discount_type: &body.discount_type,
            discount_value: body.discount_value,
            min_order_amount: body.min_order_amount,
            max_discount: body.max_discount,
            usage_limit: body.usage_limit,
            valid_from: body.valid_from,
            valid_until: body.valid_until,
        },
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::new(
                req_id.0.clone(),
                "conflict",
                "a coupon with this code already exists",
            )
        } else {
            map_db_error(req_id.0.clone(), &e)
        }
    })?;

    Ok(Json(ApiResponse {
        data: CouponItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateCouponBody {
    discount_value: Option<Decimal>,
    min_order_amount: Option<Decimal>,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
    valid_from: Option<DateTime<Utc>>,
    valid_until: Option<DateTime<Utc>>,
    is_active: Option<bool>,
}

pub(super) async fn update_coupon(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateCouponBody>,
) -> Result<Json<ApiResponse<CouponItem>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let row = storefront_db::update_coupon(
        &state.pool,
        id,
        &storefront_db::CouponUpdate {
            discount_value: body.discount_value,
            min_order_amount: body.min_order_amount,
            max_discount: body.max_discount,
            usage_limit: body.usage_limit,
            valid_from: body.valid_from,
            valid_until: body.valid_until,
            is_active: body.is_active,
        },
    )
    .await
    .map_err(|e| match e {
        storefront_db::DbError::NotFound => {
            ApiError::new(req_id.0.clone(), "not_found", "Coupon not found")
        }
        other => map_db_error(req_id.0.clone(), &other),
    })?;

    Ok(Json(ApiResponse {
        data: CouponItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_coupon(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    storefront_db::delete_coupon(&state.pool, id)
        .await
        .map_err(|e| match e {
            storefront_db::DbError::NotFound => {
                ApiError::new(req_id.0.clone(), "not_found", "Coupon not found")
            }
            other => map_db_error(req_id.0.clone(), &other),
        })?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"deleted": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
