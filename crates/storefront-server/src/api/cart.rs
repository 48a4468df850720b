use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{line_total, order_totals};
use storefront_db::CartError;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct CartLineItem {
    product_id: i64,
    product_name: String,
    product_slug: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
    stock: i32,
}

impl From<storefront_db::CartLine> for CartLineItem {
    fn from(line: storefront_db::CartLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            product_slug: line.product_slug,
            unit_price: line.unit_price,
            line_total: line_total(line.unit_price, line.quantity),
            quantity: line.quantity,
            stock: line.stock,
        }
    }
}

/// The cart with the same pricing preview the checkout would produce, before
/// any coupon.
#[derive(Debug, Serialize)]
pub(super) struct CartView {
    items: Vec<CartLineItem>,
    total_amount: Decimal,
    shipping_amount: Decimal,
    tax_amount: Decimal,
    final_amount: Decimal,
}

fn cart_view(lines: Vec<storefront_db::CartLine>) -> CartView {
    let items: Vec<CartLineItem> = lines.into_iter().map(CartLineItem::from).collect();
    let subtotal: Decimal = items.iter().map(|item| item.line_total).sum();
    let totals = order_totals(subtotal, Decimal::ZERO);

    CartView {
        items,
        total_amount: totals.total_amount,
        shipping_amount: totals.shipping_amount,
        tax_amount: totals.tax_amount,
        final_amount: totals.final_amount,
    }
}

fn map_cart_error(request_id: String, error: &CartError) -> ApiError {
    match error {
        CartError::ProductNotFound | CartError::NotInCart => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        CartError::InsufficientStock { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        CartError::Db(e) => map_db_error(request_id, e),
    }
}

pub(super) async fn get_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<CartView>>, ApiError> {
    let lines = storefront_db::list_cart(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: cart_view(lines),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct QuantityBody {
    quantity: i32,
}

fn validate_quantity(request_id: &str, quantity: i32) -> Result<(), ApiError> {
    if quantity >= 1 {
        Ok(())
    } else {
        Err(ApiError::new(
            request_id.to_string(),
            "validation_error",
            "quantity must be at least 1",
        ))
    }
}

pub(super) async fn add_to_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<ApiResponse<CartLineItem>>, ApiError> {
    validate_quantity(&req_id.0, body.quantity)?;

    let line = storefront_db::add_to_cart(&state.pool, user.user_id, product_id, body.quantity)
        .await
        .map_err(|e| map_cart_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CartLineItem::from(line),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn set_quantity(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Result<Json<ApiResponse<CartLineItem>>, ApiError> {
    validate_quantity(&req_id.0, body.quantity)?;

    let line =
        storefront_db::set_cart_quantity(&state.pool, user.user_id, product_id, body.quantity)
            .await
            .map_err(|e| map_cart_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: CartLineItem::from(line),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn remove_from_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    storefront_db::remove_from_cart(&state.pool, user.user_id, product_id)
        .await
        .map_err(|e| map_cart_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"removed": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn clear_cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    storefront_db::clear_cart(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"cleared": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
