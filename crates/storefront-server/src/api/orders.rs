use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use storefront_core::{domain::Address, OrderStatus, PaymentMethod};
use storefront_db::{CheckoutError, OrderDetails, StatusUpdateError};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    coupons::map_coupon_rejection, forbidden, map_db_error, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct OrderItemBody {
    product_id: i64,
    quantity: i32,
    unit_price: Decimal,
    total_price: Decimal,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderBody {
    id: i64,
    order_number: String,
    status: String,
    total_amount: Decimal,
    discount_amount: Decimal,
    shipping_amount: Decimal,
    tax_amount: Decimal,
    final_amount: Decimal,
    payment_method: String,
    payment_status: String,
    shipping_address: serde_json::Value,
    billing_address: serde_json::Value,
    coupon_code: Option<String>,
    notes: Option<String>,
    items: Vec<OrderItemBody>,
    created_at: DateTime<Utc>,
}

impl From<OrderDetails> for OrderBody {
    fn from(details: OrderDetails) -> Self {
        Self {
            id: details.order.id,
            order_number: details.order.order_number,
            status: details.order.status,
            total_amount: details.order.total_amount,
            discount_amount: details.order.discount_amount,
            shipping_amount: details.order.shipping_amount,
            tax_amount: details.order.tax_amount,
            final_amount: details.order.final_amount,
            payment_method: details.order.payment_method,
            payment_status: details.order.payment_status,
            shipping_address: details.order.shipping_address,
            billing_address: details.order.billing_address,
            coupon_code: details.coupon.map(|c| c.code),
            notes: details.order.notes,
            items: details
                .items
                .into_iter()
                .map(|item| OrderItemBody {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    total_price: item.total_price,
                })
                .collect(),
            created_at: details.order.created_at,
        }
    }
}

fn map_checkout_error(request_id: String, error: &CheckoutError) -> ApiError {
    match error {
        // An unknown product id in the submitted items is a bad order, not a
        // missing resource; only direct lookups answer 404.
        CheckoutError::EmptyOrder
        | CheckoutError::InvalidQuantity { .. }
        | CheckoutError::InsufficientStock { .. }
        | CheckoutError::ProductNotFound(_) => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        CheckoutError::Coupon(rejection) => map_coupon_rejection(request_id, rejection),
        CheckoutError::AddressEncoding(_) | CheckoutError::Domain(_) | CheckoutError::Db(_) => {
            tracing::error!(error = %error, "checkout failed");
            ApiError::new(request_id, "internal_error", "checkout failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderItemInput {
    product_id: i64,
    quantity: i32,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateOrderBody {
    items: Vec<OrderItemInput>,
    shipping_address: Address,
    billing_address: Address,
    payment_method: PaymentMethod,
    coupon_code: Option<String>,
    notes: Option<String>,
}

pub(super) async fn create_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateOrderBody>,
) -> Result<(StatusCode, Json<ApiResponse<OrderBody>>), ApiError> {
    let items: Vec<storefront_db::OrderItemRequest> = body
        .items
        .iter()
        .map(|item| storefront_db::OrderItemRequest {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect();

    let details = storefront_db::place_order(
        &state.pool,
        &storefront_db::NewOrder {
            user_id: user.user_id,
            items: &items,
            shipping_address: &body.shipping_address,
            billing_address: &body.billing_address,
            payment_method: body.payment_method,
            coupon_code: body.coupon_code.as_deref(),
            notes: body.notes.as_deref(),
        },
    )
    .await
    .map_err(|e| map_checkout_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: OrderBody::from(details),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_my_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<OrderBody>>>, ApiError> {
    let orders = storefront_db::list_user_orders(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: orders.into_iter().map(OrderBody::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<OrderBody>>, ApiError> {
    let details = storefront_db::get_order_with_items(&state.pool, id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Order not found"))?;

    if details.order.user_id != user.user_id && !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    Ok(Json(ApiResponse {
        data: OrderBody::from(details),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateStatusBody {
    status: String,
}

pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateStatusBody>,
) -> Result<Json<ApiResponse<OrderBody>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let new_status: OrderStatus = body.status.parse().map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("unknown order status: {}", body.status),
        )
    })?;

    let order = storefront_db::update_order_status(&state.pool, id, new_status)
        .await
        .map_err(|e| match &e {
            StatusUpdateError::NotFound => {
                ApiError::new(req_id.0.clone(), "not_found", "Order not found")
            }
            StatusUpdateError::IllegalTransition { .. } => {
                ApiError::new(req_id.0.clone(), "conflict", e.to_string())
            }
            StatusUpdateError::Domain(_) | StatusUpdateError::Db(_) => {
                tracing::error!(error = %e, "status update failed");
                ApiError::new(req_id.0.clone(), "internal_error", "status update failed")
            }
        })?;

    let items = storefront_db::get_order_items(&state.pool, order.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let coupon = match order.coupon_id {
        Some(coupon_id) => storefront_db::get_coupon_by_id(&state.pool, coupon_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?,
        None => None,
    };

    Ok(Json(ApiResponse {
        data: OrderBody::from(OrderDetails {
            order,
            items,
            coupon,
        }),
        meta: ResponseMeta::new(req_id.0),
    }))
}
