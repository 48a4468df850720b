use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    forbidden, map_db_error, normalize_limit, normalize_offset, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct StatsBody {
    total_orders: i64,
    pending_orders: i64,
    total_revenue: Decimal,
    total_products: i64,
    total_users: i64,
}

pub(super) async fn get_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<StatsBody>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let stats = storefront_db::admin_stats(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: StatsBody {
            total_orders: stats.total_orders,
            pending_orders: stats.pending_orders,
            total_revenue: stats.total_revenue,
            total_products: stats.total_products,
            total_users: stats.total_users,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// One order in the dashboard listing. Summary only; line items come from
/// `GET /orders/{id}`.
#[derive(Debug, Serialize)]
pub(super) struct OrderSummaryItem {
    id: i64,
    order_number: String,
    user_id: i64,
    status: String,
    total_amount: Decimal,
    discount_amount: Decimal,
    final_amount: Decimal,
    payment_method: String,
    payment_status: String,
    created_at: DateTime<Utc>,
}

impl From<storefront_db::OrderRow> for OrderSummaryItem {
    fn from(row: storefront_db::OrderRow) -> Self {
        Self {
            id: row.id,
            order_number: row.order_number,
            user_id: row.user_id,
            status: row.status,
            total_amount: row.total_amount,
            discount_amount: row.discount_amount,
            final_amount: row.final_amount,
            payment_method: row.payment_method,
            payment_status: row.payment_status,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<OrderSummaryItem>>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let rows = storefront_db::list_orders(
        &state.pool,
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(OrderSummaryItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// A user as seen by the dashboard. The api_token never leaves the server.
#[derive(Debug, Serialize)]
pub(super) struct UserItem {
    id: i64,
    email: String,
    first_name: String,
    last_name: String,
    role: String,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<storefront_db::UserRow> for UserItem {
    fn from(row: storefront_db::UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            role: row.role,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_users(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<UserItem>>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let rows = storefront_db::list_users(
        &state.pool,
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(UserItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}
