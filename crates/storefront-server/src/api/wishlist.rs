use axum::{
    extract::{Path, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use storefront_db::WishlistError;

use crate::middleware::{CurrentUser, RequestId};

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct WishlistItem {
    product_id: i64,
    product_name: String,
    product_slug: String,
    price: Decimal,
    average_rating: Decimal,
    added_at: DateTime<Utc>,
}

impl From<storefront_db::WishlistLine> for WishlistItem {
    fn from(line: storefront_db::WishlistLine) -> Self {
        Self {
            product_id: line.product_id,
            product_name: line.product_name,
            product_slug: line.product_slug,
            price: line.price,
            average_rating: line.average_rating,
            added_at: line.created_at,
        }
    }
}

fn map_wishlist_error(request_id: String, error: &WishlistError) -> ApiError {
    match error {
        WishlistError::ProductNotFound | WishlistError::NotInWishlist => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        WishlistError::AlreadyInWishlist => {
            ApiError::new(request_id, "conflict", error.to_string())
        }
        WishlistError::Db(e) => map_db_error(request_id, e),
    }
}

pub(super) async fn list_wishlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<WishlistItem>>>, ApiError> {
    let lines = storefront_db::list_wishlist(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: lines.into_iter().map(WishlistItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn add_to_wishlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    storefront_db::add_to_wishlist(&state.pool, user.user_id, product_id)
        .await
        .map_err(|e| map_wishlist_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"added": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn remove_from_wishlist(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    storefront_db::remove_from_wishlist(&state.pool, user.user_id, product_id)
        .await
        .map_err(|e| map_wishlist_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"removed": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
