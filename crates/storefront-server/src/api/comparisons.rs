use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_db::ComparisonError;

use crate::middleware::{CurrentUser, RequestId};

use super::{
    forbidden, map_db_error, products::ProductItem, ApiError, ApiResponse, AppState, ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct ComparisonItem {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
}

impl From<storefront_db::ComparisonRow> for ComparisonItem {
    fn from(row: storefront_db::ComparisonRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct ComparisonDetailsBody {
    id: i64,
    name: String,
    created_at: DateTime<Utc>,
    products: Vec<ProductItem>,
}

fn map_comparison_error(request_id: String, error: &ComparisonError) -> ApiError {
    match error {
        ComparisonError::ComparisonNotFound
        | ComparisonError::ProductNotFound
        | ComparisonError::NotInComparison => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        ComparisonError::AlreadyAdded => ApiError::new(request_id, "conflict", error.to_string()),
        ComparisonError::Db(e) => map_db_error(request_id, e),
    }
}

/// Loads a comparison and checks the caller owns it (admins may see any).
async fn load_owned(
    state: &AppState,
    req_id: &str,
    user: CurrentUser,
    comparison_id: i64,
) -> Result<storefront_db::ComparisonDetails, ApiError> {
    let details = storefront_db::get_comparison(&state.pool, comparison_id)
        .await
        .map_err(|e| map_db_error(req_id.to_string(), &e))?
        .ok_or_else(|| ApiError::new(req_id.to_string(), "not_found", "Comparison not found"))?;

    if details.comparison.user_id != user.user_id && !user.is_admin() {
        return Err(forbidden(req_id.to_string()));
    }
    Ok(details)
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateComparisonBody {
    name: String,
}

pub(super) async fn create_comparison(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateComparisonBody>,
) -> Result<(StatusCode, Json<ApiResponse<ComparisonItem>>), ApiError> {
    if body.name.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "name must not be empty",
        ));
    }

    let row = storefront_db::create_comparison(&state.pool, user.user_id, body.name.trim())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: ComparisonItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

pub(super) async fn list_comparisons(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<ComparisonItem>>>, ApiError> {
    let rows = storefront_db::list_comparisons(&state.pool, user.user_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ComparisonItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_comparison(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<ComparisonDetailsBody>>, ApiError> {
    let details = load_owned(&state, &req_id.0, user, id).await?;

    Ok(Json(ApiResponse {
        data: ComparisonDetailsBody {
            id: details.comparison.id,
            name: details.comparison.name,
            created_at: details.comparison.created_at,
            products: details.products.into_iter().map(ProductItem::from).collect(),
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn add_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path((id, product_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    load_owned(&state, &req_id.0, user, id).await?;

    storefront_db::add_comparison_product(&state.pool, id, product_id)
        .await
        .map_err(|e| map_comparison_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"added": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn remove_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path((id, product_id)): Path<(i64, i64)>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    load_owned(&state, &req_id.0, user, id).await?;

    storefront_db::remove_comparison_product(&state.pool, id, product_id)
        .await
        .map_err(|e| map_comparison_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"removed": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_comparison(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    load_owned(&state, &req_id.0, user, id).await?;

    storefront_db::delete_comparison(&state.pool, id)
        .await
        .map_err(|e| map_comparison_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"deleted": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
