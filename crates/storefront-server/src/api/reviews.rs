use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_db::{ReviewError, ReviewSort};

use crate::middleware::{CurrentUser, RequestId};

use super::{
    forbidden, map_db_error, normalize_limit, normalize_offset, ApiError, ApiResponse, AppState,
    ResponseMeta,
};

#[derive(Debug, Serialize)]
pub(super) struct ReviewItem {
    id: i64,
    user_id: i64,
    product_id: i64,
    rating: i32,
    comment: Option<String>,
    images: serde_json::Value,
    author_name: String,
    created_at: DateTime<Utc>,
}

impl From<storefront_db::ReviewWithUserRow> for ReviewItem {
    fn from(row: storefront_db::ReviewWithUserRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            product_id: row.product_id,
            rating: row.rating,
            comment: row.comment,
            images: row.images,
            author_name: format!("{} {}", row.first_name, row.last_name),
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct OwnReviewItem {
    id: i64,
    product_id: i64,
    rating: i32,
    comment: Option<String>,
    images: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<storefront_db::ReviewRow> for OwnReviewItem {
    fn from(row: storefront_db::ReviewRow) -> Self {
        Self {
            id: row.id,
            product_id: row.product_id,
            rating: row.rating,
            comment: row.comment,
            images: row.images,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

fn map_review_error(request_id: String, error: &ReviewError) -> ApiError {
    match error {
        ReviewError::ProductNotFound | ReviewError::ReviewNotFound => {
            ApiError::new(request_id, "not_found", error.to_string())
        }
        ReviewError::DuplicateReview => ApiError::new(request_id, "conflict", error.to_string()),
        ReviewError::Db(e) => map_db_error(request_id, e),
    }
}

fn parse_sort(request_id: &str, sort: Option<&str>) -> Result<ReviewSort, ApiError> {
    match sort {
        None | Some("latest") => Ok(ReviewSort::Latest),
        Some("oldest") => Ok(ReviewSort::Oldest),
        Some("highest") => Ok(ReviewSort::Highest),
        Some("lowest") => Ok(ReviewSort::Lowest),
        Some(other) => Err(ApiError::new(
            request_id.to_string(),
            "validation_error",
            format!("unknown sort order: {other}"),
        )),
    }
}

fn validate_rating(request_id: &str, rating: i32) -> Result<(), ApiError> {
    if (1..=5).contains(&rating) {
        Ok(())
    } else {
        Err(ApiError::new(
            request_id.to_string(),
            "validation_error",
            "rating must be between 1 and 5",
        ))
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ReviewListQuery {
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

pub(super) async fn list_reviews(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(product_id): Path<i64>,
    Query(query): Query<ReviewListQuery>,
) -> Result<Json<ApiResponse<Vec<ReviewItem>>>, ApiError> {
    let sort = parse_sort(&req_id.0, query.sort.as_deref())?;
    let rows = storefront_db::list_product_reviews(
        &state.pool,
        product_id,
        sort,
        normalize_limit(query.limit),
        normalize_offset(query.offset),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ReviewItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateReviewBody {
    rating: i32,
    comment: Option<String>,
    #[serde(default)]
    images: Vec<String>,
}

pub(super) async fn create_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(product_id): Path<i64>,
    Json(body): Json<CreateReviewBody>,
) -> Result<(StatusCode, Json<ApiResponse<OwnReviewItem>>), ApiError> {
    validate_rating(&req_id.0, body.rating)?;

    let row = storefront_db::create_review(
        &state.pool,
        user.user_id,
        product_id,
        body.rating,
        body.comment.as_deref(),
        &body.images,
    )
    .await
    .map_err(|e| map_review_error(req_id.0.clone(), &e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: OwnReviewItem::from(row),
            meta: ResponseMeta::new(req_id.0),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateReviewBody {
    rating: Option<i32>,
    comment: Option<String>,
    images: Option<Vec<String>>,
}

pub(super) async fn update_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
    Json(body): Json<UpdateReviewBody>,
) -> Result<Json<ApiResponse<OwnReviewItem>>, ApiError> {
    if let Some(rating) = body.rating {
        validate_rating(&req_id.0, rating)?;
    }

    let existing = storefront_db::get_review(&state.pool, review_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Review not found"))?;
    if existing.user_id != user.user_id && !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let row = storefront_db::update_review(
        &state.pool,
        review_id,
        body.rating,
        body.comment.as_deref(),
        body.images.as_deref(),
    )
    .await
    .map_err(|e| map_review_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: OwnReviewItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn delete_review(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(review_id): Path<i64>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    let existing = storefront_db::get_review(&state.pool, review_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Review not found"))?;
    if existing.user_id != user.user_id && !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    storefront_db::delete_review(&state.pool, review_id)
        .await
        .map_err(|e| map_review_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"deleted": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
