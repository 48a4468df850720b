use axum::{
    extract::{Path, Query, State},
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
pub(super) struct ProductItem {
    id: i64,
    name: String,
    slug: String,
    sku: Option<String>,
    description: Option<String>,
    price: Decimal,
    original_price: Option<Decimal>,
    stock: i32,
    sold_count: i32,
    average_rating: Decimal,
    review_count: i32,
    brand_id: i64,
    category_id: i64,
    is_featured: bool,
    created_at: DateTime<Utc>,
}

impl From<storefront_db::ProductRow> for ProductItem {
    fn from(row: storefront_db::ProductRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            slug: row.slug,
            sku: row.sku,
            description: row.description,
            price: row.price,
            original_price: row.original_price,
            stock: row.stock,
            sold_count: row.sold_count,
            average_rating: row.average_rating,
            review_count: row.review_count,
            brand_id: row.brand_id,
            category_id: row.category_id,
            is_featured: row.is_featured,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub brand_slug: Option<String>,
    pub category_slug: Option<String>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_sort(
    request_id: &str,
    sort: Option<&str>,
) -> Result<storefront_db::ProductSort, ApiError> {
    match sort {
        None | Some("newest") => Ok(storefront_db::ProductSort::Newest),
        Some("price_asc") => Ok(storefront_db::ProductSort::PriceAsc),
        Some("price_desc") => Ok(storefront_db::ProductSort::PriceDesc),
        Some("best_selling") => Ok(storefront_db::ProductSort::BestSelling),
        Some("top_rated") => Ok(storefront_db::ProductSort::TopRated),
        Some(other) => Err(ApiError::new(
            request_id.to_string(),
            "validation_error",
            format!("unknown sort order: {other}"),
        )),
    }
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let sort = parse_sort(&req_id.0, query.sort.as_deref())?;
    let rows = storefront_db::list_products(
        &state.pool,
        storefront_db::ProductListFilters {
            brand_slug: query.brand_slug.as_deref(),
            category_slug: query.category_slug.as_deref(),
            search: query.search.as_deref(),
            min_price: query.min_price,
            max_price: query.max_price,
            featured: query.featured,
            sort,
            limit: normalize_limit(query.limit),
            offset: normalize_offset(query.offset),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: rows.into_iter().map(ProductItem::from).collect(),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    let row = storefront_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Product not found"))?;

    Ok(Json(ApiResponse {
        data: ProductItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct CreateProductBody {
    name: String,
    slug: String,
    sku: Option<String>,
    description: Option<String>,
    price: Decimal,
    original_price: Option<Decimal>,
    stock: i32,
    brand_id: i64,
    category_id: i64,
    #[serde(default)]
    is_featured: bool,
}

pub(super) async fn create_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Json(body): Json<CreateProductBody>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }
    if body.price < Decimal::ZERO || body.stock < 0 {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "price and stock must be non-negative",
        ));
    }

    let row = storefront_db::create_product(
        &state.pool,
        &storefront_db::NewProduct {
            name: &body.name,
            slug: &body.slug,
            sku: body.sku.as_deref(),
            description: body.description.as_deref(),
            price: body.price,
            original_price: body.original_price,
            stock: body.stock,
            brand_id: body.brand_id,
            category_id: body.category_id,
            is_featured: body.is_featured,
        },
    )
    .await
    .map_err(|e| {
        if e.is_unique_violation() {
            ApiError::new(
                req_id.0.clone(),
                "conflict",
                "a product with this slug or SKU already exists",
            )
        } else {
            map_db_error(req_id.0.clone(), &e)
        }
    })?;

    Ok(Json(ApiResponse {
        data: ProductItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdateProductBody {
    name: Option<String>,
    description: Option<String>,
    price: Option<Decimal>,
    original_price: Option<Decimal>,
    category_id: Option<i64>,
    is_featured: Option<bool>,
}

pub(super) async fn update_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
    Json(body): Json<UpdateProductBody>,
) -> Result<Json<ApiResponse<ProductItem>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }
    if body.price.is_some_and(|p| p < Decimal::ZERO) {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "price must be non-negative",
        ));
    }

    let existing = storefront_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Product not found"))?;

    let row = storefront_db::update_product(
        &state.pool,
        existing.id,
        &storefront_db::ProductUpdate {
            name: body.name.as_deref(),
            description: body.description.as_deref(),
            price: body.price,
            original_price: body.original_price,
            category_id: body.category_id,
            is_featured: body.is_featured,
        },
    )
    .await
    .map_err(|e| match e {
        storefront_db::DbError::NotFound => {
            ApiError::new(req_id.0.clone(), "not_found", "Product not found")
        }
        other => map_db_error(req_id.0.clone(), &other),
    })?;

    Ok(Json(ApiResponse {
        data: ProductItem::from(row),
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn deactivate_product(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(user): Extension<CurrentUser>,
    Path(slug): Path<String>,
) -> Result<Json<ApiResponse<serde_json::Value>>, ApiError> {
    if !user.is_admin() {
        return Err(forbidden(req_id.0));
    }

    let existing = storefront_db::get_product_by_slug(&state.pool, &slug)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        .ok_or_else(|| ApiError::new(req_id.0.clone(), "not_found", "Product not found"))?;

    storefront_db::soft_delete_product(&state.pool, existing.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: serde_json::json!({"deleted": true}),
        meta: ResponseMeta::new(req_id.0),
    }))
}
