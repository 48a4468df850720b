mod admin;
mod cart;
mod catalog;
mod comparisons;
mod coupons;
mod orders;
mod products;
mod reviews;
mod wishlist;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_bearer_auth, AuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            // Conflicting writes answer 400 like any other rejected input.
            "bad_request" | "validation_error" | "conflict" => StatusCode::BAD_REQUEST,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn normalize_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

pub(super) fn map_db_error(request_id: String, error: &storefront_db::DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new(request_id, "internal_error", "database query failed")
}

pub(super) fn forbidden(request_id: String) -> ApiError {
    ApiError::new(request_id, "forbidden", "you do not have access to this resource")
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/v1/products/{slug}",
            get(products::get_product)
                .patch(products::update_product)
                .delete(products::deactivate_product),
        )
        .route(
            "/api/v1/products/{id}/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/api/v1/reviews/{id}",
            put(reviews::update_review).delete(reviews::delete_review),
        )
        .route("/api/v1/brands", get(catalog::list_brands))
        .route("/api/v1/brands/{slug}", get(catalog::get_brand))
        .route("/api/v1/categories", get(catalog::list_categories))
        .route("/api/v1/categories/{slug}", get(catalog::get_category))
        .route(
            "/api/v1/categories/{slug}/children",
            get(catalog::list_category_children),
        )
        .route(
            "/api/v1/coupons",
            get(coupons::list_coupons).post(coupons::create_coupon),
        )
        .route("/api/v1/coupons/active", get(coupons::list_active_coupons))
        .route("/api/v1/coupons/validate", post(coupons::validate_coupon))
        .route(
            "/api/v1/coupons/{id}",
            put(coupons::update_coupon).delete(coupons::delete_coupon),
        )
        .route("/api/v1/orders", post(orders::create_order))
        .route("/api/v1/orders/my-orders", get(orders::list_my_orders))
        .route("/api/v1/orders/{id}", get(orders::get_order))
        .route("/api/v1/orders/{id}/status", put(orders::update_order_status))
        .route(
            "/api/v1/cart",
            get(cart::get_cart).delete(cart::clear_cart),
        )
        .route(
            "/api/v1/cart/{product_id}",
            post(cart::add_to_cart)
                .put(cart::set_quantity)
                .delete(cart::remove_from_cart),
        )
        .route("/api/v1/wishlist", get(wishlist::list_wishlist))
        .route(
            "/api/v1/wishlist/{product_id}",
            post(wishlist::add_to_wishlist).delete(wishlist::remove_from_wishlist),
        )
        .route(
            "/api/v1/comparisons",
            get(comparisons::list_comparisons).post(comparisons::create_comparison),
        )
        .route(
            "/api/v1/comparisons/{id}",
            get(comparisons::get_comparison).delete(comparisons::delete_comparison),
        )
        .route(
            "/api/v1/comparisons/{id}/products/{product_id}",
            post(comparisons::add_product).delete(comparisons::remove_product),
        )
        .route("/api/v1/admin/stats", get(admin::get_stats))
        .route("/api/v1/admin/orders", get(admin::list_orders))
        .route("/api/v1/admin/users", get(admin::list_users))
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/api/v1/health", get(health));

    Router::new()
        .merge(public_routes)
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match storefront_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
