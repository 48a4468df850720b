//! Database operations for the `products` table.
//!
//! `stock`, `sold_count`, `average_rating`, and `review_count` are store-owned
//! aggregates: nothing in this module writes them. Stock and sold counts move
//! only through [`crate::checkout`], the rating fields only through
//! [`crate::reviews`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub sku: Option<String>,
    pub description: Option<String>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock: i32,
    pub sold_count: i32,
    pub average_rating: Decimal,
    pub review_count: i32,
    pub brand_id: i64,
    pub category_id: i64,
    pub is_active: bool,
    pub is_featured: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const PRODUCT_COLUMNS: &str = "id, name, slug, sku, description, price, original_price, stock, \
     sold_count, average_rating, review_count, brand_id, category_id, \
     is_active, is_featured, created_at, updated_at";

/// Sort orders supported by the product listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    BestSelling,
    TopRated,
}

impl ProductSort {
    fn order_by(self) -> &'static str {
        match self {
            ProductSort::Newest => "created_at DESC",
            ProductSort::PriceAsc => "price ASC",
            ProductSort::PriceDesc => "price DESC",
            ProductSort::BestSelling => "sold_count DESC",
            ProductSort::TopRated => "average_rating DESC, review_count DESC",
        }
    }
}

/// Input filters for the product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductListFilters<'a> {
    pub brand_slug: Option<&'a str>,
    pub category_slug: Option<&'a str>,
    pub search: Option<&'a str>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub featured: Option<bool>,
    pub sort: ProductSort,
    pub limit: i64,
    pub offset: i64,
}

/// Returns active products matching the filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductListFilters<'_>,
) -> Result<Vec<ProductRow>, DbError> {
    let sql = format!(
        "SELECT {PRODUCT_COLUMNS} \
         FROM products \
         WHERE is_active = true \
           AND ($1::TEXT IS NULL OR brand_id = (SELECT id FROM brands WHERE slug = $1)) \
           AND ($2::TEXT IS NULL OR category_id = (SELECT id FROM categories WHERE slug = $2)) \
           AND ($3::TEXT IS NULL OR name ILIKE '%' || $3 || '%' \
                OR description ILIKE '%' || $3 || '%') \
           AND ($4::NUMERIC IS NULL OR price >= $4) \
           AND ($5::NUMERIC IS NULL OR price <= $5) \
           AND ($6::BOOL IS NULL OR is_featured = $6) \
         ORDER BY {order_by} \
         LIMIT $7 OFFSET $8",
        order_by = filters.sort.order_by(),
    );

    let rows = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(filters.brand_slug)
        .bind(filters.category_slug)
        .bind(filters.search)
        .bind(filters.min_price)
        .bind(filters.max_price)
        .bind(filters.featured)
        .bind(filters.limit)
        .bind(filters.offset)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns a single active product by slug, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_slug(
    pool: &PgPool,
    slug: &str,
) -> Result<Option<ProductRow>, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE slug = $1 AND is_active = true");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Returns a single active product by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_id(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1 AND is_active = true");
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row)
}

/// Fields for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct<'a> {
    pub name: &'a str,
    pub slug: &'a str,
    pub sku: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub stock: i32,
    pub brand_id: i64,
    pub category_id: i64,
    pub is_featured: bool,
}

/// Creates a new product row and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including unique constraint
/// violations on slug/sku).
pub async fn create_product(pool: &PgPool, product: &NewProduct<'_>) -> Result<ProductRow, DbError> {
    let sql = format!(
        "INSERT INTO products \
           (name, slug, sku, description, price, original_price, stock, \
            brand_id, category_id, is_featured) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product.name)
        .bind(product.slug)
        .bind(product.sku)
        .bind(product.description)
        .bind(product.price)
        .bind(product.original_price)
        .bind(product.stock)
        .bind(product.brand_id)
        .bind(product.category_id)
        .bind(product.is_featured)
        .fetch_one(pool)
        .await?;

    Ok(row)
}

/// Sparse update fields for a product. `None` preserves the current value.
///
/// Stock and the aggregate fields are deliberately absent; they have their
/// own single write paths.
#[derive(Debug, Clone, Default)]
pub struct ProductUpdate<'a> {
    pub name: Option<&'a str>,
    pub description: Option<&'a str>,
    pub price: Option<Decimal>,
    pub original_price: Option<Decimal>,
    pub category_id: Option<i64>,
    pub is_featured: Option<bool>,
}

/// Applies a sparse update to a product and returns the updated row.
///
/// Uses `COALESCE` in a single `UPDATE … RETURNING` so there is no separate
/// SELECT + UPDATE race.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the product does not exist, or
/// [`DbError::Sqlx`] if the query fails.
pub async fn update_product(
    pool: &PgPool,
    product_id: i64,
    update: &ProductUpdate<'_>,
) -> Result<ProductRow, DbError> {
    let sql = format!(
        "UPDATE products \
         SET name           = COALESCE($2, name), \
             description    = COALESCE($3, description), \
             price          = COALESCE($4, price), \
             original_price = COALESCE($5, original_price), \
             category_id    = COALESCE($6, category_id), \
             is_featured    = COALESCE($7, is_featured), \
             updated_at     = NOW() \
         WHERE id = $1 \
         RETURNING {PRODUCT_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ProductRow>(&sql)
        .bind(product_id)
        .bind(update.name)
        .bind(update.description)
        .bind(update.price)
        .bind(update.original_price)
        .bind(update.category_id)
        .bind(update.is_featured)
        .fetch_optional(pool)
        .await?;

    row.ok_or(DbError::NotFound)
}

/// Soft-deletes a product by setting `is_active = false`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn soft_delete_product(pool: &PgPool, product_id: i64) -> Result<(), DbError> {
    sqlx::query(
        "UPDATE products \
         SET is_active = false, updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(product_id)
    .execute(pool)
    .await?;
    Ok(())
}
