//! Database operations for `reviews`, including the rating aggregate.
//!
//! Every mutation runs in one transaction that locks the product row, applies
//! the change, and rewrites `average_rating` and `review_count` together from
//! the full current rating set. The two fields never drift apart, and
//! concurrent mutations for the same product serialize on the row lock.

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use thiserror::Error;

use crate::DbError;

/// A row from the `reviews` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewRow {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub images: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A review joined with its author's display fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ReviewWithUserRow {
    pub id: i64,
    pub user_id: i64,
    pub product_id: i64,
    pub rating: i32,
    pub comment: Option<String>,
    pub images: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub first_name: String,
    pub last_name: String,
}

const REVIEW_COLUMNS: &str =
    "id, user_id, product_id, rating, comment, images, created_at, updated_at";

/// Why a review mutation was refused.
#[derive(Debug, Error)]
pub enum ReviewError {
    #[error("Product not found")]
    ProductNotFound,
    #[error("Review not found")]
    ReviewNotFound,
    #[error("You have already reviewed this product")]
    DuplicateReview,
    #[error(transparent)]
    Db(#[from] DbError),
}

impl From<sqlx::Error> for ReviewError {
    fn from(e: sqlx::Error) -> Self {
        ReviewError::Db(DbError::Sqlx(e))
    }
}

/// Sort orders for the review listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReviewSort {
    #[default]
    Latest,
    Oldest,
    Highest,
    Lowest,
}

impl ReviewSort {
    fn order_by(self) -> &'static str {
        match self {
            ReviewSort::Latest => "r.created_at DESC",
            ReviewSort::Oldest => "r.created_at ASC",
            ReviewSort::Highest => "r.rating DESC, r.created_at DESC",
            ReviewSort::Lowest => "r.rating ASC, r.created_at DESC",
        }
    }
}

/// Returns a page of reviews for a product with author names.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_product_reviews(
    pool: &PgPool,
    product_id: i64,
    sort: ReviewSort,
    limit: i64,
    offset: i64,
) -> Result<Vec<ReviewWithUserRow>, DbError> {
    let sql = format!(
        "SELECT r.id, r.user_id, r.product_id, r.rating, r.comment, r.images, r.created_at, \
                u.first_name, u.last_name \
         FROM reviews r \
         JOIN users u ON u.id = r.user_id \
         WHERE r.product_id = $1 \
         ORDER BY {order_by} \
         LIMIT $2 OFFSET $3",
        order_by = sort.order_by(),
    );
    let rows = sqlx::query_as::<_, ReviewWithUserRow>(&sql)
        .bind(product_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns a review by id, or `None`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_review(pool: &PgPool, review_id: i64) -> Result<Option<ReviewRow>, DbError> {
    let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1");
    let row = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(review_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Rewrites the product's rating aggregate from the full current rating set.
///
/// Both fields are written in one statement; an empty set resets to (0, 0).
/// Callers must hold the product row lock in the same transaction.
async fn recompute_rating(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products \
         SET average_rating = COALESCE( \
                 (SELECT ROUND(AVG(rating)::numeric, 2) FROM reviews WHERE product_id = $1), 0), \
             review_count = (SELECT COUNT(*) FROM reviews WHERE product_id = $1), \
             updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(product_id)
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Locks the product row, returning whether it exists.
async fn lock_product(
    tx: &mut Transaction<'_, Postgres>,
    product_id: i64,
) -> Result<bool, sqlx::Error> {
    let id: Option<i64> = sqlx::query_scalar("SELECT id FROM products WHERE id = $1 FOR UPDATE")
        .bind(product_id)
        .fetch_optional(&mut **tx)
        .await?;
    Ok(id.is_some())
}

/// Creates a review and updates the product's rating aggregate atomically.
///
/// # Errors
///
/// Returns [`ReviewError::DuplicateReview`] when the user already reviewed
/// the product, [`ReviewError::ProductNotFound`] for an unknown product, or
/// a storage error.
pub async fn create_review(
    pool: &PgPool,
    user_id: i64,
    product_id: i64,
    rating: i32,
    comment: Option<&str>,
    images: &[String],
) -> Result<ReviewRow, ReviewError> {
    let mut tx = pool.begin().await?;

    if !lock_product(&mut tx, product_id).await? {
        return Err(ReviewError::ProductNotFound);
    }

    let sql = format!(
        "INSERT INTO reviews (user_id, product_id, rating, comment, images) \
         VALUES ($1, $2, $3, $4, $5) \
         RETURNING {REVIEW_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(user_id)
        .bind(product_id)
        .bind(rating)
        .bind(comment)
        .bind(serde_json::json!(images))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            let e = DbError::from(e);
            if e.is_unique_violation() {
                ReviewError::DuplicateReview
            } else {
                ReviewError::Db(e)
            }
        })?;

    recompute_rating(&mut tx, product_id).await?;
    tx.commit().await?;
    Ok(row)
}

/// Updates a review's rating, comment, or image list; recomputes the
/// aggregate only when the rating actually changed.
///
/// # Errors
///
/// Returns [`ReviewError::ReviewNotFound`] for an unknown review, or a
/// storage error.
pub async fn update_review(
    pool: &PgPool,
    review_id: i64,
    rating: Option<i32>,
    comment: Option<&str>,
    images: Option<&[String]>,
) -> Result<ReviewRow, ReviewError> {
    let mut tx = pool.begin().await?;

    let sql = format!("SELECT {REVIEW_COLUMNS} FROM reviews WHERE id = $1 FOR UPDATE");
    let existing = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(review_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(ReviewError::ReviewNotFound)?;

    let rating_changed = rating.is_some_and(|r| r != existing.rating);
    if rating_changed && !lock_product(&mut tx, existing.product_id).await? {
        return Err(ReviewError::ProductNotFound);
    }

    let sql = format!(
        "UPDATE reviews \
         SET rating = COALESCE($2, rating), \
             comment = COALESCE($3, comment), \
             images = COALESCE($4, images), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {REVIEW_COLUMNS}"
    );
    let row = sqlx::query_as::<_, ReviewRow>(&sql)
        .bind(review_id)
        .bind(rating)
        .bind(comment)
        .bind(images.map(|imgs| serde_json::json!(imgs)))
        .fetch_one(&mut *tx)
        .await?;

    if rating_changed {
        recompute_rating(&mut tx, existing.product_id).await?;
    }

    tx.commit().await?;
    Ok(row)
}

/// Deletes a review and updates the product's rating aggregate atomically.
/// Deleting the last review resets the aggregate to (0, 0).
///
/// # Errors
///
/// Returns [`ReviewError::ReviewNotFound`] for an unknown review, or a
/// storage error.
pub async fn delete_review(pool: &PgPool, review_id: i64) -> Result<(), ReviewError> {
    let mut tx = pool.begin().await?;

    let product_id: Option<i64> =
        sqlx::query_scalar("SELECT product_id FROM reviews WHERE id = $1 FOR UPDATE")
            .bind(review_id)
            .fetch_optional(&mut *tx)
            .await?;
    let product_id = product_id.ok_or(ReviewError::ReviewNotFound)?;

    lock_product(&mut tx, product_id).await?;

    sqlx::query("DELETE FROM reviews WHERE id = $1")
        .bind(review_id)
        .execute(&mut *tx)
        .await?;

    recompute_rating(&mut tx, product_id).await?;
    tx.commit().await?;
    Ok(())
}
