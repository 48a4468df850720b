//! Rating aggregate tests against a live Postgres instance.

use rust_decimal::Decimal;
use sqlx::PgPool;

use storefront_db::reviews::{
    create_review, delete_review, list_product_reviews, update_review, ReviewError, ReviewSort,
};

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, first_name, last_name, role, api_token) \
         VALUES ($1, 'Review', 'Author', 'customer', $1) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("seed user")
}

async fn seed_product(pool: &PgPool, slug: &str) -> i64 {
    let brand_id: i64 =
        sqlx::query_scalar("INSERT INTO brands (name, slug) VALUES ($1, $2) RETURNING id")
            .bind(format!("Brand {slug}"))
            .bind(format!("brand-{slug}"))
            .fetch_one(pool)
            .await
            .expect("seed brand");

    let category_id: i64 =
        sqlx::query_scalar("INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id")
            .bind(format!("Category {slug}"))
            .bind(format!("category-{slug}"))
            .fetch_one(pool)
            .await
            .expect("seed category");

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (name, slug, price, stock, brand_id, category_id) \
         VALUES ($1, $2, 10, 10, $3, $4) RETURNING id",
    )
    .bind(format!("Product {slug}"))
    .bind(slug)
    .bind(brand_id)
    .bind(category_id)
    .fetch_one(pool)
    .await
    .expect("seed product")
}

async fn rating_aggregate(pool: &PgPool, product_id: i64) -> (Decimal, i32) {
    sqlx::query_as::<_, (Decimal, i32)>(
        "SELECT average_rating, review_count FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_one(pool)
    .await
    .expect("rating aggregate")
}

#[sqlx::test(migrations = "../../migrations")]
async fn creating_reviews_updates_the_aggregate(pool: PgPool) {
    let product_id = seed_product(&pool, "rated").await;
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;

    create_review(&pool, alice, product_id, 5, Some("Great"), &[])
        .await
        .expect("first review");
    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(500, 2));
    assert_eq!(count, 1);

    create_review(&pool, bob, product_id, 4, None, &[])
        .await
        .expect("second review");
    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(450, 2));
    assert_eq!(count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn second_review_from_same_user_is_rejected(pool: PgPool) {
    let product_id = seed_product(&pool, "once").await;
    let alice = seed_user(&pool, "alice@example.com").await;

    create_review(&pool, alice, product_id, 3, None, &[])
        .await
        .expect("first review");
    let err = create_review(&pool, alice, product_id, 5, None, &[])
        .await
        .expect_err("duplicate should fail");
    assert!(matches!(err, ReviewError::DuplicateReview));

    let (_, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn review_for_unknown_product_is_rejected(pool: PgPool) {
    let alice = seed_user(&pool, "alice@example.com").await;

    let err = create_review(&pool, alice, 999_999, 4, None, &[])
        .await
        .expect_err("unknown product");
    assert!(matches!(err, ReviewError::ProductNotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn changing_the_rating_recomputes_the_average(pool: PgPool) {
    let product_id = seed_product(&pool, "revised").await;
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;

    let review = create_review(&pool, alice, product_id, 2, None, &[])
        .await
        .expect("alice review");
    create_review(&pool, bob, product_id, 4, None, &[])
        .await
        .expect("bob review");

    update_review(&pool, review.id, Some(5), None, None)
        .await
        .expect("update rating");
    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(450, 2));
    assert_eq!(count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn comment_only_update_leaves_the_aggregate_alone(pool: PgPool) {
    let product_id = seed_product(&pool, "comment").await;
    let alice = seed_user(&pool, "alice@example.com").await;

    let review = create_review(&pool, alice, product_id, 3, Some("ok"), &[])
        .await
        .expect("review");

    let updated = update_review(&pool, review.id, None, Some("actually fine"), None)
        .await
        .expect("update comment");
    assert_eq!(updated.rating, 3);
    assert_eq!(updated.comment.as_deref(), Some("actually fine"));

    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(300, 2));
    assert_eq!(count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn review_images_are_stored_and_replaced(pool: PgPool) {
    let product_id = seed_product(&pool, "pictured").await;
    let alice = seed_user(&pool, "alice@example.com").await;

    let photos = ["https://cdn.example.com/r1.jpg".to_string()];
    let review = create_review(&pool, alice, product_id, 4, Some("nice"), &photos)
        .await
        .expect("review with images");
    assert_eq!(
        review.images,
        serde_json::json!(["https://cdn.example.com/r1.jpg"])
    );

    // An update without images keeps the stored list.
    let updated = update_review(&pool, review.id, None, Some("still nice"), None)
        .await
        .expect("comment update");
    assert_eq!(updated.images, review.images);

    let replacement = ["https://cdn.example.com/r2.jpg".to_string()];
    let updated = update_review(&pool, review.id, None, None, Some(&replacement))
        .await
        .expect("image update");
    assert_eq!(
        updated.images,
        serde_json::json!(["https://cdn.example.com/r2.jpg"])
    );

    let listed = list_product_reviews(&pool, product_id, ReviewSort::Latest, 10, 0)
        .await
        .expect("list");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].images, updated.images);
}

#[sqlx::test(migrations = "../../migrations")]
async fn deleting_the_last_review_resets_the_aggregate(pool: PgPool) {
    let product_id = seed_product(&pool, "cleared").await;
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;

    let first = create_review(&pool, alice, product_id, 5, None, &[])
        .await
        .expect("first review");
    let second = create_review(&pool, bob, product_id, 1, None, &[])
        .await
        .expect("second review");

    delete_review(&pool, first.id).await.expect("delete first");
    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(100, 2));
    assert_eq!(count, 1);

    delete_review(&pool, second.id)
        .await
        .expect("delete second");
    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::ZERO);
    assert_eq!(count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_reviews_serialize_on_the_product_row(pool: PgPool) {
    let product_id = seed_product(&pool, "busy").await;
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;

    let (first, second) = futures::join!(
        create_review(&pool, alice, product_id, 5, None, &[]),
        create_review(&pool, bob, product_id, 3, None, &[]),
    );
    first.expect("alice review");
    second.expect("bob review");

    let (average, count) = rating_aggregate(&pool, product_id).await;
    assert_eq!(average, Decimal::new(400, 2));
    assert_eq!(count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn listing_orders_reviews_by_rating(pool: PgPool) {
    let product_id = seed_product(&pool, "sorted").await;
    let alice = seed_user(&pool, "alice@example.com").await;
    let bob = seed_user(&pool, "bob@example.com").await;
    let cara = seed_user(&pool, "cara@example.com").await;

    create_review(&pool, alice, product_id, 2, None, &[])
        .await
        .expect("review");
    create_review(&pool, bob, product_id, 5, None, &[])
        .await
        .expect("review");
    create_review(&pool, cara, product_id, 4, None, &[])
        .await
        .expect("review");

    let highest = list_product_reviews(&pool, product_id, ReviewSort::Highest, 10, 0)
        .await
        .expect("list");
    let ratings: Vec<i32> = highest.iter().map(|r| r.rating).collect();
    assert_eq!(ratings, vec![5, 4, 2]);
}
