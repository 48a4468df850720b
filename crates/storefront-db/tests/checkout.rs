//! Checkout pipeline tests against a live Postgres instance.

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use storefront_core::domain::{Address, PaymentMethod};
use storefront_core::CouponRejection;
use storefront_db::checkout::{place_order, CheckoutError, NewOrder, OrderItemRequest};

fn test_address() -> Address {
    Address {
        full_name: "Test Customer".to_string(),
        line1: "1 Main St".to_string(),
        line2: None,
        city: "Austin".to_string(),
        state: "TX".to_string(),
        postal_code: "78701".to_string(),
        country: "US".to_string(),
        phone: None,
    }
}

async fn seed_user(pool: &PgPool, email: &str) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO users (email, first_name, last_name, role, api_token) \
         VALUES ($1, 'Test', 'Customer', 'customer', $1) RETURNING id",
    )
    .bind(email)
    .fetch_one(pool)
    .await
    .expect("seed user")
}

async fn seed_product(pool: &PgPool, slug: &str, price: Decimal, stock: i32) -> i64 {
    let brand_id: i64 = sqlx::query_scalar(
        "INSERT INTO brands (name, slug) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("Brand {slug}"))
    .bind(format!("brand-{slug}"))
    .fetch_one(pool)
    .await
    .expect("seed brand");

    let category_id: i64 = sqlx::query_scalar(
        "INSERT INTO categories (name, slug) VALUES ($1, $2) RETURNING id",
    )
    .bind(format!("Category {slug}"))
    .bind(format!("category-{slug}"))
    .fetch_one(pool)
    .await
    .expect("seed category");

    sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (name, slug, price, stock, brand_id, category_id) \
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING id",
    )
    .bind(format!("Product {slug}"))
    .bind(slug)
    .bind(price)
    .bind(stock)
    .bind(brand_id)
    .bind(category_id)
    .fetch_one(pool)
    .await
    .expect("seed product")
}

async fn seed_coupon(
    pool: &PgPool,
    code: &str,
    discount_type: &str,
    value: Decimal,
    max_discount: Option<Decimal>,
    usage_limit: Option<i32>,
) -> i64 {
    sqlx::query_scalar::<_, i64>(
        "INSERT INTO coupons \
           (code, discount_type, discount_value, max_discount, usage_limit, \
            valid_from, valid_until) \
         VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING id",
    )
    .bind(code)
    .bind(discount_type)
    .bind(value)
    .bind(max_discount)
    .bind(usage_limit)
    .bind(Utc::now() - Duration::days(1))
    .bind(Utc::now() + Duration::days(1))
    .fetch_one(pool)
    .await
    .expect("seed coupon")
}

async fn product_counters(pool: &PgPool, product_id: i64) -> (i32, i32) {
    sqlx::query_as::<_, (i32, i32)>("SELECT stock, sold_count FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_one(pool)
        .await
        .expect("product counters")
}

fn order_for<'a>(
    user_id: i64,
    items: &'a [OrderItemRequest],
    address: &'a Address,
    coupon_code: Option<&'a str>,
) -> NewOrder<'a> {
    NewOrder {
        user_id,
        items,
        shipping_address: address,
        billing_address: address,
        payment_method: PaymentMethod::CreditCard,
        coupon_code,
        notes: None,
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn plain_order_prices_and_decrements_stock(pool: PgPool) {
    let user_id = seed_user(&pool, "plain@example.com").await;
    let product_id = seed_product(&pool, "gadget", Decimal::new(10_000, 2), 5).await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 2,
    }];
    let placed = place_order(&pool, &order_for(user_id, &items, &address, None))
        .await
        .expect("order placed");

    assert_eq!(placed.order.total_amount, Decimal::new(20_000, 2));
    assert_eq!(placed.order.tax_amount, Decimal::new(2_000, 2));
    assert_eq!(placed.order.shipping_amount, Decimal::ZERO);
    assert_eq!(placed.order.discount_amount, Decimal::ZERO);
    assert_eq!(placed.order.final_amount, Decimal::new(22_000, 2));
    assert_eq!(placed.order.status, "pending");
    assert!(placed.order.order_number.starts_with("ORD"));

    assert_eq!(placed.items.len(), 1);
    assert_eq!(placed.items[0].unit_price, Decimal::new(10_000, 2));
    assert_eq!(placed.items[0].total_price, Decimal::new(20_000, 2));

    let (stock, sold_count) = product_counters(&pool, product_id).await;
    assert_eq!(stock, 3);
    assert_eq!(sold_count, 2);
}

#[sqlx::test(migrations = "../../migrations")]
async fn capped_percentage_coupon_reduces_final_amount(pool: PgPool) {
    let user_id = seed_user(&pool, "coupon@example.com").await;
    let product_id = seed_product(&pool, "widget", Decimal::new(10_000, 2), 5).await;
    seed_coupon(
        &pool,
        "SAVE10",
        "percentage",
        Decimal::new(10, 0),
        Some(Decimal::new(15, 0)),
        None,
    )
    .await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 2,
    }];
    let placed = place_order(&pool, &order_for(user_id, &items, &address, Some("SAVE10")))
        .await
        .expect("order placed");

    // 200 - 15 (capped) + 0 + 20 = 205
    assert_eq!(placed.order.discount_amount, Decimal::new(15, 0));
    assert_eq!(placed.order.final_amount, Decimal::new(20_500, 2));

    let coupon = placed.coupon.expect("coupon attached");
    assert_eq!(coupon.used_count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn oversized_fixed_coupon_clamps_final_amount_to_zero(pool: PgPool) {
    let user_id = seed_user(&pool, "fixed@example.com").await;
    let product_id = seed_product(&pool, "trinket", Decimal::new(10_000, 2), 5).await;
    seed_coupon(&pool, "BIGFIX", "fixed", Decimal::new(500, 0), None, None).await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 1,
    }];
    let placed = place_order(&pool, &order_for(user_id, &items, &address, Some("BIGFIX")))
        .await
        .expect("order placed");

    assert_eq!(placed.order.final_amount, Decimal::ZERO);
    assert_eq!(
        placed.order.final_amount,
        placed.order.total_amount - placed.order.discount_amount
            + placed.order.shipping_amount
            + placed.order.tax_amount
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn insufficient_stock_rejects_without_any_writes(pool: PgPool) {
    let user_id = seed_user(&pool, "nostock@example.com").await;
    let product_id = seed_product(&pool, "scarce", Decimal::new(5_000, 2), 1).await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 2,
    }];
    let err = place_order(&pool, &order_for(user_id, &items, &address, None))
        .await
        .expect_err("should reject");
    assert!(matches!(err, CheckoutError::InsufficientStock { ref product } if product == "Product scarce"));

    let (stock, sold_count) = product_counters(&pool, product_id).await;
    assert_eq!(stock, 1);
    assert_eq!(sold_count, 0);

    let orders: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(orders, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_product_rejects(pool: PgPool) {
    let user_id = seed_user(&pool, "ghost@example.com").await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id: 424_242,
        quantity: 1,
    }];
    let err = place_order(&pool, &order_for(user_id, &items, &address, None))
        .await
        .expect_err("should reject");
    assert!(matches!(err, CheckoutError::ProductNotFound(424_242)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn duplicate_lines_for_one_product_are_checked_together(pool: PgPool) {
    let user_id = seed_user(&pool, "split@example.com").await;
    let product_id = seed_product(&pool, "split", Decimal::new(1_000, 2), 3).await;

    let address = test_address();
    let items = [
        OrderItemRequest {
            product_id,
            quantity: 2,
        },
        OrderItemRequest {
            product_id,
            quantity: 2,
        },
    ];
    let err = place_order(&pool, &order_for(user_id, &items, &address, None))
        .await
        .expect_err("combined quantity exceeds stock");
    assert!(matches!(err, CheckoutError::InsufficientStock { .. }));

    let (stock, _) = product_counters(&pool, product_id).await;
    assert_eq!(stock, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn coupon_below_minimum_order_amount_rejects(pool: PgPool) {
    let user_id = seed_user(&pool, "minimum@example.com").await;
    let product_id = seed_product(&pool, "cheap", Decimal::new(1_000, 2), 5).await;
    let coupon_id = seed_coupon(&pool, "MIN50", "fixed", Decimal::new(5, 0), None, None).await;
    sqlx::query("UPDATE coupons SET min_order_amount = 50 WHERE id = $1")
        .bind(coupon_id)
        .execute(&pool)
        .await
        .expect("set minimum");

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 1,
    }];
    let err = place_order(&pool, &order_for(user_id, &items, &address, Some("MIN50")))
        .await
        .expect_err("below minimum");
    assert!(matches!(
        err,
        CheckoutError::Coupon(CouponRejection::MinimumNotMet { .. })
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn concurrent_orders_cannot_oversell(pool: PgPool) {
    let user_a = seed_user(&pool, "race-a@example.com").await;
    let user_b = seed_user(&pool, "race-b@example.com").await;
    let product_id = seed_product(&pool, "contested", Decimal::new(2_500, 2), 5).await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 3,
    }];

    let request_a = order_for(user_a, &items, &address, None);
    let request_b = order_for(user_b, &items, &address, None);
    let (first, second) = futures::join!(
        place_order(&pool, &request_a),
        place_order(&pool, &request_b),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "exactly one order should win the stock");

    let failure = if first.is_err() { first } else { second };
    assert!(matches!(
        failure.expect_err("one must fail"),
        CheckoutError::InsufficientStock { .. }
    ));

    let (stock, sold_count) = product_counters(&pool, product_id).await;
    assert_eq!(stock, 2);
    assert_eq!(sold_count, 3);
}

#[sqlx::test(migrations = "../../migrations")]
async fn coupon_usage_limit_holds_under_concurrency(pool: PgPool) {
    let user_a = seed_user(&pool, "limit-a@example.com").await;
    let user_b = seed_user(&pool, "limit-b@example.com").await;
    let product_id = seed_product(&pool, "plentiful", Decimal::new(5_000, 2), 100).await;
    seed_coupon(
        &pool,
        "ONCE",
        "fixed",
        Decimal::new(5, 0),
        None,
        Some(1),
    )
    .await;

    let address = test_address();
    let items = [OrderItemRequest {
        product_id,
        quantity: 1,
    }];

    let request_a = order_for(user_a, &items, &address, Some("ONCE"));
    let request_b = order_for(user_b, &items, &address, Some("ONCE"));
    let (first, second) = futures::join!(
        place_order(&pool, &request_a),
        place_order(&pool, &request_b),
    );

    let successes = [&first, &second].iter().filter(|r| r.is_ok()).count();
    assert_eq!(successes, 1, "the single-use coupon must apply exactly once");

    let failure = if first.is_err() { first } else { second };
    assert!(matches!(
        failure.expect_err("one must fail"),
        CheckoutError::Coupon(CouponRejection::LimitExceeded)
    ));

    let used_count: i32 = sqlx::query_scalar("SELECT used_count FROM coupons WHERE code = 'ONCE'")
        .fetch_one(&pool)
        .await
        .expect("used_count");
    assert_eq!(used_count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn empty_order_rejects_before_touching_the_store(pool: PgPool) {
    let user_id = seed_user(&pool, "empty@example.com").await;

    let address = test_address();
    let err = place_order(&pool, &order_for(user_id, &[], &address, None))
        .await
        .expect_err("empty order");
    assert!(matches!(err, CheckoutError::EmptyOrder));
}
