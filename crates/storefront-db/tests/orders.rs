//! Order status lifecycle tests against a live Postgres instance.

use rust_decimal::Decimal;
use sqlx::PgPool;

use storefront_core::domain::{Address, PaymentMethod};
use storefront_core::OrderStatus;
use storefront_db::checkout::{place_order, NewOrder, OrderItemRequest};
use storefront_db::orders::{update_order_status, StatusUpdateError};

async fn seed_order(pool: &PgPool) -> i64 {
    let user_id: i64 = sqlx::query_scalar(
        "INSERT INTO users (email, first_name, last_name, role, api_token) \
         VALUES ('order@example.com', 'Test', 'Customer', 'customer', 'tok') RETURNING id",
    )
    .fetch_one(pool)
    .await
    .expect("seed user");

    let brand_id: i64 =
        sqlx::query_scalar("INSERT INTO brands (name, slug) VALUES ('B', 'b') RETURNING id")
            .fetch_one(pool)
            .await
            .expect("seed brand");
    let category_id: i64 =
        sqlx::query_scalar("INSERT INTO categories (name, slug) VALUES ('C', 'c') RETURNING id")
            .fetch_one(pool)
            .await
            .expect("seed category");
    let product_id: i64 = sqlx::query_scalar(
        "INSERT INTO products (name, slug, price, stock, brand_id, category_id) \
         VALUES ('P', 'p', $1, 10, $2, $3) RETURNING id",
    )
    .bind(Decimal::new(2_500, 2))
    .bind(brand_id)
    .bind(category_id)
    .fetch_one(pool)
    .await
    .expect("seed product");

    let address = Address {
        full_name: "Test Customer".to_string(),
        line1: "1 Main St".to_string(),
        line2: None,
        city: "Austin".to_string(),
        state: "TX".to_string(),
        postal_code: "78701".to_string(),
        country: "US".to_string(),
        phone: None,
    };
    let items = [OrderItemRequest {
        product_id,
        quantity: 1,
    }];
    let placed = place_order(
        pool,
        &NewOrder {
            user_id,
            items: &items,
            shipping_address: &address,
            billing_address: &address,
            payment_method: PaymentMethod::Cod,
            coupon_code: None,
            notes: None,
        },
    )
    .await
    .expect("place order");
    placed.order.id
}

#[sqlx::test(migrations = "../../migrations")]
async fn orders_walk_the_forward_chain(pool: PgPool) {
    let order_id = seed_order(&pool).await;

    for next in [
        OrderStatus::Confirmed,
        OrderStatus::Processing,
        OrderStatus::Shipped,
        OrderStatus::Delivered,
    ] {
        let row = update_order_status(&pool, order_id, next)
            .await
            .expect("legal transition");
        assert_eq!(row.status, next.as_str());
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn skipping_a_lifecycle_step_is_rejected(pool: PgPool) {
    let order_id = seed_order(&pool).await;

    let err = update_order_status(&pool, order_id, OrderStatus::Shipped)
        .await
        .expect_err("pending cannot jump to shipped");
    assert!(matches!(
        err,
        StatusUpdateError::IllegalTransition {
            from: OrderStatus::Pending,
            to: OrderStatus::Shipped,
        }
    ));

    let status: String = sqlx::query_scalar("SELECT status FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_one(&pool)
        .await
        .expect("status");
    assert_eq!(status, "pending");
}

#[sqlx::test(migrations = "../../migrations")]
async fn cancelling_a_pending_order_is_final(pool: PgPool) {
    let order_id = seed_order(&pool).await;

    update_order_status(&pool, order_id, OrderStatus::Cancelled)
        .await
        .expect("cancel is legal from pending");

    let err = update_order_status(&pool, order_id, OrderStatus::Confirmed)
        .await
        .expect_err("cancelled is terminal");
    assert!(matches!(err, StatusUpdateError::IllegalTransition { .. }));
}

#[sqlx::test(migrations = "../../migrations")]
async fn unknown_order_reports_not_found(pool: PgPool) {
    let err = update_order_status(&pool, 987_654, OrderStatus::Confirmed)
        .await
        .expect_err("no such order");
    assert!(matches!(err, StatusUpdateError::NotFound));
}
