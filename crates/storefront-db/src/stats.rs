//! Aggregate counters for the admin dashboard.

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// Storewide counters shown on the admin dashboard.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AdminStats {
    pub total_orders: i64,
    pub pending_orders: i64,
    pub total_revenue: Decimal,
    pub total_products: i64,
    pub total_users: i64,
}

/// Computes the dashboard counters in a single round-trip.
///
/// Revenue sums `final_amount` over orders that were not cancelled or
/// refunded.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn admin_stats(pool: &PgPool) -> Result<AdminStats, DbError> {
    let stats = sqlx::query_as::<_, AdminStats>(
        "SELECT \
             (SELECT COUNT(*) FROM orders) AS total_orders, \
             (SELECT COUNT(*) FROM orders WHERE status = 'pending') AS pending_orders, \
             (SELECT COALESCE(SUM(final_amount), 0) FROM orders \
              WHERE status NOT IN ('cancelled', 'refunded')) AS total_revenue, \
             (SELECT COUNT(*) FROM products WHERE is_active = true) AS total_products, \
             (SELECT COUNT(*) FROM users WHERE is_active = true) AS total_users",
    )
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
