pub mod app_config;
pub mod config;
pub mod domain;
pub mod order_number;
pub mod pricing;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use domain::{
    Address, DiscountType, OrderStatus, PaymentMethod, PaymentStatus, Role, DomainError,
};
pub use order_number::generate_order_number;
pub use pricing::{
    evaluate_coupon, line_total, order_totals, CouponRejection, CouponTerms, OrderTotals, TAX_RATE,
};
