//! Order number generation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

static SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Generates an opaque, unique order number: `ORD` + millisecond timestamp +
/// a process-local sequence suffix.
///
/// Two calls in the same millisecond get different suffixes, so numbers never
/// collide within a process; the `orders.order_number` unique constraint
/// backstops everything else.
#[must_use]
pub fn generate_order_number() -> String {
    let millis = Utc::now().timestamp_millis();
    let seq = SEQUENCE.fetch_add(1, Ordering::Relaxed) % 10_000;
    format!("ORD{millis}{seq:04}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn order_numbers_are_prefixed_and_unique() {
        let numbers: HashSet<String> = (0..1_000).map(|_| generate_order_number()).collect();
        assert_eq!(numbers.len(), 1_000);
        assert!(numbers.iter().all(|n| n.starts_with("ORD")));
    }
}
