//! Order analytics aggregation.
//!
//! Summary counts are recomputed from the full order snapshot on every
//! change. No incremental maintenance: order volume is tens to low hundreds,
//! so a full pass is always cheap and always correct.

use std::panic::{catch_unwind, AssertUnwindSafe};

use chrono::{DateTime, Local, TimeZone};
use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CoreResult;
use crate::orders::{Order, OrderRepository, OrderStatus, OrderType};
use crate::store::{DocumentStore, Subscription};

/// Summary counts over an order snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total: usize,
    pub pending: usize,
    pub preparing: usize,
    pub ready: usize,
    pub delivered: usize,
    pub pickup: usize,
    pub delivery: usize,
    /// Orders created on the observer's local calendar day.
    pub today: usize,
}

/// Compute summary counts for a snapshot, with "today" evaluated against the
/// calendar day of `now` in `now`'s own timezone. Two orders a minute apart
/// across local midnight land in different buckets.
pub fn compute_analytics<Tz: TimeZone>(orders: &[Order], now: DateTime<Tz>) -> Analytics {
    let today = now.date_naive();
    let tz = now.timezone();

    let mut analytics = Analytics {
        total: orders.len(),
        ..Analytics::default()
    };

    for order in orders {
        match order.status {
            OrderStatus::Pending => analytics.pending += 1,
            OrderStatus::Preparing => analytics.preparing += 1,
            OrderStatus::Ready => analytics.ready += 1,
            OrderStatus::Delivered => analytics.delivered += 1,
        }
        match order.order_type {
            OrderType::Pickup => analytics.pickup += 1,
            OrderType::Delivery => analytics.delivery += 1,
        }
        if order.created_at.with_timezone(&tz).date_naive() == today {
            analytics.today += 1;
        }
    }

    debug!(
        "analytics recomputed: {} orders, {} today",
        analytics.total, analytics.today
    );
    analytics
}

/// Live analytics over the order collection, recomputed per pushed snapshot
/// using the local clock.
///
/// The computation is isolated per snapshot: if one recomputation panics the
/// subscription survives and future snapshots are still processed. A fetch
/// failure underneath the subscription itself is surfaced by the repository,
/// not swallowed here.
pub fn subscribe_analytics<S: DocumentStore>(
    repo: &OrderRepository<S>,
    callback: impl Fn(Analytics) + Send + Sync + 'static,
) -> CoreResult<Subscription> {
    repo.subscribe(move |orders| {
        let outcome = catch_unwind(AssertUnwindSafe(|| compute_analytics(&orders, Local::now())));
        match outcome {
            Ok(analytics) => callback(analytics),
            Err(_) => warn!("analytics recomputation panicked; snapshot skipped"),
        }
    })
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orders::fixtures::order_at;
    use crate::orders::{NewOrder, OrderItem, RawAmount};
    use chrono::{FixedOffset, Utc};
    use std::sync::{Arc, Mutex};

    fn accra_noon() -> DateTime<FixedOffset> {
        // UTC+0 offset but constructed explicitly to exercise the
        // timezone-conversion path.
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2024, 6, 15, 12, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_empty_snapshot_is_all_zero() {
        let analytics = compute_analytics(&[], accra_noon());
        assert_eq!(analytics, Analytics::default());
    }

    #[test]
    fn test_status_and_type_buckets_partition_the_total() {
        let now = accra_noon();
        let base = now.with_timezone(&Utc);
        let orders = vec![
            order_at("o1", OrderStatus::Pending, OrderType::Pickup, base),
            order_at("o2", OrderStatus::Pending, OrderType::Delivery, base),
            order_at("o3", OrderStatus::Preparing, OrderType::Pickup, base),
            order_at("o4", OrderStatus::Ready, OrderType::Delivery, base),
            order_at("o5", OrderStatus::Delivered, OrderType::Pickup, base),
            order_at("o6", OrderStatus::Delivered, OrderType::Delivery, base),
        ];

        let a = compute_analytics(&orders, now);
        assert_eq!(a.total, 6);
        assert_eq!(a.pending + a.preparing + a.ready + a.delivered, a.total);
        assert_eq!(a.pickup + a.delivery, a.total);
        assert_eq!(a.pending, 2);
        assert_eq!(a.preparing, 1);
        assert_eq!(a.ready, 1);
        assert_eq!(a.delivered, 2);
        assert_eq!(a.pickup, 3);
        assert_eq!(a.delivery, 3);
    }

    #[test]
    fn test_today_uses_local_calendar_day_not_a_24h_window() {
        let tz = FixedOffset::east_opt(5 * 3600).unwrap(); // UTC+5
        let late_night = tz.with_ymd_and_hms(2024, 6, 14, 23, 59, 59).unwrap();
        let early_morning = tz.with_ymd_and_hms(2024, 6, 15, 0, 0, 1).unwrap();

        let orders = vec![
            order_at(
                "late",
                OrderStatus::Pending,
                OrderType::Pickup,
                late_night.with_timezone(&Utc),
            ),
            order_at(
                "early",
                OrderStatus::Pending,
                OrderType::Pickup,
                early_morning.with_timezone(&Utc),
            ),
        ];

        // Two minutes apart, but different local calendar days.
        let on_the_14th = compute_analytics(&orders, late_night);
        assert_eq!(on_the_14th.today, 1);

        let on_the_15th = compute_analytics(&orders, early_morning);
        assert_eq!(on_the_15th.today, 1);

        // Same calendar day, same bucket.
        let both_on_15th = vec![
            order_at(
                "a",
                OrderStatus::Pending,
                OrderType::Pickup,
                early_morning.with_timezone(&Utc),
            ),
            order_at(
                "b",
                OrderStatus::Pending,
                OrderType::Pickup,
                tz.with_ymd_and_hms(2024, 6, 15, 20, 0, 0)
                    .unwrap()
                    .with_timezone(&Utc),
            ),
        ];
        assert_eq!(compute_analytics(&both_on_15th, early_morning).today, 2);
    }

    #[test]
    fn test_today_respects_the_observer_timezone() {
        // 2024-06-15 02:00 UTC is still 2024-06-14 in UTC-5.
        let created = Utc.with_ymd_and_hms(2024, 6, 15, 2, 0, 0).unwrap();
        let orders = vec![order_at(
            "o1",
            OrderStatus::Pending,
            OrderType::Pickup,
            created,
        )];

        let utc_observer = Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(compute_analytics(&orders, utc_observer).today, 1);

        let minus_five = FixedOffset::west_opt(5 * 3600).unwrap();
        let west_observer = minus_five.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap();
        assert_eq!(
            compute_analytics(&orders, west_observer).today,
            0,
            "02:00 UTC is the previous day at UTC-5"
        );
    }

    #[test]
    fn test_subscribe_analytics_recomputes_on_every_change() {
        let store = Arc::new(crate::db::SqliteStore::open_in_memory().expect("open store"));
        let repo = OrderRepository::new(store);

        let seen: Arc<Mutex<Vec<Analytics>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let _sub = subscribe_analytics(&repo, move |a| {
            sink.lock().expect("sink lock").push(a);
        })
        .expect("subscribe");

        repo.create(NewOrder {
            customer_name: "Ama".into(),
            customer_phone: "0244000000".into(),
            order_type: OrderType::Pickup,
            items: vec![OrderItem {
                name: "Waakye".into(),
                size: String::new(),
                quantity: 1,
                price: 30.0,
                extras: vec![],
            }],
            total: RawAmount::Number(30.0),
            delivery_address: None,
            delivery_fee: None,
        })
        .expect("create");

        let snapshots = seen.lock().expect("lock").clone();
        assert_eq!(snapshots.len(), 2, "initial snapshot plus one change");
        assert_eq!(snapshots[0].total, 0);
        assert_eq!(snapshots[1].total, 1);
        assert_eq!(snapshots[1].pending, 1);
        assert_eq!(snapshots[1].today, 1, "just-created order is today");
    }
}
