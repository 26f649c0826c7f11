//! Idempotency guard and event info cache over the in-memory store.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use flash_sale_core::{EventId, EventInfo, StockError, keys};
use flash_sale_testing::helpers::{cache_for, guard_for, test_service};
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct OrderReceipt {
    order_id: String,
    units: i64,
}

fn sample_event(id: u64) -> EventInfo {
    let starts_at = Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 0).unwrap();
    EventInfo {
        event_id: EventId::new(id),
        title: "Limited sneaker drop".to_string(),
        price_cents: 12_900,
        total_stock: 100,
        starts_at,
        ends_at: starts_at + ChronoDuration::hours(1),
    }
}

// ============================================================================
// Idempotency guard
// ============================================================================

#[tokio::test]
async fn test_message_is_first_seen_exactly_once() {
    let (service, _clock) = test_service();
    let guard = guard_for(&service);

    assert!(!guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());
    assert!(guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());
    assert!(guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());

    assert!(!guard.check_and_set_message_processed("msg-2", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn test_marker_expires_after_ttl() {
    let (service, clock) = test_service();
    let guard = guard_for(&service);

    assert!(!guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());

    clock.advance(Duration::from_secs(59));
    assert!(guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());

    clock.advance(Duration::from_secs(2));
    assert!(!guard.check_and_set_message_processed("msg-1", Duration::from_secs(60)).await.unwrap());
}

#[tokio::test]
async fn test_check_and_set_uses_configured_ttl() {
    let (service, _clock) = test_service();
    let guard = guard_for(&service);

    assert!(!guard.check_and_set("msg-ttl").await.unwrap());

    let ttl = service.store().ttl(&keys::idempotency_key("msg-ttl")).unwrap();
    assert_eq!(ttl, Some(service.config().idempotency_ttl));
}

#[tokio::test]
async fn test_cached_result_replaces_marker() {
    let (service, _clock) = test_service();
    let guard = guard_for(&service);
    let receipt = OrderReceipt {
        order_id: "ord-17".to_string(),
        units: 2,
    };

    assert_eq!(guard.cached_result::<OrderReceipt>("req-1").await.unwrap(), None);

    assert!(!guard.check_and_set("req-1").await.unwrap());
    assert_eq!(guard.cached_result::<OrderReceipt>("req-1").await.unwrap(), None);

    guard.cache_result("req-1", &receipt, Duration::from_secs(60)).await.unwrap();
    assert_eq!(guard.cached_result("req-1").await.unwrap(), Some(receipt));

    // The key stays claimed while the result is cached.
    assert!(guard.check_and_set("req-1").await.unwrap());
}

#[tokio::test]
async fn test_cached_result_of_wrong_shape_is_serialization_error() {
    let (service, _clock) = test_service();
    let guard = guard_for(&service);

    guard.cache_result("req-2", &vec![1, 2, 3], Duration::from_secs(60)).await.unwrap();

    let result = guard.cached_result::<OrderReceipt>("req-2").await;
    assert!(matches!(result, Err(StockError::Serialization(_))));
}

#[tokio::test]
async fn test_release_allows_redelivery() {
    let (service, _clock) = test_service();
    let guard = guard_for(&service);

    assert!(!guard.check_and_set("msg-3").await.unwrap());
    assert!(guard.release("msg-3").await.unwrap());
    assert!(!guard.release("msg-3").await.unwrap());

    assert!(!guard.check_and_set("msg-3").await.unwrap());
}

// ============================================================================
// Event info cache
// ============================================================================

#[tokio::test]
async fn test_event_info_hit_then_invalidate() {
    let (service, _clock) = test_service();
    let cache = cache_for(&service);
    let info = sample_event(5);

    assert_eq!(cache.get_event_info(EventId::new(5)).await.unwrap(), None);

    cache.cache_event_info(&info, Duration::from_secs(600)).await.unwrap();
    assert_eq!(cache.get_event_info(EventId::new(5)).await.unwrap(), Some(info));

    assert!(cache.invalidate(EventId::new(5)).await.unwrap());
    assert_eq!(cache.get_event_info(EventId::new(5)).await.unwrap(), None);
}

#[tokio::test]
async fn test_event_info_expires() {
    let (service, clock) = test_service();
    let cache = cache_for(&service);

    cache.cache_event_info(&sample_event(6), Duration::from_secs(600)).await.unwrap();
    clock.advance(Duration::from_secs(601));

    assert_eq!(cache.get_event_info(EventId::new(6)).await.unwrap(), None);
}

#[tokio::test]
async fn test_undecodable_event_info_is_a_miss() {
    let (service, _clock) = test_service();
    let cache = cache_for(&service);

    service
        .store()
        .insert_raw(&keys::event_info_key(EventId::new(7)), "{\"title\":")
        .unwrap();

    assert_eq!(cache.get_event_info(EventId::new(7)).await.unwrap(), None);
}

#[test]
fn test_event_window_is_half_open() {
    let info = sample_event(8);

    assert!(!info.is_active(info.starts_at - ChronoDuration::seconds(1)));
    assert!(info.is_active(info.starts_at));
    assert!(info.is_active(info.ends_at - ChronoDuration::seconds(1)));
    assert!(!info.is_active(info.ends_at));
}
