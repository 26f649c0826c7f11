//! End-to-end reservation scenarios over the in-memory store.
//!
//! Every property here must also hold for the `Redis` backend; see
//! `flash-sale-redis/tests/integration_tests.rs` for the same scenarios
//! against a real server.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use flash_sale_core::keys::{self, ReservationKeys};
use flash_sale_core::protocol::DecrementReply;
use flash_sale_core::{
    AtomicStore, DecrementOutcome, EventId, ReservationConfig, StockError, StockInfo,
    StockService, UserId,
};
use flash_sale_testing::InMemoryAtomicStore;
use flash_sale_testing::helpers::{init_test_tracing, test_service};
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[tokio::test]
async fn test_last_units_go_to_exactly_the_first_buyers() {
    init_test_tracing();
    let (service, _clock) = test_service();
    let event = EventId::new(1);
    service.init_stock(event, 2, HOUR).await.unwrap();

    let (a, b) = tokio::join!(
        service.decrement_stock(event, UserId::new(1), 1, HOUR, HOUR),
        service.decrement_stock(event, UserId::new(2), 1, HOUR, HOUR),
    );
    let mut remaining = [a.unwrap().remaining(), b.unwrap().remaining()];
    remaining.sort_unstable();
    assert_eq!(remaining, [Some(0), Some(1)]);

    assert_eq!(
        service.get_stock_info(event).await.unwrap(),
        StockInfo {
            stock: Some(0),
            sold_out: true,
            exists: true,
        }
    );

    let late = service.decrement_stock(event, UserId::new(3), 1, HOUR, HOUR).await.unwrap();
    assert_eq!(late, DecrementOutcome::SoldOut);
    assert_eq!(service.get_stock(event).await.unwrap(), Some(0));
}

#[tokio::test]
async fn test_decrement_without_init_reports_stock_not_found() {
    let (service, _clock) = test_service();
    let event = EventId::new(2);

    let outcome = service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap();

    assert_eq!(outcome, DecrementOutcome::StockNotFound);
    assert!(!service.has_participated(event, UserId::new(1)).await.unwrap());
    assert!(!service.get_stock_info(event).await.unwrap().exists);
}

#[tokio::test]
async fn test_restore_lets_the_same_user_reserve_again() {
    let (service, _clock) = test_service();
    let event = EventId::new(3);
    let user = UserId::new(42);
    service.init_stock(event, 1, HOUR).await.unwrap();

    assert_eq!(
        service.decrement_stock_default(event, user, 1).await.unwrap(),
        DecrementOutcome::Success { remaining: 0 }
    );
    assert!(service.is_sold_out(event).await.unwrap());

    assert_eq!(service.restore_stock(event, user, 1).await.unwrap(), 1);
    assert!(!service.is_sold_out(event).await.unwrap());
    assert!(!service.has_participated(event, user).await.unwrap());

    assert_eq!(
        service.decrement_stock_default(event, user, 1).await.unwrap(),
        DecrementOutcome::Success { remaining: 0 }
    );
}

#[tokio::test]
async fn test_second_reservation_by_same_user_is_duplicate() {
    let (service, _clock) = test_service();
    let event = EventId::new(4);
    let user = UserId::new(7);
    service.warmup_stock(event, 10, HOUR).await.unwrap();

    assert!(service.decrement_stock_default(event, user, 2).await.unwrap().is_success());
    assert_eq!(
        service.decrement_stock_default(event, user, 1).await.unwrap(),
        DecrementOutcome::DuplicateUser
    );
    assert_eq!(service.get_stock(event).await.unwrap(), Some(8));
}

#[tokio::test]
async fn test_sold_out_is_checked_before_participation() {
    let (service, _clock) = test_service();
    let event = EventId::new(5);
    let user = UserId::new(1);
    service.init_stock(event, 1, HOUR).await.unwrap();

    service.decrement_stock_default(event, user, 1).await.unwrap();

    assert_eq!(
        service.decrement_stock_default(event, user, 1).await.unwrap(),
        DecrementOutcome::SoldOut
    );
}

#[tokio::test]
async fn test_insufficient_stock_marks_event_sold_out() {
    let (service, _clock) = test_service();
    let event = EventId::new(6);
    service.init_stock(event, 3, HOUR).await.unwrap();

    assert_eq!(
        service.decrement_stock_default(event, UserId::new(1), 5).await.unwrap(),
        DecrementOutcome::InsufficientStock { available: 3 }
    );

    // Units remain but the event is closed until a restore or warm-up.
    assert_eq!(service.get_stock(event).await.unwrap(), Some(3));
    assert!(!service.has_participated(event, UserId::new(1)).await.unwrap());
    assert_eq!(
        service.decrement_stock_default(event, UserId::new(2), 1).await.unwrap(),
        DecrementOutcome::SoldOut
    );
}

#[tokio::test]
async fn test_warmup_always_clears_sold_out() {
    let (service, _clock) = test_service();
    let event = EventId::new(7);
    service.init_stock(event, 1, HOUR).await.unwrap();
    service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap();
    assert!(service.is_sold_out(event).await.unwrap());

    // init alone keeps the flag
    service.init_stock(event, 5, HOUR).await.unwrap();
    assert!(service.is_sold_out(event).await.unwrap());

    service.warmup_stock(event, 5, HOUR).await.unwrap();
    assert!(!service.is_sold_out(event).await.unwrap());

    // the earlier buyer still holds a reservation
    assert_eq!(
        service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap(),
        DecrementOutcome::DuplicateUser
    );
    assert_eq!(
        service.decrement_stock_default(event, UserId::new(2), 1).await.unwrap(),
        DecrementOutcome::Success { remaining: 4 }
    );
}

#[tokio::test]
async fn test_warmup_with_zero_stock_still_clears_flag() {
    let (service, _clock) = test_service();
    let event = EventId::new(8);

    service.warmup_stock(event, 0, HOUR).await.unwrap();

    assert!(!service.is_sold_out(event).await.unwrap());
    assert_eq!(
        service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap(),
        DecrementOutcome::InsufficientStock { available: 0 }
    );
    assert!(service.is_sold_out(event).await.unwrap());
}

#[tokio::test]
async fn test_participation_expires_with_its_ttl() {
    let (service, clock) = test_service();
    let event = EventId::new(9);
    let user = UserId::new(3);
    service.init_stock(event, 10, HOUR).await.unwrap();

    service
        .decrement_stock(event, user, 1, Duration::from_secs(60), HOUR)
        .await
        .unwrap();
    assert!(service.has_participated(event, user).await.unwrap());

    clock.advance(Duration::from_secs(61));

    assert!(!service.has_participated(event, user).await.unwrap());
    assert_eq!(
        service.decrement_stock_default(event, user, 1).await.unwrap(),
        DecrementOutcome::Success { remaining: 8 }
    );
}

#[tokio::test]
async fn test_counter_expires_with_sale_window() {
    let (service, clock) = test_service();
    let event = EventId::new(10);
    service.warmup_stock(event, 5, Duration::from_secs(30)).await.unwrap();

    clock.advance(Duration::from_secs(31));

    assert_eq!(service.get_stock(event).await.unwrap(), None);
    assert_eq!(
        service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap(),
        DecrementOutcome::StockNotFound
    );
}

#[tokio::test]
async fn test_restore_recreates_expired_counter_with_ttl() {
    let (service, clock) = test_service();
    let event = EventId::new(11);
    service.init_stock(event, 1, Duration::from_secs(10)).await.unwrap();
    clock.advance(Duration::from_secs(11));

    assert_eq!(service.restore_stock(event, UserId::new(1), 2).await.unwrap(), 2);

    let ttl = service.store().ttl(&keys::stock_key(event)).unwrap();
    assert_eq!(ttl, Some(service.config().stock_ttl));
}

#[tokio::test]
async fn test_batch_check_reports_missing_events() {
    let (service, _clock) = test_service();
    service.init_stock(EventId::new(20), 4, HOUR).await.unwrap();
    service.init_stock(EventId::new(22), 0, HOUR).await.unwrap();

    let stock = service
        .batch_check_stock(&[EventId::new(20), EventId::new(21), EventId::new(22)])
        .await
        .unwrap();

    assert_eq!(stock.len(), 3);
    assert_eq!(stock[&EventId::new(20)], Some(4));
    assert_eq!(stock[&EventId::new(21)], None);
    assert_eq!(stock[&EventId::new(22)], Some(0));

    assert!(service.batch_check_stock(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_non_positive_quantities_are_rejected_before_the_store() {
    let (service, _clock) = test_service();
    let event = EventId::new(30);

    assert_eq!(
        service.decrement_stock_default(event, UserId::new(1), 0).await,
        Err(StockError::InvalidQuantity(0))
    );
    assert_eq!(
        service.restore_stock(event, UserId::new(1), -1).await,
        Err(StockError::InvalidQuantity(-1))
    );
    assert_eq!(
        service.init_stock(event, -5, HOUR).await,
        Err(StockError::InvalidQuantity(-5))
    );
    assert!(service.store().is_empty().unwrap());
}

#[tokio::test]
async fn test_corrupt_counter_surfaces_as_error() {
    let (service, _clock) = test_service();
    let event = EventId::new(31);
    service.store().insert_raw(&keys::stock_key(event), "many").unwrap();

    let err = service.get_stock(event).await.unwrap_err();
    assert!(matches!(err, StockError::InvalidInteger { .. }));
    assert!(!err.is_outcome_unknown());

    assert!(service.decrement_stock_default(event, UserId::new(1), 1).await.is_err());
    assert!(!service.has_participated(event, UserId::new(1)).await.unwrap());
}

/// Store whose scripted calls never answer in time.
#[derive(Clone, Default)]
struct StalledStore {
    inner: InMemoryAtomicStore,
}

impl AtomicStore for StalledStore {
    async fn decrement(
        &self,
        keys: &ReservationKeys,
        quantity: i64,
        participation_ttl: Duration,
        sold_out_ttl: Duration,
    ) -> flash_sale_core::Result<DecrementReply> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.inner.decrement(keys, quantity, participation_ttl, sold_out_ttl).await
    }

    async fn restore(&self, keys: &ReservationKeys, quantity: i64, fallback_ttl: Duration) -> flash_sale_core::Result<i64> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.inner.restore(keys, quantity, fallback_ttl).await
    }

    async fn batch_stock(&self, keys: &[String]) -> flash_sale_core::Result<Vec<Option<i64>>> {
        self.inner.batch_stock(keys).await
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> flash_sale_core::Result<()> {
        self.inner.set_ex(key, value, ttl).await
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> flash_sale_core::Result<bool> {
        self.inner.set_nx_ex(key, value, ttl).await
    }

    async fn get(&self, key: &str) -> flash_sale_core::Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn delete(&self, key: &str) -> flash_sale_core::Result<bool> {
        self.inner.delete(key).await
    }

    async fn exists(&self, key: &str) -> flash_sale_core::Result<bool> {
        self.inner.exists(key).await
    }
}

#[tokio::test]
async fn test_slow_store_times_out_with_unknown_outcome() {
    let service = StockService::new(StalledStore::default(), ReservationConfig::default())
        .with_timeout(Duration::from_millis(20));
    let event = EventId::new(40);
    service.init_stock(event, 5, HOUR).await.unwrap();

    let err = service.decrement_stock_default(event, UserId::new(1), 1).await.unwrap_err();

    assert_eq!(
        err,
        StockError::Timeout {
            operation: "decrement_stock",
            timeout: Duration::from_millis(20),
        }
    );
    assert!(err.is_outcome_unknown());

    let err = service.restore_stock(event, UserId::new(1), 1).await.unwrap_err();
    assert!(matches!(err, StockError::Timeout { operation: "restore_stock", .. }));
}
