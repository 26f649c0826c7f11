//! # Flash Sale Testing
//!
//! Testing utilities for the flash sale reservation protocol.
//!
//! This crate provides:
//! - [`InMemoryAtomicStore`]: mutex-guarded [`AtomicStore`](flash_sale_core::AtomicStore)
//! - [`ManualClock`]: controllable time for TTL expiry tests
//! - Helpers building ready-to-use services over the in-memory store
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_testing::helpers::test_service;
//!
//! #[tokio::test]
//! async fn test_sale() {
//!     let (service, clock) = test_service();
//!     service.warmup_stock(EventId::new(1), 10, Duration::from_secs(60)).await.unwrap();
//!     clock.advance(Duration::from_secs(61));
//!     assert_eq!(service.get_stock(EventId::new(1)).await.unwrap(), None);
//! }
//! ```

pub mod memory_store;

pub use memory_store::InMemoryAtomicStore;

/// Mock implementations for testing.
pub mod mocks {
    use chrono::{DateTime, Utc};
    use flash_sale_core::environment::Clock;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    /// Clock that only moves when told to.
    ///
    /// Clones share the same time, so a test can keep one handle and give
    /// another to the store.
    ///
    /// # Example
    ///
    /// ```
    /// use flash_sale_testing::mocks::ManualClock;
    /// use flash_sale_core::environment::Clock;
    /// use std::time::Duration;
    ///
    /// let clock = ManualClock::default();
    /// let before = clock.now();
    /// clock.advance(Duration::from_secs(5));
    /// assert_eq!((clock.now() - before).num_seconds(), 5);
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Create a clock frozen at `time`.
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move time forward by `by`.
        pub fn advance(&self, by: Duration) {
            if let (Ok(mut time), Ok(by)) = (self.time.lock(), chrono::Duration::from_std(by)) {
                *time += by;
            }
        }
    }

    impl Default for ManualClock {
        /// Clock frozen at 2025-01-01 00:00:00 UTC.
        fn default() -> Self {
            Self::new(DateTime::<Utc>::from_timestamp(1_735_689_600, 0).unwrap_or_default())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            self.time.lock().map_or_else(|poisoned| *poisoned.into_inner(), |time| *time)
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use crate::{InMemoryAtomicStore, mocks::ManualClock};
    use flash_sale_core::{EventInfoCache, IdempotencyGuard, ReservationConfig, StockService};
    use std::sync::Arc;

    /// Reservation service over a fresh in-memory store driven by a manual clock.
    #[must_use]
    pub fn test_service() -> (StockService<InMemoryAtomicStore>, ManualClock) {
        let clock = ManualClock::default();
        let store = InMemoryAtomicStore::with_clock(Arc::new(clock.clone()));
        (StockService::new(store, ReservationConfig::default()), clock)
    }

    /// Idempotency guard sharing the store of `service`.
    #[must_use]
    pub fn guard_for(service: &StockService<InMemoryAtomicStore>) -> IdempotencyGuard<InMemoryAtomicStore> {
        IdempotencyGuard::new(service.store().clone(), service.config())
    }

    /// Event info cache sharing the store of `service`.
    #[must_use]
    pub fn cache_for(service: &StockService<InMemoryAtomicStore>) -> EventInfoCache<InMemoryAtomicStore> {
        EventInfoCache::new(service.store().clone(), service.config().operation_timeout)
    }

    /// Install a test tracing subscriber honouring `RUST_LOG`.
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

// Re-export commonly used items
pub use mocks::ManualClock;
