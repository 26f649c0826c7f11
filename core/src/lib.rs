//! # Flash Sale Core
//!
//! Atomic stock reservation for flash sales: many concurrent buyers compete
//! for a strictly limited unit count without overselling, without a buyer
//! reserving twice, and with a compensating restore for cancelled orders.
//!
//! ## Components
//!
//! - **Key namespace** ([`keys`]): deterministic keys per entity
//! - **Atomic store** ([`store::AtomicStore`]): one method per atomic script
//! - **Reservation protocol** ([`reservation::StockService`]): init, warm-up,
//!   decrement, restore, stock reads
//! - **Idempotency guard** ([`idempotency::IdempotencyGuard`]): exactly-once
//!   marker for queue consumers
//! - **Event info cache** ([`event_cache::EventInfoCache`]): metadata caching
//!
//! ## Architecture Principles
//!
//! - All shared mutable state lives in the store; this crate holds no locks
//! - Store handles are built once at startup and injected
//! - Rejections are values ([`DecrementOutcome`]), failures are errors ([`StockError`])
//!
//! ## Example
//!
//! ```ignore
//! use flash_sale_core::*;
//!
//! let service = StockService::new(store, ReservationConfig::default());
//! service.warmup_stock(EventId::new(1), 2, Duration::from_secs(3600)).await?;
//!
//! let outcome = service.decrement_stock_default(EventId::new(1), UserId::new(7), 1).await?;
//! assert_eq!(outcome, DecrementOutcome::Success { remaining: 1 });
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod event_cache;
pub mod idempotency;
pub mod keys;
pub mod metrics;
pub mod outcome;
pub mod protocol;
pub mod reservation;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use config::{Config, RedisConfig, ReservationConfig};
pub use environment::{Clock, SystemClock};
pub use error::{Result, StockError};
pub use event_cache::{EventInfo, EventInfoCache};
pub use idempotency::IdempotencyGuard;
pub use keys::ReservationKeys;
pub use outcome::{DecrementOutcome, StockInfo};
pub use protocol::{DecrementPlan, DecrementReply, DecrementSnapshot, plan_decrement};
pub use reservation::StockService;
pub use store::AtomicStore;
pub use types::{EventId, UserId};
