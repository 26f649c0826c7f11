//! # Flash Sale Redis
//!
//! `Redis` implementation of the flash sale [`AtomicStore`](flash_sale_core::AtomicStore).
//!
//! The reservation decrement, restore and batch stock reads run as Lua
//! scripts, which `Redis` executes without interleaving any other client's
//! commands. All keys touched by one reservation share the event's hash tag,
//! so the scripts also work against `Redis` Cluster.
//!
//! ## Example
//!
//! ```no_run
//! use flash_sale_core::{Config, EventId, StockService, UserId};
//! use flash_sale_redis::RedisAtomicStore;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Config::from_env();
//! let store = RedisAtomicStore::from_config(&config.redis).await?;
//! let service = StockService::new(store, config.reservation);
//!
//! service.warmup_stock(EventId::new(1), 100, Duration::from_secs(3600)).await?;
//! let outcome = service.decrement_stock_default(EventId::new(1), UserId::new(42), 1).await?;
//! println!("{}", outcome.reason());
//! # Ok(())
//! # }
//! ```

pub mod scripts;
pub mod store;

pub use store::RedisAtomicStore;
