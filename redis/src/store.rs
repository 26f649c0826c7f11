//! Redis-backed atomic store.
//!
//! # Architecture
//!
//! - **Scripts**: decrement, restore and batch reads run as Lua scripts
//!   (see [`crate::scripts`]), so each is one atomic step on the server
//! - **Plain commands**: `SET PX`, `SET NX PX`, `GET`, `DEL`, `EXISTS`
//! - **TTL**: every key is written with a millisecond expiry
//!
//! # Performance
//!
//! - **Connection pooling**: `ConnectionManager` multiplexes one connection
//!   and reconnects transparently
//! - **Single round-trip**: every trait method is one request, except batch
//!   reads larger than [`BATCH_CHUNK_SIZE`] keys

use crate::scripts::{BATCH_CHUNK_SIZE, BATCH_STOCK, DECREMENT, RESTORE};
use flash_sale_core::keys::ReservationKeys;
use flash_sale_core::protocol::{DecrementReply, parse_counter, ttl_millis};
use flash_sale_core::{AtomicStore, RedisConfig, Result, StockError};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Client, ErrorKind, RedisError};
use std::time::Duration;

/// `Redis` implementation of [`AtomicStore`].
///
/// # Thread Safety
///
/// This type is `Clone` and can be safely shared across tasks. Each clone
/// shares the same `ConnectionManager`.
///
/// # Example
///
/// ```no_run
/// use flash_sale_redis::RedisAtomicStore;
/// use flash_sale_core::{ReservationConfig, StockService};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = RedisAtomicStore::new("redis://127.0.0.1:6379").await?;
/// let service = StockService::new(store, ReservationConfig::default());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisAtomicStore {
    /// Connection manager for connection pooling.
    conn_manager: ConnectionManager,
}

impl RedisAtomicStore {
    /// Create a new `Redis` atomic store.
    ///
    /// # Arguments
    ///
    /// * `redis_url` - `Redis` connection URL (e.g., "<redis://127.0.0.1:6379>")
    ///
    /// # Errors
    ///
    /// Returns error if the URL is malformed or the connection fails.
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = Client::open(redis_url)
            .map_err(|e| StockError::Connection(format!("Failed to create Redis client: {e}")))?;

        let conn_manager = ConnectionManager::new(client).await.map_err(|e| {
            StockError::Connection(format!("Failed to create Redis connection manager: {e}"))
        })?;

        tracing::info!("RedisAtomicStore initialized successfully");

        Ok(Self { conn_manager })
    }

    /// Connect using `config`, giving up after its connect timeout.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid, the connection fails,
    /// or the timeout elapses.
    pub async fn from_config(config: &RedisConfig) -> Result<Self> {
        config.validate()?;

        tokio::time::timeout(config.connect_timeout(), Self::new(&config.url))
            .await
            .map_err(|_| StockError::Timeout {
                operation: "connect",
                timeout: config.connect_timeout(),
            })?
    }

    /// Wrap an existing connection manager.
    #[must_use]
    pub const fn from_connection_manager(conn_manager: ConnectionManager) -> Self {
        Self { conn_manager }
    }
}

/// Map a `redis` error onto the transport taxonomy.
fn store_error(operation: &'static str, e: &RedisError) -> StockError {
    if e.kind() == ErrorKind::TypeError {
        StockError::MalformedReply(format!("{operation}: {e}"))
    } else if e.is_io_error() || e.is_connection_dropped() || e.is_connection_refusal() {
        StockError::Connection(format!("{operation}: {e}"))
    } else {
        StockError::Command {
            operation,
            message: e.to_string(),
        }
    }
}

impl AtomicStore for RedisAtomicStore {
    async fn decrement(
        &self,
        keys: &ReservationKeys,
        quantity: i64,
        participation_ttl: Duration,
        sold_out_ttl: Duration,
    ) -> Result<DecrementReply> {
        let mut conn = self.conn_manager.clone();

        let (code, message, value): (i64, String, i64) = DECREMENT
            .key(&keys.stock)
            .key(&keys.sold_out)
            .key(&keys.participation)
            .arg(quantity)
            .arg(ttl_millis(participation_ttl))
            .arg(ttl_millis(sold_out_ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("decrement", &e))?;

        Ok(DecrementReply { code, message, value })
    }

    async fn restore(&self, keys: &ReservationKeys, quantity: i64, fallback_ttl: Duration) -> Result<i64> {
        let mut conn = self.conn_manager.clone();

        let stock: i64 = RESTORE
            .key(&keys.stock)
            .key(&keys.sold_out)
            .key(&keys.participation)
            .arg(quantity)
            .arg(ttl_millis(fallback_ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(|e| store_error("restore", &e))?;

        Ok(stock)
    }

    async fn batch_stock(&self, keys: &[String]) -> Result<Vec<Option<i64>>> {
        let mut conn = self.conn_manager.clone();
        let mut stock = Vec::with_capacity(keys.len());

        for chunk in keys.chunks(BATCH_CHUNK_SIZE) {
            let mut invocation = BATCH_STOCK.prepare_invoke();
            for key in chunk {
                invocation.key(key);
            }

            let values: Vec<Option<String>> = invocation
                .invoke_async(&mut conn)
                .await
                .map_err(|e| store_error("batch_stock", &e))?;

            if values.len() != chunk.len() {
                return Err(StockError::MalformedReply(format!(
                    "MGET returned {} values for {} keys",
                    values.len(),
                    chunk.len()
                )));
            }

            for (key, value) in chunk.iter().zip(values) {
                stock.push(value.map(|raw| parse_counter(key, &raw)).transpose()?);
            }
        }

        Ok(stock)
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn_manager.clone();

        let _: () = conn
            .pset_ex(key, value, ttl_millis(ttl))
            .await
            .map_err(|e| store_error("set_ex", &e))?;

        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        // SET NX PX is one command: the existence check and the write cannot interleave.
        let written: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(ttl_millis(ttl))
            .query_async(&mut conn)
            .await
            .map_err(|e| store_error("set_nx_ex", &e))?;

        Ok(written.is_some())
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn_manager.clone();

        conn.get(key).await.map_err(|e| store_error("get", &e))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        let removed: i64 = conn.del(key).await.map_err(|e| store_error("delete", &e))?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn_manager.clone();

        conn.exists(key).await.map_err(|e| store_error("exists", &e))
    }
}
