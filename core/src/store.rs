//! Atomic store boundary.
//!
//! [`AtomicStore`] is the only way the protocol touches shared state. It has
//! one method per named atomic script (decrement, restore, batch stock read)
//! plus the plain key-value commands the read side and the idempotency guard
//! need. Any store that can run a multi-key read-modify-write without
//! interleaving can implement it: Redis with Lua scripts in production, a
//! mutex-guarded map for tests and single-node deployments.
//!
//! # Atomicity
//!
//! `decrement` and `restore` must be observed by every other client as one
//! indivisible step. Without that, two concurrent decrements could read the
//! same counter value and both succeed.

use crate::error::{Result, StockError};
use crate::keys::ReservationKeys;
use crate::metrics::ReservationMetrics;
use crate::protocol::DecrementReply;
use std::future::Future;
use std::time::{Duration, Instant};

/// Store able to execute the reservation scripts atomically.
///
/// Implementations are cheap to clone and share one connection pool (or one
/// in-memory map) between clones.
pub trait AtomicStore: Send + Sync {
    /// Run the decrement script against `keys`.
    ///
    /// # Arguments
    ///
    /// * `keys` - Stock, sold-out and participation keys, in that order
    /// * `quantity` - Units requested (> 0)
    /// * `participation_ttl` - Expiry of the participation flag
    /// * `sold_out_ttl` - Expiry of the sold-out flag
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable, rejects the script, or the
    /// reply cannot be decoded.
    fn decrement(
        &self,
        keys: &ReservationKeys,
        quantity: i64,
        participation_ttl: Duration,
        sold_out_ttl: Duration,
    ) -> impl Future<Output = Result<DecrementReply>> + Send;

    /// Run the restore script: add `quantity` back to the counter and delete
    /// both flags, returning the new counter.
    ///
    /// If the counter had expired, it is recreated with `fallback_ttl` so it
    /// never outlives the sale.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unreachable or rejects the script.
    fn restore(
        &self,
        keys: &ReservationKeys,
        quantity: i64,
        fallback_ttl: Duration,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Read several counters in one round trip.
    ///
    /// Returns one entry per key, `None` for absent counters.
    ///
    /// # Errors
    ///
    /// Returns error if the store fails or a counter is not an integer.
    fn batch_stock(
        &self,
        keys: &[String],
    ) -> impl Future<Output = Result<Vec<Option<i64>>>> + Send;

    /// Set `key` to `value`, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Set `key` only if it does not exist, as one atomic command.
    ///
    /// Returns `true` if the value was written.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn set_nx_ex(
        &self,
        key: &str,
        value: &str,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// Get the value at `key`.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Delete `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn delete(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;

    /// Check whether `key` exists.
    ///
    /// # Errors
    ///
    /// Returns error if the store operation fails.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool>> + Send;
}

/// Run one store round trip under a deadline, recording latency and failures.
///
/// On timeout the operation's effect is unknown; the error says so via
/// [`StockError::is_outcome_unknown`].
pub(crate) async fn bounded<T, F>(operation: &'static str, timeout: Duration, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let started = Instant::now();

    let result = match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(StockError::Timeout { operation, timeout }),
    };

    ReservationMetrics::record_duration(operation, started.elapsed());

    if let Err(error) = &result {
        ReservationMetrics::record_store_error(operation);
        tracing::error!(
            operation = operation,
            error = %error,
            outcome_unknown = error.is_outcome_unknown(),
            "Atomic store call failed"
        );
    }

    result
}
