//! Exactly-once marker for at-least-once delivery.
//!
//! A queue consumer calls
//! [`IdempotencyGuard::check_and_set_message_processed`] at the top of its
//! handler and skips the message if it was already seen. The check and the
//! write are one `SET NX` command, so two concurrent deliveries of the same
//! message can never both observe "not processed".
//!
//! Handlers that must answer retries with the original response can also
//! store a JSON result under the same key with
//! [`IdempotencyGuard::cache_result`].

use crate::config::ReservationConfig;
use crate::error::{Result, StockError};
use crate::keys;
use crate::metrics::ReservationMetrics;
use crate::store::{AtomicStore, bounded};
use serde::{Serialize, de::DeserializeOwned};
use std::time::Duration;

/// Value written by a bare check-and-set, before any result is cached.
const PROCESSED_MARKER: &str = "processed";

/// Idempotency guard over an [`AtomicStore`].
#[derive(Debug, Clone)]
pub struct IdempotencyGuard<S> {
    store: S,
    default_ttl: Duration,
    timeout: Duration,
}

impl<S: AtomicStore> IdempotencyGuard<S> {
    /// Create a guard using the idempotency TTL and deadline from `config`.
    #[must_use]
    pub const fn new(store: S, config: &ReservationConfig) -> Self {
        Self {
            store,
            default_ttl: config.idempotency_ttl,
            timeout: config.operation_timeout,
        }
    }

    /// Atomically mark `message_id` as processed.
    ///
    /// Returns `false` on the first call within the TTL window (the marker is
    /// created), `true` on every later call.
    ///
    /// # Errors
    ///
    /// Returns a transport error. The marker may have been written.
    pub async fn check_and_set_message_processed(&self, message_id: &str, ttl: Duration) -> Result<bool> {
        let key = keys::idempotency_key(message_id);
        let created = bounded(
            "check_and_set_processed",
            self.timeout,
            self.store.set_nx_ex(&key, PROCESSED_MARKER, ttl),
        )
        .await?;

        let already_processed = !created;
        ReservationMetrics::record_idempotency_check(already_processed);

        if already_processed {
            tracing::info!(message_id = message_id, "Skipping already processed message");
        } else {
            tracing::debug!(message_id = message_id, "Marked message as processed");
        }

        Ok(already_processed)
    }

    /// [`IdempotencyGuard::check_and_set_message_processed`] with the configured TTL.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn check_and_set(&self, message_id: &str) -> Result<bool> {
        self.check_and_set_message_processed(message_id, self.default_ttl).await
    }

    /// Store the result of processing `message_id`, replacing the bare marker.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Serialization`] if `result` cannot be encoded,
    /// or a transport error.
    pub async fn cache_result<T: Serialize + Sync>(&self, message_id: &str, result: &T, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(result).map_err(|e| StockError::Serialization(e.to_string()))?;
        let key = keys::idempotency_key(message_id);

        bounded("cache_result", self.timeout, self.store.set_ex(&key, &json, ttl)).await?;

        tracing::debug!(message_id = message_id, "Cached idempotent result");
        Ok(())
    }

    /// Result cached for `message_id`.
    ///
    /// Returns `None` if the message was never seen or was marked processed
    /// without a result.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Serialization`] if the cached payload does not
    /// decode as `T`, or a transport error.
    pub async fn cached_result<T: DeserializeOwned>(&self, message_id: &str) -> Result<Option<T>> {
        let key = keys::idempotency_key(message_id);
        let cached = bounded("cached_result", self.timeout, self.store.get(&key)).await?;

        match cached {
            Some(json) if json != PROCESSED_MARKER => serde_json::from_str(&json)
                .map(Some)
                .map_err(|e| StockError::Serialization(e.to_string())),
            _ => Ok(None),
        }
    }

    /// Remove the marker so the message can be processed again.
    ///
    /// Used when a handler fails after claiming the message.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn release(&self, message_id: &str) -> Result<bool> {
        let key = keys::idempotency_key(message_id);
        let removed = bounded("release_marker", self.timeout, self.store.delete(&key)).await?;

        tracing::info!(message_id = message_id, removed = removed, "Released idempotency marker");
        Ok(removed)
    }
}
