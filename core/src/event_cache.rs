//! Read-through cache of flash-sale event metadata.
//!
//! Not safety-critical: a miss (absent, expired, or undecodable entry) means
//! the caller falls back to the system of record.

use crate::error::{Result, StockError};
use crate::keys;
use crate::metrics::ReservationMetrics;
use crate::store::{AtomicStore, bounded};
use crate::types::EventId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Descriptive metadata of a flash-sale event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventInfo {
    /// Event identifier
    pub event_id: EventId,
    /// Display title
    pub title: String,
    /// Sale price in cents
    pub price_cents: i64,
    /// Units offered in this sale
    pub total_stock: i64,
    /// Sale window start
    pub starts_at: DateTime<Utc>,
    /// Sale window end
    pub ends_at: DateTime<Utc>,
}

impl EventInfo {
    /// Returns `true` if `now` falls inside the sale window.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.starts_at <= now && now < self.ends_at
    }
}

/// Event metadata cache over an [`AtomicStore`].
#[derive(Debug, Clone)]
pub struct EventInfoCache<S> {
    store: S,
    timeout: Duration,
}

impl<S: AtomicStore> EventInfoCache<S> {
    /// Create a cache whose calls are bounded by `timeout`.
    #[must_use]
    pub const fn new(store: S, timeout: Duration) -> Self {
        Self { store, timeout }
    }

    /// Write `info` to the cache, expiring after `ttl`.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Serialization`] if `info` cannot be encoded, or a
    /// transport error.
    pub async fn cache_event_info(&self, info: &EventInfo, ttl: Duration) -> Result<()> {
        let json = serde_json::to_string(info).map_err(|e| StockError::Serialization(e.to_string()))?;
        let key = keys::event_info_key(info.event_id);

        bounded("cache_event_info", self.timeout, self.store.set_ex(&key, &json, ttl)).await?;

        tracing::debug!(event_id = %info.event_id, ttl_secs = ttl.as_secs(), "Cached event info");
        Ok(())
    }

    /// Cached metadata for `event_id`, `None` on a miss.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn get_event_info(&self, event_id: EventId) -> Result<Option<EventInfo>> {
        let key = keys::event_info_key(event_id);
        let cached = bounded("get_event_info", self.timeout, self.store.get(&key)).await?;

        let info = cached.and_then(|json| match serde_json::from_str::<EventInfo>(&json) {
            Ok(info) => Some(info),
            Err(e) => {
                tracing::warn!(event_id = %event_id, error = %e, "Discarding undecodable event info");
                None
            }
        });

        ReservationMetrics::record_event_info_lookup(info.is_some());
        Ok(info)
    }

    /// Drop the cached metadata for `event_id`.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn invalidate(&self, event_id: EventId) -> Result<bool> {
        bounded(
            "invalidate_event_info",
            self.timeout,
            self.store.delete(&keys::event_info_key(event_id)),
        )
        .await
    }
}
