//! Stock reservation protocol.
//!
//! [`StockService`] wraps an [`AtomicStore`] and exposes the operations used
//! by order intake (decrement, restore) and sale tooling (init, warm-up,
//! stock reads).
//!
//! # Lifecycle
//!
//! ```text
//! warmup_stock ──► Available ──decrement──► Reserved(user) ──restore──► Available
//!                      │                          │
//!                      └── insufficient / ≤ 0 ────┴──► Exhausted (sold-out flag)
//! ```
//!
//! Every call is a single store round trip bounded by the configured
//! deadline, except `warmup_stock` which issues two. Nothing is retried
//! here: a timed-out decrement may have been applied, so a blind retry could
//! reserve twice. Callers should guard retries with an
//! [`IdempotencyGuard`](crate::idempotency::IdempotencyGuard).

use crate::config::ReservationConfig;
use crate::error::{Result, StockError};
use crate::keys::{self, ReservationKeys};
use crate::metrics::ReservationMetrics;
use crate::outcome::{DecrementOutcome, StockInfo};
use crate::protocol::parse_counter;
use crate::store::{AtomicStore, bounded};
use crate::types::{EventId, UserId};
use std::collections::BTreeMap;
use std::time::Duration;

/// Flash-sale stock reservation service.
///
/// # Example
///
/// ```ignore
/// let service = StockService::new(store, ReservationConfig::default());
/// service.warmup_stock(event, 100, Duration::from_secs(3600)).await?;
///
/// match service.decrement_stock_default(event, user, 1).await? {
///     DecrementOutcome::Success { remaining } => create_order(remaining).await?,
///     DecrementOutcome::DuplicateUser => return Err(AlreadyPurchased),
///     other => return Err(Rejected(other.reason())),
/// }
/// ```
#[derive(Debug, Clone)]
pub struct StockService<S> {
    store: S,
    config: ReservationConfig,
}

impl<S: AtomicStore> StockService<S> {
    /// Create a service over an already-connected store.
    #[must_use]
    pub const fn new(store: S, config: ReservationConfig) -> Self {
        Self { store, config }
    }

    /// Override the per-call store deadline.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config.operation_timeout = timeout;
        self
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ReservationConfig {
        &self.config
    }

    /// Underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Set the counter for `event_id` to `quantity`.
    ///
    /// Leaves the sold-out flag untouched; use [`StockService::warmup_stock`]
    /// to reopen an exhausted event.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::InvalidQuantity`] for a negative quantity, or a
    /// transport error from the store.
    pub async fn init_stock(&self, event_id: EventId, quantity: i64, ttl: Duration) -> Result<()> {
        if quantity < 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let key = keys::stock_key(event_id);
        bounded(
            "init_stock",
            self.config.operation_timeout,
            self.store.set_ex(&key, &quantity.to_string(), ttl),
        )
        .await?;

        tracing::info!(
            event_id = %event_id,
            quantity = quantity,
            ttl_secs = ttl.as_secs(),
            "Initialized stock counter"
        );

        Ok(())
    }

    /// Initialize the counter and clear the sold-out flag.
    ///
    /// Leaves the event available whenever `quantity > 0`, even if a previous
    /// sale window exhausted it.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::InvalidQuantity`] for a negative quantity, or a
    /// transport error from the store.
    pub async fn warmup_stock(&self, event_id: EventId, quantity: i64, ttl: Duration) -> Result<()> {
        self.init_stock(event_id, quantity, ttl).await?;

        let cleared = bounded(
            "warmup_stock",
            self.config.operation_timeout,
            self.store.delete(&keys::sold_out_key(event_id)),
        )
        .await?;

        ReservationMetrics::record_warmup();
        tracing::info!(
            event_id = %event_id,
            quantity = quantity,
            cleared_sold_out = cleared,
            "Warmed up flash sale stock"
        );

        Ok(())
    }

    /// Atomically try to reserve `quantity` units for `user_id`.
    ///
    /// Rejections are returned as [`DecrementOutcome`] values; only store
    /// failures are errors.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::InvalidQuantity`] if `quantity <= 0`, or a
    /// transport error. After [`StockError::Timeout`] the reservation may
    /// or may not exist.
    pub async fn decrement_stock(
        &self,
        event_id: EventId,
        user_id: UserId,
        quantity: i64,
        participation_ttl: Duration,
        sold_out_ttl: Duration,
    ) -> Result<DecrementOutcome> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let keys = ReservationKeys::new(event_id, user_id);
        let reply = bounded(
            "decrement_stock",
            self.config.operation_timeout,
            self.store.decrement(&keys, quantity, participation_ttl, sold_out_ttl),
        )
        .await?;

        let outcome = reply.into_outcome()?;
        ReservationMetrics::record_decrement(&outcome, quantity);

        match outcome {
            DecrementOutcome::Success { remaining } => tracing::info!(
                event_id = %event_id,
                user_id = %user_id,
                quantity = quantity,
                remaining = remaining,
                "Reserved flash sale stock"
            ),
            rejected => tracing::warn!(
                event_id = %event_id,
                user_id = %user_id,
                quantity = quantity,
                reason = rejected.reason(),
                "Reservation rejected"
            ),
        }

        Ok(outcome)
    }

    /// [`StockService::decrement_stock`] with the configured TTLs.
    ///
    /// # Errors
    ///
    /// Same as [`StockService::decrement_stock`].
    pub async fn decrement_stock_default(
        &self,
        event_id: EventId,
        user_id: UserId,
        quantity: i64,
    ) -> Result<DecrementOutcome> {
        self.decrement_stock(
            event_id,
            user_id,
            quantity,
            self.config.participation_ttl,
            self.config.sold_out_ttl,
        )
        .await
    }

    /// Give `quantity` units back and clear both flags for (event, user).
    ///
    /// Compensates one successful reservation after cancellation or a failed
    /// order commit. No prior state is checked, so a second restore for the
    /// same reservation would inflate the counter; issue exactly one.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::InvalidQuantity`] if `quantity <= 0`, or a
    /// transport error.
    pub async fn restore_stock(&self, event_id: EventId, user_id: UserId, quantity: i64) -> Result<i64> {
        if quantity <= 0 {
            return Err(StockError::InvalidQuantity(quantity));
        }

        let keys = ReservationKeys::new(event_id, user_id);
        let stock = bounded(
            "restore_stock",
            self.config.operation_timeout,
            self.store.restore(&keys, quantity, self.config.stock_ttl),
        )
        .await?;

        ReservationMetrics::record_restore();
        tracing::info!(
            event_id = %event_id,
            user_id = %user_id,
            quantity = quantity,
            stock = stock,
            "Restored flash sale stock"
        );

        Ok(stock)
    }

    /// Read the counters of several events in one round trip.
    ///
    /// Events without a counter map to `None`. Reads of different events are
    /// not atomic with each other.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or [`StockError::InvalidInteger`] if a
    /// counter holds a non-integer.
    pub async fn batch_check_stock(&self, event_ids: &[EventId]) -> Result<BTreeMap<EventId, Option<i64>>> {
        if event_ids.is_empty() {
            return Ok(BTreeMap::new());
        }

        let stock_keys: Vec<String> = event_ids.iter().copied().map(keys::stock_key).collect();
        let values = bounded(
            "batch_check_stock",
            self.config.operation_timeout,
            self.store.batch_stock(&stock_keys),
        )
        .await?;

        if values.len() != event_ids.len() {
            return Err(StockError::MalformedReply(format!(
                "batch stock returned {} values for {} events",
                values.len(),
                event_ids.len()
            )));
        }

        tracing::debug!(events = event_ids.len(), "Batch checked stock");

        Ok(event_ids.iter().copied().zip(values).collect())
    }

    /// Combined counter, sold-out and existence view of one event.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or [`StockError::InvalidInteger`] if the
    /// counter holds a non-integer.
    pub async fn get_stock_info(&self, event_id: EventId) -> Result<StockInfo> {
        let stock = self.get_stock(event_id).await?;
        let sold_out = self.is_sold_out(event_id).await?;

        let info = StockInfo {
            stock,
            sold_out,
            exists: stock.is_some(),
        };
        tracing::debug!(event_id = %event_id, ?info, "Read stock info");

        Ok(info)
    }

    /// Current counter value, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns a transport error, or [`StockError::InvalidInteger`] if the
    /// counter holds a non-integer.
    pub async fn get_stock(&self, event_id: EventId) -> Result<Option<i64>> {
        let key = keys::stock_key(event_id);
        let raw = bounded("get_stock", self.config.operation_timeout, self.store.get(&key)).await?;

        raw.map(|value| parse_counter(&key, &value)).transpose()
    }

    /// Whether the sold-out flag is present.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn is_sold_out(&self, event_id: EventId) -> Result<bool> {
        bounded(
            "is_sold_out",
            self.config.operation_timeout,
            self.store.exists(&keys::sold_out_key(event_id)),
        )
        .await
    }

    /// Whether `user_id` currently holds a reservation in `event_id`.
    ///
    /// # Errors
    ///
    /// Returns a transport error.
    pub async fn has_participated(&self, event_id: EventId, user_id: UserId) -> Result<bool> {
        bounded(
            "has_participated",
            self.config.operation_timeout,
            self.store.exists(&keys::participation_key(event_id, user_id)),
        )
        .await
    }
}
