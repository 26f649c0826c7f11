//! Decision rules of the decrement script and decoding of its reply.
//!
//! Every backend must reach the same outcome from the same observed state.
//! The Redis backend encodes these rules in Lua; in-process backends call
//! [`plan_decrement`] while holding their lock.
//!
//! # Decision Order
//!
//! 1. Sold-out flag present → `sold_out`, no mutation
//! 2. Participation flag present → `duplicate_user`, no mutation
//! 3. Counter absent → `stock_not_found`, no mutation
//! 4. Counter below quantity → set sold-out flag, `insufficient_stock`
//! 5. Otherwise subtract, set participation flag, and set the sold-out flag
//!    when the counter reaches zero or below
//!
//! Both sold-out triggers (step 4 and step 5) are required: with exact-fit
//! buyers the counter reaches zero without any caller ever observing
//! insufficient stock.

use crate::error::{Result, StockError};
use crate::outcome::DecrementOutcome;
use std::time::Duration;

/// State of the three reservation entries observed inside one atomic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecrementSnapshot {
    /// Sold-out flag present.
    pub sold_out: bool,
    /// Participation flag present for the requesting user.
    pub participating: bool,
    /// Counter value, `None` if absent.
    pub stock: Option<i64>,
}

/// Mutations a backend must apply for one decrement, plus its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementPlan {
    /// Reject without touching any key.
    Reject(DecrementOutcome),
    /// Set the sold-out flag and report insufficient stock.
    MarkSoldOut {
        /// Counter value observed
        available: i64,
    },
    /// Store `remaining`, set the participation flag, and set the
    /// sold-out flag if `sold_out` is true.
    Reserve {
        /// Counter after the decrement
        remaining: i64,
        /// Whether this decrement exhausted the event
        sold_out: bool,
    },
}

impl DecrementPlan {
    /// Outcome reported to the caller once the plan is applied.
    #[must_use]
    pub const fn outcome(&self) -> DecrementOutcome {
        match *self {
            Self::Reject(outcome) => outcome,
            Self::MarkSoldOut { available } => DecrementOutcome::InsufficientStock { available },
            Self::Reserve { remaining, .. } => DecrementOutcome::Success { remaining },
        }
    }
}

/// Decide what a decrement of `quantity` does against `snapshot`.
#[must_use]
pub const fn plan_decrement(snapshot: DecrementSnapshot, quantity: i64) -> DecrementPlan {
    if snapshot.sold_out {
        return DecrementPlan::Reject(DecrementOutcome::SoldOut);
    }
    if snapshot.participating {
        return DecrementPlan::Reject(DecrementOutcome::DuplicateUser);
    }
    let Some(stock) = snapshot.stock else {
        return DecrementPlan::Reject(DecrementOutcome::StockNotFound);
    };
    if stock < quantity {
        return DecrementPlan::MarkSoldOut { available: stock };
    }

    let remaining = stock - quantity;
    DecrementPlan::Reserve {
        remaining,
        sold_out: remaining <= 0,
    }
}

/// Raw `(status_code, status_message, value)` tuple returned by the decrement script.
///
/// `value` is the post-decrement counter for a success, the observed counter
/// for `insufficient_stock`, and `0` otherwise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecrementReply {
    /// Numeric status code.
    pub code: i64,
    /// Reason code string.
    pub message: String,
    /// Counter value carried by the reply.
    pub value: i64,
}

impl DecrementReply {
    /// Decode the reply into a typed outcome.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::MalformedReply`] if the status code is unknown or
    /// the message does not match it.
    pub fn into_outcome(self) -> Result<DecrementOutcome> {
        let outcome = match self.code {
            DecrementOutcome::SUCCESS => DecrementOutcome::Success { remaining: self.value },
            DecrementOutcome::SOLD_OUT => DecrementOutcome::SoldOut,
            DecrementOutcome::DUPLICATE_USER => DecrementOutcome::DuplicateUser,
            DecrementOutcome::STOCK_NOT_FOUND => DecrementOutcome::StockNotFound,
            DecrementOutcome::INSUFFICIENT_STOCK => {
                DecrementOutcome::InsufficientStock { available: self.value }
            }
            code => {
                return Err(StockError::MalformedReply(format!(
                    "unknown decrement status code {code} ({})",
                    self.message
                )));
            }
        };

        if outcome.reason() != self.message {
            return Err(StockError::MalformedReply(format!(
                "status code {} does not match message {:?}",
                self.code, self.message
            )));
        }

        Ok(outcome)
    }
}

impl From<DecrementOutcome> for DecrementReply {
    fn from(outcome: DecrementOutcome) -> Self {
        let value = match outcome {
            DecrementOutcome::Success { remaining } => remaining,
            DecrementOutcome::InsufficientStock { available } => available,
            _ => 0,
        };
        Self {
            code: outcome.code(),
            message: outcome.reason().to_string(),
            value,
        }
    }
}

/// Longest expiry handed to a store, in milliseconds.
///
/// `Redis` rejects a `PX` whose absolute deadline overflows `i64`
/// milliseconds, so longer TTLs are clamped here.
pub const MAX_TTL_MILLIS: u64 = i64::MAX.unsigned_abs() / 2;

/// Parse a stored counter value.
///
/// Only an optional `-` followed by ASCII digits is accepted, the same
/// shape the decrement script checks before doing arithmetic.
///
/// # Errors
///
/// Returns [`StockError::InvalidInteger`] if `raw` is not a base-10 `i64`.
pub fn parse_counter(key: &str, raw: &str) -> Result<i64> {
    let invalid = || StockError::InvalidInteger {
        key: key.to_string(),
        value: raw.to_string(),
    };

    let digits = raw.strip_prefix('-').unwrap_or(raw);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    raw.parse().map_err(|_| invalid())
}

/// Convert a TTL to whole milliseconds within `1..=MAX_TTL_MILLIS`.
///
/// Stores reject a zero expiry, so sub-millisecond TTLs round up.
#[must_use]
pub fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis())
        .unwrap_or(u64::MAX)
        .clamp(1, MAX_TTL_MILLIS)
}
