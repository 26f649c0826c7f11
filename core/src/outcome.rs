//! Result values of the reservation protocol.

use serde::{Deserialize, Serialize};

/// Result of one decrement attempt.
///
/// Exactly one variant is produced per call. Every variant other than
/// [`DecrementOutcome::Success`] is a normal rejection, not an error, and
/// callers should match on it to show the right message to the buyer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DecrementOutcome {
    /// Units reserved; `remaining` is the counter after the decrement.
    Success {
        /// Authoritative remaining count
        remaining: i64,
    },
    /// The event has been flagged as exhausted.
    SoldOut,
    /// The user already holds a reservation in this event.
    DuplicateUser,
    /// The counter was never initialized or has expired.
    StockNotFound,
    /// Fewer units remain than requested; the event is now flagged sold out.
    InsufficientStock {
        /// Counter value observed by the script
        available: i64,
    },
}

impl DecrementOutcome {
    /// Status code returned by the decrement script for a success.
    pub const SUCCESS: i64 = 0;
    /// Status code for [`DecrementOutcome::SoldOut`].
    pub const SOLD_OUT: i64 = 1;
    /// Status code for [`DecrementOutcome::DuplicateUser`].
    pub const DUPLICATE_USER: i64 = 2;
    /// Status code for [`DecrementOutcome::StockNotFound`].
    pub const STOCK_NOT_FOUND: i64 = 3;
    /// Status code for [`DecrementOutcome::InsufficientStock`].
    pub const INSUFFICIENT_STOCK: i64 = 4;

    /// Stable reason code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Success { .. } => "success",
            Self::SoldOut => "sold_out",
            Self::DuplicateUser => "duplicate_user",
            Self::StockNotFound => "stock_not_found",
            Self::InsufficientStock { .. } => "insufficient_stock",
        }
    }

    /// Numeric status code as produced by the decrement script.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::Success { .. } => Self::SUCCESS,
            Self::SoldOut => Self::SOLD_OUT,
            Self::DuplicateUser => Self::DUPLICATE_USER,
            Self::StockNotFound => Self::STOCK_NOT_FOUND,
            Self::InsufficientStock { .. } => Self::INSUFFICIENT_STOCK,
        }
    }

    /// Returns `true` if units were reserved.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Remaining count after a successful reservation.
    #[must_use]
    pub const fn remaining(&self) -> Option<i64> {
        match self {
            Self::Success { remaining } => Some(*remaining),
            _ => None,
        }
    }
}

/// Combined stock snapshot for dashboards and monitoring.
///
/// The counter and the sold-out flag are read independently, so the two
/// fields are not one atomic snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockInfo {
    /// Counter value, `None` if the counter is absent.
    pub stock: Option<i64>,
    /// Whether the sold-out flag is present.
    pub sold_out: bool,
    /// Whether the counter exists.
    pub exists: bool,
}

impl StockInfo {
    /// Returns `true` if new reservations could currently succeed.
    #[must_use]
    pub const fn is_available(&self) -> bool {
        match self.stock {
            Some(stock) => stock > 0 && !self.sold_out,
            None => false,
        }
    }
}
