//! Error types for stock reservation operations.
//!
//! Only transport and execution failures are errors. Reservation rejections
//! (`sold_out`, `duplicate_user`, ...) are successful protocol results and are
//! returned as [`DecrementOutcome`](crate::outcome::DecrementOutcome) values.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for stock reservation operations.
pub type Result<T> = std::result::Result<T, StockError>;

/// Failures talking to the atomic store or decoding what it returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    // ═══════════════════════════════════════════════════════════
    // Transport Errors
    // ═══════════════════════════════════════════════════════════

    /// The store could not be reached or the client could not be created.
    #[error("Store connection failed: {0}")]
    Connection(String),

    /// The store rejected a command or script.
    #[error("Store command {operation} failed: {message}")]
    Command {
        /// Operation that was being executed
        operation: &'static str,
        /// Message reported by the store
        message: String,
    },

    /// The round trip did not complete before the deadline.
    ///
    /// The operation may or may not have been applied.
    #[error("Store operation {operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that was being executed
        operation: &'static str,
        /// Deadline that elapsed
        timeout: Duration,
    },

    // ═══════════════════════════════════════════════════════════
    // Decoding Errors
    // ═══════════════════════════════════════════════════════════

    /// The store returned a result with an unexpected shape.
    #[error("Malformed store reply: {0}")]
    MalformedReply(String),

    /// A stored value that must be an integer could not be parsed.
    #[error("Value {value:?} at {key} is not an integer")]
    InvalidInteger {
        /// Key holding the value
        key: String,
        /// Raw value found
        value: String,
    },

    /// A cached payload could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    // ═══════════════════════════════════════════════════════════
    // Caller Errors
    // ═══════════════════════════════════════════════════════════

    /// Quantity outside the accepted range for the operation.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Configuration value is missing or out of range.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl StockError {
    /// Returns `true` if the store may have applied the operation.
    ///
    /// Callers must not assume a reservation either succeeded or failed when
    /// this holds; a retried decrement could reserve twice.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flash_sale_core::StockError;
    /// # use std::time::Duration;
    /// let err = StockError::Timeout { operation: "decrement", timeout: Duration::from_millis(500) };
    /// assert!(err.is_outcome_unknown());
    /// assert!(!StockError::InvalidQuantity(0).is_outcome_unknown());
    /// ```
    #[must_use]
    pub const fn is_outcome_unknown(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::Connection(_) | Self::Command { .. } | Self::MalformedReply(_)
        )
    }

    /// Returns `true` for transport and execution failures: the store was
    /// unreachable or too slow, it rejected the command, or what it returned
    /// could not be decoded.
    ///
    /// Caller and serialization errors are excluded.
    ///
    /// # Examples
    ///
    /// ```
    /// # use flash_sale_core::StockError;
    /// assert!(StockError::Connection("refused".into()).is_transport());
    /// assert!(StockError::MalformedReply("empty array".into()).is_transport());
    /// assert!(!StockError::Config("ttl".into()).is_transport());
    /// ```
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection(_)
                | Self::Command { .. }
                | Self::Timeout { .. }
                | Self::MalformedReply(_)
                | Self::InvalidInteger { .. }
        )
    }
}
