//! Metric names and recorders for the reservation protocol.
//!
//! Only the `metrics` facade is used here. Installing an exporter is left to
//! the application (see `flash-sale-runtime`); without one, recording is a no-op.

use crate::outcome::DecrementOutcome;
use metrics::{counter, histogram};
use std::time::Duration;

/// Decrement attempts, labelled by `outcome` reason code.
pub const DECREMENT_TOTAL: &str = "flash_sale_decrement_total";
/// Units reserved by successful decrements.
pub const UNITS_RESERVED_TOTAL: &str = "flash_sale_units_reserved_total";
/// Restore operations executed.
pub const RESTORE_TOTAL: &str = "flash_sale_restore_total";
/// Stock warm-ups executed.
pub const WARMUP_TOTAL: &str = "flash_sale_warmup_total";
/// Idempotency checks, labelled by `result` (`first_seen` or `duplicate`).
pub const IDEMPOTENCY_CHECK_TOTAL: &str = "flash_sale_idempotency_check_total";
/// Event info cache lookups, labelled by `result` (`hit` or `miss`).
pub const EVENT_INFO_LOOKUP_TOTAL: &str = "flash_sale_event_info_lookup_total";
/// Failed store round trips, labelled by `operation`.
pub const STORE_ERRORS_TOTAL: &str = "flash_sale_store_errors_total";
/// Store round-trip latency, labelled by `operation`.
pub const STORE_DURATION_SECONDS: &str = "flash_sale_store_duration_seconds";

/// Reservation metrics recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record a decrement outcome.
    pub fn record_decrement(outcome: &DecrementOutcome, quantity: i64) {
        counter!(DECREMENT_TOTAL, "outcome" => outcome.reason()).increment(1);
        if outcome.is_success() {
            counter!(UNITS_RESERVED_TOTAL).increment(quantity.unsigned_abs());
        }
    }

    /// Record a restore.
    pub fn record_restore() {
        counter!(RESTORE_TOTAL).increment(1);
    }

    /// Record a warm-up.
    pub fn record_warmup() {
        counter!(WARMUP_TOTAL).increment(1);
    }

    /// Record an idempotency check.
    pub fn record_idempotency_check(already_processed: bool) {
        let result = if already_processed { "duplicate" } else { "first_seen" };
        counter!(IDEMPOTENCY_CHECK_TOTAL, "result" => result).increment(1);
    }

    /// Record an event info cache lookup.
    pub fn record_event_info_lookup(hit: bool) {
        let result = if hit { "hit" } else { "miss" };
        counter!(EVENT_INFO_LOOKUP_TOTAL, "result" => result).increment(1);
    }

    /// Record a failed store round trip.
    pub fn record_store_error(operation: &'static str) {
        counter!(STORE_ERRORS_TOTAL, "operation" => operation).increment(1);
    }

    /// Record store round-trip latency.
    pub fn record_duration(operation: &'static str, duration: Duration) {
        histogram!(STORE_DURATION_SECONDS, "operation" => operation).record(duration.as_secs_f64());
    }
}
