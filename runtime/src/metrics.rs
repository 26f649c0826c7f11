//! Prometheus exporter for the reservation metrics.
//!
//! The core crate only records through the `metrics` facade. This module
//! installs the global Prometheus recorder and describes every metric the
//! core emits, so the rendered output carries `# HELP` lines.
//!
//! # Example
//!
//! ```rust,no_run
//! use flash_sale_runtime::metrics::MetricsExporter;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//!
//! // ... run the sale ...
//!
//! if let Some(text) = exporter.render() {
//!     println!("{text}");
//! }
//! # Ok(())
//! # }
//! ```

use flash_sale_core::metrics::{
    DECREMENT_TOTAL, EVENT_INFO_LOOKUP_TOTAL, IDEMPOTENCY_CHECK_TOTAL, RESTORE_TOTAL,
    STORE_DURATION_SECONDS, STORE_ERRORS_TOTAL, UNITS_RESERVED_TOTAL, WARMUP_TOTAL,
};
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use thiserror::Error;

/// Store round trips are bounded by a sub-second timeout by default, so the
/// buckets concentrate below one second.
const STORE_LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5,
];

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder handle.
///
/// Rendering is left to the caller: print it, serve it, or push it.
#[derive(Default)]
pub struct MetricsExporter {
    handle: Option<PrometheusHandle>,
}

impl MetricsExporter {
    /// Create an exporter that has not been installed yet.
    #[must_use]
    pub const fn new() -> Self {
        Self { handle: None }
    }

    /// Describe all metrics and install the global Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// Only one recorder can be installed per process. If one already is
    /// (e.g., by another test), this logs a warning, returns `Ok`, and
    /// [`render`](Self::render) returns `None`.
    pub fn install(&mut self) -> Result<(), MetricsError> {
        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Full(STORE_DURATION_SECONDS.to_string()),
                STORE_LATENCY_BUCKETS,
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                register_metrics();
                tracing::info!("Prometheus metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the Prometheus handle.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if this exporter did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register descriptions for every reservation metric.
pub fn register_metrics() {
    // Reservation protocol
    describe_counter!(DECREMENT_TOTAL, "Decrement attempts by outcome reason");
    describe_counter!(UNITS_RESERVED_TOTAL, "Units reserved by successful decrements");
    describe_counter!(RESTORE_TOTAL, "Reservations restored");
    describe_counter!(WARMUP_TOTAL, "Stock warm-ups executed");

    // Idempotency and caching
    describe_counter!(IDEMPOTENCY_CHECK_TOTAL, "Idempotency checks by result");
    describe_counter!(EVENT_INFO_LOOKUP_TOTAL, "Event info cache lookups by result");

    // Store transport
    describe_counter!(STORE_ERRORS_TOTAL, "Failed store round trips by operation");
    describe_histogram!(
        STORE_DURATION_SECONDS,
        Unit::Seconds,
        "Store round-trip latency by operation"
    );
}
