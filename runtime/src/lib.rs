//! # Flash Sale Runtime
//!
//! Process-level observability for services built on `flash-sale-core`:
//!
//! - [`metrics`]: Prometheus recorder and metric descriptions
//! - [`telemetry`]: tracing subscriber initialisation
//!
//! ## Example
//!
//! ```rust,no_run
//! use flash_sale_runtime::{metrics::MetricsExporter, telemetry::init_tracing};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! init_tracing("flash_sale_core=debug,info")?;
//!
//! let mut exporter = MetricsExporter::new();
//! exporter.install()?;
//! # Ok(())
//! # }
//! ```

pub mod metrics;
pub mod telemetry;

pub use metrics::{MetricsError, MetricsExporter};
pub use telemetry::init_tracing;
