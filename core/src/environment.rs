//! Injected dependencies.

use chrono::{DateTime, Utc};

/// Clock trait - abstracts time operations for testability.
///
/// In-process stores use it to evaluate TTL expiry, so tests can move time
/// forward instead of sleeping.
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
