//! Configuration for the reservation protocol and its store.
//!
//! Loads from environment variables with sensible defaults. Builder-style
//! setters allow overriding individual values in code and tests.

use crate::error::{Result, StockError};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Full configuration loaded from the environment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Reservation protocol TTLs and deadlines
    pub reservation: ReservationConfig,
    /// Redis connection settings
    pub redis: RedisConfig,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Missing or unparseable values fall back to their defaults; call
    /// [`Config::validate`] to reject out-of-range values.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            reservation: ReservationConfig::from_env(),
            redis: RedisConfig::from_env(),
        }
    }

    /// Validate every section.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Config`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        self.reservation.validate()?;
        self.redis.validate()
    }
}

/// TTLs and deadlines used by the reservation protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReservationConfig {
    /// Lifetime of a stock counter (the sale window).
    ///
    /// Default: 24 hours
    pub stock_ttl: Duration,

    /// Lifetime of a participation flag (the dedup window).
    ///
    /// Default: 24 hours
    pub participation_ttl: Duration,

    /// Lifetime of a sold-out flag.
    ///
    /// Default: 24 hours
    pub sold_out_ttl: Duration,

    /// Lifetime of an idempotency marker.
    ///
    /// Default: 24 hours
    pub idempotency_ttl: Duration,

    /// Lifetime of cached event metadata.
    ///
    /// Default: 10 minutes
    pub event_info_ttl: Duration,

    /// Deadline for a single store round trip.
    ///
    /// Default: 500 milliseconds
    pub operation_timeout: Duration,
}

impl ReservationConfig {
    const DAY: Duration = Duration::from_secs(86_400);

    /// Create a configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            stock_ttl: Self::DAY,
            participation_ttl: Self::DAY,
            sold_out_ttl: Self::DAY,
            idempotency_ttl: Self::DAY,
            event_info_ttl: Duration::from_secs(600),
            operation_timeout: Duration::from_millis(500),
        }
    }

    /// Load from environment variables, falling back to defaults.
    ///
    /// | Variable | Default |
    /// |---|---|
    /// | `FLASH_SALE_STOCK_TTL_SECS` | 86400 |
    /// | `FLASH_SALE_PARTICIPATION_TTL_SECS` | 86400 |
    /// | `FLASH_SALE_SOLD_OUT_TTL_SECS` | 86400 |
    /// | `FLASH_SALE_IDEMPOTENCY_TTL_SECS` | 86400 |
    /// | `FLASH_SALE_EVENT_INFO_TTL_SECS` | 600 |
    /// | `FLASH_SALE_OPERATION_TIMEOUT_MS` | 500 |
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::new();
        Self {
            stock_ttl: env_secs("FLASH_SALE_STOCK_TTL_SECS").unwrap_or(defaults.stock_ttl),
            participation_ttl: env_secs("FLASH_SALE_PARTICIPATION_TTL_SECS")
                .unwrap_or(defaults.participation_ttl),
            sold_out_ttl: env_secs("FLASH_SALE_SOLD_OUT_TTL_SECS")
                .unwrap_or(defaults.sold_out_ttl),
            idempotency_ttl: env_secs("FLASH_SALE_IDEMPOTENCY_TTL_SECS")
                .unwrap_or(defaults.idempotency_ttl),
            event_info_ttl: env_secs("FLASH_SALE_EVENT_INFO_TTL_SECS")
                .unwrap_or(defaults.event_info_ttl),
            operation_timeout: env::var("FLASH_SALE_OPERATION_TIMEOUT_MS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map_or(defaults.operation_timeout, Duration::from_millis),
        }
    }

    /// Set the stock counter TTL.
    #[must_use]
    pub const fn with_stock_ttl(mut self, ttl: Duration) -> Self {
        self.stock_ttl = ttl;
        self
    }

    /// Set the participation flag TTL.
    #[must_use]
    pub const fn with_participation_ttl(mut self, ttl: Duration) -> Self {
        self.participation_ttl = ttl;
        self
    }

    /// Set the sold-out flag TTL.
    #[must_use]
    pub const fn with_sold_out_ttl(mut self, ttl: Duration) -> Self {
        self.sold_out_ttl = ttl;
        self
    }

    /// Set the idempotency marker TTL.
    #[must_use]
    pub const fn with_idempotency_ttl(mut self, ttl: Duration) -> Self {
        self.idempotency_ttl = ttl;
        self
    }

    /// Set the event info cache TTL.
    #[must_use]
    pub const fn with_event_info_ttl(mut self, ttl: Duration) -> Self {
        self.event_info_ttl = ttl;
        self
    }

    /// Set the per-call store deadline.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Reject zero TTLs and a zero deadline.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Config`] naming the first zero value.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("stock_ttl", self.stock_ttl),
            ("participation_ttl", self.participation_ttl),
            ("sold_out_ttl", self.sold_out_ttl),
            ("idempotency_ttl", self.idempotency_ttl),
            ("event_info_ttl", self.event_info_ttl),
            ("operation_timeout", self.operation_timeout),
        ];
        for (name, value) in fields {
            if value.is_zero() {
                return Err(StockError::Config(format!("{name} must be greater than zero")));
            }
        }
        Ok(())
    }
}

impl Default for ReservationConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Redis connection settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    pub url: String,
    /// Connection timeout in seconds
    pub connect_timeout: u64,
}

impl RedisConfig {
    /// Load from `REDIS_URL` and `REDIS_CONNECT_TIMEOUT_SECS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1:6379".to_string()),
            connect_timeout: env::var("REDIS_CONNECT_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        }
    }

    /// Connection timeout as a `Duration`.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout)
    }

    /// Reject an empty URL or a zero connect timeout.
    ///
    /// # Errors
    ///
    /// Returns [`StockError::Config`] describing the invalid value.
    pub fn validate(&self) -> Result<()> {
        if self.url.is_empty() {
            return Err(StockError::Config("redis url must not be empty".into()));
        }
        if self.connect_timeout == 0 {
            return Err(StockError::Config(
                "redis connect_timeout must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379".to_string(),
            connect_timeout: 5,
        }
    }
}

fn env_secs(name: &str) -> Option<Duration> {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}
