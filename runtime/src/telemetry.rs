//! Tracing subscriber setup.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a global `fmt` subscriber.
///
/// `RUST_LOG` takes precedence; `default_filter` applies when it is unset or
/// invalid (e.g., `"flash_sale_core=debug,info"`).
///
/// # Errors
///
/// Returns error if a global subscriber is already installed.
pub fn init_tracing(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails_instead_of_panicking() {
        let _ = init_tracing("info");
        assert!(init_tracing("debug").is_err());
    }
}
