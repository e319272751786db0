//! Logging bootstrap.
//!
//! Setting changes are reported through `tracing`. Hosts that already install
//! a subscriber need nothing from here; standalone drivers and tests can use
//! these helpers.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LOG_ENV_VAR;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Initialize tracing with the `SCHEMESWITCH_LOG` environment variable.
///
/// Defaults to "info" level if `SCHEMESWITCH_LOG` is not set.
///
/// # Panics
///
/// Panics if a global subscriber is already installed.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Like [`init_tracing`], but returns an error instead of panicking when a
/// global subscriber is already installed.
///
/// # Errors
///
/// Returns `TryInitError` if a subscriber was installed earlier.
pub fn try_init_tracing() -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter())
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init()
}
