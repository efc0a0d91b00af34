//! Subscriber setup for binaries embedding the profiler core.
//!
//! Library crates only emit `tracing` events; installing a subscriber is the
//! host's choice. [`init`] is a convenience for hosts without their own.
//!
//! The filter comes from `CPTREE_LOG` when set (standard `EnvFilter`
//! directives, e.g. `cptree_core=debug,info`), else from
//! [`LogConfig::directive`].

use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;

/// Environment variable holding filter directives.
pub const LOG_ENV: &str = "CPTREE_LOG";

/// Subscriber options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// Fallback filter when `CPTREE_LOG` is unset or invalid.
    pub directive: String,
    /// Emit JSON lines (needs the `tracing-json` feature).
    pub json: bool,
    pub with_target: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            directive: "info".to_string(),
            json: false,
            with_target: true,
        }
    }
}

/// Filter from `CPTREE_LOG`, falling back to the configured directive.
#[must_use]
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(&config.directive))
}

/// Install a global subscriber.
///
/// Fails if one is already installed.
pub fn init(config: &LogConfig) -> Result<(), TryInitError> {
    let filter = env_filter(config);

    #[cfg(feature = "tracing-json")]
    if config.json {
        return tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(config.with_target))
            .try_init();
    }

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(config.with_target))
        .try_init()
}
