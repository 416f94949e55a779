//! Tracing subscriber setup.

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{LogConfig, LogFormat};

/// Filter for the configured level, falling back to `info`.
pub fn env_filter(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_new(config.level.as_str()).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init(config: &LogConfig) -> anyhow::Result<()> {
    let filter = env_filter(config);
    let registry = tracing_subscriber::registry().with(filter);

    match config.format {
        LogFormat::Console => registry
            .with(fmt::layer().with_target(true).with_thread_ids(false))
            .try_init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_current_span(false))
            .try_init(),
    }
    .context("installing tracing subscriber")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_filter_follows_level() {
        let config = LogConfig {
            level: LogLevel::Debug,
            format: LogFormat::Json,
        };
        assert_eq!(env_filter(&config).to_string(), "debug");
    }

    #[test]
    fn test_second_init_is_an_error() {
        let config = LogConfig::default();
        // Another test may have installed a subscriber first; either way
        // the second call must fail without panicking.
        let _ = init(&config);
        assert!(init(&config).is_err());
    }
}
