//! Structured logging.
//!
//! # Design Decisions
//! - `tracing` events everywhere, one subscriber installed at startup
//! - `RUST_LOG` wins over `observability.log_level`
//! - Diagnostics go to stderr; stdout carries rendered records only
//! - JSON format for log shipping, pretty format for terminals

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Build the event filter: `RUST_LOG` if set, otherwise the configured level
/// for this crate and `warn` for everything else.
pub fn build_filter(config: &ObservabilityConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)))
}

fn default_directives(level: &str) -> String {
    format!("warn,log_stream={level}")
}

/// Install the global subscriber. Returns `false` if one was already set
/// (tests and the demo may initialise more than once).
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let registry = tracing_subscriber::registry().with(build_filter(config));

    let installed = if config.json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };

    installed.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "warn,log_stream=debug");
    }

    #[test]
    fn test_second_init_is_rejected() {
        let config = ObservabilityConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
