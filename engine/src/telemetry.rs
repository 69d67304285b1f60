//! Telemetry and Observability
//!
//! Handles setting up `tracing-subscriber` for structured logging.
//! Supports config-driven log levels, environment variable overrides,
//! and format switching between pretty (debug) and JSON (release).
//!
//! All output goes to stderr; stdout belongs to the chat transcript.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the tracing subscriber with the given log level from config.
///
/// Priority: `RUST_LOG` env var > `log_level` parameter
///
/// In debug builds: pretty-printed terminal output.
/// In release builds: JSON structured output with spans.
pub fn init_telemetry_with_level(log_level: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(log_level)));

    #[cfg(debug_assertions)]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .pretty()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .ok();
    }
}

/// Filter directives used when `RUST_LOG` is unset
fn default_directives(log_level: &str) -> String {
    format!("{},termgenius_engine={}", log_level, log_level)
}

#[cfg(test)]
mod tests {
    use super::*;

    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_default_directives() {
        assert_eq!(default_directives("debug"), "debug,termgenius_engine=debug");

        let filter = EnvFilter::new(default_directives("warn"));
        assert_eq!(filter.max_level_hint(), Some(LevelFilter::WARN));
        assert!(filter.to_string().contains("termgenius_engine=warn"));
    }

    #[test]
    fn test_repeated_init_keeps_first_subscriber() {
        init_telemetry_with_level("debug");
        init_telemetry_with_level("info");
        // try_init leaves the first global subscriber in place
        assert!(tracing::dispatcher::has_been_set());
    }
}
