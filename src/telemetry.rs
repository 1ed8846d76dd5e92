//! Logging initialization.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: standard `tracing` filter directives (default: `flowsmith=info`)
//! - `FLOWSMITH_LOG_FORMAT`: `json` for machine-readable lines, anything else for text

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Configuration for the log subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub default_filter: String,
    /// Emit one JSON object per line instead of human-readable text.
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "flowsmith=info".to_string(),
            json: std::env::var("FLOWSMITH_LOG_FORMAT")
                .map(|v| v.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global `tracing` subscriber. Logs go to stderr so that
/// command output on stdout stays pipeable.
pub fn init_logging(config: &LogConfig) {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_writer(std::io::stderr);

    let layer = if config.json {
        fmt_layer.json().with_filter(config.filter()).boxed()
    } else {
        fmt_layer.with_filter(config.filter()).boxed()
    };

    tracing_subscriber::registry().with(layer).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter() {
        let config = LogConfig::default();
        assert_eq!(config.default_filter, "flowsmith=info");
    }
}
