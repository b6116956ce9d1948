//! Logging setup

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::LoggingConfig;

/// Install a global tracing subscriber
///
/// `RUST_LOG` takes precedence over the configured level. Returns `false`
/// if a subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    let registry = tracing_subscriber::registry();
    let result = if config.format.eq_ignore_ascii_case("json") {
        registry.with(fmt::layer().json()).with(filter).try_init()
    } else {
        registry.with(fmt::layer()).with(filter).try_init()
    };

    result.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        let config = LoggingConfig::default();
        init_logging(&config);
        assert!(!init_logging(&config));
    }
}
