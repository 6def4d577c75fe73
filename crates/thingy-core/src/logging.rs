/*!
 * Logging functionality for the Thingy driver.
 *
 * This module provides tracing setup and the spans used to instrument
 * feature operations.
 */
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use crate::types::{FeatureId, MethodKind};

/// Initialize the logging system with default configuration
pub fn init() -> Result<()> {
    init_with_filter("info")
}

/// Initialize the logging system with a specific filter
///
/// # Arguments
///
/// * `filter` - The log filter string (e.g., "info", "debug", "thingy_driver=trace")
pub fn init_with_filter(filter: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// Initialize the logging system from the logging section of a configuration
pub fn init_from_config(config: &LoggingConfig) -> Result<()> {
    if !config.json_format {
        return init_with_filter(&config.level);
    }

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(fmt::layer().json().with_target(true))
        .with(filter)
        .try_init()
        .map_err(|e| Error::runtime(format!("Failed to initialize logging: {}", e)))?;

    Ok(())
}

/// A convenience macro for creating structured logs with fields
#[macro_export]
macro_rules! log_with_fields {
    ($level:expr, $message:expr, $($field:tt)+) => {
        tracing::event!($level, $($field)+, message = $message)
    };
}

/// A type alias for a tracing span
pub type Span = tracing::Span;

/// Create a new span covering everything one feature does
pub fn feature_span(feature: FeatureId) -> Span {
    tracing::info_span!("feature", name = %feature)
}

/// Create a new span for one feature operation
///
/// # Arguments
///
/// * `method` - The transaction being performed
/// * `feature` - The feature performing it
pub fn operation_span(method: MethodKind, feature: FeatureId) -> Span {
    tracing::debug_span!("operation", method = %method, feature = %feature)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::Level;

    #[test]
    fn test_init() {
        // A second global subscriber is refused, which is reported as an error
        let _ = init();
        assert!(init().is_err());
    }

    #[test]
    fn test_spans() {
        let span = feature_span(FeatureId::Temperature);
        let _entered = span.enter();

        let span = operation_span(MethodKind::Read, FeatureId::Led);
        let _entered = span.enter();
    }

    #[test]
    fn test_log_with_fields() {
        log_with_fields!(Level::DEBUG, "queued", feature = "led", method = "write");
    }
}
