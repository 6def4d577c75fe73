/*!
 * Thingy Core
 *
 * This crate provides the ambient functionality shared by the Thingy
 * driver crates: errors, configuration, logging, the event bus, feature
 * identifiers and bounded-poll helpers.
 */

#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod prelude;
pub mod types;
pub mod utils;

/// Re-export of dependencies that are part of the public API
pub mod deps {
    pub use serde;
    pub use tokio;
    pub use tracing;
    pub use uuid;
}

/// Thingy core crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library initialization: installs the tracing subscriber described by `config`
pub fn init(config: &config::Config) -> Result<(), error::Error> {
    config.validate()?;
    logging::init_from_config(&config.logging)?;
    tracing::info!("Thingy Core {} initialized", VERSION);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_init_rejects_invalid_config() {
        let mut config = config::Config::default();
        config.events.channel_capacity = 0;
        assert!(matches!(init(&config), Err(error::Error::Config(_))));
    }
}
