/*!
 * Prelude module for Thingy Core.
 *
 * This module re-exports commonly used types and functions from the Thingy Core crate
 * to make them easier to import.
 */

// Re-export error types
pub use crate::error::{Error, Result};

// Re-export identifiers
pub use crate::types::{FeatureId, Id, MethodKind};

// Re-export event types
pub use crate::event::{EventBus, EventReceiver, SharedEventBus};

// Re-export config types
pub use crate::config::{Config, ConfigBuilder, QueueConfig, SharedConfig};

// Re-export utility functions
pub use crate::utils::{poll_until, spawn_and_log, with_timeout};

// Re-export logging macros
pub use crate::log_with_fields;
pub use tracing::{debug, error, info, trace, warn};

// Re-export core initialization
pub use crate::init;
