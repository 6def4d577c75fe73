/*!
 * Thingy Driver
 *
 * This crate drives a Nordic Thingy:52 over any GATT-style [`Transport`].
 * Every session serializes its transactions through a single gate; work
 * that cannot run right away is queued and replayed when the gate is
 * released, and operations that keep failing are discarded.
 *
 * ```no_run
 * use std::sync::Arc;
 * use thingy_driver::prelude::*;
 * use thingy_driver::{DeviceSession, Transport};
 *
 * async fn temperature(transport: Arc<dyn Transport>) -> Result<()> {
 *     let session = DeviceSession::connect(transport, SharedConfig::default()).await?;
 *     let reading = session.feature(FeatureId::Temperature).read().await?;
 *     info!("{:?}", reading);
 *     session.disconnect().await
 * }
 * ```
 */

#![warn(missing_docs)]

// Re-export core types
pub use thingy_core::prelude;

pub mod catalog;
pub mod controller;
pub mod event;
pub mod feature;
mod gate;
pub mod queue;
pub mod registry;
pub mod session;
pub mod transport;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use controller::Controller;
pub use event::SessionEvent;
pub use feature::{BindingState, Completion, DependentResource, FeatureOperation};
pub use registry::SessionRegistry;
pub use session::{ConnectionState, DeviceSession};
pub use transport::{AttributeHandle, AttributeProperties, SessionHandle, Transport};

/// Thingy driver crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize logging and announce the driver
pub fn init(config: &thingy_core::config::Config) -> Result<(), thingy_core::error::Error> {
    thingy_core::init(config)?;
    tracing::info!("Thingy Driver {} initialized", VERSION);
    Ok(())
}
