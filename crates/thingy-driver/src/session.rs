/*!
 * Device sessions.
 *
 * A [`DeviceSession`] owns one connection to a Thingy:52: the controller
 * with its gate and queue, one [`FeatureOperation`] per feature and the
 * event stream observers subscribe to.
 */
use std::fmt;
use std::sync::{Arc, Weak};

use serde::{Deserialize, Serialize};
use thingy_core::config::SharedConfig;
use thingy_core::error::{Error, Result};
use thingy_core::event::{EventReceiver, SharedEventBus};
use thingy_core::types::{FeatureId, Id};
use thingy_core::utils::with_timeout;
use tracing::{debug, error, info};

use crate::catalog::{self, CONFIGURATION_SERVICE, OPTIONAL_SERVICES};
use crate::controller::Controller;
use crate::event::SessionEvent;
use crate::feature::FeatureOperation;
use crate::transport::{SessionHandle, Transport};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    /// The session accepts operations
    Connected,
    /// The session is gone; nothing is queued or in flight
    Disconnected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Disconnected => write!(f, "Disconnected"),
        }
    }
}

/// A connected Thingy:52
#[derive(Debug)]
pub struct DeviceSession {
    handle: SessionHandle,
    transport: Arc<dyn Transport>,
    controller: Arc<Controller>,
    features: Vec<Arc<FeatureOperation>>,
    events: SharedEventBus<SessionEvent>,
    config: SharedConfig,
}

/// Tear a session down; false when it already was
fn tear_down(controller: &Controller, features: &[Arc<FeatureOperation>]) -> bool {
    if !controller.teardown() {
        return false;
    }
    for feature in features {
        feature.reset();
    }
    controller.publish(SessionEvent::Disconnected);
    info!(session = %controller.session_id(), "Session disconnected");
    true
}

impl DeviceSession {
    /// Discover a Thingy:52 through `transport` and open a session
    pub async fn connect(transport: Arc<dyn Transport>, config: SharedConfig) -> Result<Self> {
        config.get().validate()?;
        debug!(transport = transport.name(), "Discovering device");

        let handle = transport
            .discover_and_connect(CONFIGURATION_SERVICE, &OPTIONAL_SERVICES)
            .await
            .map_err(|e| {
                error!("Failed to connect: {}", e);
                e
            })?;

        let events = SharedEventBus::with_capacity(config.get().events.channel_capacity);
        let controller = Controller::new(
            handle.device_id.clone(),
            config.get().queue.clone(),
            events.clone(),
        )?;
        let features: Vec<Arc<FeatureOperation>> = FeatureId::ALL
            .iter()
            .map(|feature| {
                FeatureOperation::new(
                    catalog::descriptor(*feature),
                    Arc::clone(&transport),
                    handle.clone(),
                    Arc::clone(&controller),
                )
            })
            .collect();

        let weak_controller: Weak<Controller> = Arc::downgrade(&controller);
        let weak_features: Vec<Weak<FeatureOperation>> =
            features.iter().map(Arc::downgrade).collect();
        transport.on_disconnect(
            &handle,
            Arc::new(move || {
                let Some(controller) = weak_controller.upgrade() else {
                    return;
                };
                let features: Vec<Arc<FeatureOperation>> =
                    weak_features.iter().filter_map(Weak::upgrade).collect();
                if !tear_down(&controller, &features) {
                    debug!("Disconnect callback for a closed session ignored");
                }
            }),
        );

        controller.mark_connected();
        info!(
            session = %handle.device_id,
            name = handle.name.as_deref().unwrap_or("unknown"),
            "Session connected"
        );

        Ok(Self {
            handle,
            transport,
            controller,
            features,
            events,
            config,
        })
    }

    /// Device id
    pub fn id(&self) -> &Id {
        &self.handle.device_id
    }

    /// Advertised name, if known
    pub fn name(&self) -> Option<&str> {
        self.handle.name.as_deref()
    }

    /// Connection state
    pub fn state(&self) -> ConnectionState {
        if self.controller.is_connected() {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        }
    }

    /// Whether the session accepts operations
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Operations of `feature`
    pub fn feature(&self, feature: FeatureId) -> &Arc<FeatureOperation> {
        &self.features[feature.index()]
    }

    /// Operations of every feature, in catalog order
    pub fn features(&self) -> &[Arc<FeatureOperation>] {
        &self.features
    }

    /// The session controller
    pub fn controller(&self) -> &Arc<Controller> {
        &self.controller
    }

    /// Configuration the session was opened with
    pub fn config(&self) -> &SharedConfig {
        &self.config
    }

    /// Subscribe to the session event stream
    pub fn subscribe(&self) -> EventReceiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Close the session. Closing a closed session does nothing.
    pub async fn disconnect(&self) -> Result<()> {
        if !tear_down(&self.controller, &self.features) {
            debug!(session = %self.id(), "Session already disconnected");
            return Ok(());
        }
        let limit = self.config.get().queue.poll_ceiling();
        with_timeout(limit, self.transport.disconnect(&self.handle))
            .await
            .map_err(|e| {
                error!(session = %self.id(), "Transport disconnect failed: {}", e);
                Error::transport(format!("Failed to close session {}: {}", self.id(), e))
            })
    }
}
