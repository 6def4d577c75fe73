/*!
 * Transport definitions for the Thingy driver.
 *
 * The driver never talks to a radio itself. A [`Transport`] supplies
 * discovery, attribute resolution, reads, writes and notifications; the
 * driver layers the transaction gate, the operation queue and the codecs
 * on top.
 */
use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thingy_core::error::Result;
use thingy_core::types::Id;
use uuid::Uuid;

/// Handle of a connected peripheral
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHandle {
    /// Stable identifier of the physical device
    pub device_id: Id,
    /// Advertised name, when the platform reports one
    pub name: Option<String>,
}

impl SessionHandle {
    /// Create a handle for `device_id`
    pub fn new<I: Into<Id>>(device_id: I) -> Self {
        Self {
            device_id: device_id.into(),
            name: None,
        }
    }

    /// Set the advertised name
    pub fn with_name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// What a resolved attribute allows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttributeProperties {
    /// Readable
    pub read: bool,
    /// Writable with response
    pub write: bool,
    /// Writable without response
    pub write_without_response: bool,
    /// Supports change notifications
    pub notify: bool,
}

impl AttributeProperties {
    /// Read and notify
    pub const fn read_notify() -> Self {
        Self {
            read: true,
            write: false,
            write_without_response: false,
            notify: true,
        }
    }

    /// Read and write with response
    pub const fn read_write() -> Self {
        Self {
            read: true,
            write: true,
            write_without_response: false,
            notify: false,
        }
    }

    /// Whether any kind of write is supported
    pub fn writable(&self) -> bool {
        self.write || self.write_without_response
    }
}

/// A resolved attribute
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttributeHandle {
    /// Service the attribute belongs to
    pub service: Uuid,
    /// Attribute id
    pub attribute: Uuid,
    /// Supported operations
    pub properties: AttributeProperties,
}

/// Called with the payload of every change notification
pub type NotificationCallback = Arc<dyn Fn(&[u8]) + Send + Sync>;

/// Called once when the peer drops the connection
pub type DisconnectCallback = Arc<dyn Fn() + Send + Sync>;

/// Access to a GATT-style remote attribute server.
///
/// Implementations must tolerate being called from any task, but the
/// driver never issues more than one transaction per session at a time.
#[async_trait]
pub trait Transport: Send + Sync + Debug {
    /// Transport name for logs
    fn name(&self) -> &'static str;

    /// Find a device advertising `service_filter` and open a session,
    /// requesting access to `optional_services` as well
    async fn discover_and_connect(
        &self,
        service_filter: Uuid,
        optional_services: &[Uuid],
    ) -> Result<SessionHandle>;

    /// Resolve an attribute of a service
    async fn resolve_attribute(
        &self,
        session: &SessionHandle,
        service: Uuid,
        attribute: Uuid,
    ) -> Result<AttributeHandle>;

    /// Read the attribute value
    async fn read(&self, handle: &AttributeHandle) -> Result<Vec<u8>>;

    /// Write the attribute value
    async fn write(
        &self,
        handle: &AttributeHandle,
        bytes: &[u8],
        with_response: bool,
    ) -> Result<()>;

    /// Enable change notifications; `on_change` replaces any handler
    /// previously given for the same attribute
    async fn subscribe(
        &self,
        handle: &AttributeHandle,
        on_change: NotificationCallback,
    ) -> Result<()>;

    /// Disable change notifications
    async fn unsubscribe(&self, handle: &AttributeHandle) -> Result<()>;

    /// Register the callback run when the peer disconnects
    fn on_disconnect(&self, session: &SessionHandle, callback: DisconnectCallback);

    /// Close the session
    async fn disconnect(&self, session: &SessionHandle) -> Result<()>;
}

/// Wrapper giving a `Debug` impl to callbacks stored in structs
pub(crate) struct CallbackSlot<T>(pub(crate) T);

impl<T> Debug for CallbackSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<callback>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_handle_builder() {
        let handle = SessionHandle::new("C1:2B:9E:44:10:07").with_name("Thingy");
        assert_eq!(handle.device_id.as_str(), "C1:2B:9E:44:10:07");
        assert_eq!(handle.name.as_deref(), Some("Thingy"));
    }

    #[test]
    fn test_properties() {
        assert!(AttributeProperties::read_write().writable());
        assert!(!AttributeProperties::read_notify().writable());
        let without_response = AttributeProperties {
            write_without_response: true,
            ..Default::default()
        };
        assert!(without_response.writable());
    }

    #[test]
    fn test_handles_key_a_set() {
        let handle = |properties| AttributeHandle {
            service: Uuid::from_u128(0x0200),
            attribute: Uuid::from_u128(0x0201),
            properties,
        };
        let handles: std::collections::HashSet<_> = [
            handle(AttributeProperties::read_notify()),
            handle(AttributeProperties::read_notify()),
            handle(AttributeProperties::read_write()),
        ]
        .into_iter()
        .collect();
        assert_eq!(handles.len(), 2);
    }
}
