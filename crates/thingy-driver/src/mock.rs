//! In-process transport for tests and demos.
//!
//! `MockTransport` keeps an attribute table, records every call and can be
//! told to fail resolution, reads, writes or subscriptions per attribute.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use thingy_core::error::{Error, Result};
use thingy_core::types::{FeatureId, Id};
use uuid::Uuid;

use crate::catalog::{attribute_of, descriptor, service_of};
use crate::transport::{
    AttributeHandle, AttributeProperties, DisconnectCallback, NotificationCallback,
    SessionHandle, Transport,
};

/// A call the mock received
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    /// `discover_and_connect`
    Connect,
    /// `resolve_attribute`
    Resolve(Uuid),
    /// `read`
    Read(Uuid),
    /// `write`, with payload and response mode
    Write(Uuid, Vec<u8>, bool),
    /// `subscribe`
    Subscribe(Uuid),
    /// `unsubscribe`
    Unsubscribe(Uuid),
    /// `disconnect`
    Disconnect,
}

/// One simulated attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockAttribute {
    /// Owning service
    pub service: Uuid,
    /// Supported operations
    pub properties: AttributeProperties,
    /// Current value
    pub value: Vec<u8>,
}

#[derive(Default)]
struct MockState {
    device_id: Option<Id>,
    refuse_connect: Option<Error>,
    attributes: HashMap<Uuid, MockAttribute>,
    failing: HashMap<&'static str, HashSet<Uuid>>,
    handlers: HashMap<Uuid, NotificationCallback>,
    on_disconnect: Vec<DisconnectCallback>,
    calls: Vec<TransportCall>,
    connected: bool,
    latency: Option<Duration>,
}

/// A scriptable transport
#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MockTransport").finish_non_exhaustive()
    }
}

/// Attribute table of a stock Thingy:52
fn stock_attribute(feature: FeatureId) -> MockAttribute {
    let codec = descriptor(feature).codec;
    let properties = match feature {
        FeatureId::SpeakerData => AttributeProperties {
            write_without_response: true,
            ..Default::default()
        },
        FeatureId::Microphone => AttributeProperties {
            notify: true,
            ..Default::default()
        },
        FeatureId::Firmware => AttributeProperties {
            read: true,
            ..Default::default()
        },
        _ if codec.has_encoder() => AttributeProperties::read_write(),
        _ => AttributeProperties::read_notify(),
    };
    let value = match feature {
        FeatureId::Name => b"Thingy".to_vec(),
        FeatureId::AdvertisingParameters => vec![0xA0, 0x00, 0x0A],
        FeatureId::ConnectionParameters => vec![0x06, 0x00, 0x18, 0x00, 0x00, 0x00, 0x90, 0x01],
        FeatureId::Eddystone => vec![
            0x03, b'n', b'o', b'r', b'd', b'i', b'c', b's', b'e', b'm', b'i', 0x00,
        ],
        FeatureId::CloudToken => Vec::new(),
        FeatureId::Firmware => vec![2, 2, 0],
        FeatureId::Mtu => vec![0x00, 0x17, 0x00],
        FeatureId::Temperature => vec![0x16, 0x32],
        FeatureId::Pressure => vec![0xF5, 0x03, 0x00, 0x00, 0x19],
        FeatureId::Humidity => vec![41],
        FeatureId::Gas => vec![0x90, 0x01, 0x00, 0x00],
        FeatureId::Color => vec![0x10, 0x00, 0x20, 0x00, 0x30, 0x00, 0x40, 0x00],
        FeatureId::EnvironmentConfiguration => {
            vec![0xE8, 0x03, 0xE8, 0x03, 0xE8, 0x03, 0xE8, 0x03, 0x02, 0x67, 0x6B, 0x8B]
        }
        FeatureId::Led => vec![0x02, 0x03, 0x14, 0xE8, 0x03],
        FeatureId::Button => vec![0],
        FeatureId::MotionConfiguration => {
            vec![0xE8, 0x03, 0x10, 0x27, 0x10, 0x27, 0x3C, 0x00, 0x01]
        }
        FeatureId::Tap => vec![0x01, 0x02],
        FeatureId::AbsoluteOrientation => vec![0],
        FeatureId::QuaternionOrientation => {
            let mut raw = vec![0x00, 0x00, 0x00, 0x40];
            raw.extend_from_slice(&[0; 12]);
            raw
        }
        FeatureId::StepCounter => vec![0x0A, 0, 0, 0, 0x10, 0x27, 0, 0],
        FeatureId::RawData => vec![0; 18],
        FeatureId::EulerOrientation => vec![0; 12],
        FeatureId::RotationMatrixOrientation => {
            vec![0x00, 0x40, 0, 0, 0, 0, 0, 0, 0x00, 0x40, 0, 0, 0, 0, 0, 0, 0x00, 0x40]
        }
        FeatureId::Heading => vec![0x00, 0x00, 0x5A, 0x00],
        FeatureId::GravityVector => vec![0; 12],
        FeatureId::SoundConfiguration => vec![0x01, 0x01],
        FeatureId::SpeakerData => Vec::new(),
        FeatureId::SpeakerStatus => vec![0x00],
        FeatureId::Microphone => Vec::new(),
        FeatureId::Battery => vec![87],
    };
    MockAttribute {
        service: service_of(feature),
        properties,
        value,
    }
}

impl MockTransport {
    /// An empty transport with no attributes
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport exposing every Thingy:52 attribute with plausible values
    pub fn thingy() -> Self {
        let transport = Self::new();
        if let Ok(mut state) = transport.state.lock() {
            for feature in FeatureId::ALL {
                state
                    .attributes
                    .insert(attribute_of(feature), stock_attribute(feature));
            }
        }
        transport
    }

    fn lock(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state
            .lock()
            .map_err(|_| Error::other("Failed to acquire mock transport lock"))
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut MockState) -> T) -> Option<T> {
        self.lock().ok().map(|mut state| f(&mut state))
    }

    /// Use `id` as the device id
    pub fn with_device_id<I: Into<Id>>(self, id: I) -> Self {
        let id = id.into();
        self.with_state(|state| state.device_id = Some(id));
        self
    }

    /// Sleep this long in every transaction
    pub fn with_latency(self, latency: Duration) -> Self {
        self.with_state(|state| state.latency = Some(latency));
        self
    }

    /// Make discovery fail with `error`
    pub fn refuse_connect(&self, error: Error) {
        self.with_state(|state| state.refuse_connect = Some(error));
    }

    /// Replace the attribute of `feature`
    pub fn set_attribute(&self, feature: FeatureId, attribute: MockAttribute) {
        self.with_state(|state| {
            state.attributes.insert(attribute_of(feature), attribute);
        });
    }

    /// Replace the properties of `feature`
    pub fn set_properties(&self, feature: FeatureId, properties: AttributeProperties) {
        self.with_state(|state| {
            if let Some(attribute) = state.attributes.get_mut(&attribute_of(feature)) {
                attribute.properties = properties;
            }
        });
    }

    /// Replace the value of `feature`
    pub fn set_value(&self, feature: FeatureId, value: Vec<u8>) {
        self.with_state(|state| {
            if let Some(attribute) = state.attributes.get_mut(&attribute_of(feature)) {
                attribute.value = value;
            }
        });
    }

    /// Current value of `feature`
    pub fn value(&self, feature: FeatureId) -> Option<Vec<u8>> {
        self.with_state(|state| {
            state
                .attributes
                .get(&attribute_of(feature))
                .map(|attribute| attribute.value.clone())
        })
        .flatten()
    }

    fn set_failing(&self, kind: &'static str, feature: FeatureId, failing: bool) {
        self.with_state(|state| {
            let set = state.failing.entry(kind).or_default();
            if failing {
                set.insert(attribute_of(feature));
            } else {
                set.remove(&attribute_of(feature));
            }
        });
    }

    /// Make resolution of `feature` fail or succeed
    pub fn fail_resolve(&self, feature: FeatureId, failing: bool) {
        self.set_failing("resolve", feature, failing);
    }

    /// Make reads of `feature` fail or succeed
    pub fn fail_read(&self, feature: FeatureId, failing: bool) {
        self.set_failing("read", feature, failing);
    }

    /// Make writes of `feature` fail or succeed
    pub fn fail_write(&self, feature: FeatureId, failing: bool) {
        self.set_failing("write", feature, failing);
    }

    /// Make subscriptions of `feature` fail or succeed
    pub fn fail_subscribe(&self, feature: FeatureId, failing: bool) {
        self.set_failing("subscribe", feature, failing);
    }

    /// Every call so far, oldest first
    pub fn calls(&self) -> Vec<TransportCall> {
        self.with_state(|state| state.calls.clone()).unwrap_or_default()
    }

    /// Number of registered notification handlers
    pub fn handler_count(&self) -> usize {
        self.with_state(|state| state.handlers.len()).unwrap_or(0)
    }

    /// Deliver a notification for `feature`; false if nobody is subscribed
    pub fn notify(&self, feature: FeatureId, payload: &[u8]) -> bool {
        let handler = self
            .with_state(|state| state.handlers.get(&attribute_of(feature)).cloned())
            .flatten();
        match handler {
            Some(handler) => {
                handler(payload);
                true
            }
            None => false,
        }
    }

    /// Simulate the peer dropping the connection
    pub fn drop_connection(&self) {
        let callbacks = self
            .with_state(|state| {
                state.connected = false;
                state.handlers.clear();
                state.on_disconnect.clone()
            })
            .unwrap_or_default();
        for callback in callbacks {
            callback();
        }
    }

    async fn transaction(&self, call: TransportCall) -> Result<()> {
        let latency = {
            let mut state = self.lock()?;
            state.calls.push(call);
            if !state.connected {
                return Err(Error::transport("mock device is not connected"));
            }
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        Ok(())
    }

    fn check(&self, kind: &'static str, attribute: &Uuid) -> Result<MockAttribute> {
        let state = self.lock()?;
        if state
            .failing
            .get(kind)
            .map_or(false, |set| set.contains(attribute))
        {
            return Err(Error::transport(format!("mock {} of {} failed", kind, attribute)));
        }
        state
            .attributes
            .get(attribute)
            .cloned()
            .ok_or_else(|| Error::transport(format!("attribute {} not found", attribute)))
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn discover_and_connect(
        &self,
        _service_filter: Uuid,
        _optional_services: &[Uuid],
    ) -> Result<SessionHandle> {
        let mut state = self.lock()?;
        state.calls.push(TransportCall::Connect);
        if let Some(error) = state.refuse_connect.clone() {
            return Err(error);
        }
        state.connected = true;
        let device_id = state.device_id.get_or_insert_with(Id::new).clone();
        Ok(SessionHandle::new(device_id).with_name("Thingy"))
    }

    async fn resolve_attribute(
        &self,
        _session: &SessionHandle,
        service: Uuid,
        attribute: Uuid,
    ) -> Result<AttributeHandle> {
        self.transaction(TransportCall::Resolve(attribute)).await?;
        let found = self.check("resolve", &attribute)?;
        if found.service != service {
            return Err(Error::transport(format!(
                "attribute {} is not part of service {}",
                attribute, service
            )));
        }
        Ok(AttributeHandle {
            service,
            attribute,
            properties: found.properties,
        })
    }

    async fn read(&self, handle: &AttributeHandle) -> Result<Vec<u8>> {
        self.transaction(TransportCall::Read(handle.attribute)).await?;
        Ok(self.check("read", &handle.attribute)?.value)
    }

    async fn write(
        &self,
        handle: &AttributeHandle,
        bytes: &[u8],
        with_response: bool,
    ) -> Result<()> {
        self.transaction(TransportCall::Write(
            handle.attribute,
            bytes.to_vec(),
            with_response,
        ))
        .await?;
        self.check("write", &handle.attribute)?;
        let mut state = self.lock()?;
        if let Some(attribute) = state.attributes.get_mut(&handle.attribute) {
            attribute.value = bytes.to_vec();
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        handle: &AttributeHandle,
        on_change: NotificationCallback,
    ) -> Result<()> {
        self.transaction(TransportCall::Subscribe(handle.attribute)).await?;
        self.check("subscribe", &handle.attribute)?;
        self.lock()?.handlers.insert(handle.attribute, on_change);
        Ok(())
    }

    async fn unsubscribe(&self, handle: &AttributeHandle) -> Result<()> {
        self.transaction(TransportCall::Unsubscribe(handle.attribute)).await?;
        self.lock()?.handlers.remove(&handle.attribute);
        Ok(())
    }

    fn on_disconnect(&self, _session: &SessionHandle, callback: DisconnectCallback) {
        self.with_state(|state| state.on_disconnect.push(callback));
    }

    async fn disconnect(&self, _session: &SessionHandle) -> Result<()> {
        let was_connected = {
            let mut state = self.lock()?;
            state.calls.push(TransportCall::Disconnect);
            std::mem::replace(&mut state.connected, false)
        };
        if was_connected {
            self.drop_connection();
        }
        Ok(())
    }
}
