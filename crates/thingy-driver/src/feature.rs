/*!
 * Feature operations.
 *
 * A [`FeatureOperation`] binds one feature to its attribute and runs every
 * transaction on it through the session controller. Connect and notify
 * transitions defer themselves to the operation queue when the gate is
 * busy or the transport fails; reads and writes wait for the gate and
 * return their result to the caller. Every failure is also published on
 * the session event stream.
 */
use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, Weak};

use async_trait::async_trait;
use thingy_codec::{Command, Reading};
use thingy_core::error::{Error, Result};
use thingy_core::logging::{feature_span, operation_span};
use thingy_core::types::{FeatureId, MethodKind};
use thingy_core::utils::poll_until;
use tracing::{debug, trace, warn, Instrument};

use crate::catalog::FeatureDescriptor;
use crate::controller::Controller;
use crate::event::SessionEvent;
use crate::queue::{QueuedOperation, Retry};
use crate::transport::{
    AttributeHandle, CallbackSlot, NotificationCallback, SessionHandle, Transport,
};

/// How a connect or notify transition ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// The transition took effect
    Done,
    /// The transition was queued and will be retried
    Deferred,
}

impl Completion {
    /// Whether the transition took effect
    pub fn is_done(&self) -> bool {
        matches!(self, Completion::Done)
    }
}

/// A resource that only makes sense while notifications flow, such as an
/// audio sink fed by the microphone
pub trait DependentResource: Send + Sync + Debug {
    /// Release whatever the resource holds; called when notifications stop
    /// or the session goes away
    fn suspend(&self);
}

/// Snapshot of a feature's attribute binding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BindingState {
    /// The attribute is resolved
    pub connected: bool,
    /// Notifications are enabled
    pub subscribed: bool,
    /// A notification handler has been registered
    pub has_handler: bool,
}

#[derive(Debug, Default)]
struct Binding {
    handle: Option<AttributeHandle>,
    subscribed: bool,
    handler: Option<CallbackSlot<NotificationCallback>>,
}

/// Operations of one feature within a session
#[derive(Debug)]
pub struct FeatureOperation {
    descriptor: FeatureDescriptor,
    transport: Arc<dyn Transport>,
    session: SessionHandle,
    controller: Arc<Controller>,
    binding: Mutex<Binding>,
    resource: Mutex<Option<Arc<dyn DependentResource>>>,
    this: Weak<FeatureOperation>,
}

impl FeatureOperation {
    pub(crate) fn new(
        descriptor: FeatureDescriptor,
        transport: Arc<dyn Transport>,
        session: SessionHandle,
        controller: Arc<Controller>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            descriptor,
            transport,
            session,
            controller,
            binding: Mutex::new(Binding::default()),
            resource: Mutex::new(None),
            this: this.clone(),
        })
    }

    /// The feature
    pub fn feature(&self) -> FeatureId {
        self.descriptor.feature
    }

    /// Where the feature lives and how it converts payloads
    pub fn descriptor(&self) -> &FeatureDescriptor {
        &self.descriptor
    }

    fn lock_binding(&self) -> Result<MutexGuard<'_, Binding>> {
        self.binding
            .lock()
            .map_err(|_| Error::other("Failed to acquire binding lock"))
    }

    /// Current binding state
    pub fn state(&self) -> BindingState {
        self.lock_binding()
            .map(|binding| BindingState {
                connected: binding.handle.is_some(),
                subscribed: binding.subscribed,
                has_handler: binding.handler.is_some(),
            })
            .unwrap_or_default()
    }

    /// Whether the attribute is resolved
    pub fn is_connected(&self) -> bool {
        self.state().connected
    }

    /// Whether notifications are enabled
    pub fn is_subscribed(&self) -> bool {
        self.state().subscribed
    }

    /// Attach a resource suspended whenever notifications stop
    pub fn attach_resource(&self, resource: Arc<dyn DependentResource>) {
        if let Ok(mut slot) = self.resource.lock() {
            *slot = Some(resource);
        }
    }

    fn suspend_resource(&self) {
        let resource = self.resource.lock().ok().and_then(|slot| slot.clone());
        if let Some(resource) = resource {
            debug!(feature = %self.feature(), "Suspending dependent resource");
            resource.suspend();
        }
    }

    fn handle(&self) -> Option<AttributeHandle> {
        self.lock_binding().ok().and_then(|binding| binding.handle.clone())
    }

    fn ensure_session(&self) -> Result<()> {
        if self.controller.is_connected() {
            Ok(())
        } else {
            Err(Error::not_connected(format!(
                "{} cannot run: the session is disconnected",
                self.feature()
            )))
        }
    }

    /// Report `error` on the event stream and hand it back
    fn fail(&self, error: Error) -> Error {
        warn!(feature = %self.feature(), "{}", error);
        self.controller.report(Some(self.feature()), error.clone());
        error
    }

    fn closed_while(&self, doing: &str) -> Error {
        Error::not_connected(format!(
            "{}: the session was closed while {}",
            self.feature(),
            doing
        ))
    }

    fn defer(&self, method: MethodKind) {
        if let Some(this) = self.this.upgrade() {
            self.controller
                .enqueue(QueuedOperation::new(self.feature(), method, this));
        }
    }

    /// Resolve the attribute.
    ///
    /// Runs only if the gate is free; otherwise, or if the transport fails,
    /// the connect is queued and `Deferred` is returned.
    pub async fn connect(&self) -> Result<Completion> {
        let span = operation_span(MethodKind::Connect, self.feature());
        async {
            self.ensure_session().map_err(|e| self.fail(e))?;
            self.resolve(true).await
        }
        .instrument(span)
        .await
    }

    /// Resolve the attribute if the gate is free.
    ///
    /// With `requeue` a busy gate or a failed resolve queues a `Connect`;
    /// without it the caller owns the single deferral.
    async fn resolve(&self, requeue: bool) -> Result<Completion> {
        if self.is_connected() {
            return Ok(Completion::Done);
        }
        let Some(guard) = self.controller.try_acquire_gate() else {
            debug!("Gate busy, deferring connect");
            if requeue {
                self.defer(MethodKind::Connect);
            }
            return Ok(Completion::Deferred);
        };

        self.controller
            .record_executed(self.feature(), MethodKind::Connect);
        let resolved = self
            .transport
            .resolve_attribute(&self.session, self.descriptor.service, self.descriptor.attribute)
            .await;

        match resolved {
            Ok(handle) => {
                // Teardown flips the session before clearing bindings
                let live = {
                    let mut binding = self.lock_binding()?;
                    let live = self.controller.is_connected();
                    if live {
                        binding.handle = Some(handle);
                        binding.subscribed = false;
                        binding.handler = None;
                    }
                    live
                };
                drop(guard);
                if !live {
                    return Err(self.closed_while("resolving its attribute"));
                }
                debug!("Attribute resolved");
                Ok(Completion::Done)
            }
            Err(_) if !self.controller.is_connected() => {
                drop(guard);
                Err(self.closed_while("resolving its attribute"))
            }
            Err(e) => {
                drop(guard);
                warn!("Failed to resolve attribute: {}", e);
                if requeue {
                    self.defer(MethodKind::Connect);
                }
                self.controller.report(Some(self.feature()), e);
                Ok(Completion::Deferred)
            }
        }
    }

    /// The resolved attribute, connecting first if needed
    async fn attribute(&self) -> Result<AttributeHandle> {
        self.ensure_session()?;
        if let Some(handle) = self.handle() {
            return Ok(handle);
        }
        self.resolve(true).await?;

        let config = self.controller.config();
        poll_until(config.poll_interval(), config.poll_attempts, || {
            if !self.controller.is_connected() {
                return Some(Err(self.closed_while("connecting")));
            }
            self.handle().map(Ok)
        })
        .await
        .map_err(|_| {
            Error::timeout(format!(
                "{} did not connect in time: high operational traffic",
                self.feature()
            ))
        })?
    }

    async fn read_bytes(&self) -> Result<Vec<u8>> {
        let handle = self.attribute().await?;
        if !handle.properties.read {
            return Err(Error::unsupported(format!(
                "{} does not support reads",
                self.feature()
            )));
        }

        let guard = self.controller.acquire_gate().await?;
        self.controller.record_executed(self.feature(), MethodKind::Read);
        let raw = self.transport.read(&handle).await;
        drop(guard);

        let raw = raw?;
        trace!(len = raw.len(), "Read attribute");
        Ok(raw)
    }

    /// Read and decode the current value
    pub async fn read(&self) -> Result<Reading> {
        let span = operation_span(MethodKind::Read, self.feature());
        async {
            if !self.descriptor.codec.has_decoder() {
                return Err(Error::unsupported(format!(
                    "{} has no decoder",
                    self.feature()
                )));
            }
            let raw = self.read_bytes().await?;
            self.descriptor.codec.decode(&raw)
        }
        .instrument(span)
        .await
        .map_err(|e| self.fail(e))
    }

    /// Read the current payload without decoding it
    pub async fn read_raw(&self) -> Result<Vec<u8>> {
        self.read_bytes()
            .instrument(operation_span(MethodKind::Read, self.feature()))
            .await
            .map_err(|e| self.fail(e))
    }

    /// Encode and write `command`.
    ///
    /// Registers holding several fields are read first so that fields the
    /// command leaves out keep their current value.
    pub async fn write(&self, command: impl Into<Command>) -> Result<()> {
        let command = command.into();
        self.write_command(&command)
            .instrument(operation_span(MethodKind::Write, self.feature()))
            .await
            .map_err(|e| self.fail(e))?;

        self.controller.publish(SessionEvent::WriteOk {
            feature: self.feature(),
            value: command,
        });
        Ok(())
    }

    async fn write_command(&self, command: &Command) -> Result<()> {
        let codec = &self.descriptor.codec;
        if !codec.has_encoder() {
            return Err(Error::unsupported(format!(
                "{} has no encoder",
                self.feature()
            )));
        }
        codec.validate(command)?;

        let handle = self.attribute().await?;
        if !handle.properties.writable() {
            return Err(Error::unsupported(format!(
                "{} does not support writes",
                self.feature()
            )));
        }

        let current = if codec.requires_current() {
            Some(self.read_bytes().await?)
        } else {
            None
        };
        let bytes = codec.encode(command, current.as_deref())?;

        let guard = self.controller.acquire_gate().await?;
        self.controller.record_executed(self.feature(), MethodKind::Write);
        let written = self
            .transport
            .write(&handle, &bytes, handle.properties.write)
            .await;
        drop(guard);

        written?;
        debug!(len = bytes.len(), "Wrote attribute");
        Ok(())
    }

    /// Enable change notifications
    pub async fn start(&self) -> Result<Completion> {
        self.set_notifications(true)
            .instrument(operation_span(MethodKind::StartNotify, self.feature()))
            .await
            .map_err(|e| self.fail(e))
    }

    /// Disable change notifications
    pub async fn stop(&self) -> Result<Completion> {
        self.set_notifications(false)
            .instrument(operation_span(MethodKind::StopNotify, self.feature()))
            .await
            .map_err(|e| self.fail(e))
    }

    async fn set_notifications(&self, enable: bool) -> Result<Completion> {
        let method = if enable {
            MethodKind::StartNotify
        } else {
            MethodKind::StopNotify
        };
        self.ensure_session()?;
        if !self.descriptor.codec.has_decoder() {
            return Err(Error::unsupported(format!(
                "{} has no decoder for notifications",
                self.feature()
            )));
        }

        let handle = match self.handle() {
            Some(handle) => handle,
            None => {
                let connected = self.resolve(false).await?;
                match (connected, self.handle()) {
                    (Completion::Done, Some(handle)) => handle,
                    _ => {
                        self.defer(method);
                        return Ok(Completion::Deferred);
                    }
                }
            }
        };
        if !handle.properties.notify {
            return Err(Error::unsupported(format!(
                "{} does not support notifications",
                self.feature()
            )));
        }
        if self.is_subscribed() == enable {
            return Ok(Completion::Done);
        }

        let Some(guard) = self.controller.try_acquire_gate() else {
            debug!("Gate busy, deferring {}", method);
            self.defer(method);
            return Ok(Completion::Deferred);
        };
        self.controller.record_executed(self.feature(), method);

        let outcome = if enable {
            let handler = self.handler()?;
            self.transport.subscribe(&handle, handler).await
        } else {
            self.transport.unsubscribe(&handle).await
        };

        match outcome {
            Ok(()) => {
                let live = {
                    let mut binding = self.lock_binding()?;
                    let live = self.controller.is_connected();
                    if live {
                        binding.subscribed = enable;
                    }
                    live
                };
                drop(guard);
                if !live {
                    return Err(self.closed_while("changing notifications"));
                }
                if !enable {
                    self.suspend_resource();
                }
                debug!("Notifications {}", if enable { "enabled" } else { "disabled" });
                Ok(Completion::Done)
            }
            Err(_) if !self.controller.is_connected() => {
                drop(guard);
                Err(self.closed_while("changing notifications"))
            }
            Err(e) => {
                drop(guard);
                warn!("Failed to change notifications: {}", e);
                self.defer(method);
                self.controller.report(Some(self.feature()), e);
                Ok(Completion::Deferred)
            }
        }
    }

    /// The notification handler, created once per resolved attribute
    fn handler(&self) -> Result<NotificationCallback> {
        let mut binding = self.lock_binding()?;
        if let Some(CallbackSlot(handler)) = &binding.handler {
            return Ok(Arc::clone(handler));
        }

        let this = self.this.clone();
        let handler: NotificationCallback = Arc::new(move |payload: &[u8]| {
            if let Some(feature) = this.upgrade() {
                feature.on_notification(payload);
            }
        });
        binding.handler = Some(CallbackSlot(Arc::clone(&handler)));
        Ok(handler)
    }

    fn on_notification(&self, payload: &[u8]) {
        let _span = feature_span(self.feature()).entered();
        trace!(feature = %self.feature(), len = payload.len(), "Notification");
        match self.descriptor.codec.decode(payload) {
            Ok(value) => self.controller.publish(SessionEvent::Reading {
                feature: self.feature(),
                value,
            }),
            Err(e) => {
                self.fail(e);
            }
        }
    }

    /// Forget the binding after the session went away
    pub(crate) fn reset(&self) {
        if let Ok(mut binding) = self.lock_binding() {
            *binding = Binding::default();
        }
        self.suspend_resource();
    }
}

#[async_trait]
impl Retry for FeatureOperation {
    async fn retry(&self, method: MethodKind) -> bool {
        let outcome = match method {
            MethodKind::Connect => self.connect().await,
            MethodKind::StartNotify => self.start().await,
            MethodKind::StopNotify => self.stop().await,
            MethodKind::Read | MethodKind::Write => {
                debug!(feature = %self.feature(), "{} is never queued", method);
                return false;
            }
        };
        matches!(outcome, Ok(Completion::Done))
    }
}
