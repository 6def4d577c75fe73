/*!
 * Session-wide coordination: the transaction gate, the operation queue and
 * the drain loop.
 *
 * Releasing the gate wakes the drain loop. The loop replays deferred
 * operations in FIFO order and gives up on an operation once it has failed
 * too often, or keeps failing while nothing else makes progress.
 */
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use thingy_core::config::QueueConfig;
use thingy_core::error::{Error, Result};
use thingy_core::event::SharedEventBus;
use thingy_core::log_with_fields;
use thingy_core::types::{FeatureId, Id, MethodKind};
use thingy_core::utils::{poll_until, spawn_and_log};
use tokio::runtime::Handle;
use tokio::sync::OwnedSemaphorePermit;
use tracing::{debug, info, trace, warn, Level};

use crate::event::SessionEvent;
use crate::gate::Gate;
use crate::queue::{ExecutedLog, OperationQueue, QueuedOperation};

/// Holding this means owning the gate; dropping it releases the gate and
/// wakes the drain loop
#[derive(Debug)]
pub(crate) struct GateGuard {
    permit: Option<OwnedSemaphorePermit>,
    controller: Arc<Controller>,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        if let Some(permit) = self.permit.take() {
            drop(permit);
            self.controller.gate_released();
        }
    }
}

/// Attempt bookkeeping of one (feature, method) pair within a drain pass
#[derive(Debug, Default, Clone, Copy)]
struct Attempts {
    tried: u32,
    total_at_last: u64,
    own_at_last: u64,
}

/// Coordinates every transaction of one session
#[derive(Debug)]
pub struct Controller {
    session_id: Id,
    config: QueueConfig,
    gate: Gate,
    queue: Mutex<OperationQueue>,
    executed: Mutex<ExecutedLog>,
    connected: AtomicBool,
    draining: AtomicBool,
    events: SharedEventBus<SessionEvent>,
    runtime: Handle,
}

impl Controller {
    /// Create the controller of a session; must run inside a tokio runtime
    pub(crate) fn new(
        session_id: Id,
        config: QueueConfig,
        events: SharedEventBus<SessionEvent>,
    ) -> Result<Arc<Self>> {
        let runtime = Handle::try_current()
            .map_err(|e| Error::runtime(format!("No tokio runtime available: {}", e)))?;
        let executed = ExecutedLog::new(config.executed_log_capacity);

        Ok(Arc::new(Self {
            session_id,
            config,
            gate: Gate::new(),
            queue: Mutex::new(OperationQueue::default()),
            executed: Mutex::new(executed),
            connected: AtomicBool::new(false),
            draining: AtomicBool::new(false),
            events,
            runtime,
        }))
    }

    fn lock_queue(&self) -> Result<MutexGuard<'_, OperationQueue>> {
        self.queue
            .lock()
            .map_err(|_| Error::other("Failed to acquire operation queue lock"))
    }

    fn lock_executed(&self) -> Result<MutexGuard<'_, ExecutedLog>> {
        self.executed
            .lock()
            .map_err(|_| Error::other("Failed to acquire executed log lock"))
    }

    /// Id of the owning session
    pub fn session_id(&self) -> &Id {
        &self.session_id
    }

    /// Queue settings
    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Whether the session is connected
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub(crate) fn mark_connected(&self) {
        self.connected.store(true, Ordering::SeqCst);
    }

    /// Whether no transaction is in flight
    pub fn gate_available(&self) -> bool {
        self.gate.is_available()
    }

    /// Whether the drain loop is running
    pub fn is_draining(&self) -> bool {
        self.draining.load(Ordering::SeqCst)
    }

    /// Keys of the deferred operations, oldest first
    pub fn queued(&self) -> Vec<(FeatureId, MethodKind)> {
        self.lock_queue().map(|queue| queue.keys()).unwrap_or_default()
    }

    /// Transactions run during the current drain pass, oldest first
    pub fn recent_transactions(&self) -> Vec<(FeatureId, MethodKind)> {
        self.lock_executed()
            .map(|executed| executed.recent())
            .unwrap_or_default()
    }

    /// Publish on the session event stream
    pub(crate) fn publish(&self, event: SessionEvent) {
        trace!(session = %self.session_id, ?event, "Publishing event");
        self.events.publish(event);
    }

    /// Report a failure on the event stream
    pub(crate) fn report(&self, feature: Option<FeatureId>, error: Error) {
        self.publish(SessionEvent::Error { feature, error });
    }

    /// Take the gate if it is free
    pub(crate) fn try_acquire_gate(self: &Arc<Self>) -> Option<GateGuard> {
        self.gate.try_acquire().map(|permit| GateGuard {
            permit: Some(permit),
            controller: Arc::clone(self),
        })
    }

    /// Wait for the gate, at most the poll ceiling
    pub(crate) async fn acquire_gate(self: &Arc<Self>) -> Result<GateGuard> {
        let permit = self.gate.acquire_within(self.config.poll_ceiling()).await?;
        let guard = GateGuard {
            permit: Some(permit),
            controller: Arc::clone(self),
        };
        if !self.is_connected() {
            return Err(Error::not_connected("the session is disconnected"));
        }
        Ok(guard)
    }

    /// Note a transaction that actually ran
    pub(crate) fn record_executed(&self, feature: FeatureId, method: MethodKind) {
        match self.lock_executed() {
            Ok(mut executed) => executed.record(feature, method),
            Err(e) => warn!("Dropping executed record: {}", e),
        }
    }

    /// Park an operation and try to drain
    pub(crate) fn enqueue(self: &Arc<Self>, operation: QueuedOperation) {
        let (feature, method) = operation.key();
        if !self.is_connected() {
            debug!(%feature, %method, "Session closed, not queueing");
            return;
        }
        match self.lock_queue() {
            Ok(mut queue) => queue.push(operation),
            Err(e) => {
                self.report(Some(feature), e);
                return;
            }
        }
        log_with_fields!(
            Level::DEBUG,
            "Operation queued",
            session = %self.session_id,
            %feature,
            %method
        );
        self.publish(SessionEvent::OperationQueued { feature, method });
        self.trigger_drain();
    }

    fn gate_released(self: &Arc<Self>) {
        if self.is_connected() {
            self.publish(SessionEvent::GattAvailable);
            self.trigger_drain();
        }
    }

    fn should_drain(&self) -> bool {
        self.is_connected()
            && self.gate.is_available()
            && self.lock_queue().map(|queue| !queue.is_empty()).unwrap_or(false)
    }

    /// Start the drain loop unless it is running or has nothing to do
    pub(crate) fn trigger_drain(self: &Arc<Self>) {
        if !self.should_drain() {
            return;
        }
        if self
            .draining
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        spawn_and_log(&self.runtime, "drain", Arc::clone(self).drain());
    }

    async fn drain(self: Arc<Self>) -> Result<()> {
        loop {
            let result = self.drain_pass().await;
            self.draining.store(false, Ordering::SeqCst);
            if let Err(e) = result {
                self.report(None, e.clone());
                return Err(e);
            }

            // A trigger may have been ignored between the last check and the
            // guard being cleared.
            if !self.should_drain()
                || self
                    .draining
                    .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                return Ok(());
            }
        }
    }

    async fn drain_pass(&self) -> Result<()> {
        self.lock_executed()?.clear();
        let mut attempts: HashMap<(FeatureId, MethodKind), Attempts> = HashMap::new();

        while self.is_connected() {
            if !self.gate.is_available() {
                let interval = self.config.poll_interval();
                let ready = poll_until(interval, self.config.poll_attempts, || {
                    (self.gate.is_available() || !self.is_connected()).then_some(())
                })
                .await;
                if ready.is_err() || !self.is_connected() {
                    // The next release triggers a fresh pass.
                    break;
                }
            }

            let Some(operation) = self.lock_queue()?.pop() else {
                break;
            };
            let key = operation.key();
            let (total, own) = {
                let executed = self.lock_executed()?;
                (executed.total(), executed.count(key))
            };

            let entry = attempts.entry(key).or_default();
            let progress = (entry.tried > 0).then(|| {
                total
                    .saturating_sub(entry.total_at_last)
                    .saturating_sub(own.saturating_sub(entry.own_at_last))
            });
            entry.tried += 1;
            entry.total_at_last = total;
            entry.own_at_last = own;
            let tried = entry.tried;

            debug!(
                session = %self.session_id,
                feature = %key.0,
                method = %key.1,
                attempt = tried,
                "Draining operation"
            );

            if operation.run().await {
                continue;
            }

            let stalled = tried >= self.config.stall_min_attempts
                && progress.map_or(false, |other| other < self.config.stall_min_progress);
            if tried >= self.config.max_attempts || stalled {
                self.discard(key)?;
            }
        }

        Ok(())
    }

    /// Drop every queued entry for `key`. Notify transitions waiting on a
    /// discarded `Connect` of the same feature go with it.
    fn discard(&self, key: (FeatureId, MethodKind)) -> Result<()> {
        let (feature, method) = key;
        let mut discarded = vec![(key, 0)];
        {
            let mut queue = self.lock_queue()?;
            discarded[0].1 = queue.remove_matching(key);
            if method == MethodKind::Connect {
                for dependent in [MethodKind::StartNotify, MethodKind::StopNotify] {
                    let removed = queue.remove_matching((feature, dependent));
                    if removed > 0 {
                        discarded.push(((feature, dependent), removed));
                    }
                }
            }
        }

        for ((feature, method), removed) in discarded {
            warn!(
                session = %self.session_id,
                %feature,
                %method,
                removed,
                "Discarding operation that keeps failing"
            );
            self.publish(SessionEvent::OperationDiscarded { feature, method });
        }
        Ok(())
    }

    /// Stop accepting work: drop the queue and start over with a free gate.
    ///
    /// Returns false when the session was already torn down.
    pub(crate) fn teardown(&self) -> bool {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return false;
        }
        if let Ok(mut queue) = self.lock_queue() {
            let dropped = queue.len();
            queue.clear();
            if dropped > 0 {
                info!(session = %self.session_id, dropped, "Dropped queued operations");
            }
        }
        if let Ok(mut executed) = self.lock_executed() {
            executed.clear();
        }
        self.gate.reset();
        true
    }
}
