/*!
 * Deferred operations and the log of executed transactions.
 *
 * An operation that cannot take the gate is parked as a [`QueuedOperation`]:
 * the feature and method it belongs to plus a [`Retry`] target that re-runs
 * it with its original arguments. The drain loop replays them in FIFO order.
 */
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use thingy_core::types::{FeatureId, MethodKind};

/// Something that can re-run a deferred method
#[async_trait]
pub trait Retry: Send + Sync {
    /// Re-run `method`; true when it completed
    async fn retry(&self, method: MethodKind) -> bool;
}

/// A deferred operation
pub struct QueuedOperation {
    /// Feature the operation belongs to
    pub feature: FeatureId,
    /// Method to re-run
    pub method: MethodKind,
    target: Arc<dyn Retry>,
}

impl QueuedOperation {
    /// Park `method` of `feature`, re-run through `target`
    pub fn new(feature: FeatureId, method: MethodKind, target: Arc<dyn Retry>) -> Self {
        Self {
            feature,
            method,
            target,
        }
    }

    /// Queue key
    pub fn key(&self) -> (FeatureId, MethodKind) {
        (self.feature, self.method)
    }

    /// Run the continuation
    pub async fn run(&self) -> bool {
        self.target.retry(self.method).await
    }
}

impl fmt::Debug for QueuedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedOperation")
            .field("feature", &self.feature)
            .field("method", &self.method)
            .finish()
    }
}

/// FIFO of deferred operations
#[derive(Debug, Default)]
pub(crate) struct OperationQueue {
    items: VecDeque<QueuedOperation>,
}

impl OperationQueue {
    pub(crate) fn push(&mut self, operation: QueuedOperation) {
        self.items.push_back(operation);
    }

    pub(crate) fn pop(&mut self) -> Option<QueuedOperation> {
        self.items.pop_front()
    }

    /// Drop every entry for `key`, returning how many went
    pub(crate) fn remove_matching(&mut self, key: (FeatureId, MethodKind)) -> usize {
        let before = self.items.len();
        self.items.retain(|operation| operation.key() != key);
        before - self.items.len()
    }

    pub(crate) fn keys(&self) -> Vec<(FeatureId, MethodKind)> {
        self.items.iter().map(QueuedOperation::key).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.items.clear();
    }
}

/// Transactions that actually ran, used to tell a stalled operation from
/// one that waits behind unrelated traffic
#[derive(Debug)]
pub(crate) struct ExecutedLog {
    recent: VecDeque<(FeatureId, MethodKind)>,
    capacity: usize,
    total: u64,
    per_key: HashMap<(FeatureId, MethodKind), u64>,
}

impl ExecutedLog {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            total: 0,
            per_key: HashMap::new(),
        }
    }

    pub(crate) fn record(&mut self, feature: FeatureId, method: MethodKind) {
        if self.recent.len() == self.capacity {
            self.recent.pop_front();
        }
        if self.capacity > 0 {
            self.recent.push_back((feature, method));
        }
        self.total += 1;
        *self.per_key.entry((feature, method)).or_insert(0) += 1;
    }

    /// Number of records so far
    pub(crate) fn total(&self) -> u64 {
        self.total
    }

    /// Number of records for `key` so far
    pub(crate) fn count(&self, key: (FeatureId, MethodKind)) -> u64 {
        self.per_key.get(&key).copied().unwrap_or(0)
    }

    pub(crate) fn recent(&self) -> Vec<(FeatureId, MethodKind)> {
        self.recent.iter().copied().collect()
    }

    pub(crate) fn clear(&mut self) {
        self.recent.clear();
        self.total = 0;
        self.per_key.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Noop;

    #[async_trait]
    impl Retry for Noop {
        async fn retry(&self, _method: MethodKind) -> bool {
            true
        }
    }

    fn op(feature: FeatureId, method: MethodKind) -> QueuedOperation {
        QueuedOperation::new(feature, method, Arc::new(Noop))
    }

    #[tokio::test]
    async fn test_fifo_and_remove_matching() {
        let mut queue = OperationQueue::default();
        queue.push(op(FeatureId::Led, MethodKind::Connect));
        queue.push(op(FeatureId::Gas, MethodKind::StartNotify));
        queue.push(op(FeatureId::Led, MethodKind::Connect));
        queue.push(op(FeatureId::Led, MethodKind::StartNotify));

        assert_eq!(queue.remove_matching((FeatureId::Led, MethodKind::Connect)), 2);
        assert_eq!(
            queue.keys(),
            vec![
                (FeatureId::Gas, MethodKind::StartNotify),
                (FeatureId::Led, MethodKind::StartNotify)
            ]
        );

        let first = queue.pop().unwrap();
        assert_eq!(first.feature, FeatureId::Gas);
        assert!(first.run().await);
        assert_eq!(queue.len(), 1);
    }

    #[test]
    fn test_executed_log_is_bounded() {
        let mut log = ExecutedLog::new(2);
        log.record(FeatureId::Led, MethodKind::Connect);
        log.record(FeatureId::Gas, MethodKind::Read);
        log.record(FeatureId::Led, MethodKind::Connect);

        assert_eq!(log.total(), 3);
        assert_eq!(log.count((FeatureId::Led, MethodKind::Connect)), 2);
        assert_eq!(
            log.recent(),
            vec![
                (FeatureId::Gas, MethodKind::Read),
                (FeatureId::Led, MethodKind::Connect)
            ]
        );

        log.clear();
        assert_eq!(log.total(), 0);
        assert!(log.recent().is_empty());
    }
}
