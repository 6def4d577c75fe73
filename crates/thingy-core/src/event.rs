/*!
 * Event bus for the Thingy driver.
 *
 * Each device session owns one bus carrying its own event type. Subscribers
 * receive every event published after they subscribed; a subscriber that
 * falls more than the channel capacity behind observes a lag error from
 * the receiver instead of blocking publishers.
 */
use std::fmt::Debug;
use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::trace;

/// Maximum number of events that can be buffered in a channel
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Receiving half of an event bus subscription
pub type EventReceiver<E> = broadcast::Receiver<E>;

/// Event bus for publishing and subscribing to events of type `E`
#[derive(Debug)]
pub struct EventBus<E: Clone + Debug + Send + 'static> {
    sender: broadcast::Sender<E>,
    channel_capacity: usize,
}

impl<E: Clone + Debug + Send + 'static> EventBus<E> {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            channel_capacity: capacity.max(1),
        }
    }

    /// Publish an event, returning the number of subscribers it reached.
    ///
    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(n) => {
                trace!("Published event to {} receivers", n);
                n
            }
            Err(broadcast::error::SendError(event)) => {
                trace!("No receivers for event {:?}", event);
                0
            }
        }
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> EventReceiver<E> {
        self.sender.subscribe()
    }

    /// Number of live subscribers
    pub fn receiver_count(&self) -> usize {
        self.sender.receiver_count()
    }

    /// Configured capacity of the channel
    pub fn capacity(&self) -> usize {
        self.channel_capacity
    }
}

impl<E: Clone + Debug + Send + 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// A shared event bus that can be cloned
#[derive(Debug)]
pub struct SharedEventBus<E: Clone + Debug + Send + 'static>(Arc<EventBus<E>>);

impl<E: Clone + Debug + Send + 'static> SharedEventBus<E> {
    /// Create a new shared event bus with a specific channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        Self(Arc::new(EventBus::with_capacity(capacity)))
    }

    /// Get a reference to the event bus
    pub fn get(&self) -> &EventBus<E> {
        &self.0
    }

    /// Publish an event
    pub fn publish(&self, event: E) -> usize {
        self.0.publish(event)
    }

    /// Subscribe to future events
    pub fn subscribe(&self) -> EventReceiver<E> {
        self.0.subscribe()
    }
}

impl<E: Clone + Debug + Send + 'static> Clone for SharedEventBus<E> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<E: Clone + Debug + Send + 'static> Default for SharedEventBus<E> {
    fn default() -> Self {
        Self(Arc::new(EventBus::new()))
    }
}
