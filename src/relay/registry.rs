//! Subscriber registry
//!
//! The set of listeners currently receiving the live stream. Each entry owns
//! the sending half of that listener's bounded delivery queue; the egress
//! task serving the listener owns the receiving half.
//!
//! Membership only changes under the registry lock. Removing an entry and
//! ending a listener's stream are separate operations: [`SubscriberRegistry::unregister`]
//! is what a departing listener calls (any number of times), while
//! [`SubscriberRegistry::clear_all`] is the single place where every
//! remaining stream is closed at session end.

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use std::collections::HashMap;
use tokio::sync::mpsc::{self, error::TrySendError};
use uuid::Uuid;

/// Unique identifier of a connected listener
pub type SubscriberId = Uuid;

/// Receiving side of a listener's delivery queue
pub struct Subscriber {
    id: SubscriberId,
    rx: mpsc::Receiver<Bytes>,
}

impl Subscriber {
    /// Create a subscriber with a delivery queue of `capacity` chunks
    ///
    /// Returns the subscriber and the sender to register for it.
    pub fn new(capacity: usize) -> (Self, mpsc::Sender<Bytes>) {
        let (tx, rx) = mpsc::channel(capacity);
        let subscriber = Self {
            id: Uuid::new_v4(),
            rx,
        };
        (subscriber, tx)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued chunk, or `None` once the registry closed the queue
    pub async fn recv(&mut self) -> Option<Bytes> {
        self.rx.recv().await
    }
}

/// Registry slot for one listener
struct Slot {
    tx: mpsc::Sender<Bytes>,
    dropped: u64,
}

/// Outcome of distributing one chunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FanOut {
    pub delivered: usize,
    pub dropped: usize,
}

/// Listener set as seen while holding the registry lock
#[derive(Default)]
pub struct SubscriberSet {
    slots: HashMap<SubscriberId, Slot>,
}

impl SubscriberSet {
    /// Add a listener, returning the new listener count
    pub fn register(&mut self, id: SubscriberId, tx: mpsc::Sender<Bytes>) -> usize {
        self.slots.insert(id, Slot { tx, dropped: 0 });
        self.slots.len()
    }

    /// Remove a listener, returning how many chunks it missed
    pub fn remove(&mut self, id: &SubscriberId) -> Option<u64> {
        self.slots.remove(id).map(|slot| slot.dropped)
    }

    /// Offer a chunk to every listener without waiting on any of them
    ///
    /// A listener whose queue is full misses this chunk; nobody else is
    /// affected.
    pub fn send_all(&mut self, chunk: &Bytes) -> FanOut {
        let mut fan_out = FanOut::default();

        for (id, slot) in self.slots.iter_mut() {
            match slot.tx.try_send(chunk.clone()) {
                Ok(()) => fan_out.delivered += 1,
                Err(TrySendError::Full(_)) => {
                    slot.dropped += 1;
                    fan_out.dropped += 1;
                    if slot.dropped == 1 {
                        tracing::warn!(subscriber = %id, bytes = chunk.len(), "Listener falling behind, dropping chunks");
                    } else {
                        tracing::debug!(subscriber = %id, dropped = slot.dropped, "Dropped chunk for slow listener");
                    }
                }
                // Receiver is gone; its egress task is about to unregister.
                Err(TrySendError::Closed(_)) => {}
            }
        }

        fan_out
    }

    /// Close every delivery queue and empty the set
    pub fn close_all(&mut self) -> usize {
        let count = self.slots.len();
        // Dropping the senders ends each listener's stream once it drains.
        self.slots.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Concurrency-safe listener registry
#[derive(Default)]
pub struct SubscriberRegistry {
    inner: Mutex<SubscriberSet>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the registry lock
    ///
    /// Held by the broadcaster for one append-and-fan-out, and by
    /// subscription for one snapshot-and-register, so that no chunk falls
    /// between a listener's catch-up data and its live feed.
    pub fn lock(&self) -> MutexGuard<'_, SubscriberSet> {
        self.inner.lock()
    }

    /// Remove a listener. Removing an unknown id is a no-op.
    pub fn unregister(&self, id: &SubscriberId) {
        let (removed, count) = {
            let mut set = self.inner.lock();
            (set.remove(id), set.len())
        };

        if let Some(dropped) = removed {
            tracing::info!(subscriber = %id, listeners = count, dropped, "Unregistered listener");
        }
    }

    /// End every listener's stream and empty the registry
    pub fn clear_all(&self) -> usize {
        let count = self.inner.lock().close_all();
        tracing::info!(listeners = count, "Closed all listener streams");
        count
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }
}
