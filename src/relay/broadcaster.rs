//! Chunk fan-out
//!
//! Every chunk the publisher sends is appended to the recent-history buffer
//! and then offered to each registered listener's queue with a non-blocking
//! send. A listener with a full queue misses that chunk; the publisher and
//! the other listeners never wait on it.
//!
//! Lock order is registry, then history. `publish` holds the registry lock
//! across append and fan-out, and subscription holds it across snapshot and
//! register, so each chunk reaches a new listener exactly once: either in its
//! catch-up snapshot or through its queue.

use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use super::history::HistoryBuffer;
use super::registry::{FanOut, SubscriberRegistry};

/// Lifetime publish counters
#[derive(Debug, Clone, Copy, Default)]
pub struct BroadcastStats {
    pub chunks_published: u64,
    pub bytes_published: u64,
    pub chunks_dropped: u64,
}

/// Owns the history buffer and the listener registry
pub struct Broadcaster {
    history: Mutex<HistoryBuffer>,
    registry: SubscriberRegistry,
    chunks_published: AtomicU64,
    bytes_published: AtomicU64,
    chunks_dropped: AtomicU64,
}

impl Broadcaster {
    /// Create a broadcaster keeping `history_capacity` bytes of catch-up data
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: Mutex::new(HistoryBuffer::new(history_capacity)),
            registry: SubscriberRegistry::new(),
            chunks_published: AtomicU64::new(0),
            bytes_published: AtomicU64::new(0),
            chunks_dropped: AtomicU64::new(0),
        }
    }

    pub fn registry(&self) -> &SubscriberRegistry {
        &self.registry
    }

    /// Append a chunk to history and offer it to every listener
    ///
    /// The registry lock is taken before the history append and held
    /// through the fan-out. Appending first and locking the registry
    /// afterwards would let a listener snapshot history and register in
    /// between, receiving the chunk twice or, with the opposite
    /// interleaving, not at all.
    pub fn publish(&self, chunk: Bytes) -> FanOut {
        let mut subscribers = self.registry.lock();
        self.history.lock().append(&chunk);
        let fan_out = subscribers.send_all(&chunk);
        drop(subscribers);

        self.chunks_published.fetch_add(1, Ordering::Relaxed);
        self.bytes_published.fetch_add(chunk.len() as u64, Ordering::Relaxed);
        if fan_out.dropped > 0 {
            self.chunks_dropped.fetch_add(fan_out.dropped as u64, Ordering::Relaxed);
        }

        fan_out
    }

    /// Copy of the catch-up data
    pub fn snapshot(&self) -> Bytes {
        self.history.lock().snapshot()
    }

    /// Empty the history for a new session
    pub fn reset_history(&self) {
        self.history.lock().clear();
    }

    pub fn history_len(&self) -> usize {
        self.history.lock().len()
    }

    pub fn history_capacity(&self) -> usize {
        self.history.lock().capacity()
    }

    /// Bytes appended to history since it was last reset
    pub fn history_total_bytes(&self) -> u64 {
        self.history.lock().total_appended()
    }

    /// Bytes evicted from history since it was last reset
    pub fn history_evicted_bytes(&self) -> u64 {
        self.history.lock().evicted()
    }

    pub fn stats(&self) -> BroadcastStats {
        BroadcastStats {
            chunks_published: self.chunks_published.load(Ordering::Relaxed),
            bytes_published: self.bytes_published.load(Ordering::Relaxed),
            chunks_dropped: self.chunks_dropped.load(Ordering::Relaxed),
        }
    }
}
