//! Live stream relay core
//!
//! One publisher pushes bytes in; any number of listeners get them out.
//!
//! ```text
//!   publisher ──► PublisherSession::push()
//!                        │
//!                        ▼
//!                  Broadcaster::publish()
//!                   │              │
//!                   ▼              ▼
//!           HistoryBuffer    SubscriberRegistry
//!           (catch-up tail)   try_send ─► [queue] ─► Subscription ─► listener
//!                                      ─► [queue] ─► Subscription ─► listener
//! ```
//!
//! Lifecycles are tied to guards: a [`PublisherSlot`] gives the exclusivity
//! flag back when dropped, a [`PublisherSession`] ends the session when
//! dropped, and a [`Subscription`] unregisters its listener when dropped.
//! Connection loss anywhere therefore cleans up the same way as a normal
//! exit.

pub mod broadcaster;
pub mod history;
pub mod registry;
pub mod session;
pub mod signal;

pub use broadcaster::{BroadcastStats, Broadcaster};
pub use history::HistoryBuffer;
pub use registry::{FanOut, Subscriber, SubscriberId, SubscriberRegistry};
pub use session::{SessionController, SessionHandle, SessionInfo};
pub use signal::Signal;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;

use crate::config::RelayConfig;
use crate::error::RelayError;

/// The relay: session control plus fan-out
pub struct Relay {
    config: RelayConfig,
    session: SessionController,
    broadcaster: Broadcaster,
}

impl Relay {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            session: SessionController::new(),
            broadcaster: Broadcaster::new(config.history_capacity),
            config,
        }
    }

    pub fn session(&self) -> &SessionController {
        &self.session
    }

    pub fn broadcaster(&self) -> &Broadcaster {
        &self.broadcaster
    }

    /// Claim exclusive publisher access
    pub fn try_admit_publisher(self: &Arc<Self>) -> Result<PublisherSlot, RelayError> {
        self.session.try_admit_publisher()?;
        Ok(PublisherSlot {
            relay: Arc::clone(self),
            armed: true,
        })
    }

    /// Offer a chunk to history and every listener
    pub fn publish(&self, chunk: Bytes) -> FanOut {
        self.broadcaster.publish(chunk)
    }

    fn begin_session(&self, publisher: &str) -> SessionHandle {
        let handle = self.session.begin_session(publisher);
        self.broadcaster.reset_history();
        handle
    }

    /// Tear down the current session
    ///
    /// Wakes every listener of the session, ends their streams, drops the
    /// catch-up data, arms the next session and finally frees the publisher
    /// slot so a new publisher always finds a clean relay.
    fn end_session(&self) {
        let ended = self.session.end_session();
        let listeners = self.broadcaster.registry().clear_all();
        self.broadcaster.reset_history();
        self.session.release_publisher();

        tracing::info!(session = ended, listeners, "Session ended");
    }

    /// Wait until the session a listener captured has data to relay
    ///
    /// Fails with [`RelayError::StreamEnded`] if the session is cancelled
    /// before any data arrives, either because its publisher left or because
    /// the handle was captured while Idle and a new publisher began, and with [`RelayError::NoActiveStream`] if
    /// no publisher is attached once the data arrived.
    pub async fn wait_for_stream(&self, session: &SessionHandle) -> Result<(), RelayError> {
        if !session.has_data() {
            tracing::debug!(session = session.number(), "Listener waiting for stream data");
            tokio::select! {
                _ = session.first_bytes() => {}
                _ = session.cancelled() => return Err(RelayError::StreamEnded),
            }
        }

        if !self.session.is_active() {
            return Err(RelayError::NoActiveStream);
        }
        Ok(())
    }

    /// Register a listener on `session`
    ///
    /// Returns the subscription and the catch-up data to send before any
    /// live chunk. Snapshot and registration happen under the registry lock,
    /// so the next published chunk is the first one queued for the listener.
    pub fn subscribe(
        self: &Arc<Self>,
        session: SessionHandle,
    ) -> Result<(Subscription, Bytes), RelayError> {
        let (subscriber, tx) = Subscriber::new(self.config.subscriber_queue);

        let (catchup, listeners) = {
            let mut subscribers = self.broadcaster.registry().lock();
            // Session end fires the token before it clears the registry, so
            // a registration that passes this check is always cleared later.
            if session.is_cancelled() {
                return Err(RelayError::StreamEnded);
            }
            let catchup = self.broadcaster.snapshot();
            let listeners = subscribers.register(subscriber.id(), tx);
            (catchup, listeners)
        };

        tracing::info!(
            subscriber = %subscriber.id(),
            session = session.number(),
            listeners,
            catchup_bytes = catchup.len(),
            "Listener joined"
        );

        Ok((
            Subscription {
                relay: Arc::clone(self),
                subscriber,
                session,
                finished: false,
            },
            catchup,
        ))
    }

    pub fn status(&self) -> RelayStatus {
        let info = self.session.info();
        let stats = self.broadcaster.stats();

        RelayStatus {
            active: info.active,
            session: info.number,
            publisher: info.publisher,
            started_at: info.started_at,
            subscribers: self.broadcaster.registry().len(),
            history_bytes: self.broadcaster.history_len(),
            history_capacity: self.broadcaster.history_capacity(),
            history_total_bytes: self.broadcaster.history_total_bytes(),
            history_evicted_bytes: self.broadcaster.history_evicted_bytes(),
            chunks_published: stats.chunks_published,
            bytes_published: stats.bytes_published,
            chunks_dropped: stats.chunks_dropped,
        }
    }
}

/// Relay state as reported by the status endpoint
#[derive(Debug, Clone, Serialize)]
pub struct RelayStatus {
    pub active: bool,
    pub session: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    pub subscribers: usize,
    pub history_bytes: usize,
    pub history_capacity: usize,
    /// Bytes appended to history during the current session
    pub history_total_bytes: u64,
    /// Bytes of the current session already pushed out of history
    pub history_evicted_bytes: u64,
    pub chunks_published: u64,
    pub bytes_published: u64,
    pub chunks_dropped: u64,
}

/// Exclusive publisher access that has not started streaming yet
///
/// Dropping it (e.g. after failed authentication) frees the slot without
/// touching session state.
pub struct PublisherSlot {
    relay: Arc<Relay>,
    armed: bool,
}

impl PublisherSlot {
    /// Start the session for an authenticated publisher
    pub fn begin(mut self, publisher: &str) -> PublisherSession {
        self.armed = false;
        let handle = self.relay.begin_session(publisher);

        PublisherSession {
            relay: Arc::clone(&self.relay),
            handle,
            publisher: publisher.to_string(),
            bytes_in: 0,
        }
    }
}

impl Drop for PublisherSlot {
    fn drop(&mut self) {
        if self.armed {
            self.relay.session.release_publisher();
        }
    }
}

/// A streaming publisher. Dropping it ends the session.
pub struct PublisherSession {
    relay: Arc<Relay>,
    handle: SessionHandle,
    publisher: String,
    bytes_in: u64,
}

impl PublisherSession {
    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    pub fn publisher(&self) -> &str {
        &self.publisher
    }

    /// Bytes received from the publisher so far
    pub fn bytes_in(&self) -> u64 {
        self.bytes_in
    }

    /// Relay inbound data, split into chunks of at most `ingest_chunk_size`
    pub fn push(&mut self, mut data: Bytes) {
        let max = self.relay.config.ingest_chunk_size;

        while !data.is_empty() {
            let chunk = data.split_to(data.len().min(max));

            if self.bytes_in == 0 {
                self.handle.signal_first_bytes();
                tracing::info!(
                    session = self.handle.number(),
                    publisher = %self.publisher,
                    "First stream data received, releasing listeners"
                );
            }

            self.bytes_in += chunk.len() as u64;
            self.relay.publish(chunk);
        }
    }
}

impl Drop for PublisherSession {
    fn drop(&mut self) {
        tracing::info!(
            session = self.handle.number(),
            publisher = %self.publisher,
            bytes = self.bytes_in,
            "Publisher disconnected"
        );
        self.relay.end_session();
    }
}

/// A registered listener. Dropping it unregisters the listener.
pub struct Subscription {
    relay: Arc<Relay>,
    subscriber: Subscriber,
    session: SessionHandle,
    finished: bool,
}

impl Subscription {
    /// Next live chunk, or `None` once the session is over
    pub async fn next_chunk(&mut self) -> Option<Bytes> {
        if self.finished {
            return None;
        }

        let chunk = tokio::select! {
            biased;
            chunk = self.subscriber.recv() => chunk,
            _ = self.session.cancelled() => None,
        };

        if chunk.is_none() {
            self.finished = true;
        }
        chunk
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.relay.broadcaster.registry().unregister(&self.subscriber.id());

        if self.finished {
            tracing::info!(subscriber = %self.subscriber.id(), "Listener stream ended with session");
        } else {
            tracing::info!(subscriber = %self.subscriber.id(), "Listener disconnected");
        }
    }
}
