//! Publisher session control
//!
//! Tracks whether a publisher is attached, and owns the per-session
//! cancellation signal and "first bytes arrived" gate. Listeners take a
//! [`SessionHandle`] snapshot when they connect and only ever wait on that
//! session's signals, so a later session can never wake them by mistake.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::signal::Signal;
use crate::error::RelayError;

/// Snapshot of one session's signals
#[derive(Clone, Debug)]
pub struct SessionHandle {
    number: u64,
    cancelled: Signal,
    first_bytes: Signal,
}

impl SessionHandle {
    fn new(number: u64) -> Self {
        Self {
            number,
            cancelled: Signal::new(),
            first_bytes: Signal::new(),
        }
    }

    /// Sequence number of the session this handle belongs to
    pub fn number(&self) -> u64 {
        self.number
    }

    /// Whether the session has ended
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.is_fired()
    }

    /// Wait until the session ends
    pub async fn cancelled(&self) {
        self.cancelled.fired().await;
    }

    /// Whether the publisher has sent any data yet
    pub fn has_data(&self) -> bool {
        self.first_bytes.is_fired()
    }

    /// Wait until the publisher sends its first bytes
    pub async fn first_bytes(&self) {
        self.first_bytes.fired().await;
    }

    /// Open the first-bytes gate. Only the first call has an effect.
    pub fn signal_first_bytes(&self) {
        self.first_bytes.fire();
    }

    fn cancel(&self) {
        self.cancelled.fire();
    }
}

/// Mutable session record guarded by the controller's lock
struct SessionState {
    handle: SessionHandle,
    publisher: Option<String>,
    started_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of the session for status reporting
#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub number: u64,
    pub active: bool,
    pub publisher: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
}

/// Process-wide publisher session controller
pub struct SessionController {
    /// Publisher exclusivity flag
    active: AtomicBool,
    state: Mutex<SessionState>,
}

impl SessionController {
    /// Create a controller in the Idle state with an armed session
    pub fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            state: Mutex::new(SessionState {
                handle: SessionHandle::new(1),
                publisher: None,
                started_at: None,
            }),
        }
    }

    /// Claim the publisher slot
    ///
    /// A single compare-and-set; fails with [`RelayError::AlreadyActive`]
    /// while another publisher holds the slot.
    pub fn try_admit_publisher(&self) -> Result<(), RelayError> {
        self.active
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(|_| RelayError::AlreadyActive)
    }

    /// Give the publisher slot back
    pub fn release_publisher(&self) {
        self.active.store(false, Ordering::Release);
    }

    /// Whether a publisher currently holds the slot
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Start streaming for an admitted, authenticated publisher
    ///
    /// Cancels whatever handle is current, so listeners that connected
    /// while Idle are turned away rather than carried into this session,
    /// and installs a fresh token and unfired gate.
    pub fn begin_session(&self, publisher: &str) -> SessionHandle {
        let mut state = self.state.lock();

        state.handle.cancel();
        let next = state.handle.number + 1;
        state.handle = SessionHandle::new(next);
        state.publisher = Some(publisher.to_string());
        state.started_at = Some(Utc::now());

        tracing::debug!(session = state.handle.number, publisher, "Session started");
        state.handle.clone()
    }

    /// Cancel the current session and arm a fresh one
    ///
    /// Does not release the publisher slot; the caller does that once the
    /// rest of the relay has been reset.
    pub fn end_session(&self) -> u64 {
        let mut state = self.state.lock();
        let ended = state.handle.number;

        state.handle.cancel();
        state.handle = SessionHandle::new(ended + 1);
        state.publisher = None;
        state.started_at = None;

        ended
    }

    /// Snapshot of the current session's signals
    pub fn current(&self) -> SessionHandle {
        self.state.lock().handle.clone()
    }

    pub fn info(&self) -> SessionInfo {
        let state = self.state.lock();
        SessionInfo {
            number: state.handle.number,
            active: self.is_active(),
            publisher: state.publisher.clone(),
            started_at: state.started_at,
        }
    }
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}
