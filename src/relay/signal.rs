//! One-shot, many-waiter notification
//!
//! A [`Signal`] starts unfired and can be fired exactly once. Any number of
//! tasks may wait on it; all of them wake when it fires, and waiting on an
//! already-fired signal returns immediately. It backs both the per-session
//! cancellation token and the "first bytes arrived" gate.

use tokio_util::sync::CancellationToken;

/// Cloneable handle to a one-shot notification
///
/// Clones share state: firing any clone fires them all.
#[derive(Clone, Debug, Default)]
pub struct Signal {
    token: CancellationToken,
}

impl Signal {
    /// Create a new, unfired signal
    pub fn new() -> Self {
        Self {
            token: CancellationToken::new(),
        }
    }

    /// Fire the signal. Repeated calls are no-ops.
    pub fn fire(&self) {
        self.token.cancel();
    }

    /// Whether the signal has fired
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Wait until the signal fires
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}
