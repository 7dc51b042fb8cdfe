//! Broadcast-once termination signal.
//!
//! One signal instance is created at startup, cloned into every controller
//! and watcher task, and fired exactly once when the process is asked to
//! shut down. Firing is idempotent; every listener that observes the
//! signal before or after the fire sees the same fired state.

use tokio_util::sync::CancellationToken;

/// Cooperative stop notification shared by all controllers.
#[derive(Debug, Clone, Default)]
pub struct TerminationSignal {
    token: CancellationToken,
}

impl TerminationSignal {
    /// Creates an unfired signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires the signal. Safe to call more than once; only the first call
    /// transitions the state.
    pub fn fire(&self) {
        self.token.cancel();
    }

    /// True once the signal has fired.
    pub fn is_fired(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the signal has fired. Resolves immediately if it
    /// already has; never blocks a listener after the fire.
    pub async fn fired(&self) {
        self.token.cancelled().await;
    }
}
