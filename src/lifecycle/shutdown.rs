//! Shutdown coordination for one serving generation.

use std::time::Duration;

use axum_server::Handle;

/// Default time in-flight requests get to finish after a stop.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_secs(3);

/// Graceful-shutdown trigger bound to one serving generation.
///
/// Triggering stops the accept loop immediately; open connections get the
/// grace period to finish before they are closed.
#[derive(Debug, Clone)]
pub struct Shutdown {
    handle: Handle,
    grace: Duration,
}

impl Shutdown {
    pub fn new(grace: Duration) -> Self {
        Self {
            handle: Handle::new(),
            grace,
        }
    }

    /// Handle to attach to the serving engine.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    /// Stop accepting and start draining.
    pub fn trigger(&self) {
        tracing::debug!(
            grace_ms = self.grace.as_millis() as u64,
            in_flight = self.handle.connection_count(),
            "Graceful shutdown triggered"
        );
        self.handle.graceful_shutdown(Some(self.grace));
    }

    /// Connections still open in this generation.
    pub fn connection_count(&self) -> usize {
        self.handle.connection_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new(DEFAULT_GRACE_PERIOD)
    }
}
