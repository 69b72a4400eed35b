use crate::base::neterror::{NetError, TransportKind};
use crate::socket::connection::{AffinityToken, ConnectionManager, Lease};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Owns a lease while a request (and possibly its response body) uses it.
///
/// The lease is handed back exactly once: released for reuse, released as
/// non-reusable, or aborted. Dropping an unreleased holder aborts.
pub struct ConnectionHolder {
    manager: Arc<dyn ConnectionManager>,
    lease: Option<Lease>,
    reusable: bool,
    valid_for: Option<Duration>,
}

impl ConnectionHolder {
    pub fn new(manager: Arc<dyn ConnectionManager>, lease: Lease) -> Self {
        Self { manager, lease: Some(lease), reusable: false, valid_for: None }
    }

    pub fn lease(&self) -> Option<&Lease> {
        self.lease.as_ref()
    }

    pub fn lease_mut(&mut self) -> Result<&mut Lease, NetError> {
        self.lease
            .as_mut()
            .ok_or_else(|| NetError::transport(TransportKind::ConnectionClosed, "connection already released"))
    }

    pub fn manager(&self) -> &Arc<dyn ConnectionManager> {
        &self.manager
    }

    pub fn is_released(&self) -> bool {
        self.lease.is_none()
    }

    pub fn is_reusable(&self) -> bool {
        self.reusable
    }

    pub fn mark_reusable(&mut self) {
        self.reusable = true;
    }

    pub fn mark_non_reusable(&mut self) {
        self.reusable = false;
    }

    pub fn set_valid_for(&mut self, valid_for: Option<Duration>) {
        self.valid_for = valid_for;
    }

    /// Affinity to store with the connection once it goes back to the pool.
    pub fn set_state(&mut self, state: Option<AffinityToken>) {
        if let Some(lease) = self.lease.as_mut() {
            lease.set_state(state);
        }
    }

    /// Hand the connection back, pooled if marked reusable, closed otherwise.
    pub fn release_connection(&mut self) {
        let Some(mut lease) = self.lease.take() else {
            return;
        };
        if self.reusable {
            tracing::debug!(lease = lease.id(), valid_for = ?self.valid_for, "releasing connection for reuse");
            self.manager.release(lease, true, self.valid_for);
        } else {
            tracing::debug!(lease = lease.id(), "releasing non-reusable connection");
            self.manager.close(&mut lease);
            self.manager.release(lease, false, None);
        }
    }

    /// Shut the connection down and hand it back as non-reusable.
    pub fn abort_connection(&mut self) {
        let Some(mut lease) = self.lease.take() else {
            return;
        };
        tracing::debug!(lease = lease.id(), "aborting connection");
        self.manager.close(&mut lease);
        self.manager.release(lease, false, None);
    }
}

impl Drop for ConnectionHolder {
    fn drop(&mut self) {
        self.abort_connection();
    }
}

impl fmt::Debug for ConnectionHolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHolder")
            .field("lease", &self.lease.as_ref().map(Lease::id))
            .field("reusable", &self.reusable)
            .field("valid_for", &self.valid_for)
            .finish()
    }
}
