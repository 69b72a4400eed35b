use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Per-request timing and policy.
///
/// Every timeout is optional; `None` waits indefinitely.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RequestConfig {
    /// Longest wait for a connection lease.
    pub connection_request_timeout: Option<Duration>,
    /// Longest wait for a socket to open.
    pub connect_timeout: Option<Duration>,
    /// Read timeout applied to the connection before each exchange.
    pub socket_timeout: Option<Duration>,
    /// Close and reopen pooled connections the peer has dropped.
    pub stale_connection_check: bool,
    /// Answer 401/407 challenges.
    pub authentication_enabled: bool,
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            connection_request_timeout: None,
            connect_timeout: None,
            socket_timeout: None,
            stale_connection_check: true,
            authentication_enabled: true,
        }
    }
}

impl RequestConfig {
    pub fn with_connection_request_timeout(mut self, timeout: Duration) -> Self {
        self.connection_request_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_socket_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    pub fn with_stale_connection_check(mut self, enabled: bool) -> Self {
        self.stale_connection_check = enabled;
        self
    }

    pub fn with_authentication(mut self, enabled: bool) -> Self {
        self.authentication_enabled = enabled;
        self
    }
}
