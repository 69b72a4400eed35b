//! Managed connections and the manager seam the execution chain leases from.

use crate::base::neterror::NetError;
use crate::route::host::HttpHost;
use crate::route::plan::Route;
use futures::future::BoxFuture;
use std::fmt;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Byte stream of an open connection, handed to the wire codec.
pub trait ConnectionIo: AsyncRead + AsyncWrite + Unpin + Send + Sync {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + Sync> ConnectionIo for T {}

/// Opaque token tying a pooled connection to the principal that used it.
///
/// Connections carrying a token are only handed out to requests presenting
/// the same token (or to requests with none, when nothing else is free).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AffinityToken(String);

impl AffinityToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AffinityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A physical connection as seen by the execution chain.
///
/// Implementations own the socket and any TLS layering on it.
pub trait ManagedConnection: Send + Sync + fmt::Debug {
    /// Open a socket to `host`, the first hop of the route.
    fn open<'a>(
        &'a mut self,
        host: &'a HttpHost,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), NetError>>;

    /// Layer TLS for `host` over the open socket (after a tunnel).
    fn upgrade<'a>(&'a mut self, host: &'a HttpHost) -> BoxFuture<'a, Result<(), NetError>>;

    fn is_open(&self) -> bool;

    /// Whether an idle connection was closed or reset by the peer.
    fn is_stale(&self) -> bool;

    /// Whether the outermost layer is TLS.
    fn is_secure(&self) -> bool;

    /// Read timeout for subsequent exchanges; `None` waits indefinitely.
    fn set_socket_timeout(&mut self, timeout: Option<Duration>);

    /// Close immediately, discarding unread data.
    fn shutdown(&mut self);

    /// The open byte stream, if any.
    fn io(&mut self) -> Option<&mut dyn ConnectionIo>;
}

/// Exclusive loan of one connection from a manager.
#[derive(Debug)]
pub struct Lease {
    id: u64,
    route: Route,
    state: Option<AffinityToken>,
    connection: Box<dyn ManagedConnection>,
    reused: bool,
}

impl Lease {
    pub fn new(
        id: u64,
        route: Route,
        connection: Box<dyn ManagedConnection>,
        state: Option<AffinityToken>,
        reused: bool,
    ) -> Self {
        Self { id, route, state, connection, reused }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Affinity recorded for the connection, returned to the pool on release.
    pub fn state(&self) -> Option<&AffinityToken> {
        self.state.as_ref()
    }

    pub fn set_state(&mut self, state: Option<AffinityToken>) {
        self.state = state;
    }

    /// Whether the connection came out of the idle set rather than fresh.
    pub fn is_reused(&self) -> bool {
        self.reused
    }

    pub fn connection(&self) -> &dyn ManagedConnection {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> &mut dyn ManagedConnection {
        self.connection.as_mut()
    }

    /// Split into the connection and its affinity, ending the loan.
    pub fn into_parts(self) -> (Route, Box<dyn ManagedConnection>, Option<AffinityToken>) {
        (self.route, self.connection, self.state)
    }
}

/// Source of leased connections for the execution chain.
pub trait ConnectionManager: Send + Sync {
    /// Lease a connection for `route`, preferring one already tagged with
    /// `state`. Waits at most `timeout` for capacity.
    fn lease<'a>(
        &'a self,
        route: &'a Route,
        state: Option<&'a AffinityToken>,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<Lease, NetError>>;

    /// Open the leased connection to the route's first hop.
    fn connect<'a>(
        &'a self,
        lease: &'a mut Lease,
        timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), NetError>>;

    /// Layer TLS for the route's target over the leased connection.
    fn upgrade<'a>(&'a self, lease: &'a mut Lease) -> BoxFuture<'a, Result<(), NetError>>;

    /// End the loan. A reusable connection stays pooled for at most
    /// `valid_for` (`None` = until the idle timeout).
    fn release(&self, lease: Lease, reusable: bool, valid_for: Option<Duration>);

    /// Shut the leased connection down without ending the loan.
    fn close(&self, lease: &mut Lease) {
        lease.connection_mut().shutdown();
    }
}

/// Creates unopened connections for a route.
pub trait ConnectionFactory: Send + Sync {
    fn create(&self, route: &Route) -> Box<dyn ManagedConnection>;
}

impl<F> ConnectionFactory for F
where
    F: Fn(&Route) -> Box<dyn ManagedConnection> + Send + Sync,
{
    fn create(&self, route: &Route) -> Box<dyn ManagedConnection> {
        self(route)
    }
}
