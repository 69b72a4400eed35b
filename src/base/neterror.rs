use bytes::Bytes;
use std::io;
use thiserror::Error;

/// Coarse classification of transport-level failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// The peer actively refused the connection.
    ConnectRefused,
    /// The connection could not be established in time.
    ConnectTimeout,
    /// A read or write on an established connection timed out.
    SocketTimeout,
    /// The connection was reset or aborted by the peer.
    ConnectionReset,
    /// The peer closed the connection before the exchange completed.
    ConnectionClosed,
    /// No connection became available from the pool in time.
    PoolTimeout,
    /// Any other I/O failure.
    Other,
}

impl TransportKind {
    fn from_io(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::ConnectionRefused => TransportKind::ConnectRefused,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportKind::SocketTimeout,
            io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted => {
                TransportKind::ConnectionReset
            }
            io::ErrorKind::UnexpectedEof
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::NotConnected => TransportKind::ConnectionClosed,
            _ => TransportKind::Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum NetError {
    // Route establishment
    #[error("Unable to establish route: planned = {planned}; current = {current}")]
    RouteUnreachable { planned: String, current: String },
    #[error("CONNECT refused by proxy: {}", .0.status())]
    TunnelRefused(Box<http::Response<Bytes>>),
    #[error("Proxy chains are not supported")]
    ProxyChainUnsupported,
    #[error("Unexpected response: {0}")]
    Protocol(String),

    // Request execution
    #[error("Cannot retry request with a non-repeatable request body")]
    NonRepeatableRequest,
    #[error("Request aborted")]
    Aborted,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    // Transport
    #[error("{source}")]
    Transport {
        kind: TransportKind,
        #[source]
        source: io::Error,
    },

    // Authentication (recoverable per attempt)
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error("Malformed challenge: {0}")]
    MalformedChallenge(String),
}

impl From<io::Error> for NetError {
    fn from(source: io::Error) -> Self {
        NetError::Transport { kind: TransportKind::from_io(source.kind()), source }
    }
}

impl NetError {
    /// Build a transport failure of the given kind.
    pub fn transport(kind: TransportKind, message: impl Into<String>) -> Self {
        let io_kind = match kind {
            TransportKind::ConnectRefused => io::ErrorKind::ConnectionRefused,
            TransportKind::ConnectTimeout
            | TransportKind::SocketTimeout
            | TransportKind::PoolTimeout => io::ErrorKind::TimedOut,
            TransportKind::ConnectionReset => io::ErrorKind::ConnectionReset,
            TransportKind::ConnectionClosed => io::ErrorKind::UnexpectedEof,
            TransportKind::Other => io::ErrorKind::Other,
        };
        NetError::Transport { kind, source: io::Error::new(io_kind, message.into()) }
    }

    /// Timeout while waiting for a pooled connection.
    pub fn pool_timeout() -> Self {
        Self::transport(TransportKind::PoolTimeout, "Timeout waiting for connection from pool")
    }

    /// Whether this is an I/O failure from the connection layer or codec.
    pub fn is_transport(&self) -> bool {
        matches!(self, NetError::Transport { .. })
    }

    pub fn transport_kind(&self) -> Option<TransportKind> {
        match self {
            NetError::Transport { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Errors raised by route establishment or the request contract itself.
    /// Only the retry layer may turn anything into another attempt, and
    /// never one of these.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NetError::RouteUnreachable { .. }
                | NetError::TunnelRefused(_)
                | NetError::ProxyChainUnsupported
                | NetError::NonRepeatableRequest
                | NetError::Aborted
                | NetError::InvalidRequest(_)
        )
    }

    /// The buffered proxy response of a refused tunnel.
    pub fn tunnel_response(&self) -> Option<&http::Response<Bytes>> {
        match self {
            NetError::TunnelRefused(response) => Some(response),
            _ => None,
        }
    }
}
