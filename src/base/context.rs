//! Ergonomic error context helpers.
//!
//! Connection-layer and codec implementations use these to turn raw
//! `io::Error`s into `NetError::Transport` values that name the peer.

use crate::base::neterror::{NetError, TransportKind};
use std::io;

/// Extension trait for adding context to IO Results.
pub trait IoResultExt<T> {
    /// Add connection context to an IO error.
    ///
    /// # Example
    /// ```ignore
    /// use hopnet::base::context::IoResultExt;
    ///
    /// let stream = TcpStream::connect(addr).await
    ///     .connect_context("proxy.local:3128")?;
    /// // Error: "connect to proxy.local:3128 failed: connection refused"
    /// ```
    fn connect_context(self, authority: &str) -> Result<T, NetError>;

    /// Add request/response exchange context to an IO error.
    fn exchange_context(self, authority: &str) -> Result<T, NetError>;
}

impl<T> IoResultExt<T> for Result<T, io::Error> {
    fn connect_context(self, authority: &str) -> Result<T, NetError> {
        self.map_err(|e| {
            let kind = match e.kind() {
                io::ErrorKind::TimedOut => TransportKind::ConnectTimeout,
                io::ErrorKind::ConnectionRefused => TransportKind::ConnectRefused,
                _ => return wrap(e, format_args!("connect to {} failed", authority)),
            };
            NetError::Transport {
                kind,
                source: io::Error::new(e.kind(), format!("connect to {} failed: {}", authority, e)),
            }
        })
    }

    fn exchange_context(self, authority: &str) -> Result<T, NetError> {
        self.map_err(|e| wrap(e, format_args!("exchange with {} failed", authority)))
    }
}

fn wrap(e: io::Error, what: std::fmt::Arguments<'_>) -> NetError {
    NetError::from(io::Error::new(e.kind(), format!("{}: {}", what, e)))
}
