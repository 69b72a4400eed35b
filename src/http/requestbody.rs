//! Request body for POST/PUT operations.

use crate::base::neterror::NetError;
use bytes::Bytes;
use futures::stream::{self, BoxStream, StreamExt};
use std::fmt;

/// Request body as seen by the execution chain.
///
/// Byte bodies can be replayed any number of times; stream bodies can be
/// sent once, and a request whose stream was already taken cannot be
/// resent on retry.
#[derive(Default)]
pub enum RequestBody {
    /// No body (GET, HEAD, DELETE).
    #[default]
    Empty,
    /// Body with raw bytes.
    Bytes(Bytes),
    /// One-shot streaming body.
    Stream(OneShot),
}

/// A body stream that can be taken exactly once.
pub struct OneShot {
    stream: Option<BoxStream<'static, Result<Bytes, NetError>>>,
    length: Option<u64>,
}

impl RequestBody {
    /// Wrap a stream as a non-repeatable body.
    pub fn stream<S>(stream: S, length: Option<u64>) -> Self
    where
        S: futures::Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        RequestBody::Stream(OneShot { stream: Some(stream.boxed()), length })
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        match self {
            RequestBody::Empty => true,
            RequestBody::Bytes(b) => b.is_empty(),
            RequestBody::Stream(s) => s.length == Some(0),
        }
    }

    /// Length in bytes, when known up front.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            RequestBody::Empty => Some(0),
            RequestBody::Bytes(b) => Some(b.len() as u64),
            RequestBody::Stream(s) => s.length,
        }
    }

    /// Whether the body can be produced again after being sent.
    pub fn is_repeatable(&self) -> bool {
        !matches!(self, RequestBody::Stream(_))
    }

    /// Whether a one-shot body has already been handed to the codec.
    pub fn is_consumed(&self) -> bool {
        matches!(self, RequestBody::Stream(OneShot { stream: None, .. }))
    }

    /// Take the body content for transmission.
    ///
    /// Byte bodies yield a fresh copy every time. A one-shot body yields
    /// its stream once and `NonRepeatableRequest` afterwards.
    pub fn take_stream(&mut self) -> Result<BoxStream<'static, Result<Bytes, NetError>>, NetError> {
        match self {
            RequestBody::Empty => Ok(stream::empty().boxed()),
            RequestBody::Bytes(b) => Ok(stream::once(futures::future::ready(Ok(b.clone()))).boxed()),
            RequestBody::Stream(s) => s.stream.take().ok_or(NetError::NonRepeatableRequest),
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Empty => f.write_str("Empty"),
            RequestBody::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            RequestBody::Stream(s) => f
                .debug_struct("Stream")
                .field("length", &s.length)
                .field("consumed", &s.stream.is_none())
                .finish(),
        }
    }
}

impl From<String> for RequestBody {
    fn from(s: String) -> Self {
        RequestBody::Bytes(Bytes::from(s))
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(v: Vec<u8>) -> Self {
        RequestBody::Bytes(Bytes::from(v))
    }
}

impl From<&'static str> for RequestBody {
    fn from(s: &'static str) -> Self {
        RequestBody::Bytes(Bytes::from_static(s.as_bytes()))
    }
}

impl From<Bytes> for RequestBody {
    fn from(b: Bytes) -> Self {
        RequestBody::Bytes(b)
    }
}
