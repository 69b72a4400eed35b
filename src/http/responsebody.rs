//! Response body streaming.
//!
//! A streamed body keeps the connection leased until it is read to the
//! end (connection released, possibly for reuse) or dropped early
//! (connection aborted).

use crate::base::neterror::NetError;
use crate::socket::holder::ConnectionHolder;
use bytes::{Bytes, BytesMut};
use futures::stream::{BoxStream, Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

enum Kind {
    Empty,
    Full(Bytes),
    Streaming(BoxStream<'static, Result<Bytes, NetError>>),
    Done,
}

/// Response body wrapper for streaming.
pub struct ResponseBody {
    kind: Kind,
    holder: Option<ConnectionHolder>,
}

impl ResponseBody {
    pub fn empty() -> Self {
        Self { kind: Kind::Empty, holder: None }
    }

    /// Body already read off the wire.
    pub fn full(bytes: impl Into<Bytes>) -> Self {
        Self { kind: Kind::Full(bytes.into()), holder: None }
    }

    /// Body still to be read from the connection.
    pub fn streaming<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<Bytes, NetError>> + Send + 'static,
    {
        Self { kind: Kind::Streaming(stream.boxed()), holder: None }
    }

    /// Whether reading this body still needs the connection.
    pub fn is_streaming(&self) -> bool {
        matches!(self.kind, Kind::Streaming(_))
    }

    /// Whether the body has been read to the end.
    pub fn is_end_stream(&self) -> bool {
        matches!(self.kind, Kind::Empty | Kind::Done)
    }

    /// Keep the connection leased until the body is finished with.
    pub(crate) fn attach_holder(&mut self, holder: ConnectionHolder) {
        self.holder = Some(holder);
    }

    /// Read entire body as bytes.
    pub async fn bytes(mut self) -> Result<Bytes, NetError> {
        if let Kind::Full(bytes) = &self.kind {
            let bytes = bytes.clone();
            self.kind = Kind::Done;
            self.release();
            return Ok(bytes);
        }
        let mut buf = BytesMut::new();
        while let Some(chunk) = self.next().await {
            buf.extend_from_slice(&chunk?);
        }
        Ok(buf.freeze())
    }

    /// Read body as UTF-8 string.
    pub async fn text(self) -> Result<String, NetError> {
        let bytes = self.bytes().await?;
        String::from_utf8(bytes.to_vec())
            .map_err(|_| NetError::Protocol("response body is not valid UTF-8".into()))
    }

    /// Read and discard the rest of the body, releasing the connection.
    pub async fn consume(&mut self) -> Result<(), NetError> {
        while let Some(chunk) = self.next().await {
            chunk?;
        }
        Ok(())
    }

    /// Stop reading. An unfinished stream aborts its connection.
    pub fn close(mut self) {
        if let Some(mut holder) = self.holder.take() {
            if self.is_end_stream() {
                holder.release_connection();
            } else {
                holder.abort_connection();
            }
        }
    }

    fn release(&mut self) {
        if let Some(mut holder) = self.holder.take() {
            holder.release_connection();
        }
    }

    fn abort(&mut self) {
        if let Some(mut holder) = self.holder.take() {
            holder.abort_connection();
        }
    }
}

impl Stream for ResponseBody {
    type Item = Result<Bytes, NetError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        match &mut this.kind {
            Kind::Empty | Kind::Done => {
                this.release();
                Poll::Ready(None)
            }
            Kind::Full(_) => match std::mem::replace(&mut this.kind, Kind::Done) {
                Kind::Full(bytes) => Poll::Ready(Some(Ok(bytes))),
                _ => Poll::Ready(None),
            },
            Kind::Streaming(stream) => match stream.poll_next_unpin(cx) {
                Poll::Pending => Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => Poll::Ready(Some(Ok(chunk))),
                Poll::Ready(Some(Err(e))) => {
                    this.kind = Kind::Done;
                    this.abort();
                    Poll::Ready(Some(Err(e)))
                }
                Poll::Ready(None) => {
                    this.kind = Kind::Done;
                    this.release();
                    Poll::Ready(None)
                }
            },
        }
    }
}

impl Default for ResponseBody {
    fn default() -> Self {
        Self::empty()
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match &self.kind {
            Kind::Empty => "empty",
            Kind::Full(_) => "full",
            Kind::Streaming(_) => "streaming",
            Kind::Done => "done",
        };
        f.debug_struct("ResponseBody")
            .field("kind", &kind)
            .field("holder", &self.holder)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_full_body() {
        let body = ResponseBody::full("hello");
        assert!(!body.is_streaming());
        assert_eq!(body.text().await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn test_streaming_body_collects() {
        let chunks = stream::iter(vec![Ok(Bytes::from_static(b"he")), Ok(Bytes::from_static(b"llo"))]);
        let body = ResponseBody::streaming(chunks);
        assert!(body.is_streaming());
        assert_eq!(body.bytes().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn test_consume_reaches_end() {
        let chunks = stream::iter(vec![Ok(Bytes::from_static(b"x"))]);
        let mut body = ResponseBody::streaming(chunks);
        body.consume().await.unwrap();
        assert!(body.is_end_stream());
    }

    #[tokio::test]
    async fn test_stream_error_surfaces() {
        let chunks = stream::iter(vec![Err(NetError::Protocol("truncated".into()))]);
        let body = ResponseBody::streaming(chunks);
        assert!(matches!(body.bytes().await, Err(NetError::Protocol(_))));
    }
}
