//! HTTP Response with body access.

use crate::base::neterror::NetError;
use crate::http::responsebody::ResponseBody;
use bytes::Bytes;
use http::{HeaderMap, StatusCode, Version};

/// HTTP Response with accessible body.
/// This is the user-facing response type that owns the body.
#[derive(Debug)]
pub struct HttpResponse {
    status: StatusCode,
    version: Version,
    headers: HeaderMap,
    body: ResponseBody,
}

impl HttpResponse {
    pub fn new(status: StatusCode, body: ResponseBody) -> Self {
        Self { status, version: Version::HTTP_11, headers: HeaderMap::new(), body }
    }

    pub fn from_parts(parts: http::response::Parts, body: ResponseBody) -> Self {
        Self { status: parts.status, version: parts.version, headers: parts.headers, body }
    }

    /// Get the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Get the HTTP version.
    pub fn version(&self) -> Version {
        self.version
    }

    /// Get a reference to the headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn body(&self) -> &ResponseBody {
        &self.body
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }

    pub fn into_body(self) -> ResponseBody {
        self.body
    }

    /// Convenience method to consume body as bytes.
    pub async fn bytes(self) -> Result<Bytes, NetError> {
        self.body.bytes().await
    }

    /// Convenience method to consume body as text.
    pub async fn text(self) -> Result<String, NetError> {
        self.body.text().await
    }

    /// Read the body fully into an `http::Response`.
    pub async fn buffer(self) -> Result<http::Response<Bytes>, NetError> {
        let mut response = http::Response::new(self.body.bytes().await?);
        *response.status_mut() = self.status;
        *response.version_mut() = self.version;
        *response.headers_mut() = self.headers;
        Ok(response)
    }

    /// Release the connection, aborting it if the body was left unread.
    pub fn close(self) {
        self.body.close();
    }
}

impl From<http::Response<ResponseBody>> for HttpResponse {
    fn from(response: http::Response<ResponseBody>) -> Self {
        let (parts, body) = response.into_parts();
        Self::from_parts(parts, body)
    }
}

impl From<http::Response<Bytes>> for HttpResponse {
    fn from(response: http::Response<Bytes>) -> Self {
        let (parts, body) = response.into_parts();
        Self::from_parts(parts, ResponseBody::full(body))
    }
}
