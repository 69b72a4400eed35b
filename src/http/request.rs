use crate::http::requestbody::RequestBody;
use http::header::{HeaderMap, HeaderValue, HOST};
use http::{Method, Request, Uri, Version};

/// A request travelling down the execution chain.
///
/// Layers may add or replace headers on the way (authentication
/// responses in particular); the headers the caller supplied are kept
/// aside so a retry can start again from them.
#[derive(Debug)]
pub struct ExecRequest {
    inner: Request<RequestBody>,
    original_headers: HeaderMap,
}

impl ExecRequest {
    pub fn new(request: Request<RequestBody>) -> Self {
        let original_headers = request.headers().clone();
        Self { inner: request, original_headers }
    }

    /// Synthetic `CONNECT host:port` tunnel request; carries no body.
    pub fn connect(authority: &str, version: Version) -> Result<Self, http::Error> {
        let request = Request::builder()
            .method(Method::CONNECT)
            .uri(authority)
            .version(version)
            .header(HOST, HeaderValue::from_str(authority)?)
            .body(RequestBody::Empty)?;
        Ok(Self::new(request))
    }

    pub fn method(&self) -> &Method {
        self.inner.method()
    }

    pub fn uri(&self) -> &Uri {
        self.inner.uri()
    }

    pub fn version(&self) -> Version {
        self.inner.version()
    }

    pub fn headers(&self) -> &HeaderMap {
        self.inner.headers()
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.inner.headers_mut()
    }

    /// Headers as supplied by the caller, before any layer touched them.
    pub fn original_headers(&self) -> &HeaderMap {
        &self.original_headers
    }

    /// Put the caller's headers back, dropping anything added since.
    pub fn restore_headers(&mut self) {
        *self.inner.headers_mut() = self.original_headers.clone();
    }

    pub fn body(&self) -> &RequestBody {
        self.inner.body()
    }

    pub fn body_mut(&mut self) -> &mut RequestBody {
        self.inner.body_mut()
    }

    /// Whether the request may be put on the wire again.
    pub fn can_resend(&self) -> bool {
        self.body().is_repeatable() || !self.body().is_consumed()
    }

    pub fn into_inner(self) -> Request<RequestBody> {
        self.inner
    }
}

impl From<Request<RequestBody>> for ExecRequest {
    fn from(request: Request<RequestBody>) -> Self {
        Self::new(request)
    }
}
