//! Scripted connection and codec doubles shared by the integration tests.
#![allow(dead_code)]

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::StreamExt;
use hopnet::auth::{AuthChallenge, AuthScheme, Credentials};
use hopnet::base::neterror::{NetError, TransportKind};
use hopnet::http::{ExecRequest, HttpResponse, ResponseBody, WireCodec};
use hopnet::route::{HttpHost, Route};
use hopnet::socket::{ConnectionFactory, ConnectionIo, ManagedConnection, RoutePool};
use http::{HeaderMap, HeaderValue, Method, StatusCode};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Everything the doubles observed, in order.
#[derive(Debug, Default)]
pub struct Journal {
    events: Mutex<Vec<String>>,
}

impl Journal {
    pub fn push(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.events().iter().filter(|e| e.starts_with(prefix)).count()
    }
}

#[derive(Debug)]
pub struct MockConnection {
    journal: Arc<Journal>,
    open: bool,
    secure: bool,
    stale: Arc<std::sync::atomic::AtomicBool>,
    refuse: bool,
}

impl ManagedConnection for MockConnection {
    fn open<'a>(
        &'a mut self,
        host: &'a HttpHost,
        _timeout: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            self.journal.push(format!("open {}", host.authority()));
            if self.refuse {
                return Err(NetError::transport(TransportKind::ConnectRefused, "Connection refused"));
            }
            self.open = true;
            self.secure = host.is_secure();
            self.stale.store(false, Ordering::SeqCst);
            Ok(())
        })
    }

    fn upgrade<'a>(&'a mut self, host: &'a HttpHost) -> BoxFuture<'a, Result<(), NetError>> {
        Box::pin(async move {
            self.journal.push(format!("upgrade {}", host.authority()));
            self.secure = true;
            Ok(())
        })
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn is_stale(&self) -> bool {
        self.stale.load(Ordering::SeqCst)
    }

    fn is_secure(&self) -> bool {
        self.secure
    }

    fn set_socket_timeout(&mut self, _timeout: Option<Duration>) {}

    fn shutdown(&mut self) {
        if self.open {
            self.journal.push("shutdown");
        }
        self.open = false;
        self.secure = false;
    }

    fn io(&mut self) -> Option<&mut dyn ConnectionIo> {
        None
    }
}

/// Creates mock connections and records every creation.
#[derive(Debug, Default, Clone)]
pub struct MockFactory {
    pub journal: Arc<Journal>,
    pub created: Arc<AtomicUsize>,
    pub stale: Arc<std::sync::atomic::AtomicBool>,
    pub refuse: bool,
}

impl MockFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing() -> Self {
        Self { refuse: true, ..Self::default() }
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    pub fn pool(&self) -> Arc<RoutePool> {
        Arc::new(RoutePool::new(self.clone()))
    }
}

impl ConnectionFactory for MockFactory {
    fn create(&self, route: &Route) -> Box<dyn ManagedConnection> {
        self.created.fetch_add(1, Ordering::SeqCst);
        self.journal.push(format!("create {}", route));
        Box::new(MockConnection {
            journal: Arc::clone(&self.journal),
            open: false,
            secure: false,
            stale: Arc::clone(&self.stale),
            refuse: self.refuse,
        })
    }
}

/// A request as the codec saw it.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    pub method: Method,
    pub uri: String,
    pub headers: HeaderMap,
}

pub enum Scripted {
    Response(http::Response<Bytes>),
    Streaming(http::Response<Vec<Bytes>>),
    Error(TransportKind),
}

/// Answers each send with the next scripted outcome.
#[derive(Default)]
pub struct ScriptedCodec {
    script: Mutex<VecDeque<Scripted>>,
    seen: Mutex<Vec<SeenRequest>>,
    journal: Option<Arc<Journal>>,
}

impl ScriptedCodec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_journal(journal: Arc<Journal>) -> Self {
        Self { journal: Some(journal), ..Self::default() }
    }

    pub fn respond(self, response: http::Response<Bytes>) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Response(response));
        self
    }

    pub fn stream(self, response: http::Response<Vec<Bytes>>) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Streaming(response));
        self
    }

    pub fn fail(self, kind: TransportKind) -> Self {
        self.script.lock().unwrap().push_back(Scripted::Error(kind));
        self
    }

    pub fn seen(&self) -> Vec<SeenRequest> {
        self.seen.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

impl WireCodec for ScriptedCodec {
    fn send<'a>(
        &'a self,
        request: &'a mut ExecRequest,
        connection: &'a mut dyn ManagedConnection,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
        Box::pin(async move {
            if !connection.is_open() {
                return Err(NetError::transport(TransportKind::ConnectionClosed, "connection not open"));
            }
            if let Some(journal) = &self.journal {
                journal.push(format!("send {} {}", request.method(), request.uri()));
            }
            self.seen.lock().unwrap().push(SeenRequest {
                method: request.method().clone(),
                uri: request.uri().to_string(),
                headers: request.headers().clone(),
            });
            if matches!(request.body(), hopnet::RequestBody::Stream(_)) {
                let mut body = request.body_mut().take_stream()?;
                while let Some(chunk) = body.next().await {
                    chunk?;
                }
            }

            let next = self.script.lock().unwrap().pop_front();
            match next {
                Some(Scripted::Response(response)) => Ok(HttpResponse::from(response)),
                Some(Scripted::Streaming(response)) => {
                    let (parts, chunks) = response.into_parts();
                    let stream = futures::stream::iter(chunks.into_iter().map(Ok));
                    Ok(HttpResponse::from_parts(parts, ResponseBody::streaming(stream)))
                }
                Some(Scripted::Error(kind)) => {
                    connection.shutdown();
                    Err(NetError::transport(kind, "scripted failure"))
                }
                None => Err(NetError::transport(TransportKind::ConnectionClosed, "script exhausted")),
            }
        })
    }
}

/// A framed response, so the connection stays reusable.
pub fn response(status: u16) -> http::response::Builder {
    http::Response::builder().status(StatusCode::from_u16(status).unwrap())
}

pub fn with_body(builder: http::response::Builder, body: &'static str) -> http::Response<Bytes> {
    builder
        .header(http::header::CONTENT_LENGTH, body.len())
        .body(Bytes::from_static(body.as_bytes()))
        .unwrap()
}

pub fn ok(body: &'static str) -> http::Response<Bytes> {
    with_body(response(200), body)
}

pub fn challenge(status: u16, header: http::HeaderName, value: &str) -> http::Response<Bytes> {
    with_body(response(status).header(header, value), "")
}

/// Two-leg, connection-bound scheme. A bare `Handshake` challenge starts
/// it; a challenge carrying a server token is answered once more, which
/// completes it.
#[derive(Debug, Default)]
pub struct HandshakeScheme {
    server_token: Option<String>,
    complete: bool,
}

impl AuthScheme for HandshakeScheme {
    fn name(&self) -> &str {
        "handshake"
    }

    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), NetError> {
        self.server_token = challenge.token().map(str::to_string);
        Ok(())
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn is_connection_based(&self) -> bool {
        true
    }

    fn realm(&self) -> Option<&str> {
        None
    }

    fn authenticate(&mut self, credentials: &Credentials, _request: &ExecRequest) -> Result<HeaderValue, NetError> {
        let value = match &self.server_token {
            None => "Handshake type1".to_string(),
            Some(token) => {
                self.complete = true;
                format!("Handshake type3 {} {}", token, credentials.username())
            }
        };
        HeaderValue::from_str(&value).map_err(|e| NetError::Auth(e.to_string()))
    }
}

pub fn handshake_scheme() -> Box<dyn AuthScheme> {
    Box::new(HandshakeScheme::default())
}
