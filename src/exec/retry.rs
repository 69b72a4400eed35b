//! Retry of whole exchanges, driven by a pluggable strategy.

use crate::base::cancel;
use crate::base::neterror::{NetError, TransportKind};
use crate::exec::context::ExecContext;
use crate::exec::ExecChain;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::route::plan::Route;
use futures::future::BoxFuture;
use http::header::RETRY_AFTER;
use http::{Method, StatusCode};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Reasons a failed exchange may be repeated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryReason {
    /// Server closed connection unexpectedly
    ConnectionReset,
    /// Connection was closed during request
    ConnectionClosed,
    /// No response within the socket timeout
    SocketTimeout,
    /// Connect attempt timed out
    ConnectTimeout,
}

impl RetryReason {
    /// Map a NetError to a RetryReason, if the error is retryable.
    pub fn from_error(error: &NetError) -> Option<Self> {
        match error.transport_kind()? {
            TransportKind::ConnectionReset => Some(Self::ConnectionReset),
            TransportKind::ConnectionClosed => Some(Self::ConnectionClosed),
            TransportKind::SocketTimeout => Some(Self::SocketTimeout),
            TransportKind::ConnectTimeout => Some(Self::ConnectTimeout),
            _ => None,
        }
    }
}

/// Configuration for retry behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Retries after the first execution (default: 1)
    pub max_retries: u32,
    /// Wait before repeating a 503 (default: 1s)
    pub retry_interval: Duration,
    /// Prefer the server's `Retry-After` seconds over `retry_interval`
    pub honor_retry_after: bool,
    /// Repeat idempotent requests after transport failures
    pub retry_transport_errors: bool,
    /// Base delay for exponential backoff of transport retries
    pub base_delay: Duration,
    /// Maximum delay cap for transport retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_interval: Duration::from_secs(1),
            honor_retry_after: true,
            retry_transport_errors: false,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryConfig {
    /// Create a config with no retries.
    pub fn no_retry() -> Self {
        Self { max_retries: 0, ..Default::default() }
    }
}

/// Calculate backoff delay for a given execution count.
///
/// Uses exponential backoff: `base_delay * 2^(execution-1)`,
/// capped at `max_delay`.
pub fn calculate_backoff(execution: u32, config: &RetryConfig) -> Duration {
    if execution == 0 {
        return Duration::ZERO;
    }
    let factor = 1u32 << (execution - 1).min(10);
    config.base_delay.saturating_mul(factor).min(config.max_delay)
}

/// Decides whether an exchange is repeated, and after how long.
///
/// `execution` counts from 1 for the first attempt.
pub trait RetryStrategy: Send + Sync {
    fn retry_response(&self, response: &HttpResponse, execution: u32, ctx: &ExecContext) -> Option<Duration>;

    fn retry_error(
        &self,
        _request: &ExecRequest,
        _error: &NetError,
        _execution: u32,
        _ctx: &ExecContext,
    ) -> Option<Duration> {
        None
    }
}

/// Repeats 503 responses, and optionally idempotent requests that failed
/// in transport, up to `max_retries` times.
#[derive(Debug, Clone, Default)]
pub struct DefaultRetryStrategy {
    config: RetryConfig,
}

impl DefaultRetryStrategy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn retry_after(&self, response: &HttpResponse) -> Option<Duration> {
        if !self.config.honor_retry_after {
            return None;
        }
        let value = response.headers().get(RETRY_AFTER)?.to_str().ok()?;
        value.trim().parse::<u64>().ok().map(Duration::from_secs)
    }
}

fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

impl RetryStrategy for DefaultRetryStrategy {
    fn retry_response(&self, response: &HttpResponse, execution: u32, _ctx: &ExecContext) -> Option<Duration> {
        if execution > self.config.max_retries || response.status() != StatusCode::SERVICE_UNAVAILABLE {
            return None;
        }
        Some(self.retry_after(response).unwrap_or(self.config.retry_interval))
    }

    fn retry_error(
        &self,
        request: &ExecRequest,
        error: &NetError,
        execution: u32,
        _ctx: &ExecContext,
    ) -> Option<Duration> {
        if !self.config.retry_transport_errors || execution > self.config.max_retries {
            return None;
        }
        if !is_idempotent(request.method()) {
            return None;
        }
        RetryReason::from_error(error).map(|_| calculate_backoff(execution, &self.config))
    }
}

/// Repeats the inner chain while the strategy asks for it.
///
/// The layer sets no cap of its own; termination is up to the strategy.
pub struct RetryExec {
    inner: Arc<dyn ExecChain>,
    strategy: Arc<dyn RetryStrategy>,
}

impl RetryExec {
    pub fn new(inner: Arc<dyn ExecChain>, strategy: Arc<dyn RetryStrategy>) -> Self {
        Self { inner, strategy }
    }

    async fn run(
        &self,
        route: &Route,
        request: &mut ExecRequest,
        ctx: &mut ExecContext,
    ) -> Result<HttpResponse, NetError> {
        let token = ctx.cancel_token().clone();
        let mut execution = 1u32;
        loop {
            let wait = match self.inner.execute(route, request, ctx).await {
                Ok(response) => match self.strategy.retry_response(&response, execution, ctx) {
                    Some(wait) => {
                        tracing::debug!(route = %route, status = %response.status(), execution, wait = ?wait, "retrying response");
                        response.close();
                        wait
                    }
                    None => return Ok(response),
                },
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => match self.strategy.retry_error(request, &e, execution, ctx) {
                    Some(wait) => {
                        tracing::debug!(route = %route, error = %e, execution, wait = ?wait, "retrying after failure");
                        wait
                    }
                    None => return Err(e),
                },
            };
            if !request.can_resend() {
                return Err(NetError::NonRepeatableRequest);
            }
            cancel::sleep(&token, wait).await?;
            request.restore_headers();
            execution += 1;
        }
    }
}

impl ExecChain for RetryExec {
    fn execute<'a>(
        &'a self,
        route: &'a Route,
        request: &'a mut ExecRequest,
        ctx: &'a mut ExecContext,
    ) -> BoxFuture<'a, Result<HttpResponse, NetError>> {
        Box::pin(self.run(route, request, ctx))
    }
}
