//! Connection persistence decisions after an exchange.

use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use http::header::{HeaderMap, CONNECTION, CONTENT_LENGTH, TRANSFER_ENCODING};
use http::{HeaderName, Method, StatusCode, Version};
use std::time::Duration;

/// Decides whether a connection may carry another request.
pub trait ReuseStrategy: Send + Sync {
    fn keep_alive(&self, request: &ExecRequest, response: &HttpResponse) -> bool;
}

/// Decides how long an idle reusable connection stays valid.
pub trait KeepAliveStrategy: Send + Sync {
    /// `None` keeps the connection until the pool's idle timeout.
    fn keep_alive_duration(&self, response: &HttpResponse) -> Option<Duration>;
}

/// HTTP/1.x persistence rules: `Connection` tokens, version defaults and
/// body framing.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultReuseStrategy;

fn has_token(headers: &HeaderMap, name: HeaderName, token: &str) -> bool {
    headers
        .get_all(name)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|t| t.trim().eq_ignore_ascii_case(token))
}

fn has_body(request: &ExecRequest, status: StatusCode) -> bool {
    request.method() != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
        && !(request.method() == Method::CONNECT && status.is_success())
}

impl ReuseStrategy for DefaultReuseStrategy {
    fn keep_alive(&self, request: &ExecRequest, response: &HttpResponse) -> bool {
        if has_token(request.headers(), CONNECTION, "close") {
            return false;
        }
        let headers = response.headers();

        if has_body(request, response.status()) {
            let lengths = headers.get_all(CONTENT_LENGTH).iter().count();
            if let Some(te) = headers.get(TRANSFER_ENCODING) {
                // Anything but chunked as the final coding is close-delimited.
                let chunked = te
                    .to_str()
                    .ok()
                    .and_then(|v| v.rsplit(',').next())
                    .is_some_and(|last| last.trim().eq_ignore_ascii_case("chunked"));
                if !chunked {
                    return false;
                }
            } else if lengths != 1 {
                return false;
            } else {
                let valid = headers
                    .get(CONTENT_LENGTH)
                    .and_then(|v| v.to_str().ok())
                    .is_some_and(|v| v.trim().parse::<u64>().is_ok());
                if !valid {
                    return false;
                }
            }
        }

        if has_token(headers, CONNECTION, "close") {
            return false;
        }
        if has_token(headers, CONNECTION, "keep-alive") {
            return true;
        }
        response.version() > Version::HTTP_10
    }
}

/// Honors `Keep-Alive: timeout=N`; otherwise no limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultKeepAliveStrategy;

impl KeepAliveStrategy for DefaultKeepAliveStrategy {
    fn keep_alive_duration(&self, response: &HttpResponse) -> Option<Duration> {
        response
            .headers()
            .get_all("keep-alive")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(','))
            .filter_map(|param| param.split_once('='))
            .find(|(name, _)| name.trim().eq_ignore_ascii_case("timeout"))
            .and_then(|(_, value)| value.trim().trim_matches('"').parse::<u64>().ok())
            .map(Duration::from_secs)
    }
}
