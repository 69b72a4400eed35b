//! Drives an [`AuthExchange`] from responses and onto requests.

use crate::auth::state::{transition, AuthAction, AuthEvent, AuthExchange, AuthProtocolState};
use crate::auth::strategy::AuthStrategy;
use crate::http::request::ExecRequest;
use crate::http::response::HttpResponse;
use crate::route::host::HttpHost;

/// Stateless driver; all state lives in the exchange it is handed.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpAuthenticator;

impl HttpAuthenticator {
    pub fn new() -> Self {
        Self
    }

    /// Whether `response` challenges this endpoint. Also settles a
    /// pending exchange: an unchallenged response after a challenge means
    /// success, a challenge after success means the credentials went stale.
    pub fn is_challenge_present(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        exchange: &mut AuthExchange,
    ) -> bool {
        let requested = strategy.is_auth_requested(host, response);
        let event = if requested { AuthEvent::Requested } else { AuthEvent::NotRequested };
        let (next, action) = transition(exchange.state(), event);
        exchange.set_state(next);
        match action {
            AuthAction::NotifySuccess => {
                if let Some(scheme) = exchange.scheme() {
                    strategy.auth_succeeded(host, scheme);
                }
            }
            AuthAction::NotifyFailure => strategy.auth_failed(host, exchange.scheme()),
            _ => {}
        }
        if requested {
            tracing::debug!(host = %host, status = %response.status(), "authentication requested");
        }
        requested
    }

    /// Process the challenges in `response`. Returns `true` when the
    /// request should be resent with a new authorization.
    pub fn handle_challenge(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        exchange: &mut AuthExchange,
    ) -> bool {
        let challenges = match strategy.challenges(host, response) {
            Ok(challenges) => challenges,
            Err(e) => {
                tracing::warn!(host = %host, error = %e, "malformed challenge");
                exchange.reset();
                return false;
            }
        };
        if challenges.is_empty() {
            tracing::debug!(host = %host, "response contained no authentication challenges");
            return false;
        }

        let mut event = AuthEvent::Challenge { has_scheme: exchange.scheme().is_some() };
        loop {
            let (next, action) = transition(exchange.state(), event);
            exchange.set_state(next);
            event = match action {
                AuthAction::Continue => {
                    let Some(scheme) = exchange.scheme_mut() else {
                        return false;
                    };
                    match challenges.get(scheme.name()) {
                        Some(challenge) => match scheme.process_challenge(challenge) {
                            Ok(()) => AuthEvent::SchemeContinued { complete: scheme.is_complete() },
                            Err(e) => {
                                tracing::warn!(host = %host, error = %e, "malformed challenge");
                                exchange.reset();
                                return false;
                            }
                        },
                        None => AuthEvent::SchemeDropped,
                    }
                }
                AuthAction::ResetAndSelect => {
                    exchange.clear_scheme();
                    self.select(host, response, strategy, exchange, &challenges)
                }
                AuthAction::Select => self.select(host, response, strategy, exchange, &challenges),
                AuthAction::Retry => return true,
                AuthAction::Reject => {
                    tracing::debug!(host = %host, "authorization rejected");
                    strategy.auth_failed(host, exchange.scheme());
                    exchange.clear_scheme();
                    return false;
                }
                AuthAction::GiveUp
                | AuthAction::Nothing
                | AuthAction::NotifySuccess
                | AuthAction::NotifyFailure => return false,
            };
        }
    }

    fn select(
        &self,
        host: &HttpHost,
        response: &HttpResponse,
        strategy: &dyn AuthStrategy,
        exchange: &mut AuthExchange,
        challenges: &crate::auth::challenge::ChallengeMap,
    ) -> AuthEvent {
        let options = strategy.select(challenges, host, response);
        if options.is_empty() {
            tracing::debug!(host = %host, "no usable authentication scheme");
            AuthEvent::NoOptions
        } else {
            exchange.set_options(options);
            AuthEvent::OptionsSelected
        }
    }

    /// Attach the authorization for the current state to `request`.
    /// Schemes that fail to produce one are skipped with a warning.
    pub fn generate_response(
        &self,
        request: &mut ExecRequest,
        strategy: &dyn AuthStrategy,
        exchange: &mut AuthExchange,
    ) {
        let header = strategy.endpoint().response_header();
        match exchange.state() {
            AuthProtocolState::Failure => return,
            AuthProtocolState::Success if exchange.is_connection_based() => return,
            AuthProtocolState::Challenged if exchange.has_options() => {
                while exchange.next_option() {
                    if let Some(value) = Self::authenticate(request, exchange) {
                        request.headers_mut().insert(header, value);
                        return;
                    }
                }
                return;
            }
            _ => {}
        }
        if let Some(value) = Self::authenticate(request, exchange) {
            request.headers_mut().insert(header, value);
        }
    }

    fn authenticate(request: &ExecRequest, exchange: &mut AuthExchange) -> Option<http::HeaderValue> {
        let credentials = exchange.credentials()?.clone();
        let scheme = exchange.scheme_mut()?;
        match scheme.authenticate(&credentials, request) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(scheme = scheme.name(), error = %e, "authentication error");
                None
            }
        }
    }
}
