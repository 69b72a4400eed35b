//! Per-endpoint authentication exchange state.
//!
//! Every state change goes through [`transition`]; the authenticator only
//! feeds it events and carries out the returned action.

use crate::auth::credentials::Credentials;
use crate::auth::scheme::{AuthOption, AuthScheme};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthProtocolState {
    #[default]
    Unchallenged,
    Challenged,
    Handshake,
    Success,
    Failure,
}

/// What the authenticator observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthEvent {
    /// A response that did not ask this endpoint for authentication.
    NotRequested,
    /// A response that asked for it again after success.
    Requested,
    /// A challenge arrived; `has_scheme` if a scheme is already in use.
    Challenge { has_scheme: bool },
    /// The scheme in use consumed its challenge.
    SchemeContinued { complete: bool },
    /// The challenge no longer offers the scheme in use.
    SchemeDropped,
    /// The strategy produced at least one option.
    OptionsSelected,
    /// The strategy found nothing usable.
    NoOptions,
}

/// What the authenticator must do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAction {
    Nothing,
    NotifySuccess,
    NotifyFailure,
    /// Feed the challenge to the scheme in use.
    Continue,
    /// Drop the scheme in use and ask the strategy for options.
    ResetAndSelect,
    /// Ask the strategy for options.
    Select,
    /// The challenge was handled; resend the request.
    Retry,
    /// The challenge cannot be answered.
    GiveUp,
    /// Notify failure, drop the scheme and give up.
    Reject,
}

/// The transition table.
pub fn transition(state: AuthProtocolState, event: AuthEvent) -> (AuthProtocolState, AuthAction) {
    use AuthAction::*;
    use AuthEvent::*;
    use AuthProtocolState::*;

    match (state, event) {
        (Challenged | Handshake, NotRequested) => (Success, NotifySuccess),
        (s, NotRequested) => (s, Nothing),
        (Success, Requested) => (Success, NotifyFailure),
        (s, Requested) => (s, Nothing),

        (Failure, _) => (Failure, GiveUp),

        (Success, Challenge { .. }) => (Unchallenged, ResetAndSelect),
        (Challenged | Handshake, Challenge { has_scheme: false }) => (Failure, Reject),
        (s, Challenge { has_scheme: true }) => (s, Continue),
        (Unchallenged, Challenge { has_scheme: false }) => (Unchallenged, Select),

        (_, SchemeContinued { complete: true }) => (Failure, Reject),
        (_, SchemeContinued { complete: false }) => (Handshake, Retry),
        (_, SchemeDropped) => (Unchallenged, ResetAndSelect),
        (_, OptionsSelected) => (Challenged, Retry),
        (s, NoOptions) => (s, GiveUp),
    }
}

/// Authentication state for one endpoint (target or proxy) of a call.
#[derive(Debug, Default)]
pub struct AuthExchange {
    state: AuthProtocolState,
    scheme: Option<Box<dyn AuthScheme>>,
    credentials: Option<Credentials>,
    options: VecDeque<AuthOption>,
}

impl AuthExchange {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> AuthProtocolState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: AuthProtocolState) {
        self.state = state;
    }

    pub fn scheme(&self) -> Option<&dyn AuthScheme> {
        self.scheme.as_deref()
    }

    pub(crate) fn scheme_mut(&mut self) -> Option<&mut (dyn AuthScheme + 'static)> {
        self.scheme.as_deref_mut()
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    /// Names of the schemes still queued to try, in order.
    pub fn pending_options(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(|o| o.scheme().name())
    }

    pub fn has_options(&self) -> bool {
        !self.options.is_empty()
    }

    /// Whether the scheme in use binds authorization to its connection.
    pub fn is_connection_based(&self) -> bool {
        self.scheme.as_ref().is_some_and(|s| s.is_connection_based())
    }

    /// Use `scheme` with `credentials`, dropping queued options.
    pub fn update(&mut self, scheme: Box<dyn AuthScheme>, credentials: Credentials) {
        self.scheme = Some(scheme);
        self.credentials = Some(credentials);
        self.options.clear();
    }

    pub(crate) fn set_options(&mut self, options: VecDeque<AuthOption>) {
        self.options = options;
        self.scheme = None;
        self.credentials = None;
    }

    /// Move the next queued option into use.
    pub(crate) fn next_option(&mut self) -> bool {
        match self.options.pop_front() {
            Some(option) => {
                let (scheme, credentials) = option.into_parts();
                self.scheme = Some(scheme);
                self.credentials = Some(credentials);
                true
            }
            None => false,
        }
    }

    /// Drop the scheme, credentials and options, keeping the state.
    pub(crate) fn clear_scheme(&mut self) {
        self.scheme = None;
        self.credentials = None;
        self.options.clear();
    }

    /// Back to `Unchallenged` with nothing selected.
    pub fn reset(&mut self) {
        self.state = AuthProtocolState::Unchallenged;
        self.clear_scheme();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use AuthProtocolState::*;

    #[test]
    fn test_success_after_challenge() {
        assert_eq!(transition(Challenged, AuthEvent::NotRequested), (Success, AuthAction::NotifySuccess));
        assert_eq!(transition(Handshake, AuthEvent::NotRequested), (Success, AuthAction::NotifySuccess));
        assert_eq!(transition(Unchallenged, AuthEvent::NotRequested), (Unchallenged, AuthAction::Nothing));
    }

    #[test]
    fn test_failure_is_terminal() {
        for event in [
            AuthEvent::NotRequested,
            AuthEvent::Challenge { has_scheme: true },
            AuthEvent::Challenge { has_scheme: false },
            AuthEvent::OptionsSelected,
        ] {
            assert_eq!(transition(Failure, event).0, Failure);
        }
    }

    #[test]
    fn test_rechallenge_of_complete_scheme_fails() {
        let (state, action) = transition(Challenged, AuthEvent::Challenge { has_scheme: true });
        assert_eq!(action, AuthAction::Continue);
        assert_eq!(transition(state, AuthEvent::SchemeContinued { complete: true }), (Failure, AuthAction::Reject));
    }

    #[test]
    fn test_multi_leg_handshake() {
        assert_eq!(
            transition(Challenged, AuthEvent::SchemeContinued { complete: false }),
            (Handshake, AuthAction::Retry)
        );
    }

    #[test]
    fn test_success_rechallenged_starts_over() {
        assert_eq!(
            transition(Success, AuthEvent::Challenge { has_scheme: true }),
            (Unchallenged, AuthAction::ResetAndSelect)
        );
        assert_eq!(transition(Unchallenged, AuthEvent::OptionsSelected), (Challenged, AuthAction::Retry));
    }

    #[test]
    fn test_reset() {
        let mut exchange = AuthExchange::new();
        exchange.set_state(Failure);
        exchange.reset();
        assert_eq!(exchange.state(), Unchallenged);
        assert!(exchange.scheme().is_none());
        assert!(!exchange.has_options());
    }
}
