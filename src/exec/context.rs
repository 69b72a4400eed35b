use crate::auth::state::AuthExchange;
use crate::base::cancel::CancellationToken;
use crate::exec::config::RequestConfig;
use crate::socket::connection::AffinityToken;

/// Per-call state shared by the layers of the chain.
///
/// Reusing a context for follow-up requests keeps negotiated
/// authentication and the affinity token, so the pool can hand back the
/// connection they were negotiated on.
#[derive(Debug, Default)]
pub struct ExecContext {
    pub(crate) target_auth: AuthExchange,
    pub(crate) proxy_auth: AuthExchange,
    config: RequestConfig,
    cancel: CancellationToken,
    user_token: Option<AffinityToken>,
}

impl ExecContext {
    pub fn new(config: RequestConfig) -> Self {
        Self { config, ..Self::default() }
    }

    /// Cancel the call through `token`.
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn config(&self) -> &RequestConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RequestConfig) {
        self.config = config;
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn target_auth(&self) -> &AuthExchange {
        &self.target_auth
    }

    pub fn proxy_auth(&self) -> &AuthExchange {
        &self.proxy_auth
    }

    pub fn user_token(&self) -> Option<&AffinityToken> {
        self.user_token.as_ref()
    }

    pub fn set_user_token(&mut self, token: Option<AffinityToken>) {
        self.user_token = token;
    }
}
