use crate::auth::challenge::{parse_headers, ChallengeMap};
use crate::auth::credentials::{AuthScope, CredentialsProvider};
use crate::auth::scheme::{AuthOption, AuthScheme, AuthSchemeFactory, SchemeRegistry};
use crate::base::neterror::NetError;
use crate::http::response::HttpResponse;
use crate::route::host::HttpHost;
use dashmap::DashMap;
use http::header::{
    HeaderName, AUTHORIZATION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, WWW_AUTHENTICATE,
};
use http::StatusCode;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Which endpoint an exchange authenticates against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthTarget {
    Target,
    Proxy,
}

impl AuthTarget {
    pub fn challenge_status(self) -> StatusCode {
        match self {
            AuthTarget::Target => StatusCode::UNAUTHORIZED,
            AuthTarget::Proxy => StatusCode::PROXY_AUTHENTICATION_REQUIRED,
        }
    }

    pub fn challenge_header(self) -> HeaderName {
        match self {
            AuthTarget::Target => WWW_AUTHENTICATE,
            AuthTarget::Proxy => PROXY_AUTHENTICATE,
        }
    }

    pub fn response_header(self) -> HeaderName {
        match self {
            AuthTarget::Target => AUTHORIZATION,
            AuthTarget::Proxy => PROXY_AUTHORIZATION,
        }
    }
}

/// Recognizes challenges for one endpoint and ranks the answers to them.
pub trait AuthStrategy: Send + Sync {
    fn endpoint(&self) -> AuthTarget;

    fn is_auth_requested(&self, host: &HttpHost, response: &HttpResponse) -> bool;

    fn challenges(&self, host: &HttpHost, response: &HttpResponse) -> Result<ChallengeMap, NetError>;

    /// Candidate schemes with credentials, most preferred first. Each
    /// scheme has already processed its challenge.
    fn select(
        &self,
        challenges: &ChallengeMap,
        host: &HttpHost,
        response: &HttpResponse,
    ) -> VecDeque<AuthOption>;

    fn auth_succeeded(&self, host: &HttpHost, scheme: &dyn AuthScheme);

    fn auth_failed(&self, host: &HttpHost, scheme: Option<&dyn AuthScheme>);
}

/// Scheme that last authenticated against a host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthRecord {
    pub scheme: String,
    pub realm: Option<String>,
}

/// Hosts whose last successful scheme is remembered.
const MAX_OUTCOMES: usize = 256;

const DEFAULT_PREFERENCE: [&str; 5] = ["negotiate", "kerberos", "ntlm", "digest", "basic"];

/// Challenge handling by status code and header pair, with a fixed
/// scheme preference order.
pub struct DefaultAuthStrategy {
    target: AuthTarget,
    registry: SchemeRegistry,
    preference: Vec<String>,
    credentials: Arc<dyn CredentialsProvider>,
    outcomes: DashMap<HttpHost, AuthRecord>,
}

impl DefaultAuthStrategy {
    fn new(target: AuthTarget, credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self {
            target,
            registry: SchemeRegistry::default(),
            preference: DEFAULT_PREFERENCE.iter().map(|s| s.to_string()).collect(),
            credentials,
            outcomes: DashMap::new(),
        }
    }

    /// 401 / `WWW-Authenticate` / `Authorization`.
    pub fn target(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self::new(AuthTarget::Target, credentials)
    }

    /// 407 / `Proxy-Authenticate` / `Proxy-Authorization`.
    pub fn proxy(credentials: Arc<dyn CredentialsProvider>) -> Self {
        Self::new(AuthTarget::Proxy, credentials)
    }

    /// Register a scheme, ranked after the ones already known.
    pub fn with_scheme(mut self, name: &str, factory: impl AuthSchemeFactory + 'static) -> Self {
        let name = name.to_ascii_lowercase();
        self.registry.register(&name, factory);
        if !self.preference.contains(&name) {
            self.preference.push(name);
        }
        self
    }

    /// Replace the preference order.
    pub fn with_preference(mut self, order: &[&str]) -> Self {
        self.preference = order.iter().map(|s| s.to_ascii_lowercase()).collect();
        self
    }

    /// The last scheme that authenticated against `host`.
    pub fn last_success(&self, host: &HttpHost) -> Option<AuthRecord> {
        self.outcomes.get(host).map(|r| r.clone())
    }
}

impl AuthStrategy for DefaultAuthStrategy {
    fn endpoint(&self) -> AuthTarget {
        self.target
    }

    fn is_auth_requested(&self, _host: &HttpHost, response: &HttpResponse) -> bool {
        response.status() == self.target.challenge_status()
    }

    fn challenges(&self, _host: &HttpHost, response: &HttpResponse) -> Result<ChallengeMap, NetError> {
        parse_headers(response.headers(), &self.target.challenge_header())
    }

    fn select(
        &self,
        challenges: &ChallengeMap,
        host: &HttpHost,
        _response: &HttpResponse,
    ) -> VecDeque<AuthOption> {
        let mut options = VecDeque::new();
        for name in &self.preference {
            let Some(challenge) = challenges.get(name) else {
                continue;
            };
            let Some(mut scheme) = self.registry.create(name) else {
                tracing::debug!(scheme = %name, "authentication scheme not supported");
                continue;
            };
            if let Err(e) = scheme.process_challenge(challenge) {
                tracing::warn!(scheme = %name, error = %e, "malformed challenge");
                continue;
            }
            let mut scope = AuthScope::for_host(host).with_scheme(name);
            if let Some(realm) = scheme.realm() {
                scope = scope.with_realm(realm);
            }
            match self.credentials.credentials(&scope) {
                Some(credentials) => options.push_back(AuthOption::new(scheme, credentials)),
                None => tracing::debug!(scheme = %name, host = %host, "no credentials for scope"),
            }
        }
        options
    }

    fn auth_succeeded(&self, host: &HttpHost, scheme: &dyn AuthScheme) {
        tracing::debug!(host = %host, scheme = scheme.name(), "authentication succeeded");
        if self.outcomes.len() >= MAX_OUTCOMES && !self.outcomes.contains_key(host) {
            let evicted = self.outcomes.iter().next().map(|entry| entry.key().clone());
            if let Some(evicted) = evicted {
                self.outcomes.remove(&evicted);
            }
        }
        self.outcomes.insert(
            host.clone(),
            AuthRecord { scheme: scheme.name().to_string(), realm: scheme.realm().map(str::to_string) },
        );
    }

    fn auth_failed(&self, host: &HttpHost, scheme: Option<&dyn AuthScheme>) {
        tracing::debug!(host = %host, scheme = ?scheme.map(|s| s.name()), "authentication failed");
        self.outcomes.remove(host);
    }
}

impl fmt::Debug for DefaultAuthStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultAuthStrategy")
            .field("target", &self.target)
            .field("registry", &self.registry)
            .field("preference", &self.preference)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::basic::BasicScheme;
    use crate::auth::credentials::{BasicCredentialsProvider, Credentials};
    use crate::http::responsebody::ResponseBody;

    fn provider() -> Arc<BasicCredentialsProvider> {
        let provider = BasicCredentialsProvider::new();
        provider.set_credentials(AuthScope::any(), Credentials::new("user", "pass"));
        Arc::new(provider)
    }

    fn challenge(status: u16, header: &str, value: &str) -> HttpResponse {
        HttpResponse::from(
            http::Response::builder()
                .status(status)
                .header(header, value)
                .body(ResponseBody::empty())
                .unwrap(),
        )
    }

    #[test]
    fn test_target_and_proxy_headers() {
        let target = DefaultAuthStrategy::target(provider());
        let proxy = DefaultAuthStrategy::proxy(provider());
        let host = HttpHost::http("example.com", 80);

        let r401 = challenge(401, "www-authenticate", r#"Basic realm="r""#);
        assert!(target.is_auth_requested(&host, &r401));
        assert!(!proxy.is_auth_requested(&host, &r401));
        assert!(proxy.challenges(&host, &r401).unwrap().is_empty());
        assert_eq!(target.challenges(&host, &r401).unwrap().len(), 1);

        assert_eq!(proxy.endpoint().response_header(), PROXY_AUTHORIZATION);
    }

    #[test]
    fn test_select_by_preference() {
        let strategy = DefaultAuthStrategy::target(provider())
            .with_scheme("custom", || Box::new(BasicScheme::new()) as Box<dyn AuthScheme>)
            .with_preference(&["custom", "basic"]);
        let host = HttpHost::http("example.com", 80);
        let response = challenge(401, "www-authenticate", r#"Basic realm="a", Custom realm="b""#);

        let challenges = strategy.challenges(&host, &response).unwrap();
        let options = strategy.select(&challenges, &host, &response);
        let names: Vec<_> = options.iter().map(|o| o.scheme().realm().unwrap().to_string()).collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_no_credentials_no_options() {
        let strategy = DefaultAuthStrategy::target(Arc::new(BasicCredentialsProvider::new()));
        let host = HttpHost::http("example.com", 80);
        let response = challenge(401, "www-authenticate", r#"Basic realm="a""#);
        let challenges = strategy.challenges(&host, &response).unwrap();
        assert!(strategy.select(&challenges, &host, &response).is_empty());
    }

    #[test]
    fn test_outcomes_bounded() {
        let strategy = DefaultAuthStrategy::target(provider());
        let scheme = BasicScheme::new();
        for port in 1..=(MAX_OUTCOMES as u16 + 44) {
            strategy.auth_succeeded(&HttpHost::http("example.com", port), &scheme);
        }
        assert_eq!(strategy.outcomes.len(), MAX_OUTCOMES);

        let last = HttpHost::http("example.com", MAX_OUTCOMES as u16 + 44);
        assert_eq!(strategy.last_success(&last).unwrap().scheme, "basic");
        strategy.auth_failed(&last, Some(&scheme));
        assert!(strategy.last_success(&last).is_none());
    }

    #[test]
    fn test_unsupported_scheme_skipped() {
        let strategy = DefaultAuthStrategy::target(provider());
        let host = HttpHost::http("example.com", 80);
        let response = challenge(401, "www-authenticate", "Negotiate");
        let challenges = strategy.challenges(&host, &response).unwrap();
        assert!(strategy.select(&challenges, &host, &response).is_empty());
    }
}
