use crate::auth::basic::BasicScheme;
use crate::auth::challenge::AuthChallenge;
use crate::auth::credentials::Credentials;
use crate::base::neterror::NetError;
use crate::http::request::ExecRequest;
use http::HeaderValue;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// One authentication mechanism, holding its per-exchange state.
pub trait AuthScheme: Send + Sync + fmt::Debug {
    /// Lower-cased scheme name as it appears in challenges.
    fn name(&self) -> &str;

    /// Feed the scheme's challenge; multi-leg schemes advance here.
    fn process_challenge(&mut self, challenge: &AuthChallenge) -> Result<(), NetError>;

    /// Whether the scheme has nothing more to exchange. A complete scheme
    /// that is challenged again has had its credentials rejected.
    fn is_complete(&self) -> bool;

    /// Whether the authorization is bound to the connection it was
    /// negotiated on.
    fn is_connection_based(&self) -> bool;

    fn realm(&self) -> Option<&str>;

    /// Produce the authorization header value for `request`.
    fn authenticate(
        &mut self,
        credentials: &Credentials,
        request: &ExecRequest,
    ) -> Result<HeaderValue, NetError>;
}

/// Creates fresh scheme instances.
pub trait AuthSchemeFactory: Send + Sync {
    fn create(&self) -> Box<dyn AuthScheme>;
}

impl<F> AuthSchemeFactory for F
where
    F: Fn() -> Box<dyn AuthScheme> + Send + Sync,
{
    fn create(&self) -> Box<dyn AuthScheme> {
        self()
    }
}

/// A candidate scheme paired with the credentials it would use.
#[derive(Debug)]
pub struct AuthOption {
    scheme: Box<dyn AuthScheme>,
    credentials: Credentials,
}

impl AuthOption {
    pub fn new(scheme: Box<dyn AuthScheme>, credentials: Credentials) -> Self {
        Self { scheme, credentials }
    }

    pub fn scheme(&self) -> &dyn AuthScheme {
        self.scheme.as_ref()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn into_parts(self) -> (Box<dyn AuthScheme>, Credentials) {
        (self.scheme, self.credentials)
    }
}

/// Scheme factories by lower-cased name.
#[derive(Clone)]
pub struct SchemeRegistry {
    factories: BTreeMap<String, Arc<dyn AuthSchemeFactory>>,
}

impl SchemeRegistry {
    pub fn empty() -> Self {
        Self { factories: BTreeMap::new() }
    }

    pub fn register(&mut self, name: &str, factory: impl AuthSchemeFactory + 'static) {
        self.factories.insert(name.to_ascii_lowercase(), Arc::new(factory));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_ascii_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }

    pub fn create(&self, name: &str) -> Option<Box<dyn AuthScheme>> {
        self.factories.get(&name.to_ascii_lowercase()).map(|f| f.create())
    }
}

impl Default for SchemeRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("basic", || Box::new(BasicScheme::new()) as Box<dyn AuthScheme>);
        registry
    }
}

impl fmt::Debug for SchemeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.factories.keys()).finish()
    }
}
