//! Credentials and their lookup by authentication scope.

use crate::route::host::HttpHost;
use dashmap::DashMap;
use std::fmt;
use std::sync::Arc;
use zeroize::Zeroizing;

/// Username/password pair. The password is wiped from memory on drop.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    password: Zeroizing<String>,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self { username: username.into(), password: Zeroizing::new(password.into()) }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl PartialEq for Credentials {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username && *self.password == *other.password
    }
}

/// Where a set of credentials applies. `None` fields match anything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct AuthScope {
    host: Option<String>,
    port: Option<u16>,
    realm: Option<String>,
    scheme: Option<String>,
}

impl AuthScope {
    /// Scope matching every host, realm and scheme.
    pub fn any() -> Self {
        Self::default()
    }

    /// Scope for one host and port.
    pub fn for_host(host: &HttpHost) -> Self {
        Self { host: Some(host.host().to_string()), port: Some(host.port()), ..Self::default() }
    }

    pub fn with_realm(mut self, realm: impl Into<String>) -> Self {
        self.realm = Some(realm.into());
        self
    }

    /// Restrict to a scheme; names compare case-insensitively.
    pub fn with_scheme(mut self, scheme: &str) -> Self {
        self.scheme = Some(scheme.to_ascii_lowercase());
        self
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn realm(&self) -> Option<&str> {
        self.realm.as_deref()
    }

    pub fn scheme(&self) -> Option<&str> {
        self.scheme.as_deref()
    }

    /// How specifically `other` matches this scope, or `None` if it
    /// conflicts. Host outweighs port, port outweighs realm, realm
    /// outweighs scheme.
    pub fn match_score(&self, other: &AuthScope) -> Option<u32> {
        fn component<T: PartialEq>(a: &Option<T>, b: &Option<T>, weight: u32) -> Option<u32> {
            match (a, b) {
                (Some(a), Some(b)) if a == b => Some(weight),
                (None, None) => Some(weight),
                (Some(_), Some(_)) => None,
                _ => Some(0),
            }
        }
        Some(
            component(&self.scheme, &other.scheme, 1)?
                + component(&self.realm, &other.realm, 2)?
                + component(&self.port, &other.port, 4)?
                + component(&self.host, &other.host, 8)?,
        )
    }
}

/// Supplies credentials for a challenge scope.
pub trait CredentialsProvider: Send + Sync {
    fn credentials(&self, scope: &AuthScope) -> Option<Credentials>;
}

/// In-memory provider returning the most specific matching entry.
#[derive(Clone, Default)]
pub struct BasicCredentialsProvider {
    entries: Arc<DashMap<AuthScope, Credentials>>,
}

impl BasicCredentialsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store credentials for a scope, replacing any previous entry.
    pub fn set_credentials(&self, scope: AuthScope, credentials: Credentials) {
        self.entries.insert(scope, credentials);
    }

    /// Remove every entry bound to `host`.
    pub fn remove_host(&self, host: &HttpHost) {
        self.entries.retain(|scope, _| {
            scope.host.as_deref() != Some(host.host()) || scope.port.is_some_and(|p| p != host.port())
        });
    }

    /// Clear all stored credentials.
    pub fn clear(&self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl CredentialsProvider for BasicCredentialsProvider {
    fn credentials(&self, scope: &AuthScope) -> Option<Credentials> {
        if let Some(exact) = self.entries.get(scope) {
            return Some(exact.clone());
        }
        self.entries
            .iter()
            .filter_map(|entry| scope.match_score(entry.key()).map(|score| (score, entry)))
            .max_by_key(|(score, _)| *score)
            .map(|(_, entry)| entry.value().clone())
    }
}

impl fmt::Debug for BasicCredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BasicCredentialsProvider").field("entries", &self.entries.len()).finish()
    }
}
