use crate::auth::credentials::Credentials;
use crate::base::neterror::NetError;
use crate::route::host::HttpHost;
use crate::route::matcher::ProxyMatcher;
use url::Url;
use zeroize::Zeroizing;

/// Proxy configuration with bypass rules.
#[derive(Debug, Clone)]
pub struct ProxySettings {
    host: HttpHost,
    username: Option<String>,
    password: Option<Zeroizing<String>>,
    bypass: ProxyMatcher,
}

impl ProxySettings {
    /// Proxy at `url`, e.g. `http://proxy.local:3128`. Credentials in the
    /// URL's userinfo are picked up.
    pub fn new(url: &str) -> Result<Self, NetError> {
        let url = Url::parse(url).map_err(|e| NetError::InvalidRequest(e.to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            other => {
                return Err(NetError::InvalidRequest(format!("unsupported proxy scheme {}", other)))
            }
        }
        let host = HttpHost::from_url(&url)?;
        let (username, password) = if url.username().is_empty() {
            (None, None)
        } else {
            (
                Some(url.username().to_string()),
                Some(Zeroizing::new(url.password().unwrap_or_default().to_string())),
            )
        };
        Ok(Self { host, username, password, bypass: ProxyMatcher::default() })
    }

    /// Proxy from `HTTPS_PROXY`/`https_proxy`/`HTTP_PROXY`/`http_proxy`,
    /// with NO_PROXY bypass rules.
    pub fn from_env() -> Option<Self> {
        let url = ["HTTPS_PROXY", "https_proxy", "HTTP_PROXY", "http_proxy"]
            .iter()
            .find_map(|name| std::env::var(name).ok().filter(|v| !v.is_empty()))?;
        let mut settings = Self::new(&url).ok()?;
        settings.bypass = ProxyMatcher::from_env();
        Some(settings)
    }

    /// Add authentication credentials.
    pub fn with_auth(mut self, user: &str, pass: &str) -> Self {
        self.username = Some(user.to_string());
        self.password = Some(Zeroizing::new(pass.to_string()));
        self
    }

    /// Add bypass rules from a NO_PROXY string.
    pub fn with_bypass(mut self, no_proxy: &str) -> Self {
        self.bypass = ProxyMatcher::parse(no_proxy);
        self
    }

    pub fn host(&self) -> &HttpHost {
        &self.host
    }

    /// Check if `target` should be reached without this proxy.
    pub fn should_bypass(&self, target: &HttpHost) -> bool {
        self.bypass.should_bypass(target.host())
    }

    /// Credentials configured for this proxy.
    pub fn credentials(&self) -> Option<Credentials> {
        let username = self.username.as_deref()?;
        let password = self.password.as_deref().map(String::as_str).unwrap_or_default();
        Some(Credentials::new(username, password))
    }
}
