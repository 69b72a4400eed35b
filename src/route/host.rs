use crate::base::neterror::NetError;
use std::fmt;
use url::Url;

/// A network endpoint: scheme, host name and port.
///
/// Host names are normalised to lower case so that routes compare equal
/// regardless of how the caller spelled them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HttpHost {
    scheme: String,
    host: String,
    port: u16,
}

impl HttpHost {
    pub fn new(scheme: &str, host: &str, port: u16) -> Self {
        Self {
            scheme: scheme.to_ascii_lowercase(),
            host: host.trim_start_matches('[').trim_end_matches(']').to_ascii_lowercase(),
            port,
        }
    }

    /// `http://host:port`
    pub fn http(host: &str, port: u16) -> Self {
        Self::new("http", host, port)
    }

    /// `https://host:port`
    pub fn https(host: &str, port: u16) -> Self {
        Self::new("https", host, port)
    }

    /// Build from a URL, filling in the scheme's default port.
    pub fn from_url(url: &Url) -> Result<Self, NetError> {
        let host = url
            .host_str()
            .ok_or_else(|| NetError::InvalidRequest(format!("no host in {}", url)))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| NetError::InvalidRequest(format!("no port for {}", url)))?;
        Ok(Self::new(url.scheme(), host, port))
    }

    /// Build from an absolute request URI.
    pub fn from_uri(uri: &http::Uri) -> Result<Self, NetError> {
        let scheme = uri.scheme_str().unwrap_or("http");
        let host = uri
            .host()
            .ok_or_else(|| NetError::InvalidRequest(format!("no host in {}", uri)))?;
        let port = match uri.port_u16() {
            Some(port) => port,
            None => default_port(scheme)
                .ok_or_else(|| NetError::InvalidRequest(format!("no port for {}", uri)))?,
        };
        Ok(Self::new(scheme, host, port))
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Whether this endpoint is reached over TLS.
    pub fn is_secure(&self) -> bool {
        self.scheme == "https"
    }

    /// `host:port` authority form, as used by CONNECT request targets.
    pub fn authority(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" | "ws" => Some(80),
        "https" | "wss" => Some(443),
        _ => None,
    }
}

impl fmt::Display for HttpHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}", self.scheme, self.authority())
    }
}
