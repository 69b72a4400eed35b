use crate::route::host::HttpHost;
use std::fmt;

/// Whether the route passes through a CONNECT tunnel to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TunnelType {
    #[default]
    Plain,
    Tunnelled,
}

/// Whether a protocol (TLS) is layered over the connected or tunnelled stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum LayerType {
    #[default]
    Plain,
    Layered,
}

/// Immutable plan of the network path for one request.
///
/// Hop `0..n-1` are the proxies in connection order; the last hop is
/// always the target.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Route {
    target: HttpHost,
    proxies: Vec<HttpHost>,
    tunnelled: TunnelType,
    layered: LayerType,
    secure: bool,
}

impl Route {
    /// Full constructor. A route without proxies is never tunnelled.
    pub fn new(
        target: HttpHost,
        proxies: Vec<HttpHost>,
        secure: bool,
        tunnelled: TunnelType,
        layered: LayerType,
    ) -> Self {
        let tunnelled = if proxies.is_empty() { TunnelType::Plain } else { tunnelled };
        Self { target, proxies, tunnelled, layered, secure }
    }

    /// Direct connection to the target.
    pub fn direct(target: HttpHost) -> Self {
        let secure = target.is_secure();
        Self::new(target, Vec::new(), secure, TunnelType::Plain, LayerType::Plain)
    }

    /// Connection through a single proxy. Secure targets are tunnelled and
    /// layered; plain targets are requested from the proxy directly.
    pub fn via_proxy(target: HttpHost, proxy: HttpHost) -> Self {
        let secure = target.is_secure();
        let (tunnelled, layered) = if secure {
            (TunnelType::Tunnelled, LayerType::Layered)
        } else {
            (TunnelType::Plain, LayerType::Plain)
        };
        Self::new(target, vec![proxy], secure, tunnelled, layered)
    }

    pub fn target(&self) -> &HttpHost {
        &self.target
    }

    /// The first proxy, i.e. the host the connection is physically opened to.
    pub fn proxy(&self) -> Option<&HttpHost> {
        self.proxies.first()
    }

    pub fn proxies(&self) -> &[HttpHost] {
        &self.proxies
    }

    /// Number of hops including the target.
    pub fn hop_count(&self) -> usize {
        self.proxies.len() + 1
    }

    /// Target of hop `hop`; the final hop is the target itself.
    ///
    /// # Panics
    /// If `hop >= hop_count()`.
    pub fn hop_target(&self, hop: usize) -> &HttpHost {
        assert!(hop < self.hop_count(), "hop index {} out of range", hop);
        self.proxies.get(hop).unwrap_or(&self.target)
    }

    /// The host a fresh connection is opened to.
    pub fn first_hop(&self) -> &HttpHost {
        self.hop_target(0)
    }

    pub fn tunnel_type(&self) -> TunnelType {
        self.tunnelled
    }

    pub fn layer_type(&self) -> LayerType {
        self.layered
    }

    pub fn is_tunnelled(&self) -> bool {
        self.tunnelled == TunnelType::Tunnelled
    }

    pub fn is_layered(&self) -> bool {
        self.layered == LayerType::Layered
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        if self.is_tunnelled() {
            f.write_str("t")?;
        }
        if self.is_layered() {
            f.write_str("l")?;
        }
        if self.secure {
            f.write_str("s")?;
        }
        f.write_str("}->")?;
        for proxy in &self.proxies {
            write!(f, "{}->", proxy)?;
        }
        write!(f, "{}", self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_route() {
        let route = Route::direct(HttpHost::https("example.com", 443));
        assert_eq!(route.hop_count(), 1);
        assert!(route.is_secure());
        assert!(!route.is_tunnelled());
        assert_eq!(route.first_hop(), route.target());
        assert_eq!(route.to_string(), "{s}->https://example.com:443");
    }

    #[test]
    fn test_secure_proxy_route_is_tunnelled() {
        let route = Route::via_proxy(
            HttpHost::https("example.com", 443),
            HttpHost::http("proxy.local", 3128),
        );
        assert_eq!(route.hop_count(), 2);
        assert!(route.is_tunnelled());
        assert!(route.is_layered());
        assert_eq!(route.hop_target(0).host(), "proxy.local");
        assert_eq!(route.hop_target(1).host(), "example.com");
    }

    #[test]
    fn test_plain_proxy_route() {
        let route = Route::via_proxy(
            HttpHost::http("example.com", 80),
            HttpHost::http("proxy.local", 3128),
        );
        assert!(!route.is_tunnelled());
        assert_eq!(route.to_string(), "{}->http://proxy.local:3128->http://example.com:80");
    }

    #[test]
    fn test_direct_route_cannot_tunnel() {
        let route = Route::new(
            HttpHost::http("example.com", 80),
            Vec::new(),
            false,
            TunnelType::Tunnelled,
            LayerType::Plain,
        );
        assert!(!route.is_tunnelled());
    }

    #[test]
    #[should_panic]
    fn test_hop_target_out_of_range() {
        let route = Route::direct(HttpHost::http("example.com", 80));
        let _ = route.hop_target(1);
    }
}
