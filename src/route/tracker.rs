use crate::route::host::HttpHost;
use crate::route::plan::{LayerType, Route, TunnelType};

/// Mutable progress record while a route is being established.
///
/// Created fresh for every establishment attempt. Calling a step out of
/// order is a programming error and panics.
#[derive(Debug, Clone)]
pub struct RouteTracker {
    target: HttpHost,
    connected: bool,
    proxies: Vec<HttpHost>,
    tunnelled: TunnelType,
    layered: LayerType,
    secure: bool,
}

impl RouteTracker {
    pub fn new(target: HttpHost) -> Self {
        Self {
            target,
            connected: false,
            proxies: Vec::new(),
            tunnelled: TunnelType::Plain,
            layered: LayerType::Plain,
            secure: false,
        }
    }

    /// Tracker for the target of `route`.
    pub fn for_route(route: &Route) -> Self {
        Self::new(route.target().clone())
    }

    /// The connection was opened directly to the target.
    pub fn connect_target(&mut self, secure: bool) {
        assert!(!self.connected, "already connected");
        self.connected = true;
        self.secure = secure;
    }

    /// The connection was opened to the first proxy.
    pub fn connect_proxy(&mut self, proxy: HttpHost, secure: bool) {
        assert!(!self.connected, "already connected");
        self.connected = true;
        self.proxies = vec![proxy];
        self.secure = secure;
    }

    /// A tunnel to the target was established through the proxy chain.
    pub fn tunnel_target(&mut self, secure: bool) {
        assert!(self.connected, "no tunnel unless connected");
        assert!(!self.proxies.is_empty(), "no tunnel without proxy");
        self.tunnelled = TunnelType::Tunnelled;
        self.secure = secure;
    }

    /// A tunnel to another proxy was established, extending the chain.
    pub fn tunnel_proxy(&mut self, proxy: HttpHost, secure: bool) {
        assert!(self.connected, "no tunnel unless connected");
        assert!(!self.proxies.is_empty(), "no tunnel without proxy");
        self.proxies.push(proxy);
        self.secure = secure;
    }

    /// A protocol was layered over the current connection.
    pub fn layer_protocol(&mut self, secure: bool) {
        assert!(self.connected, "no layered protocol unless connected");
        self.layered = LayerType::Layered;
        self.secure = secure;
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Hops physically established so far; zero until connected.
    pub fn hop_count(&self) -> usize {
        if self.connected {
            self.proxies.len() + 1
        } else {
            0
        }
    }

    /// Snapshot of the established route, if connected.
    pub fn to_route(&self) -> Option<Route> {
        self.connected.then(|| {
            Route::new(
                self.target.clone(),
                self.proxies.clone(),
                self.secure,
                self.tunnelled,
                self.layered,
            )
        })
    }

    pub fn reset(&mut self) {
        self.connected = false;
        self.proxies.clear();
        self.tunnelled = TunnelType::Plain;
        self.layered = LayerType::Plain;
        self.secure = false;
    }
}
