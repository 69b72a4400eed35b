use crate::base::neterror::NetError;
use crate::route::host::HttpHost;
use crate::route::plan::Route;
use crate::route::proxy::ProxySettings;

/// Plans the route for a request before execution.
pub trait RoutePlanner: Send + Sync {
    fn plan(&self, target: &HttpHost) -> Result<Route, NetError>;
}

/// Direct routes, or a single proxy hop unless the target is bypassed.
#[derive(Debug, Clone, Default)]
pub struct DefaultRoutePlanner {
    proxy: Option<ProxySettings>,
}

impl DefaultRoutePlanner {
    pub fn new(proxy: Option<ProxySettings>) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> Option<&ProxySettings> {
        self.proxy.as_ref()
    }
}

impl RoutePlanner for DefaultRoutePlanner {
    fn plan(&self, target: &HttpHost) -> Result<Route, NetError> {
        let route = match &self.proxy {
            Some(proxy) if !proxy.should_bypass(target) => {
                Route::via_proxy(target.clone(), proxy.host().clone())
            }
            _ => Route::direct(target.clone()),
        };
        tracing::debug!(route = %route, "route planned");
        Ok(route)
    }
}
